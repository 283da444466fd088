//! Build model: target identity, configuration, classpath and directory layout.

mod classpath;
mod configuration;
mod paths;
mod triplet;

pub use classpath::ClassPath;
pub use configuration::{
    BuildConfiguration, BuildConfigurationBuilder, CompileDirectives, DEFAULT_APP_NAME,
    DEFAULT_DOWNLOAD_URL, DEFAULT_RUNTIME_STATIC_VERSION, DEFAULT_UI_STATIC_VERSION,
    normalize_main_class,
};
pub use paths::ProcessPaths;
pub use triplet::{Arch, Os, Profile, Triplet, Vendor};
