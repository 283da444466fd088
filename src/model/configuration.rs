//! Build configuration.
//!
//! [`BuildConfiguration`] is assembled once through [`BuildConfigurationBuilder`]
//! and then only read by the pipeline stages.

use std::path::{Path, PathBuf};

use url::Url;

use super::triplet::Triplet;
use crate::error::ConfigError;

/// Runtime static SDK version used when none is configured
pub const DEFAULT_RUNTIME_STATIC_VERSION: &str = "15-ea+3";

/// UI toolkit static SDK version used when none is configured
pub const DEFAULT_UI_STATIC_VERSION: &str = "15-ea+gvm17";

/// Mirror the static SDK bundles are fetched from
pub const DEFAULT_DOWNLOAD_URL: &str = "https://download2.gluonhq.com/substrate/";

/// Application name used when none is configured
pub const DEFAULT_APP_NAME: &str = "anonymousApp";

/// Strip a module prefix from a main class name.
///
/// `"mymodule/com.example.Main"` becomes `"com.example.Main"`; names
/// without a `/` are returned as given. A missing name is rejected.
///
/// # Examples
///
/// ```
/// use kodegen_bundler_native::model::normalize_main_class;
///
/// assert_eq!(normalize_main_class(Some("app/com.example.Main")).unwrap(), "com.example.Main");
/// assert!(normalize_main_class(None).is_err());
/// ```
pub fn normalize_main_class(main_class: Option<&str>) -> Result<String, ConfigError> {
    let main_class = main_class
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or(ConfigError::MissingMainClass)?;

    let class = match main_class.split_once('/') {
        Some((_, class)) => class,
        None => main_class,
    };
    if class.is_empty() {
        return Err(ConfigError::MissingMainClass);
    }
    Ok(class.to_string())
}

/// Directives handed to the native-image compiler.
///
/// Usually produced by scanning the classpath; the CLI fills them from
/// explicit lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileDirectives {
    /// Classes registered for reflection
    pub reflection: Vec<String>,
    /// Classes registered for JNI access
    pub jni: Vec<String>,
    /// Classes initialized while building the image
    pub initialize_at_build_time: Vec<String>,
    /// Resource bundles embedded in the image
    pub resource_bundles: Vec<String>,
}

impl CompileDirectives {
    /// Whether every list is empty
    pub fn is_empty(&self) -> bool {
        self.reflection.is_empty()
            && self.jni.is_empty()
            && self.initialize_at_build_time.is_empty()
            && self.resource_bundles.is_empty()
    }
}

/// Everything a pipeline run needs to know about the build
#[derive(Debug, Clone)]
pub struct BuildConfiguration {
    app_name: String,
    main_class: String,
    graalvm_home: PathBuf,
    runtime_version: String,
    ui_toolkit_version: String,
    use_jni: bool,
    use_ui_toolkit: bool,
    host: Triplet,
    target: Triplet,
    check_hash: bool,
    verbose: bool,
    cache_root: PathBuf,
    download_url: Url,
    custom_runtime_libs: Option<PathBuf>,
    linker: Option<PathBuf>,
    compiler_args: Vec<String>,
    linker_args: Vec<String>,
    runtime_args: Vec<String>,
    directives: CompileDirectives,
}

impl BuildConfiguration {
    /// Start building a configuration
    pub fn builder() -> BuildConfigurationBuilder {
        BuildConfigurationBuilder::default()
    }

    /// Application name, used for the linked binary
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Main class without module prefix
    pub fn main_class(&self) -> &str {
        &self.main_class
    }

    /// Root of the native-image capable runtime SDK
    pub fn graalvm_home(&self) -> &Path {
        &self.graalvm_home
    }

    /// Version of the runtime static SDK bundle
    pub fn runtime_version(&self) -> &str {
        &self.runtime_version
    }

    /// Version of the UI toolkit static SDK bundle
    pub fn ui_toolkit_version(&self) -> &str {
        &self.ui_toolkit_version
    }

    /// Whether the runtime static libraries are linked in
    pub fn use_jni(&self) -> bool {
        self.use_jni
    }

    /// Whether the UI toolkit static SDK is linked in
    pub fn use_ui_toolkit(&self) -> bool {
        self.use_ui_toolkit
    }

    /// Machine the driver runs on
    pub fn host(&self) -> &Triplet {
        &self.host
    }

    /// Machine the image is built for
    pub fn target(&self) -> &Triplet {
        &self.target
    }

    /// Whether cached bundles are checked against their recorded checksums
    pub fn check_hash(&self) -> bool {
        self.check_hash
    }

    /// Verbose tool output
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Root of the bundle cache
    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// Base URL bundles are downloaded from
    pub fn download_url(&self) -> &Url {
        &self.download_url
    }

    /// User-supplied runtime static libraries, bypassing the download
    pub fn custom_runtime_libs(&self) -> Option<&Path> {
        self.custom_runtime_libs.as_deref()
    }

    /// Linker override
    pub fn linker(&self) -> Option<&Path> {
        self.linker.as_deref()
    }

    /// Extra native-image arguments
    pub fn compiler_args(&self) -> &[String] {
        &self.compiler_args
    }

    /// Extra linker arguments
    pub fn linker_args(&self) -> &[String] {
        &self.linker_args
    }

    /// Arguments passed to the application when it runs
    pub fn runtime_args(&self) -> &[String] {
        &self.runtime_args
    }

    /// Compiler directives
    pub fn directives(&self) -> &CompileDirectives {
        &self.directives
    }

    /// Copy of this configuration with the UI toolkit switched on
    pub fn with_ui_toolkit(&self) -> Self {
        Self {
            use_ui_toolkit: true,
            ..self.clone()
        }
    }
}

/// Builder for [`BuildConfiguration`]
///
/// # Examples
///
/// ```no_run
/// use kodegen_bundler_native::model::BuildConfiguration;
///
/// let config = BuildConfiguration::builder()
///     .app_name("hello")
///     .main_class("hello/com.example.Hello")
///     .graalvm_home("/opt/graalvm")
///     .build()
///     .unwrap();
/// assert_eq!(config.main_class(), "com.example.Hello");
/// ```
#[derive(Debug, Default)]
pub struct BuildConfigurationBuilder {
    app_name: Option<String>,
    main_class: Option<String>,
    graalvm_home: Option<PathBuf>,
    runtime_version: Option<String>,
    ui_toolkit_version: Option<String>,
    use_jni: Option<bool>,
    use_ui_toolkit: bool,
    host: Option<Triplet>,
    target: Option<Triplet>,
    check_hash: Option<bool>,
    verbose: bool,
    cache_root: Option<PathBuf>,
    download_url: Option<String>,
    custom_runtime_libs: Option<PathBuf>,
    linker: Option<PathBuf>,
    compiler_args: Vec<String>,
    linker_args: Vec<String>,
    runtime_args: Vec<String>,
    directives: CompileDirectives,
}

impl BuildConfigurationBuilder {
    /// Set the application name
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    /// Set the main class, optionally prefixed with `module/`
    pub fn main_class(mut self, main_class: impl Into<String>) -> Self {
        self.main_class = Some(main_class.into());
        self
    }

    /// Set the runtime SDK root
    pub fn graalvm_home(mut self, path: impl Into<PathBuf>) -> Self {
        self.graalvm_home = Some(path.into());
        self
    }

    /// Set the runtime static SDK version
    pub fn runtime_version(mut self, version: impl Into<String>) -> Self {
        self.runtime_version = Some(version.into());
        self
    }

    /// Set the UI toolkit static SDK version
    pub fn ui_toolkit_version(mut self, version: impl Into<String>) -> Self {
        self.ui_toolkit_version = Some(version.into());
        self
    }

    /// Enable or disable the runtime static libraries (enabled by default)
    pub fn use_jni(mut self, enabled: bool) -> Self {
        self.use_jni = Some(enabled);
        self
    }

    /// Enable or disable the UI toolkit static SDK
    pub fn use_ui_toolkit(mut self, enabled: bool) -> Self {
        self.use_ui_toolkit = enabled;
        self
    }

    /// Override the host triplet (detected by default)
    pub fn host(mut self, host: Triplet) -> Self {
        self.host = Some(host);
        self
    }

    /// Set the target triplet (host by default)
    pub fn target(mut self, target: Triplet) -> Self {
        self.target = Some(target);
        self
    }

    /// Enable or disable cache checksum verification (enabled by default)
    pub fn check_hash(mut self, enabled: bool) -> Self {
        self.check_hash = Some(enabled);
        self
    }

    /// Verbose tool output
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Set the bundle cache root
    pub fn cache_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_root = Some(path.into());
        self
    }

    /// Set the base download URL
    pub fn download_url(mut self, url: impl Into<String>) -> Self {
        self.download_url = Some(url.into());
        self
    }

    /// Use runtime static libraries from a local directory
    pub fn custom_runtime_libs(mut self, path: impl Into<PathBuf>) -> Self {
        self.custom_runtime_libs = Some(path.into());
        self
    }

    /// Use a specific linker executable
    pub fn linker(mut self, path: impl Into<PathBuf>) -> Self {
        self.linker = Some(path.into());
        self
    }

    /// Append native-image arguments
    pub fn compiler_args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.compiler_args.extend(args);
        self
    }

    /// Append linker arguments
    pub fn linker_args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.linker_args.extend(args);
        self
    }

    /// Append application arguments
    pub fn runtime_args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.runtime_args.extend(args);
        self
    }

    /// Set compiler directives
    pub fn directives(mut self, directives: CompileDirectives) -> Self {
        self.directives = directives;
        self
    }

    /// Validate and build the configuration
    pub fn build(self) -> Result<BuildConfiguration, ConfigError> {
        let main_class = normalize_main_class(self.main_class.as_deref())?;

        let graalvm_home = self
            .graalvm_home
            .ok_or(ConfigError::MissingSetting {
                setting: "graalvm_home",
            })?;

        let app_name = self
            .app_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_APP_NAME.to_string());
        if app_name.contains(['/', '\\']) {
            return Err(ConfigError::InvalidValue {
                setting: "app_name",
                reason: format!("'{app_name}' must not contain path separators"),
            });
        }

        let host = match self.host {
            Some(host) => host,
            None => Triplet::from_host()?,
        };
        let target = self.target.unwrap_or(host);

        let cache_root = match self.cache_root {
            Some(root) => root,
            None => default_cache_root()?,
        };

        let download_url = parse_download_url(
            self.download_url.as_deref().unwrap_or(DEFAULT_DOWNLOAD_URL),
        )?;

        Ok(BuildConfiguration {
            app_name,
            main_class,
            graalvm_home,
            runtime_version: self
                .runtime_version
                .unwrap_or_else(|| DEFAULT_RUNTIME_STATIC_VERSION.to_string()),
            ui_toolkit_version: self
                .ui_toolkit_version
                .unwrap_or_else(|| DEFAULT_UI_STATIC_VERSION.to_string()),
            use_jni: self.use_jni.unwrap_or(true),
            use_ui_toolkit: self.use_ui_toolkit,
            host,
            target,
            check_hash: self.check_hash.unwrap_or(true),
            verbose: self.verbose,
            cache_root,
            download_url,
            custom_runtime_libs: self.custom_runtime_libs,
            linker: self.linker,
            compiler_args: self.compiler_args,
            linker_args: self.linker_args,
            runtime_args: self.runtime_args,
            directives: self.directives,
        })
    }
}

/// Default bundle cache: the user cache directory
fn default_cache_root() -> Result<PathBuf, ConfigError> {
    dirs::cache_dir()
        .map(|dir| dir.join("kodegen_bundler_native"))
        .ok_or(ConfigError::MissingSetting {
            setting: "cache_root",
        })
}

/// Parse the base URL, making sure relative joins keep its last segment.
fn parse_download_url(raw: &str) -> Result<Url, ConfigError> {
    let with_slash = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    Url::parse(&with_slash).map_err(|e| ConfigError::InvalidValue {
        setting: "download_url",
        reason: e.to_string(),
    })
}
