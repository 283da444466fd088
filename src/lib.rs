//! # Kodegen Native Bundler
//!
//! Ahead-of-time builds of Java applications into native executables.
//!
//! A build runs through fixed stages: the classpath is compiled into an
//! object file by `native-image`, the static SDK bundles the link needs are
//! provisioned into a checksum-verified cache, the object file is linked
//! with the platform's native toolchain, and the result can be packaged and
//! run. Each target OS supplies its own strategy for those stages.
//!
//! ## Usage
//!
//! ```bash
//! kodegen_bundler_native --classpath app.jar --graalvm /opt/graalvm --main-class com.example.Main
//! kodegen_bundler_native --step link --target android ...
//! kodegen_bundler_native --expected 'Hello World!' ...
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod cli;
pub mod deps;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod process;
pub mod target;

pub use cli::Args;
pub use deps::{FileDeps, ProvisionReport, Validity};
pub use error::{CliError, ConfigError, DependencyError, NativeError, PipelineError, Result};
pub use model::{BuildConfiguration, ClassPath, Os, Profile, Triplet};
pub use pipeline::{PipelineState, Stage, Step, SubstrateDispatcher};
pub use process::{ProcessOutcome, ProcessRunner};
pub use target::{BuildContext, PlatformTarget, TargetConfiguration};
