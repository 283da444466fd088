//! Error types for native image builds.
//!
//! Every failure carries enough context (stage, tool, log location, offending
//! path) to tell the user what broke and where to look next.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::model::Os;
use crate::pipeline::{PipelineState, Stage};

/// Result type alias for build driver operations
pub type Result<T> = std::result::Result<T, NativeError>;

/// Main error type for all build driver operations
#[derive(Error, Debug)]
pub enum NativeError {
    /// Configuration could not be assembled
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Dependency bundle could not be provisioned
    #[error("Dependency error: {0}")]
    Dependency(#[from] DependencyError),

    /// A pipeline stage failed or was invoked out of order
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// CLI argument errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors from anyhow
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),
}

/// A filesystem operation failed on a known path.
///
/// Created by [`ErrorExt::fs_context`].
#[derive(Error, Debug)]
#[error("{context} {path}: {error}")]
pub struct FsError {
    /// What was being done, e.g. "creating cache directory"
    pub context: &'static str,
    /// Path that was being accessed
    pub path: PathBuf,
    /// The underlying I/O error
    #[source]
    pub error: io::Error,
}

/// Attach the operation and path to an I/O error.
///
/// # Examples
///
/// ```no_run
/// use kodegen_bundler_native::error::{ErrorExt, FsError};
///
/// fn prepare(dir: &std::path::Path) -> Result<(), FsError> {
///     std::fs::create_dir_all(dir).fs_context("creating directory", dir)?;
///     Ok(())
/// }
/// ```
pub trait ErrorExt<T> {
    /// Wrap the error with a description of the operation and the path involved.
    fn fs_context(self, context: &'static str, path: impl AsRef<Path>) -> std::result::Result<T, FsError>;
}

impl<T> ErrorExt<T> for std::result::Result<T, io::Error> {
    fn fs_context(self, context: &'static str, path: impl AsRef<Path>) -> std::result::Result<T, FsError> {
        self.map_err(|error| FsError {
            context,
            path: path.as_ref().to_path_buf(),
            error,
        })
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Host operating system is not one the driver can build on
    #[error("Unsupported platform '{os}'. Supported hosts are Linux, macOS and Windows.")]
    UnsupportedPlatform {
        /// Operating system name as reported by the host
        os: String,
    },

    /// Unknown target profile name
    #[error("Unknown target profile '{name}'")]
    UnknownProfile {
        /// Profile name as given
        name: String,
    },

    /// Main class was never set
    #[error("Main class is required")]
    MissingMainClass,

    /// A required setting is missing
    #[error("Missing required setting: {setting}")]
    MissingSetting {
        /// Setting name
        setting: &'static str,
    },

    /// A setting has an unusable value
    #[error("Invalid value for {setting}: {reason}")]
    InvalidValue {
        /// Setting name
        setting: &'static str,
        /// Reason for the error
        reason: String,
    },
}

/// Dependency provisioning errors
#[derive(Error, Debug)]
pub enum DependencyError {
    /// Request could not be sent or the body could not be read
    #[error("Download of {url} failed: {reason}")]
    Download {
        /// URL being fetched
        url: String,
        /// Reason for the error
        reason: String,
    },

    /// Server answered with a non-success status
    #[error("Download of {url} failed with HTTP status {status}")]
    HttpStatus {
        /// URL being fetched
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// Download URL could not be built
    #[error("Invalid download URL '{url}': {source}")]
    InvalidUrl {
        /// URL text
        url: String,
        /// Parse error
        #[source]
        source: url::ParseError,
    },

    /// Archive is unreadable or contains an unsafe entry
    #[error("Failed to extract {archive}: {reason}")]
    Extract {
        /// Archive path
        archive: PathBuf,
        /// Reason for the error
        reason: String,
    },

    /// Checksum side-file could not be written
    #[error("Failed to record checksums in {path}: {reason}")]
    Persist {
        /// Side-file path
        path: PathBuf,
        /// Reason for the error
        reason: String,
    },

    /// User-supplied runtime libraries are incomplete
    #[error("Custom runtime libraries at {path} are missing {member}")]
    CustomLibsMissing {
        /// Directory given by the user
        path: PathBuf,
        /// Missing member, or the directory itself
        member: String,
    },

    /// Bundle is still invalid after a fresh fetch
    #[error("{bundle} is still invalid after download: {reason}")]
    StillInvalid {
        /// Bundle description
        bundle: String,
        /// Validation result
        reason: String,
    },

    /// Filesystem failure
    #[error(transparent)]
    Fs(#[from] FsError),
}

/// Pipeline errors
#[derive(Error, Debug)]
pub enum PipelineError {
    /// No strategy can build for the requested target from this host
    #[error("Invalid target {target}: {reason}")]
    InvalidTarget {
        /// Target triplet
        target: String,
        /// Reason for the error
        reason: String,
    },

    /// Build invocation is not usable
    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration {
        /// Reason for the error
        reason: String,
    },

    /// Provisioning failed before linking
    #[error(transparent)]
    Dependency(#[from] DependencyError),

    /// External tool exited unsuccessfully
    #[error("{stage} failed with exit code {code}{}. See {}", cause.as_deref().map(|c| format!(" ({c})")).unwrap_or_default(), log.display())]
    StageFailure {
        /// Stage that failed
        stage: Stage,
        /// Exit code, or the sentinel when the tool never ran
        code: i32,
        /// Log holding the tool output
        log: PathBuf,
        /// Extra detail when known
        cause: Option<String>,
    },

    /// User interrupted a running tool
    #[error("{stage} was interrupted. See {}", log.display())]
    Interrupted {
        /// Stage that was running
        stage: Stage,
        /// Error log of the interrupted tool
        log: PathBuf,
    },

    /// Application output did not end with the expected line
    #[error("Run produced unexpected output: expected '{expected}', got '{}'", actual.as_deref().unwrap_or("<no output>"))]
    UnexpectedOutput {
        /// Expected last line
        expected: String,
        /// Actual last line
        actual: Option<String>,
        /// Captured output
        log: PathBuf,
    },

    /// Stage requested in the wrong order
    #[error("Cannot start {stage} while the pipeline is {state}")]
    OutOfOrder {
        /// Stage requested
        stage: Stage,
        /// Current state
        state: PipelineState,
    },

    /// Strategy has no way to perform this stage
    #[error("{stage} is not supported for {os} targets on this host")]
    Unsupported {
        /// Stage requested
        stage: Stage,
        /// Target operating system
        os: Os,
    },

    /// A required external tool is not installed
    #[error("Required tool '{tool}' was not found: {reason}")]
    ToolNotFound {
        /// Stage that needed the tool
        stage: Stage,
        /// Tool name or path
        tool: String,
        /// Reason for the error
        reason: String,
    },

    /// Filesystem failure
    #[error(transparent)]
    Fs(#[from] FsError),

    /// JSON serialization failure while writing compiler directives
    #[error("Failed to write {}: {source}", path.display())]
    Directives {
        /// Directive file
        path: PathBuf,
        /// Serializer error
        #[source]
        source: serde_json::Error,
    },
}

impl PipelineError {
    /// Stage this error belongs to, when it belongs to one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::StageFailure { stage, .. }
            | PipelineError::Interrupted { stage, .. }
            | PipelineError::OutOfOrder { stage, .. }
            | PipelineError::Unsupported { stage, .. }
            | PipelineError::ToolNotFound { stage, .. } => Some(*stage),
            PipelineError::Dependency(_) => Some(Stage::Provision),
            PipelineError::UnexpectedOutput { .. } => Some(Stage::Run),
            _ => None,
        }
    }

    /// Log file the user should read, if one exists.
    pub fn log_path(&self) -> Option<&Path> {
        match self {
            PipelineError::StageFailure { log, .. }
            | PipelineError::Interrupted { log, .. }
            | PipelineError::UnexpectedOutput { log, .. } => Some(log),
            _ => None,
        }
    }
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },
}

impl NativeError {
    /// Get actionable recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            NativeError::Config(ConfigError::UnsupportedPlatform { .. }) => vec![
                "Build on a Linux, macOS or Windows host".to_string(),
            ],
            NativeError::Config(ConfigError::MissingMainClass) => vec![
                "Pass --main-class with the fully qualified name of the entry class".to_string(),
            ],
            NativeError::Config(ConfigError::UnknownProfile { .. }) => vec![
                "Use one of: host, linux, linux-aarch64, macos, windows, ios, ios-sim, android"
                    .to_string(),
            ],
            NativeError::Dependency(DependencyError::HttpStatus { url, .. })
            | NativeError::Dependency(DependencyError::Download { url, .. }) => vec![
                format!("Check that {url} is reachable from this machine"),
                "Override the mirror with --download-url".to_string(),
                "Point --runtime-libs at a local copy of the static libraries".to_string(),
            ],
            NativeError::Dependency(DependencyError::CustomLibsMissing { path, .. }) => vec![
                format!("Verify the static libraries are present in {}", path.display()),
            ],
            NativeError::Pipeline(PipelineError::ToolNotFound { tool, .. }) => vec![
                format!("Install '{tool}' or put it on PATH"),
                "Select another linker with --linker".to_string(),
            ],
            NativeError::Pipeline(PipelineError::InvalidTarget { .. }) => vec![
                "Linux hosts can build for linux and android".to_string(),
                "macOS hosts can build for macos, ios and ios-sim".to_string(),
            ],
            NativeError::Pipeline(error) => match error.log_path() {
                Some(log) => vec![format!("Inspect the tool output in {}", log.display())],
                None => vec!["Check the error message above for specific details".to_string()],
            },
            _ => vec!["Check the error message above for specific details".to_string()],
        }
    }

    /// Whether the error must end the whole invocation immediately.
    ///
    /// Any failure of the link stage is fatal. A link requested out of order
    /// never started, so it is not.
    pub fn is_fatal(&self) -> bool {
        match self {
            NativeError::Pipeline(PipelineError::OutOfOrder { .. }) => false,
            NativeError::Pipeline(error) => error.stage() == Some(Stage::Link),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fs_context_keeps_path() {
        let result: std::result::Result<(), io::Error> =
            Err(io::Error::new(io::ErrorKind::NotFound, "gone"));
        let error = result.fs_context("reading checksum file", "/tmp/x.md5").unwrap_err();
        assert_eq!(error.path, PathBuf::from("/tmp/x.md5"));
        assert!(error.to_string().starts_with("reading checksum file /tmp/x.md5"));
    }

    #[test]
    fn link_failure_is_fatal() {
        let error = NativeError::from(PipelineError::StageFailure {
            stage: Stage::Link,
            code: 1,
            log: PathBuf::from("link.log"),
            cause: None,
        });
        assert!(error.is_fatal());

        let error = NativeError::from(PipelineError::StageFailure {
            stage: Stage::Compile,
            code: 1,
            log: PathBuf::from("compile.log"),
            cause: None,
        });
        assert!(!error.is_fatal());
    }

    #[test]
    fn missing_linker_is_fatal() {
        let missing = |stage| {
            NativeError::from(PipelineError::ToolNotFound {
                stage,
                tool: "cc".to_string(),
                reason: "cannot find binary path".to_string(),
            })
        };
        assert!(missing(Stage::Link).is_fatal());
        assert!(!missing(Stage::Compile).is_fatal());

        let early = NativeError::from(PipelineError::OutOfOrder {
            stage: Stage::Link,
            state: PipelineState::NotStarted,
        });
        assert!(!early.is_fatal());
    }

    #[test]
    fn stage_failure_message_names_log() {
        let error = PipelineError::StageFailure {
            stage: Stage::Compile,
            code: 137,
            log: PathBuf::from("/build/gvm/log/process-compile.log"),
            cause: Some("killed".to_string()),
        };
        let message = error.to_string();
        assert!(message.contains("137"));
        assert!(message.contains("(killed)"));
        assert!(message.contains("process-compile.log"));
        assert_eq!(error.stage(), Some(Stage::Compile));
    }
}
