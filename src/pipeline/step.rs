//! Stages, requested steps and pipeline state.

use std::fmt;
use std::str::FromStr;

use crate::error::CliError;

/// Unit of work inside a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Ahead-of-time compilation into an object file
    Compile,
    /// Static SDK bundle provisioning
    Provision,
    /// Linking the object file into an executable or library
    Link,
    /// Target specific packaging of the linked output
    Package,
    /// Running the linked application on the host
    Run,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Compile => "compile",
            Stage::Provision => "provision",
            Stage::Link => "link",
            Stage::Package => "package",
            Stage::Run => "run",
        })
    }
}

/// How far a build should go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    /// Stop after compiling
    Compile,
    /// Stop after linking
    Link,
    /// Stop after packaging
    Package,
    /// Build and run
    Run,
}

impl Step {
    /// The step that must complete before this one, if any
    pub fn previous(&self) -> Option<Step> {
        match self {
            Step::Compile => None,
            Step::Link => Some(Step::Compile),
            Step::Package => Some(Step::Link),
            Step::Run => Some(Step::Package),
        }
    }

    /// Whether reaching this step requires `other` to run
    ///
    /// # Examples
    ///
    /// ```
    /// use kodegen_bundler_native::pipeline::Step;
    ///
    /// assert!(Step::Run.requires(Step::Compile));
    /// assert!(!Step::Link.requires(Step::Package));
    /// ```
    pub fn requires(&self, other: Step) -> bool {
        let mut current = Some(*self);
        while let Some(step) = current {
            if step == other {
                return true;
            }
            current = step.previous();
        }
        false
    }
}

impl FromStr for Step {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compile" => Ok(Step::Compile),
            "link" => Ok(Step::Link),
            "package" => Ok(Step::Package),
            "run" => Ok(Step::Run),
            other => Err(CliError::InvalidArguments {
                reason: format!("unknown step '{other}', expected compile, link, package or run"),
            }),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Step::Compile => "compile",
            Step::Link => "link",
            Step::Package => "package",
            Step::Run => "run",
        })
    }
}

/// Where a pipeline run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Nothing has run
    NotStarted,
    /// Compiler is running
    Compiling,
    /// Object file produced
    Compiled,
    /// Bundles provisioned, linker running
    Linking,
    /// Executable produced
    Linked,
    /// Packaging hook ran
    Packaged,
    /// Application is running
    Running,
    /// Application ran to the end
    Finished,
    /// A stage failed; nothing later will start
    Failed(Stage),
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::NotStarted => f.write_str("not started"),
            PipelineState::Compiling => f.write_str("compiling"),
            PipelineState::Compiled => f.write_str("compiled"),
            PipelineState::Linking => f.write_str("linking"),
            PipelineState::Linked => f.write_str("linked"),
            PipelineState::Packaged => f.write_str("packaged"),
            PipelineState::Running => f.write_str("running"),
            PipelineState::Finished => f.write_str("finished"),
            PipelineState::Failed(stage) => write!(f, "failed at {stage}"),
        }
    }
}
