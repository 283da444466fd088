//! Per-OS build strategies.
//!
//! A [`TargetConfiguration`] knows how to compile, link, package and run for
//! one target operating system. [`for_triplet`] selects the strategy for a
//! configuration's target, refusing combinations the host cannot build.

mod android;
mod common;
mod ios;
pub mod launch;
mod linux;
mod macos;
mod windows;

use std::path::PathBuf;

pub use android::AndroidTarget;
pub use ios::IosTarget;
pub use linux::LinuxTarget;
pub use macos::MacOsTarget;
pub use windows::WindowsTarget;

use crate::deps::ProvisionReport;
use crate::error::PipelineError;
use crate::model::{BuildConfiguration, ClassPath, CompileDirectives, Os, ProcessPaths, Triplet};
use crate::process::ProcessOutcome;

/// Read-only state shared by every stage of one pipeline run
#[derive(Debug, Clone)]
pub struct BuildContext {
    config: BuildConfiguration,
    paths: ProcessPaths,
}

impl BuildContext {
    /// Context for building `config` under `build_root`
    pub fn new(build_root: impl Into<PathBuf>, config: BuildConfiguration) -> Self {
        let paths = ProcessPaths::new(build_root, config.target());
        Self { config, paths }
    }

    /// Build configuration
    pub fn config(&self) -> &BuildConfiguration {
        &self.config
    }

    /// Directory layout
    pub fn paths(&self) -> &ProcessPaths {
        &self.paths
    }

    pub(crate) fn replace_config(&mut self, config: BuildConfiguration) {
        self.config = config;
    }
}

/// Strategy for building and running on one target OS.
///
/// Stage methods return the tool's [`ProcessOutcome`]; a non-zero exit is
/// not an error here, the dispatcher decides what it means. Errors are
/// reserved for problems that prevent the tool from running at all.
#[allow(async_fn_in_trait)]
pub trait TargetConfiguration {
    /// Short name for messages
    fn name(&self) -> &'static str;

    /// Compile the classpath into an object file
    async fn compile(
        &self,
        ctx: &BuildContext,
        classpath: &ClassPath,
        directives: &CompileDirectives,
    ) -> Result<ProcessOutcome, PipelineError>;

    /// Link the object file against the provisioned bundles
    async fn link(
        &self,
        ctx: &BuildContext,
        provisioned: &ProvisionReport,
    ) -> Result<ProcessOutcome, PipelineError>;

    /// Package the linked output; nothing to do by default
    async fn package(&self, ctx: &BuildContext) -> Result<ProcessOutcome, PipelineError> {
        Ok(ProcessOutcome::skipped("package", ctx.paths().log()))
    }

    /// Run the application, capturing its output in the run log
    async fn run(&self, ctx: &BuildContext) -> Result<ProcessOutcome, PipelineError>;

    /// Run the application with output forwarded to the terminal
    async fn run_until_end(&self, ctx: &BuildContext) -> Result<ProcessOutcome, PipelineError>;
}

/// Strategy chosen from the target OS
#[derive(Debug, Clone)]
pub enum PlatformTarget {
    /// Linux desktop
    Linux(LinuxTarget),
    /// macOS desktop
    MacOs(MacOsTarget),
    /// Windows desktop
    Windows(WindowsTarget),
    /// iOS device or simulator
    Ios(IosTarget),
    /// Android
    Android(AndroidTarget),
}

/// Select the strategy for building `target` on `host`.
///
/// # Examples
///
/// ```
/// use kodegen_bundler_native::model::{Profile, Triplet};
/// use kodegen_bundler_native::target::for_triplet;
///
/// let linux = Triplet::from_profile(Profile::Linux);
/// assert!(for_triplet(&linux, &Triplet::from_profile(Profile::Android)).is_ok());
/// assert!(for_triplet(&linux, &Triplet::from_profile(Profile::Ios)).is_err());
/// ```
pub fn for_triplet(host: &Triplet, target: &Triplet) -> Result<PlatformTarget, PipelineError> {
    if !host.can_compile_to(target) {
        return Err(PipelineError::InvalidTarget {
            target: target.to_string(),
            reason: format!("cannot be built on a {} host", host.os()),
        });
    }

    Ok(match target.os() {
        Os::Linux => PlatformTarget::Linux(LinuxTarget::new(target)),
        Os::Darwin => PlatformTarget::MacOs(MacOsTarget::new(target)),
        Os::Windows => PlatformTarget::Windows(WindowsTarget::new(target)?),
        Os::Ios => PlatformTarget::Ios(IosTarget::new(target)),
        Os::Android => PlatformTarget::Android(AndroidTarget::new(target)?),
    })
}

macro_rules! delegate {
    ($self:ident, $target:ident => $call:expr) => {
        match $self {
            PlatformTarget::Linux($target) => $call,
            PlatformTarget::MacOs($target) => $call,
            PlatformTarget::Windows($target) => $call,
            PlatformTarget::Ios($target) => $call,
            PlatformTarget::Android($target) => $call,
        }
    };
}

impl TargetConfiguration for PlatformTarget {
    fn name(&self) -> &'static str {
        delegate!(self, t => t.name())
    }

    async fn compile(
        &self,
        ctx: &BuildContext,
        classpath: &ClassPath,
        directives: &CompileDirectives,
    ) -> Result<ProcessOutcome, PipelineError> {
        delegate!(self, t => t.compile(ctx, classpath, directives).await)
    }

    async fn link(
        &self,
        ctx: &BuildContext,
        provisioned: &ProvisionReport,
    ) -> Result<ProcessOutcome, PipelineError> {
        delegate!(self, t => t.link(ctx, provisioned).await)
    }

    async fn package(&self, ctx: &BuildContext) -> Result<ProcessOutcome, PipelineError> {
        delegate!(self, t => t.package(ctx).await)
    }

    async fn run(&self, ctx: &BuildContext) -> Result<ProcessOutcome, PipelineError> {
        delegate!(self, t => t.run(ctx).await)
    }

    async fn run_until_end(&self, ctx: &BuildContext) -> Result<ProcessOutcome, PipelineError> {
        delegate!(self, t => t.run_until_end(ctx).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Profile;

    #[test]
    fn registry_covers_supported_pairs() {
        let linux = Triplet::from_profile(Profile::Linux);
        let mac = Triplet::from_profile(Profile::MacOs);

        let pick = |host: &Triplet, profile| {
            for_triplet(host, &Triplet::from_profile(profile)).map(|t| t.name())
        };
        assert_eq!(pick(&linux, Profile::Linux).unwrap(), "linux");
        assert_eq!(pick(&linux, Profile::LinuxAarch64).unwrap(), "linux");
        assert_eq!(pick(&linux, Profile::Android).unwrap(), "android");
        assert_eq!(pick(&mac, Profile::MacOs).unwrap(), "macos");
        assert_eq!(pick(&mac, Profile::IosSim).unwrap(), "ios-sim");
        assert!(matches!(
            pick(&linux, Profile::Windows),
            Err(PipelineError::InvalidTarget { .. })
        ));
    }
}
