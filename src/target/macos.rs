//! macOS desktop target.

use super::common::{self, CompileFlags, LinkPlan};
use super::{BuildContext, TargetConfiguration};
use crate::deps::ProvisionReport;
use crate::error::PipelineError;
use crate::model::{Arch, ClassPath, CompileDirectives, Triplet};
use crate::process::ProcessOutcome;

const RUNTIME_LIBS: &[&str] = &["-ljava", "-lnio", "-lzip", "-lnet", "-lprefs"];
const FRAMEWORKS: &[&str] = &["Foundation", "CoreFoundation", "CoreServices"];
const UI_TOOLKIT_LIBS: &[&str] = &["-lprism_es2", "-lglass", "-ljavafx_font", "-ljavafx_iio"];
const UI_FRAMEWORKS: &[&str] = &["AppKit", "ApplicationServices", "OpenGL", "QuartzCore", "Security"];

/// Builds Mach-O executables with clang
#[derive(Debug, Clone)]
pub struct MacOsTarget {
    platform: &'static str,
}

impl MacOsTarget {
    /// Strategy for a macOS target
    pub fn new(target: &Triplet) -> Self {
        let platform = match target.arch() {
            Arch::Amd64 => "MACOS_AMD64",
            Arch::Arm64 | Arch::Aarch64 => "MACOS_AARCH64",
        };
        Self { platform }
    }

    fn link_plan(
        &self,
        ctx: &BuildContext,
        provisioned: &ProvisionReport,
    ) -> Result<LinkPlan, PipelineError> {
        let config = ctx.config();
        let linker = common::resolve_linker(ctx, "clang")?;
        let object = common::object_file(ctx, "o")?;
        let output = common::app_output(ctx, "", "");

        let mut args = vec![
            "-o".to_string(),
            output.display().to_string(),
            object.display().to_string(),
        ];
        args.extend(
            common::library_dirs(ctx, &provisioned.lib_dirs())
                .iter()
                .map(|dir| format!("-L{}", dir.display())),
        );
        if config.use_jni() {
            args.extend(RUNTIME_LIBS.iter().map(|s| s.to_string()));
        }
        args.push("-ljvm".to_string());
        args.push("-llibchelper".to_string());
        args.extend(FRAMEWORKS.iter().map(|f| format!("-Wl,-framework,{f}")));
        if config.use_ui_toolkit() {
            args.extend(UI_TOOLKIT_LIBS.iter().map(|s| s.to_string()));
            args.extend(UI_FRAMEWORKS.iter().map(|f| format!("-Wl,-framework,{f}")));
        }
        args.extend(["-lz", "-lpthread", "-lobjc"].map(String::from));

        Ok(LinkPlan {
            linker,
            args,
            output,
        })
    }
}

impl TargetConfiguration for MacOsTarget {
    fn name(&self) -> &'static str {
        "macos"
    }

    async fn compile(
        &self,
        ctx: &BuildContext,
        classpath: &ClassPath,
        directives: &CompileDirectives,
    ) -> Result<ProcessOutcome, PipelineError> {
        let flags = CompileFlags {
            command: "native-image",
            platform: self.platform,
            target_args: Vec::new(),
        };
        common::compile(ctx, classpath, directives, &flags, "o").await
    }

    async fn link(
        &self,
        ctx: &BuildContext,
        provisioned: &ProvisionReport,
    ) -> Result<ProcessOutcome, PipelineError> {
        let plan = self.link_plan(ctx, provisioned)?;
        common::link(ctx, plan).await
    }

    async fn run(&self, ctx: &BuildContext) -> Result<ProcessOutcome, PipelineError> {
        common::run_binary(ctx, &common::app_output(ctx, "", ""), false).await
    }

    async fn run_until_end(&self, ctx: &BuildContext) -> Result<ProcessOutcome, PipelineError> {
        common::run_binary(ctx, &common::app_output(ctx, "", ""), true).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Arch, Os, Vendor};

    #[test]
    fn apple_silicon_platform() {
        let target = MacOsTarget::new(&Triplet::new(Arch::Arm64, Vendor::Apple, Os::Darwin));
        assert_eq!(target.platform, "MACOS_AARCH64");
    }
}
