//! Windows desktop target.

use super::common::{self, CompileFlags, LinkPlan};
use super::{BuildContext, TargetConfiguration};
use crate::deps::ProvisionReport;
use crate::error::PipelineError;
use crate::model::{Arch, ClassPath, CompileDirectives, Triplet};
use crate::process::ProcessOutcome;

const RUNTIME_LIBS: &[&str] = &["java.lib", "nio.lib", "zip.lib", "net.lib", "prefs.lib"];
const SYSTEM_LIBS: &[&str] = &[
    "advapi32.lib",
    "iphlpapi.lib",
    "secur32.lib",
    "userenv.lib",
    "version.lib",
    "ws2_32.lib",
    "winhttp.lib",
];
const UI_TOOLKIT_LIBS: &[&str] = &["prism_d3d.lib", "glass.lib", "javafx_font.lib", "javafx_iio.lib"];

/// Builds PE executables with the MSVC linker
#[derive(Debug, Clone)]
pub struct WindowsTarget;

impl WindowsTarget {
    /// Strategy for a Windows target; only x86_64 is supported
    pub fn new(target: &Triplet) -> Result<Self, PipelineError> {
        match target.arch() {
            Arch::Amd64 => Ok(Self),
            other => Err(PipelineError::InvalidTarget {
                target: target.to_string(),
                reason: format!("{} is not supported on Windows", other.as_str()),
            }),
        }
    }

    fn link_plan(
        &self,
        ctx: &BuildContext,
        provisioned: &ProvisionReport,
    ) -> Result<LinkPlan, PipelineError> {
        let config = ctx.config();
        let linker = common::resolve_linker(ctx, "link")?;
        let object = common::object_file(ctx, "obj")?;
        let output = common::app_output(ctx, "", ".exe");

        let mut args = vec![
            "/NOLOGO".to_string(),
            object.display().to_string(),
            format!("/OUT:{}", output.display()),
        ];
        args.extend(
            common::library_dirs(ctx, &provisioned.lib_dirs())
                .iter()
                .map(|dir| format!("/LIBPATH:{}", dir.display())),
        );
        if config.use_jni() {
            args.extend(RUNTIME_LIBS.iter().map(|s| s.to_string()));
        }
        if config.use_ui_toolkit() {
            args.extend(UI_TOOLKIT_LIBS.iter().map(|s| s.to_string()));
        }
        args.push("jvm.lib".to_string());
        args.push("libchelper.lib".to_string());
        args.extend(SYSTEM_LIBS.iter().map(|s| s.to_string()));

        Ok(LinkPlan {
            linker,
            args,
            output,
        })
    }
}

impl TargetConfiguration for WindowsTarget {
    fn name(&self) -> &'static str {
        "windows"
    }

    async fn compile(
        &self,
        ctx: &BuildContext,
        classpath: &ClassPath,
        directives: &CompileDirectives,
    ) -> Result<ProcessOutcome, PipelineError> {
        let flags = CompileFlags {
            command: "native-image.cmd",
            platform: "WINDOWS_AMD64",
            target_args: Vec::new(),
        };
        common::compile(ctx, classpath, directives, &flags, "obj").await
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
        common::run_binary(ctx, &common::app_output(ctx, "", ".exe"), false).await
    }

    async fn run_until_end(&self, ctx: &BuildContext) -> Result<ProcessOutcome, PipelineError> {
        common::run_binary(ctx, &common::app_output(ctx, "", ".exe"), true).await
    }
}
