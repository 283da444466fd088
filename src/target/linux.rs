//! Linux desktop target.

use std::path::PathBuf;

use super::common::{self, CompileFlags, LinkPlan};
use super::{BuildContext, TargetConfiguration};
use crate::deps::ProvisionReport;
use crate::error::PipelineError;
use crate::model::{Arch, ClassPath, CompileDirectives, Triplet};
use crate::process::ProcessOutcome;

const RUNTIME_LIBS: &[&str] = &["-ljava", "-lnio", "-lzip", "-lnet", "-lprefs"];
const UI_TOOLKIT_LIBS: &[&str] = &["-lprism_es2", "-lglass", "-ljavafx_font", "-ljavafx_iio"];
const SYSTEM_LIBS: &[&str] = &["-lz", "-ldl", "-lstdc++", "-lpthread"];

/// Builds ELF executables with gcc
#[derive(Debug, Clone)]
pub struct LinuxTarget {
    platform: &'static str,
}

impl LinuxTarget {
    /// Strategy for a Linux target
    pub fn new(target: &Triplet) -> Self {
        let platform = match target.arch() {
            Arch::Amd64 => "LINUX_AMD64",
            Arch::Arm64 | Arch::Aarch64 => "LINUX_AARCH64",
        };
        Self { platform }
    }

    fn compile_flags(&self, ctx: &BuildContext) -> CompileFlags {
        let mut target_args = Vec::new();
        if common::is_cross_arch(ctx) {
            target_args.push("-H:CompilerBackend=llvm".to_string());
            target_args.push("-H:-SpawnIsolates".to_string());
        }
        CompileFlags {
            command: "native-image",
            platform: self.platform,
            target_args,
        }
    }

    fn link_plan(
        &self,
        ctx: &BuildContext,
        provisioned: &ProvisionReport,
    ) -> Result<LinkPlan, PipelineError> {
        let config = ctx.config();
        let linker = common::resolve_linker(ctx, "gcc")?;
        let object = common::object_file(ctx, "o")?;
        let output = common::app_output(ctx, "", "");

        let mut args = vec![
            "-o".to_string(),
            output.display().to_string(),
            "-rdynamic".to_string(),
            object.display().to_string(),
        ];
        args.extend(
            common::library_dirs(ctx, &provisioned.lib_dirs())
                .iter()
                .map(|dir| format!("-L{}", dir.display())),
        );
        args.push("-Wl,-Bstatic".to_string());
        if config.use_jni() {
            args.extend(RUNTIME_LIBS.iter().map(|s| s.to_string()));
        }
        if config.use_ui_toolkit() {
            args.extend(UI_TOOLKIT_LIBS.iter().map(|s| s.to_string()));
        }
        args.push("-ljvm".to_string());
        args.push("-llibchelper".to_string());
        args.push("-Wl,-Bdynamic".to_string());
        args.extend(SYSTEM_LIBS.iter().map(|s| s.to_string()));

        Ok(LinkPlan {
            linker,
            args,
            output,
        })
    }

    fn binary(&self, ctx: &BuildContext) -> PathBuf {
        common::app_output(ctx, "", "")
    }
}

impl TargetConfiguration for LinuxTarget {
    fn name(&self) -> &'static str {
        "linux"
    }

    async fn compile(
        &self,
        ctx: &BuildContext,
        classpath: &ClassPath,
        directives: &CompileDirectives,
    ) -> Result<ProcessOutcome, PipelineError> {
        common::compile(ctx, classpath, directives, &self.compile_flags(ctx), "o").await
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
        common::run_binary(ctx, &self.binary(ctx), false).await
    }

    async fn run_until_end(&self, ctx: &BuildContext) -> Result<ProcessOutcome, PipelineError> {
        common::run_binary(ctx, &self.binary(ctx), true).await
    }
}
