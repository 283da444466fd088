//! Android target.
//!
//! The image becomes a shared library (`lib<app>.so`) linked with the NDK
//! clang for the target API level. The NDK is located through
//! `ANDROID_NDK` unless a linker is configured explicitly.

use std::path::PathBuf;

use super::common::{self, CompileFlags, LinkPlan};
use super::{BuildContext, TargetConfiguration};
use crate::deps::ProvisionReport;
use crate::error::PipelineError;
use crate::model::{Arch, ClassPath, CompileDirectives, Triplet};
use crate::pipeline::Stage;
use crate::process::ProcessOutcome;

const API_LEVEL: u32 = 21;
const RUNTIME_LIBS: &[&str] = &["-ljava", "-lnio", "-lzip", "-lnet", "-lprefs"];
const SYSTEM_LIBS: &[&str] = &["-llog", "-landroid", "-lz", "-ldl", "-lm"];

/// Builds Android shared libraries
#[derive(Debug, Clone)]
pub struct AndroidTarget;

impl AndroidTarget {
    /// Strategy for an Android target; only aarch64 is supported
    pub fn new(target: &Triplet) -> Result<Self, PipelineError> {
        match target.arch() {
            Arch::Aarch64 | Arch::Arm64 => Ok(Self),
            other => Err(PipelineError::InvalidTarget {
                target: target.to_string(),
                reason: format!("{} is not supported on Android", other.as_str()),
            }),
        }
    }

    /// NDK clang for the target API level, when `ANDROID_NDK` is set
    fn ndk_clang() -> Option<PathBuf> {
        let ndk = std::env::var_os("ANDROID_NDK")?;
        let host = if cfg!(target_os = "macos") { "darwin-x86_64" } else { "linux-x86_64" };
        Some(
            PathBuf::from(ndk)
                .join("toolchains/llvm/prebuilt")
                .join(host)
                .join("bin")
                .join(format!("aarch64-linux-android{API_LEVEL}-clang")),
        )
    }

    fn link_plan(
        &self,
        ctx: &BuildContext,
        provisioned: &ProvisionReport,
    ) -> Result<LinkPlan, PipelineError> {
        let config = ctx.config();
        let linker = match (config.linker(), Self::ndk_clang()) {
            (None, Some(clang)) if clang.is_file() => clang,
            _ => common::resolve_linker(ctx, "clang")?,
        };
        let object = common::object_file(ctx, "o")?;
        let output = common::app_output(ctx, "lib", ".so");

        let mut args = vec![
            "-shared".to_string(),
            "-fPIC".to_string(),
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
        args.extend(SYSTEM_LIBS.iter().map(|s| s.to_string()));

        Ok(LinkPlan {
            linker,
            args,
            output,
        })
    }
}

impl TargetConfiguration for AndroidTarget {
    fn name(&self) -> &'static str {
        "android"
    }

    async fn compile(
        &self,
        ctx: &BuildContext,
        classpath: &ClassPath,
        directives: &CompileDirectives,
    ) -> Result<ProcessOutcome, PipelineError> {
        let flags = CompileFlags {
            command: "native-image",
            // Android shares the Linux aarch64 platform definition
            platform: "LINUX_AARCH64",
            target_args: vec![
                "-H:CompilerBackend=llvm".to_string(),
                "-H:-SpawnIsolates".to_string(),
                "-Dsvm.targetName=android".to_string(),
            ],
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
        Err(PipelineError::Unsupported {
            stage: Stage::Run,
            os: ctx.config().target().os(),
        })
    }

    async fn run_until_end(&self, ctx: &BuildContext) -> Result<ProcessOutcome, PipelineError> {
        self.run(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Os, Vendor};

    #[test]
    fn only_arm_is_supported() {
        assert!(AndroidTarget::new(&Triplet::new(Arch::Aarch64, Vendor::Linux, Os::Android)).is_ok());
        assert!(AndroidTarget::new(&Triplet::new(Arch::Amd64, Vendor::Linux, Os::Android)).is_err());
    }
}
