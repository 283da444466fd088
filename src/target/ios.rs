//! iOS device and simulator target.
//!
//! Images are compiled with the LLVM backend and linked with clang against
//! the iOS SDK. Running requires deploying to a device or simulator, which
//! is left to platform tooling.

use super::common::{self, CompileFlags, LinkPlan};
use super::{BuildContext, TargetConfiguration};
use crate::deps::ProvisionReport;
use crate::error::PipelineError;
use crate::model::{Arch, ClassPath, CompileDirectives, Triplet};
use crate::pipeline::Stage;
use crate::process::ProcessOutcome;

const MIN_IOS_VERSION: &str = "11.0";
const RUNTIME_LIBS: &[&str] = &["-ljava", "-lnio", "-lzip", "-lnet", "-lprefs"];
const FRAMEWORKS: &[&str] = &["Foundation", "UIKit", "CoreGraphics", "MobileCoreServices"];
const UI_TOOLKIT_LIBS: &[&str] = &["-lprism_es2", "-lglass", "-ljavafx_font", "-ljavafx_iio"];

/// Builds iOS executables
#[derive(Debug, Clone)]
pub struct IosTarget {
    simulator: bool,
}

impl IosTarget {
    /// Strategy for an iOS target; x86_64 means the simulator
    pub fn new(target: &Triplet) -> Self {
        Self {
            simulator: target.arch() == Arch::Amd64,
        }
    }

    fn platform(&self) -> &'static str {
        if self.simulator { "IOS_AMD64" } else { "IOS_AARCH64" }
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

        let (arch, min_version) = if self.simulator {
            ("x86_64", format!("-mios-simulator-version-min={MIN_IOS_VERSION}"))
        } else {
            ("arm64", format!("-miphoneos-version-min={MIN_IOS_VERSION}"))
        };

        let mut args = vec![
            "-w".to_string(),
            "-fPIC".to_string(),
            "-arch".to_string(),
            arch.to_string(),
            min_version,
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
        if config.use_ui_toolkit() {
            args.extend(UI_TOOLKIT_LIBS.iter().map(|s| s.to_string()));
        }
        args.push("-ljvm".to_string());
        args.push("-llibchelper".to_string());
        args.extend(FRAMEWORKS.iter().map(|f| format!("-Wl,-framework,{f}")));
        args.extend(["-lpthread", "-lz"].map(String::from));

        Ok(LinkPlan {
            linker,
            args,
            output,
        })
    }
}

impl TargetConfiguration for IosTarget {
    fn name(&self) -> &'static str {
        if self.simulator { "ios-sim" } else { "ios" }
    }

    async fn compile(
        &self,
        ctx: &BuildContext,
        classpath: &ClassPath,
        directives: &CompileDirectives,
    ) -> Result<ProcessOutcome, PipelineError> {
        let flags = CompileFlags {
            command: "native-image",
            platform: self.platform(),
            target_args: vec![
                "-H:CompilerBackend=llvm".to_string(),
                "-H:-SpawnIsolates".to_string(),
                "-H:PageSize=16384".to_string(),
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
