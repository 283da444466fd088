//! Compile, link and run steps shared by every target.
//!
//! Strategies describe what differs (compiler flags, linker and its
//! arguments, output name) and hand it to these helpers.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::BuildContext;
use crate::error::{ErrorExt, FsError, PipelineError};
use crate::model::{Arch, ClassPath, CompileDirectives, Os, Triplet};
use crate::pipeline::{Stage, directives};
use crate::process::{FAILURE_SENTINEL, ProcessOutcome, ProcessRunner};

const BASE_COMPILE_ARGS: &[&str] = &[
    "-Djdk.internal.lambda.eagerlyInitialize=false",
    "-H:+SharedLibrary",
    "-H:+AddAllCharsets",
    "-H:+ReportExceptionStackTraces",
    "-H:-DeadlockWatchdogExitOnTimeout",
    "-H:DeadlockWatchdogInterval=0",
    "-H:+ExitAfterRelocatableImageWrite",
];

/// What a target adds to the compiler invocation
#[derive(Debug, Clone)]
pub(crate) struct CompileFlags {
    /// Launcher name under `<graalvm>/bin`
    pub command: &'static str,
    /// `Platform` class the image is built for
    pub platform: &'static str,
    /// Target specific compiler options
    pub target_args: Vec<String>,
}

/// A resolved linker invocation
#[derive(Debug, Clone)]
pub(crate) struct LinkPlan {
    /// Linker executable
    pub linker: PathBuf,
    /// Arguments, without the user's extra linker arguments
    pub args: Vec<String>,
    /// File the linker produces
    pub output: PathBuf,
}

/// Run native-image and check that it produced the object file.
pub(crate) async fn compile(
    ctx: &BuildContext,
    classpath: &ClassPath,
    directives: &CompileDirectives,
    flags: &CompileFlags,
    object_extension: &str,
) -> Result<ProcessOutcome, PipelineError> {
    let config = ctx.config();
    let paths = ctx.paths();

    let native_image = config.graalvm_home().join("bin").join(flags.command);
    if !native_image.is_file() {
        return Err(PipelineError::ToolNotFound {
            stage: Stage::Compile,
            tool: native_image.display().to_string(),
            reason: "set --graalvm to a runtime SDK that ships native-image".to_string(),
        });
    }

    reset_dir(paths.tmp()).await?;

    let mut runner = ProcessRunner::new(&native_image, paths.log());
    runner.current_dir(paths.gvm());
    runner.args(BASE_COMPILE_ARGS);
    runner.arg(format!("-H:TempDirectory={}", paths.tmp().display()));
    runner.arg(format!(
        "-Dsvm.platform=org.graalvm.nativeimage.Platform${}",
        flags.platform
    ));
    if config.verbose() {
        runner.arg("--verbose");
    }
    runner.args(directives::write_directives(paths.gvm(), config.target(), directives).await?);
    runner.args(&flags.target_args);
    runner.args(config.compiler_args());
    runner.arg("-cp").arg(classpath.to_string());
    runner.arg(config.main_class());

    let outcome = runner.run("compile").await;
    if !outcome.success() {
        return Ok(outcome);
    }

    if find_object_file(ctx, object_extension).is_none() {
        return Err(PipelineError::StageFailure {
            stage: Stage::Compile,
            code: outcome.code,
            log: outcome.stderr_log,
            cause: Some(format!(
                "no {} object file was written to {}",
                object_name(config.main_class(), object_extension),
                paths.tmp().display()
            )),
        });
    }
    Ok(outcome)
}

/// Run the linker described by `plan`.
pub(crate) async fn link(ctx: &BuildContext, plan: LinkPlan) -> Result<ProcessOutcome, PipelineError> {
    let mut runner = ProcessRunner::new(&plan.linker, ctx.paths().log());
    runner.current_dir(ctx.paths().app());
    runner.args(&plan.args);
    runner.args(ctx.config().linker_args());

    let outcome = runner.run("link").await;
    if outcome.success() && !plan.output.is_file() {
        return Err(PipelineError::StageFailure {
            stage: Stage::Link,
            code: outcome.code,
            log: outcome.stderr_log,
            cause: Some(format!("linker did not produce {}", plan.output.display())),
        });
    }
    Ok(outcome)
}

/// Run the linked binary with the configured runtime arguments.
///
/// With `forward` the output goes straight to the terminal; otherwise it
/// is captured in the run log.
pub(crate) async fn run_binary(
    ctx: &BuildContext,
    binary: &Path,
    forward: bool,
) -> Result<ProcessOutcome, PipelineError> {
    if !binary.is_file() {
        return Err(PipelineError::StageFailure {
            stage: Stage::Run,
            code: FAILURE_SENTINEL,
            log: binary.to_path_buf(),
            cause: Some("the application has not been linked".to_string()),
        });
    }

    let mut runner = ProcessRunner::new(binary, ctx.paths().log());
    runner
        .current_dir(ctx.paths().app())
        .args(ctx.config().runtime_args())
        .forward_output(forward);
    Ok(runner.run("run").await)
}

/// Resolve the linker: the configured one, or `default`, looked up on PATH.
pub(crate) fn resolve_linker(ctx: &BuildContext, default: &str) -> Result<PathBuf, PipelineError> {
    let requested = ctx
        .config()
        .linker()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(default));
    which::which(&requested).map_err(|e| PipelineError::ToolNotFound {
        stage: Stage::Link,
        tool: requested.display().to_string(),
        reason: e.to_string(),
    })
}

/// Object file native-image wrote for the main class
pub(crate) fn object_file(ctx: &BuildContext, extension: &str) -> Result<PathBuf, PipelineError> {
    find_object_file(ctx, extension).ok_or_else(|| PipelineError::StageFailure {
        stage: Stage::Link,
        code: FAILURE_SENTINEL,
        log: ctx.paths().tmp().to_path_buf(),
        cause: Some(format!(
            "{} not found, compile first",
            object_name(ctx.config().main_class(), extension)
        )),
    })
}

fn find_object_file(ctx: &BuildContext, extension: &str) -> Option<PathBuf> {
    let name = object_name(ctx.config().main_class(), extension);
    WalkDir::new(ctx.paths().tmp())
        .into_iter()
        .filter_map(|entry| entry.ok())
        .find(|entry| entry.file_type().is_file() && entry.file_name().to_string_lossy() == name)
        .map(|entry| entry.into_path())
}

fn object_name(main_class: &str, extension: &str) -> String {
    format!("{}.{}", main_class.to_lowercase(), extension)
}

/// Linked application path: `<app dir>/<prefix><app name><suffix>`
pub(crate) fn app_output(ctx: &BuildContext, prefix: &str, suffix: &str) -> PathBuf {
    ctx.paths()
        .app()
        .join(format!("{prefix}{}{suffix}", ctx.config().app_name()))
}

/// Static library directories shipped with the runtime SDK for `target`
pub(crate) fn sdk_library_dirs(ctx: &BuildContext, target: &Triplet) -> Vec<PathBuf> {
    let platform = sdk_platform_dir(target);
    let lib = ctx.config().graalvm_home().join("lib");
    let mut dirs = vec![lib.join("svm").join("clibraries").join(&platform)];
    let static_dir = lib.join("static").join(&platform);
    if target.os() == Os::Linux {
        dirs.push(static_dir.join("glibc"));
    }
    dirs.push(static_dir);
    dirs
}

/// `<os>-<arch>` as the runtime SDK names its platform directories
fn sdk_platform_dir(target: &Triplet) -> String {
    let arch = match target.arch() {
        Arch::Amd64 => "amd64",
        Arch::Arm64 | Arch::Aarch64 => "aarch64",
    };
    format!("{}-{}", target.os(), arch)
}

/// Every library directory the linker should search, provisioned bundles first
pub(crate) fn library_dirs(ctx: &BuildContext, provisioned: &[PathBuf]) -> Vec<PathBuf> {
    let mut dirs = provisioned.to_vec();
    dirs.extend(sdk_library_dirs(ctx, ctx.config().target()));
    dirs
}

/// Whether host and target differ in architecture
pub(crate) fn is_cross_arch(ctx: &BuildContext) -> bool {
    let host = ctx.config().host().arch();
    let target = ctx.config().target().arch();
    host.is_arm() != target.is_arm()
}

/// Empty `dir`, creating it if needed
async fn reset_dir(dir: &Path) -> Result<(), PipelineError> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(error) => {
            return Err(FsError {
                context: "clearing directory",
                path: dir.to_path_buf(),
                error,
            }
            .into());
        }
    }
    tokio::fs::create_dir_all(dir)
        .await
        .fs_context("creating directory", dir)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BuildConfiguration, Profile};

    fn context(root: &Path, target: Profile) -> BuildContext {
        let host = Triplet::from_profile(match target {
            Profile::Ios | Profile::IosSim | Profile::MacOs => Profile::MacOs,
            Profile::Windows => Profile::Windows,
            _ => Profile::Linux,
        });
        let config = BuildConfiguration::builder()
            .main_class("com.example.Main")
            .app_name("hello")
            .graalvm_home(root.join("graalvm"))
            .host(host)
            .target(Triplet::from_profile(target))
            .cache_root(root.join("cache"))
            .build()
            .unwrap();
        BuildContext::new(root.join("build"), config)
    }

    #[test]
    fn sdk_dirs_use_runtime_naming() {
        let root = Path::new("/r");
        let ctx = context(root, Profile::Linux);
        let dirs = sdk_library_dirs(&ctx, ctx.config().target());
        assert_eq!(
            dirs,
            vec![
                PathBuf::from("/r/graalvm/lib/svm/clibraries/linux-amd64"),
                PathBuf::from("/r/graalvm/lib/static/linux-amd64/glibc"),
                PathBuf::from("/r/graalvm/lib/static/linux-amd64"),
            ]
        );
    }

    #[test]
    fn object_file_is_found_anywhere_under_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), Profile::Linux);
        assert!(object_file(&ctx, "o").is_err());

        let nested = ctx.paths().tmp().join("SVM-123");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("com.example.main.o"), b"obj").unwrap();
        assert_eq!(object_file(&ctx, "o").unwrap(), nested.join("com.example.main.o"));
    }

    #[test]
    fn app_output_uses_app_name() {
        let ctx = context(Path::new("/r"), Profile::Android);
        assert_eq!(
            app_output(&ctx, "lib", ".so"),
            PathBuf::from("/r/build/aarch64-android/libhello.so")
        );
    }

    #[test]
    fn cross_arch_detection() {
        let ctx = context(Path::new("/r"), Profile::LinuxAarch64);
        assert!(is_cross_arch(&ctx));
        let ctx = context(Path::new("/r"), Profile::Linux);
        assert!(!is_cross_arch(&ctx));
    }

    #[tokio::test]
    async fn missing_native_image_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), Profile::Linux);
        let flags = CompileFlags {
            command: "native-image",
            platform: "LINUX_AMD64",
            target_args: Vec::new(),
        };
        let result = compile(
            &ctx,
            &ClassPath::parse("app.jar"),
            &CompileDirectives::default(),
            &flags,
            "o",
        )
        .await;
        assert!(matches!(
            result,
            Err(PipelineError::ToolNotFound {
                stage: Stage::Compile,
                ..
            })
        ));
    }

    #[test]
    fn missing_linker_fails_the_link_stage() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), Profile::Linux);
        let error = resolve_linker(&ctx, "kodegen-no-such-linker").unwrap_err();
        assert_eq!(error.stage(), Some(Stage::Link));
        assert!(crate::error::NativeError::from(error).is_fatal());
    }
}
