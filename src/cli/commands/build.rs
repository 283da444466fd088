//! The build command: compile, link, package and run as requested.

use crate::cli::{Args, OutputManager};
use crate::error::{NativeError, PipelineError, Result};
use crate::model::ClassPath;
use crate::pipeline::{Stage, Step, SubstrateDispatcher};
use crate::target::TargetConfiguration;

/// Run the pipeline up to the requested step, reporting each stage.
///
/// Returns the process exit code. A failed link ends the process
/// immediately with exit code 1.
pub async fn execute_build(args: &Args, output: &OutputManager) -> Result<i32> {
    let config = args.to_configuration()?;
    let classpath = args.classpath();

    let _ = output.section(&format!(
        "{} → {}",
        config.main_class(),
        config.target()
    ));
    let _ = output.verbose(&format!("Classpath: {classpath}"));
    let _ = output.verbose(&format!("Bundle cache: {}", config.cache_root().display()));

    let mut dispatcher = SubstrateDispatcher::new(&args.build_root, config)?;

    match run_stages(&mut dispatcher, &classpath, args, output).await {
        Ok(()) => Ok(0),
        Err((stage, error)) => {
            output.stage_failed(stage, &error.to_string(), error.log_path());
            let error = NativeError::from(error);
            for suggestion in error.recovery_suggestions() {
                let _ = output.indent(&suggestion);
            }
            if error.is_fatal() {
                std::process::exit(1);
            }
            Ok(1)
        }
    }
}

async fn run_stages(
    dispatcher: &mut SubstrateDispatcher,
    classpath: &ClassPath,
    args: &Args,
    output: &OutputManager,
) -> std::result::Result<(), (Stage, PipelineError)> {
    let _ = output.stage_started(Stage::Compile, "running native-image");
    dispatcher
        .compile(classpath)
        .await
        .map_err(|e| (Stage::Compile, e))?;
    let _ = output.stage_succeeded(Stage::Compile, "");

    if args.step.requires(Step::Link) {
        let _ = output.stage_started(Stage::Link, "provisioning static SDKs and linking");
        dispatcher.link().await.map_err(|e| (e.stage().unwrap_or(Stage::Link), e))?;
        let fetched = dispatcher
            .provisioned()
            .map(|report| report.fetched_any())
            .unwrap_or(false);
        let app = dispatcher.context().paths().app().display().to_string();
        let _ = output.stage_succeeded(
            Stage::Link,
            &if fetched {
                format!("bundles downloaded, output in {app}")
            } else {
                format!("output in {app}")
            },
        );
    }

    if args.step.requires(Step::Package) {
        let _ = output.stage_started(Stage::Package, dispatcher.target().name());
        dispatcher.package().await.map_err(|e| (Stage::Package, e))?;
        let _ = output.stage_succeeded(Stage::Package, "");
    }

    if args.step.requires(Step::Run) {
        let _ = output.stage_started(Stage::Run, dispatcher.context().config().app_name());
        match &args.expected {
            Some(expected) => {
                dispatcher
                    .run_expecting(expected)
                    .await
                    .map_err(|e| (Stage::Run, e))?;
                let _ = output.stage_succeeded(Stage::Run, &format!("printed '{expected}'"));
            }
            None => {
                dispatcher.run_until_end().await.map_err(|e| (Stage::Run, e))?;
                let _ = output.stage_succeeded(Stage::Run, "");
            }
        }
    }

    Ok(())
}
