//! Staged build pipeline.
//!
//! [`SubstrateDispatcher`] drives one build through
//! `Compile → Provision → Link → Package → Run`, delegating each stage to the
//! target's strategy and refusing to start a stage whose predecessor has not
//! succeeded:
//!
//! ```text
//! NotStarted ─compile─▶ Compiling ─ok─▶ Compiled ─ensure+link─▶ Linking ─ok─▶ Linked
//!                          │                                      │            │
//!                          └──────fail──▶ Failed(stage) ◀──fail───┘      package/run
//! ```
//!
//! Stages run one after another; the only concurrent work is the compile
//! heartbeat that reports progress while the compiler runs.

pub mod directives;
mod step;

use std::path::PathBuf;
use std::time::Duration;

pub use directives::DirectiveSource;
pub use step::{PipelineState, Stage, Step};

use crate::deps::{FileDeps, ProvisionReport};
use crate::error::{NativeError, PipelineError};
use crate::model::{BuildConfiguration, ClassPath};
use crate::process::ProcessOutcome;
use crate::target::{self, BuildContext, PlatformTarget, TargetConfiguration};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);

/// Captured output of a run-and-capture invocation
#[derive(Debug, Clone)]
pub struct CapturedRun {
    /// Process result; `stdout_log` holds the output
    pub outcome: ProcessOutcome,
    /// Last non-empty output line
    pub last_line: Option<String>,
}

impl CapturedRun {
    /// Open the captured output for reading
    pub async fn reader(&self) -> std::io::Result<tokio::io::BufReader<tokio::fs::File>> {
        let file = tokio::fs::File::open(&self.outcome.stdout_log).await?;
        Ok(tokio::io::BufReader::new(file))
    }
}

/// Result of [`SubstrateDispatcher::execute`]
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    /// Completed stages with their tool outcomes, in order
    pub stages: Vec<(Stage, ProcessOutcome)>,
    /// Bundles provisioned before linking
    pub provisioned: Option<ProvisionReport>,
    /// Output of a captured run
    pub captured: Option<CapturedRun>,
}

/// Drives one build through its stages
pub struct SubstrateDispatcher<T: TargetConfiguration = PlatformTarget> {
    context: BuildContext,
    deps: FileDeps,
    target: T,
    directives: Box<dyn DirectiveSource>,
    state: PipelineState,
    provisioned: Option<ProvisionReport>,
}

impl SubstrateDispatcher {
    /// Dispatcher using the strategy registered for the configuration's target.
    ///
    /// Fails with `InvalidTarget` before anything runs when the host cannot
    /// build for the target.
    pub fn new(build_root: impl Into<PathBuf>, config: BuildConfiguration) -> Result<Self, NativeError> {
        let target = target::for_triplet(config.host(), config.target())?;
        Self::with_target(build_root, config, target)
    }
}

impl<T: TargetConfiguration> SubstrateDispatcher<T> {
    /// Dispatcher using a specific strategy
    pub fn with_target(
        build_root: impl Into<PathBuf>,
        config: BuildConfiguration,
        target: T,
    ) -> Result<Self, NativeError> {
        let deps = FileDeps::new(&config);
        let directives = Box::new(config.directives().clone());
        let context = BuildContext::new(build_root, config);
        context.paths().create().map_err(PipelineError::from)?;

        log::debug!(
            "Building for {} with the {} strategy in {}",
            context.config().target(),
            target.name(),
            context.paths().app().display()
        );

        Ok(Self {
            context,
            deps,
            target,
            directives,
            state: PipelineState::NotStarted,
            provisioned: None,
        })
    }

    /// Replace where compiler directives come from
    pub fn with_directive_source(mut self, source: impl DirectiveSource + 'static) -> Self {
        self.directives = Box::new(source);
        self
    }

    /// Current state
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Configuration and directory layout in use
    pub fn context(&self) -> &BuildContext {
        &self.context
    }

    /// Bundles provisioned for the last link
    pub fn provisioned(&self) -> Option<&ProvisionReport> {
        self.provisioned.as_ref()
    }

    /// Strategy in use
    pub fn target(&self) -> &T {
        &self.target
    }

    /// Compile the classpath.
    ///
    /// A classpath entry naming the UI toolkit switches the UI toolkit
    /// bundle on for the rest of the run.
    pub async fn compile(&mut self, classpath: &ClassPath) -> Result<ProcessOutcome, PipelineError> {
        self.expect(Stage::Compile, PipelineState::NotStarted)?;

        if let Err(e) = validate_classpath(classpath) {
            self.state = PipelineState::Failed(Stage::Compile);
            return Err(e);
        }
        if classpath.uses_ui_toolkit() && !self.context.config().use_ui_toolkit() {
            log::info!("UI toolkit found on the classpath, enabling its static SDK");
            let config = self.context.config().with_ui_toolkit();
            self.context.replace_config(config);
        }

        self.state = PipelineState::Compiling;
        log::info!(
            "Compiling {} for {}",
            self.context.config().main_class(),
            self.context.config().target()
        );

        let directives = self.directives.directives(classpath);
        let heartbeat = tokio::spawn(heartbeat());
        let result = self.target.compile(&self.context, classpath, &directives).await;
        heartbeat.abort();

        self.finish(Stage::Compile, result, PipelineState::Compiled)
    }

    /// Provision the bundles the link needs, then link.
    pub async fn link(&mut self) -> Result<ProcessOutcome, PipelineError> {
        self.expect(Stage::Link, PipelineState::Compiled)?;

        let provisioned = match self.deps.ensure(self.context.config()).await {
            Ok(report) => report,
            Err(e) => {
                log::error!("{} failed: {}", Stage::Provision, e);
                self.state = PipelineState::Failed(Stage::Provision);
                return Err(e.into());
            }
        };

        self.state = PipelineState::Linking;
        log::info!("Linking {}", self.context.config().app_name());
        let result = self.target.link(&self.context, &provisioned).await;
        self.provisioned = Some(provisioned);

        self.finish(Stage::Link, result, PipelineState::Linked)
    }

    /// Run the target's packaging hook
    pub async fn package(&mut self) -> Result<ProcessOutcome, PipelineError> {
        self.expect(Stage::Package, PipelineState::Linked)?;
        let result = self.target.package(&self.context).await;
        self.finish(Stage::Package, result, PipelineState::Packaged)
    }

    /// Run the application and capture its output
    pub async fn run(&mut self) -> Result<CapturedRun, PipelineError> {
        self.begin_run()?;
        let result = self.target.run(&self.context).await;
        let outcome = self.finish(Stage::Run, result, PipelineState::Finished)?;

        let last_line = outcome.last_line().await.map_err(|e| {
            PipelineError::from(crate::error::FsError {
                context: "reading captured output",
                path: outcome.stdout_log.clone(),
                error: e,
            })
        })?;
        Ok(CapturedRun { outcome, last_line })
    }

    /// Run and capture, requiring the last output line to equal `expected`
    pub async fn run_expecting(&mut self, expected: &str) -> Result<CapturedRun, PipelineError> {
        let captured = self.run().await?;
        if let Err(e) = check_expected(&captured, expected) {
            log::error!("{}", e);
            self.state = PipelineState::Failed(Stage::Run);
            return Err(e);
        }
        Ok(captured)
    }

    /// Run the application with its output on the terminal and wait for it
    pub async fn run_until_end(&mut self) -> Result<ProcessOutcome, PipelineError> {
        self.begin_run()?;
        let result = self.target.run_until_end(&self.context).await;
        self.finish(Stage::Run, result, PipelineState::Finished)
    }

    /// Run every stage up to `step`.
    ///
    /// With `expected`, the run step captures output and requires its last
    /// line to equal `expected`; otherwise the application runs with output
    /// forwarded.
    pub async fn execute(
        &mut self,
        classpath: &ClassPath,
        step: Step,
        expected: Option<&str>,
    ) -> Result<PipelineReport, PipelineError> {
        let mut report = PipelineReport::default();

        report.stages.push((Stage::Compile, self.compile(classpath).await?));
        if step.requires(Step::Link) {
            report.stages.push((Stage::Link, self.link().await?));
            report.provisioned = self.provisioned.clone();
        }
        if step.requires(Step::Package) {
            report.stages.push((Stage::Package, self.package().await?));
        }
        if step.requires(Step::Run) {
            match expected {
                Some(expected) => {
                    let captured = self.run_expecting(expected).await?;
                    report.stages.push((Stage::Run, captured.outcome.clone()));
                    report.captured = Some(captured);
                }
                None => report.stages.push((Stage::Run, self.run_until_end().await?)),
            }
        }

        Ok(report)
    }

    fn begin_run(&mut self) -> Result<(), PipelineError> {
        if !matches!(self.state, PipelineState::Linked | PipelineState::Packaged) {
            return Err(PipelineError::OutOfOrder {
                stage: Stage::Run,
                state: self.state,
            });
        }
        self.state = PipelineState::Running;
        Ok(())
    }

    fn expect(&self, stage: Stage, required: PipelineState) -> Result<(), PipelineError> {
        if self.state == required {
            Ok(())
        } else {
            Err(PipelineError::OutOfOrder {
                stage,
                state: self.state,
            })
        }
    }

    /// Turn a strategy result into the stage result and move the state on
    fn finish(
        &mut self,
        stage: Stage,
        result: Result<ProcessOutcome, PipelineError>,
        done: PipelineState,
    ) -> Result<ProcessOutcome, PipelineError> {
        match result.and_then(|outcome| check_outcome(stage, outcome)) {
            Ok(outcome) => {
                log::info!("{} succeeded", stage);
                self.state = done;
                Ok(outcome)
            }
            Err(e) => {
                log::error!("{} failed: {}", stage, e);
                self.state = PipelineState::Failed(stage);
                Err(e)
            }
        }
    }
}

fn check_outcome(stage: Stage, outcome: ProcessOutcome) -> Result<ProcessOutcome, PipelineError> {
    if outcome.interrupted {
        return Err(PipelineError::Interrupted {
            stage,
            log: outcome.stderr_log,
        });
    }
    if outcome.success() {
        return Ok(outcome);
    }
    let cause = match (&outcome.error, outcome.timed_out) {
        (Some(error), _) => Some(format!("could not start: {error}")),
        (None, true) => Some("timed out".to_string()),
        (None, false) => None,
    };
    Err(PipelineError::StageFailure {
        stage,
        code: outcome.code,
        log: outcome.stderr_log,
        cause,
    })
}

fn check_expected(captured: &CapturedRun, expected: &str) -> Result<(), PipelineError> {
    let matches = captured
        .last_line
        .as_deref()
        .is_some_and(|line| line.trim() == expected.trim());
    if matches {
        Ok(())
    } else {
        Err(PipelineError::UnexpectedOutput {
            expected: expected.to_string(),
            actual: captured.last_line.clone(),
            log: captured.outcome.stdout_log.clone(),
        })
    }
}

fn validate_classpath(classpath: &ClassPath) -> Result<(), PipelineError> {
    if classpath.is_empty() {
        return Err(PipelineError::InvalidConfiguration {
            reason: "classpath is empty".to_string(),
        });
    }
    let missing = classpath.missing_entries();
    if !missing.is_empty() {
        let names: Vec<_> = missing.iter().map(|p| p.display().to_string()).collect();
        return Err(PipelineError::InvalidConfiguration {
            reason: format!("classpath entries do not exist: {}", names.join(", ")),
        });
    }
    Ok(())
}

async fn heartbeat() {
    let mut interval = tokio::time::interval(HEARTBEAT_INTERVAL);
    interval.tick().await;
    let mut minutes = 0u32;
    loop {
        interval.tick().await;
        minutes += 1;
        log::info!(
            "Native compile is still running, please hold ({} minute{} elapsed)",
            minutes,
            if minutes == 1 { "" } else { "s" }
        );
    }
}
