//! Stage ordering and failure handling of the build pipeline

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::io::AsyncBufReadExt;

use kodegen_bundler_native::deps::{Bundle, BundleKind, ProvisionReport, checksum};
use kodegen_bundler_native::error::{DependencyError, PipelineError};
use kodegen_bundler_native::model::{
    BuildConfiguration, ClassPath, CompileDirectives, Profile, Triplet,
};
use kodegen_bundler_native::pipeline::{
    DirectiveSource, PipelineState, Stage, Step, SubstrateDispatcher,
};
use kodegen_bundler_native::process::ProcessOutcome;
use kodegen_bundler_native::target::{BuildContext, TargetConfiguration};

/// Strategy that records calls instead of running tools
#[derive(Clone, Default)]
struct Recording {
    calls: Arc<Mutex<Vec<String>>>,
    failing: Option<Stage>,
    output: Vec<&'static str>,
}

impl Recording {
    fn failing_at(stage: Stage) -> Self {
        Self {
            failing: Some(stage),
            ..Self::default()
        }
    }

    fn printing(lines: &[&'static str]) -> Self {
        Self {
            output: lines.to_vec(),
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn outcome(&self, stage: Stage, ctx: &BuildContext) -> ProcessOutcome {
        self.calls.lock().unwrap().push(stage.to_string());
        let mut outcome = ProcessOutcome::skipped(&stage.to_string(), ctx.paths().log());
        if self.failing == Some(stage) {
            outcome.code = 1;
        }
        outcome
    }
}

impl TargetConfiguration for Recording {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn compile(
        &self,
        ctx: &BuildContext,
        _classpath: &ClassPath,
        directives: &CompileDirectives,
    ) -> Result<ProcessOutcome, PipelineError> {
        for class in &directives.reflection {
            self.calls.lock().unwrap().push(format!("reflect {class}"));
        }
        Ok(self.outcome(Stage::Compile, ctx))
    }

    async fn link(
        &self,
        ctx: &BuildContext,
        _provisioned: &ProvisionReport,
    ) -> Result<ProcessOutcome, PipelineError> {
        Ok(self.outcome(Stage::Link, ctx))
    }

    async fn package(&self, ctx: &BuildContext) -> Result<ProcessOutcome, PipelineError> {
        Ok(self.outcome(Stage::Package, ctx))
    }

    async fn run(&self, ctx: &BuildContext) -> Result<ProcessOutcome, PipelineError> {
        let outcome = self.outcome(Stage::Run, ctx);
        let mut text = self.output.join("\n");
        text.push('\n');
        std::fs::write(&outcome.stdout_log, text).unwrap();
        Ok(outcome)
    }

    async fn run_until_end(&self, ctx: &BuildContext) -> Result<ProcessOutcome, PipelineError> {
        Ok(self.outcome(Stage::Run, ctx))
    }
}

struct Workspace {
    dir: tempfile::TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.jar"), b"jar").unwrap();
        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn build_root(&self) -> PathBuf {
        self.path().join("build")
    }

    fn classpath(&self) -> ClassPath {
        ClassPath::parse(&self.path().join("app.jar").display().to_string())
    }

    /// Configuration that needs no bundles
    fn config(&self) -> BuildConfiguration {
        self.builder().use_jni(false).build().unwrap()
    }

    fn builder(&self) -> kodegen_bundler_native::model::BuildConfigurationBuilder {
        BuildConfiguration::builder()
            .main_class("com.example.Main")
            .app_name("hello")
            .graalvm_home(self.path().join("graalvm"))
            .host(Triplet::from_profile(Profile::Linux))
            .cache_root(self.path().join("cache"))
    }

    fn dispatcher(&self, target: Recording) -> SubstrateDispatcher<Recording> {
        SubstrateDispatcher::with_target(self.build_root(), self.config(), target).unwrap()
    }
}

#[tokio::test]
async fn stages_run_in_order() {
    let ws = Workspace::new();
    let target = Recording::printing(&["starting", "Hello World!"]);
    let mut dispatcher = ws.dispatcher(target.clone());

    let report = dispatcher
        .execute(&ws.classpath(), Step::Run, Some("Hello World!"))
        .await
        .unwrap();

    assert_eq!(target.calls(), vec!["compile", "link", "package", "run"]);
    let stages: Vec<_> = report.stages.iter().map(|(stage, _)| *stage).collect();
    assert_eq!(
        stages,
        vec![Stage::Compile, Stage::Link, Stage::Package, Stage::Run]
    );
    let captured = report.captured.unwrap();
    assert_eq!(captured.last_line.as_deref(), Some("Hello World!"));

    let mut lines = captured.reader().await.unwrap().lines();
    let mut printed = Vec::new();
    while let Some(line) = lines.next_line().await.unwrap() {
        printed.push(line);
    }
    assert_eq!(printed, vec!["starting", "Hello World!"]);
    assert_eq!(dispatcher.state(), PipelineState::Finished);
}

#[tokio::test]
async fn execute_stops_at_requested_step() {
    let ws = Workspace::new();
    let target = Recording::default();
    let mut dispatcher = ws.dispatcher(target.clone());

    let report = dispatcher
        .execute(&ws.classpath(), Step::Link, None)
        .await
        .unwrap();

    assert_eq!(target.calls(), vec!["compile", "link"]);
    assert_eq!(report.provisioned, Some(ProvisionReport::default()));
    assert_eq!(dispatcher.state(), PipelineState::Linked);
}

#[tokio::test]
async fn link_before_compile_is_rejected() {
    let ws = Workspace::new();
    let target = Recording::default();
    let mut dispatcher = ws.dispatcher(target.clone());

    match dispatcher.link().await {
        Err(PipelineError::OutOfOrder { stage, state }) => {
            assert_eq!(stage, Stage::Link);
            assert_eq!(state, PipelineState::NotStarted);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(dispatcher.run().await.is_err());
    assert!(target.calls().is_empty());
}

#[tokio::test]
async fn failed_compile_blocks_link() {
    let ws = Workspace::new();
    let target = Recording::failing_at(Stage::Compile);
    let mut dispatcher = ws.dispatcher(target.clone());

    match dispatcher.compile(&ws.classpath()).await {
        Err(PipelineError::StageFailure { stage, code, .. }) => {
            assert_eq!(stage, Stage::Compile);
            assert_eq!(code, 1);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(dispatcher.state(), PipelineState::Failed(Stage::Compile));

    assert!(matches!(
        dispatcher.link().await,
        Err(PipelineError::OutOfOrder { .. })
    ));
    assert_eq!(target.calls(), vec!["compile"]);
}

#[tokio::test]
async fn failed_link_is_fatal() {
    let ws = Workspace::new();
    let mut dispatcher = ws.dispatcher(Recording::failing_at(Stage::Link));

    let err = dispatcher
        .execute(&ws.classpath(), Step::Run, None)
        .await
        .unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Link));
    assert!(kodegen_bundler_native::NativeError::from(err).is_fatal());
    assert_eq!(dispatcher.state(), PipelineState::Failed(Stage::Link));
}

#[tokio::test]
async fn missing_classpath_entry_fails_before_compiling() {
    let ws = Workspace::new();
    let target = Recording::default();
    let mut dispatcher = ws.dispatcher(target.clone());

    let classpath = ClassPath::parse(&ws.path().join("absent.jar").display().to_string());
    assert!(matches!(
        dispatcher.compile(&classpath).await,
        Err(PipelineError::InvalidConfiguration { .. })
    ));
    assert_eq!(dispatcher.state(), PipelineState::Failed(Stage::Compile));
    assert!(target.calls().is_empty());
}

#[tokio::test]
async fn unexpected_output_fails_the_run() {
    let ws = Workspace::new();
    let mut dispatcher = ws.dispatcher(Recording::printing(&["Hello World!", "Goodbye"]));

    let err = dispatcher
        .execute(&ws.classpath(), Step::Run, Some("Hello World!"))
        .await
        .unwrap_err();
    match err {
        PipelineError::UnexpectedOutput { expected, actual, .. } => {
            assert_eq!(expected, "Hello World!");
            assert_eq!(actual.as_deref(), Some("Goodbye"));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(dispatcher.state(), PipelineState::Failed(Stage::Run));
}

#[tokio::test]
async fn ui_toolkit_on_classpath_enables_its_bundle() {
    let ws = Workspace::new();
    std::fs::write(ws.path().join("javafx-controls.jar"), b"jar").unwrap();
    let mut dispatcher = ws.dispatcher(Recording::default());
    assert!(!dispatcher.context().config().use_ui_toolkit());

    let separator = if cfg!(windows) { ";" } else { ":" };
    let classpath = ClassPath::parse(&format!(
        "{}{separator}{}",
        ws.path().join("app.jar").display(),
        ws.path().join("javafx-controls.jar").display()
    ));
    dispatcher.compile(&classpath).await.unwrap();
    assert!(dispatcher.context().config().use_ui_toolkit());
}

#[tokio::test]
async fn directive_source_is_consulted_per_classpath() {
    struct Scanner;

    impl DirectiveSource for Scanner {
        fn directives(&self, classpath: &ClassPath) -> CompileDirectives {
            CompileDirectives {
                reflection: classpath
                    .entries()
                    .iter()
                    .filter_map(|entry| entry.file_stem())
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .collect(),
                ..CompileDirectives::default()
            }
        }
    }

    let ws = Workspace::new();
    let target = Recording::default();
    let mut dispatcher = ws.dispatcher(target.clone()).with_directive_source(Scanner);

    dispatcher.compile(&ws.classpath()).await.unwrap();
    assert_eq!(target.calls(), vec!["reflect app", "compile"]);
}

#[tokio::test]
async fn provisioning_failure_prevents_link() {
    let ws = Workspace::new();
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", mockito::Matcher::Any)
        .with_status(404)
        .create_async()
        .await;

    let config = ws.builder().download_url(server.url()).build().unwrap();
    let target = Recording::default();
    let mut dispatcher =
        SubstrateDispatcher::with_target(ws.build_root(), config, target.clone()).unwrap();

    dispatcher.compile(&ws.classpath()).await.unwrap();
    match dispatcher.link().await {
        Err(PipelineError::Dependency(DependencyError::HttpStatus { status, .. })) => {
            assert_eq!(status, 404)
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(dispatcher.state(), PipelineState::Failed(Stage::Provision));
    assert_eq!(target.calls(), vec!["compile"]);
}

#[tokio::test]
async fn host_must_be_able_to_build_target() {
    let ws = Workspace::new();
    let config = ws
        .builder()
        .target(Triplet::from_profile(Profile::Ios))
        .build()
        .unwrap();
    assert!(SubstrateDispatcher::new(ws.build_root(), config).is_err());
}

/// Full pipeline with stand-in compiler, linker and application
#[cfg(target_os = "linux")]
#[tokio::test]
async fn linux_build_with_stand_in_tools() {
    use std::os::unix::fs::PermissionsExt;

    fn script(path: &Path, body: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, format!("#!/bin/sh\n{body}")).unwrap();
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    let ws = Workspace::new();
    script(
        &ws.path().join("graalvm/bin/native-image"),
        r#"for arg in "$@"; do
  case "$arg" in
    -H:TempDirectory=*) tmp="${arg#-H:TempDirectory=}" ;;
  esac
done
mkdir -p "$tmp/SVM-1"
: > "$tmp/SVM-1/com.example.main.o"
echo "image written"
"#,
    );
    let linker = ws.path().join("tools/cc");
    script(
        &linker,
        r#"out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then out="$2"; shift; fi
  shift
done
printf '#!/bin/sh\necho starting\necho "Hello World!"\n' > "$out"
chmod +x "$out"
"#,
    );

    let mut server = mockito::Server::new_async().await;
    let downloads = server
        .mock("GET", mockito::Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let config = ws
        .builder()
        .linker(&linker)
        .download_url(server.url())
        .build()
        .unwrap();

    // Cache entry from an earlier build, checksums included
    let bundle = Bundle::new(
        BundleKind::RuntimeStatic,
        config.runtime_version(),
        config.target(),
        config.cache_root(),
    );
    let mut recorded = checksum::ChecksumMap::new();
    for (member, path) in bundle.member_paths() {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, member.as_bytes()).unwrap();
        recorded.insert(member.to_string(), checksum::checksum_bytes(member.as_bytes()));
    }
    checksum::persist(&bundle.checksum_file(), &recorded)
        .await
        .unwrap();

    let mut dispatcher = SubstrateDispatcher::new(ws.build_root(), config).unwrap();

    let report = dispatcher
        .execute(&ws.classpath(), Step::Run, Some("Hello World!"))
        .await
        .unwrap();

    assert_eq!(dispatcher.state(), PipelineState::Finished);
    assert_eq!(report.stages.len(), 4);

    let provisioned = report.provisioned.as_ref().unwrap();
    assert!(!provisioned.fetched_any());
    assert_eq!(provisioned.lib_dirs(), vec![bundle.lib_dir()]);

    let (_, run) = report
        .stages
        .iter()
        .find(|(stage, _)| *stage == Stage::Run)
        .unwrap();
    assert_eq!(run.code, 0);
    assert!(run.success());

    let app = dispatcher.context().paths().app().join("hello");
    assert!(app.is_file());

    let compile_log = dispatcher.context().paths().log().join("process-compile.log");
    assert_eq!(
        std::fs::read_to_string(compile_log).unwrap().trim(),
        "image written"
    );
    downloads.assert_async().await;
}
