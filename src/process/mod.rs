//! External tool execution.
//!
//! Every tool the pipeline invokes (compiler, linker, the built application)
//! goes through [`ProcessRunner`]. Standard output and standard error are
//! redirected into per-process log files under the log directory, so output
//! can be inspected after a failure and read back after a capture run:
//!
//! ```text
//! <log-dir>/process-<name>.log       stdout
//! <log-dir>/process-<name>.err.log   header (time, command line) + stderr
//! ```
//!
//! Both files are truncated on each run. Interrupting the driver (Ctrl-C)
//! kills the child and reports the run as interrupted.

use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, Command};

/// Exit code reported when a process could not be started or did not exit normally
pub const FAILURE_SENTINEL: i32 = -1;

/// Result of one process run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Name the run was logged under
    pub name: String,
    /// Exit code, or [`FAILURE_SENTINEL`]
    pub code: i32,
    /// Killed because the user interrupted the driver
    pub interrupted: bool,
    /// Killed because the timeout expired
    pub timed_out: bool,
    /// Why the process never ran, when it never ran
    pub error: Option<String>,
    /// Captured standard output
    pub stdout_log: PathBuf,
    /// Header and captured standard error
    pub stderr_log: PathBuf,
}

impl ProcessOutcome {
    /// Exited normally with code 0
    pub fn success(&self) -> bool {
        self.code == 0 && !self.interrupted && !self.timed_out
    }

    /// Successful outcome for a named run, for callers that skip a tool
    pub fn skipped(name: &str, log_dir: &Path) -> Self {
        let (stdout_log, stderr_log) = log_paths(log_dir, name);
        Self {
            name: name.to_string(),
            code: 0,
            interrupted: false,
            timed_out: false,
            error: None,
            stdout_log,
            stderr_log,
        }
    }

    /// Read the captured standard output as lines
    pub async fn output_lines(&self) -> std::io::Result<Vec<String>> {
        let contents = tokio::fs::read_to_string(&self.stdout_log).await?;
        Ok(contents.lines().map(str::to_string).collect())
    }

    /// Last non-empty line of captured standard output
    pub async fn last_line(&self) -> std::io::Result<Option<String>> {
        let lines = self.output_lines().await?;
        Ok(lines.into_iter().rev().find(|line| !line.trim().is_empty()))
    }
}

/// Log file paths for a named run
pub fn log_paths(log_dir: &Path, name: &str) -> (PathBuf, PathBuf) {
    let slug: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    (
        log_dir.join(format!("process-{slug}.log")),
        log_dir.join(format!("process-{slug}.err.log")),
    )
}

/// Builder and executor for one external command
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: OsString,
    args: Vec<OsString>,
    env: BTreeMap<OsString, OsString>,
    current_dir: Option<PathBuf>,
    log_dir: PathBuf,
    forward_output: bool,
}

enum Waited {
    Exited(std::io::Result<ExitStatus>),
    Interrupted,
    TimedOut,
}

impl ProcessRunner {
    /// Runner for `program`, logging into `log_dir`
    pub fn new(program: impl AsRef<OsStr>, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
            env: BTreeMap::new(),
            current_dir: None,
            log_dir: log_dir.into(),
            forward_output: false,
        }
    }

    /// Append one argument
    pub fn arg(&mut self, arg: impl AsRef<OsStr>) -> &mut Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Append arguments
    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Set an environment variable for the child
    pub fn env(&mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> &mut Self {
        self.env
            .insert(key.as_ref().to_os_string(), value.as_ref().to_os_string());
        self
    }

    /// Run the child in `dir`
    pub fn current_dir(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Send the child's output to this process's stdout and stderr instead of the logs
    pub fn forward_output(&mut self, forward: bool) -> &mut Self {
        self.forward_output = forward;
        self
    }

    /// Program and arguments as a single display string
    pub fn command_line(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|part| part.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Arguments added so far
    pub fn arguments(&self) -> &[OsString] {
        &self.args
    }

    /// Run to completion
    pub async fn run(&self, name: &str) -> ProcessOutcome {
        self.execute(name, None).await
    }

    /// Run, killing the child once `timeout` elapses
    pub async fn run_timed(&self, name: &str, timeout: Duration) -> ProcessOutcome {
        self.execute(name, Some(timeout)).await
    }

    async fn execute(&self, name: &str, timeout: Option<Duration>) -> ProcessOutcome {
        let mut outcome = ProcessOutcome::skipped(name, &self.log_dir);
        outcome.code = FAILURE_SENTINEL;

        log::debug!("[{}] {}", name, self.command_line());

        let mut child = match self.spawn(&outcome.stdout_log, &outcome.stderr_log) {
            Ok(child) => child,
            Err(e) => {
                log::error!("Failed to start {}: {}", self.program.to_string_lossy(), e);
                outcome.error = Some(e.to_string());
                return outcome;
            }
        };

        let waited = tokio::select! {
            waited = wait_for(&mut child, timeout) => waited,
            _ = interrupted() => Waited::Interrupted,
        };

        match waited {
            Waited::Exited(Ok(status)) => {
                outcome.code = status.code().unwrap_or(FAILURE_SENTINEL);
            }
            Waited::Exited(Err(e)) => {
                outcome.error = Some(e.to_string());
            }
            Waited::Interrupted => {
                log::warn!("Interrupted, stopping {}", name);
                kill(&mut child).await;
                outcome.interrupted = true;
            }
            Waited::TimedOut => {
                log::warn!("{} did not finish in time, stopping it", name);
                kill(&mut child).await;
                outcome.timed_out = true;
            }
        }

        log::debug!("[{}] exited with {}", name, outcome.code);
        outcome
    }

    /// Open the logs and start the child.
    ///
    /// The command (and with it the parent's copies of the log handles) is
    /// dropped before returning, so the files stay open only in the child.
    fn spawn(&self, stdout_log: &Path, stderr_log: &Path) -> std::io::Result<Child> {
        std::fs::create_dir_all(&self.log_dir)?;

        let stdout = File::create(stdout_log)?;
        let mut stderr = File::create(stderr_log)?;
        writeln!(stderr, "# {}", chrono::Local::now().to_rfc3339())?;
        writeln!(stderr, "# {}", self.command_line())?;
        if let Some(dir) = &self.current_dir {
            writeln!(stderr, "# cwd: {}", dir.display())?;
        }

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }
        if self.forward_output {
            command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        } else {
            command.stdout(Stdio::from(stdout)).stderr(Stdio::from(stderr));
        }

        command.spawn()
    }
}

async fn wait_for(child: &mut Child, timeout: Option<Duration>) -> Waited {
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
            Ok(status) => Waited::Exited(status),
            Err(_) => Waited::TimedOut,
        },
        None => Waited::Exited(child.wait().await),
    }
}

/// Resolves on Ctrl-C; never resolves if the signal handler cannot be installed.
async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

async fn kill(child: &mut Child) {
    if let Err(e) = child.kill().await {
        log::debug!("Failed to kill child process: {}", e);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn output_goes_to_log() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = ProcessRunner::new("sh", dir.path());
        runner.args(["-c", "echo first; echo second; echo oops >&2"]);

        let outcome = runner.run("echo test").await;
        assert!(outcome.success());
        assert!(outcome.stdout_log.ends_with("process-echo_test.log"));
        assert_eq!(outcome.output_lines().await.unwrap(), vec!["first", "second"]);
        assert_eq!(outcome.last_line().await.unwrap().as_deref(), Some("second"));

        let err = std::fs::read_to_string(&outcome.stderr_log).unwrap();
        assert!(err.contains("sh -c"));
        assert!(err.trim_end().ends_with("oops"));
    }

    #[tokio::test]
    async fn logs_are_truncated_per_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = ProcessRunner::new("sh", dir.path());
        runner.args(["-c", "echo once"]);
        runner.run("repeat").await;
        let outcome = runner.run("repeat").await;
        assert_eq!(outcome.output_lines().await.unwrap(), vec!["once"]);
    }

    #[tokio::test]
    async fn exit_code_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = ProcessRunner::new("sh", dir.path());
        runner.args(["-c", "exit 3"]);
        let outcome = runner.run("fail").await;
        assert_eq!(outcome.code, 3);
        assert!(!outcome.success());
    }

    #[tokio::test]
    async fn missing_program_yields_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ProcessRunner::new("/definitely/not/a/tool", dir.path());
        let outcome = runner.run("missing").await;
        assert_eq!(outcome.code, FAILURE_SENTINEL);
        assert!(outcome.error.is_some());
    }

    #[tokio::test]
    async fn env_and_cwd_are_applied() {
        let dir = tempfile::tempdir().unwrap();
        let work = dir.path().join("work");
        std::fs::create_dir(&work).unwrap();

        let mut runner = ProcessRunner::new("sh", dir.path().join("log"));
        runner
            .args(["-c", "echo \"$GREETING\"; pwd"])
            .env("GREETING", "hello")
            .current_dir(&work);
        let outcome = runner.run("env").await;

        let lines = outcome.output_lines().await.unwrap();
        assert_eq!(lines[0], "hello");
        assert!(lines[1].ends_with("work"));
    }

    #[tokio::test]
    async fn timed_run_is_killed() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = ProcessRunner::new("sleep", dir.path());
        runner.arg("5");
        let outcome = runner.run_timed("sleepy", Duration::from_millis(100)).await;
        assert!(outcome.timed_out);
        assert_eq!(outcome.code, FAILURE_SENTINEL);
    }
}
