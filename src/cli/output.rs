//! Colored terminal output for build runs.
//!
//! Every stage prints a start line and an outcome line; failures add the
//! log file to read.

use std::io::Write;
use std::path::Path;

use termcolor::{Buffer, BufferWriter, Color, ColorChoice, ColorSpec, WriteColor};

use crate::pipeline::Stage;

/// Output manager for consistent colored terminal output
#[derive(Debug)]
pub struct OutputManager {
    bufwtr: BufferWriter,
    verbose: bool,
    quiet: bool,
}

impl Clone for OutputManager {
    fn clone(&self) -> Self {
        Self::new(self.verbose, self.quiet)
    }
}

impl OutputManager {
    /// Create a new output manager
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            bufwtr: BufferWriter::stdout(ColorChoice::Auto),
            verbose,
            quiet,
        }
    }

    fn styled(&self, buffer: &mut Buffer, symbol: &str, color: Color, message: &str) {
        let _ = buffer.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true));
        let _ = write!(buffer, "{symbol}");
        let _ = buffer.reset();
        let _ = writeln!(buffer, " {message}");
    }

    fn emit(&self, symbol: &str, color: Color, message: &str) -> std::io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        let mut buffer = self.bufwtr.buffer();
        self.styled(&mut buffer, symbol, color, message);
        self.bufwtr.print(&buffer)
    }

    /// Print an info message
    pub fn info(&self, message: &str) -> std::io::Result<()> {
        self.emit("ℹ", Color::Cyan, message)
    }

    /// Print a success message
    pub fn success(&self, message: &str) -> std::io::Result<()> {
        self.emit("✓", Color::Green, message)
    }

    /// Print a warning message
    pub fn warn(&self, message: &str) -> std::io::Result<()> {
        self.emit("⚠", Color::Yellow, message)
    }

    /// Print a verbose message (only in verbose mode)
    pub fn verbose(&self, message: &str) -> std::io::Result<()> {
        if !self.verbose {
            return Ok(());
        }
        self.emit("→", Color::Blue, message)
    }

    /// Print an error message to stderr (always shown)
    pub fn error(&self, message: &str) {
        let bufwtr = BufferWriter::stderr(ColorChoice::Auto);
        let mut buffer = bufwtr.buffer();
        self.styled(&mut buffer, "✗", Color::Red, message);
        if bufwtr.print(&buffer).is_err() {
            println!("[STDERR ERROR] ✗ {message}");
        }
    }

    /// Print a section header
    pub fn section(&self, title: &str) -> std::io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        let mut buffer = self.bufwtr.buffer();
        let _ = writeln!(buffer);
        let _ = buffer.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)).set_bold(true));
        let _ = writeln!(buffer, "═══ {title} ═══");
        let _ = buffer.reset();
        self.bufwtr.print(&buffer)
    }

    /// Print indented text
    pub fn indent(&self, message: &str) -> std::io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        let mut buffer = self.bufwtr.buffer();
        let _ = writeln!(buffer, "    {message}");
        self.bufwtr.print(&buffer)
    }

    /// Announce a stage
    pub fn stage_started(&self, stage: Stage, detail: &str) -> std::io::Result<()> {
        self.emit("⋯", Color::Magenta, &format!("{}: {detail}", title(stage)))
    }

    /// Report a finished stage
    pub fn stage_succeeded(&self, stage: Stage, detail: &str) -> std::io::Result<()> {
        self.success(&format!("{} succeeded{}", title(stage), suffix(detail)))
    }

    /// Report a failed stage and where its output went
    pub fn stage_failed(&self, stage: Stage, reason: &str, log: Option<&Path>) {
        self.error(&format!("{} failed: {reason}", title(stage)));
        if let Some(log) = log {
            let _ = self.indent(&format!("Log: {}", log.display()));
        }
    }

    /// Whether verbose mode is on
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

fn title(stage: Stage) -> &'static str {
    match stage {
        Stage::Compile => "Compile",
        Stage::Provision => "Provision",
        Stage::Link => "Link",
        Stage::Package => "Package",
        Stage::Run => "Run",
    }
}

fn suffix(detail: &str) -> String {
    if detail.is_empty() {
        String::new()
    } else {
        format!(" ({detail})")
    }
}
