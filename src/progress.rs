//! Import progress reporting.
//!
//! Progress is emitted on **stderr** so stdout stays reserved for the run
//! summary. The coordinator emits [`ImportProgressEvent::Importing`] each time
//! the imported counter reaches a multiple of [`PROGRESS_EVERY`].

use std::io::Write;

/// Imported-count interval between progress events.
pub const PROGRESS_EVERY: u64 = 100;

/// A single progress event for an import run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImportProgressEvent {
    /// Walking the root directory; total unknown.
    Discovering { root: String },
    /// `n` documents imported out of `total` discovered.
    Importing { n: u64, total: u64 },
}

/// Reports import progress. Implementations write to stderr (human or JSON).
pub trait ImportProgressReporter: Send + Sync {
    /// Emit a progress event. Called from the batch coordinator.
    fn report(&self, event: ImportProgressEvent);
}

/// Human-friendly progress on stderr: "import  1,200 / 25,000 documents".
pub struct StderrProgress;

impl ImportProgressReporter for StderrProgress {
    fn report(&self, event: ImportProgressEvent) {
        let line = match &event {
            ImportProgressEvent::Discovering { root } => {
                format!("import {}  discovering...\n", root)
            }
            ImportProgressEvent::Importing { n, total } => format!(
                "import  {} / {} documents\n",
                format_number(*n),
                format_number(*total)
            ),
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ImportProgressReporter for JsonProgress {
    fn report(&self, event: ImportProgressEvent) {
        let obj = match &event {
            ImportProgressEvent::Discovering { root } => serde_json::json!({
                "event": "progress",
                "phase": "discovering",
                "root": root
            }),
            ImportProgressEvent::Importing { n, total } => serde_json::json!({
                "event": "progress",
                "phase": "importing",
                "n": n,
                "total": total
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ImportProgressReporter for NoProgress {
    fn report(&self, _event: ImportProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn ImportProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
