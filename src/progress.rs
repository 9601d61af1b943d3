//! Status and progress reporting.
//!
//! The pipeline pushes two kinds of events into a caller-supplied
//! [`ProgressSink`]: free-form status lines and a completion percentage.
//! Indexing reports after every page; queries report before and after
//! generation. Sinks are called synchronously on the caller's thread.
//!
//! Built-in sinks write to **stderr** so stdout stays parseable for scripts.

use std::io::Write;

/// Observer for pipeline milestones. Both methods default to no-ops so an
/// implementation can listen to only one of them.
pub trait ProgressSink {
    fn on_status(&mut self, _message: &str) {}

    /// `percent` is in `0..=100`.
    fn on_progress(&mut self, _percent: u8) {}
}

/// Percentage for `done` of `total` steps, clamped to `0..=100`.
pub fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done.min(total) as f64 / total as f64) * 100.0).round() as u8
}

/// Human-friendly progress on stderr: "[ 42%] Processing page 5 / 12".
pub struct StderrProgress {
    last_percent: u8,
}

impl StderrProgress {
    pub fn new() -> Self {
        Self { last_percent: 0 }
    }
}

impl Default for StderrProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for StderrProgress {
    fn on_status(&mut self, message: &str) {
        let line = format!("[{:>3}%] {}\n", self.last_percent, message);
        let mut err = std::io::stderr().lock();
        let _ = err.write_all(line.as_bytes());
        let _ = err.flush();
    }

    fn on_progress(&mut self, percent: u8) {
        self.last_percent = percent;
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressSink for JsonProgress {
    fn on_status(&mut self, message: &str) {
        let obj = serde_json::json!({ "event": "status", "message": message });
        emit_json(&obj);
    }

    fn on_progress(&mut self, percent: u8) {
        let obj = serde_json::json!({ "event": "progress", "percent": percent });
        emit_json(&obj);
    }
}

fn emit_json(obj: &serde_json::Value) {
    if let Ok(line) = serde_json::to_string(obj) {
        let mut err = std::io::stderr().lock();
        let _ = writeln!(err, "{}", line);
        let _ = err.flush();
    }
}

/// No-op sink when progress is disabled.
pub struct NoProgress;

impl ProgressSink for NoProgress {}

/// Records every event; handy for tests and for callers that poll.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    pub statuses: Vec<String>,
    pub percents: Vec<u8>,
}

impl ProgressSink for RecordingProgress {
    fn on_status(&mut self, message: &str) {
        self.statuses.push(message.to_string());
    }

    fn on_progress(&mut self, percent: u8) {
        self.percents.push(percent);
    }
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

    pub fn sink(&self) -> Box<dyn ProgressSink> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress::new()),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
