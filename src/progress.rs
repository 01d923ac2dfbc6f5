//! Index progress reporting.
//!
//! Reports observable progress during `ctxscan index` so users see how many
//! batches are left. Progress is emitted on **stderr** so stdout remains
//! parseable for scripts.

use std::io::Write;

use context_scanner_core::index::{IndexEvent, IndexObserver};

/// Human-friendly progress on stderr: "index  embedding  12 / 40 batches".
pub struct StderrProgress;

impl IndexObserver for StderrProgress {
    fn observe(&self, event: IndexEvent) {
        let line = match event {
            IndexEvent::Chunked {
                documents,
                chunks,
                batches,
            } => format!(
                "index  chunked  {} files into {} chunks ({} batches)\n",
                format_number(documents as u64),
                format_number(chunks as u64),
                format_number(batches as u64)
            ),
            IndexEvent::BatchCommitted { done, total } => format!(
                "index  embedding  {} / {} batches\n",
                format_number(done as u64),
                format_number(total as u64)
            ),
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl IndexObserver for JsonProgress {
    fn observe(&self, event: IndexEvent) {
        let obj = match event {
            IndexEvent::Chunked {
                documents,
                chunks,
                batches,
            } => serde_json::json!({
                "event": "progress",
                "phase": "chunked",
                "documents": documents,
                "chunks": chunks,
                "batches": batches
            }),
            IndexEvent::BatchCommitted { done, total } => serde_json::json!({
                "event": "progress",
                "phase": "embedding",
                "n": done,
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

impl IndexObserver for NoProgress {
    fn observe(&self, _event: IndexEvent) {}
}

pub fn format_number(n: u64) -> String {
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
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
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

    /// Parse the `--progress` flag; `None` picks the TTY default.
    pub fn from_flag(flag: Option<&str>) -> anyhow::Result<Self> {
        match flag {
            None => Ok(Self::default_for_tty()),
            Some("off") => Ok(ProgressMode::Off),
            Some("human") => Ok(ProgressMode::Human),
            Some("json") => Ok(ProgressMode::Json),
            Some(other) => anyhow::bail!(
                "Unknown progress mode: '{}'. Must be off, human, or json.",
                other
            ),
        }
    }

    pub fn observer(&self) -> Box<dyn IndexObserver> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
