use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::error::CompanionError;
use crate::trace::trace::TraceEvent;

// ============================================================================
// Run journal
// ============================================================================

/// A run's `journal.jsonl`: one `TraceEvent` per line, appended in the order
/// requests finished. Reopening an existing journal continues its numbering.
pub struct Journal {
    path: PathBuf,
    sink: Mutex<JournalSink>,
}

struct JournalSink {
    file: File,
    entries: usize,
}

impl Journal {
    pub fn open(path: &Path) -> Result<Self, CompanionError> {
        let entries = match fs::read_to_string(path) {
            Ok(content) => content.lines().filter(|l| !l.trim().is_empty()).count(),
            Err(_) => 0,
        };
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| CompanionError::io(format!("opening {}", path.display()), e))?;

        Ok(Self {
            path: path.to_path_buf(),
            sink: Mutex::new(JournalSink { file, entries }),
        })
    }

    /// Append one event; returns its 1-based line number.
    pub fn append(&self, event: &TraceEvent) -> Result<usize, CompanionError> {
        let line = serde_json::to_string(event)
            .map_err(|e| CompanionError::json_serialize("journal event", e))?;

        let mut sink = self.sink.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        writeln!(sink.file, "{}", line)
            .map_err(|e| CompanionError::io(format!("appending to {}", self.path.display()), e))?;
        sink.entries += 1;
        Ok(sink.entries)
    }

    pub fn len(&self) -> usize {
        self.sink.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).entries
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Console logging
// ============================================================================

/// Filter directive for a `-v` count: 0 = info, 1 = debug, 2+ = trace.
pub fn verbosity_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the `-v` count.
pub fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity_filter(verbose)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
