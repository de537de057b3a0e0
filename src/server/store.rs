use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::CompanionError;
use crate::recording::event_model::RecordedEvent;
use crate::recording::instruction::Instruction;
use crate::suggest::suggestion_model::{FieldSuggestion, SuggestionBook};
use crate::trace::trace::html_fingerprint;

pub const EVENTS_FILE: &str = "recorded_events.json";
pub const SUGGESTIONS_FILE: &str = "suggested_inputs.json";
pub const UPDATES_FILE: &str = "input_suggestion_updates.json";
pub const BOOK_FILE: &str = "suggestion_book.json";
pub const SCRIPT_FILE: &str = "test_script.html";
pub const INSTRUCTIONS_FILE: &str = "instructions.json";
pub const TEST_CASES_FILE: &str = "test_cases.csv";
pub const JOURNAL_FILE: &str = "journal.jsonl";

/// Body of `POST /snapshot`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "eventType")]
    pub event_type: String,
    /// `Date.now()` of the capture; kept as sent.
    #[serde(default)]
    pub time: serde_json::Value,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub css: String,
    #[serde(default)]
    pub event: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotOutcome {
    pub base_name: String,
    pub fingerprint: String,
    /// Same HTML as the previous snapshot of this run.
    pub unchanged: bool,
}

/// One directory per server run holding everything the extension sends and
/// everything generated from it.
pub struct RunStore {
    dir: PathBuf,
    last_fingerprint: Mutex<Option<String>>,
}

impl RunStore {
    /// Create `<base>/run_<unix_secs>_<uuid8>/`.
    pub fn create(base: &Path) -> Result<Self, CompanionError> {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let dir = base.join(format!("run_{}_{}", secs, &suffix[..8]));
        fs::create_dir_all(&dir)
            .map_err(|e| CompanionError::io(format!("creating {}", dir.display()), e))?;
        info!(dir = %dir.display(), "run directory created");
        Ok(Self::open(dir))
    }

    /// Use an existing run directory.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            last_fingerprint: Mutex::new(None),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    // ------------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------------

    /// Write `<eventType>_<time>.html`, `.css` and `_event.json`.
    pub fn save_snapshot(&self, snapshot: &Snapshot) -> Result<SnapshotOutcome, CompanionError> {
        let time = match &snapshot.time {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let base_name = format!(
            "{}_{}",
            sanitize_component(&snapshot.event_type),
            sanitize_component(&time)
        );

        self.write_text(&format!("{}.html", base_name), &snapshot.html)?;
        self.write_text(&format!("{}.css", base_name), &snapshot.css)?;

        let event_file = format!("{}_event.json", base_name);
        if snapshot.event_type == "pageload" {
            let record = serde_json::json!({
                "eventType": "pageload",
                "time": snapshot.time,
                "url": snapshot.url,
            });
            self.write_json(&event_file, &record)?;
        } else if let Some(event) = snapshot.event.as_ref().filter(|e| !e.is_null()) {
            self.write_json(&event_file, event)?;
        }

        let fingerprint = html_fingerprint(&snapshot.html);
        let unchanged = {
            let mut last = self
                .last_fingerprint
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let unchanged = last.as_deref() == Some(fingerprint.as_str());
            *last = Some(fingerprint.clone());
            unchanged
        };

        debug!(snapshot = %base_name, unchanged, "snapshot stored");
        Ok(SnapshotOutcome {
            base_name,
            fingerprint,
            unchanged,
        })
    }

    // ------------------------------------------------------------------------
    // Events, suggestions, book
    // ------------------------------------------------------------------------

    pub fn save_events(&self, events: &[RecordedEvent]) -> Result<(), CompanionError> {
        self.write_json(EVENTS_FILE, &events)
    }

    /// Events of the last `POST /events`, if any were stored.
    pub fn load_events(&self) -> Result<Option<Vec<RecordedEvent>>, CompanionError> {
        self.read_json(EVENTS_FILE)
    }

    pub fn save_suggestions(&self, suggestions: &[FieldSuggestion]) -> Result<(), CompanionError> {
        self.write_json(SUGGESTIONS_FILE, &suggestions)
    }

    /// Append one update request to `input_suggestion_updates.json`.
    pub fn append_update(&self, update: &serde_json::Value) -> Result<usize, CompanionError> {
        let mut updates: Vec<serde_json::Value> = self.read_json(UPDATES_FILE)?.unwrap_or_default();
        updates.push(update.clone());
        self.write_json(UPDATES_FILE, &updates)?;
        Ok(updates.len())
    }

    pub fn save_book(&self, book: &SuggestionBook) -> Result<(), CompanionError> {
        self.write_json(BOOK_FILE, book)
    }

    pub fn load_book(&self) -> Result<SuggestionBook, CompanionError> {
        Ok(self.read_json(BOOK_FILE)?.unwrap_or_default())
    }

    // ------------------------------------------------------------------------
    // Generated outputs
    // ------------------------------------------------------------------------

    pub fn save_script(&self, html: &str, instructions: &[Instruction]) -> Result<(), CompanionError> {
        self.write_text(SCRIPT_FILE, html)?;
        self.write_json(INSTRUCTIONS_FILE, &instructions)
    }

    /// Write `test_cases.csv` and `test_case_<n>.html` (1-based).
    pub fn save_test_cases(&self, csv: &str, scripts: &[String]) -> Result<(), CompanionError> {
        self.write_text(TEST_CASES_FILE, csv)?;
        for (n, script) in scripts.iter().enumerate() {
            self.write_text(&format!("test_case_{}.html", n + 1), script)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // File helpers
    // ------------------------------------------------------------------------

    fn write_text(&self, file: &str, content: &str) -> Result<(), CompanionError> {
        let path = self.path(file);
        fs::write(&path, content)
            .map_err(|e| CompanionError::io(format!("writing {}", path.display()), e))
    }

    fn write_json<T: Serialize + ?Sized>(&self, file: &str, value: &T) -> Result<(), CompanionError> {
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| CompanionError::json_serialize(file, e))?;
        self.write_text(file, &json)
    }

    fn read_json<T: DeserializeOwned>(&self, file: &str) -> Result<Option<T>, CompanionError> {
        let path = self.path(file);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CompanionError::io(format!("reading {}", path.display()), e)),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| CompanionError::json_parse(file, e))
    }
}

/// Keep a client-supplied name component inside the run directory.
fn sanitize_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .collect();
    match cleaned.trim_matches('.') {
        "" => "unknown".to_string(),
        trimmed => trimmed.to_string(),
    }
}
