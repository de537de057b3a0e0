use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::recording::compiler::CompilerPolicy;
use crate::server::store::{JOURNAL_FILE, RunStore};
use crate::suggest::ai_model::TextInference;
use crate::suggest::analyzer::{EngineSettings, SuggestionEngine};
use crate::suggest::suggestion_model::SuggestionBook;
use crate::trace::logger::Journal;
use crate::trace::trace::TraceEvent;

/// Everything one server run owns; shared by all handlers.
pub struct AppState {
    pub store: RunStore,
    pub book: Mutex<SuggestionBook>,
    pub backend: Arc<dyn TextInference>,
    /// `None` when the journal file could not be opened.
    pub journal: Option<Journal>,
    pub engine: EngineSettings,
    pub compiler: CompilerPolicy,
    pub case_count: usize,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// State for a run directory, picking up a suggestion book left there by
    /// an earlier session.
    pub fn new(
        store: RunStore,
        backend: Arc<dyn TextInference>,
        engine: EngineSettings,
        compiler: CompilerPolicy,
        case_count: usize,
    ) -> Self {
        let book = store.load_book().unwrap_or_default();
        let journal = match Journal::open(&store.path(JOURNAL_FILE)) {
            Ok(journal) => Some(journal),
            Err(e) => {
                warn!(error = %e, "journal disabled for this run");
                None
            }
        };
        Self {
            store,
            book: Mutex::new(book),
            backend,
            journal,
            engine,
            compiler,
            case_count,
        }
    }

    pub fn suggestion_engine(&self) -> SuggestionEngine<'_> {
        SuggestionEngine::new(self.backend.as_ref(), self.engine.clone())
    }

    pub fn book(&self) -> MutexGuard<'_, SuggestionBook> {
        self.book.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record(&self, event: TraceEvent) {
        let Some(journal) = &self.journal else {
            return;
        };
        match journal.append(&event) {
            Ok(line) => debug!(route = %event.route, line, "journaled"),
            Err(e) => warn!(route = %event.route, error = %e, "journal write failed"),
        }
    }
}
