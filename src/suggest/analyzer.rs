use serde::Serialize;
use tracing::{debug, info, warn};

use crate::dom::document::Document;
use crate::dom::fields::{FieldDescriptor, FieldIdentifier, FieldPolicy, extract_fields};
use crate::dom::tokens::count_tokens;
use crate::dom::truncate::{
    DEFAULT_TOKEN_BUDGET, DEFAULT_TRUNCATE_THRESHOLD, TruncateError, truncate_context,
};
use crate::error::CompanionError;
use crate::suggest::ai_model::TextInference;
use crate::suggest::decode::{Refinement, decode_refinement, decode_suggestions};
use crate::suggest::prompt::{
    REFINE_SYSTEM_PROMPT, refine_prompt, suggestion_system_prompt, suggestion_user_prompt,
};
use crate::suggest::suggestion_model::FieldSuggestion;

// ============================================================================
// Settings and report
// ============================================================================

#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Token budget of one per-field context fragment.
    pub token_budget: usize,
    /// Documents at or under this many tokens are sent whole.
    pub truncate_threshold: usize,
    /// Concurrent model requests.
    pub max_parallel: usize,
    pub field_policy: FieldPolicy,
    pub examples_per_field: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            token_budget: DEFAULT_TOKEN_BUDGET,
            truncate_threshold: DEFAULT_TRUNCATE_THRESHOLD,
            max_parallel: 4,
            field_policy: FieldPolicy::default(),
            examples_per_field: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// The field's own markup does not fit the token budget.
    TooLarge { tokens: usize, budget: usize },
    ModelFailed { message: String },
    Unparseable { raw: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedField {
    pub identifier: FieldIdentifier,
    #[serde(flatten)]
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SuggestionReport {
    /// One record per distinct field identifier, in document order.
    pub suggestions: Vec<FieldSuggestion>,
    pub skipped: Vec<SkippedField>,
}

enum FieldOutcome {
    Suggested(FieldSuggestion),
    Skipped(SkipReason),
}

// ============================================================================
// Engine
// ============================================================================

/// Runs the per-field model round trip over a captured page.
pub struct SuggestionEngine<'a> {
    backend: &'a dyn TextInference,
    settings: EngineSettings,
}

impl<'a> SuggestionEngine<'a> {
    pub fn new(backend: &'a dyn TextInference, settings: EngineSettings) -> Self {
        Self { backend, settings }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Extract the page's fields and ask the model about each one.
    ///
    /// Fields are queried in parallel batches of `max_parallel`; results are
    /// combined by identifier, so duplicate fields in the page produce one
    /// merged record.
    pub fn suggest(&self, html: &str) -> SuggestionReport {
        let doc = Document::parse(html);
        let fields = extract_fields(&doc, &self.settings.field_policy);
        let doc_tokens = count_tokens(html);
        let whole_page = doc_tokens <= self.settings.truncate_threshold;

        info!(
            fields = fields.len(),
            tokens = doc_tokens,
            truncate = !whole_page,
            "suggesting field values"
        );

        let system = suggestion_system_prompt(self.settings.examples_per_field);
        let chunk = self.settings.max_parallel.max(1);
        let mut outcomes: Vec<(FieldIdentifier, FieldOutcome)> = Vec::with_capacity(fields.len());

        for batch in fields.chunks(chunk) {
            let results: Vec<FieldOutcome> = std::thread::scope(|scope| {
                let handles: Vec<_> = batch
                    .iter()
                    .map(|field| {
                        let doc = &doc;
                        let system = system.as_str();
                        scope.spawn(move || {
                            let context = if whole_page { Some(html) } else { None };
                            self.query_field(doc, field, context, system)
                        })
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|h| {
                        h.join().unwrap_or_else(|_| {
                            FieldOutcome::Skipped(SkipReason::ModelFailed {
                                message: "worker panicked".to_string(),
                            })
                        })
                    })
                    .collect()
            });
            outcomes.extend(batch.iter().map(|f| f.identifier.clone()).zip(results));
        }

        let mut report = SuggestionReport::default();
        let mut seen: Vec<FieldIdentifier> = Vec::new();
        for (identifier, outcome) in outcomes {
            match outcome {
                FieldOutcome::Suggested(suggestion) => {
                    match seen.iter().position(|s| *s == identifier) {
                        Some(pos) => report.suggestions[pos].absorb(suggestion),
                        None => {
                            seen.push(identifier);
                            report.suggestions.push(suggestion);
                        }
                    }
                }
                FieldOutcome::Skipped(reason) => {
                    warn!(field = %identifier, ?reason, "field skipped");
                    report.skipped.push(SkippedField { identifier, reason });
                }
            }
        }
        report
    }

    fn query_field(
        &self,
        doc: &Document,
        field: &FieldDescriptor,
        whole_page: Option<&str>,
        system: &str,
    ) -> FieldOutcome {
        let truncated;
        let context = match whole_page {
            Some(html) => html,
            None => match truncate_context(doc, field.node, self.settings.token_budget) {
                Ok(t) => {
                    debug!(field = %field.identifier, tokens = t.tokens, "context truncated");
                    truncated = t.html;
                    truncated.as_str()
                }
                Err(TruncateError::TargetTooLarge { tokens, budget }) => {
                    return FieldOutcome::Skipped(SkipReason::TooLarge { tokens, budget });
                }
                Err(TruncateError::InvalidBudget) => {
                    return FieldOutcome::Skipped(SkipReason::TooLarge {
                        tokens: 0,
                        budget: 0,
                    });
                }
            },
        };

        let user = suggestion_user_prompt(field, context);
        let raw = match self.backend.infer(system, &user) {
            Ok(raw) => raw,
            Err(e) => {
                return FieldOutcome::Skipped(SkipReason::ModelFailed {
                    message: e.to_string(),
                });
            }
        };

        match decode_suggestions(&raw) {
            Ok(records) if !records.is_empty() => {
                FieldOutcome::Suggested(pick_record(records, &field.identifier))
            }
            Ok(_) => FieldOutcome::Skipped(SkipReason::Unparseable { raw }),
            Err(e) => FieldOutcome::Skipped(SkipReason::Unparseable {
                raw: e.raw().to_string(),
            }),
        }
    }

    /// Ask for fresh examples after the user changed a field's description.
    pub fn refine(&self, field: &str, description: &str) -> Result<Option<Refinement>, CompanionError> {
        let prompt = refine_prompt(field, description, self.settings.examples_per_field);
        let raw = self.backend.infer(REFINE_SYSTEM_PROMPT, &prompt)?;
        match decode_refinement(&raw) {
            Ok(refinement) => Ok(Some(refinement)),
            Err(e) => {
                warn!(field, error = %e, "refinement output unparseable");
                Ok(None)
            }
        }
    }
}

/// The record about `identifier` if the model returned several, else the
/// first one; the identifier is filled in when the model left it blank.
fn pick_record(records: Vec<FieldSuggestion>, identifier: &FieldIdentifier) -> FieldSuggestion {
    let pos = records.iter().position(|r| r.matches(identifier)).unwrap_or(0);
    let mut record = records.into_iter().nth(pos).unwrap_or_default();
    record.bind_to(identifier);
    record
}
