use tracing::debug;

use crate::recording::event_model::{EventKind, RecordedEvent};
use crate::recording::instruction::{Command, CompiledScript, Instruction};

pub const DEFAULT_PAUSE_THRESHOLD_MS: i64 = 1000;
pub const DEFAULT_BASE_URL: &str = "http://localhost";

// ============================================================================
// Compiler policy
// ============================================================================

/// What counts as tooling noise, and when a gap deserves a pause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerPolicy {
    /// Event kinds emitted by the suggestion workflow itself.
    pub tooling_kinds: Vec<String>,
    /// Element-id prefixes of elements injected by the extension.
    pub tooling_id_prefixes: Vec<String>,
    /// URL schemes that are not real pages.
    pub internal_schemes: Vec<String>,
    pub pause_threshold_ms: i64,
    pub default_base_url: String,
}

impl Default for CompilerPolicy {
    fn default() -> Self {
        Self {
            tooling_kinds: [
                "suggestion_question_mark_click",
                "suggestion_modal_open",
                "suggestion_request",
                "suggestion_confirm",
                "suggestion_cancel",
                "suggestion_submit",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            tooling_id_prefixes: vec!["suggestion-btn-".into(), "input-suggestion-".into()],
            internal_schemes: [
                "chrome-extension",
                "moz-extension",
                "edge-extension",
                "about",
                "chrome",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            pause_threshold_ms: DEFAULT_PAUSE_THRESHOLD_MS,
            default_base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl CompilerPolicy {
    /// Whether an event was produced by the tooling rather than the user.
    pub fn is_tooling(&self, event: &RecordedEvent) -> bool {
        if self
            .tooling_kinds
            .iter()
            .any(|k| k == event.kind.as_str())
        {
            return true;
        }

        if let Some(id) = event.element_id() {
            if self.tooling_id_prefixes.iter().any(|p| id.starts_with(p.as_str())) {
                return true;
            }
        }

        match event.non_empty_url().and_then(url_scheme) {
            Some(scheme) => self
                .internal_schemes
                .iter()
                .any(|s| s.eq_ignore_ascii_case(scheme)),
            None => false,
        }
    }
}

fn url_scheme(url: &str) -> Option<&str> {
    let (scheme, _) = url.split_once(':')?;
    let valid = !scheme.is_empty()
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some(scheme)
}

// ============================================================================
// Compilation
// ============================================================================

/// Compile a recorded session into test-script instructions.
///
/// `events` is the full, unfiltered recording. Tooling events are dropped
/// from the output but their durations are subtracted from the gaps they
/// fall into before deciding whether a `pause` is needed.
pub fn compile_events(events: &[RecordedEvent], policy: &CompilerPolicy) -> CompiledScript {
    let valid: Vec<&RecordedEvent> = events.iter().filter(|e| !policy.is_tooling(e)).collect();

    let overheads: Vec<i64> = (0..valid.len())
        .map(|i| tooling_overhead(events, &valid, i, policy))
        .collect();

    let mut instructions = Vec::new();
    let mut previous_emission_time: Option<u64> = None;

    for (i, event) in valid.iter().enumerate() {
        let Some(instruction) = map_event(event) else {
            debug!(kind = %event.kind, "no instruction for event");
            continue;
        };

        if let (Some(previous), Some(now)) = (previous_emission_time, event.time) {
            let raw_gap = clamp_ms(now).saturating_sub(clamp_ms(previous));
            let corrected_gap = raw_gap.saturating_sub(overheads[i]);
            if corrected_gap > policy.pause_threshold_ms {
                instructions.push(Instruction::pause(corrected_gap));
            }
        }

        instructions.push(instruction);
        previous_emission_time = event.time;
    }

    CompiledScript {
        base_url: base_url(&valid, policy),
        instructions,
    }
}

/// Sum of tooling durations strictly between valid event `i - 1` and `i`.
pub fn tooling_overhead(
    all: &[RecordedEvent],
    valid: &[&RecordedEvent],
    i: usize,
    policy: &CompilerPolicy,
) -> i64 {
    if i == 0 || i >= valid.len() {
        return 0;
    }
    let (Some(start), Some(end)) = (valid[i - 1].time, valid[i].time) else {
        return 0;
    };

    all.iter()
        .filter(|e| policy.is_tooling(e))
        .filter(|e| e.time.is_some_and(|t| t > start && t < end))
        .map(|e| clamp_ms(e.duration_ms.unwrap_or(0)))
        .fold(0i64, i64::saturating_add)
}

fn clamp_ms(ms: u64) -> i64 {
    i64::try_from(ms).unwrap_or(i64::MAX)
}

/// Target locator: element id, then xpath, then a tag-name CSS selector.
pub fn resolve_locator(event: &RecordedEvent) -> String {
    if let Some(id) = event.element_id() {
        return format!("id={}", id);
    }
    if let Some(xpath) = event.xpath.as_deref().filter(|x| !x.is_empty()) {
        return format!("xpath={}", xpath);
    }
    match event.tag.as_deref().filter(|t| !t.is_empty()) {
        Some(tag) => format!("css={}", tag.to_ascii_lowercase()),
        None => String::new(),
    }
}

/// Map one valid event to its instruction, if it has one.
pub fn map_event(event: &RecordedEvent) -> Option<Instruction> {
    match &event.kind {
        EventKind::VerificationCommand => {
            let command = event.command.as_deref().filter(|c| !c.is_empty())?;
            Some(Instruction::new(
                Command::from(command.to_string()),
                event.target.clone().unwrap_or_default(),
                event.value.clone().unwrap_or_default(),
            ))
        }
        EventKind::Click => Some(Instruction::click(&resolve_locator(event))),
        EventKind::Change => {
            let tag = event.tag.as_deref().unwrap_or("");
            if tag.eq_ignore_ascii_case("input") || tag.eq_ignore_ascii_case("textarea") {
                Some(Instruction::type_text(
                    &resolve_locator(event),
                    event.value.as_deref().unwrap_or(""),
                ))
            } else {
                None
            }
        }
        EventKind::Submit => Some(Instruction::submit(&resolve_locator(event))),
        kind if kind.is_navigation() => event.non_empty_url().map(Instruction::open),
        _ => None,
    }
}

/// `scheme://host[:port]` of the first valid event with a usable URL.
fn base_url(valid: &[&RecordedEvent], policy: &CompilerPolicy) -> String {
    valid
        .iter()
        .filter_map(|e| e.non_empty_url())
        .find_map(origin_of)
        .unwrap_or_else(|| policy.default_base_url.clone())
}

pub fn origin_of(raw: &str) -> Option<String> {
    let parsed = url::Url::parse(raw).ok()?;
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
        None => format!("{}://{}", parsed.scheme(), host),
    })
}
