use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

// ============================================================================
// Recorded events as sent by the browser extension
// ============================================================================

/// Kind of a recorded event (`type` in the extension's JSON).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    Click,
    Change,
    Submit,
    Pageload,
    Popstate,
    Hashchange,
    VerificationCommand,
    /// Anything else, including the extension's own suggestion markers.
    Other(String),
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Click => "click",
            EventKind::Change => "change",
            EventKind::Submit => "submit",
            EventKind::Pageload => "pageload",
            EventKind::Popstate => "popstate",
            EventKind::Hashchange => "hashchange",
            EventKind::VerificationCommand => "verification_command",
            EventKind::Other(s) => s,
        }
    }

    pub fn is_navigation(&self) -> bool {
        matches!(
            self,
            EventKind::Pageload | EventKind::Popstate | EventKind::Hashchange
        )
    }
}

impl From<String> for EventKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "click" => EventKind::Click,
            "change" => EventKind::Change,
            "submit" => EventKind::Submit,
            "pageload" => EventKind::Pageload,
            "popstate" => EventKind::Popstate,
            "hashchange" => EventKind::Hashchange,
            "verification_command" => EventKind::VerificationCommand,
            _ => EventKind::Other(s),
        }
    }
}

impl From<&str> for EventKind {
    fn from(s: &str) -> Self {
        EventKind::from(s.to_string())
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One user or tooling action captured by the extension.
///
/// Only the fields the compiler reads are modelled; everything else the
/// extension sends (`class`, `x`, `y`, suggestion indexes...) is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xpath: Option<String>,

    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<String>,

    /// Milliseconds since the epoch, from `Date.now()`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Processing time spent by the tooling itself (suggestion requests).
    #[serde(
        default,
        alias = "duration",
        alias = "open_delay_ms",
        skip_serializing_if = "Option::is_none"
    )]
    pub duration_ms: Option<u64>,

    /// Pre-formed command of a `verification_command` event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// Pre-formed target of a `verification_command` event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl RecordedEvent {
    pub fn new(kind: impl Into<EventKind>) -> Self {
        Self {
            kind: kind.into(),
            tag: None,
            id: None,
            xpath: None,
            value: None,
            time: None,
            url: None,
            duration_ms: None,
            command: None,
            target: None,
        }
    }

    pub fn at(mut self, time: u64) -> Self {
        self.time = Some(time);
        self
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tag = Some(tag.to_string());
        self
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn with_xpath(mut self, xpath: &str) -> Self {
        self.xpath = Some(xpath.to_string());
        self
    }

    pub fn with_value(mut self, value: &str) -> Self {
        self.value = Some(value.to_string());
        self
    }

    pub fn with_url(mut self, url: &str) -> Self {
        self.url = Some(url.to_string());
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_command(mut self, command: &str, target: &str, value: &str) -> Self {
        self.command = Some(command.to_string());
        self.target = Some(target.to_string());
        self.value = Some(value.to_string());
        self
    }

    /// Non-empty id of the event's element.
    pub fn element_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|s| !s.is_empty())
    }

    pub fn non_empty_url(&self) -> Option<&str> {
        self.url.as_deref().filter(|s| !s.is_empty())
    }
}

/// Recorded values can arrive as numbers or booleans; keep them as text.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// Body of `POST /events` and of saved `recorded_events.json` files, which
/// hold either a bare array or `{"events": [...]}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EventBatch {
    Wrapped { events: Vec<RecordedEvent> },
    Bare(Vec<RecordedEvent>),
}

impl EventBatch {
    pub fn into_events(self) -> Vec<RecordedEvent> {
        match self {
            EventBatch::Wrapped { events } | EventBatch::Bare(events) => events,
        }
    }
}
