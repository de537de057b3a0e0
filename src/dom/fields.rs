use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::dom::document::{Document, ElementData, NodeId};

/// Input types worth asking the model about.
pub const DEFAULT_INPUT_TYPES: &[&str] = &[
    "text",
    "password",
    "email",
    "number",
    "date",
    "datetime-local",
    "month",
    "range",
    "search",
    "tel",
    "time",
    "url",
    "week",
];

static HIDDEN_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)display\s*:\s*none|visibility\s*:\s*hidden").expect("valid regex")
});

// ============================================================================
// Field identifiers
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    Id,
    Name,
}

/// How a field is addressed across extraction, model queries and
/// confirmation rounds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldIdentifier {
    pub kind: IdentifierKind,
    pub value: String,
}

impl FieldIdentifier {
    pub fn id(value: impl Into<String>) -> Self {
        Self {
            kind: IdentifierKind::Id,
            value: value.into(),
        }
    }

    pub fn name(value: impl Into<String>) -> Self {
        Self {
            kind: IdentifierKind::Name,
            value: value.into(),
        }
    }

    /// Test-script locator for this field, e.g. `id=email`.
    pub fn locator(&self) -> String {
        match self.kind {
            IdentifierKind::Id => format!("id={}", self.value),
            IdentifierKind::Name => format!("name={}", self.value),
        }
    }
}

impl fmt::Display for FieldIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.locator())
    }
}

/// One candidate input field found in a document scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub identifier: FieldIdentifier,
    pub node: NodeId,
    pub tag: String,
    /// Declared input type (`text` when an `input` has none); `None` for
    /// textareas.
    pub input_type: Option<String>,
    pub visible: bool,
}

// ============================================================================
// Extraction policy
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifyBy {
    IdOnly,
    IdOrName,
}

/// Which elements count as fields and how they are identified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPolicy {
    pub input_types: Vec<String>,
    pub identify_by: IdentifyBy,
    pub include_textarea: bool,
}

impl Default for FieldPolicy {
    fn default() -> Self {
        Self {
            input_types: DEFAULT_INPUT_TYPES.iter().map(|t| t.to_string()).collect(),
            identify_by: IdentifyBy::IdOrName,
            include_textarea: true,
        }
    }
}

impl FieldPolicy {
    fn allows_input_type(&self, input_type: &str) -> bool {
        self.input_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(input_type))
    }

    fn identify(&self, el: &ElementData) -> Option<FieldIdentifier> {
        let non_empty = |name: &str| el.attr(name).filter(|v| !v.trim().is_empty());

        if let Some(id) = non_empty("id") {
            return Some(FieldIdentifier::id(id));
        }
        match self.identify_by {
            IdentifyBy::IdOrName => non_empty("name").map(FieldIdentifier::name),
            IdentifyBy::IdOnly => None,
        }
    }
}

// ============================================================================
// Scanning
// ============================================================================

/// Whether an element is hidden by inline style or the `hidden` attribute.
pub fn is_hidden(el: &ElementData) -> bool {
    if el.has_attr("hidden") {
        return true;
    }
    el.attr("style")
        .map(|style| HIDDEN_STYLE.is_match(style))
        .unwrap_or(false)
}

/// Every identifiable input-capable element, visible or not, in document
/// order.
pub fn scan_fields(doc: &Document, policy: &FieldPolicy) -> Vec<FieldDescriptor> {
    doc.elements()
        .filter_map(|(node, el)| {
            let input_type = match el.tag.as_str() {
                "input" => {
                    let declared = el
                        .attr("type")
                        .map(|t| t.trim().to_ascii_lowercase())
                        .filter(|t| !t.is_empty())
                        .unwrap_or_else(|| "text".to_string());
                    if !policy.allows_input_type(&declared) {
                        return None;
                    }
                    Some(declared)
                }
                "textarea" if policy.include_textarea => None,
                _ => return None,
            };

            let identifier = policy.identify(el)?;
            Some(FieldDescriptor {
                identifier,
                node,
                tag: el.tag.clone(),
                input_type,
                visible: !is_hidden(el),
            })
        })
        .collect()
}

/// Visible fields to ask the model about. Duplicated identifiers are kept;
/// consumers de-duplicate when they merge results.
pub fn extract_fields(doc: &Document, policy: &FieldPolicy) -> Vec<FieldDescriptor> {
    scan_fields(doc, policy)
        .into_iter()
        .filter(|f| f.visible)
        .collect()
}
