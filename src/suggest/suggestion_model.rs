use serde::{Deserialize, Deserializer, Serialize};

use crate::dom::fields::{FieldIdentifier, IdentifierKind};

// ============================================================================
// Model output for one field
// ============================================================================

/// What the model infers about one input field.
///
/// Serialized with the key names the extension reads (`range`, `examples`,
/// `bad_examples`); the constraint text is also accepted as `limitations` or
/// `description`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "RawFieldSuggestion")]
pub struct FieldSuggestion {
    pub name: String,
    pub id: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(rename = "range")]
    pub limitations: String,
    pub examples: Vec<String>,
    pub bad_examples: Vec<String>,
}

/// Wire shape as models actually produce it: any key may be missing, and
/// scalars show up where strings are expected.
#[derive(Deserialize)]
struct RawFieldSuggestion {
    #[serde(default, deserialize_with = "lenient_text")]
    name: String,
    #[serde(default, deserialize_with = "lenient_text")]
    id: String,
    #[serde(default, rename = "type", deserialize_with = "lenient_text")]
    field_type: String,
    #[serde(default, deserialize_with = "lenient_text")]
    range: String,
    #[serde(default, deserialize_with = "lenient_text")]
    limitations: String,
    #[serde(default, deserialize_with = "lenient_text")]
    description: String,
    #[serde(default, deserialize_with = "lenient_list")]
    examples: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    bad_examples: Vec<String>,
}

impl From<RawFieldSuggestion> for FieldSuggestion {
    fn from(raw: RawFieldSuggestion) -> Self {
        let limitations = [raw.range, raw.limitations, raw.description]
            .into_iter()
            .find(|s| !s.is_empty())
            .unwrap_or_default();
        Self {
            name: raw.name,
            id: raw.id,
            field_type: raw.field_type,
            limitations,
            examples: raw.examples,
            bad_examples: raw.bad_examples,
        }
    }
}

impl FieldSuggestion {
    /// Whether this record is about the field named by `identifier`.
    pub fn matches(&self, identifier: &FieldIdentifier) -> bool {
        match identifier.kind {
            IdentifierKind::Id => self.id == identifier.value,
            IdentifierKind::Name => self.name == identifier.value,
        }
    }

    /// Key used for the field in the suggestion book: id, else name.
    pub fn field_key(&self) -> Option<&str> {
        [self.id.as_str(), self.name.as_str()]
            .into_iter()
            .find(|s| !s.is_empty())
    }

    /// Fill in whichever identifier the record left blank.
    pub fn bind_to(&mut self, identifier: &FieldIdentifier) {
        match identifier.kind {
            IdentifierKind::Id if self.id.is_empty() => self.id = identifier.value.clone(),
            IdentifierKind::Name if self.name.is_empty() => self.name = identifier.value.clone(),
            _ => {}
        }
    }

    /// Union another record's examples into this one.
    pub fn absorb(&mut self, other: FieldSuggestion) {
        push_unique(&mut self.examples, other.examples);
        push_unique(&mut self.bad_examples, other.bad_examples);
        if self.limitations.is_empty() {
            self.limitations = other.limitations;
        }
        if self.field_type.is_empty() {
            self.field_type = other.field_type;
        }
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(scalar_text(value).unwrap_or_default())
}

/// Accept a list of scalars (numbers become strings) or a single scalar.
fn lenient_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Array(items) => items.into_iter().filter_map(scalar_text).collect(),
        other => scalar_text(other).into_iter().collect(),
    })
}

fn scalar_text(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        other => Some(other.to_string()),
    }
}

// ============================================================================
// Confirmed value sets
// ============================================================================

/// A user-reviewed update to one field's values.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "RawConfirmation")]
pub struct ConfirmationRound {
    pub field: String,
    #[serde(rename = "range")]
    pub description: Option<String>,
    #[serde(rename = "examples")]
    pub accepted: Vec<String>,
    #[serde(rename = "bad_examples")]
    pub rejected: Vec<String>,
}

/// Body of the extension's `update_input_suggestion` / `confirm_suggestion`
/// requests. The field is named by `field`, or by `name` / `id`.
#[derive(Deserialize)]
struct RawConfirmation {
    #[serde(default, deserialize_with = "lenient_text")]
    field: String,
    #[serde(default, deserialize_with = "lenient_text")]
    name: String,
    #[serde(default, deserialize_with = "lenient_text")]
    id: String,
    #[serde(default)]
    range: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    examples: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    bad_examples: Vec<String>,
}

impl From<RawConfirmation> for ConfirmationRound {
    fn from(raw: RawConfirmation) -> Self {
        let field = [raw.field, raw.name, raw.id]
            .into_iter()
            .find(|s| !s.is_empty())
            .unwrap_or_default();
        Self {
            field,
            description: raw.range,
            accepted: raw.examples,
            rejected: raw.bad_examples,
        }
    }
}

/// Accepted and rejected example values for one field.
///
/// Values are ordered and unique. Rounds only ever add values; the
/// description is the one thing a round can replace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValueSet {
    pub field: String,
    /// Other identifiers of the same field (its name when keyed by id).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub accepted: Vec<String>,
    #[serde(default)]
    pub rejected: Vec<String>,
}

impl FieldValueSet {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            aliases: Vec::new(),
            description: String::new(),
            accepted: Vec::new(),
            rejected: Vec::new(),
        }
    }

    pub fn answers_to(&self, field: &str) -> bool {
        self.field == field || self.aliases.iter().any(|a| a == field)
    }

    pub fn confirm(&mut self, round: &ConfirmationRound) {
        if let Some(description) = round.description.as_deref() {
            if !description.trim().is_empty() {
                self.description = description.to_string();
            }
        }
        push_unique(&mut self.accepted, round.accepted.iter().cloned());
        push_unique(&mut self.rejected, round.rejected.iter().cloned());
    }

    /// Merge a fresh model suggestion without touching a reviewed description.
    pub fn absorb_suggestion(&mut self, suggestion: &FieldSuggestion) {
        if self.description.is_empty() {
            self.description = suggestion.limitations.clone();
        }
        push_unique(&mut self.accepted, suggestion.examples.iter().cloned());
        push_unique(&mut self.rejected, suggestion.bad_examples.iter().cloned());
    }
}

fn push_unique(target: &mut Vec<String>, values: impl IntoIterator<Item = String>) {
    for value in values {
        if !target.contains(&value) {
            target.push(value);
        }
    }
}

/// Every field's value set for one run, in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SuggestionBook {
    #[serde(default)]
    pub fields: Vec<FieldValueSet>,
}

impl SuggestionBook {
    pub fn get(&self, field: &str) -> Option<&FieldValueSet> {
        self.fields.iter().find(|f| f.answers_to(field))
    }

    pub fn entry(&mut self, field: &str) -> &mut FieldValueSet {
        let pos = match self.fields.iter().position(|f| f.answers_to(field)) {
            Some(pos) => pos,
            None => {
                self.fields.push(FieldValueSet::new(field));
                self.fields.len() - 1
            }
        };
        &mut self.fields[pos]
    }

    /// Seed from a model run; records without any identifier are ignored.
    /// A record carrying both an id and a name is keyed by the id and
    /// reachable by either.
    pub fn seed(&mut self, suggestions: &[FieldSuggestion]) {
        for suggestion in suggestions {
            let Some(key) = suggestion.field_key() else {
                continue;
            };
            let set = self.entry(key);
            set.absorb_suggestion(suggestion);
            let name = suggestion.name.as_str();
            if !name.is_empty() && !set.answers_to(name) {
                set.aliases.push(name.to_string());
            }
        }
    }

    /// Apply a confirmation round. Rounds without a field name are ignored.
    pub fn apply(&mut self, round: &ConfirmationRound) -> Option<&FieldValueSet> {
        if round.field.is_empty() {
            return None;
        }
        let set = self.entry(&round.field);
        set.confirm(round);
        Some(set)
    }

    /// Accepted values for a field, if any were recorded.
    pub fn accepted_values(&self, field: &str) -> Option<&[String]> {
        self.get(field)
            .map(|f| f.accepted.as_slice())
            .filter(|values| !values.is_empty())
    }
}
