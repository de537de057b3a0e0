use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::suggest::suggestion_model::FieldSuggestion;

static FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[A-Za-z0-9_-]*\s*\n?(.*?)```").expect("valid regex"));
static ARRAY_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\[.*\]").expect("valid regex"));
static OBJECT_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Nothing in the text could be read as the expected JSON shape.
    #[error("model output is not valid structured data")]
    Unparseable { raw: String },
}

impl DecodeError {
    pub fn raw(&self) -> &str {
        match self {
            DecodeError::Unparseable { raw } => raw,
        }
    }
}

/// Body of a fenced code block, if the text has one.
pub fn strip_code_fences(text: &str) -> &str {
    match FENCE.captures(text).and_then(|c| c.get(1)) {
        Some(body) => body.as_str().trim(),
        None => text.trim(),
    }
}

/// Decode a list of `T` from free-form model output.
///
/// Tries, in order: the whole (unfenced) text as an array, as a single
/// object, then the outermost `[...]` span, then the outermost `{...}` span.
pub fn decode_list<T: DeserializeOwned>(raw: &str) -> Result<Vec<T>, DecodeError> {
    let text = strip_code_fences(raw);

    let candidates = [
        Some(text),
        ARRAY_SPAN.find(text).map(|m| m.as_str()),
        OBJECT_SPAN.find(text).map(|m| m.as_str()),
    ];

    for candidate in candidates.into_iter().flatten() {
        if let Ok(list) = serde_json::from_str::<Vec<T>>(candidate) {
            return Ok(list);
        }
        if let Ok(single) = serde_json::from_str::<T>(candidate) {
            return Ok(vec![single]);
        }
    }

    Err(DecodeError::Unparseable {
        raw: raw.to_string(),
    })
}

pub fn decode_suggestions(raw: &str) -> Result<Vec<FieldSuggestion>, DecodeError> {
    decode_list(raw)
}

fn scalar_strings(values: Vec<serde_json::Value>) -> Vec<String> {
    values
        .into_iter()
        .filter_map(|v| match v {
            serde_json::Value::String(s) => Some(s),
            serde_json::Value::Null
            | serde_json::Value::Array(_)
            | serde_json::Value::Object(_) => None,
            other => Some(other.to_string()),
        })
        .collect()
}

/// Decode a bare list of example values; numbers and booleans become strings.
pub fn decode_string_list(raw: &str) -> Result<Vec<String>, DecodeError> {
    let text = strip_code_fences(raw);
    let candidates = [Some(text), ARRAY_SPAN.find(text).map(|m| m.as_str())];
    candidates
        .into_iter()
        .flatten()
        .find_map(|c| serde_json::from_str::<Vec<serde_json::Value>>(c).ok())
        .map(scalar_strings)
        .ok_or_else(|| DecodeError::Unparseable {
            raw: raw.to_string(),
        })
}

/// Fresh examples for an updated constraint.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Refinement {
    pub examples: Vec<String>,
    pub bad_examples: Vec<String>,
}

/// Decode `{"examples": [...], "bad_examples": [...]}`, or a bare array of
/// examples.
pub fn decode_refinement(raw: &str) -> Result<Refinement, DecodeError> {
    let text = strip_code_fences(raw);
    let object = [Some(text), OBJECT_SPAN.find(text).map(|m| m.as_str())]
        .into_iter()
        .flatten()
        .find_map(|c| serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(c).ok());

    if let Some(mut object) = object {
        let mut take = |key: &str| match object.remove(key) {
            Some(serde_json::Value::Array(items)) => scalar_strings(items),
            Some(other) => scalar_strings(vec![other]),
            None => Vec::new(),
        };
        let refinement = Refinement {
            examples: take("examples"),
            bad_examples: take("bad_examples"),
        };
        if !refinement.examples.is_empty() || !refinement.bad_examples.is_empty() {
            return Ok(refinement);
        }
    }

    decode_string_list(raw).map(|examples| Refinement {
        examples,
        bad_examples: Vec::new(),
    })
}
