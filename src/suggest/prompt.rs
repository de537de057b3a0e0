use crate::dom::fields::{FieldDescriptor, IdentifierKind};

/// System prompt for the per-field suggestion request.
pub fn suggestion_system_prompt(examples_per_field: usize) -> String {
    format!(
        r#"You are an experienced software tester.

You will receive the HTML of a web page (or the part of it around one input
field) and the identifier of one input field on that page. For that field:

1. Determine its type (text, email, password, number, date, ...).
2. Read the label, placeholder and surrounding text.
3. Describe the valid range and format of its input, based on your
   understanding of the field (for example "integer from 1 to 5", "a valid
   email address", "date as YYYY-MM-DD"). This is required.
4. Produce {n} valid example values for testing. This is required.
5. Produce {n} invalid values that the field should reject.

Respond ONLY with JSON in exactly this format, no explanation:
[{{"name":"","id":"","type":"","range":"","examples":["",""],"bad_examples":["",""]}}]"#,
        n = examples_per_field.max(1)
    )
}

/// User prompt naming the field and carrying its HTML context.
pub fn suggestion_user_prompt(field: &FieldDescriptor, html: &str) -> String {
    let key = match field.identifier.kind {
        IdentifierKind::Id => "id",
        IdentifierKind::Name => "name",
    };
    let kind = field
        .input_type
        .as_deref()
        .map(|t| format!("<{} type=\"{}\">", field.tag, t))
        .unwrap_or_else(|| format!("<{}>", field.tag));

    format!(
        "Field: {} with {}=\"{}\"\n\nThis is the web page:\n{}\n\nGive me the requested output for this field.",
        kind, key, field.identifier.value, html
    )
}

pub const REFINE_SYSTEM_PROMPT: &str = "You are an experienced software tester. Respond ONLY with JSON, no explanation.";

/// Prompt asking for fresh values after the user edited a field's range.
pub fn refine_prompt(field: &str, description: &str, examples_per_field: usize) -> String {
    format!(
        r#"A field "{field}" on a website accepts input with this range and format:
{description}

Generate {n} valid test values for this range and {n} values that violate it.
Respond in exactly this format:
{{"examples":["",""],"bad_examples":["",""]}}"#,
        n = examples_per_field.max(1)
    )
}
