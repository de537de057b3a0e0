use tracing::debug;

use crate::recording::instruction::{Command, CompiledScript, Instruction};
use crate::suggest::suggestion_model::SuggestionBook;
use crate::testcase::combiner::{TestCaseRow, TestCaseTable, combine, per_field_quota};

pub const DEFAULT_TEST_CASE_COUNT: usize = 10;

/// A field the user typed into during the recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedField {
    /// Locator of the `type` instruction, e.g. `id=email`.
    pub locator: String,
    /// Identifier value behind the locator, used as the book key and the
    /// column header.
    pub key: String,
    pub recorded_value: String,
}

/// Book key behind a locator: `id=x` and `name=x` map to `x`; any other
/// locator is used verbatim.
pub fn locator_key(locator: &str) -> &str {
    locator
        .strip_prefix("id=")
        .or_else(|| locator.strip_prefix("name="))
        .unwrap_or(locator)
}

/// Targets of `type` instructions with a non-empty value, first-seen order.
pub fn typed_fields(instructions: &[Instruction]) -> Vec<TypedField> {
    let mut fields: Vec<TypedField> = Vec::new();
    for instruction in instructions {
        if instruction.command != Command::Type || instruction.value.is_empty() {
            continue;
        }
        if fields.iter().any(|f| f.locator == instruction.target) {
            continue;
        }
        fields.push(TypedField {
            locator: instruction.target.clone(),
            key: locator_key(&instruction.target).to_string(),
            recorded_value: instruction.value.clone(),
        });
    }
    fields
}

/// Combine the book's accepted values for every typed field into at most
/// `count` rows. Fields with no accepted values keep their recorded value.
///
/// Each field contributes at most `per_field_quota(fields, count)` values, so
/// the leading columns vary within the first `count` rows instead of
/// staying pinned to their first value.
pub fn build_test_cases(script: &CompiledScript, book: &SuggestionBook, count: usize) -> TestCaseTable {
    let fields = typed_fields(&script.instructions);
    let quota = per_field_quota(fields.len(), count);

    let candidates: Vec<(String, Vec<String>)> = fields
        .iter()
        .map(|field| {
            let values = match book.accepted_values(&field.key) {
                Some(values) => values.iter().take(quota).cloned().collect(),
                None => {
                    debug!(field = %field.key, "no accepted values, using recorded value");
                    vec![field.recorded_value.clone()]
                }
            };
            (field.key.clone(), values)
        })
        .collect();

    combine(&candidates, count)
}

/// The recorded instructions with every typed field's value replaced by the
/// row's value for it. Instructions for other fields are untouched.
pub fn apply_row(instructions: &[Instruction], row: &TestCaseRow) -> Vec<Instruction> {
    instructions
        .iter()
        .map(|instruction| {
            if instruction.command != Command::Type {
                return instruction.clone();
            }
            match row.get(locator_key(&instruction.target)) {
                Some(value) => Instruction::type_text(&instruction.target, value),
                None => instruction.clone(),
            }
        })
        .collect()
}
