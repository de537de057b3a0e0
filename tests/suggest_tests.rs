use recorder_companion::dom::fields::FieldIdentifier;
use recorder_companion::suggest::ai_model::MockTextInference;
use recorder_companion::suggest::analyzer::{EngineSettings, SkipReason, SuggestionEngine};
use recorder_companion::suggest::decode::{
    DecodeError, decode_refinement, decode_string_list, decode_suggestions, strip_code_fences,
};
use recorder_companion::suggest::prompt::{refine_prompt, suggestion_system_prompt};
use recorder_companion::suggest::suggestion_model::{
    ConfirmationRound, FieldSuggestion, SuggestionBook,
};

use crate::common::fixtures::{SIGNUP_PAGE, ScriptedInference};

mod common;

fn suggestion(id: &str, examples: &[&str]) -> FieldSuggestion {
    FieldSuggestion {
        id: id.to_string(),
        limitations: format!("range of {}", id),
        examples: examples.iter().map(|e| e.to_string()).collect(),
        ..FieldSuggestion::default()
    }
}

fn round(field: &str, accepted: &[&str], rejected: &[&str]) -> ConfirmationRound {
    ConfirmationRound {
        field: field.to_string(),
        description: None,
        accepted: accepted.iter().map(|e| e.to_string()).collect(),
        rejected: rejected.iter().map(|e| e.to_string()).collect(),
    }
}

// ============================================================================
// Decoding model output
// ============================================================================

#[test]
fn fenced_array_decodes() {
    let raw = "Sure!\n```json\n[{\"id\":\"email\",\"type\":\"email\",\"range\":\"an address\",\"examples\":[\"a@b.c\"],\"bad_examples\":[\"nope\"]}]\n```\nHope that helps.";
    let records = decode_suggestions(raw).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, "email");
    assert_eq!(records[0].field_type, "email");
    assert_eq!(records[0].limitations, "an address");
    assert_eq!(records[0].examples, vec!["a@b.c"]);
    assert_eq!(records[0].bad_examples, vec!["nope"]);
}

#[test]
fn prose_wrapped_array_decodes() {
    let raw = "Here is the result: [{\"name\":\"q\",\"examples\":[\"x\"]}] as requested.";
    let records = decode_suggestions(raw).unwrap();
    assert_eq!(records[0].name, "q");
}

#[test]
fn single_object_becomes_one_record() {
    let raw = "{\"id\":\"age\",\"examples\":[18, 30],\"bad_examples\":[-1]}";
    let records = decode_suggestions(raw).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].examples, vec!["18", "30"]);
    assert_eq!(records[0].bad_examples, vec!["-1"]);
}

#[test]
fn unparseable_output_keeps_raw_text() {
    let err = decode_suggestions("I cannot do that.").unwrap_err();
    assert_eq!(err.raw(), "I cannot do that.");
    assert!(matches!(err, DecodeError::Unparseable { .. }));
}

#[test]
fn fence_without_language_tag() {
    assert_eq!(strip_code_fences("```\n[1, 2]\n```"), "[1, 2]");
    assert_eq!(strip_code_fences("  plain  "), "plain");
}

#[test]
fn string_list_coerces_scalars() {
    let values = decode_string_list("```json\n[\"a\", 2, true, null, {\"x\":1}]\n```").unwrap();
    assert_eq!(values, vec!["a", "2", "true"]);
    assert!(decode_string_list("{\"a\": 1}").is_err());
}

#[test]
fn refinement_object_and_bare_list() {
    let refined =
        decode_refinement("{\"examples\":[\"1\",\"2\"],\"bad_examples\":[\"-1\"]}").unwrap();
    assert_eq!(refined.examples, vec!["1", "2"]);
    assert_eq!(refined.bad_examples, vec!["-1"]);

    let bare = decode_refinement("Values: [\"x\", \"y\"]").unwrap();
    assert_eq!(bare.examples, vec!["x", "y"]);
    assert!(bare.bad_examples.is_empty());

    assert!(decode_refinement("no idea").is_err());
}

// ============================================================================
// Suggestion records and confirmation rounds
// ============================================================================

#[test]
fn constraint_text_accepts_alternate_keys() {
    let from_limitations: FieldSuggestion =
        serde_json::from_str("{\"id\":\"a\",\"limitations\":\"1-5\"}").unwrap();
    let from_description: FieldSuggestion =
        serde_json::from_str("{\"id\":\"a\",\"description\":\"1-5\"}").unwrap();
    assert_eq!(from_limitations.limitations, "1-5");
    assert_eq!(from_description.limitations, "1-5");

    let json = serde_json::to_value(&from_limitations).unwrap();
    assert_eq!(json["range"], "1-5");
    assert_eq!(json["type"], "");
}

#[test]
fn record_matching_and_binding() {
    let mut record = suggestion("", &["v"]);
    assert!(!record.matches(&FieldIdentifier::id("email")));
    record.bind_to(&FieldIdentifier::id("email"));
    assert!(record.matches(&FieldIdentifier::id("email")));
    assert_eq!(record.field_key(), Some("email"));

    let nameless = FieldSuggestion::default();
    assert_eq!(nameless.field_key(), None);
}

#[test]
fn absorb_unions_examples() {
    let mut a = suggestion("x", &["1", "2"]);
    a.absorb(suggestion("x", &["2", "3"]));
    assert_eq!(a.examples, vec!["1", "2", "3"]);
}

#[test]
fn confirmation_names_field_by_field_name_or_id() {
    let by_field: ConfirmationRound =
        serde_json::from_str("{\"field\":\"f\",\"examples\":[\"1\"]}").unwrap();
    let by_name: ConfirmationRound =
        serde_json::from_str("{\"name\":\"n\",\"id\":\"i\",\"range\":\"r\"}").unwrap();
    let by_id: ConfirmationRound = serde_json::from_str("{\"id\":\"i\"}").unwrap();

    assert_eq!(by_field.field, "f");
    assert_eq!(by_field.accepted, vec!["1"]);
    assert_eq!(by_name.field, "n");
    assert_eq!(by_name.description.as_deref(), Some("r"));
    assert_eq!(by_id.field, "i");
}

// ============================================================================
// Suggestion book
// ============================================================================

#[test]
fn rounds_only_add_values() {
    let mut book = SuggestionBook::default();
    book.apply(&round("age", &["18", "30"], &["-1"]));
    book.apply(&round("age", &["30", "99"], &[]));
    book.apply(&round("age", &[], &[]));

    let set = book.get("age").unwrap();
    assert_eq!(set.accepted, vec!["18", "30", "99"]);
    assert_eq!(set.rejected, vec!["-1"]);
}

#[test]
fn description_is_replaced_only_by_non_blank_text() {
    let mut book = SuggestionBook::default();
    let mut first = round("age", &[], &[]);
    first.description = Some("1 to 120".to_string());
    book.apply(&first);

    let mut blank = round("age", &[], &[]);
    blank.description = Some("  ".to_string());
    book.apply(&blank);
    assert_eq!(book.get("age").unwrap().description, "1 to 120");

    let mut second = round("age", &[], &[]);
    second.description = Some("18 to 65".to_string());
    book.apply(&second);
    assert_eq!(book.get("age").unwrap().description, "18 to 65");
}

#[test]
fn unnamed_round_is_ignored() {
    let mut book = SuggestionBook::default();
    assert!(book.apply(&round("", &["x"], &[])).is_none());
    assert!(book.fields.is_empty());
}

#[test]
fn seeding_keeps_reviewed_description() {
    let mut book = SuggestionBook::default();
    let mut reviewed = round("email", &["mine@x.test"], &[]);
    reviewed.description = Some("company address".to_string());
    book.apply(&reviewed);

    book.seed(&[suggestion("email", &["a@b.c"])]);
    let set = book.get("email").unwrap();
    assert_eq!(set.description, "company address");
    assert_eq!(set.accepted, vec!["mine@x.test", "a@b.c"]);
}

#[test]
fn seeded_field_answers_to_its_name() {
    let mut book = SuggestionBook::default();
    let mut record = suggestion("user-email", &["a@b.c"]);
    record.name = "email".to_string();
    book.seed(&[record]);

    book.apply(&round("email", &["z@y.x"], &[]));
    assert_eq!(book.fields.len(), 1);
    assert_eq!(
        book.accepted_values("user-email").unwrap(),
        &["a@b.c".to_string(), "z@y.x".to_string()][..]
    );
}

#[test]
fn accepted_values_absent_when_empty() {
    let mut book = SuggestionBook::default();
    book.apply(&round("x", &[], &["bad"]));
    assert_eq!(book.accepted_values("x"), None);
    assert_eq!(book.accepted_values("missing"), None);
}

#[test]
fn book_json_round_trip() {
    let mut book = SuggestionBook::default();
    book.apply(&round("a", &["1"], &["2"]));
    let json = serde_json::to_string(&book).unwrap();
    let back: SuggestionBook = serde_json::from_str(&json).unwrap();
    assert_eq!(back, book);
}

// ============================================================================
// Prompts
// ============================================================================

#[test]
fn prompts_ask_for_json() {
    let system = suggestion_system_prompt(3);
    assert!(system.contains("3 valid example values"));
    assert!(system.contains("\"bad_examples\""));

    let refine = refine_prompt("age", "18 to 65", 2);
    assert!(refine.contains("\"age\""));
    assert!(refine.contains("18 to 65"));
    assert!(refine.contains("{\"examples\":[\"\",\"\"],\"bad_examples\":[\"\",\"\"]}"));
}

// ============================================================================
// Engine
// ============================================================================

#[test]
fn every_visible_field_gets_a_suggestion() {
    let backend = ScriptedInference::new();
    let engine = SuggestionEngine::new(&backend, EngineSettings::default());
    let report = engine.suggest(SIGNUP_PAGE);

    assert!(report.skipped.is_empty());
    let keys: Vec<&str> = report
        .suggestions
        .iter()
        .filter_map(|s| s.field_key())
        .collect();
    assert_eq!(keys, vec!["email", "age", "nickname", "bio"]);
    assert_eq!(report.suggestions[0].examples, vec!["email-1", "email-2"]);
    assert_eq!(report.suggestions[2].name, "nickname");
    assert_eq!(backend.prompt_count(), 4);
}

#[test]
fn small_page_is_sent_whole() {
    let backend = ScriptedInference::new();
    SuggestionEngine::new(&backend, EngineSettings::default()).suggest(SIGNUP_PAGE);
    for prompt in backend.prompts.lock().unwrap().iter() {
        assert!(prompt.contains(SIGNUP_PAGE));
    }
}

#[test]
fn large_page_is_truncated_per_field() {
    let filler = vec!["lorem"; 400].join(" ");
    let html = format!(
        "<html><body><div><p>{}</p></div><form><label>Query</label><input id=\"q\"></form></body></html>",
        filler
    );
    let backend = ScriptedInference::new();
    let settings = EngineSettings {
        token_budget: 60,
        truncate_threshold: 100,
        ..EngineSettings::default()
    };
    let report = SuggestionEngine::new(&backend, settings).suggest(&html);

    assert_eq!(report.suggestions.len(), 1);
    let prompts = backend.prompts.lock().unwrap();
    assert!(prompts[0].contains("<input id=\"q\">"));
    assert!(!prompts[0].contains(&filler));
}

#[test]
fn oversized_field_is_skipped_without_a_model_call() {
    let backend = ScriptedInference::new();
    let settings = EngineSettings {
        token_budget: 3,
        truncate_threshold: 1,
        ..EngineSettings::default()
    };
    let report = SuggestionEngine::new(&backend, settings).suggest(SIGNUP_PAGE);

    assert!(report.suggestions.is_empty());
    assert_eq!(report.skipped.len(), 4);
    assert!(
        report
            .skipped
            .iter()
            .all(|s| matches!(s.reason, SkipReason::TooLarge { budget: 3, .. }))
    );
    assert_eq!(backend.prompt_count(), 0);
}

#[test]
fn failing_fields_are_skipped_and_others_survive() {
    let html = r#"<form><input id="ok"><input id="broken"><input id="offline"></form>"#;
    let backend = ScriptedInference::new();
    let settings = EngineSettings {
        max_parallel: 1,
        ..EngineSettings::default()
    };
    let report = SuggestionEngine::new(&backend, settings).suggest(html);

    assert_eq!(report.suggestions.len(), 1);
    assert_eq!(report.suggestions[0].id, "ok");

    assert_eq!(report.skipped.len(), 2);
    assert_eq!(report.skipped[0].identifier, FieldIdentifier::id("broken"));
    assert!(matches!(report.skipped[0].reason, SkipReason::Unparseable { .. }));
    assert_eq!(report.skipped[1].identifier, FieldIdentifier::id("offline"));
    match &report.skipped[1].reason {
        SkipReason::ModelFailed { message } => assert!(message.contains("503")),
        other => panic!("unexpected reason {:?}", other),
    }
}

#[test]
fn duplicate_fields_merge_into_one_record() {
    let html = r#"<form><input name="q"><textarea name="q"></textarea></form>"#;
    let backend = ScriptedInference::new();
    let report = SuggestionEngine::new(&backend, EngineSettings::default()).suggest(html);

    assert_eq!(backend.prompt_count(), 2);
    assert_eq!(report.suggestions.len(), 1);
    assert_eq!(report.suggestions[0].name, "q");
    assert_eq!(report.suggestions[0].examples, vec!["q-1"]);
}

#[test]
fn page_without_fields_yields_empty_report() {
    let backend = ScriptedInference::new();
    let report =
        SuggestionEngine::new(&backend, EngineSettings::default()).suggest("<p>nothing here</p>");
    assert!(report.suggestions.is_empty());
    assert!(report.skipped.is_empty());
    assert_eq!(backend.prompt_count(), 0);
}

#[test]
fn record_without_identifier_is_bound_to_the_field() {
    let backend = MockTextInference::new("[{\"examples\":[\"v\"]}]");
    let report = SuggestionEngine::new(&backend, EngineSettings::default())
        .suggest(r#"<input id="city">"#);
    assert_eq!(report.suggestions[0].id, "city");
}

#[test]
fn empty_record_list_counts_as_unparseable() {
    let backend = MockTextInference::new("[]");
    let report = SuggestionEngine::new(&backend, EngineSettings::default())
        .suggest(r#"<input id="city">"#);
    assert!(report.suggestions.is_empty());
    assert!(matches!(report.skipped[0].reason, SkipReason::Unparseable { .. }));
}

#[test]
fn skip_reasons_serialize_with_tag() {
    let json = serde_json::to_value(SkipReason::TooLarge {
        tokens: 10,
        budget: 5,
    })
    .unwrap();
    assert_eq!(
        json,
        serde_json::json!({"reason": "too_large", "tokens": 10, "budget": 5})
    );
}

// ============================================================================
// Refinement
// ============================================================================

#[test]
fn refine_returns_fresh_examples() {
    let backend = MockTextInference::new("```json\n{\"examples\":[\"20\"],\"bad_examples\":[\"200\"]}\n```");
    let refined = SuggestionEngine::new(&backend, EngineSettings::default())
        .refine("age", "18 to 65")
        .unwrap()
        .unwrap();
    assert_eq!(refined.examples, vec!["20"]);
    assert_eq!(refined.bad_examples, vec!["200"]);
}

#[test]
fn refine_with_unusable_output_is_none() {
    let backend = MockTextInference::new("I am not sure.");
    let refined = SuggestionEngine::new(&backend, EngineSettings::default())
        .refine("age", "18 to 65")
        .unwrap();
    assert!(refined.is_none());
}

#[test]
fn refine_propagates_model_errors() {
    let backend = MockTextInference::failing("down");
    let result = SuggestionEngine::new(&backend, EngineSettings::default()).refine("age", "x");
    assert!(result.is_err());
}
