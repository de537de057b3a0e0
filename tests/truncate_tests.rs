use recorder_companion::dom::document::{Document, NodeId};
use recorder_companion::dom::tokens::count_tokens;
use recorder_companion::dom::truncate::{
    TruncateError, following_subtrees, preceding_subtrees, truncate_context,
};

use crate::common::fixtures::SIGNUP_PAGE;

mod common;

fn long_text(words: usize) -> String {
    vec!["lorem"; words].join(" ")
}

// ============================================================================
// Failure outcomes
// ============================================================================

#[test]
fn zero_budget_is_rejected() {
    let doc = Document::parse(SIGNUP_PAGE);
    let email = doc.find_by_id("email").unwrap();
    assert_eq!(truncate_context(&doc, email, 0), Err(TruncateError::InvalidBudget));
}

#[test]
fn target_at_budget_is_too_large() {
    let doc = Document::parse(SIGNUP_PAGE);
    let email = doc.find_by_id("email").unwrap();
    let tokens = count_tokens(&doc.outer_html(email));

    assert_eq!(
        truncate_context(&doc, email, tokens),
        Err(TruncateError::TargetTooLarge {
            tokens,
            budget: tokens
        })
    );
    assert!(truncate_context(&doc, email, tokens + 1).is_ok());
}

#[test]
fn oversized_textarea_is_too_large() {
    let html = format!(
        "<form><textarea id=\"t\">{}</textarea></form>",
        long_text(500)
    );
    let doc = Document::parse(&html);
    let t = doc.find_by_id("t").unwrap();
    assert!(matches!(
        truncate_context(&doc, t, 100),
        Err(TruncateError::TargetTooLarge { budget: 100, .. })
    ));
}

// ============================================================================
// Fragment shape
// ============================================================================

#[test]
fn tight_budget_returns_target_only() {
    let doc = Document::parse(SIGNUP_PAGE);
    let email = doc.find_by_id("email").unwrap();
    let target_html = doc.outer_html(email);
    let tokens = count_tokens(&target_html);

    let result = truncate_context(&doc, email, tokens + 1).unwrap();
    assert_eq!(result.html, target_html);
    assert_eq!(result.ancestors_kept, 0);
    assert_eq!(result.before_nodes, 0);
    assert_eq!(result.after_nodes, 0);
}

#[test]
fn generous_budget_keeps_whole_context() {
    let doc = Document::parse(SIGNUP_PAGE);
    let age = doc.find_by_id("age").unwrap();
    let budget = count_tokens(SIGNUP_PAGE) * 4;

    let result = truncate_context(&doc, age, budget).unwrap();
    assert!(result.html.contains(&doc.outer_html(age)));
    assert!(result.html.contains("<form id=\"signup\">"));
    assert!(result.html.contains("id=\"email\""));
    assert!(result.html.contains("id=\"bio\""));
    assert!(result.html.contains("Sign up"));
    assert_eq!(result.ancestors_kept, 3);
    assert!(result.tokens <= budget);
}

#[test]
fn context_is_restored_to_document_order() {
    let doc = Document::parse(
        "<div><p>one</p><p>two</p><input id=\"t\"><p>three</p><p>four</p></div>",
    );
    let t = doc.find_by_id("t").unwrap();
    let result = truncate_context(&doc, t, 1_000).unwrap();

    let pos = |needle: &str| result.html.find(needle).unwrap();
    assert!(pos("one") < pos("two"));
    assert!(pos("two") < pos("<input id=\"t\">"));
    assert!(pos("<input id=\"t\">") < pos("three"));
    assert!(pos("three") < pos("four"));
}

#[test]
fn packing_stops_at_first_overflow() {
    // the nearest preceding sibling is too big; the small one behind it is
    // never considered
    let html = format!(
        "<div id=\"wrap\"><p>small</p><p>{}</p><input id=\"t\"></div>",
        long_text(200)
    );
    let doc = Document::parse(&html);
    let t = doc.find_by_id("t").unwrap();

    let result = truncate_context(&doc, t, 200).unwrap();
    assert_eq!(result.before_nodes, 0);
    assert!(!result.html.contains("small"));
    assert!(result.html.contains("<div id=\"wrap\"><input id=\"t\"></div>"));
}

#[test]
fn ancestor_wrapping_stops_below_eighty_percent() {
    let doc = Document::parse("<section id=\"s\"><input id=\"t\"></section>");
    let t = doc.find_by_id("t").unwrap();
    let wrapped_tokens = count_tokens("<section id=\"s\"><input id=\"t\"></section>");

    // smallest budget that puts the wrapped fragment strictly under 80%
    let budget = wrapped_tokens * 5 / 4 + 1;

    let result = truncate_context(&doc, t, budget - 1).unwrap();
    assert_eq!(result.ancestors_kept, 0);

    let result = truncate_context(&doc, t, budget).unwrap();
    assert_eq!(result.ancestors_kept, 1);
    assert!(result.html.contains("<section id=\"s\"><input id=\"t\"></section>"));
}

#[test]
fn fragment_never_exceeds_budget() {
    let html = format!(
        "<main><h1>Title</h1><p>{}</p><form id=\"f\"><input id=\"q\"><p>{}</p></form><footer>{}</footer></main>",
        long_text(60),
        long_text(40),
        long_text(80)
    );
    let doc = Document::parse(&html);
    let q = doc.find_by_id("q").unwrap();
    let target_tokens = count_tokens(&doc.outer_html(q));

    for budget in (target_tokens + 1)..(count_tokens(&html) + 20) {
        let result = truncate_context(&doc, q, budget).unwrap();
        assert!(
            result.tokens <= budget,
            "budget {} produced {} tokens",
            budget,
            result.tokens
        );
        assert!(result.html.contains("<input id=\"q\">"));
    }
}

// ============================================================================
// Neighbouring subtrees
// ============================================================================

#[test]
fn preceding_and_following_subtrees_climb_ancestors() {
    let doc = Document::parse(
        "<div id=\"a\"></div><form><b id=\"b\"></b><input id=\"t\"><i id=\"c\"></i></form><div id=\"d\"></div>",
    );
    let t = doc.find_by_id("t").unwrap();
    let ids = |nodes: Vec<NodeId>| -> Vec<String> {
        nodes
            .into_iter()
            .filter_map(|n| doc.element(n).and_then(|el| el.attr("id")).map(str::to_string))
            .collect()
    };

    assert_eq!(ids(preceding_subtrees(&doc, t).collect()), vec!["b", "a"]);
    assert_eq!(ids(following_subtrees(&doc, t).collect()), vec!["c", "d"]);
}
