use recorder_companion::dom::document::{Document, NodeData, NodeId};
use recorder_companion::dom::fields::{
    FieldIdentifier, FieldPolicy, IdentifierKind, IdentifyBy, extract_fields, scan_fields,
};
use recorder_companion::dom::tokens::count_tokens;

use crate::common::fixtures::SIGNUP_PAGE;

mod common;

fn identifiers(html: &str, policy: &FieldPolicy) -> Vec<String> {
    let doc = Document::parse(html);
    extract_fields(&doc, policy)
        .into_iter()
        .map(|f| f.identifier.to_string())
        .collect()
}

// ============================================================================
// Document tree
// ============================================================================

#[test]
fn root_is_document_node() {
    let doc = Document::parse("<p>hi</p>");
    assert_eq!(doc.root(), NodeId(0));
    assert!(matches!(doc.node(doc.root()).data, NodeData::Document));
    assert_eq!(doc.parent(doc.root()), None);
}

#[test]
fn every_node_is_a_child_of_its_parent() {
    let doc = Document::parse(SIGNUP_PAGE);
    for i in 1..doc.len() {
        let id = NodeId(i);
        let parent = doc.parent(id).expect("non-root node has a parent");
        assert!(doc.children(parent).contains(&id));
        assert!(parent < id, "parent must precede child in arena order");
    }
}

#[test]
fn elements_come_in_document_order() {
    let doc = Document::parse("<div><p>a</p><span>b</span></div><ul><li>c</li></ul>");
    let tags: Vec<&str> = doc.elements().map(|(_, el)| el.tag.as_str()).collect();
    assert_eq!(
        tags,
        vec!["html", "head", "body", "div", "p", "span", "ul", "li"]
    );
}

#[test]
fn ancestors_walk_up_to_root() {
    let doc = Document::parse(SIGNUP_PAGE);
    let email = doc.find_by_id("email").unwrap();
    let tags: Vec<String> = doc
        .ancestors(email)
        .map(|n| match doc.element(n) {
            Some(el) => el.tag.clone(),
            None => "#document".to_string(),
        })
        .collect();
    assert_eq!(tags, vec!["form", "body", "html", "#document"]);
}

#[test]
fn siblings_are_nearest_first() {
    let doc = Document::parse("<div><i>1</i><b>2</b><em id=\"t\">3</em><u>4</u><s>5</s></div>");
    let target = doc.find_by_id("t").unwrap();

    let before: Vec<&str> = doc
        .preceding_siblings(target)
        .map(|n| doc.element(n).unwrap().tag.as_str())
        .collect();
    let after: Vec<&str> = doc
        .following_siblings(target)
        .map(|n| doc.element(n).unwrap().tag.as_str())
        .collect();

    assert_eq!(before, vec!["b", "i"]);
    assert_eq!(after, vec!["u", "s"]);
}

#[test]
fn find_by_attr_matches_name() {
    let doc = Document::parse(SIGNUP_PAGE);
    let node = doc.find_by_attr("name", "nickname").unwrap();
    assert_eq!(doc.element(node).unwrap().tag, "input");
}

#[test]
fn outer_html_serializes_subtree() {
    let doc = Document::parse("<div id=\"box\"><p>a &amp; b</p><br></div>");
    let node = doc.find_by_id("box").unwrap();
    assert_eq!(doc.outer_html(node), "<div id=\"box\"><p>a &amp; b</p><br></div>");
}

#[test]
fn open_and_close_tags() {
    let doc = Document::parse("<form id=\"f\"><input id=\"i\"></form>");
    let form = doc.find_by_id("f").unwrap();
    let input = doc.find_by_id("i").unwrap();
    assert_eq!(doc.open_tag(form), "<form id=\"f\">");
    assert_eq!(doc.close_tag(form), "</form>");
    assert_eq!(doc.close_tag(input), "");
    assert_eq!(doc.open_tag(doc.root()), "");
}

#[test]
fn script_text_is_not_escaped() {
    let doc = Document::parse("<script id=\"s\">if (a < b) {}</script>");
    let script = doc.find_by_id("s").unwrap();
    assert_eq!(doc.outer_html(script), "<script id=\"s\">if (a < b) {}</script>");
}

#[test]
fn non_breaking_space_is_escaped_like_html5ever() {
    let doc = Document::parse("<p id=\"p\" title=\"a\u{a0}b\">x\u{a0}y</p>");
    let p = doc.find_by_id("p").unwrap();
    assert_eq!(doc.outer_html(p), "<p id=\"p\" title=\"a&nbsp;b\">x&nbsp;y</p>");
    assert_eq!(doc.open_tag(p), "<p id=\"p\" title=\"a&nbsp;b\">");
}

#[test]
fn text_and_comment_nodes_serialize_alone() {
    let doc = Document::parse("<div id=\"d\">1 < 2<!--note--></div>");
    let div = doc.find_by_id("d").unwrap();
    let children = doc.children(div);
    assert_eq!(children.len(), 2);
    assert_eq!(doc.outer_html(children[0]), "1 &lt; 2");
    assert_eq!(doc.outer_html(children[1]), "<!--note-->");
}

#[test]
fn attribute_lookup_is_case_insensitive() {
    let doc = Document::parse("<input ID=\"x\" Type=\"EMAIL\">");
    let (_, el) = doc.elements().find(|(_, el)| el.tag == "input").unwrap();
    assert_eq!(el.attr("id"), Some("x"));
    assert_eq!(el.attr("TYPE"), Some("EMAIL"));
}

// ============================================================================
// Token counting
// ============================================================================

#[test]
fn empty_text_is_free() {
    assert_eq!(count_tokens(""), 0);
}

#[test]
fn concatenation_never_costs_more_than_parts() {
    let parts = [
        "<div class=\"row\">",
        "Hello world",
        "   ",
        "12345678",
        "añadir más",
        "</div>",
    ];
    for a in parts {
        for b in parts {
            let joined = format!("{}{}", a, b);
            assert!(count_tokens(&joined) <= count_tokens(a) + count_tokens(b));
            assert!(count_tokens(&joined) >= count_tokens(a));
        }
    }
}

#[test]
fn document_serialization_costs_tokens() {
    let doc = Document::parse(SIGNUP_PAGE);
    assert!(count_tokens(&doc.to_html()) > 0);
}

// ============================================================================
// Field extraction
// ============================================================================

#[test]
fn signup_page_fields() {
    let ids = identifiers(SIGNUP_PAGE, &FieldPolicy::default());
    assert_eq!(ids, vec!["id=email", "id=age", "name=nickname", "id=bio"]);
}

#[test]
fn type_allow_list_filters_inputs() {
    let html = r#"<input id="a" type="text"><input id="b" type="checkbox"><input id="c" type="hidden"><input id="d" type="submit"><input id="e" type="tel"><input id="f" type="date">"#;
    assert_eq!(
        identifiers(html, &FieldPolicy::default()),
        vec!["id=a", "id=e", "id=f"]
    );
}

#[test]
fn missing_type_counts_as_text() {
    let doc = Document::parse(r#"<input id="plain">"#);
    let fields = extract_fields(&doc, &FieldPolicy::default());
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0].input_type.as_deref(), Some("text"));
}

#[test]
fn input_type_is_case_insensitive() {
    let html = r#"<input id="a" type="EMAIL"><input id="b" type=" Number ">"#;
    assert_eq!(
        identifiers(html, &FieldPolicy::default()),
        vec!["id=a", "id=b"]
    );
}

#[test]
fn styled_invisible_inputs_are_excluded() {
    let html = r#"<input id="a" style="display:none"><input id="b" style="color: red; DISPLAY : NONE;"><input id="c" style="visibility:hidden"><input id="d" hidden><input id="e" style="display:block">"#;
    assert_eq!(identifiers(html, &FieldPolicy::default()), vec!["id=e"]);
}

#[test]
fn scan_keeps_hidden_fields_flagged() {
    let doc = Document::parse(SIGNUP_PAGE);
    let all = scan_fields(&doc, &FieldPolicy::default());
    let token = all
        .iter()
        .find(|f| f.identifier == FieldIdentifier::id("token"))
        .unwrap();
    assert!(!token.visible);
}

#[test]
fn textarea_without_type_is_included() {
    let doc = Document::parse(r#"<textarea name="comment"></textarea>"#);
    let fields = extract_fields(&doc, &FieldPolicy::default());
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0].tag, "textarea");
    assert_eq!(fields[0].input_type, None);
    assert_eq!(fields[0].identifier.kind, IdentifierKind::Name);
}

#[test]
fn textarea_can_be_disabled_by_policy() {
    let policy = FieldPolicy {
        include_textarea: false,
        ..FieldPolicy::default()
    };
    assert!(identifiers(r#"<textarea id="t"></textarea>"#, &policy).is_empty());
}

#[test]
fn id_wins_over_name() {
    let html = r#"<input id="the-id" name="the-name">"#;
    assert_eq!(identifiers(html, &FieldPolicy::default()), vec!["id=the-id"]);
}

#[test]
fn id_only_policy_drops_name_only_fields() {
    let policy = FieldPolicy {
        identify_by: IdentifyBy::IdOnly,
        ..FieldPolicy::default()
    };
    let html = r#"<input id="a"><input name="b"><input>"#;
    assert_eq!(identifiers(html, &policy), vec!["id=a"]);
}

#[test]
fn unidentifiable_and_blank_identifiers_are_dropped() {
    let html = r#"<input type="text"><input id="" name="  "><input id="ok">"#;
    assert_eq!(identifiers(html, &FieldPolicy::default()), vec!["id=ok"]);
}

#[test]
fn duplicates_are_kept_in_document_order() {
    let html = r#"<input name="q"><textarea id="x"></textarea><input name="q">"#;
    assert_eq!(
        identifiers(html, &FieldPolicy::default()),
        vec!["name=q", "id=x", "name=q"]
    );
}

#[test]
fn custom_type_allow_list() {
    let policy = FieldPolicy {
        input_types: vec!["checkbox".to_string()],
        ..FieldPolicy::default()
    };
    let html = r#"<input id="a" type="checkbox"><input id="b" type="text">"#;
    assert_eq!(identifiers(html, &policy), vec!["id=a"]);
}

#[test]
fn locator_format() {
    assert_eq!(FieldIdentifier::id("x").locator(), "id=x");
    assert_eq!(FieldIdentifier::name("y").locator(), "name=y");
}
