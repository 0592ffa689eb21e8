use pq_common::Settings;
use pq_inspect::{active_node, autocomplete_keyword};
use pq_syntax::keyword::{KeywordKind, EXPRESSION_KEYWORDS};
use pq_syntax::util::src_cursor_position;
use pq_syntax::{lexer, parser};
use test_case::test_case;

fn candidates(src: &str) -> Vec<KeywordKind> {
    let (position, text) = src_cursor_position(src);
    let settings = Settings::default();
    let state = lexer::lex(&settings, &text).unwrap();
    let snapshot = lexer::snapshot(&settings, &state).unwrap();
    let parse = parser::parse(&settings, &snapshot);

    let active = active_node(&parse.node_id_map, &snapshot.tokens, position)
        .expect("active node");
    autocomplete_keyword(&parse.node_id_map, &active)
}

fn starters() -> Vec<KeywordKind> {
    EXPRESSION_KEYWORDS.to_vec()
}

#[test]
fn try_with_partial_keyword_suggests_both_continuations() {
    // `try true o|` is ambiguous between `or` and `otherwise`.
    assert_eq!(
        candidates("try true o$$"),
        vec![KeywordKind::Or, KeywordKind::Otherwise]
    );
}

#[test]
fn longer_prefix_narrows_to_otherwise() {
    assert_eq!(candidates("try true ot$$"), vec![KeywordKind::Otherwise]);
}

#[test]
fn complete_protected_expression_suggests_otherwise() {
    assert_eq!(candidates("try true $$"), vec![KeywordKind::Otherwise]);
}

#[test]
fn nothing_after_an_otherwise_branch() {
    assert_eq!(candidates("try true otherwise false $$"), Vec::new());
}

#[test]
fn let_value_slot_suggests_expression_starters() {
    assert_eq!(candidates("let a = $$"), starters());
}

#[test]
fn let_after_complete_value_suggests_in() {
    assert_eq!(candidates("let a = 1 $$"), vec![KeywordKind::In]);
}

#[test]
fn let_trailing_prefix_extends_with_conjunctions() {
    assert_eq!(
        candidates("let a = 1 i$$"),
        vec![KeywordKind::In, KeywordKind::Is]
    );
}

#[test]
fn let_body_slot_suggests_expression_starters() {
    assert_eq!(candidates("let a = 1, b = 2 in $$"), starters());
}

#[test_case("{$$"; "empty_list")]
#[test_case("{1, $$"; "list_after_comma")]
#[test_case("f($$"; "function_call_arg")]
#[test_case("($$"; "parenthesized_expr")]
fn empty_item_slots_suggest_expression_starters(src: &str) {
    assert_eq!(candidates(src), starters());
}

#[test]
fn record_value_slot_suggests_expression_starters() {
    assert_eq!(candidates("[a = $$"), starters());
}

#[test]
fn list_item_trailing_prefix_extends_with_conjunctions() {
    assert_eq!(
        candidates("{1 a$$}"),
        vec![KeywordKind::And, KeywordKind::As]
    );
}

#[test]
fn invoke_argument_trailing_prefix_extends_with_conjunctions() {
    assert_eq!(candidates("f(1 o$$"), vec![KeywordKind::Or]);
}

#[test]
fn top_level_trailing_prefix_extends_with_conjunctions() {
    assert_eq!(candidates("1 a$$"), vec![KeywordKind::And, KeywordKind::As]);
    assert_eq!(candidates("1 m$$"), vec![KeywordKind::Meta]);
}

#[test]
fn nothing_past_a_complete_expression_without_a_trailing_token() {
    assert_eq!(candidates("1 $$"), Vec::new());
}

#[test]
fn nothing_past_a_closing_bracket() {
    assert_eq!(candidates("[a = 1] $$"), Vec::new());
}

#[test]
fn cursor_before_any_token_suggests_expression_starters() {
    assert_eq!(candidates("$$ 1 + 2"), starters());
}
