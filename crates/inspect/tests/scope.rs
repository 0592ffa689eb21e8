use pq_common::Settings;
use pq_inspect::{active_node, try_node_scope, InspectionSettings, ScopeById, ScopeItem};
use pq_syntax::node::{NodeData, PrimitiveTypeKind};
use pq_syntax::util::src_cursor_position;
use pq_syntax::{lexer, parser, NodeId, NodeIdMap, Position, Token};

fn parse_marked(src: &str) -> (Position, NodeIdMap, Vec<Token>) {
    let (position, text) = src_cursor_position(src);
    let settings = Settings::default();
    let state = lexer::lex(&settings, &text).unwrap();
    let snapshot = lexer::snapshot(&settings, &state).unwrap();
    let parse = parser::parse(&settings, &snapshot);
    (position, parse.node_id_map, snapshot.tokens)
}

fn scope_at_cursor(src: &str) -> (NodeIdMap, pq_inspect::ScopeByKey) {
    let (position, map, tokens) = parse_marked(src);
    let active = active_node(&map, &tokens, position).expect("active node");
    let target = active.leaf().unwrap().id();

    let settings = InspectionSettings::default();
    let mut cache = ScopeById::default();
    let scope = try_node_scope(&settings, &map, target, &mut cache).unwrap();

    // Re-computation is idempotent.
    let again = try_node_scope(&settings, &map, target, &mut ScopeById::default()).unwrap();
    assert_eq!(scope, again);

    (map, scope)
}

fn literal_id(map: &NodeIdMap, text: &str) -> NodeId {
    map.ast_nodes()
        .find(|node| matches!(&node.data, NodeData::Literal { text: t, .. } if t == text))
        .unwrap_or_else(|| panic!("no literal `{text}`"))
        .id
}

#[test]
fn let_bindings_are_visible_after_in() {
    // `let a = 1, b = 2 in |`: both bindings, neither recursive.
    let (map, scope) = scope_at_cursor("let a = 1, b = 2 in $$");

    assert_eq!(scope.len(), 2);

    let a = scope.get("a").unwrap().as_key_value_pair().unwrap();
    assert!(!a.is_recursive);
    assert_eq!(a.maybe_value_id, Some(literal_id(&map, "1")));

    let b = scope.get("b").unwrap().as_key_value_pair().unwrap();
    assert!(!b.is_recursive);
    assert_eq!(b.maybe_value_id, Some(literal_id(&map, "2")));
}

#[test]
fn let_binding_is_recursive_inside_its_own_value() {
    // `let a = |1, b = 2 in x`
    let (_, scope) = scope_at_cursor("let a = $$1, b = 2 in x");

    let a = scope.get("a").unwrap().as_key_value_pair().unwrap();
    assert!(a.is_recursive);
    let b = scope.get("b").unwrap().as_key_value_pair().unwrap();
    assert!(!b.is_recursive);
}

#[test]
fn parameter_scope_tracks_optional_and_nullability() {
    // Five parameters with the full annotation spread.
    let (_, scope) = scope_at_cursor(
        "(a, b as number, c as nullable function, optional d, optional e as table) => 1$$",
    );

    let parameter = |name: &str| {
        scope
            .get(name)
            .unwrap_or_else(|| panic!("missing parameter {name}"))
            .as_parameter()
            .unwrap()
            .clone()
    };

    assert_eq!(scope.len(), 5);

    let a = parameter("a");
    assert!(!a.is_optional && a.is_nullable && a.maybe_type.is_none());

    let b = parameter("b");
    assert!(!b.is_optional && !b.is_nullable);
    assert_eq!(b.maybe_type, Some(PrimitiveTypeKind::Number));

    let c = parameter("c");
    assert!(!c.is_optional && c.is_nullable);
    assert_eq!(c.maybe_type, Some(PrimitiveTypeKind::Function));

    let d = parameter("d");
    assert!(d.is_optional && d.is_nullable && d.maybe_type.is_none());

    let e = parameter("e");
    assert!(e.is_optional && !e.is_nullable);
    assert_eq!(e.maybe_type, Some(PrimitiveTypeKind::Table));
}

#[test]
fn parameters_are_not_visible_inside_the_parameter_list() {
    let (_, scope) = scope_at_cursor("(a, b$$ as number) => a");
    assert!(scope.get("a").is_none());
}

#[test]
fn each_binds_the_underscore() {
    let (_, scope) = scope_at_cursor("each $$_ + 1");
    assert!(matches!(scope.get("_"), Some(ScopeItem::Each(_))));
}

#[test]
fn record_fields_see_their_siblings() {
    let (_, scope) = scope_at_cursor("[x = 1, y = $$x]");

    let x = scope.get("x").unwrap().as_key_value_pair().unwrap();
    assert!(!x.is_recursive);
    let y = scope.get("y").unwrap().as_key_value_pair().unwrap();
    assert!(y.is_recursive);
}

#[test]
fn record_key_position_does_not_bind_itself() {
    let (_, scope) = scope_at_cursor("[x = 1, $$y = x]");
    assert!(scope.get("x").is_some());
    assert!(scope.get("y").is_none());
}

#[test]
fn section_members_are_mutually_visible() {
    let (_, scope) = scope_at_cursor("section S; a = 1; b = $$a;");

    let a = scope.get("a").unwrap().as_section_member().unwrap();
    assert!(!a.is_recursive);
    let b = scope.get("b").unwrap().as_section_member().unwrap();
    assert!(b.is_recursive);
}

#[test]
fn inner_binding_shadows_outer() {
    let (map, scope) = scope_at_cursor("let x = 1 in let x = 2 in $$x");

    let x = scope.get("x").unwrap().as_key_value_pair().unwrap();
    assert_eq!(x.maybe_value_id, Some(literal_id(&map, "2")));
}

#[test]
fn unbound_names_are_absent() {
    let (_, scope) = scope_at_cursor("let a = 1 in $$missing");
    assert!(scope.get("missing").is_none());
}

#[test]
fn scope_works_on_partial_parses() {
    // `[a = |`: the record context is open, yet `a` is already in scope
    // (recursively, since the cursor is in its own value slot).
    let (position, map, tokens) = parse_marked("[a = $$");
    let active = active_node(&map, &tokens, position).expect("active node");

    let settings = InspectionSettings::default();
    let mut cache = ScopeById::default();
    let scope =
        try_node_scope(&settings, &map, active.leaf().unwrap().id(), &mut cache).unwrap();

    let a = scope.get("a").unwrap().as_key_value_pair().unwrap();
    assert!(a.is_recursive, "the cursor sits in a's own value slot");
    assert!(a.maybe_value_id.is_none());
}
