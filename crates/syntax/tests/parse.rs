use pq_common::{CancellationToken, CommonError, Settings};
use pq_syntax::lexer;
use pq_syntax::node::{AstNode, ConstantKind, NodeData, NodeKind, Operator};
use pq_syntax::parser::{self, CsvContinuationKind, Parse, ParseError, SequenceKind};
use pq_syntax::NodeIdMap;
use test_case::test_case;

fn parse(text: &str) -> Parse {
    let settings = Settings::default();
    let state = lexer::lex(&settings, text).unwrap();
    let snapshot = lexer::snapshot(&settings, &state).unwrap();
    parser::parse(&settings, &snapshot)
}

fn parse_ok(text: &str) -> (pq_syntax::NodeId, NodeIdMap) {
    let parse = parse(text);
    assert!(parse.is_ok(), "unexpected error: {:?}", parse.error);
    (parse.root.unwrap(), parse.node_id_map)
}

fn ast_of_kind<'a>(map: &'a NodeIdMap, kind: NodeKind) -> Vec<&'a AstNode> {
    let mut nodes: Vec<&AstNode> = map.ast_nodes().filter(|node| node.kind == kind).collect();
    nodes.sort_by_key(|node| node.id);
    nodes
}

#[test_case("1")]
#[test_case("1 + 2 * 3 - 4 / 5")]
#[test_case("\"a\" & \"b\"")]
#[test_case("let a = 1, b = a in b")]
#[test_case("if true then 1 else 2")]
#[test_case("each [Column] > 2")]
#[test_case("try 1/0 otherwise null")]
#[test_case("error \"boom\"")]
#[test_case("(a, optional b as number) => a")]
#[test_case("[a = 1, b = [c = 2]]")]
#[test_case("{1, 2, 3..5}")]
#[test_case("Table.SelectRows(t, each [a] <> null)")]
#[test_case("x{0}?[y]?")]
#[test_case("@f(1)")]
#[test_case("1 as number")]
#[test_case("1 is nullable number")]
#[test_case("x meta [doc = \"d\"]")]
#[test_case("1 ?? 2")]
#[test_case("type [A = number, B = nullable text, ...]")]
#[test_case("type {number}")]
#[test_case("type function (x as number) as number")]
#[test_case("type table [A = number]")]
#[test_case("type nullable number")]
#[test_case("#table({\"a\"}, {{1}})")]
#[test_case("not true or false")]
#[test_case("section Foo; shared x = 1; y = x;")]
#[test_case("[Version = \"1.0\"] section Foo; x = 1;")]
#[test_case("...")]
fn parses_and_upholds_invariants(text: &str) {
    let (_, map) = parse_ok(text);
    map.validate().unwrap();
}

#[test]
fn empty_input_is_a_parse_error() {
    let parse = parse("");
    assert!(parse.error.is_some());
    assert!(parse.root.is_none());
}

#[test]
fn multiplicative_binds_tighter_than_additive() {
    let (root, map) = parse_ok("1 + 2 * 3");

    let root_ast = map.ast_node(root).unwrap();
    assert_eq!(root_ast.kind, NodeKind::ArithmeticExpression);
    assert_eq!(root_ast.data, NodeData::Operator(Operator::Addition));

    let right = map.child_by_attribute_index(root, 2, None).unwrap();
    assert_eq!(right.kind(), NodeKind::ArithmeticExpression);
    assert_eq!(
        map.ast_node(right.id()).unwrap().data,
        NodeData::Operator(Operator::Multiplication)
    );
}

#[test]
fn operator_chains_fold_left_associatively() {
    let (root, map) = parse_ok("1 - 2 - 3");

    let left = map.child_by_attribute_index(root, 0, None).unwrap();
    assert_eq!(left.kind(), NodeKind::ArithmeticExpression);
    let right = map.child_by_attribute_index(root, 2, None).unwrap();
    assert_eq!(right.kind(), NodeKind::LiteralExpression);
}

#[test]
fn null_coalescing_is_loosest() {
    let (root, map) = parse_ok("1 ?? 2 + 3");
    let root_ast = map.ast_node(root).unwrap();
    assert_eq!(root_ast.kind, NodeKind::NullCoalescingExpression);
    let right = map.child_by_attribute_index(root, 2, None).unwrap();
    assert_eq!(right.kind(), NodeKind::ArithmeticExpression);
}

#[test]
fn recursive_primary_chain_wraps_head_and_suffixes() {
    let (root, map) = parse_ok("f(1){0}[a]");

    let root_ast = map.ast_node(root).unwrap();
    assert_eq!(root_ast.kind, NodeKind::RecursivePrimaryExpression);

    let head = map.child_by_attribute_index(root, 0, None).unwrap();
    assert_eq!(head.kind(), NodeKind::IdentifierExpression);

    let wrapper = map.child_by_attribute_index(root, 1, None).unwrap();
    let suffix_kinds: Vec<NodeKind> = map
        .children_ids(wrapper.id())
        .iter()
        .map(|id| map.xor_node(*id).unwrap().kind())
        .collect();
    assert_eq!(
        suffix_kinds,
        vec![
            NodeKind::InvokeExpression,
            NodeKind::ItemAccessExpression,
            NodeKind::FieldSelector
        ]
    );
}

#[test]
fn csv_items_wrap_in_csv_nodes() {
    let (_, map) = parse_ok("{1, 2}");
    let csvs = ast_of_kind(&map, NodeKind::Csv);
    assert_eq!(csvs.len(), 2);
    // The first csv carries its trailing comma as a constant child.
    let first_children: Vec<NodeKind> = map
        .children_ids(csvs[0].id)
        .iter()
        .map(|id| map.xor_node(*id).unwrap().kind())
        .collect();
    assert_eq!(
        first_children,
        vec![NodeKind::LiteralExpression, NodeKind::Constant]
    );
}

#[test]
fn section_document_collects_members() {
    let (root, map) = parse_ok("section Foo; shared x = 1; y = x;");
    let root_node = map.ast_node(root).unwrap();
    assert_eq!(root_node.kind, NodeKind::Section);

    let members = ast_of_kind(&map, NodeKind::SectionMember);
    assert_eq!(members.len(), 2);
}

#[test]
fn partial_record_keeps_context_tree() {
    // Scenario: `[a = 1, b =` with the cursor at the end.
    let parse = parse("[a = 1, b =");
    assert!(matches!(
        parse.error,
        Some(ParseError::UnterminatedSequence {
            kind: SequenceKind::Bracket,
            ..
        })
    ));

    let map = &parse.node_id_map;
    let record = map
        .context_nodes()
        .find(|context| context.kind == NodeKind::RecordExpression)
        .expect("the record context survives the failed parse");

    let wrapper = map
        .children_ids(record.id)
        .iter()
        .copied()
        .find(|id| map.xor_node(*id).unwrap().kind() == NodeKind::ArrayWrapper)
        .expect("array wrapper");

    let csvs = map.children_ids(wrapper);
    assert_eq!(csvs.len(), 2);
    assert!(map.ast_node(csvs[0]).is_some(), "first csv closed");
    assert!(map.context_node(csvs[1]).is_some(), "second csv still open");

    let pair = map
        .first_child_of_kind(csvs[1], NodeKind::GeneralizedIdentifierPairedExpression)
        .expect("pair context");
    let key = map.child_by_attribute_index(pair.id(), 0, None).unwrap();
    assert_eq!(
        map.ast_node(key.id()).unwrap().data,
        NodeData::GeneralizedIdentifier("b".to_string())
    );
    assert!(
        map.child_by_attribute_index(pair.id(), 2, None).is_none(),
        "the value slot is open"
    );
}

#[test]
fn unused_tokens_remain_after_expression() {
    let parse = parse("1 2");
    assert!(matches!(
        parse.error,
        Some(ParseError::UnusedTokensRemain { .. })
    ));
    // The parsed prefix is still in the map.
    assert!(!parse
        .node_id_map
        .ast_nodes()
        .collect::<Vec<_>>()
        .is_empty());
}

#[test]
fn dangling_comma_in_list_is_reported() {
    let parse = parse("{1, 2,}");
    assert!(matches!(
        parse.error,
        Some(ParseError::ExpectedCsvContinuation {
            kind: CsvContinuationKind::DanglingComma,
            ..
        })
    ));
}

#[test]
fn dangling_comma_before_in_is_reported() {
    let parse = parse("let a = 1, in a");
    assert!(matches!(
        parse.error,
        Some(ParseError::ExpectedCsvContinuation {
            kind: CsvContinuationKind::LetExpression,
            ..
        })
    ));
}

#[test]
fn required_after_optional_parameter_is_reported() {
    let parse = parse("(optional a, b) => 1");
    assert!(matches!(
        parse.error,
        Some(ParseError::RequiredParameterAfterOptionalParameter { .. })
    ));
}

#[test]
fn invalid_primitive_type_is_reported() {
    let parse = parse("1 as foo");
    assert!(matches!(
        parse.error,
        Some(ParseError::InvalidPrimitiveType { ref text, .. }) if text == "foo"
    ));
}

#[test]
fn unterminated_parenthesis_is_reported() {
    let parse = parse("(1");
    assert!(matches!(
        parse.error,
        Some(ParseError::UnterminatedSequence {
            kind: SequenceKind::Parenthesis,
            ..
        })
    ));
}

#[test]
fn generalized_identifier_spans_token_run() {
    let (_, map) = parse_ok("[Foo Bar = 1]");
    let keys = ast_of_kind(&map, NodeKind::GeneralizedIdentifier);
    assert_eq!(keys.len(), 1);
    assert_eq!(
        keys[0].data,
        NodeData::GeneralizedIdentifier("Foo Bar".to_string())
    );
}

#[test]
fn quoted_identifier_works_as_record_key() {
    let (_, map) = parse_ok("[#\"strange name\" = 1]");
    let keys = ast_of_kind(&map, NodeKind::GeneralizedIdentifier);
    assert_eq!(
        keys[0].data,
        NodeData::GeneralizedIdentifier("#\"strange name\"".to_string())
    );
}

#[test]
fn parameter_list_keeps_annotations() {
    let (_, map) = parse_ok("(a, b as number, optional c as nullable text) => a");
    let parameters = ast_of_kind(&map, NodeKind::Parameter);
    assert_eq!(parameters.len(), 3);

    let optional_constants: Vec<&AstNode> = map
        .ast_nodes()
        .filter(|node| node.data == NodeData::Constant(ConstantKind::Optional))
        .collect();
    assert_eq!(optional_constants.len(), 1);

    assert_eq!(ast_of_kind(&map, NodeKind::NullablePrimitiveType).len(), 1);
    assert_eq!(ast_of_kind(&map, NodeKind::AsNullablePrimitiveType).len(), 2);
}

#[test]
fn function_with_return_ascription_parses() {
    let (root, map) = parse_ok("(x) as number => x");
    assert_eq!(map.ast_node(root).unwrap().kind, NodeKind::FunctionExpression);
}

#[test]
fn parenthesized_as_expression_is_not_a_function() {
    let (root, map) = parse_ok("(x) as number");
    assert_eq!(map.ast_node(root).unwrap().kind, NodeKind::AsExpression);
}

#[test]
fn node_ids_are_monotonic_in_attach_order() {
    let (root, map) = parse_ok("let a = 1 in a");
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        let children = map.children_ids(id);
        for window in children.windows(2) {
            assert!(window[0] < window[1], "sibling ids out of order");
        }
        stack.extend(children);
    }
}

#[test]
fn cancellation_surfaces_as_common_error() {
    let token = CancellationToken::new();
    token.cancel();
    let settings = Settings::default().with_cancellation(token.clone());

    let clean = Settings::default();
    let state = lexer::lex(&clean, "1 + 2").unwrap();
    let snapshot = lexer::snapshot(&clean, &state).unwrap();
    let parse = parser::parse(&settings, &snapshot);
    assert_eq!(
        parse.error,
        Some(ParseError::Common(CommonError::Cancelled))
    );
}
