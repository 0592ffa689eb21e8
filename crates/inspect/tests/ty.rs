use std::sync::Arc;

use pq_common::Settings;
use pq_inspect::{
    any_union, try_type, ExtendedType, ExternalTypeRequest, InspectionSettings, Type, TypeCache,
    TypeKind,
};
use pq_syntax::node::NodeData;
use pq_syntax::{lexer, parser, NodeId, NodeIdMap};
use test_case::test_case;

fn parse(text: &str) -> (NodeId, NodeIdMap) {
    let settings = Settings::default();
    let state = lexer::lex(&settings, text).unwrap();
    let snapshot = lexer::snapshot(&settings, &state).unwrap();
    let parse = parser::parse(&settings, &snapshot);
    assert!(parse.is_ok(), "unexpected parse error: {:?}", parse.error);
    (parse.root.unwrap(), parse.node_id_map)
}

fn type_of_root(text: &str, settings: &InspectionSettings) -> Type {
    let (root, map) = parse(text);
    let mut cache = TypeCache::default();
    let ty = try_type(settings, &map, root, &mut cache).unwrap();

    // Re-computation through the same cache is stable.
    let again = try_type(settings, &map, root, &mut cache).unwrap();
    assert_eq!(ty, again);
    ty
}

fn unrefined() -> InspectionSettings {
    InspectionSettings::default().with_literal_refinement(false)
}

fn refined() -> InspectionSettings {
    InspectionSettings::default()
}

fn number_literal(text: &str) -> Type {
    Type {
        kind: TypeKind::Number,
        is_nullable: false,
        extended: Some(ExtendedType::NumberLiteral(text.to_string())),
    }
}

fn text_literal(text: &str) -> Type {
    Type {
        kind: TypeKind::Text,
        is_nullable: false,
        extended: Some(ExtendedType::TextLiteral(text.to_string())),
    }
}

// region: literals and unary operators

#[test_case("1", number_literal("1"); "positive_integer")]
#[test_case("\"x\"", text_literal("\"x\""); "text")]
#[test_case("-2", number_literal("-2"); "negative_integer")]
#[test_case("--2", number_literal("2"); "double_negation")]
fn refined_literals(text: &str, expected: Type) {
    assert_eq!(type_of_root(text, &refined()), expected);
}

#[test]
fn refined_not_flips_the_literal() {
    let ty = type_of_root("not true", &refined());
    assert_eq!(ty.extended, Some(ExtendedType::LogicalLiteral(false)));
}

#[test_case("1", TypeKind::Number)]
#[test_case("0x10", TypeKind::Number)]
#[test_case("\"x\"", TypeKind::Text)]
#[test_case("true", TypeKind::Logical)]
#[test_case("#nan", TypeKind::Number)]
fn unrefined_literals(text: &str, kind: TypeKind) {
    assert_eq!(type_of_root(text, &unrefined()), Type::primitive(kind, false));
}

#[test]
fn null_is_nullable() {
    assert_eq!(type_of_root("null", &unrefined()), Type::null());
}

#[test]
fn unary_on_wrong_operand_is_none() {
    assert_eq!(type_of_root("-\"x\"", &unrefined()), Type::none());
    assert_eq!(type_of_root("not 1", &unrefined()), Type::none());
}

// endregion

// region: binary operators

#[test_case("1 + 2", Type::number(); "addition")]
#[test_case("1 * 2", Type::number(); "multiplication")]
#[test_case("\"a\" & \"b\"", Type::text(); "concatenation")]
#[test_case("true and false", Type::logical(); "logical_and")]
#[test_case("1 < 2", Type::logical(); "less_than")]
#[test_case("1 = 2", Type::logical(); "equality")]
#[test_case("1 <> \"a\"", Type::none(); "inequality_type_mismatch")]
#[test_case("1 + \"a\"", Type::none(); "addition_type_mismatch")]
#[test_case("true and 1", Type::none(); "logical_and_type_mismatch")]
#[test_case("1 is number", Type::logical(); "is_operator")]
#[test_case("x as number", Type::number(); "as_operator")]
#[test_case("x as nullable number", Type::number().with_nullability(true); "as_nullable_operator")]
fn binary_operators(text: &str, expected: Type) {
    assert_eq!(type_of_root(text, &unrefined()), expected);
}

#[test]
fn meta_preserves_the_left_type() {
    assert_eq!(
        type_of_root("1 meta [doc = \"d\"]", &unrefined()),
        Type::number()
    );
}

#[test]
fn null_coalescing_unions_both_sides() {
    assert_eq!(
        type_of_root("1 ?? \"a\"", &unrefined()),
        any_union(vec![Type::number(), Type::text()])
    );
    // Identical sides collapse.
    assert_eq!(type_of_root("1 ?? 2", &unrefined()), Type::number());
}

#[test]
fn record_merge_unions_keys_right_wins() {
    let ty = type_of_root("[a = 1, b = 2] & [b = \"x\"]", &unrefined());
    let (fields, is_open) = match &ty.extended {
        Some(ExtendedType::DefinedRecord { fields, is_open }) => (fields, *is_open),
        other => panic!("expected a defined record, got {other:?}"),
    };
    assert!(!is_open);
    assert_eq!(fields.get("a"), Some(&Type::number()));
    assert_eq!(fields.get("b"), Some(&Type::text()));
}

// endregion

// region: if, try, error

#[test]
fn if_branches_union() {
    // `if true then 1 else ""`
    let expected = any_union(vec![number_literal("1"), text_literal("\"\"")]);
    assert_eq!(
        type_of_root("if true then 1 else \"\"", &refined()),
        expected
    );

    // Nested conditions still collapse to something logical-compatible.
    assert_eq!(
        type_of_root(
            "if if true then true else false then 1 else \"\"",
            &refined()
        ),
        expected
    );
}

#[test]
fn if_branches_union_unrefined() {
    assert_eq!(
        type_of_root("if true then 1 else \"\"", &unrefined()),
        any_union(vec![Type::number(), Type::text()])
    );
}

#[test]
fn if_with_non_logical_condition_is_none() {
    assert_eq!(
        type_of_root("if 1 then 2 else 3", &unrefined()),
        Type::none()
    );
}

#[test]
fn try_without_otherwise_is_an_error_capture_record() {
    let ty = type_of_root("try 1", &unrefined());
    let Some(ExtendedType::DefinedRecord { fields, .. }) = &ty.extended else {
        panic!("expected a record, got {ty:?}");
    };
    assert_eq!(fields.get("HasError"), Some(&Type::logical()));
    assert_eq!(fields.get("Value"), Some(&Type::number()));
    assert_eq!(
        fields.get("Error"),
        Some(&Type::primitive(TypeKind::Record, false))
    );
}

#[test]
fn try_with_otherwise_unions_both_branches() {
    assert_eq!(
        type_of_root("try 1 otherwise \"x\"", &unrefined()),
        any_union(vec![Type::number(), Type::text()])
    );
}

#[test]
fn error_raising_has_no_value() {
    assert_eq!(type_of_root("error \"boom\"", &unrefined()), Type::none());
}

// endregion

// region: scope-driven resolution

#[test_case(true)]
#[test_case(false)]
fn nested_let_resolves_to_the_final_literal(refine: bool) {
    // `let eggs = let ham = 0 in 1, foo = 2, bar = 3 in 4`
    let settings = InspectionSettings::default().with_literal_refinement(refine);
    let ty = type_of_root(
        "let eggs = let ham = 0 in 1, foo = 2, bar = 3 in 4",
        &settings,
    );
    let expected = if refine {
        number_literal("4")
    } else {
        Type::number()
    };
    assert_eq!(ty, expected);
}

#[test]
fn identifiers_resolve_through_scope() {
    assert_eq!(
        type_of_root("let a = 1, b = a in b", &unrefined()),
        Type::number()
    );
}

#[test]
fn reference_cycles_yield_unknown() {
    assert_eq!(type_of_root("let a = a in a", &unrefined()), Type::unknown());
    assert_eq!(
        type_of_root("let a = b, b = a in a", &unrefined()),
        Type::unknown()
    );
}

#[test]
fn parameters_use_their_declared_type() {
    let (root, map) = parse("(x as number, y) => x");
    let mut cache = TypeCache::default();
    let ty = try_type(&unrefined(), &map, root, &mut cache).unwrap();

    let Some(ExtendedType::DefinedFunction {
        parameters,
        return_type,
    }) = &ty.extended
    else {
        panic!("expected a function, got {ty:?}");
    };
    assert_eq!(parameters.len(), 2);
    assert_eq!(parameters[0].maybe_type, Some(TypeKind::Number));
    assert!(parameters[1].maybe_type.is_none() && parameters[1].is_nullable);
    assert_eq!(**return_type, Type::number());
}

#[test]
fn unbound_identifier_is_unknown() {
    assert_eq!(type_of_root("mystery", &unrefined()), Type::unknown());
}

// endregion

// region: invocation and access chains

#[test]
fn invoking_a_known_function_returns_its_body_type() {
    assert_eq!(
        type_of_root("let f = (x as number) => x in f(1)", &unrefined()),
        Type::number()
    );
}

#[test]
fn invoking_with_wrong_arity_is_none() {
    assert_eq!(
        type_of_root("let f = (x as number) => x in f()", &unrefined()),
        Type::none()
    );
    assert_eq!(
        type_of_root("let f = (x as number) => x in f(1, 2)", &unrefined()),
        Type::none()
    );
}

#[test]
fn invoking_with_incompatible_argument_is_none() {
    assert_eq!(
        type_of_root("let f = (x as number) => x in f(true)", &unrefined()),
        Type::none()
    );
}

#[test]
fn each_is_a_single_parameter_function() {
    let ty = type_of_root("each _", &unrefined());
    let Some(ExtendedType::DefinedFunction { parameters, .. }) = &ty.extended else {
        panic!("expected a function, got {ty:?}");
    };
    assert_eq!(parameters[0].name, "_");
}

#[test]
fn field_selection_on_defined_record() {
    assert_eq!(type_of_root("[a = 1][a]", &unrefined()), Type::number());
    assert_eq!(type_of_root("[a = 1][b]?", &unrefined()), Type::null());
    assert_eq!(type_of_root("[a = 1][b]", &unrefined()), Type::none());
}

#[test]
fn field_projection_keeps_just_those_fields() {
    let ty = type_of_root("[a = 1, b = \"x\", c = true][[a], [b]]", &unrefined());
    let Some(ExtendedType::DefinedRecord { fields, .. }) = &ty.extended else {
        panic!("expected a record, got {ty:?}");
    };
    assert_eq!(fields.len(), 2);
    assert_eq!(fields.get("a"), Some(&Type::number()));
    assert_eq!(fields.get("b"), Some(&Type::text()));
}

#[test]
fn item_access_unions_element_types() {
    assert_eq!(
        type_of_root("{1, \"a\"}{0}", &unrefined()),
        any_union(vec![Type::number(), Type::text()])
    );
    assert_eq!(type_of_root("{1, 2}{0}", &unrefined()), Type::number());
}

#[test]
fn item_access_on_non_list_is_none() {
    assert_eq!(type_of_root("1{0}", &unrefined()), Type::none());
}

#[test]
fn list_types_are_structural() {
    assert_eq!(
        type_of_root("{1, \"a\"}", &unrefined()),
        Type::defined_list(vec![Type::number(), Type::text()])
    );
}

// endregion

// region: the type sub-language

#[test]
fn type_of_primitive_type_expression() {
    assert_eq!(
        type_of_root("type number", &unrefined()),
        Type::primitive(TypeKind::Type, false)
    );
}

#[test]
fn list_type_value_carries_its_item_type() {
    let ty = type_of_root("type {number}", &unrefined());
    assert_eq!(
        ty.extended,
        Some(ExtendedType::ListType(Box::new(Type::number())))
    );
}

#[test]
fn record_type_value_carries_fields_and_openness() {
    let ty = type_of_root("type [A = number, ...]", &unrefined());
    let Some(ExtendedType::RecordType { fields, is_open }) = &ty.extended else {
        panic!("expected a record type, got {ty:?}");
    };
    assert!(*is_open);
    assert_eq!(fields.get("A"), Some(&Type::number()));
}

#[test]
fn nullable_type_value_wraps_its_inner_type() {
    let ty = type_of_root("type nullable number", &unrefined());
    assert_eq!(
        ty.extended,
        Some(ExtendedType::NullableType(Box::new(Type::number())))
    );
}

// endregion

// region: external resolver

fn resolver_settings() -> InspectionSettings {
    unrefined().with_resolver(Arc::new(|request: &ExternalTypeRequest| match request {
        ExternalTypeRequest::Value { literal } if literal == "Known.Value" => {
            Some(Type::number())
        }
        ExternalTypeRequest::Invocation { literal, args }
            if literal == "Text.From" && args.len() == 1 =>
        {
            Some(Type::text())
        }
        _ => None,
    }))
}

#[test]
fn external_value_request_resolves() {
    assert_eq!(
        type_of_root("Known.Value", &resolver_settings()),
        Type::number()
    );
}

#[test]
fn external_invocation_request_resolves() {
    assert_eq!(
        type_of_root("Text.From(1)", &resolver_settings()),
        Type::text()
    );
}

#[test]
fn external_miss_falls_back_to_unknown() {
    assert_eq!(
        type_of_root("Other.Function(1)", &resolver_settings()),
        Type::unknown()
    );
}

// endregion

// region: inspection over partial trees

#[test]
fn type_inspection_survives_failed_parses() {
    let settings = Settings::default();
    let state = lexer::lex(&settings, "[a = 1, b =").unwrap();
    let snapshot = lexer::snapshot(&settings, &state).unwrap();
    let parse = parser::parse(&settings, &snapshot);
    assert!(parse.error.is_some());

    let map = parse.node_id_map;
    let literal = map
        .ast_nodes()
        .find(|node| matches!(&node.data, NodeData::Literal { text, .. } if text == "1"))
        .unwrap()
        .id;

    let mut cache = TypeCache::default();
    let ty = try_type(&unrefined(), &map, literal, &mut cache).unwrap();
    assert_eq!(ty, Type::number());
}

// endregion
