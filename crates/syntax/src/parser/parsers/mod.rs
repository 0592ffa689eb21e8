//! The grammar productions.
//!
//! Binary-operator levels share [`read_bin_op`], which opens a context before
//! reading its left operand and either deletes the wrapper (no operator
//! followed) or left-folds further links by interposing fresh contexts above
//! already-closed nodes.

#![deny(unreachable_patterns)]

use tracing::instrument;

use crate::node::{ConstantKind, LiteralKind, NodeData, NodeId, NodeKind, Operator};
use crate::token::{TokenKind, TokenPosition};

use super::context::ParseState;
use super::error::{CsvContinuationKind, ParseError, SequenceKind};

pub(crate) mod ty;

type Reader = fn(&mut ParseState<'_>) -> Result<NodeId, ParseError>;

struct BinOp {
    token: TokenKind,
    constant: ConstantKind,
    operator: Operator,
}

const NULL_COALESCING_OPS: &[BinOp] = &[BinOp {
    token: TokenKind::NullCoalescingOperator,
    constant: ConstantKind::NullCoalescing,
    operator: Operator::NullCoalescing,
}];

const LOGICAL_OR_OPS: &[BinOp] = &[BinOp {
    token: TokenKind::KeywordOr,
    constant: ConstantKind::Or,
    operator: Operator::Or,
}];

const LOGICAL_AND_OPS: &[BinOp] = &[BinOp {
    token: TokenKind::KeywordAnd,
    constant: ConstantKind::And,
    operator: Operator::And,
}];

const RELATIONAL_OPS: &[BinOp] = &[
    BinOp {
        token: TokenKind::LessThan,
        constant: ConstantKind::LessThan,
        operator: Operator::LessThan,
    },
    BinOp {
        token: TokenKind::LessThanEqualTo,
        constant: ConstantKind::LessThanEqualTo,
        operator: Operator::LessThanEqualTo,
    },
    BinOp {
        token: TokenKind::GreaterThan,
        constant: ConstantKind::GreaterThan,
        operator: Operator::GreaterThan,
    },
    BinOp {
        token: TokenKind::GreaterThanEqualTo,
        constant: ConstantKind::GreaterThanEqualTo,
        operator: Operator::GreaterThanEqualTo,
    },
];

const EQUALITY_OPS: &[BinOp] = &[
    BinOp {
        token: TokenKind::Equal,
        constant: ConstantKind::Equal,
        operator: Operator::Equal,
    },
    BinOp {
        token: TokenKind::NotEqual,
        constant: ConstantKind::NotEqual,
        operator: Operator::NotEqual,
    },
];

const AS_OPS: &[BinOp] = &[BinOp {
    token: TokenKind::KeywordAs,
    constant: ConstantKind::As,
    operator: Operator::As,
}];

const IS_OPS: &[BinOp] = &[BinOp {
    token: TokenKind::KeywordIs,
    constant: ConstantKind::Is,
    operator: Operator::Is,
}];

const ADDITIVE_OPS: &[BinOp] = &[
    BinOp {
        token: TokenKind::Plus,
        constant: ConstantKind::Plus,
        operator: Operator::Addition,
    },
    BinOp {
        token: TokenKind::Minus,
        constant: ConstantKind::Minus,
        operator: Operator::Subtraction,
    },
    BinOp {
        token: TokenKind::Ampersand,
        constant: ConstantKind::Ampersand,
        operator: Operator::Concatenation,
    },
];

const MULTIPLICATIVE_OPS: &[BinOp] = &[
    BinOp {
        token: TokenKind::Asterisk,
        constant: ConstantKind::Asterisk,
        operator: Operator::Multiplication,
    },
    BinOp {
        token: TokenKind::Division,
        constant: ConstantKind::Division,
        operator: Operator::Division,
    },
];

const METADATA_OPS: &[BinOp] = &[BinOp {
    token: TokenKind::KeywordMeta,
    constant: ConstantKind::Meta,
    operator: Operator::Meta,
}];

const LITERAL_TOKENS: &[TokenKind] = &[
    TokenKind::HexLiteral,
    TokenKind::KeywordFalse,
    TokenKind::KeywordHashInfinity,
    TokenKind::KeywordHashNan,
    TokenKind::KeywordTrue,
    TokenKind::NullLiteral,
    TokenKind::NumericLiteral,
    TokenKind::TextLiteral,
];

const KEYWORD_IDENTIFIER_TOKENS: &[TokenKind] = &[
    TokenKind::KeywordHashBinary,
    TokenKind::KeywordHashDate,
    TokenKind::KeywordHashDateTime,
    TokenKind::KeywordHashDateTimeZone,
    TokenKind::KeywordHashDuration,
    TokenKind::KeywordHashSections,
    TokenKind::KeywordHashShared,
    TokenKind::KeywordHashTable,
    TokenKind::KeywordHashTime,
];

const PRIMARY_EXPRESSION_STARTS: &[TokenKind] = &[
    TokenKind::AtSign,
    TokenKind::Ellipsis,
    TokenKind::HexLiteral,
    TokenKind::Identifier,
    TokenKind::KeywordFalse,
    TokenKind::KeywordHashBinary,
    TokenKind::KeywordHashDate,
    TokenKind::KeywordHashDateTime,
    TokenKind::KeywordHashDateTimeZone,
    TokenKind::KeywordHashDuration,
    TokenKind::KeywordHashInfinity,
    TokenKind::KeywordHashNan,
    TokenKind::KeywordHashSections,
    TokenKind::KeywordHashShared,
    TokenKind::KeywordHashTable,
    TokenKind::KeywordHashTime,
    TokenKind::KeywordTrue,
    TokenKind::LeftBrace,
    TokenKind::LeftBracket,
    TokenKind::LeftParenthesis,
    TokenKind::NullLiteral,
    TokenKind::NumericLiteral,
    TokenKind::TextLiteral,
];

const ANY_LITERAL_STARTS: &[TokenKind] = &[
    TokenKind::HexLiteral,
    TokenKind::KeywordFalse,
    TokenKind::KeywordHashInfinity,
    TokenKind::KeywordHashNan,
    TokenKind::KeywordTrue,
    TokenKind::LeftBrace,
    TokenKind::LeftBracket,
    TokenKind::NullLiteral,
    TokenKind::NumericLiteral,
    TokenKind::TextLiteral,
];

// region: documents

#[instrument(level = "trace", skip(state))]
pub fn read_document(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    state.check_cancel()?;

    let root = if is_section_document(state) {
        read_section_document(state)?
    } else {
        read_expression(state)?
    };

    match state.maybe_current() {
        Some(token) => Err(ParseError::UnusedTokensRemain {
            position: token.position_start,
        }),
        None => Ok(root),
    }
}

/// A document is a section document when it leads with `section`, or with a
/// `[...]` attribute block directly followed by `section`.
fn is_section_document(state: &ParseState<'_>) -> bool {
    let tokens = state.remaining();
    match tokens.first().map(|token| token.kind) {
        Some(TokenKind::KeywordSection) => true,
        Some(TokenKind::LeftBracket) => {
            let mut depth = 0usize;
            for (index, token) in tokens.iter().enumerate() {
                match token.kind {
                    TokenKind::LeftBracket => depth += 1,
                    TokenKind::RightBracket => {
                        depth -= 1;
                        if depth == 0 {
                            return tokens.get(index + 1).map(|token| token.kind)
                                == Some(TokenKind::KeywordSection);
                        }
                    }
                    _ => {}
                }
            }
            false
        }
        _ => false,
    }
}

#[instrument(level = "trace", skip(state))]
fn read_section_document(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    state.open_context(NodeKind::Section);

    if state.is_on(TokenKind::LeftBracket) {
        read_record_literal(state)?;
    }
    state.read_constant(TokenKind::KeywordSection, ConstantKind::Section)?;
    if state.is_on(TokenKind::Identifier) {
        state.read_identifier_leaf()?;
    }
    state.read_constant(TokenKind::Semicolon, ConstantKind::Semicolon)?;

    state.open_context(NodeKind::ArrayWrapper);
    while state.maybe_current().is_some() {
        read_section_member(state)?;
    }
    state.close_context(NodeData::None)?;

    state.close_context(NodeData::None)
}

#[instrument(level = "trace", skip(state))]
fn read_section_member(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    state.check_cancel()?;
    state.open_context(NodeKind::SectionMember);

    if state.is_on(TokenKind::LeftBracket) {
        read_record_literal(state)?;
    }
    state.maybe_read_constant(TokenKind::KeywordShared, ConstantKind::Shared)?;
    state.read_identifier_leaf()?;
    state.read_constant(TokenKind::Equal, ConstantKind::Equal)?;
    read_expression(state)?;
    state.read_constant(TokenKind::Semicolon, ConstantKind::Semicolon)?;

    state.close_context(NodeData::None)
}

// endregion

// region: expressions

#[instrument(level = "trace", skip(state))]
pub fn read_expression(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    state.check_cancel()?;

    match state.current_kind() {
        Some(TokenKind::KeywordEach) => read_each_expression(state),
        Some(TokenKind::KeywordLet) => read_let_expression(state),
        Some(TokenKind::KeywordIf) => read_if_expression(state),
        Some(TokenKind::KeywordError) => read_error_raising_expression(state),
        Some(TokenKind::KeywordTry) => read_error_handling_expression(state),
        Some(TokenKind::LeftParenthesis) if is_function_expression(state) => {
            read_function_expression(state)
        }
        _ => read_null_coalescing_expression(state),
    }
}

/// Distinguish `(a, b) => ...` / `(a) as number => ...` from a parenthesized
/// expression by finding the matching `)` and peeking at what follows.
fn is_function_expression(state: &ParseState<'_>) -> bool {
    let tokens = state.remaining();
    let mut depth = 0usize;
    for (index, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::LeftParenthesis => depth += 1,
            TokenKind::RightParenthesis => {
                depth -= 1;
                if depth == 0 {
                    return match tokens.get(index + 1).map(|token| token.kind) {
                        Some(TokenKind::FatArrow) => true,
                        Some(TokenKind::KeywordAs) => {
                            // `as [nullable] <primitive> =>`
                            let mut next = index + 2;
                            if tokens.get(next).map_or(false, |token| {
                                token.kind == TokenKind::Identifier && token.data == "nullable"
                            }) {
                                next += 1;
                            }
                            next += 1;
                            tokens.get(next).map(|token| token.kind)
                                == Some(TokenKind::FatArrow)
                        }
                        _ => false,
                    };
                }
            }
            _ => {}
        }
    }
    false
}

#[instrument(level = "trace", skip(state))]
fn read_each_expression(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    state.open_context(NodeKind::EachExpression);
    state.read_constant(TokenKind::KeywordEach, ConstantKind::Each)?;
    read_expression(state)?;
    state.close_context(NodeData::None)
}

#[instrument(level = "trace", skip(state))]
fn read_let_expression(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    state.open_context(NodeKind::LetExpression);
    state.read_constant(TokenKind::KeywordLet, ConstantKind::Let)?;
    read_csv_array(
        state,
        read_identifier_paired_expression,
        |state| state.is_on(TokenKind::KeywordIn),
        CsvContinuationKind::LetExpression,
    )?;
    state.read_constant(TokenKind::KeywordIn, ConstantKind::In)?;
    read_expression(state)?;
    state.close_context(NodeData::None)
}

#[instrument(level = "trace", skip(state))]
fn read_if_expression(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    state.open_context(NodeKind::IfExpression);
    state.read_constant(TokenKind::KeywordIf, ConstantKind::If)?;
    read_expression(state)?;
    state.read_constant(TokenKind::KeywordThen, ConstantKind::Then)?;
    read_expression(state)?;
    state.read_constant(TokenKind::KeywordElse, ConstantKind::Else)?;
    read_expression(state)?;
    state.close_context(NodeData::None)
}

#[instrument(level = "trace", skip(state))]
fn read_error_raising_expression(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    state.open_context(NodeKind::ErrorRaisingExpression);
    state.read_constant(TokenKind::KeywordError, ConstantKind::Error)?;
    read_expression(state)?;
    state.close_context(NodeData::None)
}

#[instrument(level = "trace", skip(state))]
fn read_error_handling_expression(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    state.open_context(NodeKind::ErrorHandlingExpression);
    state.read_constant(TokenKind::KeywordTry, ConstantKind::Try)?;
    read_expression(state)?;

    if state.is_on(TokenKind::KeywordOtherwise) {
        state.open_context(NodeKind::OtherwiseExpression);
        state.read_constant(TokenKind::KeywordOtherwise, ConstantKind::Otherwise)?;
        read_expression(state)?;
        state.close_context(NodeData::None)?;
    }

    state.close_context(NodeData::None)
}

#[instrument(level = "trace", skip(state))]
fn read_function_expression(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    state.open_context(NodeKind::FunctionExpression);
    read_parameter_list(state)?;
    if state.is_on(TokenKind::KeywordAs) {
        read_as_nullable_primitive_type(state)?;
    }
    state.read_constant(TokenKind::FatArrow, ConstantKind::FatArrow)?;
    read_expression(state)?;
    state.close_context(NodeData::None)
}

fn read_parameter_list(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    state.open_context(NodeKind::ParameterList);
    let open_position = state.current_position().unwrap_or_default();
    state.read_constant(TokenKind::LeftParenthesis, ConstantKind::LeftParenthesis)?;
    let body = read_parameter_list_body(state);
    unterminated_on_eof(body, SequenceKind::Parenthesis, open_position)?;
    state.close_context(NodeData::None)
}

fn read_parameter_list_body(state: &mut ParseState<'_>) -> Result<(), ParseError> {
    state.open_context(NodeKind::ArrayWrapper);
    let mut optional_seen = false;

    if !state.is_on(TokenKind::RightParenthesis) {
        loop {
            state.check_cancel()?;
            state.open_context(NodeKind::Csv);
            read_parameter(state, &mut optional_seen)?;
            let has_comma = state.is_on(TokenKind::Comma);
            if has_comma {
                state.read_constant(TokenKind::Comma, ConstantKind::Comma)?;
            }
            state.close_context(NodeData::None)?;
            if !has_comma {
                break;
            }
            if state.is_on(TokenKind::RightParenthesis) || state.maybe_current().is_none() {
                return Err(ParseError::ExpectedCsvContinuation {
                    kind: CsvContinuationKind::DanglingComma,
                    position: state.current_position(),
                });
            }
        }
    }

    state.close_context(NodeData::None)?;
    state.read_constant(TokenKind::RightParenthesis, ConstantKind::RightParenthesis)?;
    Ok(())
}

fn read_parameter(
    state: &mut ParseState<'_>,
    optional_seen: &mut bool,
) -> Result<NodeId, ParseError> {
    state.open_context(NodeKind::Parameter);

    let optional = state
        .maybe_read_identifier_constant("optional", ConstantKind::Optional)?
        .is_some();
    if *optional_seen && !optional {
        return Err(ParseError::RequiredParameterAfterOptionalParameter {
            position: state.current_position(),
        });
    }
    *optional_seen |= optional;

    state.read_identifier_leaf()?;
    if state.is_on(TokenKind::KeywordAs) {
        read_as_nullable_primitive_type(state)?;
    }

    state.close_context(NodeData::None)
}

pub(crate) fn read_as_nullable_primitive_type(
    state: &mut ParseState<'_>,
) -> Result<NodeId, ParseError> {
    state.open_context(NodeKind::AsNullablePrimitiveType);
    state.read_constant(TokenKind::KeywordAs, ConstantKind::As)?;
    read_nullable_primitive_type(state)?;
    state.close_context(NodeData::None)
}

pub(crate) fn read_nullable_primitive_type(
    state: &mut ParseState<'_>,
) -> Result<NodeId, ParseError> {
    if state.is_on_identifier_constant("nullable") {
        state.open_context(NodeKind::NullablePrimitiveType);
        state.read_identifier_constant("nullable", ConstantKind::Nullable)?;
        read_primitive_type(state)?;
        state.close_context(NodeData::None)
    } else {
        read_primitive_type(state)
    }
}

pub(crate) fn read_primitive_type(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    use crate::node::PrimitiveTypeKind;

    state.open_context(NodeKind::PrimitiveType);
    match state.maybe_current() {
        Some(token) if token.kind == TokenKind::Identifier => {
            match PrimitiveTypeKind::from_text(&token.data) {
                Some(kind) => {
                    state.read_token(TokenKind::Identifier)?;
                    state.close_context(NodeData::PrimitiveType(kind))
                }
                None => Err(ParseError::InvalidPrimitiveType {
                    text: token.data.clone(),
                    position: Some(token.position_start),
                }),
            }
        }
        Some(token) if token.kind == TokenKind::KeywordType => {
            state.read_token(TokenKind::KeywordType)?;
            state.close_context(NodeData::PrimitiveType(PrimitiveTypeKind::Type))
        }
        Some(token) if token.kind == TokenKind::NullLiteral => {
            state.read_token(TokenKind::NullLiteral)?;
            state.close_context(NodeData::PrimitiveType(PrimitiveTypeKind::Null))
        }
        other => Err(ParseError::InvalidPrimitiveType {
            text: other.map(|token| token.data.clone()).unwrap_or_default(),
            position: other.map(|token| token.position_start),
        }),
    }
}

// endregion

// region: binary operators

fn read_null_coalescing_expression(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    read_bin_op(
        state,
        NodeKind::NullCoalescingExpression,
        NULL_COALESCING_OPS,
        read_logical_or_expression,
        read_logical_or_expression,
    )
}

fn read_logical_or_expression(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    read_bin_op(
        state,
        NodeKind::LogicalExpression,
        LOGICAL_OR_OPS,
        read_logical_and_expression,
        read_logical_and_expression,
    )
}

fn read_logical_and_expression(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    read_bin_op(
        state,
        NodeKind::LogicalExpression,
        LOGICAL_AND_OPS,
        read_relational_expression,
        read_relational_expression,
    )
}

fn read_relational_expression(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    read_bin_op(
        state,
        NodeKind::RelationalExpression,
        RELATIONAL_OPS,
        read_equality_expression,
        read_equality_expression,
    )
}

fn read_equality_expression(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    read_bin_op(
        state,
        NodeKind::EqualityExpression,
        EQUALITY_OPS,
        read_as_expression,
        read_as_expression,
    )
}

fn read_as_expression(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    read_bin_op(
        state,
        NodeKind::AsExpression,
        AS_OPS,
        read_is_expression,
        read_nullable_primitive_type,
    )
}

fn read_is_expression(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    read_bin_op(
        state,
        NodeKind::IsExpression,
        IS_OPS,
        read_additive_expression,
        read_nullable_primitive_type,
    )
}

fn read_additive_expression(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    read_bin_op(
        state,
        NodeKind::ArithmeticExpression,
        ADDITIVE_OPS,
        read_multiplicative_expression,
        read_multiplicative_expression,
    )
}

fn read_multiplicative_expression(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    read_bin_op(
        state,
        NodeKind::ArithmeticExpression,
        MULTIPLICATIVE_OPS,
        read_metadata_expression,
        read_metadata_expression,
    )
}

fn read_metadata_expression(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    read_bin_op(
        state,
        NodeKind::MetadataExpression,
        METADATA_OPS,
        read_unary_expression,
        read_unary_expression,
    )
}

/// One shared routine for every operator level: read a left operand from the
/// next level down, then fold `op right` links left-associatively while the
/// head token stays inside `operators`.
fn read_bin_op(
    state: &mut ParseState<'_>,
    node_kind: NodeKind,
    operators: &[BinOp],
    next: Reader,
    rhs: Reader,
) -> Result<NodeId, ParseError> {
    state.check_cancel()?;
    state.open_context(node_kind);

    let left = next(state)?;
    let Some(op) = current_bin_op(state, operators) else {
        state.delete_context()?;
        return Ok(left);
    };

    state.read_constant(op.token, op.constant)?;
    rhs(state)?;
    let mut node = state.close_context(NodeData::Operator(op.operator))?;

    while let Some(op) = current_bin_op(state, operators) {
        state.wrap_context(node_kind, node)?;
        state.read_constant(op.token, op.constant)?;
        rhs(state)?;
        node = state.close_context(NodeData::Operator(op.operator))?;
    }

    Ok(node)
}

fn current_bin_op<'ops>(state: &ParseState<'_>, operators: &'ops [BinOp]) -> Option<&'ops BinOp> {
    let kind = state.current_kind()?;
    operators.iter().find(|op| op.token == kind)
}

// endregion

// region: unary, type and primary expressions

fn read_unary_expression(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    if !matches!(
        state.current_kind(),
        Some(TokenKind::Plus | TokenKind::Minus | TokenKind::KeywordNot)
    ) {
        return read_type_expression(state);
    }

    state.open_context(NodeKind::UnaryExpression);
    state.open_context(NodeKind::ArrayWrapper);
    loop {
        match state.current_kind() {
            Some(TokenKind::Plus) => {
                state.read_constant(TokenKind::Plus, ConstantKind::Plus)?;
            }
            Some(TokenKind::Minus) => {
                state.read_constant(TokenKind::Minus, ConstantKind::Minus)?;
            }
            Some(TokenKind::KeywordNot) => {
                state.read_constant(TokenKind::KeywordNot, ConstantKind::Not)?;
            }
            _ => break,
        }
    }
    state.close_context(NodeData::None)?;
    read_type_expression(state)?;
    state.close_context(NodeData::None)
}

fn read_type_expression(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    if state.is_on(TokenKind::KeywordType) {
        state.open_context(NodeKind::TypePrimaryType);
        state.read_constant(TokenKind::KeywordType, ConstantKind::Type)?;
        ty::read_primary_type(state)?;
        state.close_context(NodeData::None)
    } else {
        let head = read_primary_expression(state)?;
        read_recursive_primary_chain(state, head)
    }
}

#[instrument(level = "trace", skip(state))]
pub(crate) fn read_primary_expression(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    state.check_cancel()?;

    match state.current_kind() {
        Some(TokenKind::Identifier | TokenKind::AtSign) => read_identifier_expression(state),
        Some(kind) if KEYWORD_IDENTIFIER_TOKENS.contains(&kind) => {
            read_keyword_identifier_expression(state)
        }
        Some(kind) if LITERAL_TOKENS.contains(&kind) => read_literal_expression(state),
        Some(TokenKind::LeftParenthesis) => read_parenthesized_expression(state),
        Some(TokenKind::LeftBrace) => read_list_expression(state),
        Some(TokenKind::LeftBracket) => match disambiguate_bracket(state) {
            BracketShape::Record => read_record_expression(state),
            BracketShape::FieldProjection => read_field_projection(state),
            BracketShape::FieldSelector => read_field_selector(state, true),
        },
        Some(TokenKind::Ellipsis) => read_not_implemented_expression(state),
        _ => Err(ParseError::ExpectedAnyTokenKind {
            expected: PRIMARY_EXPRESSION_STARTS,
            found: state.current_kind(),
            position: state.current_position(),
        }),
    }
}

/// Greedily attach invocation, item-access and field suffixes, interposing a
/// `RecursivePrimaryExpression` above the head once the first suffix shows
/// up.
fn read_recursive_primary_chain(
    state: &mut ParseState<'_>,
    head: NodeId,
) -> Result<NodeId, ParseError> {
    if !matches!(
        state.current_kind(),
        Some(TokenKind::LeftParenthesis | TokenKind::LeftBrace | TokenKind::LeftBracket)
    ) {
        return Ok(head);
    }

    let node = state.wrap_context(NodeKind::RecursivePrimaryExpression, head)?;
    state.open_context(NodeKind::ArrayWrapper);
    loop {
        state.check_cancel()?;
        match state.current_kind() {
            Some(TokenKind::LeftParenthesis) => {
                read_invoke_expression(state)?;
            }
            Some(TokenKind::LeftBrace) => {
                read_item_access_expression(state)?;
            }
            Some(TokenKind::LeftBracket) => {
                if state.nth_kind(1) == Some(TokenKind::LeftBracket) {
                    read_field_projection(state)?;
                } else {
                    read_field_selector(state, true)?;
                }
            }
            _ => break,
        }
    }
    state.close_context(NodeData::None)?;
    state.close_context(NodeData::None)?;
    Ok(node)
}

enum BracketShape {
    Record,
    FieldSelector,
    FieldProjection,
}

/// At a primary position, `[` may open a record (`[a = 1]`), a standalone
/// field selector (`[a]`), or a field projection (`[[a], [b]]`).
fn disambiguate_bracket(state: &ParseState<'_>) -> BracketShape {
    let tokens = state.remaining();
    match tokens.get(1).map(|token| token.kind) {
        Some(TokenKind::LeftBracket) => BracketShape::FieldProjection,
        Some(TokenKind::RightBracket) | None => BracketShape::Record,
        _ => {
            for token in &tokens[1..] {
                match token.kind {
                    TokenKind::Equal | TokenKind::Comma => return BracketShape::Record,
                    TokenKind::RightBracket => return BracketShape::FieldSelector,
                    _ => {}
                }
            }
            BracketShape::Record
        }
    }
}

fn read_identifier_expression(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    state.open_context(NodeKind::IdentifierExpression);
    state.maybe_read_constant(TokenKind::AtSign, ConstantKind::AtSign)?;
    state.read_identifier_leaf()?;
    state.close_context(NodeData::None)
}

/// `#sections`, `#table` and friends read as identifier expressions whose
/// identifier text is the keyword itself.
fn read_keyword_identifier_expression(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    state.open_context(NodeKind::IdentifierExpression);
    state.open_context(NodeKind::Identifier);
    let token = state.read_any_token(KEYWORD_IDENTIFIER_TOKENS)?;
    state.close_context(NodeData::Identifier(token.data))?;
    state.close_context(NodeData::None)
}

fn read_literal_expression(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    state.open_context(NodeKind::LiteralExpression);
    let token = state.read_any_token(LITERAL_TOKENS)?;
    let kind = match token.kind {
        TokenKind::KeywordFalse | TokenKind::KeywordTrue => LiteralKind::Logical,
        TokenKind::NullLiteral => LiteralKind::Null,
        TokenKind::TextLiteral => LiteralKind::Text,
        _ => LiteralKind::Numeric,
    };
    state.close_context(NodeData::Literal {
        kind,
        text: token.data,
    })
}

fn read_not_implemented_expression(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    state.open_context(NodeKind::NotImplementedExpression);
    state.read_constant(TokenKind::Ellipsis, ConstantKind::Ellipsis)?;
    state.close_context(NodeData::None)
}

fn read_parenthesized_expression(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    state.open_context(NodeKind::ParenthesizedExpression);
    let open_position = state.current_position().unwrap_or_default();
    state.read_constant(TokenKind::LeftParenthesis, ConstantKind::LeftParenthesis)?;
    let body = (|| {
        read_expression(state)?;
        state.read_constant(TokenKind::RightParenthesis, ConstantKind::RightParenthesis)
    })();
    unterminated_on_eof(body, SequenceKind::Parenthesis, open_position)?;
    state.close_context(NodeData::None)
}

#[instrument(level = "trace", skip(state))]
fn read_invoke_expression(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    state.open_context(NodeKind::InvokeExpression);
    let open_position = state.current_position().unwrap_or_default();
    state.read_constant(TokenKind::LeftParenthesis, ConstantKind::LeftParenthesis)?;
    let body = (|| {
        read_csv_array(
            state,
            read_expression,
            |state| state.is_on(TokenKind::RightParenthesis),
            CsvContinuationKind::DanglingComma,
        )?;
        state.read_constant(TokenKind::RightParenthesis, ConstantKind::RightParenthesis)
    })();
    unterminated_on_eof(body, SequenceKind::Parenthesis, open_position)?;
    state.close_context(NodeData::None)
}

#[instrument(level = "trace", skip(state))]
fn read_item_access_expression(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    state.open_context(NodeKind::ItemAccessExpression);
    let open_position = state.current_position().unwrap_or_default();
    state.read_constant(TokenKind::LeftBrace, ConstantKind::LeftBrace)?;
    let body = (|| {
        read_expression(state)?;
        state.read_constant(TokenKind::RightBrace, ConstantKind::RightBrace)
    })();
    unterminated_on_eof(body, SequenceKind::Bracket, open_position)?;
    state.maybe_read_constant(TokenKind::QuestionMark, ConstantKind::QuestionMark)?;
    state.close_context(NodeData::None)
}

#[instrument(level = "trace", skip(state))]
fn read_list_expression(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    state.open_context(NodeKind::ListExpression);
    let open_position = state.current_position().unwrap_or_default();
    state.read_constant(TokenKind::LeftBrace, ConstantKind::LeftBrace)?;
    let body = (|| {
        read_csv_array(
            state,
            read_list_item,
            |state| state.is_on(TokenKind::RightBrace),
            CsvContinuationKind::DanglingComma,
        )?;
        state.read_constant(TokenKind::RightBrace, ConstantKind::RightBrace)
    })();
    unterminated_on_eof(body, SequenceKind::Bracket, open_position)?;
    state.close_context(NodeData::None)
}

/// A list item is an expression or a `from .. to` range.
fn read_list_item(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    state.open_context(NodeKind::RangeExpression);
    let left = read_expression(state)?;
    if state.is_on(TokenKind::DotDot) {
        state.read_constant(TokenKind::DotDot, ConstantKind::DotDot)?;
        read_expression(state)?;
        state.close_context(NodeData::None)
    } else {
        state.delete_context()?;
        Ok(left)
    }
}

#[instrument(level = "trace", skip(state))]
fn read_record_expression(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    state.open_context(NodeKind::RecordExpression);
    let open_position = state.current_position().unwrap_or_default();
    state.read_constant(TokenKind::LeftBracket, ConstantKind::LeftBracket)?;
    let body = (|| {
        read_csv_array(
            state,
            read_generalized_identifier_paired_expression,
            |state| state.is_on(TokenKind::RightBracket),
            CsvContinuationKind::DanglingComma,
        )?;
        state.read_constant(TokenKind::RightBracket, ConstantKind::RightBracket)
    })();
    unterminated_on_eof(body, SequenceKind::Bracket, open_position)?;
    state.close_context(NodeData::None)
}

fn read_field_selector(
    state: &mut ParseState<'_>,
    allow_optional: bool,
) -> Result<NodeId, ParseError> {
    state.open_context(NodeKind::FieldSelector);
    let open_position = state.current_position().unwrap_or_default();
    state.read_constant(TokenKind::LeftBracket, ConstantKind::LeftBracket)?;
    let body = (|| {
        read_generalized_identifier(state)?;
        state.read_constant(TokenKind::RightBracket, ConstantKind::RightBracket)
    })();
    unterminated_on_eof(body, SequenceKind::Bracket, open_position)?;
    if allow_optional {
        state.maybe_read_constant(TokenKind::QuestionMark, ConstantKind::QuestionMark)?;
    }
    state.close_context(NodeData::None)
}

fn read_field_selector_strict(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    read_field_selector(state, false)
}

fn read_field_projection(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    state.open_context(NodeKind::FieldProjection);
    let open_position = state.current_position().unwrap_or_default();
    state.read_constant(TokenKind::LeftBracket, ConstantKind::LeftBracket)?;
    let body = (|| {
        read_csv_array(
            state,
            read_field_selector_strict,
            |state| state.is_on(TokenKind::RightBracket),
            CsvContinuationKind::DanglingComma,
        )?;
        state.read_constant(TokenKind::RightBracket, ConstantKind::RightBracket)
    })();
    unterminated_on_eof(body, SequenceKind::Bracket, open_position)?;
    state.maybe_read_constant(TokenKind::QuestionMark, ConstantKind::QuestionMark)?;
    state.close_context(NodeData::None)
}

// endregion

// region: pairs, identifiers and literals

fn read_identifier_paired_expression(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    state.open_context(NodeKind::IdentifierPairedExpression);
    state.read_identifier_leaf()?;
    state.read_constant(TokenKind::Equal, ConstantKind::Equal)?;
    read_expression(state)?;
    state.close_context(NodeData::None)
}

fn read_generalized_identifier_paired_expression(
    state: &mut ParseState<'_>,
) -> Result<NodeId, ParseError> {
    state.open_context(NodeKind::GeneralizedIdentifierPairedExpression);
    read_generalized_identifier(state)?;
    state.read_constant(TokenKind::Equal, ConstantKind::Equal)?;
    read_expression(state)?;
    state.close_context(NodeData::None)
}

/// Record keys and field names admit nearly any token run (`[Foo Bar = 1]`);
/// the leaf's data is the exact source slice the run covers.
pub(crate) fn read_generalized_identifier(
    state: &mut ParseState<'_>,
) -> Result<NodeId, ParseError> {
    state.open_context(NodeKind::GeneralizedIdentifier);

    let mut first: Option<TokenPosition> = None;
    let mut last: Option<TokenPosition> = None;
    while let Some(token) = state.maybe_current() {
        if !is_generalized_identifier_token(token.kind) {
            break;
        }
        first.get_or_insert(token.position_start);
        last = Some(token.position_end);
        state.token_index += 1;
    }

    match (first, last) {
        (Some(start), Some(end)) => {
            let data = state.text_between(start, end).to_string();
            state.close_context(NodeData::GeneralizedIdentifier(data))
        }
        _ => Err(ParseError::ExpectedGeneralizedIdentifier {
            position: state.current_position(),
        }),
    }
}

fn is_generalized_identifier_token(kind: TokenKind) -> bool {
    kind == TokenKind::Identifier
        || kind == TokenKind::NullLiteral
        || kind == TokenKind::NumericLiteral
        || kind.is_keyword()
}

// endregion

// region: literal documents (section attributes)

fn read_record_literal(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    state.open_context(NodeKind::RecordLiteral);
    let open_position = state.current_position().unwrap_or_default();
    state.read_constant(TokenKind::LeftBracket, ConstantKind::LeftBracket)?;
    let body = (|| {
        read_csv_array(
            state,
            read_generalized_identifier_paired_any_literal,
            |state| state.is_on(TokenKind::RightBracket),
            CsvContinuationKind::DanglingComma,
        )?;
        state.read_constant(TokenKind::RightBracket, ConstantKind::RightBracket)
    })();
    unterminated_on_eof(body, SequenceKind::Bracket, open_position)?;
    state.close_context(NodeData::None)
}

fn read_generalized_identifier_paired_any_literal(
    state: &mut ParseState<'_>,
) -> Result<NodeId, ParseError> {
    state.open_context(NodeKind::GeneralizedIdentifierPairedAnyLiteral);
    read_generalized_identifier(state)?;
    state.read_constant(TokenKind::Equal, ConstantKind::Equal)?;
    read_any_literal(state)?;
    state.close_context(NodeData::None)
}

fn read_any_literal(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    match state.current_kind() {
        Some(TokenKind::LeftBracket) => read_record_literal(state),
        Some(TokenKind::LeftBrace) => read_list_literal(state),
        Some(kind) if LITERAL_TOKENS.contains(&kind) => read_literal_expression(state),
        _ => Err(ParseError::ExpectedAnyTokenKind {
            expected: ANY_LITERAL_STARTS,
            found: state.current_kind(),
            position: state.current_position(),
        }),
    }
}

fn read_list_literal(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    state.open_context(NodeKind::ListLiteral);
    let open_position = state.current_position().unwrap_or_default();
    state.read_constant(TokenKind::LeftBrace, ConstantKind::LeftBrace)?;
    let body = (|| {
        read_csv_array(
            state,
            read_any_literal,
            |state| state.is_on(TokenKind::RightBrace),
            CsvContinuationKind::DanglingComma,
        )?;
        state.read_constant(TokenKind::RightBrace, ConstantKind::RightBrace)
    })();
    unterminated_on_eof(body, SequenceKind::Bracket, open_position)?;
    state.close_context(NodeData::None)
}

// endregion

// region: shared plumbing

/// Comma-separated items under one array wrapper, each wrapped in a `Csv`
/// node that carries the item and its optional trailing comma.
fn read_csv_array(
    state: &mut ParseState<'_>,
    read_item: Reader,
    at_end: impl Fn(&ParseState<'_>) -> bool,
    continuation: CsvContinuationKind,
) -> Result<NodeId, ParseError> {
    state.open_context(NodeKind::ArrayWrapper);

    if !at_end(state) && state.maybe_current().is_some() {
        loop {
            state.check_cancel()?;
            state.open_context(NodeKind::Csv);
            read_item(state)?;
            let has_comma = state.is_on(TokenKind::Comma);
            if has_comma {
                state.read_constant(TokenKind::Comma, ConstantKind::Comma)?;
            }
            state.close_context(NodeData::None)?;
            if !has_comma {
                break;
            }
            if at_end(state) || state.maybe_current().is_none() {
                return Err(ParseError::ExpectedCsvContinuation {
                    kind: continuation,
                    position: state.current_position(),
                });
            }
        }
    }

    state.close_context(NodeData::None)
}

/// Report a failure caused by running out of tokens as an unterminated
/// sequence anchored at its opening token.
fn unterminated_on_eof<T>(
    result: Result<T, ParseError>,
    kind: SequenceKind,
    open_position: TokenPosition,
) -> Result<T, ParseError> {
    match result {
        Err(error) if error.is_eof() => Err(ParseError::UnterminatedSequence {
            kind,
            position: open_position,
        }),
        other => other,
    }
}

// endregion
