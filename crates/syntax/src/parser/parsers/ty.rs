//! The type sub-language: primary types, field-specification lists, and the
//! structured record/table/list/function/nullable type forms.

use tracing::instrument;

use crate::node::{ConstantKind, NodeData, NodeId, NodeKind};
use crate::token::TokenKind;

use super::super::context::ParseState;
use super::super::error::{CsvContinuationKind, ParseError, SequenceKind};
use super::{
    read_generalized_identifier, read_primary_expression, read_primitive_type,
    unterminated_on_eof,
};

#[instrument(level = "trace", skip(state))]
pub(crate) fn read_primary_type(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    state.check_cancel()?;

    match state.current_kind() {
        Some(TokenKind::LeftBracket) => read_record_type(state),
        Some(TokenKind::LeftBrace) => read_list_type(state),
        _ if state.is_on_identifier_constant("table") => read_table_type(state),
        _ if state.is_on_identifier_constant("function")
            && state.nth_kind(1) == Some(TokenKind::LeftParenthesis) =>
        {
            read_function_type(state)
        }
        _ if state.is_on_identifier_constant("nullable") => read_nullable_type(state),
        _ => read_primitive_type(state),
    }
}

fn read_record_type(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    state.open_context(NodeKind::RecordType);
    read_field_specification_list(state)?;
    state.close_context(NodeData::None)
}

fn read_list_type(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    state.open_context(NodeKind::ListType);
    let open_position = state.current_position().unwrap_or_default();
    state.read_constant(TokenKind::LeftBrace, ConstantKind::LeftBrace)?;
    let body = (|| {
        read_primary_type(state)?;
        state.read_constant(TokenKind::RightBrace, ConstantKind::RightBrace)
    })();
    unterminated_on_eof(body, SequenceKind::Bracket, open_position)?;
    state.close_context(NodeData::None)
}

/// `table [ ... ]` with a field list, or `table <primary-expression>` when
/// the row type comes from an expression.
fn read_table_type(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    state.open_context(NodeKind::TableType);
    state.read_identifier_constant("table", ConstantKind::Table)?;
    if state.is_on(TokenKind::LeftBracket) {
        read_field_specification_list(state)?;
    } else {
        read_primary_expression(state)?;
    }
    state.close_context(NodeData::None)
}

fn read_function_type(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    state.open_context(NodeKind::FunctionType);
    state.read_identifier_constant("function", ConstantKind::Function)?;
    super::read_parameter_list(state)?;
    read_as_type(state)?;
    state.close_context(NodeData::None)
}

fn read_as_type(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    state.open_context(NodeKind::AsType);
    state.read_constant(TokenKind::KeywordAs, ConstantKind::As)?;
    read_primary_type(state)?;
    state.close_context(NodeData::None)
}

fn read_nullable_type(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    state.open_context(NodeKind::NullableType);
    state.read_identifier_constant("nullable", ConstantKind::Nullable)?;
    read_primary_type(state)?;
    state.close_context(NodeData::None)
}

/// `[ field = type, ... ]`; the trailing `...` marks an open record.
fn read_field_specification_list(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    state.open_context(NodeKind::FieldSpecificationList);
    let open_position = state.current_position().unwrap_or_default();
    state.read_constant(TokenKind::LeftBracket, ConstantKind::LeftBracket)?;
    let body = (|| {
        read_field_specification_csv(state)?;
        state.maybe_read_constant(TokenKind::Ellipsis, ConstantKind::Ellipsis)?;
        state.read_constant(TokenKind::RightBracket, ConstantKind::RightBracket)
    })();
    unterminated_on_eof(body, SequenceKind::Bracket, open_position)?;
    state.close_context(NodeData::None)
}

fn read_field_specification_csv(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    state.open_context(NodeKind::ArrayWrapper);

    if !matches!(
        state.current_kind(),
        Some(TokenKind::RightBracket | TokenKind::Ellipsis) | None
    ) {
        loop {
            state.check_cancel()?;
            state.open_context(NodeKind::Csv);
            read_field_specification(state)?;
            let has_comma = state.is_on(TokenKind::Comma);
            if has_comma {
                state.read_constant(TokenKind::Comma, ConstantKind::Comma)?;
            }
            state.close_context(NodeData::None)?;
            if !has_comma {
                break;
            }
            // A trailing comma is only allowed right before the open-record
            // marker.
            if state.is_on(TokenKind::Ellipsis) {
                break;
            }
            if state.is_on(TokenKind::RightBracket) || state.maybe_current().is_none() {
                return Err(ParseError::ExpectedCsvContinuation {
                    kind: CsvContinuationKind::DanglingComma,
                    position: state.current_position(),
                });
            }
        }
    }

    state.close_context(NodeData::None)
}

fn read_field_specification(state: &mut ParseState<'_>) -> Result<NodeId, ParseError> {
    state.open_context(NodeKind::FieldSpecification);
    state.maybe_read_identifier_constant("optional", ConstantKind::Optional)?;
    read_generalized_identifier(state)?;
    if state.is_on(TokenKind::Equal) {
        state.open_context(NodeKind::FieldTypeSpecification);
        state.read_constant(TokenKind::Equal, ConstantKind::Equal)?;
        read_primary_type(state)?;
        state.close_context(NodeData::None)?;
    }
    state.close_context(NodeData::None)
}
