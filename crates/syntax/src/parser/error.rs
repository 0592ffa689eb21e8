use pq_common::CommonError;
use thiserror::Error;

use crate::token::{TokenKind, TokenPosition};

/// The parser's half of the error taxonomy.
///
/// The parser does not recover mid-production: the first failure unwinds to
/// the top, but every context opened on the way down stays in the node-id map
/// so inspection can still walk the partial tree.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error(transparent)]
    Common(#[from] CommonError),

    #[error("expected one of {expected:?}, found {found:?}")]
    ExpectedAnyTokenKind {
        expected: &'static [TokenKind],
        found: Option<TokenKind>,
        position: Option<TokenPosition>,
    },

    #[error("a comma must be followed by another {kind:?} item")]
    ExpectedCsvContinuation {
        kind: CsvContinuationKind,
        position: Option<TokenPosition>,
    },

    #[error("expected a generalized identifier")]
    ExpectedGeneralizedIdentifier { position: Option<TokenPosition> },

    #[error("expected {expected:?}, found {found:?}")]
    ExpectedTokenKind {
        expected: TokenKind,
        found: Option<TokenKind>,
        position: Option<TokenPosition>,
    },

    #[error("`{text}` is not a primitive type")]
    InvalidPrimitiveType {
        text: String,
        position: Option<TokenPosition>,
    },

    #[error("required parameters must precede optional parameters")]
    RequiredParameterAfterOptionalParameter { position: Option<TokenPosition> },

    #[error("the {kind:?} sequence opened at {position:?} is unterminated")]
    UnterminatedSequence {
        kind: SequenceKind,
        position: TokenPosition,
    },

    #[error("tokens remain after the document ends, starting at {position:?}")]
    UnusedTokensRemain { position: TokenPosition },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsvContinuationKind {
    DanglingComma,
    LetExpression,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceKind {
    Bracket,
    Parenthesis,
}

impl ParseError {
    /// Whether the failure happened because the token stream ran out, used to
    /// report unterminated sequences at their opening token instead.
    #[must_use]
    pub fn is_eof(&self) -> bool {
        matches!(
            self,
            ParseError::ExpectedAnyTokenKind { found: None, .. }
                | ParseError::ExpectedTokenKind { found: None, .. }
                | ParseError::ExpectedCsvContinuation { position: None, .. }
                | ParseError::ExpectedGeneralizedIdentifier { position: None }
                | ParseError::InvalidPrimitiveType { position: None, .. }
        )
    }
}
