use std::collections::BTreeMap;

use pq_common::CommonError;
use thiserror::Error;

use crate::token::{Position, Range, TokenPosition};

/// The lexer's half of the error taxonomy.
///
/// Lexing itself never aborts on bad input: a line that fails to tokenize is
/// recorded as `TouchedWithError` and later lines proceed. These variants
/// surface through [`crate::lexer::lex`]'s result, through the edit entry
/// points, and through snapshot creation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexError {
    #[error(transparent)]
    Common(#[from] CommonError),

    #[error("line number {line_number} is out of range, the state has {num_lines} lines")]
    BadLineNumber { line_number: u32, num_lines: u32 },

    #[error("the range {range:?} is invalid: {kind:?}")]
    BadRange { kind: BadRangeKind, range: Range },

    #[error("the line's previous tokenize attempt failed: {0}")]
    BadState(Box<LexError>),

    #[error("attempted to retokenize a line whose text did not change")]
    EndOfStream,

    #[error("{} line(s) failed to tokenize", error_lines.len())]
    ErrorLineMap { error_lines: BTreeMap<u32, LexError> },

    #[error("expected a {kind:?} at {position:?}")]
    Expected {
        kind: ExpectedKind,
        position: Position,
    },

    #[error("unexpected end of line at {position:?}")]
    UnexpectedEof { position: Position },

    #[error("unexpected read at {position:?}")]
    UnexpectedRead { position: Position },

    #[error("unterminated {kind:?} starting at {position:?}")]
    UnterminatedMultilineToken {
        kind: UnterminatedMultilineTokenKind,
        position: TokenPosition,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedKind {
    HexLiteral,
    KeywordOrIdentifier,
    Numeric,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadRangeKind {
    SameLineCodeUnitStartGreaterThanCodeUnitEnd,
    LineNumberStartGreaterThanLineNumberEnd,
    LineNumberStartOutOfRange,
    LineNumberEndOutOfRange,
    LineCodeUnitStartOutOfRange,
    LineCodeUnitEndOutOfRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnterminatedMultilineTokenKind {
    MultilineComment,
    QuotedIdentifier,
    Text,
}
