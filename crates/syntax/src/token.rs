//! Token kinds and positions shared by the lexer, the snapshot, and the
//! parser.

use serde::{Deserialize, Serialize};

/// Every terminal category, including the line-only multiline pieces that the
/// snapshot later folds away (`*Start`/`*Content`/`*End`) and the comment
/// kinds that never reach the parser's token stream.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum TokenKind {
    Ampersand,
    Asterisk,
    AtSign,
    Comma,
    Division,
    DotDot,
    Ellipsis,
    Equal,
    FatArrow,
    GreaterThan,
    GreaterThanEqualTo,
    HexLiteral,
    Identifier,
    KeywordAnd,
    KeywordAs,
    KeywordEach,
    KeywordElse,
    KeywordError,
    KeywordFalse,
    KeywordHashBinary,
    KeywordHashDate,
    KeywordHashDateTime,
    KeywordHashDateTimeZone,
    KeywordHashDuration,
    KeywordHashInfinity,
    KeywordHashNan,
    KeywordHashSections,
    KeywordHashShared,
    KeywordHashTable,
    KeywordHashTime,
    KeywordIf,
    KeywordIn,
    KeywordIs,
    KeywordLet,
    KeywordMeta,
    KeywordNot,
    KeywordOr,
    KeywordOtherwise,
    KeywordSection,
    KeywordShared,
    KeywordThen,
    KeywordTrue,
    KeywordTry,
    KeywordType,
    LeftBrace,
    LeftBracket,
    LeftParenthesis,
    LessThan,
    LessThanEqualTo,
    LineComment,
    Minus,
    MultilineComment,
    MultilineCommentContent,
    MultilineCommentEnd,
    MultilineCommentStart,
    NotEqual,
    NullCoalescingOperator,
    NullLiteral,
    NumericLiteral,
    Plus,
    QuestionMark,
    QuotedIdentifierContent,
    QuotedIdentifierEnd,
    QuotedIdentifierStart,
    RightBrace,
    RightBracket,
    RightParenthesis,
    Semicolon,
    TextLiteral,
    TextLiteralContent,
    TextLiteralEnd,
    TextLiteralStart,
}

impl TokenKind {
    /// Kinds that only ever appear inside a per-line token list and are
    /// folded or re-attached by the snapshot.
    #[must_use]
    pub fn is_line_only(self) -> bool {
        matches!(
            self,
            TokenKind::LineComment
                | TokenKind::MultilineComment
                | TokenKind::MultilineCommentContent
                | TokenKind::MultilineCommentEnd
                | TokenKind::MultilineCommentStart
                | TokenKind::QuotedIdentifierContent
                | TokenKind::QuotedIdentifierEnd
                | TokenKind::QuotedIdentifierStart
                | TokenKind::TextLiteralContent
                | TokenKind::TextLiteralEnd
                | TokenKind::TextLiteralStart
        )
    }

    #[must_use]
    pub fn is_keyword(self) -> bool {
        matches!(
            self,
            TokenKind::KeywordAnd
                | TokenKind::KeywordAs
                | TokenKind::KeywordEach
                | TokenKind::KeywordElse
                | TokenKind::KeywordError
                | TokenKind::KeywordFalse
                | TokenKind::KeywordHashBinary
                | TokenKind::KeywordHashDate
                | TokenKind::KeywordHashDateTime
                | TokenKind::KeywordHashDateTimeZone
                | TokenKind::KeywordHashDuration
                | TokenKind::KeywordHashInfinity
                | TokenKind::KeywordHashNan
                | TokenKind::KeywordHashSections
                | TokenKind::KeywordHashShared
                | TokenKind::KeywordHashTable
                | TokenKind::KeywordHashTime
                | TokenKind::KeywordIf
                | TokenKind::KeywordIn
                | TokenKind::KeywordIs
                | TokenKind::KeywordLet
                | TokenKind::KeywordMeta
                | TokenKind::KeywordNot
                | TokenKind::KeywordOr
                | TokenKind::KeywordOtherwise
                | TokenKind::KeywordSection
                | TokenKind::KeywordShared
                | TokenKind::KeywordThen
                | TokenKind::KeywordTrue
                | TokenKind::KeywordTry
                | TokenKind::KeywordType
        )
    }
}

/// An absolute offset into the source, kept alongside its line-local form so
/// diagnostics and cursor math never have to rescan the text.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TokenPosition {
    pub code_unit: u32,
    pub line_code_unit: u32,
    pub line_number: u32,
}

/// A cursor position expressed the way editors express it.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Position {
    pub line_number: u32,
    pub line_code_unit: u32,
}

impl Position {
    #[must_use]
    pub fn new(line_number: u32, line_code_unit: u32) -> Self {
        Self {
            line_number,
            line_code_unit,
        }
    }
}

impl From<TokenPosition> for Position {
    fn from(position: TokenPosition) -> Self {
        Self {
            line_number: position.line_number,
            line_code_unit: position.line_code_unit,
        }
    }
}

/// A half-open `[start, end)` span of [`Position`]s, used by the range-edit
/// entry point of the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

/// A token in a [`crate::lexer::Snapshot`]: absolute positions, owned data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub data: String,
    pub position_start: TokenPosition,
    pub position_end: TokenPosition,
}

/// A token inside a single line; offsets are line-local code units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineToken {
    pub kind: TokenKind,
    pub start: u32,
    pub end: u32,
    pub data: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommentKind {
    Line,
    Multiline,
}

/// Comments are collected out of band by the snapshot; they never appear in
/// the parser's token stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub kind: CommentKind,
    pub data: String,
    pub position_start: TokenPosition,
    pub position_end: TokenPosition,
}
