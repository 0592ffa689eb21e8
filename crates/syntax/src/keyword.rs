//! The keyword table and the expression-starter set used by the lexer and by
//! keyword autocomplete.

use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoEnumIterator, IntoStaticStr};

use crate::token::TokenKind;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    IntoStaticStr,
)]
pub enum KeywordKind {
    #[strum(serialize = "and")]
    And,
    #[strum(serialize = "as")]
    As,
    #[strum(serialize = "each")]
    Each,
    #[strum(serialize = "else")]
    Else,
    #[strum(serialize = "error")]
    Error,
    #[strum(serialize = "false")]
    False,
    #[strum(serialize = "#binary")]
    HashBinary,
    #[strum(serialize = "#date")]
    HashDate,
    #[strum(serialize = "#datetime")]
    HashDateTime,
    #[strum(serialize = "#datetimezone")]
    HashDateTimeZone,
    #[strum(serialize = "#duration")]
    HashDuration,
    #[strum(serialize = "#infinity")]
    HashInfinity,
    #[strum(serialize = "#nan")]
    HashNan,
    #[strum(serialize = "#sections")]
    HashSections,
    #[strum(serialize = "#shared")]
    HashShared,
    #[strum(serialize = "#table")]
    HashTable,
    #[strum(serialize = "#time")]
    HashTime,
    #[strum(serialize = "if")]
    If,
    #[strum(serialize = "in")]
    In,
    #[strum(serialize = "is")]
    Is,
    #[strum(serialize = "let")]
    Let,
    #[strum(serialize = "meta")]
    Meta,
    #[strum(serialize = "not")]
    Not,
    #[strum(serialize = "null")]
    Null,
    #[strum(serialize = "or")]
    Or,
    #[strum(serialize = "otherwise")]
    Otherwise,
    #[strum(serialize = "section")]
    Section,
    #[strum(serialize = "shared")]
    Shared,
    #[strum(serialize = "then")]
    Then,
    #[strum(serialize = "true")]
    True,
    #[strum(serialize = "try")]
    Try,
    #[strum(serialize = "type")]
    Type,
}

/// Keywords that may begin an expression, in the order autocomplete offers
/// them.
pub const EXPRESSION_KEYWORDS: &[KeywordKind] = &[
    KeywordKind::Each,
    KeywordKind::Error,
    KeywordKind::False,
    KeywordKind::If,
    KeywordKind::Let,
    KeywordKind::Not,
    KeywordKind::Null,
    KeywordKind::True,
    KeywordKind::Try,
    KeywordKind::Type,
];

impl KeywordKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    /// Exact-match lookup over the whole table.
    #[must_use]
    pub fn from_text(text: &str) -> Option<Self> {
        Self::iter().find(|keyword| keyword.as_str() == text)
    }

    #[must_use]
    pub fn token_kind(self) -> TokenKind {
        match self {
            KeywordKind::And => TokenKind::KeywordAnd,
            KeywordKind::As => TokenKind::KeywordAs,
            KeywordKind::Each => TokenKind::KeywordEach,
            KeywordKind::Else => TokenKind::KeywordElse,
            KeywordKind::Error => TokenKind::KeywordError,
            KeywordKind::False => TokenKind::KeywordFalse,
            KeywordKind::HashBinary => TokenKind::KeywordHashBinary,
            KeywordKind::HashDate => TokenKind::KeywordHashDate,
            KeywordKind::HashDateTime => TokenKind::KeywordHashDateTime,
            KeywordKind::HashDateTimeZone => TokenKind::KeywordHashDateTimeZone,
            KeywordKind::HashDuration => TokenKind::KeywordHashDuration,
            KeywordKind::HashInfinity => TokenKind::KeywordHashInfinity,
            KeywordKind::HashNan => TokenKind::KeywordHashNan,
            KeywordKind::HashSections => TokenKind::KeywordHashSections,
            KeywordKind::HashShared => TokenKind::KeywordHashShared,
            KeywordKind::HashTable => TokenKind::KeywordHashTable,
            KeywordKind::HashTime => TokenKind::KeywordHashTime,
            KeywordKind::If => TokenKind::KeywordIf,
            KeywordKind::In => TokenKind::KeywordIn,
            KeywordKind::Is => TokenKind::KeywordIs,
            KeywordKind::Let => TokenKind::KeywordLet,
            KeywordKind::Meta => TokenKind::KeywordMeta,
            KeywordKind::Not => TokenKind::KeywordNot,
            KeywordKind::Null => TokenKind::NullLiteral,
            KeywordKind::Or => TokenKind::KeywordOr,
            KeywordKind::Otherwise => TokenKind::KeywordOtherwise,
            KeywordKind::Section => TokenKind::KeywordSection,
            KeywordKind::Shared => TokenKind::KeywordShared,
            KeywordKind::Then => TokenKind::KeywordThen,
            KeywordKind::True => TokenKind::KeywordTrue,
            KeywordKind::Try => TokenKind::KeywordTry,
            KeywordKind::Type => TokenKind::KeywordType,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_round_trip() {
        for keyword in KeywordKind::iter() {
            assert_eq!(KeywordKind::from_text(keyword.as_str()), Some(keyword));
        }
    }

    #[test]
    fn non_keywords_miss() {
        assert_eq!(KeywordKind::from_text("lets"), None);
        assert_eq!(KeywordKind::from_text("#binaries"), None);
    }
}
