//! The per-line tokenizer: a hand-written maximal-munch scanner driven by the
//! lex mode the previous line ended in.

use crate::keyword::KeywordKind;
use crate::token::{LineToken, Position, TokenKind};

use super::error::{ExpectedKind, LexError};
use super::LexMode;

/// Outcome of tokenizing one line. `tokens` holds whatever was read before a
/// failure, so callers can keep partial results.
#[derive(Debug)]
pub(crate) struct LineTokenize {
    pub tokens: Vec<LineToken>,
    pub mode_end: LexMode,
    pub error: Option<LexError>,
}

pub(crate) fn tokenize_line(text: &str, line_number: u32, mode_start: LexMode) -> LineTokenize {
    Scanner {
        text,
        line_number,
        offset: 0,
        tokens: Vec::new(),
    }
    .run(mode_start)
}

struct Scanner<'a> {
    text: &'a str,
    line_number: u32,
    offset: usize,
    tokens: Vec<LineToken>,
}

impl<'a> Scanner<'a> {
    fn run(mut self, mode_start: LexMode) -> LineTokenize {
        let mut mode = mode_start;

        while self.offset < self.text.len() {
            mode = match mode {
                LexMode::Comment => match self.read_comment_content_or_end() {
                    Some(next) => next,
                    None => break,
                },
                LexMode::Text => match self.read_wrapped_content_or_end(
                    TokenKind::TextLiteralContent,
                    TokenKind::TextLiteralEnd,
                ) {
                    Some(next) => next,
                    None => break,
                },
                LexMode::QuotedIdentifier => match self.read_wrapped_content_or_end(
                    TokenKind::QuotedIdentifierContent,
                    TokenKind::QuotedIdentifierEnd,
                ) {
                    Some(next) => next,
                    None => break,
                },
                LexMode::Default => match self.read_default() {
                    Ok(Some(next)) => next,
                    Ok(None) => break,
                    Err(error) => {
                        return LineTokenize {
                            tokens: self.tokens,
                            mode_end: LexMode::Default,
                            error: Some(error),
                        }
                    }
                },
            };
        }

        LineTokenize {
            tokens: self.tokens,
            mode_end: mode,
            error: None,
        }
    }

    /// One step of default-mode scanning. `Ok(Some(mode))` continues in the
    /// given mode, `Ok(None)` means the rest of the line was consumed.
    fn read_default(&mut self) -> Result<Option<LexMode>, LexError> {
        self.skip_whitespace();

        let start = self.offset;
        let ch = match self.peek() {
            Some(ch) => ch,
            None => return Ok(None),
        };

        match ch {
            ',' => self.single(TokenKind::Comma),
            ';' => self.single(TokenKind::Semicolon),
            '(' => self.single(TokenKind::LeftParenthesis),
            ')' => self.single(TokenKind::RightParenthesis),
            '{' => self.single(TokenKind::LeftBrace),
            '}' => self.single(TokenKind::RightBrace),
            '[' => self.single(TokenKind::LeftBracket),
            ']' => self.single(TokenKind::RightBracket),
            '@' => self.single(TokenKind::AtSign),
            '&' => self.single(TokenKind::Ampersand),
            '+' => self.single(TokenKind::Plus),
            '-' => self.single(TokenKind::Minus),
            '*' => self.single(TokenKind::Asterisk),
            '=' => {
                if self.peek_at(1) == Some('>') {
                    self.multi(2, TokenKind::FatArrow);
                } else {
                    self.single(TokenKind::Equal);
                }
            }
            '<' => match self.peek_at(1) {
                Some('=') => self.multi(2, TokenKind::LessThanEqualTo),
                Some('>') => self.multi(2, TokenKind::NotEqual),
                _ => self.single(TokenKind::LessThan),
            },
            '>' => {
                if self.peek_at(1) == Some('=') {
                    self.multi(2, TokenKind::GreaterThanEqualTo);
                } else {
                    self.single(TokenKind::GreaterThan);
                }
            }
            '?' => {
                if self.peek_at(1) == Some('?') {
                    self.multi(2, TokenKind::NullCoalescingOperator);
                } else {
                    self.single(TokenKind::QuestionMark);
                }
            }
            '/' => match self.peek_at(1) {
                Some('/') => {
                    self.emit(start, self.text.len(), TokenKind::LineComment);
                    self.offset = self.text.len();
                }
                Some('*') => return Ok(Some(self.read_or_start_multiline_comment())),
                _ => self.single(TokenKind::Division),
            },
            '.' => match self.peek_at(1) {
                Some(next) if next.is_ascii_digit() => self.read_numeric()?,
                Some('.') => {
                    if self.peek_at(2) == Some('.') {
                        self.multi(3, TokenKind::Ellipsis);
                    } else {
                        self.multi(2, TokenKind::DotDot);
                    }
                }
                _ => return Err(self.unexpected_read(start)),
            },
            '"' => return Ok(Some(self.read_or_start_text())),
            '#' => match self.peek_at(1) {
                Some('"') => return Ok(Some(self.read_or_start_quoted_identifier())),
                Some(next) if is_identifier_start(next) => self.read_hash_keyword()?,
                _ => return Err(self.unexpected_read(start)),
            },
            ch if ch.is_ascii_digit() => self.read_numeric()?,
            ch if is_identifier_start(ch) => self.read_identifier_or_keyword(),
            _ => return Err(self.unexpected_read(start)),
        }

        Ok(Some(LexMode::Default))
    }

    fn read_comment_content_or_end(&mut self) -> Option<LexMode> {
        let start = self.offset;
        match self.text[start..].find("*/") {
            Some(relative) => {
                let end = start + relative + 2;
                self.emit(start, end, TokenKind::MultilineCommentEnd);
                self.offset = end;
                Some(LexMode::Default)
            }
            None => {
                self.emit(start, self.text.len(), TokenKind::MultilineCommentContent);
                self.offset = self.text.len();
                None
            }
        }
    }

    fn read_wrapped_content_or_end(
        &mut self,
        content: TokenKind,
        end_kind: TokenKind,
    ) -> Option<LexMode> {
        let start = self.offset;
        match find_quote_end(self.text, start) {
            Some(quote) => {
                self.emit(start, quote + 1, end_kind);
                self.offset = quote + 1;
                Some(LexMode::Default)
            }
            None => {
                self.emit(start, self.text.len(), content);
                self.offset = self.text.len();
                None
            }
        }
    }

    fn read_or_start_multiline_comment(&mut self) -> LexMode {
        let start = self.offset;
        match self.text[start + 2..].find("*/") {
            Some(relative) => {
                let end = start + 2 + relative + 2;
                self.emit(start, end, TokenKind::MultilineComment);
                self.offset = end;
                LexMode::Default
            }
            None => {
                self.emit(start, self.text.len(), TokenKind::MultilineCommentStart);
                self.offset = self.text.len();
                LexMode::Comment
            }
        }
    }

    fn read_or_start_text(&mut self) -> LexMode {
        let start = self.offset;
        match find_quote_end(self.text, start + 1) {
            Some(quote) => {
                self.emit(start, quote + 1, TokenKind::TextLiteral);
                self.offset = quote + 1;
                LexMode::Default
            }
            None => {
                self.emit(start, self.text.len(), TokenKind::TextLiteralStart);
                self.offset = self.text.len();
                LexMode::Text
            }
        }
    }

    fn read_or_start_quoted_identifier(&mut self) -> LexMode {
        let start = self.offset;
        match find_quote_end(self.text, start + 2) {
            Some(quote) => {
                self.emit(start, quote + 1, TokenKind::Identifier);
                self.offset = quote + 1;
                LexMode::Default
            }
            None => {
                self.emit(start, self.text.len(), TokenKind::QuotedIdentifierStart);
                self.offset = self.text.len();
                LexMode::QuotedIdentifier
            }
        }
    }

    fn read_numeric(&mut self) -> Result<(), LexError> {
        let start = self.offset;

        if self.text[start..].starts_with("0x") || self.text[start..].starts_with("0X") {
            self.offset += 2;
            let digits = self.eat_while(|ch| ch.is_ascii_hexdigit());
            if digits == 0 {
                return Err(self.expected(start, ExpectedKind::HexLiteral));
            }
            self.emit(start, self.offset, TokenKind::HexLiteral);
            return Ok(());
        }

        self.eat_while(|ch| ch.is_ascii_digit());
        if self.peek() == Some('.') && self.peek_at(1).map_or(false, |ch| ch.is_ascii_digit()) {
            self.offset += 1;
            self.eat_while(|ch| ch.is_ascii_digit());
        }

        if matches!(self.peek(), Some('e' | 'E')) {
            self.offset += 1;
            if matches!(self.peek(), Some('+' | '-')) {
                self.offset += 1;
            }
            let digits = self.eat_while(|ch| ch.is_ascii_digit());
            if digits == 0 {
                return Err(self.expected(start, ExpectedKind::Numeric));
            }
        }

        self.emit(start, self.offset, TokenKind::NumericLiteral);
        Ok(())
    }

    fn read_identifier_or_keyword(&mut self) {
        let start = self.offset;
        self.read_identifier_text();

        let kind = match KeywordKind::from_text(&self.text[start..self.offset]) {
            Some(keyword) => keyword.token_kind(),
            None => TokenKind::Identifier,
        };
        self.emit(start, self.offset, kind);
    }

    fn read_hash_keyword(&mut self) -> Result<(), LexError> {
        let start = self.offset;
        self.offset += 1;
        self.eat_while(is_identifier_continue);

        match KeywordKind::from_text(&self.text[start..self.offset]) {
            Some(keyword) => {
                self.emit(start, self.offset, keyword.token_kind());
                Ok(())
            }
            None => Err(self.expected(start, ExpectedKind::KeywordOrIdentifier)),
        }
    }

    /// Identifiers admit interior dots (`Text.From`), but a dot must be
    /// followed by another identifier-start to belong to the identifier.
    fn read_identifier_text(&mut self) {
        loop {
            self.eat_while(is_identifier_continue);
            if self.peek() == Some('.') && self.peek_at(1).map_or(false, is_identifier_start) {
                self.offset += 1;
            } else {
                break;
            }
        }
    }

    fn skip_whitespace(&mut self) {
        self.eat_while(char::is_whitespace);
    }

    fn eat_while(&mut self, predicate: impl Fn(char) -> bool) -> usize {
        let mut count = 0;
        while let Some(ch) = self.peek() {
            if !predicate(ch) {
                break;
            }
            self.offset += ch.len_utf8();
            count += 1;
        }
        count
    }

    fn peek(&self) -> Option<char> {
        self.text[self.offset..].chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.text[self.offset..].chars().nth(n)
    }

    fn single(&mut self, kind: TokenKind) {
        let start = self.offset;
        self.offset += 1;
        self.emit(start, self.offset, kind);
    }

    fn multi(&mut self, code_units: usize, kind: TokenKind) {
        let start = self.offset;
        self.offset += code_units;
        self.emit(start, self.offset, kind);
    }

    fn emit(&mut self, start: usize, end: usize, kind: TokenKind) {
        self.tokens.push(LineToken {
            kind,
            start: start as u32,
            end: end as u32,
            data: self.text[start..end].to_string(),
        });
    }

    fn position(&self, offset: usize) -> Position {
        Position {
            line_number: self.line_number,
            line_code_unit: offset as u32,
        }
    }

    fn unexpected_read(&self, offset: usize) -> LexError {
        LexError::UnexpectedRead {
            position: self.position(offset),
        }
    }

    fn expected(&self, offset: usize, kind: ExpectedKind) -> LexError {
        LexError::Expected {
            kind,
            position: self.position(offset),
        }
    }
}

fn is_identifier_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_'
}

fn is_identifier_continue(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

/// Find the quote terminating a text literal or quoted identifier, honoring
/// the `""` escape. Returns the offset of the closing quote.
fn find_quote_end(text: &str, from: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut i = from;
    while i < bytes.len() {
        if bytes[i] == b'"' {
            if bytes.get(i + 1) == Some(&b'"') {
                i += 2;
            } else {
                return Some(i);
            }
        } else {
            i += 1;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        let result = tokenize_line(text, 0, LexMode::Default);
        assert!(result.error.is_none(), "{:#?}", result.error);
        result.tokens.into_iter().map(|token| token.kind).collect()
    }

    #[test]
    fn punctuation_and_operators() {
        assert_eq!(
            kinds("=> <> <= ?? .. ..."),
            vec![
                TokenKind::FatArrow,
                TokenKind::NotEqual,
                TokenKind::LessThanEqualTo,
                TokenKind::NullCoalescingOperator,
                TokenKind::DotDot,
                TokenKind::Ellipsis,
            ]
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(
            kinds("1 1.5 .5 2e-3 0xDEAD"),
            vec![
                TokenKind::NumericLiteral,
                TokenKind::NumericLiteral,
                TokenKind::NumericLiteral,
                TokenKind::NumericLiteral,
                TokenKind::HexLiteral,
            ]
        );
    }

    #[test]
    fn dotted_identifier_is_one_token() {
        let result = tokenize_line("Text.From", 0, LexMode::Default);
        assert_eq!(result.tokens.len(), 1);
        assert_eq!(result.tokens[0].data, "Text.From");
    }

    #[test]
    fn keywords_and_hash_keywords() {
        assert_eq!(
            kinds("let in each #sections null"),
            vec![
                TokenKind::KeywordLet,
                TokenKind::KeywordIn,
                TokenKind::KeywordEach,
                TokenKind::KeywordHashSections,
                TokenKind::NullLiteral,
            ]
        );
    }

    #[test]
    fn unterminated_text_switches_mode() {
        let result = tokenize_line("\"foo", 0, LexMode::Default);
        assert_eq!(result.mode_end, LexMode::Text);
        assert_eq!(result.tokens[0].kind, TokenKind::TextLiteralStart);
    }

    #[test]
    fn escaped_quote_stays_in_literal() {
        let result = tokenize_line(r#""a""b" 1"#, 0, LexMode::Default);
        assert_eq!(result.tokens[0].kind, TokenKind::TextLiteral);
        assert_eq!(result.tokens[0].data, r#""a""b""#);
        assert_eq!(result.tokens[1].kind, TokenKind::NumericLiteral);
    }

    #[test]
    fn bad_hex_digits_error() {
        let result = tokenize_line("0xZ", 0, LexMode::Default);
        assert!(matches!(
            result.error,
            Some(LexError::Expected {
                kind: ExpectedKind::HexLiteral,
                ..
            })
        ));
    }

    #[test]
    fn comment_end_resumes_default_mode() {
        let result = tokenize_line("tail */ 1", 0, LexMode::Comment);
        assert_eq!(
            result.tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
            vec![TokenKind::MultilineCommentEnd, TokenKind::NumericLiteral]
        );
        assert_eq!(result.mode_end, LexMode::Default);
    }
}
