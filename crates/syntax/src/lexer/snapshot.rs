//! Flattens a lexer [`State`] into one absolute-offset token stream.
//!
//! Comment tokens move out of band, multiline begin/content/end runs fold
//! into single tokens, and an unterminated run is the only way this stage
//! fails on an otherwise healthy state.

use pq_common::{CommonError, Settings};
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::token::{Comment, CommentKind, Token, TokenKind, TokenPosition};

use super::error::{LexError, UnterminatedMultilineTokenKind};
use super::State;

/// Where a line terminator sits in the flattened text, and what it was.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineTerminator {
    pub code_unit: u32,
    pub text: String,
}

/// The validated token-and-comment stream the parser consumes.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Snapshot {
    /// The flattened source text, used to recover exact spans (e.g. for
    /// generalized identifiers made of several tokens).
    pub text: String,
    pub tokens: Vec<Token>,
    pub comments: Vec<Comment>,
    pub line_terminators: Vec<LineTerminator>,
}

static_assertions::assert_impl_all!(Snapshot: Send, Sync);

/// A human-readable position: 1-based line and 1-based grapheme column.
///
/// Code-unit offsets drive every internal computation; graphemes only exist
/// for rendering diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayPosition {
    pub line: u32,
    pub column: u32,
}

impl Snapshot {
    #[must_use]
    pub fn display_position(&self, position: TokenPosition) -> DisplayPosition {
        let line_start = (position.code_unit - position.line_code_unit) as usize;
        let prefix = &self.text[line_start..position.code_unit as usize];
        DisplayPosition {
            line: position.line_number + 1,
            column: prefix.graphemes(true).count() as u32 + 1,
        }
    }
}

pub fn snapshot(settings: &Settings, state: &State) -> Result<Snapshot, LexError> {
    for line in &state.lines {
        if let Some(error) = &line.error {
            return Err(LexError::BadState(Box::new(error.clone())));
        }
    }

    Reader::new(state).read(settings)
}

struct Reader<'a> {
    state: &'a State,
    /// Absolute offset of each line's first code unit.
    line_offsets: Vec<u32>,
}

impl<'a> Reader<'a> {
    fn new(state: &'a State) -> Self {
        let mut line_offsets = Vec::with_capacity(state.lines.len());
        let mut offset = 0u32;
        for line in &state.lines {
            line_offsets.push(offset);
            offset += (line.text.len() + line.terminator.len()) as u32;
        }

        Self {
            state,
            line_offsets,
        }
    }

    fn read(&self, settings: &Settings) -> Result<Snapshot, LexError> {
        let mut tokens = Vec::new();
        let mut comments = Vec::new();

        let mut line_index = 0;
        let mut token_index = 0;

        while line_index < self.state.lines.len() {
            settings.check_cancel()?;

            let line = &self.state.lines[line_index];
            let Some(line_token) = line.tokens.get(token_index) else {
                line_index += 1;
                token_index = 0;
                continue;
            };

            match line_token.kind {
                TokenKind::LineComment => comments.push(Comment {
                    kind: CommentKind::Line,
                    data: line_token.data.clone(),
                    position_start: self.position(line_index, line_token.start),
                    position_end: self.position(line_index, line_token.end),
                }),
                TokenKind::MultilineComment => comments.push(Comment {
                    kind: CommentKind::Multiline,
                    data: line_token.data.clone(),
                    position_start: self.position(line_index, line_token.start),
                    position_end: self.position(line_index, line_token.end),
                }),
                TokenKind::MultilineCommentStart => {
                    let folded = self.fold(
                        line_index,
                        token_index,
                        TokenKind::MultilineCommentContent,
                        TokenKind::MultilineCommentEnd,
                        UnterminatedMultilineTokenKind::MultilineComment,
                    )?;
                    comments.push(Comment {
                        kind: CommentKind::Multiline,
                        data: folded.data.clone(),
                        position_start: folded.position_start,
                        position_end: folded.position_end,
                    });
                    line_index = folded.resume_line;
                    token_index = folded.resume_token;
                    continue;
                }
                TokenKind::TextLiteralStart => {
                    let folded = self.fold(
                        line_index,
                        token_index,
                        TokenKind::TextLiteralContent,
                        TokenKind::TextLiteralEnd,
                        UnterminatedMultilineTokenKind::Text,
                    )?;
                    tokens.push(folded.to_token(TokenKind::TextLiteral));
                    line_index = folded.resume_line;
                    token_index = folded.resume_token;
                    continue;
                }
                TokenKind::QuotedIdentifierStart => {
                    let folded = self.fold(
                        line_index,
                        token_index,
                        TokenKind::QuotedIdentifierContent,
                        TokenKind::QuotedIdentifierEnd,
                        UnterminatedMultilineTokenKind::QuotedIdentifier,
                    )?;
                    tokens.push(folded.to_token(TokenKind::Identifier));
                    line_index = folded.resume_line;
                    token_index = folded.resume_token;
                    continue;
                }
                TokenKind::MultilineCommentContent
                | TokenKind::MultilineCommentEnd
                | TokenKind::TextLiteralContent
                | TokenKind::TextLiteralEnd
                | TokenKind::QuotedIdentifierContent
                | TokenKind::QuotedIdentifierEnd => {
                    return Err(LexError::Common(CommonError::invariant(format!(
                        "dangling {:?} without a matching start token",
                        line_token.kind
                    ))));
                }
                kind => tokens.push(Token {
                    kind,
                    data: line_token.data.clone(),
                    position_start: self.position(line_index, line_token.start),
                    position_end: self.position(line_index, line_token.end),
                }),
            }

            token_index += 1;
        }

        Ok(Snapshot {
            text: self.state.text(),
            tokens,
            comments,
            line_terminators: self.line_terminators(),
        })
    }

    /// Fold a `Start (Content)* End` run beginning at the given token into a
    /// single span. The start token always ends its line, every content token
    /// spans a whole line, and the end token begins its line.
    fn fold(
        &self,
        start_line: usize,
        start_token: usize,
        content_kind: TokenKind,
        end_kind: TokenKind,
        unterminated: UnterminatedMultilineTokenKind,
    ) -> Result<Folded, LexError> {
        let lines = &self.state.lines;
        let first = &lines[start_line];
        let start = &first.tokens[start_token];

        let mut data = start.data.clone();
        data.push_str(&first.terminator);

        let mut line_index = start_line + 1;
        while line_index < lines.len() {
            let line = &lines[line_index];
            match line.tokens.first() {
                Some(token) if token.kind == end_kind => {
                    data.push_str(&token.data);
                    return Ok(Folded {
                        data,
                        position_start: self.position(start_line, start.start),
                        position_end: self.position(line_index, token.end),
                        resume_line: line_index,
                        resume_token: 1,
                    });
                }
                Some(token) if token.kind == content_kind => {
                    data.push_str(&token.data);
                    data.push_str(&line.terminator);
                }
                // A line with no tokens inside the run contributes only its
                // terminator.
                None => data.push_str(&line.terminator),
                Some(token) => {
                    return Err(LexError::Common(CommonError::invariant(format!(
                        "expected {content_kind:?} or {end_kind:?}, found {:?}",
                        token.kind
                    ))));
                }
            }
            line_index += 1;
        }

        Err(LexError::UnterminatedMultilineToken {
            kind: unterminated,
            position: self.position(start_line, start.start),
        })
    }

    fn position(&self, line_index: usize, line_code_unit: u32) -> TokenPosition {
        TokenPosition {
            code_unit: self.line_offsets[line_index] + line_code_unit,
            line_code_unit,
            line_number: line_index as u32,
        }
    }

    fn line_terminators(&self) -> Vec<LineTerminator> {
        self.state
            .lines
            .iter()
            .enumerate()
            .filter(|(_, line)| !line.terminator.is_empty())
            .map(|(index, line)| LineTerminator {
                code_unit: self.line_offsets[index] + line.text.len() as u32,
                text: line.terminator.clone(),
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
struct Folded {
    data: String,
    position_start: TokenPosition,
    position_end: TokenPosition,
    resume_line: usize,
    resume_token: usize,
}

impl Folded {
    fn to_token(&self, kind: TokenKind) -> Token {
        Token {
            kind,
            data: self.data.clone(),
            position_start: self.position_start,
            position_end: self.position_end,
        }
    }
}
