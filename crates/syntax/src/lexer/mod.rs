//! The incremental, line-aware lexer.
//!
//! Source text is split on line terminators; every line records the lex mode
//! it started and ended in. An edit retokenizes the edited lines and then
//! walks the suffix only while the recomputed end mode disagrees with the
//! next line's recorded start mode, so a one-line edit usually costs one line
//! of work.

use std::collections::BTreeMap;

use pq_common::Settings;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::token::{LineToken, Range};

pub mod error;
mod read;
pub mod snapshot;

pub use error::LexError;
pub use snapshot::{snapshot, DisplayPosition, LineTerminator, Snapshot};

use read::{tokenize_line, LineTokenize};

/// The tokenizer's cross-line continuation state. A line's end mode seeds the
/// next line's start mode; this is the only coupling between lines.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LexMode {
    #[default]
    Default,
    Comment,
    QuotedIdentifier,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineKind {
    /// No tokenize attempt succeeded on this line.
    Error,
    Touched,
    TouchedWithError,
    Untouched,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub kind: LineKind,
    pub text: String,
    /// The terminator that produced this line when the text was split; empty
    /// for the final line.
    pub terminator: String,
    pub mode_start: LexMode,
    pub mode_end: LexMode,
    pub tokens: Vec<LineToken>,
    pub error: Option<LexError>,
}

impl Line {
    fn untouched(text: impl Into<String>, terminator: impl Into<String>) -> Self {
        Self {
            kind: LineKind::Untouched,
            text: text.into(),
            terminator: terminator.into(),
            mode_start: LexMode::Default,
            mode_end: LexMode::Default,
            tokens: Vec::new(),
            error: None,
        }
    }
}

/// An immutable lexer state: the ordered lines of one source text. Edits
/// produce a fresh state and leave the original untouched.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct State {
    pub lines: Vec<Line>,
}

static_assertions::assert_impl_all!(State: Send, Sync);

/// Tokenize a whole blob of text.
///
/// Individual bad lines do not stop their successors; if any line failed, the
/// collected per-line errors are returned as [`LexError::ErrorLineMap`].
pub fn lex(settings: &Settings, text: &str) -> Result<State, LexError> {
    let mut lines: Vec<Line> = split_lines(text)
        .into_iter()
        .map(|(text, terminator)| Line::untouched(text, terminator))
        .collect();

    retokenize_from(settings, &mut lines, 0)?;

    let state = State { lines };
    state.into_result()
}

impl State {
    /// The source text this state tokenizes, reconstructed from its lines.
    #[must_use]
    pub fn text(&self) -> String {
        let mut text = String::new();
        for line in &self.lines {
            text.push_str(&line.text);
            text.push_str(&line.terminator);
        }
        text
    }

    /// Append a line carrying the given terminator and tokenize it.
    pub fn append_line(
        &self,
        settings: &Settings,
        text: &str,
        terminator: &str,
    ) -> Result<State, LexError> {
        let mut lines = self.lines.clone();
        let appended = lines.len();
        lines.push(Line::untouched(text, terminator));
        retokenize_from(settings, &mut lines, appended)?;
        State { lines }.into_result()
    }

    /// Replace the text of line `line_number`, keeping its terminator, and
    /// retokenize the minimum affected suffix.
    pub fn update_line(
        &self,
        settings: &Settings,
        line_number: u32,
        text: &str,
    ) -> Result<State, LexError> {
        let index = self.check_line_number(line_number)?;

        let mut lines = self.lines.clone();
        let terminator = lines[index].terminator.clone();
        lines[index] = Line::untouched(text, terminator);
        retokenize_from(settings, &mut lines, index)?;
        State { lines }.into_result()
    }

    /// Splice `text` over `range`, which may span lines and may itself
    /// contain line terminators.
    pub fn update_range(
        &self,
        settings: &Settings,
        range: Range,
        text: &str,
    ) -> Result<State, LexError> {
        self.check_range(range)?;

        let first = range.start.line_number as usize;
        let last = range.end.line_number as usize;

        let prefix = &self.lines[first].text[..range.start.line_code_unit as usize];
        let suffix = &self.lines[last].text[range.end.line_code_unit as usize..];
        let last_terminator = self.lines[last].terminator.clone();

        let combined = format!("{prefix}{text}{suffix}");
        let mut replacement: Vec<Line> = split_lines(&combined)
            .into_iter()
            .map(|(text, terminator)| Line::untouched(text, terminator))
            .collect();
        if let Some(line) = replacement.last_mut() {
            line.terminator = last_terminator;
        }

        trace!(
            replaced = last - first + 1,
            inserted = replacement.len(),
            "applying range edit"
        );

        let mut lines = self.lines.clone();
        lines.splice(first..=last, replacement);
        retokenize_from(settings, &mut lines, first)?;
        State { lines }.into_result()
    }

    /// Remove line `line_number` and retokenize the suffix if its start mode
    /// no longer lines up.
    pub fn delete_line(
        &self,
        settings: &Settings,
        line_number: u32,
    ) -> Result<State, LexError> {
        let index = self.check_line_number(line_number)?;

        let mut lines = self.lines.clone();
        lines.remove(index);
        retokenize_from(settings, &mut lines, index)?;
        State { lines }.into_result()
    }

    fn check_line_number(&self, line_number: u32) -> Result<usize, LexError> {
        let index = line_number as usize;
        if index >= self.lines.len() {
            return Err(LexError::BadLineNumber {
                line_number,
                num_lines: self.lines.len() as u32,
            });
        }
        Ok(index)
    }

    fn check_range(&self, range: Range) -> Result<(), LexError> {
        use error::BadRangeKind::*;

        let bad = |kind| LexError::BadRange { kind, range };
        let num_lines = self.lines.len() as u32;
        let (start, end) = (range.start, range.end);

        if start.line_number > end.line_number {
            return Err(bad(LineNumberStartGreaterThanLineNumberEnd));
        }
        if start.line_number == end.line_number && start.line_code_unit > end.line_code_unit {
            return Err(bad(SameLineCodeUnitStartGreaterThanCodeUnitEnd));
        }
        if start.line_number >= num_lines {
            return Err(bad(LineNumberStartOutOfRange));
        }
        if end.line_number >= num_lines {
            return Err(bad(LineNumberEndOutOfRange));
        }

        let start_line = &self.lines[start.line_number as usize];
        let end_line = &self.lines[end.line_number as usize];
        if !start_line.text.is_char_boundary(start.line_code_unit as usize)
            || start.line_code_unit as usize > start_line.text.len()
        {
            return Err(bad(LineCodeUnitStartOutOfRange));
        }
        if !end_line.text.is_char_boundary(end.line_code_unit as usize)
            || end.line_code_unit as usize > end_line.text.len()
        {
            return Err(bad(LineCodeUnitEndOutOfRange));
        }

        Ok(())
    }

    fn into_result(self) -> Result<State, LexError> {
        let error_lines: BTreeMap<u32, LexError> = self
            .lines
            .iter()
            .enumerate()
            .filter_map(|(number, line)| {
                line.error.clone().map(|error| (number as u32, error))
            })
            .collect();

        if error_lines.is_empty() {
            Ok(self)
        } else {
            Err(LexError::ErrorLineMap { error_lines })
        }
    }
}

/// Split text on `\r\n`, `\n`, `\u{2028}` and `\u{2029}`, keeping each line's
/// terminator. A trailing terminator yields a final empty line.
fn split_lines(text: &str) -> Vec<(String, String)> {
    let mut lines = Vec::new();
    let mut line_start = 0;
    let mut iter = text.char_indices().peekable();

    while let Some((offset, ch)) = iter.next() {
        let terminator_len = match ch {
            '\r' if matches!(iter.peek(), Some((_, '\n'))) => {
                iter.next();
                2
            }
            '\n' | '\u{2028}' | '\u{2029}' => ch.len_utf8(),
            _ => continue,
        };

        lines.push((
            text[line_start..offset].to_string(),
            text[offset..offset + terminator_len].to_string(),
        ));
        line_start = offset + terminator_len;
    }

    lines.push((text[line_start..].to_string(), String::new()));
    lines
}

/// Tokenize `lines[first..]`, stopping as soon as a line's recorded start
/// mode already equals the previous line's (re)computed end mode. Untouched
/// lines are always tokenized.
fn retokenize_from(
    settings: &Settings,
    lines: &mut [Line],
    first: usize,
) -> Result<(), LexError> {
    let mut mode = if first == 0 {
        LexMode::Default
    } else {
        lines[first - 1].mode_end
    };

    for index in first..lines.len() {
        settings.check_cancel()?;

        if lines[index].kind != LineKind::Untouched && lines[index].mode_start == mode {
            break;
        }

        let line = std::mem::take(&mut lines[index]);
        lines[index] = match line.kind {
            LineKind::Untouched => checked_tokenize(line, index as u32, mode)?,
            // The text is unchanged but its seed mode is not; reset the line
            // so the guarded tokenize accepts it.
            _ => checked_tokenize(
                Line {
                    kind: LineKind::Untouched,
                    tokens: Vec::new(),
                    error: None,
                    ..line
                },
                index as u32,
                mode,
            )?,
        };
        mode = lines[index].mode_end;
    }

    Ok(())
}

/// Tokenize a line that is expected to be [`LineKind::Untouched`].
///
/// Calling this on an already-tokenized line surfaces the caller's mistake:
/// an unchanged `Touched` line yields [`LexError::EndOfStream`], a line that
/// previously failed repropagates its error wrapped in
/// [`LexError::BadState`].
fn checked_tokenize(line: Line, line_number: u32, mode_start: LexMode) -> Result<Line, LexError> {
    match line.kind {
        LineKind::Touched => Err(LexError::EndOfStream),
        LineKind::TouchedWithError | LineKind::Error => Err(LexError::BadState(Box::new(
            line.error.unwrap_or(LexError::EndOfStream),
        ))),
        LineKind::Untouched => Ok(tokenized(line, line_number, mode_start)),
    }
}

fn tokenized(line: Line, line_number: u32, mode_start: LexMode) -> Line {
    let LineTokenize {
        tokens,
        mode_end,
        error,
    } = tokenize_line(&line.text, line_number, mode_start);

    let kind = match (&error, tokens.is_empty()) {
        (None, _) => LineKind::Touched,
        (Some(_), false) => LineKind::TouchedWithError,
        (Some(_), true) => LineKind::Error,
    };

    Line {
        kind,
        text: line.text,
        terminator: line.terminator,
        mode_start,
        mode_end,
        tokens,
        error,
    }
}

impl Default for Line {
    fn default() -> Self {
        Line::untouched("", "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retokenize_touched_line_is_end_of_stream() {
        let settings = Settings::default();
        let state = lex(&settings, "foo").unwrap();
        let error =
            checked_tokenize(state.lines[0].clone(), 0, LexMode::Default).unwrap_err();
        assert_eq!(error, LexError::EndOfStream);
    }

    #[test]
    fn retokenize_bad_line_wraps_bad_state() {
        let settings = Settings::default();
        let error = lex(&settings, "0x").unwrap_err();
        let LexError::ErrorLineMap { error_lines } = error else {
            panic!("expected an error line map");
        };
        let line_error = error_lines.get(&0).unwrap().clone();

        let line = tokenized(Line::untouched("0x", ""), 0, LexMode::Default);
        let error = checked_tokenize(line, 0, LexMode::Default).unwrap_err();
        assert_eq!(error, LexError::BadState(Box::new(line_error)));
    }

    #[test]
    fn split_keeps_terminators() {
        assert_eq!(
            split_lines("a\r\nb\nc"),
            vec![
                ("a".to_string(), "\r\n".to_string()),
                ("b".to_string(), "\n".to_string()),
                ("c".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn trailing_terminator_yields_empty_line() {
        assert_eq!(
            split_lines("a\n"),
            vec![
                ("a".to_string(), "\n".to_string()),
                (String::new(), String::new()),
            ]
        );
    }
}
