//! Small shared helpers.

use crate::token::Position;

/// Replace the `$$` marker in `src` and return the cursor position it marked.
///
/// Used for tests internally.
#[must_use]
#[allow(clippy::missing_panics_doc)]
pub fn src_cursor_position(src: &str) -> (Position, String) {
    let offset = src.find("$$").expect("source has no $$ cursor marker");
    let before = &src[..offset];

    let mut line_number = 0u32;
    let mut line_start = 0usize;
    let mut iter = before.char_indices().peekable();
    while let Some((index, ch)) = iter.next() {
        match ch {
            '\r' if matches!(iter.peek(), Some((_, '\n'))) => {
                iter.next();
                line_number += 1;
                line_start = index + 2;
            }
            '\n' | '\u{2028}' | '\u{2029}' => {
                line_number += 1;
                line_start = index + ch.len_utf8();
            }
            _ => {}
        }
    }

    (
        Position {
            line_number,
            line_code_unit: (offset - line_start) as u32,
        },
        src.replacen("$$", "", 1),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_on_first_line() {
        let (position, src) = src_cursor_position("let a = $$1 in a");
        assert_eq!(position, Position::new(0, 8));
        assert_eq!(src, "let a = 1 in a");
    }

    #[test]
    fn marker_after_line_break() {
        let (position, src) = src_cursor_position("a\r\nbb$$");
        assert_eq!(position, Position::new(1, 2));
        assert_eq!(src, "a\r\nbb");
    }
}
