use pq_common::{CancellationToken, CommonError, Settings};
use pq_syntax::lexer::{self, LexError, LexMode};
use pq_syntax::token::{CommentKind, Position, Range, TokenKind};
use test_case::test_case;

fn settings() -> Settings {
    Settings::default()
}

fn lex(text: &str) -> lexer::State {
    lexer::lex(&settings(), text).unwrap()
}

fn snapshot(state: &lexer::State) -> lexer::Snapshot {
    lexer::snapshot(&settings(), state).unwrap()
}

#[test_case("let a = 1 in a")]
#[test_case("[a = 1, b = \"two\"]")]
#[test_case("1 /* comment */ + 2 // trailing")]
#[test_case("each _ * 2")]
#[test_case("#\"quoted name\" + 1")]
#[test_case("line1\r\nline2\nline3\u{2028}line4")]
fn text_reconstruction(text: &str) {
    let state = lex(text);
    assert_eq!(state.text(), text);

    let snapshot = snapshot(&state);
    assert_eq!(snapshot.text, text);
    for token in &snapshot.tokens {
        let start = token.position_start.code_unit as usize;
        let end = token.position_end.code_unit as usize;
        assert_eq!(&text[start..end], token.data, "token slice mismatch");
    }
    for comment in &snapshot.comments {
        let start = comment.position_start.code_unit as usize;
        let end = comment.position_end.code_unit as usize;
        assert_eq!(&text[start..end], comment.data, "comment slice mismatch");
    }
}

#[test]
fn line_terminators_are_indexed() {
    let state = lex("a\r\nb\nc");
    let snapshot = snapshot(&state);
    let terminators: Vec<(u32, &str)> = snapshot
        .line_terminators
        .iter()
        .map(|terminator| (terminator.code_unit, terminator.text.as_str()))
        .collect();
    assert_eq!(terminators, vec![(1, "\r\n"), (4, "\n")]);
}

#[test]
fn comments_fold_out_of_the_token_stream() {
    let state = lex("1 /* a\nb */ 2 // end");
    let snapshot = snapshot(&state);

    let kinds: Vec<TokenKind> = snapshot.tokens.iter().map(|token| token.kind).collect();
    assert_eq!(
        kinds,
        vec![TokenKind::NumericLiteral, TokenKind::NumericLiteral]
    );

    assert_eq!(snapshot.comments.len(), 2);
    assert_eq!(snapshot.comments[0].kind, CommentKind::Multiline);
    assert_eq!(snapshot.comments[0].data, "/* a\nb */");
    assert_eq!(snapshot.comments[1].kind, CommentKind::Line);
    assert_eq!(snapshot.comments[1].data, "// end");
}

#[test]
fn multiline_text_folds_into_one_token() {
    let state = lex("\"a\nb\" & \"c\"");
    let snapshot = snapshot(&state);

    let kinds: Vec<TokenKind> = snapshot.tokens.iter().map(|token| token.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::TextLiteral,
            TokenKind::Ampersand,
            TokenKind::TextLiteral
        ]
    );
    assert_eq!(snapshot.tokens[0].data, "\"a\nb\"");
}

#[test]
fn multiline_quoted_identifier_folds_into_identifier() {
    let state = lex("#\"a\nb\" + 1");
    let snapshot = snapshot(&state);
    assert_eq!(snapshot.tokens[0].kind, TokenKind::Identifier);
    assert_eq!(snapshot.tokens[0].data, "#\"a\nb\"");
}

#[test]
fn incremental_relex_stops_where_modes_match() {
    // Scenario: edit a line into an unterminated text literal, then back.
    let state = lex("foo\nbar");

    let edited = state.update_line(&settings(), 0, "\"foo").unwrap();
    assert_eq!(edited.lines[0].mode_end, LexMode::Text);
    assert_eq!(edited.lines[1].mode_start, LexMode::Text);
    assert_eq!(
        edited.lines[1].tokens[0].kind,
        TokenKind::TextLiteralContent
    );
    let error = lexer::snapshot(&settings(), &edited).unwrap_err();
    assert!(matches!(
        error,
        LexError::UnterminatedMultilineToken {
            kind: lexer::error::UnterminatedMultilineTokenKind::Text,
            ..
        }
    ));

    let restored = edited.update_line(&settings(), 0, "foo").unwrap();
    assert_eq!(restored.lines, state.lines);
}

#[test_case("let a = 1 in a", 0, "let b = 2 in b")]
#[test_case("a\nb\nc", 1, "bb")]
#[test_case("\"x\ny\"", 0, "\"x")]
fn update_line_matches_full_relex(text: &str, line: u32, replacement: &str) {
    let state = lex(text);
    let incremental = state.update_line(&settings(), line, replacement).unwrap();

    let mut lines: Vec<String> = text.split('\n').map(str::to_string).collect();
    lines[line as usize] = replacement.to_string();
    let full = lex(&lines.join("\n"));

    assert_eq!(incremental.lines, full.lines);
}

#[test]
fn update_range_splices_across_lines() {
    let state = lex("a\nb\nc");
    let range = Range {
        start: Position::new(0, 1),
        end: Position::new(2, 0),
    };
    let updated = state.update_range(&settings(), range, "X\nY").unwrap();

    assert_eq!(updated.text(), "aX\nYc");
    assert_eq!(updated.lines, lex("aX\nYc").lines);
}

#[test]
fn update_range_single_line_replacement() {
    let state = lex("let a = 1 in a");
    let range = Range {
        start: Position::new(0, 8),
        end: Position::new(0, 9),
    };
    let updated = state.update_range(&settings(), range, "234").unwrap();
    assert_eq!(updated.lines, lex("let a = 234 in a").lines);
}

#[test]
fn append_line_tokenizes_the_tail() {
    let state = lex("a");
    let appended = state.append_line(&settings(), "b + 1", "").unwrap();
    assert_eq!(appended.lines.len(), 2);
    assert_eq!(appended.lines[1].tokens.len(), 3);
}

#[test]
fn delete_line_retokenizes_dependent_suffix() {
    // Deleting the line that closes the comment leaks comment mode into the
    // rest of the document.
    let state = lex("/*\n*/ 1\n2");
    let deleted = state.delete_line(&settings(), 1).unwrap();

    assert_eq!(deleted.lines[1].mode_start, LexMode::Comment);
    assert_eq!(
        deleted.lines[1].tokens[0].kind,
        TokenKind::MultilineCommentContent
    );
    assert!(lexer::snapshot(&settings(), &deleted).is_err());
}

#[test]
fn delete_line_with_matching_modes_reuses_suffix() {
    let state = lex("a\nb\nc");
    let deleted = state.delete_line(&settings(), 1).unwrap();
    assert_eq!(deleted.lines, lex("a\nc").lines);
}

#[test]
fn bad_line_number_is_reported() {
    let state = lex("a");
    let error = state.update_line(&settings(), 5, "b").unwrap_err();
    assert!(matches!(
        error,
        LexError::BadLineNumber {
            line_number: 5,
            num_lines: 1
        }
    ));
}

#[test]
fn inverted_range_is_reported() {
    let state = lex("ab");
    let range = Range {
        start: Position::new(0, 2),
        end: Position::new(0, 1),
    };
    let error = state.update_range(&settings(), range, "x").unwrap_err();
    assert!(matches!(error, LexError::BadRange { .. }));
}

#[test]
fn range_past_line_end_is_reported() {
    let state = lex("ab");
    let range = Range {
        start: Position::new(0, 0),
        end: Position::new(0, 10),
    };
    let error = state.update_range(&settings(), range, "x").unwrap_err();
    assert!(matches!(error, LexError::BadRange { .. }));
}

#[test]
fn display_positions_count_graphemes_not_code_units() {
    // `é` is two code units but one grapheme, so `=` sits at display
    // column 4 even though its byte offset is 4 (0-based 5th byte).
    let state = lex("a\u{e9} = 1");
    let snapshot = snapshot(&state);

    let equal = snapshot
        .tokens
        .iter()
        .find(|token| token.kind == TokenKind::Equal)
        .unwrap();
    assert_eq!(equal.position_start.line_code_unit, 4);
    let display = snapshot.display_position(equal.position_start);
    assert_eq!((display.line, display.column), (1, 4));
}

#[test]
fn bad_lines_collect_into_an_error_map() {
    let error = lexer::lex(&settings(), "1\n0x\n2").unwrap_err();
    let LexError::ErrorLineMap { error_lines } = error else {
        panic!("expected an error line map");
    };
    assert_eq!(error_lines.len(), 1);
    assert!(error_lines.contains_key(&1));
}

#[test]
fn cancellation_surfaces_as_common_error() {
    let token = CancellationToken::new();
    token.cancel();
    let settings = Settings::default().with_cancellation(token);
    let error = lexer::lex(&settings, "1 + 2").unwrap_err();
    assert_eq!(error, LexError::Common(CommonError::Cancelled));
}
