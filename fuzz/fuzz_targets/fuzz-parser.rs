#![no_main]
use pq_common::Settings;
use pq_syntax::{lexer, parser};

#[macro_use]
extern crate libfuzzer_sys;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let settings = Settings::default();
        if let Ok(state) = lexer::lex(&settings, s) {
            if let Ok(snapshot) = lexer::snapshot(&settings, &state) {
                parser::parse(&settings, &snapshot);
            }
        }
    }
});
