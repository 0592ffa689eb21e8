use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pq_common::Settings;
use pq_syntax::{lexer, parser};

const SOURCE: &str = r#"let
    Source = Table.FromRecords({[a = 1, b = "x"], [a = 2, b = "y"]}),
    Doubled = Table.TransformColumns(Source, {"a", each _ * 2}),
    Filtered = Table.SelectRows(Doubled, each [a] > 2),
    Summary = [rows = Table.RowCount(Filtered), ok = true]
in
    if Summary[rows] > 0 then Summary else error "empty"
"#;

fn bench_parse(c: &mut Criterion) {
    let settings = Settings::default();

    c.bench_function("lex", |b| {
        b.iter(|| lexer::lex(&settings, black_box(SOURCE)).unwrap());
    });

    c.bench_function("snapshot", |b| {
        let state = lexer::lex(&settings, SOURCE).unwrap();
        b.iter(|| lexer::snapshot(&settings, black_box(&state)).unwrap());
    });

    c.bench_function("parse", |b| {
        let state = lexer::lex(&settings, SOURCE).unwrap();
        let snapshot = lexer::snapshot(&settings, &state).unwrap();
        b.iter(|| parser::parse(&settings, black_box(&snapshot)));
    });
}

criterion_group!(benches, bench_parse);
criterion_main!(benches);
