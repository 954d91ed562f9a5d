use blockdoc_parser::parse;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn parse_simple_expression(c: &mut Criterion) {
    let source = "temperature + pressure * 2";

    c.bench_function("parse_simple_expression", |b| {
        b.iter(|| parse(black_box(source)))
    });
}

fn parse_nested_expression(c: &mut Criterion) {
    let source = "(temperature + [pressure / 2]) * Sum(speed, 10, -3) - [a * [b + 1]] / 4";

    c.bench_function("parse_nested_expression", |b| {
        b.iter(|| parse(black_box(source)))
    });
}

criterion_group!(benches, parse_simple_expression, parse_nested_expression);
criterion_main!(benches);
