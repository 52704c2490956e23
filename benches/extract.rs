use criterion::{criterion_group, criterion_main, Criterion};
use std::path::Path;

use mailshelf::model::format::FormatSet;

fn fixture(name: &str) -> Vec<u8> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read(path).unwrap()
}

fn bench_find_candidate(c: &mut Criterion) {
    let raw = fixture("art_of_war.eml");
    let formats = FormatSet::new(["mobi", "epub"]).unwrap();

    c.bench_function("find_candidate_art_of_war", |b| {
        b.iter(|| mailshelf::parser::attachment::find_candidate(&raw, &formats).unwrap())
    });
}

fn bench_find_candidate_nested(c: &mut Criterion) {
    let raw = fixture("forwarded.eml");
    let formats = FormatSet::new(["mobi", "epub"]).unwrap();

    c.bench_function("find_candidate_forwarded", |b| {
        b.iter(|| mailshelf::parser::attachment::find_candidate(&raw, &formats).unwrap())
    });
}

criterion_group!(benches, bench_find_candidate, bench_find_candidate_nested);
criterion_main!(benches);
