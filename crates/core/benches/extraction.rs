use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use gleaner_core::{
    Document, ExtractConfig, ExtractOptions, Operation, Readability, SelectorItem, apply_selector_config,
    extract_content, preprocess_html, refine_content,
};

const PAGE_URL: &str = "https://harbordaily.example/local/riverside-park";

fn fixture() -> String {
    std::fs::read_to_string("../../tests/fixtures/news_article.html").unwrap()
}

fn bench_parse(c: &mut Criterion) {
    let small = fixture();
    let large = small.repeat(20);

    let mut group = c.benchmark_group("parse");

    group.bench_with_input(BenchmarkId::new("small", "8KB"), &small, |b, html| {
        b.iter(|| Document::parse(black_box(html)))
    });

    group.bench_with_input(BenchmarkId::new("large", "160KB"), &large, |b, html| {
        b.iter(|| Document::parse(black_box(html)))
    });

    group.finish();
}

fn bench_full_extraction(c: &mut Criterion) {
    let html = fixture();
    let reader = Readability::new();
    let options = ExtractOptions::with_url(PAGE_URL);

    c.bench_function("full_extraction", |b| b.iter(|| reader.extract(black_box(&html), &options)));
    c.bench_function("extraction_with_refine", |b| {
        b.iter(|| reader.extract_refined(black_box(&html), &options))
    });
}

fn bench_preprocess(c: &mut Criterion) {
    let html = fixture();
    let config = Default::default();

    c.bench_function("preprocess", |b| b.iter(|| preprocess_html(black_box(&html), &config)));
}

fn bench_scoring(c: &mut Criterion) {
    let html = fixture();
    let preprocessed = preprocess_html(&html, &Default::default());
    let doc = Document::parse(&preprocessed);
    let config = ExtractConfig::default();

    c.bench_function("scoring_and_selection", |b| {
        b.iter(|| extract_content(black_box(&doc), black_box(&config)))
    });
}

fn bench_refine(c: &mut Criterion) {
    let reader = Readability::new();
    let options = ExtractOptions::with_url(PAGE_URL);
    let base = options.base_url();
    let prepared = reader.prepare(&fixture(), base.as_ref());
    let article = reader.extract_prepared(&prepared, &options).unwrap();
    let original = Document::parse(&prepared);

    c.bench_function("refine", |b| {
        b.iter(|| refine_content(black_box(&article.content), &original, &article.title, base.as_ref()))
    });
}

fn bench_selectors(c: &mut Criterion) {
    let html = fixture();
    let rules = vec![
        SelectorItem::new("article", Operation::Include, 0),
        SelectorItem::new(".author-bio, figure", Operation::Exclude, 1),
    ];

    c.bench_function("selectors", |b| b.iter(|| apply_selector_config(black_box(&html), &rules)));
}

criterion_group!(
    benches,
    bench_parse,
    bench_full_extraction,
    bench_preprocess,
    bench_scoring,
    bench_refine,
    bench_selectors
);
criterion_main!(benches);
