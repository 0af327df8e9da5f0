//! Benchmarks for record normalization and page translation.
//!
//! Run with: `cargo bench --bench normalize_bench`

use chrono::{Duration, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::{json, Value};
use tubemux::normalize::{format_age, format_views, normalize_item};
use tubemux::ProviderFamily;
use url::Url;

/// A primary-family item with every field populated.
fn primary_item(n: usize) -> Value {
    json!({
        "type": "video",
        "videoId": format!("vid{n:08}"),
        "title": format!("Benchmark video number {n}"),
        "author": "Benchmark Channel",
        "viewCount": 1_234_567 + n,
        "published": (Utc::now() - Duration::hours(n as i64 % 5_000)).timestamp(),
        "publishedText": "3 days ago"
    })
}

/// A secondary-family item that needs its id pulled out of the URL.
fn secondary_item(n: usize) -> Value {
    json!({
        "type": "stream",
        "url": format!("/watch?v=vid{n:08}"),
        "title": format!("Benchmark stream number {n}"),
        "uploaderName": "Benchmark Uploader",
        "views": format!("{}", 9_876 + n),
        "uploaded": (Utc::now() - Duration::minutes(n as i64)).timestamp_millis()
    })
}

fn bench_normalize_item(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize_item");
    let now = Utc::now();

    let primary = primary_item(42);
    group.bench_function("primary", |b| {
        b.iter(|| black_box(normalize_item(black_box(&primary), now)));
    });

    let secondary = secondary_item(42);
    group.bench_function("secondary", |b| {
        b.iter(|| black_box(normalize_item(black_box(&secondary), now)));
    });

    // Fallback path: no ids, no counts, no dates
    let sparse = json!({ "id": { "videoId": "sparse01" } });
    group.bench_function("sparse", |b| {
        b.iter(|| black_box(normalize_item(black_box(&sparse), now)));
    });

    group.finish();
}

fn bench_translate_page(c: &mut Criterion) {
    let mut group = c.benchmark_group("translate_page");
    let url = Url::parse("https://mirror.example/api/v1/trending").unwrap();
    let now = Utc::now();

    for &size in &[20usize, 100, 500] {
        group.throughput(Throughput::Elements(size as u64));

        let primary = Value::Array((0..size).map(primary_item).collect());
        group.bench_with_input(BenchmarkId::new("primary", size), &primary, |b, body| {
            let schema = ProviderFamily::Primary.schema();
            b.iter(|| black_box(schema.translate_page(&url, black_box(body), now).unwrap()));
        });

        let secondary = json!({
            "items": (0..size).map(secondary_item).collect::<Vec<_>>(),
            "nextpage": "token"
        });
        group.bench_with_input(BenchmarkId::new("secondary", size), &secondary, |b, body| {
            let schema = ProviderFamily::Secondary.schema();
            b.iter(|| black_box(schema.translate_page(&url, black_box(body), now).unwrap()));
        });
    }

    group.finish();
}

fn bench_formatting(c: &mut Criterion) {
    let mut group = c.benchmark_group("formatting");
    let now = Utc::now();

    group.bench_function("format_views", |b| {
        b.iter(|| {
            for count in [None, Some(999), Some(12_345), Some(7_654_321)] {
                black_box(format_views(black_box(count)));
            }
        });
    });

    let published = now - Duration::days(45);
    group.bench_function("format_age", |b| {
        b.iter(|| black_box(format_age(black_box(published), now)));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_normalize_item,
    bench_translate_page,
    bench_formatting
);
criterion_main!(benches);
