use capdex::core::catalog::{Catalog, SearchParams};
use capdex::core::config::Config;
use capdex::core::types::{Entry, Requester};
use capdex::filter::parser;
use chrono::{Duration, TimeZone, Utc};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rand::Rng;
use std::collections::BTreeMap;

const TAGS: [&str; 8] = ["nlp", "ocr", "vision", "audio", "code", "search", "etl", "chat"];
const CAPABILITIES: [&str; 4] = ["summarize", "extract", "classify", "translate"];

fn synthetic_entry(i: u32) -> Entry {
    let mut rng = rand::thread_rng();
    let mut attrs = BTreeMap::new();
    attrs.insert(
        "tag".to_string(),
        vec![TAGS[rng.gen_range(0..TAGS.len())].to_string()],
    );
    attrs.insert(
        "capability".to_string(),
        vec![CAPABILITIES[(i as usize) % CAPABILITIES.len()].to_string()],
    );
    if i % 7 == 0 {
        attrs.insert(
            "endpoint".to_string(),
            vec![format!("https://tools.example/{}", i)],
        );
    }
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    Entry {
        id: format!("skill:acme:tool-{:05}", i),
        rev: 1,
        entry_type: "skill".to_string(),
        namespace: "acme".to_string(),
        name: format!("Tool {}", i),
        description: format!("Synthetic tool number {} for throughput tests", i),
        version: Some("1.0.0".to_string()),
        attrs,
        manifest: serde_json::Value::Null,
        meta: serde_json::Value::Null,
        created_at: base,
        updated_at: base + Duration::seconds(i as i64),
    }
}

fn seeded_catalog(docs: u32) -> Catalog {
    let catalog = Catalog::new(Config::default());
    catalog.load_snapshot((0..docs).map(synthetic_entry).collect());
    catalog
}

fn bench_filter_parse(c: &mut Criterion) {
    let input = "(&(type=skill)(|(tag=nlp)(tag=ocr))(!(capability=translate)))";
    c.bench_function("filter_parse", |b| {
        b.iter(|| parser::parse(black_box(input)).unwrap());
    });
}

fn bench_search(c: &mut Criterion) {
    let catalog = seeded_catalog(10_000);
    let anon = Requester::anonymous();
    let mut group = c.benchmark_group("search");

    for (name, filter) in [
        ("selective", "(&(tag=nlp)(capability=summarize))"),
        ("broad", "(type=skill)"),
        ("negated", "(!(endpoint=*))"),
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(name), &filter, |b, filter| {
            let params = SearchParams {
                filter: Some(filter.to_string()),
                limit: 20,
                cursor: None,
                q: None,
            };
            b.iter(|| catalog.search(black_box(&params), &anon).unwrap());
        });
    }
    group.finish();
}

fn bench_text_query(c: &mut Criterion) {
    let catalog = seeded_catalog(10_000);
    let anon = Requester::anonymous();
    c.bench_function("search_with_text_query", |b| {
        let params = SearchParams {
            filter: None,
            limit: 20,
            cursor: None,
            q: Some("number 42".to_string()),
        };
        b.iter(|| catalog.search(black_box(&params), &anon).unwrap());
    });
}

criterion_group!(benches, bench_filter_parse, bench_search, bench_text_query);
criterion_main!(benches);
