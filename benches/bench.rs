//! Criterion benchmarks for Phalanx.
//!
//! Covers the grouping passes, collector replay and flat top-K search,
//! sequential and parallel, over a generated catalog.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use phalanx::cli::{CorpusArgs, build_corpus};
use phalanx::grouping::{FieldCommand, GroupParams, Grouping, GroupingConfig};
use phalanx::index::IndexReader;
use phalanx::query::{FieldValueSource, FunctionQuery};
use phalanx::search::{IndexSearcher, SearcherConfig, Sort, SortField, SortFieldType};

const DOCS: usize = 50_000;

fn corpus(docs: usize, categories: usize) -> IndexReader {
    let args = CorpusArgs {
        docs,
        segments: 8,
        categories,
        seed: 42,
        category: None,
    };
    build_corpus(&args).expect("corpus")
}

fn query() -> FunctionQuery {
    FunctionQuery::new(Arc::new(FieldValueSource::new("popularity")))
}

/// Benchmark grouping with and without the second-pass cache.
fn bench_grouping(c: &mut Criterion) {
    let mut group = c.benchmark_group("grouping");
    group.sample_size(20);
    group.throughput(Throughput::Elements(DOCS as u64));

    let searcher = IndexSearcher::new(corpus(DOCS, 100));
    let query = query();
    let params = GroupParams::new("category")
        .with_limit(10)
        .with_docs_per_group(3)
        .with_within_group_sort(Sort::new(vec![
            SortField::new("price", SortFieldType::Double).with_reverse(true),
        ]));

    for (name, cache) in [("two_scans", 0), ("cached_replay", 100)] {
        group.bench_function(name, |b| {
            b.iter(|| {
                let config = GroupingConfig::default().with_cache_percentage(cache);
                let mut grouping = Grouping::new(&searcher, &query, config);
                grouping.add_command(FieldCommand::field(params.clone(), "category"));
                black_box(grouping.execute().expect("grouping"))
            })
        });
    }

    group.bench_function("group_count", |b| {
        b.iter(|| {
            let mut grouping = Grouping::new(&searcher, &query, GroupingConfig::default());
            grouping.add_command(FieldCommand::field(
                params.clone().with_group_count(true),
                "category",
            ));
            black_box(grouping.execute().expect("grouping"))
        })
    });

    group.finish();
}

/// Benchmark flat top-K collection.
fn bench_top_k(c: &mut Criterion) {
    let mut group = c.benchmark_group("top_k");
    group.throughput(Throughput::Elements(DOCS as u64));

    let query = query();
    let sort = Sort::new(vec![SortField::new("price", SortFieldType::Double)]);
    let sequential = IndexSearcher::new(corpus(DOCS, 10));
    let parallel = IndexSearcher::with_executor(
        corpus(DOCS, 10),
        SearcherConfig {
            max_docs_per_slice: 10_000,
            ..SearcherConfig::default()
        },
    )
    .expect("searcher");

    group.bench_function("sequential_by_score", |b| {
        b.iter(|| black_box(sequential.search_top_docs(&query, None, 100).expect("search")))
    });
    group.bench_function("parallel_by_score", |b| {
        b.iter(|| black_box(parallel.search_top_docs(&query, None, 100).expect("search")))
    });
    group.bench_function("sequential_by_price", |b| {
        b.iter(|| {
            black_box(
                sequential
                    .search_top_field_docs(&query, None, 100, &sort)
                    .expect("search"),
            )
        })
    });
    group.bench_function("parallel_by_price", |b| {
        b.iter(|| {
            black_box(
                parallel
                    .search_top_field_docs(&query, None, 100, &sort)
                    .expect("search"),
            )
        })
    });

    group.finish();
}

criterion_group!(benches, bench_grouping, bench_top_k);
criterion_main!(benches);
