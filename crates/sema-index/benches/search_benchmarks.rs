//! Benchmarks for exact kNN search on both index backends.
//!
//! Uses 10,000 documents by default. Set `BENCH_FULL_SCALE=1` to run with
//! 100,000:
//!
//! ```bash
//! BENCH_FULL_SCALE=1 cargo bench -p sema-index
//! ```

use std::sync::Arc;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use sema_core::types::Document;
use sema_index::{BackendKind, Embedder, HashEmbedder, Retriever, VectorIndex};

const DIMENSION: usize = 384;
const CI_DOC_COUNT: usize = 10_000;
const FULL_SCALE_DOC_COUNT: usize = 100_000;

fn doc_count() -> usize {
    if std::env::var("BENCH_FULL_SCALE").is_ok() {
        FULL_SCALE_DOC_COUNT
    } else {
        CI_DOC_COUNT
    }
}

fn generate_text(index: usize) -> String {
    format!(
        "The deployment pipeline ran across staging and production while the \
         reviewer read the authentication changes. Document number {}",
        index
    )
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build tokio runtime")
}

fn build_index(backend: BackendKind, count: usize) -> VectorIndex {
    let rt = runtime();
    let embedder = HashEmbedder::new(DIMENSION);
    let texts: Vec<String> = (0..count).map(generate_text).collect();
    let vectors = rt.block_on(embedder.embed(&texts)).expect("embed failed");
    let docs = texts
        .into_iter()
        .enumerate()
        .map(|(i, text)| Document::new(format!("line-{}", i), text))
        .collect();

    let index = VectorIndex::new(DIMENSION, backend).expect("index creation failed");
    index.add(&vectors, docs).expect("add failed");
    assert_eq!(index.len(), count);
    index
}

fn bench_search(c: &mut Criterion) {
    let count = doc_count();
    let rt = runtime();
    let query = rt
        .block_on(HashEmbedder::new(DIMENSION).embed(&["authentication changes".to_string()]))
        .expect("query embed failed")
        .remove(0);

    let mut group = c.benchmark_group("knn_search");
    group.sample_size(50);
    group.measurement_time(Duration::from_secs(10));

    for backend in [BackendKind::BruteForce, BackendKind::Specialized] {
        let index = build_index(backend, count);
        group.bench_with_input(
            BenchmarkId::new(index.backend().to_string(), count),
            &query,
            |b, query| {
                b.iter(|| {
                    let hits = index.search(query, 10).expect("search failed");
                    assert_eq!(hits.len(), 10);
                    hits
                });
            },
        );
    }

    group.finish();
}

fn bench_retrieve(c: &mut Criterion) {
    let count = doc_count();
    let index = Arc::new(build_index(BackendKind::Specialized, count));
    let retriever = Retriever::new(index, HashEmbedder::new(DIMENSION));
    let rt = runtime();

    let mut group = c.benchmark_group("retrieve");
    group.sample_size(50);

    group.bench_function(format!("top5_{}docs", count), |b| {
        b.iter(|| {
            rt.block_on(retriever.retrieve("deployment pipeline staging", 5))
                .expect("retrieve failed")
        });
    });

    group.finish();
}

criterion_group!(benches, bench_search, bench_retrieve);
criterion_main!(benches);
