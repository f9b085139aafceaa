//! Benchmarks for backoff, contract validation and a full in-memory run.

use campaignflow::contracts::{validate, Boundary};
use campaignflow::observability::NoOpLogger;
use campaignflow::pipeline::{Orchestrator, PipelineOptions};
use campaignflow::retry::compute_backoff;
use campaignflow::testing::{fixtures, RecordingSleeper};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use std::time::Duration;

fn backoff_benchmark(c: &mut Criterion) {
    let base = Duration::from_millis(1000);
    let ceiling = Duration::from_millis(30_000);
    c.bench_function("compute_backoff", |b| {
        b.iter(|| {
            for attempt in 0..64 {
                black_box(compute_backoff(black_box(attempt), base, ceiling));
            }
        });
    });
}

fn contract_benchmark(c: &mut Criterion) {
    let payload = fixtures::quality_output();
    c.bench_function("validate_quality_to_delivery", |b| {
        b.iter(|| validate(Boundary::QualityToDelivery, black_box(payload.clone())));
    });
}

fn pipeline_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let orchestrator = Orchestrator::new(fixtures::happy_specialists())
        .with_logger(Arc::new(NoOpLogger))
        .with_sleeper(Arc::new(RecordingSleeper::new()));

    c.bench_function("run_pipeline_happy_path", |b| {
        b.iter(|| {
            runtime
                .block_on(orchestrator.run_pipeline("Paris flight sale", PipelineOptions::new()))
                .unwrap()
        });
    });
}

criterion_group!(benches, backoff_benchmark, contract_benchmark, pipeline_benchmark);
criterion_main!(benches);
