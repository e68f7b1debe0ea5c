use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use polars::prelude::*;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde_json::{json, Value};
use std::sync::Arc;
use tabserve::inference::{InferenceService, ModelContext};
use tabserve::preprocessing::{PipelineBuilder, PipelineConfig};
use tabserve::schema::FeatureSchema;
use tabserve::training::ClassifierConfig;

const REGIONS: [&str; 4] = ["North", "South", "East", "West"];

fn schema() -> FeatureSchema {
    FeatureSchema::new(["Age", "Income"], ["Region"], "Approved")
}

fn create_loan_data(n_rows: usize) -> DataFrame {
    let mut rng = ChaCha8Rng::seed_from_u64(42);

    let age: Vec<Option<f64>> = (0..n_rows)
        .map(|_| (rng.gen::<f64>() > 0.05).then(|| rng.gen_range(18.0..80.0)))
        .collect();
    let income: Vec<f64> = (0..n_rows).map(|_| rng.gen_range(500.0..120_000.0)).collect();
    let region: Vec<&str> = (0..n_rows).map(|_| REGIONS[rng.gen_range(0..REGIONS.len())]).collect();
    let approved: Vec<i64> = income.iter().map(|v| (*v > 40_000.0) as i64).collect();

    df!(
        "Age" => age,
        "Income" => income,
        "Region" => region,
        "Approved" => approved
    )
    .unwrap()
}

fn create_requests(n_records: usize) -> Vec<Value> {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    (0..n_records)
        .map(|_| {
            json!({
                "Age": rng.gen_range(18..80),
                "Income": rng.gen_range(500.0..150_000.0),
                "Region": REGIONS[rng.gen_range(0..REGIONS.len())],
            })
        })
        .collect()
}

fn pipeline_config() -> PipelineConfig {
    PipelineConfig::default().with_classifier(ClassifierConfig::default().with_n_estimators(50))
}

fn bench_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("fit");
    group.sample_size(10);

    for n_rows in [1000, 5000].iter() {
        let df = create_loan_data(*n_rows);

        group.bench_with_input(BenchmarkId::new("pipeline", n_rows), &df, |b, df| {
            b.iter(|| {
                PipelineBuilder::new(schema(), pipeline_config())
                    .fit(black_box(df))
                    .unwrap()
            })
        });
    }

    group.finish();
}

fn bench_predict_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("predict_batch");

    let pipeline = PipelineBuilder::new(schema(), pipeline_config())
        .fit(&create_loan_data(5000))
        .unwrap();
    let service = InferenceService::new(Arc::new(ModelContext::new(pipeline).unwrap()));

    for n_records in [1, 100, 1000].iter() {
        let requests = create_requests(*n_records);

        group.bench_with_input(BenchmarkId::new("records", n_records), &requests, |b, requests| {
            b.iter(|| service.predict_batch(black_box(requests)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_fit, bench_predict_batch);
criterion_main!(benches);
