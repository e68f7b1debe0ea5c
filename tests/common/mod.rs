//! Shared fixtures for integration tests

#![allow(dead_code)]

use polars::prelude::*;
use tabserve::preprocessing::{FittedPipeline, PipelineBuilder, PipelineConfig};
use tabserve::schema::FeatureSchema;
use tabserve::training::ClassifierConfig;

pub fn loan_schema() -> FeatureSchema {
    FeatureSchema::new(["Age", "Income"], ["Region"], "Approved")
}

pub fn pipeline_config() -> PipelineConfig {
    PipelineConfig::default()
        .with_classifier(ClassifierConfig::default().with_n_estimators(10).with_random_state(7))
}

/// Loan applications with some nulls in every feature; approval follows income
pub fn loan_frame(n: usize) -> DataFrame {
    let age: Vec<Option<f64>> = (0..n)
        .map(|i| if i % 11 == 5 { None } else { Some(20.0 + ((i * 7) % 45) as f64) })
        .collect();
    let income: Vec<Option<f64>> = (0..n)
        .map(|i| if i % 13 == 7 { None } else { Some(1_000.0 * (i + 1) as f64) })
        .collect();
    let region: Vec<Option<&str>> = (0..n)
        .map(|i| match i % 5 {
            0 => None,
            1 | 3 => Some("North"),
            _ => Some("South"),
        })
        .collect();
    let approved: Vec<i64> = (0..n).map(|i| if i >= n / 2 { 1 } else { 0 }).collect();
    let loan_number: Vec<i64> = (0..n as i64).collect();

    df!(
        "LoanNumber" => loan_number,
        "Age" => age,
        "Income" => income,
        "Region" => region,
        "Approved" => approved
    )
    .unwrap()
}

pub fn fitted_pipeline(version: &str) -> FittedPipeline {
    PipelineBuilder::new(loan_schema(), pipeline_config())
        .with_version(version)
        .fit(&loan_frame(60))
        .unwrap()
}
