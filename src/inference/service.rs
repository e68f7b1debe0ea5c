//! Batch inference with per-record error isolation

use super::ModelContext;
use crate::schema::{FieldError, Record, ROOT_FIELD};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

/// Reason reported for a record that failed inside the pipeline
pub const INTERNAL_ERROR_REASON: &str = "internal error";

/// Outcome for one record: either `errors` or `prediction` is set, never both
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub errors: Option<Vec<FieldError>>,
    pub version: String,
    pub prediction: Option<i64>,
}

impl PredictionResult {
    pub fn success(version: impl Into<String>, prediction: i64) -> Self {
        Self {
            errors: None,
            version: version.into(),
            prediction: Some(prediction),
        }
    }

    pub fn failure(version: impl Into<String>, errors: Vec<FieldError>) -> Self {
        Self {
            errors: Some(errors),
            version: version.into(),
            prediction: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.prediction.is_some()
    }
}

/// Results for a batch, one per input record and in input order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchPrediction {
    pub version: String,
    pub results: Vec<PredictionResult>,
}

impl BatchPrediction {
    pub fn n_succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn n_failed(&self) -> usize {
        self.results.len() - self.n_succeeded()
    }

    /// `(index, errors)` for every failed record
    pub fn failures(&self) -> Vec<(usize, &[FieldError])> {
        self.results
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.errors.as_deref().map(|errors| (i, errors)))
            .collect()
    }
}

/// Validates, transforms and predicts raw records against the loaded model
#[derive(Debug, Clone)]
pub struct InferenceService {
    context: Arc<ModelContext>,
}

impl InferenceService {
    pub fn new(context: Arc<ModelContext>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &ModelContext {
        &self.context
    }

    pub fn version(&self) -> &str {
        self.context.version()
    }

    /// Score a batch of raw JSON records.
    ///
    /// Records that fail validation never reach the pipeline. Valid records are
    /// scored together; if that fails they are retried one by one so a single
    /// bad record cannot take its siblings down.
    pub fn predict_batch(&self, raws: &[Value]) -> BatchPrediction {
        let start = Instant::now();
        let version = self.context.version();

        let mut results: Vec<Option<PredictionResult>> = vec![None; raws.len()];
        let mut valid: Vec<(usize, Record)> = Vec::with_capacity(raws.len());

        for (index, outcome) in self.context.validator().validate_batch(raws).into_iter().enumerate() {
            match outcome {
                Ok(record) => valid.push((index, record)),
                Err(errors) => {
                    debug!(index, n_errors = errors.len(), "Record failed validation");
                    results[index] = Some(PredictionResult::failure(version, errors));
                }
            }
        }

        for (index, outcome) in self.score(&valid) {
            results[index] = Some(match outcome {
                Ok(prediction) => PredictionResult::success(version, prediction),
                Err(errors) => PredictionResult::failure(version, errors),
            });
        }

        let results: Vec<PredictionResult> = results
            .into_iter()
            .map(|r| r.unwrap_or_else(|| internal_failure(version)))
            .collect();

        let batch = BatchPrediction {
            version: version.to_string(),
            results,
        };
        debug!(
            records = raws.len(),
            succeeded = batch.n_succeeded(),
            failed = batch.n_failed(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "Batch scored"
        );
        batch
    }

    fn score(&self, valid: &[(usize, Record)]) -> Vec<(usize, Result<i64, Vec<FieldError>>)> {
        if valid.is_empty() {
            return Vec::new();
        }

        let pipeline = self.context.pipeline();
        let records: Vec<Record> = valid.iter().map(|(_, r)| r.clone()).collect();

        match catch_unwind(AssertUnwindSafe(|| pipeline.predict_records(&records))) {
            Ok(Ok(predictions)) if predictions.len() == valid.len() => {
                return valid
                    .iter()
                    .zip(predictions)
                    .map(|((index, _), p)| (*index, Ok(p)))
                    .collect();
            }
            Ok(Ok(predictions)) => warn!(
                expected = valid.len(),
                actual = predictions.len(),
                "Batch prediction returned the wrong number of rows, retrying per record"
            ),
            Ok(Err(e)) => warn!(error = %e, "Batch prediction failed, retrying per record"),
            Err(_) => warn!("Batch prediction panicked, retrying per record"),
        }

        valid
            .par_iter()
            .map(|(index, record)| {
                let single = std::slice::from_ref(record);
                let outcome = match catch_unwind(AssertUnwindSafe(|| pipeline.predict_records(single))) {
                    Ok(Ok(p)) if p.len() == 1 => Ok(p[0]),
                    Ok(Ok(p)) => {
                        error!(index, rows = p.len(), "Record produced an unexpected number of predictions");
                        Err(vec![FieldError::new(ROOT_FIELD, INTERNAL_ERROR_REASON)])
                    }
                    Ok(Err(e)) => {
                        error!(index, error = %e, "Record failed inside the pipeline");
                        Err(vec![FieldError::new(ROOT_FIELD, INTERNAL_ERROR_REASON)])
                    }
                    Err(_) => {
                        error!(index, "Record panicked inside the pipeline");
                        Err(vec![FieldError::new(ROOT_FIELD, INTERNAL_ERROR_REASON)])
                    }
                };
                (*index, outcome)
            })
            .collect()
    }
}

fn internal_failure(version: &str) -> PredictionResult {
    PredictionResult::failure(version, vec![FieldError::new(ROOT_FIELD, INTERNAL_ERROR_REASON)])
}
