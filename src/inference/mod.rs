//! Inference module
//!
//! - [`ModelContext`]: the loaded pipeline and its validator, built once at startup
//! - [`PipelineLoader`] / [`ModelStore`]: versioned artifacts on disk
//! - [`InferenceService`]: validate, transform and predict a batch of raw records
//!   with per-record error isolation

mod context;
mod service;
mod store;

pub use context::ModelContext;
pub use service::{BatchPrediction, InferenceService, PredictionResult, INTERNAL_ERROR_REASON};
pub use store::{ModelStore, PipelineLoader};
