//! tabserve - validated tabular-classifier inference
//!
//! A fixed, ordered preprocessing pipeline (imputation, outlier clipping,
//! one-hot encoding, scaling) is fitted once together with a tree classifier
//! and then served read-only behind a schema-validating boundary.
//!
//! # Modules
//!
//! ## Core
//! - [`schema`] - Feature schema and per-record validation
//! - [`preprocessing`] - Pipeline stages and the fit/serve orchestrator
//! - [`training`] - Decision tree and random forest classifiers
//! - [`inference`] - Model context, artifact store and batch inference service
//!
//! ## Services
//! - [`config`] - Application configuration
//! - [`server`] - HTTP server with REST API
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Core modules
pub mod schema;
pub mod preprocessing;
pub mod training;
pub mod inference;

// Services
pub mod config;
pub mod server;
pub mod cli;

pub use error::{Result, TabserveError};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{Result, TabserveError};

    // Configuration
    pub use crate::config::AppConfig;

    // Schema
    pub use crate::schema::{FeatureSchema, FieldError, FieldKind, FieldValue, Record, SchemaValidator};

    // Preprocessing
    pub use crate::preprocessing::{FittedPipeline, PipelineBuilder, PipelineConfig, PipelineStage, Stage};

    // Training
    pub use crate::training::{Classifier, ClassifierConfig, ClassifierModel, ModelType};

    // Inference
    pub use crate::inference::{
        BatchPrediction, InferenceService, ModelContext, ModelStore, PipelineLoader, PredictionResult,
    };
}
