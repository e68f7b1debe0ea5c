//! Pipeline orchestration: fit once, serve many times

use super::{frame_to_matrix, PipelineConfig, PipelineStage, Stage};
use crate::error::{Result, TabserveError};
use crate::schema::{FeatureSchema, Record};
use crate::training::{Classifier, ClassifierModel};
use chrono::{DateTime, Utc};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Version tag used when none is given
pub const DEFAULT_VERSION: &str = "0.1.0";

/// Stage names in the only valid execution order
const STAGE_ORDER: [&str; 4] = ["imputer", "outlier_handler", "encoder", "scaler"];

/// Fits the stage sequence and classifier on training data.
///
/// The builder holds configuration only; everything learned lives in the
/// [`FittedPipeline`] it returns.
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    schema: FeatureSchema,
    config: PipelineConfig,
    version: String,
}

impl PipelineBuilder {
    pub fn new(schema: FeatureSchema, config: PipelineConfig) -> Self {
        Self {
            schema,
            config,
            version: DEFAULT_VERSION.to_string(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Fit every stage in order, then the classifier
    pub fn fit(&self, df: &DataFrame) -> Result<FittedPipeline> {
        self.fit_transform(df).map(|(pipeline, _)| pipeline)
    }

    /// Fit and also return the transformed training matrix the classifier saw
    pub fn fit_transform(&self, df: &DataFrame) -> Result<(FittedPipeline, Array2<f64>)> {
        let start = Instant::now();

        self.schema.validate()?;
        self.config.validate()?;
        if self.version.trim().is_empty() {
            return Err(TabserveError::ConfigError("model version is empty".to_string()));
        }
        if df.height() == 0 {
            return Err(TabserveError::TrainingError("training data has no rows".to_string()));
        }

        let labels = self.schema.labels(df)?;
        let mut frame = self.schema.feature_frame(df)?;

        let mut stages = PipelineStage::default_sequence(&self.config);
        for stage in &mut stages {
            frame = stage.fit_transform(&frame, &self.schema)?;
            debug!(stage = stage.name(), columns = frame.width(), "Stage fitted");
        }

        let feature_names: Vec<String> = frame.get_column_names().iter().map(|s| s.to_string()).collect();
        let matrix = frame_to_matrix(&frame)?;

        let mut classifier = ClassifierModel::from_config(&self.config.classifier)?;
        classifier.fit(&matrix, &labels)?;

        info!(
            version = %self.version,
            rows = df.height(),
            features = feature_names.len(),
            model = ?classifier.model_type(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Pipeline fitted"
        );

        let pipeline = FittedPipeline {
            version: self.version.clone(),
            created_at: Utc::now(),
            schema: self.schema.clone(),
            stages,
            classifier,
            feature_names,
            n_training_rows: df.height(),
        };
        Ok((pipeline, matrix))
    }
}

/// An immutable, fully fitted pipeline: stages plus classifier.
///
/// Only `&self` methods exist, so one instance can be shared across threads
/// behind an `Arc`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedPipeline {
    version: String,
    created_at: DateTime<Utc>,
    schema: FeatureSchema,
    stages: Vec<PipelineStage>,
    classifier: ClassifierModel,
    feature_names: Vec<String>,
    n_training_rows: usize,
}

impl FittedPipeline {
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn stages(&self) -> &[PipelineStage] {
        &self.stages
    }

    pub fn classifier(&self) -> &ClassifierModel {
        &self.classifier
    }

    /// Column names of the model-ready matrix, in order
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn n_training_rows(&self) -> usize {
        self.n_training_rows
    }

    /// Run the transform chain on a raw frame (extra columns are ignored)
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let features = self.schema.feature_frame(df)?;
        self.apply_stages(features)
    }

    /// Run the transform chain on validated records
    pub fn transform_records(&self, records: &[Record]) -> Result<DataFrame> {
        let features = self.schema.records_frame(records)?;
        self.apply_stages(features)
    }

    /// Transform a raw frame into the model-ready matrix
    pub fn feature_matrix(&self, df: &DataFrame) -> Result<Array2<f64>> {
        frame_to_matrix(&self.transform(df)?)
    }

    /// Predict class labels for every row of a raw frame
    pub fn predict(&self, df: &DataFrame) -> Result<Vec<i64>> {
        self.classify(&self.feature_matrix(df)?)
    }

    /// Predict class labels for validated records
    pub fn predict_records(&self, records: &[Record]) -> Result<Vec<i64>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let frame = self.transform_records(records)?;
        self.classify(&frame_to_matrix(&frame)?)
    }

    fn apply_stages(&self, mut frame: DataFrame) -> Result<DataFrame> {
        for stage in &self.stages {
            frame = stage.transform(&frame)?;
        }

        let produced: Vec<String> = frame.get_column_names().iter().map(|s| s.to_string()).collect();
        if produced != self.feature_names {
            return Err(TabserveError::ShapeError {
                expected: format!("columns {:?}", self.feature_names),
                actual: format!("columns {:?}", produced),
            });
        }
        Ok(frame)
    }

    fn classify(&self, matrix: &Array2<f64>) -> Result<Vec<i64>> {
        let predictions = self.classifier.predict(matrix)?;
        Ok(predictions.iter().map(|v| v.round() as i64).collect())
    }

    /// Check the artifact is usable for serving.
    ///
    /// Every stage and the classifier must be fitted, stages must be in the
    /// fixed order, the feature names must match the classifier width, and
    /// no tree node may read past that width.
    pub fn verify(&self) -> Result<()> {
        self.schema.validate()?;

        let names: Vec<&str> = self.stages.iter().map(|s| s.name()).collect();
        if names != STAGE_ORDER {
            return Err(TabserveError::ConfigError(format!(
                "stages {:?} do not match the required order {:?}",
                names, STAGE_ORDER
            )));
        }
        if let Some(stage) = self.stages.iter().find(|s| !s.is_fitted()) {
            return Err(TabserveError::not_fitted(stage.name()));
        }
        if !self.classifier.is_fitted() {
            return Err(TabserveError::not_fitted("classifier"));
        }

        let mut expected: Vec<String> = self.schema.numeric().to_vec();
        if let Some(PipelineStage::Encoder(encoder)) = self.stages.get(2) {
            expected.extend(encoder.indicator_names());
        }
        if expected != self.feature_names {
            return Err(TabserveError::ShapeError {
                expected: format!("{:?}", expected),
                actual: format!("{:?}", self.feature_names),
            });
        }
        if self.classifier.n_features() != self.feature_names.len() {
            return Err(TabserveError::ShapeError {
                expected: format!("{} classifier inputs", self.feature_names.len()),
                actual: format!("{} classifier inputs", self.classifier.n_features()),
            });
        }
        self.classifier.check_structure()
    }

    /// Save the fitted pipeline as JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load and verify a fitted pipeline
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let pipeline: Self = serde_json::from_str(&json)?;
        pipeline.verify()?;
        Ok(pipeline)
    }
}
