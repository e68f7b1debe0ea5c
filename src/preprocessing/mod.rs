//! Data preprocessing module
//!
//! Four stages run in a fixed order, each fitted on the output of the previous one:
//! - Missing value imputation (median for numeric, mode for categorical)
//! - Percentile-based outlier clipping
//! - One-hot categorical encoding with a fitted vocabulary
//! - Standard scaling of numeric fields
//!
//! [`PipelineBuilder`] fits the stages and the classifier together and yields an
//! immutable [`FittedPipeline`].

mod config;
mod encoder;
mod imputer;
pub mod outlier;
mod pipeline;
mod scaler;

pub use config::PipelineConfig;
pub use encoder::CategoricalEncoder;
pub use imputer::{FillValue, MissingValueImputer};
pub use outlier::{OutlierBounds, OutlierHandler};
pub use pipeline::{FittedPipeline, PipelineBuilder, DEFAULT_VERSION};
pub use scaler::StandardScaler;

use crate::error::{Result, TabserveError};
use crate::schema::FeatureSchema;
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// A preprocessing stage: learns statistics in `fit`, applies them in `transform`.
///
/// `transform` never mutates the stage, so a fitted stage can be shared across
/// threads.
pub trait Stage {
    /// Stage name used in logs and errors
    fn name(&self) -> &'static str;

    /// Learn statistics from the frame. Fitting again replaces them.
    fn fit(&mut self, df: &DataFrame, schema: &FeatureSchema) -> Result<()>;

    /// Apply the learned statistics
    fn transform(&self, df: &DataFrame) -> Result<DataFrame>;

    fn is_fitted(&self) -> bool;

    fn fit_transform(&mut self, df: &DataFrame, schema: &FeatureSchema) -> Result<DataFrame> {
        self.fit(df, schema)?;
        self.transform(df)
    }
}

/// The closed set of stage variants, in a form that serializes with the artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Imputer(MissingValueImputer),
    OutlierHandler(OutlierHandler),
    Encoder(CategoricalEncoder),
    Scaler(StandardScaler),
}

impl PipelineStage {
    /// Unfitted stages in execution order
    pub fn default_sequence(config: &PipelineConfig) -> Vec<PipelineStage> {
        vec![
            PipelineStage::Imputer(MissingValueImputer::new()),
            PipelineStage::OutlierHandler(OutlierHandler::new(
                config.outlier_lower_percentile,
                config.outlier_upper_percentile,
            )),
            PipelineStage::Encoder(CategoricalEncoder::new()),
            PipelineStage::Scaler(StandardScaler::new()),
        ]
    }

    fn inner(&self) -> &dyn Stage {
        match self {
            PipelineStage::Imputer(s) => s,
            PipelineStage::OutlierHandler(s) => s,
            PipelineStage::Encoder(s) => s,
            PipelineStage::Scaler(s) => s,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Stage {
        match self {
            PipelineStage::Imputer(s) => s,
            PipelineStage::OutlierHandler(s) => s,
            PipelineStage::Encoder(s) => s,
            PipelineStage::Scaler(s) => s,
        }
    }
}

impl Stage for PipelineStage {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn fit(&mut self, df: &DataFrame, schema: &FeatureSchema) -> Result<()> {
        self.inner_mut().fit(df, schema)
    }

    fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        self.inner().transform(df)
    }

    fn is_fitted(&self) -> bool {
        self.inner().is_fitted()
    }
}

/// Borrow a column as `Float64`
pub(crate) fn float_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Float64Chunked> {
    let series = df
        .column(name)
        .map_err(|_| TabserveError::FeatureNotFound(name.to_string()))?
        .as_materialized_series();
    series
        .f64()
        .map_err(|_| TabserveError::DataError(format!("column '{}' is {}, expected f64", name, series.dtype())))
}

/// Borrow a column as `String`
pub(crate) fn string_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a StringChunked> {
    let series = df
        .column(name)
        .map_err(|_| TabserveError::FeatureNotFound(name.to_string()))?
        .as_materialized_series();
    series
        .str()
        .map_err(|_| TabserveError::DataError(format!("column '{}' is {}, expected str", name, series.dtype())))
}

/// Convert an all-`Float64`, null-free frame into a row-major matrix
pub fn frame_to_matrix(df: &DataFrame) -> Result<Array2<f64>> {
    let mut matrix = Array2::zeros((df.height(), df.width()));

    for (j, column) in df.get_columns().iter().enumerate() {
        let name = column.name().to_string();
        let ca = float_column(df, &name)?;
        for (i, value) in ca.into_iter().enumerate() {
            matrix[[i, j]] = value.ok_or_else(|| {
                TabserveError::DataError(format!("column '{}' still has a null at row {}", name, i))
            })?;
        }
    }

    Ok(matrix)
}
