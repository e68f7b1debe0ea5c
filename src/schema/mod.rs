//! Feature schema and request validation
//!
//! The [`FeatureSchema`] names the numeric fields, the categorical fields and
//! the target. It is built once from configuration and shared read-only by the
//! [`SchemaValidator`] and every preprocessing stage.

mod validator;

pub use validator::{FieldError, FieldValue, Record, SchemaValidator, ValidationOutcome, ROOT_FIELD};

use crate::error::{Result, TabserveError};
use ndarray::Array1;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Declared type of a schema field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Numeric,
    Categorical,
}

/// Immutable description of the model's input fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    numeric: Vec<String>,
    categorical: Vec<String>,
    target: String,
}

impl FeatureSchema {
    /// Create a schema from numeric field names, categorical field names and the target
    pub fn new<N, C>(numeric: N, categorical: C, target: impl Into<String>) -> Self
    where
        N: IntoIterator,
        N::Item: Into<String>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        Self {
            numeric: numeric.into_iter().map(Into::into).collect(),
            categorical: categorical.into_iter().map(Into::into).collect(),
            target: target.into(),
        }
    }

    /// Check the schema is usable: at least one feature, no duplicates,
    /// no field declared twice, target not used as a feature.
    pub fn validate(&self) -> Result<()> {
        if self.numeric.is_empty() && self.categorical.is_empty() {
            return Err(TabserveError::ConfigError(
                "schema declares no numeric or categorical fields".to_string(),
            ));
        }
        if self.target.is_empty() {
            return Err(TabserveError::ConfigError("schema target is empty".to_string()));
        }

        let mut seen = HashSet::new();
        for name in self.numeric.iter().chain(self.categorical.iter()) {
            if name.is_empty() {
                return Err(TabserveError::ConfigError("schema contains an empty field name".to_string()));
            }
            if !seen.insert(name.as_str()) {
                return Err(TabserveError::ConfigError(format!(
                    "field '{}' is declared more than once",
                    name
                )));
            }
        }
        if seen.contains(self.target.as_str()) {
            return Err(TabserveError::ConfigError(format!(
                "target '{}' is also declared as a feature",
                self.target
            )));
        }
        Ok(())
    }

    pub fn numeric(&self) -> &[String] {
        &self.numeric
    }

    pub fn categorical(&self) -> &[String] {
        &self.categorical
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Number of input features (numeric + categorical)
    pub fn n_features(&self) -> usize {
        self.numeric.len() + self.categorical.len()
    }

    /// Feature fields in canonical order: numeric first, then categorical
    pub fn fields(&self) -> impl Iterator<Item = (&str, FieldKind)> {
        self.numeric
            .iter()
            .map(|n| (n.as_str(), FieldKind::Numeric))
            .chain(self.categorical.iter().map(|n| (n.as_str(), FieldKind::Categorical)))
    }

    /// Declared kind of a feature field, `None` for the target or unknown names
    pub fn kind_of(&self, field: &str) -> Option<FieldKind> {
        self.fields().find(|(name, _)| *name == field).map(|(_, kind)| kind)
    }

    /// Project a raw frame onto the feature columns.
    ///
    /// Numeric columns are strictly cast to `Float64`, categorical columns to
    /// `String`. Columns outside the schema (including the target) are dropped.
    pub fn feature_frame(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut columns: Vec<Column> = Vec::with_capacity(self.n_features());

        for (name, kind) in self.fields() {
            let series = df
                .column(name)
                .map_err(|_| TabserveError::FeatureNotFound(name.to_string()))?
                .as_materialized_series();

            let dtype = match kind {
                FieldKind::Numeric => DataType::Float64,
                FieldKind::Categorical => DataType::String,
            };
            let casted = series.strict_cast(&dtype).map_err(|e| {
                TabserveError::DataError(format!("field '{}' cannot be read as {:?}: {}", name, kind, e))
            })?;
            columns.push(casted.into());
        }

        Ok(DataFrame::new(columns)?)
    }

    /// Build a feature frame from validated records.
    ///
    /// Produces the same column layout and dtypes as [`feature_frame`](Self::feature_frame).
    pub fn records_frame(&self, records: &[Record]) -> Result<DataFrame> {
        let mut columns: Vec<Column> = Vec::with_capacity(self.n_features());

        for (name, kind) in self.fields() {
            let column = match kind {
                FieldKind::Numeric => {
                    let values = records
                        .iter()
                        .map(|record| match record.get(name) {
                            Some(FieldValue::Number(v)) => Ok(Some(*v)),
                            Some(FieldValue::Missing) | None => Ok(None),
                            Some(FieldValue::Category(_)) => Err(TabserveError::DataError(format!(
                                "numeric field '{}' holds a category value",
                                name
                            ))),
                        })
                        .collect::<Result<Vec<Option<f64>>>>()?;
                    Column::new(name.into(), values)
                }
                FieldKind::Categorical => {
                    let values = records
                        .iter()
                        .map(|record| match record.get(name) {
                            Some(FieldValue::Category(v)) => Ok(Some(v.as_str())),
                            Some(FieldValue::Missing) | None => Ok(None),
                            Some(FieldValue::Number(_)) => Err(TabserveError::DataError(format!(
                                "categorical field '{}' holds a numeric value",
                                name
                            ))),
                        })
                        .collect::<Result<Vec<Option<&str>>>>()?;
                    Column::new(name.into(), values)
                }
            };
            columns.push(column);
        }

        Ok(DataFrame::new(columns)?)
    }

    /// Extract the target column as integer class labels
    pub fn labels(&self, df: &DataFrame) -> Result<Array1<f64>> {
        let series = df
            .column(&self.target)
            .map_err(|_| TabserveError::FeatureNotFound(self.target.clone()))?
            .as_materialized_series()
            .strict_cast(&DataType::Float64)
            .map_err(|e| {
                TabserveError::DataError(format!("target '{}' is not numeric: {}", self.target, e))
            })?;
        let ca = series.f64()?;

        if ca.null_count() > 0 {
            return Err(TabserveError::DataError(format!(
                "target '{}' contains {} null values",
                self.target,
                ca.null_count()
            )));
        }

        let labels: Vec<f64> = ca.into_no_null_iter().collect();
        if let Some(bad) = labels.iter().find(|v| (*v - v.round()).abs() > 1e-9) {
            return Err(TabserveError::DataError(format!(
                "target '{}' must hold integer class labels, found {}",
                self.target, bad
            )));
        }

        Ok(Array1::from_vec(labels))
    }
}
