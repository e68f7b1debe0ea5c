//! Standard scaling of numeric fields

use super::{float_column, Stage};
use crate::error::{Result, TabserveError};
use crate::schema::FeatureSchema;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Parameters for one scaled field
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    pub mean: f64,
    pub scale: f64,
}

/// Z-score scaling: `(x - mean) / std` with population std.
///
/// Only schema numeric fields are scaled; indicator columns are left alone.
/// A zero-variance field gets scale 1.0.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StandardScaler {
    params: Vec<(String, ScalerParams)>,
    is_fitted: bool,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn params(&self, field: &str) -> Option<ScalerParams> {
        self.params.iter().find(|(name, _)| name == field).map(|(_, p)| *p)
    }

    fn compute_params(ca: &Float64Chunked) -> ScalerParams {
        let mean = ca.mean().unwrap_or(0.0);
        let std = ca.std(0).unwrap_or(0.0);
        ScalerParams {
            mean,
            scale: if std == 0.0 || !std.is_finite() { 1.0 } else { std },
        }
    }
}

impl Stage for StandardScaler {
    fn name(&self) -> &'static str {
        "scaler"
    }

    fn fit(&mut self, df: &DataFrame, schema: &FeatureSchema) -> Result<()> {
        self.params = schema
            .numeric()
            .iter()
            .map(|name| Ok((name.clone(), Self::compute_params(float_column(df, name)?))))
            .collect::<Result<Vec<_>>>()?;
        self.is_fitted = true;
        Ok(())
    }

    fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(TabserveError::not_fitted(self.name()));
        }

        let replacements: Vec<Series> = self
            .params
            .iter()
            .map(|(name, params)| {
                let ca = float_column(df, name)?;
                let scaled: Float64Chunked = ca
                    .into_iter()
                    .map(|opt| opt.map(|v| (v - params.mean) / params.scale))
                    .collect();
                Ok(scaled.with_name(name.as_str().into()).into_series())
            })
            .collect::<Result<Vec<_>>>()?;

        let mut result = df.clone();
        for scaled in replacements {
            result.with_column(scaled)?;
        }

        Ok(result)
    }

    fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}
