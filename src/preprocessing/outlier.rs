//! Percentile-based outlier clipping

use super::{float_column, Stage};
use crate::error::{Result, TabserveError};
use crate::schema::FeatureSchema;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Clipping bounds learned for one numeric field
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutlierBounds {
    pub lower: f64,
    pub upper: f64,
}

impl OutlierBounds {
    pub fn clip(&self, value: f64) -> f64 {
        value.max(self.lower).min(self.upper)
    }
}

/// Clips numeric fields into `[p_lower, p_upper]` percentiles computed at fit.
///
/// Percentiles use linear interpolation. A field with no observed values at fit
/// gets no bounds and passes through unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlierHandler {
    lower_percentile: f64,
    upper_percentile: f64,
    bounds: Vec<(String, Option<OutlierBounds>)>,
    is_fitted: bool,
}

impl Default for OutlierHandler {
    fn default() -> Self {
        Self::new(1.0, 99.0)
    }
}

impl OutlierHandler {
    /// Create a handler clipping at the given percentiles (0-100)
    pub fn new(lower_percentile: f64, upper_percentile: f64) -> Self {
        Self {
            lower_percentile,
            upper_percentile,
            bounds: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn bounds(&self, field: &str) -> Option<OutlierBounds> {
        self.bounds
            .iter()
            .find(|(name, _)| name == field)
            .and_then(|(_, bounds)| *bounds)
    }

    fn compute_bounds(&self, ca: &Float64Chunked) -> Result<Option<OutlierBounds>> {
        let lower = ca.quantile(self.lower_percentile / 100.0, QuantileMethod::Linear)?;
        let upper = ca.quantile(self.upper_percentile / 100.0, QuantileMethod::Linear)?;
        Ok(lower.zip(upper).map(|(lower, upper)| OutlierBounds { lower, upper }))
    }
}

impl Stage for OutlierHandler {
    fn name(&self) -> &'static str {
        "outlier_handler"
    }

    fn fit(&mut self, df: &DataFrame, schema: &FeatureSchema) -> Result<()> {
        if !(0.0..=100.0).contains(&self.lower_percentile)
            || !(0.0..=100.0).contains(&self.upper_percentile)
            || self.lower_percentile >= self.upper_percentile
        {
            return Err(TabserveError::InvalidParameter {
                name: "percentiles".to_string(),
                value: format!("({}, {})", self.lower_percentile, self.upper_percentile),
                reason: "need 0 <= lower < upper <= 100".to_string(),
            });
        }

        let mut bounds = Vec::with_capacity(schema.numeric().len());
        for name in schema.numeric() {
            let ca = float_column(df, name)?;
            bounds.push((name.clone(), self.compute_bounds(ca)?));
        }

        self.bounds = bounds;
        self.is_fitted = true;
        Ok(())
    }

    fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(TabserveError::not_fitted(self.name()));
        }

        let mut result = df.clone();
        for (name, bounds) in &self.bounds {
            let ca = float_column(df, name)?;
            let Some(bounds) = bounds else {
                continue;
            };
            let clipped: Float64Chunked = ca.into_iter().map(|opt| opt.map(|v| bounds.clip(v))).collect();
            result.with_column(clipped.with_name(name.as_str().into()).into_series())?;
        }

        Ok(result)
    }

    fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}
