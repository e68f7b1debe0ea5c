//! Missing value imputation

use super::{float_column, string_column, Stage};
use crate::error::{Result, TabserveError};
use crate::schema::{FeatureSchema, FieldKind};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fill used when a numeric column has no observed values at fit
const NUMERIC_FALLBACK: f64 = 0.0;

/// Fill used when a categorical column has no observed values at fit
const CATEGORICAL_FALLBACK: &str = "missing";

/// Learned replacement for one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FillValue {
    Numeric(f64),
    Categorical(String),
}

/// Replaces nulls with the fit-time median (numeric) or mode (categorical)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MissingValueImputer {
    fill_values: Vec<(String, FillValue)>,
    is_fitted: bool,
}

impl MissingValueImputer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill value learned for a field
    pub fn fill_value(&self, field: &str) -> Option<&FillValue> {
        self.fill_values
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    fn median(ca: &Float64Chunked) -> f64 {
        ca.median().unwrap_or(NUMERIC_FALLBACK)
    }

    /// Most frequent value; ties go to the lexicographically smallest
    fn mode(ca: &StringChunked) -> String {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for value in ca.into_iter().flatten() {
            *counts.entry(value).or_insert(0) += 1;
        }

        let mut best: Option<(&str, usize)> = None;
        for (value, count) in counts {
            if best.map_or(true, |(_, c)| count > c) {
                best = Some((value, count));
            }
        }
        best.map_or_else(|| CATEGORICAL_FALLBACK.to_string(), |(v, _)| v.to_string())
    }
}

impl Stage for MissingValueImputer {
    fn name(&self) -> &'static str {
        "imputer"
    }

    fn fit(&mut self, df: &DataFrame, schema: &FeatureSchema) -> Result<()> {
        let mut fill_values = Vec::with_capacity(schema.n_features());

        for (name, kind) in schema.fields() {
            let fill = match kind {
                FieldKind::Numeric => FillValue::Numeric(Self::median(float_column(df, name)?)),
                FieldKind::Categorical => FillValue::Categorical(Self::mode(string_column(df, name)?)),
            };
            fill_values.push((name.to_string(), fill));
        }

        self.fill_values = fill_values;
        self.is_fitted = true;
        Ok(())
    }

    fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(TabserveError::not_fitted(self.name()));
        }

        let mut result = df.clone();
        for (name, fill) in &self.fill_values {
            let filled = match fill {
                FillValue::Numeric(v) => {
                    let ca = float_column(df, name)?;
                    if ca.null_count() == 0 {
                        continue;
                    }
                    let out: Float64Chunked = ca.into_iter().map(|opt| Some(opt.unwrap_or(*v))).collect();
                    out.with_name(name.as_str().into()).into_series()
                }
                FillValue::Categorical(v) => {
                    let ca = string_column(df, name)?;
                    if ca.null_count() == 0 {
                        continue;
                    }
                    let out: StringChunked = ca
                        .into_iter()
                        .map(|opt| Some(opt.unwrap_or(v.as_str())))
                        .collect();
                    out.with_name(name.as_str().into()).into_series()
                }
            };
            result.with_column(filled)?;
        }

        Ok(result)
    }

    fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> FeatureSchema {
        FeatureSchema::new(["Age", "Income"], ["Region"], "Approved")
    }

    #[test]
    fn test_median_and_mode() {
        let df = df!(
            "Age" => &[Some(20.0), Some(30.0), None, Some(40.0), Some(50.0)],
            "Income" => &[Some(1.0), None, Some(3.0), None, Some(2.0)],
            "Region" => &[Some("South"), Some("North"), None, Some("South"), Some("North")],
        )
        .unwrap();

        let mut imputer = MissingValueImputer::new();
        let out = imputer.fit_transform(&df, &schema()).unwrap();

        // even count takes the midpoint
        assert_eq!(imputer.fill_value("Age"), Some(&FillValue::Numeric(35.0)));
        assert_eq!(imputer.fill_value("Income"), Some(&FillValue::Numeric(2.0)));
        // tie between North and South resolves to the smaller label
        assert_eq!(imputer.fill_value("Region"), Some(&FillValue::Categorical("North".to_string())));

        assert_eq!(out.column("Age").unwrap().null_count(), 0);
        assert_eq!(float_column(&out, "Age").unwrap().get(2), Some(35.0));
        assert_eq!(string_column(&out, "Region").unwrap().get(2), Some("North"));
    }

    #[test]
    fn test_all_null_fallbacks() {
        let df = df!(
            "Age" => &[None::<f64>, None],
            "Income" => &[1.0, 2.0],
            "Region" => &[None::<&str>, None],
        )
        .unwrap();

        let mut imputer = MissingValueImputer::new();
        let out = imputer.fit_transform(&df, &schema()).unwrap();

        assert_eq!(float_column(&out, "Age").unwrap().get(0), Some(0.0));
        assert_eq!(string_column(&out, "Region").unwrap().get(1), Some("missing"));
    }

    #[test]
    fn test_transform_before_fit() {
        let df = df!("Age" => &[1.0]).unwrap();
        let err = MissingValueImputer::new().transform(&df).unwrap_err();
        assert!(matches!(err, TabserveError::NotFitted { .. }));
    }

    #[test]
    fn test_transform_missing_column() {
        let train = df!("Age" => &[1.0], "Income" => &[2.0], "Region" => &["North"]).unwrap();
        let mut imputer = MissingValueImputer::new();
        imputer.fit(&train, &schema()).unwrap();

        let serve = df!("Age" => &[1.0], "Region" => &["North"]).unwrap();
        assert!(matches!(imputer.transform(&serve), Err(TabserveError::FeatureNotFound(_))));
    }

    #[test]
    fn test_refit_replaces_statistics() {
        let mut imputer = MissingValueImputer::new();
        let first = df!("Age" => &[1.0], "Income" => &[1.0], "Region" => &["A"]).unwrap();
        let second = df!("Age" => &[9.0], "Income" => &[9.0], "Region" => &["B"]).unwrap();

        imputer.fit(&first, &schema()).unwrap();
        imputer.fit(&second, &schema()).unwrap();

        assert_eq!(imputer.fill_value("Age"), Some(&FillValue::Numeric(9.0)));
        assert_eq!(imputer.fill_value("Region"), Some(&FillValue::Categorical("B".to_string())));
    }
}
