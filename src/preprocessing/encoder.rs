//! One-hot categorical encoding

use super::{string_column, Stage};
use crate::error::{Result, TabserveError};
use crate::schema::FeatureSchema;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

/// Vocabulary learned for one categorical field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FieldVocabulary {
    field: String,
    categories: Vec<String>,
}

impl FieldVocabulary {
    fn indicator_name(&self, category: &str) -> String {
        format!("{}_{}", self.field, category)
    }
}

/// Replaces each categorical field with one `Float64` indicator per fitted category.
///
/// Values outside the vocabulary (and nulls) encode as all zeros. Output
/// columns: every non-categorical column in input order, then indicators in
/// field order and sorted category order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoricalEncoder {
    vocabularies: Vec<FieldVocabulary>,
    is_fitted: bool,
}

impl CategoricalEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sorted vocabulary for a field
    pub fn categories(&self, field: &str) -> Option<&[String]> {
        self.vocabularies
            .iter()
            .find(|v| v.field == field)
            .map(|v| v.categories.as_slice())
    }

    /// Indicator column names, in output order
    pub fn indicator_names(&self) -> Vec<String> {
        self.vocabularies
            .iter()
            .flat_map(|v| v.categories.iter().map(move |c| v.indicator_name(c)))
            .collect()
    }
}

impl Stage for CategoricalEncoder {
    fn name(&self) -> &'static str {
        "encoder"
    }

    fn fit(&mut self, df: &DataFrame, schema: &FeatureSchema) -> Result<()> {
        let mut vocabularies = Vec::with_capacity(schema.categorical().len());

        for field in schema.categorical() {
            let ca = string_column(df, field)?;
            let categories: BTreeSet<&str> = ca.into_iter().flatten().collect();
            vocabularies.push(FieldVocabulary {
                field: field.clone(),
                categories: categories.into_iter().map(str::to_string).collect(),
            });
        }

        // indicators must not shadow each other or a surviving column
        let categorical: HashSet<&str> = schema.categorical().iter().map(String::as_str).collect();
        let mut taken: HashSet<String> = df
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .filter(|n| !categorical.contains(n.as_str()))
            .collect();
        for vocab in &vocabularies {
            for category in &vocab.categories {
                let name = vocab.indicator_name(category);
                if !taken.insert(name.clone()) {
                    return Err(TabserveError::DataError(format!(
                        "indicator column '{}' collides with an existing column",
                        name
                    )));
                }
            }
        }

        self.vocabularies = vocabularies;
        self.is_fitted = true;
        Ok(())
    }

    fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(TabserveError::not_fitted(self.name()));
        }

        let encoded_fields: HashSet<&str> = self.vocabularies.iter().map(|v| v.field.as_str()).collect();
        let mut columns: Vec<Column> = df
            .get_columns()
            .iter()
            .filter(|c| !encoded_fields.contains(c.name().as_str()))
            .cloned()
            .collect();

        for vocab in &self.vocabularies {
            let ca = string_column(df, &vocab.field)?;

            let novel = ca
                .into_iter()
                .flatten()
                .filter(|v| vocab.categories.binary_search_by(|c| c.as_str().cmp(v)).is_err())
                .count();
            if novel > 0 {
                debug!(field = %vocab.field, count = novel, "Unseen categories encoded as all zeros");
            }

            for category in &vocab.categories {
                let indicator: Float64Chunked = ca
                    .into_iter()
                    .map(|opt| Some(if opt == Some(category.as_str()) { 1.0 } else { 0.0 }))
                    .collect();
                columns.push(
                    indicator
                        .with_name(vocab.indicator_name(category).into())
                        .into_series()
                        .into(),
                );
            }
        }

        Ok(DataFrame::new(columns)?)
    }

    fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::float_column;

    fn schema() -> FeatureSchema {
        FeatureSchema::new(["Age"], ["Region"], "Approved")
    }

    fn train() -> DataFrame {
        df!(
            "Age" => &[30.0, 40.0, 50.0],
            "Region" => &["South", "North", "South"],
        )
        .unwrap()
    }

    #[test]
    fn test_sorted_vocabulary_and_layout() {
        let mut encoder = CategoricalEncoder::new();
        let out = encoder.fit_transform(&train(), &schema()).unwrap();

        assert_eq!(encoder.categories("Region").unwrap(), &["North", "South"]);
        let names: Vec<String> = out.get_column_names().iter().map(|s| s.to_string()).collect();
        assert_eq!(names, vec!["Age", "Region_North", "Region_South"]);

        let south: Vec<f64> = float_column(&out, "Region_South").unwrap().into_no_null_iter().collect();
        assert_eq!(south, vec![1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_unseen_category_is_all_zeros() {
        let mut encoder = CategoricalEncoder::new();
        encoder.fit(&train(), &schema()).unwrap();

        let serve = df!("Age" => &[1.0], "Region" => &["East"]).unwrap();
        let out = encoder.transform(&serve).unwrap();

        assert_eq!(out.width(), 3);
        assert_eq!(float_column(&out, "Region_North").unwrap().get(0), Some(0.0));
        assert_eq!(float_column(&out, "Region_South").unwrap().get(0), Some(0.0));
    }

    #[test]
    fn test_indicator_collision_rejected() {
        let schema = FeatureSchema::new(["Region_North"], ["Region"], "Approved");
        let df = df!("Region_North" => &[1.0], "Region" => &["North"]).unwrap();

        let err = CategoricalEncoder::new().fit(&df, &schema).unwrap_err();
        assert!(matches!(err, TabserveError::DataError(_)));
    }

    #[test]
    fn test_indicator_names() {
        let mut encoder = CategoricalEncoder::new();
        encoder.fit(&train(), &schema()).unwrap();
        assert_eq!(encoder.indicator_names(), vec!["Region_North", "Region_South"]);
    }
}
