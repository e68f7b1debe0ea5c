//! Pipeline configuration

use crate::error::{Result, TabserveError};
use crate::training::ClassifierConfig;
use serde::{Deserialize, Serialize};

/// Configuration for the preprocessing pipeline and its classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Lower clipping percentile, in [0, 100)
    pub outlier_lower_percentile: f64,

    /// Upper clipping percentile, in (0, 100]
    pub outlier_upper_percentile: f64,

    /// Hyper-parameters handed to the classifier
    pub classifier: ClassifierConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            outlier_lower_percentile: 1.0,
            outlier_upper_percentile: 99.0,
            classifier: ClassifierConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outlier_percentiles(mut self, lower: f64, upper: f64) -> Self {
        self.outlier_lower_percentile = lower;
        self.outlier_upper_percentile = upper;
        self
    }

    pub fn with_classifier(mut self, classifier: ClassifierConfig) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let (lo, hi) = (self.outlier_lower_percentile, self.outlier_upper_percentile);
        if !(0.0..=100.0).contains(&lo) || !(0.0..=100.0).contains(&hi) || lo >= hi {
            return Err(TabserveError::InvalidParameter {
                name: "outlier_percentiles".to_string(),
                value: format!("({}, {})", lo, hi),
                reason: "need 0 <= lower < upper <= 100".to_string(),
            });
        }
        self.classifier.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.outlier_lower_percentile, 1.0);
        assert_eq!(config.outlier_upper_percentile, 99.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_percentile_validation() {
        assert!(PipelineConfig::new().with_outlier_percentiles(5.0, 5.0).validate().is_err());
        assert!(PipelineConfig::new().with_outlier_percentiles(-1.0, 50.0).validate().is_err());
        assert!(PipelineConfig::new().with_outlier_percentiles(0.0, 100.0).validate().is_ok());
    }
}
