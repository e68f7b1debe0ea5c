//! Classifier configuration

use crate::error::{Result, TabserveError};
use serde::{Deserialize, Serialize};

/// Type of classifier to train
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    /// Single decision tree
    DecisionTree,
    /// Bagged ensemble of decision trees
    RandomForest,
}

/// Classifier hyper-parameters.
///
/// Passed through to the model untouched; the preprocessing pipeline never
/// interprets them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Model type to train
    pub model_type: ModelType,

    /// Number of trees (random forest only)
    pub n_estimators: usize,

    /// Maximum depth of each tree (None = grow until pure)
    pub max_depth: Option<usize>,

    /// Minimum samples required to split a node
    pub min_samples_split: usize,

    /// Minimum samples per leaf
    pub min_samples_leaf: usize,

    /// Random seed for reproducibility
    pub random_state: Option<u64>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_type: ModelType::RandomForest,
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            random_state: Some(42),
        }
    }
}

impl ClassifierConfig {
    pub fn new(model_type: ModelType) -> Self {
        Self {
            model_type,
            ..Self::default()
        }
    }

    pub fn with_n_estimators(mut self, n_estimators: usize) -> Self {
        self.n_estimators = n_estimators;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.model_type == ModelType::RandomForest && self.n_estimators == 0 {
            return Err(TabserveError::InvalidParameter {
                name: "n_estimators".to_string(),
                value: "0".to_string(),
                reason: "a forest needs at least one tree".to_string(),
            });
        }
        if self.max_depth == Some(0) {
            return Err(TabserveError::InvalidParameter {
                name: "max_depth".to_string(),
                value: "0".to_string(),
                reason: "depth must be at least 1".to_string(),
            });
        }
        if self.min_samples_split < 2 {
            return Err(TabserveError::InvalidParameter {
                name: "min_samples_split".to_string(),
                value: self.min_samples_split.to_string(),
                reason: "must be at least 2".to_string(),
            });
        }
        if self.min_samples_leaf == 0 {
            return Err(TabserveError::InvalidParameter {
                name: "min_samples_leaf".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
