//! Classifier training
//!
//! The downstream classifier is an opaque estimator with `fit(matrix, labels)`
//! and `predict(matrix)`. Two tree models are available: a single
//! [`DecisionTree`] and a bagged [`RandomForest`].

mod config;
pub mod decision_tree;
pub mod random_forest;

pub use config::{ClassifierConfig, ModelType};
pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use random_forest::{MaxFeatures, RandomForest};

use crate::error::Result;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Common interface for classifiers fed by the preprocessing pipeline
pub trait Classifier {
    /// Fit on a numeric feature matrix and integer class labels
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Predict one class label per row
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Check if model is fitted
    fn is_fitted(&self) -> bool;
}

/// A trained classifier, serialized alongside the fitted pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierModel {
    DecisionTree(DecisionTree),
    RandomForest(RandomForest),
}

impl ClassifierModel {
    /// Build an untrained model from its configuration
    pub fn from_config(config: &ClassifierConfig) -> Result<Self> {
        config.validate()?;

        let model = match config.model_type {
            ModelType::DecisionTree => {
                let mut tree = DecisionTree::new()
                    .with_min_samples_split(config.min_samples_split)
                    .with_min_samples_leaf(config.min_samples_leaf);
                if let Some(depth) = config.max_depth {
                    tree = tree.with_max_depth(depth);
                }
                if let Some(seed) = config.random_state {
                    tree = tree.with_random_state(seed);
                }
                ClassifierModel::DecisionTree(tree)
            }
            ModelType::RandomForest => {
                let mut forest = RandomForest::new(config.n_estimators)
                    .with_min_samples_split(config.min_samples_split)
                    .with_min_samples_leaf(config.min_samples_leaf);
                if let Some(depth) = config.max_depth {
                    forest = forest.with_max_depth(depth);
                }
                if let Some(seed) = config.random_state {
                    forest = forest.with_random_state(seed);
                }
                ClassifierModel::RandomForest(forest)
            }
        };
        Ok(model)
    }

    pub fn model_type(&self) -> ModelType {
        match self {
            ClassifierModel::DecisionTree(_) => ModelType::DecisionTree,
            ClassifierModel::RandomForest(_) => ModelType::RandomForest,
        }
    }

    /// Number of columns the model was trained on
    pub fn n_features(&self) -> usize {
        match self {
            ClassifierModel::DecisionTree(m) => m.n_features(),
            ClassifierModel::RandomForest(m) => m.n_features(),
        }
    }

    /// Reject fitted models whose nodes could index past the input width
    pub fn check_structure(&self) -> Result<()> {
        match self {
            ClassifierModel::DecisionTree(m) => m.check_structure(),
            ClassifierModel::RandomForest(m) => m.check_structure(),
        }
    }

    pub fn classes(&self) -> &[f64] {
        match self {
            ClassifierModel::DecisionTree(m) => m.classes(),
            ClassifierModel::RandomForest(m) => m.classes(),
        }
    }

    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        match self {
            ClassifierModel::DecisionTree(m) => m.feature_importances(),
            ClassifierModel::RandomForest(m) => m.feature_importances(),
        }
    }
}

impl Classifier for ClassifierModel {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        match self {
            ClassifierModel::DecisionTree(m) => m.fit(x, y).map(|_| ()),
            ClassifierModel::RandomForest(m) => m.fit(x, y).map(|_| ()),
        }
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            ClassifierModel::DecisionTree(m) => m.predict(x),
            ClassifierModel::RandomForest(m) => m.predict(x),
        }
    }

    fn is_fitted(&self) -> bool {
        match self {
            ClassifierModel::DecisionTree(m) => m.is_fitted(),
            ClassifierModel::RandomForest(m) => m.is_fitted(),
        }
    }
}
