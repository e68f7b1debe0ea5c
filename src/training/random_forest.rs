//! Random Forest classifier

use super::decision_tree::{class_position, majority, sorted_classes, Criterion, DecisionTree};
use crate::error::{Result, TabserveError};
use ndarray::{Array1, Array2};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Bagged ensemble of [`DecisionTree`]s voting on class labels.
///
/// Every tree is fitted on its own bootstrap sample with its own seed derived
/// from `random_state`, so a fixed seed gives the same forest on any thread count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Candidate features drawn at every split
    pub max_features: MaxFeatures,
    /// Sample rows with replacement per tree; otherwise every tree sees all rows
    pub bootstrap: bool,
    pub criterion: Criterion,
    pub random_state: Option<u64>,
    feature_importances: Option<Array1<f64>>,
    n_features: usize,
    classes: Vec<f64>,
}

/// How many features each split considers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// `ceil(sqrt(n_features))`
    Sqrt,
    /// `ceil(log2(n_features))`
    Log2,
    Fixed(usize),
    All,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForest {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            criterion: Criterion::Gini,
            random_state: None,
            feature_importances: None,
            n_features: 0,
            classes: Vec::new(),
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_min_samples_split(mut self, n: usize) -> Self {
        self.min_samples_split = n;
        self
    }

    pub fn with_min_samples_leaf(mut self, n: usize) -> Self {
        self.min_samples_leaf = n;
        self
    }

    pub fn with_max_features(mut self, strategy: MaxFeatures) -> Self {
        self.max_features = strategy;
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    fn split_candidates(&self, n_features: usize) -> usize {
        match self.max_features {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().ceil() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().ceil() as usize,
            MaxFeatures::Fixed(n) => n.min(n_features),
            MaxFeatures::All => n_features,
        }
        .max(1)
    }

    /// Fit every tree in parallel; the first tree error aborts the fit
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(TabserveError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(TabserveError::TrainingError("cannot fit a forest on zero samples".to_string()));
        }
        if self.n_estimators == 0 {
            return Err(TabserveError::InvalidParameter {
                name: "n_estimators".to_string(),
                value: "0".to_string(),
                reason: "a forest needs at least one tree".to_string(),
            });
        }

        self.n_features = n_features;
        self.classes = sorted_classes(y);
        let max_features = self.split_candidates(n_features);
        let base_seed = self.random_state.unwrap_or(42);

        // each tree owns its seed, so the result does not depend on thread scheduling
        let trees: Vec<DecisionTree> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let seed = base_seed.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);

                let sample_indices: Vec<usize> = if self.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };

                let x_boot = x.select(ndarray::Axis(0), &sample_indices);
                let y_boot: Array1<f64> = sample_indices.iter().map(|&i| y[i]).collect();

                let mut tree = DecisionTree::new()
                    .with_min_samples_split(self.min_samples_split)
                    .with_min_samples_leaf(self.min_samples_leaf)
                    .with_criterion(self.criterion)
                    .with_random_state(rng.gen());
                if let Some(d) = self.max_depth {
                    tree = tree.with_max_depth(d);
                }
                tree.max_features = Some(max_features);

                tree.fit(&x_boot, &y_boot)?;
                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;

        self.trees = trees;
        self.compute_feature_importances();
        Ok(self)
    }

    /// Summed tree importances, normalized to 1 when any split was made
    fn compute_feature_importances(&mut self) {
        let mut summed = Array1::<f64>::zeros(self.n_features);
        for importances in self.trees.iter().filter_map(|t| t.feature_importances()) {
            summed += importances;
        }

        let total = summed.sum();
        if total > 0.0 {
            summed /= total;
        }
        self.feature_importances = Some(summed);
    }

    /// Per-row vote counts, columns in `classes()` order
    fn votes(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.trees.is_empty() {
            return Err(TabserveError::not_fitted("random_forest"));
        }

        let per_tree: Vec<Array1<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<Vec<_>>>()?;

        let mut votes = Array2::zeros((x.nrows(), self.classes.len()));
        for labels in &per_tree {
            for (i, &label) in labels.iter().enumerate() {
                if let Some(class_idx) = class_position(&self.classes, label) {
                    votes[[i, class_idx]] += 1.0;
                }
            }
        }
        Ok(votes)
    }

    /// Majority vote across trees; ties go to the smallest class label
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let votes = self.votes(x)?;

        let predictions = votes
            .rows()
            .into_iter()
            .map(|row| {
                let counts: Vec<usize> = row.iter().map(|&v| v as usize).collect();
                self.classes[majority(&counts)]
            })
            .collect();

        Ok(predictions)
    }

    /// Fraction of trees voting for each class
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let votes = self.votes(x)?;
        Ok(votes / self.trees.len() as f64)
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    /// Run [`DecisionTree::check_structure`] on every tree and check tree widths agree
    pub fn check_structure(&self) -> Result<()> {
        if self.trees.is_empty() {
            return Err(TabserveError::not_fitted("random_forest"));
        }
        for tree in &self.trees {
            if tree.n_features() != self.n_features {
                return Err(TabserveError::ShapeError {
                    expected: format!("{} tree inputs", self.n_features),
                    actual: format!("{} tree inputs", tree.n_features()),
                });
            }
            tree.check_structure()?;
        }
        Ok(())
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}
