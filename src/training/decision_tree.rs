//! Decision tree classifier

use crate::error::{Result, TabserveError};
use ndarray::{Array1, Array2};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Majority class of the samples that reached this node
    Leaf {
        value: f64,
        n_samples: usize,
    },
    /// Rows with `x[feature_idx] <= threshold` go left
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Criterion {
    Gini,
    Entropy,
}

/// CART classification tree over `f64` class labels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features drawn at random per split (None = all)
    pub max_features: Option<usize>,
    pub criterion: Criterion,
    /// Seed for the per-split feature draw
    pub random_state: Option<u64>,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
    /// Sorted class labels seen at fit
    classes: Vec<f64>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-fit context shared by the recursive builder
struct FitContext<'a> {
    x: &'a Array2<f64>,
    class_idx: &'a [usize],
    n_classes: usize,
}

impl DecisionTree {
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion: Criterion::Gini,
            random_state: None,
            n_features: 0,
            feature_importances: None,
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

    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Grow the tree on `x` (rows are samples) and integer-valued labels `y`
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
            return Err(TabserveError::TrainingError("cannot fit a tree on zero samples".to_string()));
        }

        self.n_features = n_features;
        self.classes = sorted_classes(y);

        let class_idx: Vec<usize> = y
            .iter()
            .map(|v| class_position(&self.classes, *v).unwrap_or(0))
            .collect();

        let ctx = FitContext {
            x,
            class_idx: &class_idx,
            n_classes: self.classes.len(),
        };

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state.unwrap_or(0));
        let mut importances = vec![0.0; n_features];
        let indices: Vec<usize> = (0..n_samples).collect();
        let root = self.build_tree(&ctx, &indices, 0, &mut importances, &mut rng);
        self.root = Some(root);

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(self)
    }

    fn build_tree(
        &self,
        ctx: &FitContext<'_>,
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = indices.len();
        let counts = class_counts(ctx, indices);

        let is_pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || is_pure;

        if should_stop {
            return self.leaf(&counts, n_samples);
        }

        let candidates = self.draw_features(ctx.x.ncols(), rng);
        let parent_impurity = self.impurity(&counts, n_samples);

        match self.find_best_split(ctx, indices, &candidates, &counts, parent_impurity) {
            Some((feature_idx, threshold, gain)) => {
                let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
                    .iter()
                    .partition(|&&i| ctx.x[[i, feature_idx]] <= threshold);

                importances[feature_idx] += n_samples as f64 * gain;

                let left = Box::new(self.build_tree(ctx, &left_indices, depth + 1, importances, rng));
                let right = Box::new(self.build_tree(ctx, &right_indices, depth + 1, importances, rng));

                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                    n_samples,
                    impurity: parent_impurity,
                }
            }
            None => self.leaf(&counts, n_samples),
        }
    }

    fn draw_features(&self, n_features: usize, rng: &mut ChaCha8Rng) -> Vec<usize> {
        let mut features: Vec<usize> = (0..n_features).collect();
        if let Some(k) = self.max_features {
            if k < n_features {
                features.shuffle(rng);
                features.truncate(k.max(1));
                features.sort_unstable();
            }
        }
        features
    }

    /// Scan candidate features for the split with the largest impurity decrease.
    ///
    /// Each feature is sorted once and swept left to right; thresholds sit halfway
    /// between consecutive distinct values.
    fn find_best_split(
        &self,
        ctx: &FitContext<'_>,
        indices: &[usize],
        candidates: &[usize],
        parent_counts: &[usize],
        parent_impurity: f64,
    ) -> Option<(usize, f64, f64)> {
        let n = indices.len();

        let feature_results: Vec<Option<(usize, f64, f64)>> = candidates
            .par_iter()
            .map(|&feature_idx| {
                let mut order = indices.to_vec();
                order.sort_by(|&a, &b| {
                    ctx.x[[a, feature_idx]]
                        .partial_cmp(&ctx.x[[b, feature_idx]])
                        .unwrap_or(std::cmp::Ordering::Equal)
                });

                let mut left_counts = vec![0usize; ctx.n_classes];
                let mut right_counts = parent_counts.to_vec();
                let mut best: Option<(f64, f64)> = None;

                for k in 0..n - 1 {
                    let sample = order[k];
                    let class = ctx.class_idx[sample];
                    left_counts[class] += 1;
                    right_counts[class] -= 1;

                    let value = ctx.x[[sample, feature_idx]];
                    let next_value = ctx.x[[order[k + 1], feature_idx]];
                    if next_value <= value {
                        continue;
                    }

                    let left_n = k + 1;
                    let right_n = n - left_n;
                    if left_n < self.min_samples_leaf || right_n < self.min_samples_leaf {
                        continue;
                    }

                    let weighted = (left_n as f64 * self.impurity(&left_counts, left_n)
                        + right_n as f64 * self.impurity(&right_counts, right_n))
                        / n as f64;
                    let gain = parent_impurity - weighted;

                    if gain > best.map_or(0.0, |(g, _)| g) {
                        best = Some((gain, (value + next_value) / 2.0));
                    }
                }

                best.map(|(gain, threshold)| (feature_idx, threshold, gain))
            })
            .collect();

        // first feature wins ties so the result does not depend on scheduling
        feature_results.into_iter().flatten().fold(None, |acc, cand| match acc {
            Some(best) if best.2 >= cand.2 => Some(best),
            _ => Some(cand),
        })
    }

    fn impurity(&self, counts: &[usize], n: usize) -> f64 {
        if n == 0 {
            return 0.0;
        }
        let n = n as f64;
        match self.criterion {
            Criterion::Gini => {
                1.0 - counts
                    .iter()
                    .map(|&c| (c as f64 / n).powi(2))
                    .sum::<f64>()
            }
            Criterion::Entropy => -counts
                .iter()
                .filter(|&&c| c > 0)
                .map(|&c| {
                    let p = c as f64 / n;
                    p * p.ln()
                })
                .sum::<f64>(),
        }
    }

    fn leaf(&self, counts: &[usize], n_samples: usize) -> TreeNode {
        TreeNode::Leaf {
            value: self.classes[majority(counts)],
            n_samples,
        }
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or_else(|| TabserveError::not_fitted("decision_tree"))?;

        if x.ncols() != self.n_features {
            return Err(TabserveError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }

        let predictions: Vec<f64> = x
            .rows()
            .into_iter()
            .map(|row| {
                let mut node = root;
                loop {
                    match node {
                        TreeNode::Leaf { value, .. } => break *value,
                        TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                            node = if row[*feature_idx] <= *threshold { left } else { right };
                        }
                    }
                }
            })
            .collect();

        Ok(Array1::from_vec(predictions))
    }

    pub fn is_fitted(&self) -> bool {
        self.root.is_some()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Sorted class labels seen at fit
    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    /// Impurity decrease per feature, normalized to sum to 1
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Check a fitted (possibly deserialized) tree can score `n_features`-wide input:
    /// every split reads an existing column and every leaf holds a known class.
    pub fn check_structure(&self) -> Result<()> {
        let root = self.root.as_ref().ok_or_else(|| TabserveError::not_fitted("decision_tree"))?;

        let mut pending = vec![root];
        while let Some(node) = pending.pop() {
            match node {
                TreeNode::Leaf { value, .. } => {
                    if class_position(&self.classes, *value).is_none() {
                        return Err(TabserveError::ShapeError {
                            expected: format!("leaf label in {:?}", self.classes),
                            actual: format!("leaf label {}", value),
                        });
                    }
                }
                TreeNode::Split { feature_idx, left, right, .. } => {
                    if *feature_idx >= self.n_features {
                        return Err(TabserveError::ShapeError {
                            expected: format!("split feature below {}", self.n_features),
                            actual: format!("split on feature {}", feature_idx),
                        });
                    }
                    pending.push(left);
                    pending.push(right);
                }
            }
        }
        Ok(())
    }

    /// Number of split levels between the root and the deepest leaf
    pub fn get_depth(&self) -> usize {
        fn depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + depth(left).max(depth(right)),
            }
        }
        self.root.as_ref().map_or(0, depth)
    }
}

pub(crate) fn sorted_classes(y: &Array1<f64>) -> Vec<f64> {
    let mut classes: Vec<f64> = y.iter().copied().collect();
    classes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    classes.dedup();
    classes
}

pub(crate) fn class_position(classes: &[f64], value: f64) -> Option<usize> {
    classes.iter().position(|&c| (c - value).abs() < 1e-9)
}

/// Index of the largest count; ties go to the lowest index (smallest label)
pub(crate) fn majority(counts: &[usize]) -> usize {
    let mut best = 0;
    for (idx, &count) in counts.iter().enumerate() {
        if count > counts[best] {
            best = idx;
        }
    }
    best
}

fn class_counts(ctx: &FitContext<'_>, indices: &[usize]) -> Vec<usize> {
    let mut counts = vec![0usize; ctx.n_classes];
    for &i in indices {
        counts[ctx.class_idx[i]] += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classifier_simple() {
        let x = array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new();
        tree.fit(&x, &y).unwrap();

        let predictions = tree.predict(&x).unwrap();
        assert_eq!(predictions.to_vec(), y.to_vec());
    }

    #[test]
    fn test_entropy_criterion() {
        let x = array![[0.5], [1.5], [2.5], [3.5], [4.5], [5.5]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 2.0];

        let mut tree = DecisionTree::new().with_criterion(Criterion::Entropy);
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.predict(&x).unwrap(), y);
        assert_eq!(tree.classes(), &[0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_max_depth() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]];
        let y = array![0.0, 1.0, 0.0, 1.0];

        let mut tree = DecisionTree::new().with_max_depth(2);
        tree.fit(&x, &y).unwrap();

        assert!(tree.get_depth() <= 2);
    }

    #[test]
    fn test_feature_importances() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new();
        tree.fit(&x, &y).unwrap();

        let importances = tree.feature_importances().unwrap();
        assert!((importances[0] - 1.0).abs() < 1e-12);
        assert_eq!(importances[1], 0.0);
    }

    #[test]
    fn test_single_sample_is_a_leaf() {
        let x = array![[5.0]];
        let y = array![3.0];

        let mut tree = DecisionTree::new();
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.predict(&array![[100.0]]).unwrap().to_vec(), vec![3.0]);
    }

    #[test]
    fn test_predict_before_fit() {
        let tree = DecisionTree::new();
        let err = tree.predict(&array![[1.0]]).unwrap_err();
        assert!(matches!(err, TabserveError::NotFitted { .. }));
    }

    #[test]
    fn test_predict_wrong_width() {
        let mut tree = DecisionTree::new();
        tree.fit(&array![[0.0, 1.0], [1.0, 0.0]], &array![0.0, 1.0]).unwrap();
        assert!(matches!(
            tree.predict(&array![[1.0]]),
            Err(TabserveError::ShapeError { .. })
        ));
    }

    #[test]
    fn test_check_structure() {
        let mut tree = DecisionTree::new();
        tree.fit(&array![[0.0, 1.0], [1.0, 0.0]], &array![0.0, 1.0]).unwrap();
        assert!(tree.check_structure().is_ok());

        if let Some(TreeNode::Split { feature_idx, .. }) = tree.root.as_mut() {
            *feature_idx = 7;
        }
        assert!(matches!(tree.check_structure(), Err(TabserveError::ShapeError { .. })));

        assert!(DecisionTree::new().check_structure().is_err());
    }

    #[test]
    fn test_majority_tie_prefers_smallest() {
        assert_eq!(majority(&[2, 2, 1]), 0);
        assert_eq!(majority(&[1, 3, 3]), 1);
    }
}
