//! Decision tree regressor (CART)

use super::models::{check_fit_input, check_predict_input, unknown_param, Regressor};
use super::params::{ParamValue, Params};
use crate::error::{Result, TrainerError};
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fmt;
use std::str::FromStr;

/// Smallest impurity decrease that still counts as a split
const MIN_GAIN: f64 = 1e-12;

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf {
        value: f64,
        n_samples: usize,
    },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        gain: f64,
    },
}

/// Split quality criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Criterion {
    /// Variance reduction
    SquaredError,
    /// Friedman's improvement score on mean differences
    FriedmanMse,
    /// Absolute deviation around the median
    AbsoluteError,
    /// Half Poisson deviance (non-negative targets)
    Poisson,
}

impl Criterion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Criterion::SquaredError => "squared_error",
            Criterion::FriedmanMse => "friedman_mse",
            Criterion::AbsoluteError => "absolute_error",
            Criterion::Poisson => "poisson",
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Criterion {
    type Err = TrainerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "squared_error" => Ok(Criterion::SquaredError),
            "friedman_mse" => Ok(Criterion::FriedmanMse),
            "absolute_error" => Ok(Criterion::AbsoluteError),
            "poisson" => Ok(Criterion::Poisson),
            other => Err(TrainerError::invalid_param(
                "criterion",
                other,
                "expected squared_error, friedman_mse, absolute_error or poisson",
            )),
        }
    }
}

/// Best split found for one node
#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

/// Mutable state threaded through the recursive build
struct BuildContext<'a> {
    x: &'a Array2<f64>,
    y: &'a Array1<f64>,
    rng: ChaCha8Rng,
    importances: Vec<f64>,
}

/// Decision tree regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeRegressor {
    /// Tree root
    root: Option<TreeNode>,
    /// Split criterion
    pub criterion: Criterion,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features considered per split (all when None)
    pub max_features: Option<usize>,
    /// Seed for feature sampling
    pub random_state: Option<u64>,
    /// Number of features seen during fit
    n_features: usize,
    /// Feature importances
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTreeRegressor {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTreeRegressor {
    /// Create a new regressor tree with squared-error splits
    pub fn new() -> Self {
        Self {
            root: None,
            criterion: Criterion::SquaredError,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            random_state: None,
            n_features: 0,
            feature_importances: None,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Set criterion
    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Set number of features sampled per split
    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features);
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    fn validate(&self, y: &Array1<f64>) -> Result<()> {
        if self.min_samples_split < 2 {
            return Err(TrainerError::invalid_param(
                "min_samples_split",
                self.min_samples_split,
                "must be at least 2",
            ));
        }
        if self.min_samples_leaf < 1 {
            return Err(TrainerError::invalid_param(
                "min_samples_leaf",
                self.min_samples_leaf,
                "must be at least 1",
            ));
        }
        if self.max_features == Some(0) {
            return Err(TrainerError::invalid_param(
                "max_features",
                0,
                "must be at least 1",
            ));
        }
        if self.criterion == Criterion::Poisson {
            if y.iter().any(|&v| v < 0.0) {
                return Err(TrainerError::DataError(
                    "poisson criterion requires non-negative targets".to_string(),
                ));
            }
            if y.sum() <= 0.0 {
                return Err(TrainerError::DataError(
                    "poisson criterion requires a positive target sum".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn build_tree(&self, ctx: &mut BuildContext<'_>, indices: &[usize], depth: usize) -> TreeNode {
        let n_samples = indices.len();

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || is_pure(ctx.y, indices);

        if should_stop {
            return self.leaf(ctx.y, indices);
        }

        let features = self.sample_features(&mut ctx.rng, ctx.x.ncols());
        let Some(split) = self.find_best_split(ctx.x, ctx.y, indices, &features) else {
            return self.leaf(ctx.y, indices);
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| ctx.x[[i, split.feature_idx]] <= split.threshold);
        if left_indices.is_empty() || right_indices.is_empty() {
            return self.leaf(ctx.y, indices);
        }

        ctx.importances[split.feature_idx] += split.gain;

        let left = Box::new(self.build_tree(ctx, &left_indices, depth + 1));
        let right = Box::new(self.build_tree(ctx, &right_indices, depth + 1));

        TreeNode::Split {
            feature_idx: split.feature_idx,
            threshold: split.threshold,
            left,
            right,
            n_samples,
            gain: split.gain,
        }
    }

    fn leaf(&self, y: &Array1<f64>, indices: &[usize]) -> TreeNode {
        let values: Vec<f64> = indices.iter().map(|&i| y[i]).collect();
        let value = match self.criterion {
            Criterion::AbsoluteError => median(&values),
            _ => mean(&values),
        };
        TreeNode::Leaf {
            value,
            n_samples: indices.len(),
        }
    }

    fn sample_features(&self, rng: &mut ChaCha8Rng, n_features: usize) -> Vec<usize> {
        let mut features: Vec<usize> = (0..n_features).collect();
        if let Some(k) = self.max_features {
            if k < n_features {
                features.shuffle(rng);
                features.truncate(k);
                features.sort_unstable();
            }
        }
        features
    }

    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        features: &[usize],
    ) -> Option<SplitCandidate> {
        // Each feature independently finds its best threshold
        let per_feature: Vec<Option<SplitCandidate>> = features
            .par_iter()
            .map(|&feature_idx| {
                let mut pairs: Vec<(f64, f64)> =
                    indices.iter().map(|&i| (x[[i, feature_idx]], y[i])).collect();
                pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
                self.best_threshold(feature_idx, &pairs)
            })
            .collect();

        // Earliest feature wins ties
        let mut best: Option<SplitCandidate> = None;
        for candidate in per_feature.into_iter().flatten() {
            if best.map_or(true, |b| candidate.gain > b.gain) {
                best = Some(candidate);
            }
        }
        best
    }

    /// Sweep the sorted (feature value, target) pairs of one feature
    fn best_threshold(&self, feature_idx: usize, pairs: &[(f64, f64)]) -> Option<SplitCandidate> {
        let n = pairs.len();
        let total_sum: f64 = pairs.iter().map(|p| p.1).sum();
        // prefix_abs[i]: deviation of the first i targets, suffix_abs[j]: of the last j
        let (prefix_abs, suffix_abs) = match self.criterion {
            Criterion::AbsoluteError => (
                running_abs_deviation(pairs.iter().map(|p| p.1)),
                running_abs_deviation(pairs.iter().rev().map(|p| p.1)),
            ),
            _ => (Vec::new(), Vec::new()),
        };

        let mut best: Option<SplitCandidate> = None;
        let mut left_sum = 0.0;

        for i in 1..n {
            left_sum += pairs[i - 1].1;

            if pairs[i - 1].0 == pairs[i].0 {
                continue;
            }
            let n_left = i;
            let n_right = n - i;
            if n_left < self.min_samples_leaf || n_right < self.min_samples_leaf {
                continue;
            }

            let right_sum = total_sum - left_sum;
            let gain = match self.criterion {
                Criterion::SquaredError => {
                    left_sum * left_sum / n_left as f64
                        + right_sum * right_sum / n_right as f64
                        - total_sum * total_sum / n as f64
                }
                Criterion::FriedmanMse => {
                    let diff = left_sum / n_left as f64 - right_sum / n_right as f64;
                    (n_left * n_right) as f64 / n as f64 * diff * diff
                }
                Criterion::Poisson => {
                    if left_sum <= 0.0 || right_sum <= 0.0 {
                        continue;
                    }
                    left_sum * (left_sum / n_left as f64).ln()
                        + right_sum * (right_sum / n_right as f64).ln()
                        - total_sum * (total_sum / n as f64).ln()
                }
                Criterion::AbsoluteError => prefix_abs[n] - prefix_abs[n_left] - suffix_abs[n_right],
            };

            if gain > MIN_GAIN && best.map_or(true, |b| gain > b.gain) {
                best = Some(SplitCandidate {
                    feature_idx,
                    threshold: split_threshold(pairs[i - 1].0, pairs[i].0),
                    gain,
                });
            }
        }

        best
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Number of features seen during fit
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Get tree depth (a single leaf has depth 0)
    pub fn get_depth(&self) -> usize {
        fn node_depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + node_depth(left).max(node_depth(right)),
            }
        }
        self.root.as_ref().map_or(0, node_depth)
    }

    /// Get number of leaves
    pub fn get_n_leaves(&self) -> usize {
        fn count_leaves(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => count_leaves(left) + count_leaves(right),
            }
        }
        self.root.as_ref().map_or(0, count_leaves)
    }

    pub(crate) fn predict_row(&self, row: ArrayView1<'_, f64>) -> Result<f64> {
        let mut node = self.root.as_ref().ok_or(TrainerError::ModelNotFitted)?;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return Ok(*value),
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    node = if row[*feature_idx] <= *threshold { left } else { right };
                }
            }
        }
    }
}

impl Regressor for DecisionTreeRegressor {
    fn algorithm(&self) -> &'static str {
        "DecisionTreeRegressor"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        self.validate(y)?;

        let n_features = x.ncols();
        let mut ctx = BuildContext {
            x,
            y,
            rng: match self.random_state {
                Some(seed) => ChaCha8Rng::seed_from_u64(seed),
                None => ChaCha8Rng::from_entropy(),
            },
            importances: vec![0.0; n_features],
        };

        let indices: Vec<usize> = (0..x.nrows()).collect();
        let root = self.build_tree(&mut ctx, &indices, 0);

        // Normalize feature importances
        let mut importances = ctx.importances;
        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }

        self.root = Some(root);
        self.n_features = n_features;
        self.feature_importances = Some(Array1::from_vec(importances));
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.root.is_none() {
            return Err(TrainerError::ModelNotFitted);
        }
        check_predict_input(self.n_features, x)?;

        x.rows()
            .into_iter()
            .map(|row| self.predict_row(row))
            .collect::<Result<Vec<f64>>>()
            .map(Array1::from_vec)
    }

    fn is_fitted(&self) -> bool {
        self.root.is_some()
    }

    fn params(&self) -> Params {
        Params::new()
            .with("criterion", self.criterion.as_str())
            .with("max_depth", optional(self.max_depth))
            .with("min_samples_split", self.min_samples_split)
            .with("min_samples_leaf", self.min_samples_leaf)
            .with("max_features", optional(self.max_features))
            .with("random_state", optional(self.random_state.map(|s| s as usize)))
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "criterion" => self.criterion = value.expect_str(name)?.parse()?,
            "max_depth" => self.max_depth = value.expect_optional_usize(name)?,
            "min_samples_split" => self.min_samples_split = value.expect_usize(name)?,
            "min_samples_leaf" => self.min_samples_leaf = value.expect_usize(name)?,
            "max_features" => self.max_features = value.expect_optional_usize(name)?,
            "random_state" => {
                self.random_state = value.expect_optional_usize(name)?.map(|s| s as u64)
            }
            _ => return Err(unknown_param(self.algorithm(), name, value)),
        }
        Ok(())
    }

    fn clone_unfitted(&self) -> Self {
        Self {
            root: None,
            n_features: 0,
            feature_importances: None,
            ..self.clone()
        }
    }
}

/// `ParamValue` for an optional count, `"none"` when unset
pub(crate) fn optional(value: Option<usize>) -> ParamValue {
    match value {
        Some(v) => ParamValue::from(v),
        None => ParamValue::from("none"),
    }
}

fn is_pure(y: &Array1<f64>, indices: &[usize]) -> bool {
    match indices.first() {
        None => true,
        Some(&first) => indices.iter().all(|&i| (y[i] - y[first]).abs() < 1e-12),
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Threshold strictly below `hi` so rows at `hi` always go right.
///
/// The midpoint of adjacent floats can round up to `hi`, and a huge pair can
/// overflow; both fall back to `lo`.
fn split_threshold(lo: f64, hi: f64) -> f64 {
    let mid = (lo + hi) / 2.0;
    if mid >= hi || !mid.is_finite() {
        lo
    } else {
        mid
    }
}

/// Heap entry ordered by value
#[derive(Debug, Clone, Copy)]
struct HeapValue(f64);

impl PartialEq for HeapValue {
    fn eq(&self, other: &Self) -> bool { self.0 == other.0 }
}
impl Eq for HeapValue {}
impl PartialOrd for HeapValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}
impl Ord for HeapValue {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.partial_cmp(&other.0).unwrap_or(Ordering::Equal)
    }
}

/// Sum of absolute deviations from the median for every prefix of `values`.
///
/// Entry `k` covers the first `k` values. Two heaps hold the lower and upper
/// halves with their sums, so each step costs O(log n).
fn running_abs_deviation(values: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut lower: BinaryHeap<HeapValue> = BinaryHeap::new();
    let mut upper: BinaryHeap<Reverse<HeapValue>> = BinaryHeap::new();
    let (mut lower_sum, mut upper_sum) = (0.0, 0.0);
    let mut costs = vec![0.0];

    for v in values {
        if lower.peek().map_or(true, |top| v <= top.0) {
            lower.push(HeapValue(v));
            lower_sum += v;
        } else {
            upper.push(Reverse(HeapValue(v)));
            upper_sum += v;
        }

        // Keep |lower| == |upper| or |lower| == |upper| + 1
        if lower.len() > upper.len() + 1 {
            if let Some(HeapValue(moved)) = lower.pop() {
                lower_sum -= moved;
                upper_sum += moved;
                upper.push(Reverse(HeapValue(moved)));
            }
        } else if upper.len() > lower.len() {
            if let Some(Reverse(HeapValue(moved))) = upper.pop() {
                upper_sum -= moved;
                lower_sum += moved;
                lower.push(HeapValue(moved));
            }
        }

        let m = lower.peek().map_or(0.0, |top| top.0);
        let cost = (m * lower.len() as f64 - lower_sum) + (upper_sum - m * upper.len() as f64);
        costs.push(cost.max(0.0));
    }

    costs
}
