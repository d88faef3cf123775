//! AdaBoost.R2 regressor
//!
//! Each round fits a shallow tree on a weighted bootstrap of the training
//! rows, measures the normalized per-sample loss, and shifts weight toward
//! the rows it predicted worst. Prediction is the weighted median of the
//! tree outputs.

use super::decision_tree::{optional, DecisionTreeRegressor};
use super::models::{check_fit_input, check_predict_input, unknown_param, Regressor};
use super::params::{ParamValue, Params};
use crate::error::{Result, TrainerError};
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Depth of every boosted tree
const BASE_TREE_DEPTH: usize = 3;

/// Per-sample loss used to reweight rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoostLoss {
    Linear,
    Square,
    Exponential,
}

impl BoostLoss {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoostLoss::Linear => "linear",
            BoostLoss::Square => "square",
            BoostLoss::Exponential => "exponential",
        }
    }

    /// Map an error already scaled into [0, 1]
    fn apply(&self, scaled_error: f64) -> f64 {
        match self {
            BoostLoss::Linear => scaled_error,
            BoostLoss::Square => scaled_error * scaled_error,
            BoostLoss::Exponential => 1.0 - (-scaled_error).exp(),
        }
    }
}

impl fmt::Display for BoostLoss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BoostLoss {
    type Err = TrainerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "linear" => Ok(BoostLoss::Linear),
            "square" => Ok(BoostLoss::Square),
            "exponential" => Ok(BoostLoss::Exponential),
            other => Err(TrainerError::invalid_param(
                "loss",
                other,
                "expected linear, square or exponential",
            )),
        }
    }
}

/// AdaBoost regressor (AdaBoost.R2)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaBoostRegressor {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub loss: BoostLoss,
    pub random_state: Option<u64>,
    trees: Vec<DecisionTreeRegressor>,
    tree_weights: Vec<f64>,
    n_features: usize,
}

impl Default for AdaBoostRegressor {
    fn default() -> Self {
        Self::new(50, 1.0)
    }
}

impl AdaBoostRegressor {
    pub fn new(n_estimators: usize, learning_rate: f64) -> Self {
        Self {
            n_estimators,
            learning_rate,
            loss: BoostLoss::Linear,
            random_state: Some(42),
            trees: Vec::new(),
            tree_weights: Vec::new(),
            n_features: 0,
        }
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_loss(mut self, loss: BoostLoss) -> Self {
        self.loss = loss;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Number of trees kept after early termination
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn tree_weights(&self) -> &[f64] {
        &self.tree_weights
    }

    /// Draw `n` row indices with probability proportional to `weights`
    fn weighted_bootstrap(weights: &Array1<f64>, rng: &mut ChaCha8Rng) -> Vec<usize> {
        let n = weights.len();
        let cdf: Vec<f64> = weights
            .iter()
            .scan(0.0, |acc, &w| {
                *acc += w;
                Some(*acc)
            })
            .collect();
        let total = cdf.last().copied().unwrap_or(0.0);

        (0..n)
            .map(|_| {
                let u = rng.gen::<f64>() * total;
                cdf.partition_point(|&c| c <= u).min(n - 1)
            })
            .collect()
    }
}

impl Regressor for AdaBoostRegressor {
    fn algorithm(&self) -> &'static str {
        "AdaBoostRegressor"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        if self.n_estimators == 0 {
            return Err(TrainerError::invalid_param("n_estimators", 0, "must be at least 1"));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(TrainerError::invalid_param(
                "learning_rate",
                self.learning_rate,
                "must be positive",
            ));
        }

        let n_samples = x.nrows();
        let mut weights = Array1::from_elem(n_samples, 1.0 / n_samples as f64);
        let mut rng = match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        self.trees.clear();
        self.tree_weights.clear();

        for round in 0..self.n_estimators {
            let indices = Self::weighted_bootstrap(&weights, &mut rng);
            let x_boot = x.select(Axis(0), &indices);
            let y_boot = y.select(Axis(0), &indices);

            let mut tree = DecisionTreeRegressor::new()
                .with_max_depth(BASE_TREE_DEPTH)
                .with_random_state(rng.gen());
            tree.fit(&x_boot, &y_boot)?;

            let predictions = tree.predict(x)?;
            let abs_errors = (&predictions - y).mapv(f64::abs);
            let max_error = abs_errors.fold(0.0_f64, |m, &e| m.max(e));
            let losses = if max_error > 0.0 {
                abs_errors.mapv(|e| self.loss.apply(e / max_error))
            } else {
                abs_errors
            };

            let estimator_error = weights.dot(&losses);

            if estimator_error <= 0.0 {
                // Perfect fit on the weighted sample: keep it and stop
                self.trees.push(tree);
                self.tree_weights.push(1.0);
                break;
            }

            if estimator_error >= 0.5 {
                // Worse than chance; only the very first tree is kept
                if self.trees.is_empty() {
                    self.trees.push(tree);
                    self.tree_weights.push(1.0);
                }
                break;
            }

            let beta = estimator_error / (1.0 - estimator_error);
            self.trees.push(tree);
            self.tree_weights.push(self.learning_rate * (1.0 / beta).ln());

            if round + 1 < self.n_estimators {
                for (w, &l) in weights.iter_mut().zip(losses.iter()) {
                    *w *= beta.powf((1.0 - l) * self.learning_rate);
                }
                let total = weights.sum();
                if !(total > 0.0 && total.is_finite()) {
                    break;
                }
                weights /= total;
            }
        }

        self.n_features = x.ncols();
        Ok(())
    }

    /// Weighted median of the tree predictions
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(TrainerError::ModelNotFitted);
        }
        check_predict_input(self.n_features, x)?;

        let per_tree: Vec<Array1<f64>> = self
            .trees
            .iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<Vec<_>>>()?;
        let half_weight = 0.5 * self.tree_weights.iter().sum::<f64>();

        let predictions = (0..x.nrows())
            .map(|row| {
                let mut votes: Vec<(f64, f64)> = per_tree
                    .iter()
                    .zip(self.tree_weights.iter())
                    .map(|(preds, &w)| (preds[row], w))
                    .collect();
                votes.sort_by(|a, b| a.0.total_cmp(&b.0));

                let mut cumulative = 0.0;
                for &(value, weight) in &votes {
                    cumulative += weight;
                    if cumulative >= half_weight {
                        return value;
                    }
                }
                votes.last().map(|v| v.0).unwrap_or(0.0)
            })
            .collect();

        Ok(predictions)
    }

    fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    fn params(&self) -> Params {
        Params::new()
            .with("n_estimators", self.n_estimators)
            .with("learning_rate", self.learning_rate)
            .with("loss", self.loss.as_str())
            .with("random_state", optional(self.random_state.map(|s| s as usize)))
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "n_estimators" => self.n_estimators = value.expect_usize(name)?,
            "learning_rate" => {
                let lr = value.expect_float(name)?;
                if !(lr > 0.0 && lr.is_finite()) {
                    return Err(TrainerError::invalid_param(name, value, "must be positive"));
                }
                self.learning_rate = lr;
            }
            "loss" => self.loss = value.expect_str(name)?.parse()?,
            "random_state" => {
                self.random_state = value.expect_optional_usize(name)?.map(|s| s as u64)
            }
            _ => return Err(unknown_param(self.algorithm(), name, value)),
        }
        Ok(())
    }

    fn clone_unfitted(&self) -> Self {
        Self {
            trees: Vec::new(),
            tree_weights: Vec::new(),
            n_features: 0,
            ..self.clone()
        }
    }
}
