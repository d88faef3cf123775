//! K-Nearest Neighbors regressor

use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::models::{check_fit_input, check_predict_input, unknown_param, Regressor};
use super::params::{ParamValue, Params};
use crate::error::{Result, TrainerError};

/// Distance metric for KNN
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Euclidean distance (L2)
    #[default]
    Euclidean,
    /// Manhattan distance (L1)
    Manhattan,
    /// Cosine similarity (converted to distance)
    Cosine,
}

impl DistanceMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::Euclidean => "euclidean",
            DistanceMetric::Manhattan => "manhattan",
            DistanceMetric::Cosine => "cosine",
        }
    }

    fn parse(value: &ParamValue) -> Result<Self> {
        match value.expect_str("metric")? {
            "euclidean" => Ok(DistanceMetric::Euclidean),
            "manhattan" => Ok(DistanceMetric::Manhattan),
            "cosine" => Ok(DistanceMetric::Cosine),
            _ => Err(TrainerError::invalid_param(
                "metric",
                value,
                "expected euclidean, manhattan or cosine",
            )),
        }
    }
}

/// Weighting scheme for neighbors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WeightScheme {
    /// All neighbors have equal weight
    #[default]
    Uniform,
    /// Closer neighbors have more weight (inverse distance)
    Distance,
}

impl WeightScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeightScheme::Uniform => "uniform",
            WeightScheme::Distance => "distance",
        }
    }

    fn parse(value: &ParamValue) -> Result<Self> {
        match value.expect_str("weights")? {
            "uniform" => Ok(WeightScheme::Uniform),
            "distance" => Ok(WeightScheme::Distance),
            _ => Err(TrainerError::invalid_param(
                "weights",
                value,
                "expected uniform or distance",
            )),
        }
    }
}

/// KNN configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNConfig {
    /// Number of neighbors
    pub n_neighbors: usize,
    /// Distance metric
    pub metric: DistanceMetric,
    /// Weighting scheme
    pub weights: WeightScheme,
}

impl Default for KNNConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            metric: DistanceMetric::Euclidean,
            weights: WeightScheme::Uniform,
        }
    }
}

/// K-Nearest Neighbors Regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNRegressor {
    config: KNNConfig,
    x_train: Option<Array2<f64>>,
    y_train: Option<Array1<f64>>,
}

impl Default for KNNRegressor {
    fn default() -> Self {
        Self::new(KNNConfig::default())
    }
}

impl KNNRegressor {
    pub fn new(config: KNNConfig) -> Self {
        Self {
            config,
            x_train: None,
            y_train: None,
        }
    }

    /// Create with default config and specified k
    pub fn with_k(k: usize) -> Self {
        Self::new(KNNConfig {
            n_neighbors: k,
            ..Default::default()
        })
    }

    pub fn with_weights(mut self, weights: WeightScheme) -> Self {
        self.config.weights = weights;
        self
    }

    pub fn config(&self) -> &KNNConfig {
        &self.config
    }
}

impl Regressor for KNNRegressor {
    fn algorithm(&self) -> &'static str {
        "KNeighborsRegressor"
    }

    /// Stores the training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        if self.config.n_neighbors == 0 {
            return Err(TrainerError::invalid_param("n_neighbors", 0, "must be at least 1"));
        }
        self.x_train = Some(x.clone());
        self.y_train = Some(y.clone());
        Ok(())
    }

    /// Predict target values (parallelized over query rows)
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (x_train, y_train) = match (&self.x_train, &self.y_train) {
            (Some(x_train), Some(y_train)) => (x_train, y_train),
            _ => return Err(TrainerError::ModelNotFitted),
        };
        check_predict_input(x_train.ncols(), x)?;

        let k = self.config.n_neighbors;
        if k > x_train.nrows() {
            return Err(TrainerError::ValidationError(format!(
                "n_neighbors = {} exceeds the {} fitted samples",
                k,
                x_train.nrows()
            )));
        }
        let metric = self.config.metric;
        let weights = self.config.weights;

        let predictions: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let neighbors = find_k_nearest(x.row(i), x_train, y_train, k, metric);
                weighted_mean_from(&neighbors, weights)
            })
            .collect();

        Ok(Array1::from_vec(predictions))
    }

    fn is_fitted(&self) -> bool {
        self.x_train.is_some()
    }

    fn params(&self) -> Params {
        Params::new()
            .with("n_neighbors", self.config.n_neighbors)
            .with("weights", self.config.weights.as_str())
            .with("metric", self.config.metric.as_str())
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "n_neighbors" => {
                let k = value.expect_usize(name)?;
                if k == 0 {
                    return Err(TrainerError::invalid_param(name, value, "must be at least 1"));
                }
                self.config.n_neighbors = k;
            }
            "weights" => self.config.weights = WeightScheme::parse(value)?,
            "metric" => self.config.metric = DistanceMetric::parse(value)?,
            _ => return Err(unknown_param(self.algorithm(), name, value)),
        }
        Ok(())
    }

    fn clone_unfitted(&self) -> Self {
        Self::new(self.config.clone())
    }
}

/// Max-heap entry keeping the k smallest distances
#[derive(PartialEq)]
struct DistLabel(f64, f64);

impl Eq for DistLabel {}
impl PartialOrd for DistLabel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DistLabel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Find k nearest neighbors using a max-heap, O(n log k)
fn find_k_nearest(
    point: ArrayView1<'_, f64>,
    x_train: &Array2<f64>,
    y_train: &Array1<f64>,
    k: usize,
    metric: DistanceMetric,
) -> Vec<(f64, f64)> {
    let mut heap = BinaryHeap::with_capacity(k + 1);

    for (row, &label) in x_train.rows().into_iter().zip(y_train.iter()) {
        let dist = compute_distance(point, row, metric);
        if heap.len() < k {
            heap.push(DistLabel(dist, label));
        } else if let Some(top) = heap.peek() {
            // Strict comparison keeps the earliest rows on ties
            if dist < top.0 {
                heap.pop();
                heap.push(DistLabel(dist, label));
            }
        }
    }

    heap.into_iter().map(|dl| (dl.0, dl.1)).collect()
}

fn compute_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>, metric: DistanceMetric) -> f64 {
    match metric {
        DistanceMetric::Euclidean => a
            .iter()
            .zip(b.iter())
            .map(|(ai, bi)| {
                let d = ai - bi;
                d * d
            })
            .sum::<f64>()
            .sqrt(),
        DistanceMetric::Manhattan => a.iter().zip(b.iter()).map(|(ai, bi)| (ai - bi).abs()).sum(),
        DistanceMetric::Cosine => {
            let mut dot = 0.0;
            let mut norm_a = 0.0;
            let mut norm_b = 0.0;
            for (ai, bi) in a.iter().zip(b.iter()) {
                dot += ai * bi;
                norm_a += ai * ai;
                norm_b += bi * bi;
            }
            let denom = f64::sqrt(norm_a) * f64::sqrt(norm_b);
            if denom > 0.0 {
                1.0 - (dot / denom)
            } else {
                1.0
            }
        }
    }
}

fn weighted_mean_from(neighbors: &[(f64, f64)], weights: WeightScheme) -> f64 {
    let uniform = || neighbors.iter().map(|(_, y)| y).sum::<f64>() / neighbors.len() as f64;
    match weights {
        WeightScheme::Uniform => uniform(),
        WeightScheme::Distance => {
            let mut weighted_sum = 0.0;
            let mut weight_total = 0.0;
            for &(dist, y) in neighbors {
                let w = 1.0 / (dist + 1e-10);
                weighted_sum += w * y;
                weight_total += w;
            }
            if weight_total > 0.0 {
                weighted_sum / weight_total
            } else {
                uniform()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn create_regression_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_vec((10, 1), (0..10).map(|i| i as f64).collect()).unwrap();
        let y = x.column(0).mapv(|v| 2.0 * v + 1.0);
        (x, y)
    }

    #[test]
    fn test_knn_regressor() {
        let (x, y) = create_regression_data();

        let mut knn = KNNRegressor::with_k(3);
        knn.fit(&x, &y).unwrap();

        let predictions = knn.predict(&array![[4.0], [4.4]]).unwrap();
        // Neighbors of 4.0 are 3, 4, 5 -> targets 7, 9, 11
        assert!((predictions[0] - 9.0).abs() < 1e-10);
        assert!((predictions[1] - 9.0).abs() < 1e-10);
    }

    #[test]
    fn test_distance_metrics() {
        let a = array![0.0, 0.0];
        let b = array![3.0, 4.0];

        assert!((compute_distance(a.view(), b.view(), DistanceMetric::Euclidean) - 5.0).abs() < 1e-10);
        assert!((compute_distance(a.view(), b.view(), DistanceMetric::Manhattan) - 7.0).abs() < 1e-10);
        assert_eq!(compute_distance(a.view(), b.view(), DistanceMetric::Cosine), 1.0);
    }

    #[test]
    fn test_weighted_knn() {
        let (x, y) = create_regression_data();

        let mut knn = KNNRegressor::with_k(2).with_weights(WeightScheme::Distance);
        knn.fit(&x, &y).unwrap();

        // Exact match dominates the inverse-distance weights
        let predictions = knn.predict(&array![[2.0]]).unwrap();
        assert!((predictions[0] - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_too_many_neighbors() {
        let x = array![[0.0], [1.0], [2.0]];
        let y = array![0.0, 1.0, 2.0];

        let mut knn = KNNRegressor::default();
        knn.fit(&x, &y).unwrap();

        let err = knn.predict(&x).unwrap_err();
        assert!(matches!(err, TrainerError::ValidationError(_)));
    }

    #[test]
    fn test_params() {
        let mut knn = KNNRegressor::default();
        knn.set_param("n_neighbors", &ParamValue::Int(7)).unwrap();
        knn.set_param("weights", &ParamValue::from("distance")).unwrap();
        assert_eq!(knn.config().n_neighbors, 7);
        assert_eq!(knn.config().weights, WeightScheme::Distance);
        assert!(knn.set_param("n_neighbors", &ParamValue::Int(0)).is_err());
        assert!(knn.set_param("weights", &ParamValue::from("gaussian")).is_err());
        assert!(matches!(
            knn.predict(&array![[1.0]]),
            Err(TrainerError::ModelNotFitted)
        ));
    }
}
