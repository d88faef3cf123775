//! Exhaustive grid search scored by k-fold R²

use super::grid::ParamGrid;
use crate::error::Result;
use crate::training::{cross_val_score, CVResults, KFold, Params, Regressor};
use ndarray::{Array1, Array2};
use tracing::{debug, warn};

/// Outcome of one grid search
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// Winning assignment; empty when the grid was empty
    pub best_params: Params,
    /// Mean CV score of the winner; `None` when no search ran
    pub best_score: Option<f64>,
    /// Every evaluated assignment in product order
    pub cv_results: Vec<(Params, CVResults)>,
}

/// Grid search hyperparameter optimizer
#[derive(Debug, Clone, Default)]
pub struct GridSearch {
    kfold: KFold,
}

impl GridSearch {
    pub fn new(kfold: KFold) -> Self {
        Self { kfold }
    }

    pub fn kfold(&self) -> &KFold {
        &self.kfold
    }

    /// Try every combination on an unfitted clone of `estimator`.
    ///
    /// The highest mean score wins; on ties the earlier combination is kept.
    /// A combination whose fit fails scores NaN and can only win if every
    /// combination failed. `estimator` itself is never modified.
    pub fn search<R: Regressor>(
        &self,
        estimator: &R,
        grid: &ParamGrid,
        x: &Array2<f64>,
        y: &Array1<f64>,
    ) -> Result<SearchResult> {
        if grid.is_empty() {
            return Ok(SearchResult {
                best_params: Params::new(),
                best_score: None,
                cv_results: Vec::new(),
            });
        }

        // Too few rows for the folds is an input error, not a bad combination
        self.kfold.split(x.nrows())?;

        let combinations = grid.combinations()?;
        let mut cv_results = Vec::with_capacity(combinations.len());
        let mut best: Option<(usize, f64)> = None;

        for (idx, params) in combinations.into_iter().enumerate() {
            let mut candidate = estimator.clone_unfitted();
            candidate.set_params(&params)?;

            let results = match cross_val_score(&candidate, x, y, &self.kfold) {
                Ok(results) => results,
                Err(err) => {
                    warn!(
                        algorithm = estimator.algorithm(),
                        params = %params,
                        error = %err.chain_message(),
                        "grid combination failed, scoring as NaN"
                    );
                    CVResults::from_scores(vec![f64::NAN; self.kfold.n_splits])
                }
            };
            debug!(
                algorithm = estimator.algorithm(),
                params = %params,
                mean_score = results.mean_score,
                "scored grid combination"
            );

            let replace = match best {
                None => true,
                Some((_, score)) => {
                    results.mean_score > score || (score.is_nan() && !results.mean_score.is_nan())
                }
            };
            if replace {
                best = Some((idx, results.mean_score));
            }
            cv_results.push((params, results));
        }

        let (best_idx, best_score) = best.unwrap_or((0, f64::NAN));
        let best_params = cv_results
            .get(best_idx)
            .map(|(params, _)| params.clone())
            .unwrap_or_default();

        Ok(SearchResult {
            best_params,
            best_score: Some(best_score),
            cv_results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::{KNNRegressor, LinearRegression, ParamValue};

    fn step_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((30, 1), |(i, _)| i as f64);
        let y = x.column(0).mapv(|v| if v < 15.0 { 0.0 } else { 10.0 });
        (x, y)
    }

    #[test]
    fn test_empty_grid_skips_search() {
        let (x, y) = step_data();
        let result = GridSearch::default()
            .search(&LinearRegression::new(), &ParamGrid::new(), &x, &y)
            .unwrap();
        assert!(result.best_params.is_empty());
        assert!(result.best_score.is_none());
        assert!(result.cv_results.is_empty());
    }

    #[test]
    fn test_picks_best_combination() {
        let (x, y) = step_data();
        let grid = ParamGrid::new().with("n_neighbors", vec![19, 1]);

        let result = GridSearch::default()
            .search(&KNNRegressor::default(), &grid, &x, &y)
            .unwrap();

        assert_eq!(result.cv_results.len(), 2);
        assert_eq!(result.best_params.get("n_neighbors"), Some(&ParamValue::Int(1)));
        let best = result.best_score.unwrap();
        assert!(result.cv_results.iter().all(|(_, r)| r.mean_score <= best));
    }

    #[test]
    fn test_tie_keeps_first_combination() {
        let x = Array2::from_shape_fn((12, 1), |(i, _)| i as f64);
        let y = x.column(0).mapv(|v| 2.0 * v);
        let grid = ParamGrid::new().with("fit_intercept", vec![true, true]);

        let result = GridSearch::default()
            .search(&LinearRegression::new(), &grid, &x, &y)
            .unwrap();
        assert_eq!(result.cv_results.len(), 2);
        assert_eq!(result.best_params.get("fit_intercept"), Some(&ParamValue::Bool(true)));
    }

    #[test]
    fn test_estimator_left_unfitted() {
        let (x, y) = step_data();
        let knn = KNNRegressor::default();
        let grid = ParamGrid::new().with("n_neighbors", vec![3]);
        GridSearch::default().search(&knn, &grid, &x, &y).unwrap();
        assert!(!knn.is_fitted());
        assert_eq!(knn.config().n_neighbors, 5);
    }

    #[test]
    fn test_failed_fit_scores_nan() {
        let (x, y) = step_data();
        // 500 neighbours never fit in a 20-row training fold
        let grid = ParamGrid::new().with("n_neighbors", vec![500, 3]);

        let result = GridSearch::default()
            .search(&KNNRegressor::default(), &grid, &x, &y)
            .unwrap();
        assert!(result.cv_results[0].1.mean_score.is_nan());
        assert_eq!(result.best_params.get("n_neighbors"), Some(&ParamValue::Int(3)));
    }

    #[test]
    fn test_too_few_rows_propagates() {
        let x = Array2::from_shape_fn((2, 1), |(i, _)| i as f64);
        let y = x.column(0).to_owned();
        let grid = ParamGrid::new().with("n_neighbors", vec![1]);
        assert!(GridSearch::default()
            .search(&KNNRegressor::default(), &grid, &x, &y)
            .is_err());
    }

    #[test]
    fn test_bad_param_propagates() {
        let (x, y) = step_data();
        let grid = ParamGrid::new().with("depth", vec![3]);
        assert!(GridSearch::default()
            .search(&KNNRegressor::default(), &grid, &x, &y)
            .is_err());
    }
}
