//! Candidate evaluation: grid search, refit, validation scoring

use super::catalog::Catalog;
use super::grid::{GridTable, ParamGrid};
use super::search::GridSearch;
use crate::config::{FailurePolicy, TrainerConfig};
use crate::error::{Result, TrainerError};
use crate::training::{r2_score, Estimator, KFold, Params, Regressor};
use ndarray::{Array1, Array2};
use std::fmt;
use std::time::Instant;
use tracing::{info, warn};

/// Score of one successfully evaluated catalog entry
#[derive(Debug, Clone)]
pub struct CandidateScore {
    pub name: String,
    /// Winning grid assignment (empty without a grid)
    pub params: Params,
    /// Mean internal CV score of the winner
    pub cv_score: Option<f64>,
    /// R² on the validation set
    pub validation_score: f64,
    /// The estimator fitted on the full training data
    pub model: Estimator,
}

/// A catalog entry that failed under [`FailurePolicy::Isolate`]
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateFailure {
    pub name: String,
    pub reason: String,
}

/// Validation scores for every evaluated candidate, in catalog order
#[derive(Debug, Clone, Default)]
pub struct ScoreReport {
    entries: Vec<CandidateScore>,
    failures: Vec<CandidateFailure>,
}

impl ScoreReport {
    pub fn get(&self, name: &str) -> Option<&CandidateScore> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn entries(&self) -> &[CandidateScore] {
        &self.entries
    }

    pub fn failures(&self) -> &[CandidateFailure] {
        &self.failures
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// `(name, validation R²)` pairs in catalog order
    pub fn scores(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries
            .iter()
            .map(|e| (e.name.as_str(), e.validation_score))
    }

    /// Highest validation score; the earliest entry wins ties
    pub fn best(&self) -> Option<&CandidateScore> {
        let mut best: Option<&CandidateScore> = None;
        for entry in &self.entries {
            if entry.validation_score.is_nan() {
                continue;
            }
            match best {
                Some(current) if entry.validation_score <= current.validation_score => {}
                _ => best = Some(entry),
            }
        }
        best
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Take ownership of the fitted model for `name`
    pub fn into_model(self, name: &str) -> Option<Estimator> {
        self.entries
            .into_iter()
            .find(|e| e.name == name)
            .map(|e| e.model)
    }
}

impl fmt::Display for ScoreReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .entries
            .iter()
            .map(|e| e.name.len())
            .chain(self.failures.iter().map(|e| e.name.len()))
            .max()
            .unwrap_or(5)
            .max(5);

        writeln!(f, "{:<width$}  {:>9}  {:>9}  params", "model", "valid R²", "cv R²")?;
        for entry in &self.entries {
            let cv = entry
                .cv_score
                .map(|s| format!("{:.4}", s))
                .unwrap_or_else(|| "-".to_string());
            writeln!(
                f,
                "{:<width$}  {:>9.4}  {:>9}  {}",
                entry.name, entry.validation_score, cv, entry.params
            )?;
        }
        for failure in &self.failures {
            writeln!(f, "{:<width$}  {:>9}  {:>9}  {}", failure.name, "failed", "-", failure.reason)?;
        }
        Ok(())
    }
}

/// Scores every catalog entry on the validation set after grid search
#[derive(Debug, Clone, Default)]
pub struct ModelEvaluator {
    search: GridSearch,
    failure_policy: FailurePolicy,
}

impl ModelEvaluator {
    pub fn new(kfold: KFold, failure_policy: FailurePolicy) -> Self {
        Self {
            search: GridSearch::new(kfold),
            failure_policy,
        }
    }

    /// Evaluator using the folds, seed and failure policy of `config`
    pub fn from_config(config: &TrainerConfig) -> Self {
        let kfold = KFold::new(config.cv_folds).with_random_state(config.random_state);
        Self::new(kfold, config.failure_policy)
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    /// Evaluate every catalog entry in order.
    ///
    /// Each entry is searched on unfitted clones, refit with the winning
    /// parameters on the full training data and scored on the validation
    /// set. `catalog` is only read.
    pub fn evaluate(
        &self,
        x_train: &Array2<f64>,
        y_train: &Array1<f64>,
        x_valid: &Array2<f64>,
        y_valid: &Array1<f64>,
        catalog: &Catalog,
        grids: &GridTable,
    ) -> Result<ScoreReport> {
        if catalog.is_empty() {
            return Err(TrainerError::ConfigError("catalog is empty".to_string()));
        }
        if x_train.ncols() != x_valid.ncols() {
            return Err(TrainerError::ShapeError {
                expected: format!("{} validation features", x_train.ncols()),
                actual: format!("{} validation features", x_valid.ncols()),
            });
        }

        let empty_grid = ParamGrid::new();
        let mut report = ScoreReport::default();

        for (name, estimator) in catalog.iter() {
            let grid = grids.get(name).unwrap_or(&empty_grid);
            let start = Instant::now();

            match self.evaluate_one(name, estimator, grid, x_train, y_train, x_valid, y_valid) {
                Ok(score) => {
                    info!(
                        model = name,
                        validation_r2 = score.validation_score,
                        params = %score.params,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "evaluated candidate"
                    );
                    report.entries.push(score);
                }
                Err(err) => match self.failure_policy {
                    FailurePolicy::Abort => {
                        return Err(err.wrap(format!("evaluating '{}'", name)));
                    }
                    FailurePolicy::Isolate => {
                        let reason = err.chain_message();
                        warn!(model = name, error = %reason, "candidate failed, continuing");
                        report.failures.push(CandidateFailure {
                            name: name.to_string(),
                            reason,
                        });
                    }
                },
            }
        }

        if report.entries.is_empty() {
            let reasons: Vec<String> = report
                .failures
                .iter()
                .map(|f| format!("{}: {}", f.name, f.reason))
                .collect();
            return Err(TrainerError::TrainingError(format!(
                "every candidate failed ({})",
                reasons.join("; ")
            )));
        }

        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    fn evaluate_one(
        &self,
        name: &str,
        estimator: &Estimator,
        grid: &ParamGrid,
        x_train: &Array2<f64>,
        y_train: &Array1<f64>,
        x_valid: &Array2<f64>,
        y_valid: &Array1<f64>,
    ) -> Result<CandidateScore> {
        let search = self.search.search(estimator, grid, x_train, y_train)?;

        let mut model = estimator.clone_unfitted();
        model.set_params(&search.best_params)?;
        model.fit(x_train, y_train)?;

        let predictions = model.predict(x_valid)?;
        let validation_score = r2_score(y_valid, &predictions)?;

        Ok(CandidateScore {
            name: name.to_string(),
            params: search.best_params,
            cv_score: search.best_score,
            validation_score,
            model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::{KNNRegressor, LinearRegression};

    fn linear_data(n: usize, offset: usize) -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((n, 2), |(i, j)| ((i + offset) * (j + 1) % 17) as f64);
        let y = x.column(0).mapv(|v| 2.0 * v) + x.column(1).mapv(|v| -v) + 3.0;
        (x, y)
    }

    fn small_catalog() -> Catalog {
        Catalog::new()
            .with("Linear Regression", LinearRegression::new())
            .unwrap()
            .with("KNeighbors Regressor", KNNRegressor::default())
            .unwrap()
    }

    #[test]
    fn test_report_follows_catalog_order() {
        let (x_train, y_train) = linear_data(40, 0);
        let (x_valid, y_valid) = linear_data(12, 3);

        let report = ModelEvaluator::default()
            .evaluate(&x_train, &y_train, &x_valid, &y_valid, &small_catalog(), &GridTable::new())
            .unwrap();

        let names: Vec<&str> = report.names().collect();
        assert_eq!(names, vec!["Linear Regression", "KNeighbors Regressor"]);
        assert!(report.get("Linear Regression").unwrap().validation_score > 0.999);
        assert_eq!(report.best().unwrap().name, "Linear Regression");
        assert!(report.entries().iter().all(|e| e.model.is_fitted()));
    }

    #[test]
    fn test_catalog_untouched() {
        let (x_train, y_train) = linear_data(40, 0);
        let (x_valid, y_valid) = linear_data(12, 3);
        let catalog = small_catalog();

        ModelEvaluator::default()
            .evaluate(&x_train, &y_train, &x_valid, &y_valid, &catalog, &GridTable::new())
            .unwrap();

        assert!(catalog.iter().all(|(_, e)| !e.is_fitted()));
    }

    #[test]
    fn test_abort_policy_wraps_error() {
        let (x_train, y_train) = linear_data(4, 0);
        let (x_valid, y_valid) = linear_data(4, 1);

        // 6 neighbors cannot be found among 4 training rows
        let mut grids = GridTable::new();
        grids.insert("KNeighbors Regressor", ParamGrid::new());
        let catalog = Catalog::new()
            .with("KNeighbors Regressor", KNNRegressor::with_k(6))
            .unwrap();

        let err = ModelEvaluator::default()
            .evaluate(&x_train, &y_train, &x_valid, &y_valid, &catalog, &grids)
            .unwrap_err();
        assert!(err.to_string().contains("KNeighbors Regressor"));
        assert!(matches!(err.root_cause(), TrainerError::ValidationError(_)));
    }

    #[test]
    fn test_isolate_policy_records_failure() {
        let (x_train, y_train) = linear_data(4, 0);
        let (x_valid, y_valid) = linear_data(4, 1);
        let catalog = Catalog::new()
            .with("Linear Regression", LinearRegression::new())
            .unwrap()
            .with("KNeighbors Regressor", KNNRegressor::with_k(6))
            .unwrap();

        let evaluator = ModelEvaluator::new(KFold::new(2), FailurePolicy::Isolate);
        let report = evaluator
            .evaluate(&x_train, &y_train, &x_valid, &y_valid, &catalog, &GridTable::new())
            .unwrap();

        assert_eq!(report.len(), 1);
        assert_eq!(report.failures().len(), 1);
        assert_eq!(report.failures()[0].name, "KNeighbors Regressor");
        assert!(report.to_string().contains("failed"));
    }

    #[test]
    fn test_best_prefers_first_on_tie() {
        let (x, y) = linear_data(20, 0);
        let mut model = Estimator::from(LinearRegression::new());
        model.fit(&x, &y).unwrap();

        let entry = |name: &str| CandidateScore {
            name: name.to_string(),
            params: Params::new(),
            cv_score: None,
            validation_score: 0.9,
            model: model.clone(),
        };
        let report = ScoreReport {
            entries: vec![entry("first"), entry("second")],
            failures: Vec::new(),
        };
        assert_eq!(report.best().unwrap().name, "first");
    }

    #[test]
    fn test_empty_catalog_rejected() {
        let (x, y) = linear_data(10, 0);
        let err = ModelEvaluator::default()
            .evaluate(&x, &y, &x, &y, &Catalog::new(), &GridTable::new())
            .unwrap_err();
        assert!(matches!(err, TrainerError::ConfigError(_)));
    }
}
