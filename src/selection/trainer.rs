//! End-to-end training: split, evaluate, select, persist

use super::catalog::{default_catalog, default_grids, Catalog};
use super::evaluator::{ModelEvaluator, ScoreReport};
use super::grid::GridTable;
use crate::config::TrainerConfig;
use crate::error::{Result, TrainerError};
use crate::export::{save_artifact, ArtifactMetadata, ModelArtifact};
use crate::training::{Estimator, Regressor};
use crate::utils::split_features_target;
use ndarray::Array2;
use std::path::PathBuf;
use tracing::info;

/// Everything a successful run produced
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub best_model: String,
    pub best_score: f64,
    pub report: ScoreReport,
    pub artifact_path: PathBuf,
}

/// Selects the best catalog entry and writes it as the model artifact
#[derive(Debug, Clone)]
pub struct ModelTrainer {
    config: TrainerConfig,
    catalog: Catalog,
    grids: GridTable,
}

impl Default for ModelTrainer {
    fn default() -> Self {
        Self::new(TrainerConfig::default())
    }
}

impl ModelTrainer {
    /// Trainer with the default catalog; grids come from `config` when set
    pub fn new(config: TrainerConfig) -> Self {
        let grids = config.grids.clone().unwrap_or_else(default_grids);
        Self {
            config,
            catalog: default_catalog(),
            grids,
        }
    }

    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_grids(mut self, grids: GridTable) -> Self {
        self.grids = grids;
        self
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Train on `train_arr`, validate on `valid_arr` (last column is the
    /// target in both) and return the best validation R².
    pub fn train(&self, train_arr: &Array2<f64>, valid_arr: &Array2<f64>) -> Result<f64> {
        self.run(train_arr, valid_arr).map(|outcome| outcome.best_score)
    }

    /// Like [`ModelTrainer::train`] but returns the full outcome
    pub fn run(&self, train_arr: &Array2<f64>, valid_arr: &Array2<f64>) -> Result<TrainingOutcome> {
        self.run_inner(train_arr, valid_arr).map_err(|e| {
            e.wrap(format!(
                "model training failed (train {}x{}, valid {}x{})",
                train_arr.nrows(),
                train_arr.ncols(),
                valid_arr.nrows(),
                valid_arr.ncols()
            ))
        })
    }

    fn run_inner(&self, train_arr: &Array2<f64>, valid_arr: &Array2<f64>) -> Result<TrainingOutcome> {
        self.config.validate()?;

        info!("splitting training and validation input data");
        let (x_train, y_train) = split_features_target(train_arr)?;
        let (x_valid, y_valid) = split_features_target(valid_arr)?;

        let evaluator = ModelEvaluator::from_config(&self.config);
        let report = evaluator.evaluate(
            &x_train,
            &y_train,
            &x_valid,
            &y_valid,
            &self.catalog,
            &self.grids,
        )?;
        info!("model report:\n{}", report);

        let best = report
            .best()
            .ok_or_else(|| TrainerError::TrainingError("no candidate produced a score".to_string()))?;
        let (best_name, best_score) = (best.name.clone(), best.validation_score);

        if best_score < self.config.score_threshold {
            return Err(TrainerError::NoAdequateModel {
                best_model: best_name,
                best_score,
                threshold: self.config.score_threshold,
            });
        }
        info!(model = %best_name, score = best_score, "found best model");

        let artifact = self.build_artifact(&best_name, best_score, &best.model, x_train.ncols())?;
        save_artifact(&self.config.artifact_path, &artifact, self.config.artifact_format)?;
        info!(path = %self.config.artifact_path.display(), "saved best model");

        Ok(TrainingOutcome {
            best_model: best_name,
            best_score,
            report,
            artifact_path: self.config.artifact_path.clone(),
        })
    }

    fn build_artifact(
        &self,
        name: &str,
        score: f64,
        model: &Estimator,
        n_features: usize,
    ) -> Result<ModelArtifact> {
        let metadata = ArtifactMetadata::new(name, model.algorithm())
            .with_params(&model.params())
            .with_validation_score(score)
            .with_n_features(n_features);
        ModelArtifact::new(metadata, model, self.config.artifact_format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::LinearRegression;
    use ndarray::Axis;

    fn table(n: usize) -> Array2<f64> {
        Array2::from_shape_fn((n, 3), |(i, j)| match j {
            0 => i as f64,
            1 => (i % 5) as f64,
            _ => 3.0 * i as f64 - 2.0 * (i % 5) as f64 + 1.0,
        })
    }

    #[test]
    fn test_train_writes_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("model.bin");
        let trainer = ModelTrainer::new(TrainerConfig::new().with_artifact_path(&path))
            .with_catalog(Catalog::new().with("Linear Regression", LinearRegression::new()).unwrap());

        let score = trainer.train(&table(30), &table(10)).unwrap();
        assert!(score > 0.999);
        assert!(path.exists());
    }

    #[test]
    fn test_below_threshold_is_wrapped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        let trainer = ModelTrainer::new(
            TrainerConfig::new()
                .with_artifact_path(&path)
                .with_threshold(1.5),
        )
        .with_catalog(Catalog::new().with("Linear Regression", LinearRegression::new()).unwrap());

        let err = trainer.train(&table(30), &table(10)).unwrap_err();
        assert!(matches!(err, TrainerError::Pipeline { .. }));
        assert!(matches!(err.root_cause(), TrainerError::NoAdequateModel { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_single_column_input_fails() {
        let trainer = ModelTrainer::default();
        let arr = table(10).select(Axis(1), &[2]);
        let err = trainer.train(&arr, &arr).unwrap_err();
        assert!(err.to_string().starts_with("model training failed"));
    }
}
