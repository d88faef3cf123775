//! Regressor trait and shared input checks

use super::params::{ParamValue, Params};
use crate::error::{Result, TrainerError};
use ndarray::{Array1, Array2};

/// Trait for regression estimators
pub trait Regressor: Send + Sync {
    /// Algorithm name
    fn algorithm(&self) -> &'static str;

    /// Fit the model to training data, replacing any previous fit
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Make predictions
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Whether `fit` has succeeded at least once
    fn is_fitted(&self) -> bool;

    /// Current hyperparameters
    fn params(&self) -> Params;

    /// Set one hyperparameter by name
    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()>;

    /// Same hyperparameters, no fitted state
    fn clone_unfitted(&self) -> Self
    where
        Self: Sized;

    /// Apply every assignment in `params`
    fn set_params(&mut self, params: &Params) -> Result<()> {
        for (name, value) in params.iter() {
            self.set_param(name, value)?;
        }
        Ok(())
    }
}

/// Validate training inputs
pub(crate) fn check_fit_input(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    let n_samples = x.nrows();
    if n_samples != y.len() {
        return Err(TrainerError::ShapeError {
            expected: format!("y length = {}", n_samples),
            actual: format!("y length = {}", y.len()),
        });
    }
    if n_samples == 0 {
        return Err(TrainerError::ValidationError(
            "cannot fit on zero samples".to_string(),
        ));
    }
    if x.ncols() == 0 {
        return Err(TrainerError::ValidationError(
            "cannot fit on zero features".to_string(),
        ));
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(TrainerError::DataError(
            "training data contains NaN or infinite values".to_string(),
        ));
    }
    Ok(())
}

/// Validate prediction inputs against the fitted feature count
pub(crate) fn check_predict_input(n_features: usize, x: &Array2<f64>) -> Result<()> {
    if x.ncols() != n_features {
        return Err(TrainerError::ShapeError {
            expected: format!("{} features", n_features),
            actual: format!("{} features", x.ncols()),
        });
    }
    Ok(())
}

pub(crate) fn unknown_param(algorithm: &str, name: &str, value: &ParamValue) -> TrainerError {
    TrainerError::invalid_param(name, value, format!("unknown hyperparameter for {}", algorithm))
}
