//! Closed set of regression estimators with serde support

use super::adaboost::AdaBoostRegressor;
use super::decision_tree::DecisionTreeRegressor;
use super::gradient_boosting::GradientBoostingRegressor;
use super::knn::KNNRegressor;
use super::linear_models::LinearRegression;
use super::models::Regressor;
use super::params::{ParamValue, Params};
use super::random_forest::RandomForestRegressor;
use crate::error::Result;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Any estimator the trainer can select and persist
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Estimator {
    RandomForest(RandomForestRegressor),
    DecisionTree(DecisionTreeRegressor),
    GradientBoosting(GradientBoostingRegressor),
    LinearRegression(LinearRegression),
    AdaBoost(AdaBoostRegressor),
    KNeighbors(KNNRegressor),
}

macro_rules! dispatch {
    ($self:expr, $model:ident => $body:expr) => {
        match $self {
            Estimator::RandomForest($model) => $body,
            Estimator::DecisionTree($model) => $body,
            Estimator::GradientBoosting($model) => $body,
            Estimator::LinearRegression($model) => $body,
            Estimator::AdaBoost($model) => $body,
            Estimator::KNeighbors($model) => $body,
        }
    };
}

impl Regressor for Estimator {
    fn algorithm(&self) -> &'static str {
        dispatch!(self, m => m.algorithm())
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        dispatch!(self, m => m.fit(x, y))
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        dispatch!(self, m => m.predict(x))
    }

    fn is_fitted(&self) -> bool {
        dispatch!(self, m => m.is_fitted())
    }

    fn params(&self) -> Params {
        dispatch!(self, m => m.params())
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        dispatch!(self, m => m.set_param(name, value))
    }

    fn clone_unfitted(&self) -> Self {
        match self {
            Estimator::RandomForest(m) => Estimator::RandomForest(m.clone_unfitted()),
            Estimator::DecisionTree(m) => Estimator::DecisionTree(m.clone_unfitted()),
            Estimator::GradientBoosting(m) => Estimator::GradientBoosting(m.clone_unfitted()),
            Estimator::LinearRegression(m) => Estimator::LinearRegression(m.clone_unfitted()),
            Estimator::AdaBoost(m) => Estimator::AdaBoost(m.clone_unfitted()),
            Estimator::KNeighbors(m) => Estimator::KNeighbors(m.clone_unfitted()),
        }
    }
}

impl From<RandomForestRegressor> for Estimator {
    fn from(m: RandomForestRegressor) -> Self {
        Estimator::RandomForest(m)
    }
}

impl From<DecisionTreeRegressor> for Estimator {
    fn from(m: DecisionTreeRegressor) -> Self {
        Estimator::DecisionTree(m)
    }
}

impl From<GradientBoostingRegressor> for Estimator {
    fn from(m: GradientBoostingRegressor) -> Self {
        Estimator::GradientBoosting(m)
    }
}

impl From<LinearRegression> for Estimator {
    fn from(m: LinearRegression) -> Self {
        Estimator::LinearRegression(m)
    }
}

impl From<AdaBoostRegressor> for Estimator {
    fn from(m: AdaBoostRegressor) -> Self {
        Estimator::AdaBoost(m)
    }
}

impl From<KNNRegressor> for Estimator {
    fn from(m: KNNRegressor) -> Self {
        Estimator::KNeighbors(m)
    }
}
