//! Regression estimators
//!
//! Native implementations of the six model families the trainer searches over:
//! - Decision trees and Random Forests
//! - Gradient boosting
//! - Ordinary least squares
//! - AdaBoost.R2
//! - K-Nearest Neighbors
//!
//! Every estimator implements [`Regressor`]; [`Estimator`] is the closed,
//! serializable union the selection layer works with.

mod models;
pub mod adaboost;
pub mod cross_validation;
pub mod decision_tree;
pub mod estimator;
pub mod gradient_boosting;
pub mod knn;
pub mod linear_models;
pub mod metrics;
pub mod params;
pub mod random_forest;

pub use adaboost::{AdaBoostRegressor, BoostLoss};
pub use cross_validation::{cross_val_score, CVResults, CVSplit, KFold};
pub use decision_tree::{Criterion, DecisionTreeRegressor, TreeNode};
pub use estimator::Estimator;
pub use gradient_boosting::{GradientBoostingConfig, GradientBoostingRegressor};
pub use knn::{DistanceMetric, KNNConfig, KNNRegressor, WeightScheme};
pub use linear_models::LinearRegression;
pub use metrics::{r2_score, RegressionMetrics};
pub use models::Regressor;
pub use params::{ParamValue, Params};
pub use random_forest::{MaxFeatures, RandomForestRegressor};
