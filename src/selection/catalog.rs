//! Candidate estimators and their default grids

use super::grid::{GridTable, ParamGrid};
use crate::error::{Result, TrainerError};
use crate::training::{
    AdaBoostRegressor, DecisionTreeRegressor, Estimator, GradientBoostingRegressor,
    KNNRegressor, LinearRegression, RandomForestRegressor,
};

pub const RANDOM_FOREST: &str = "Random Forest";
pub const DECISION_TREE: &str = "Decision Tree";
pub const GRADIENT_BOOSTING: &str = "Gradient Boosting";
pub const LINEAR_REGRESSION: &str = "Linear Regression";
pub const ADABOOST: &str = "AdaBoost Regressor";
pub const KNEIGHBORS: &str = "KNeighbors Regressor";

const ESTIMATOR_COUNTS: [i64; 6] = [8, 16, 32, 64, 128, 256];

/// Ordered, uniquely named candidate estimators
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<(String, Estimator)>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry; names must be unique
    pub fn push(&mut self, name: impl Into<String>, estimator: impl Into<Estimator>) -> Result<()> {
        let name = name.into();
        if self.get(&name).is_some() {
            return Err(TrainerError::ConfigError(format!(
                "duplicate catalog entry '{}'",
                name
            )));
        }
        self.entries.push((name, estimator.into()));
        Ok(())
    }

    /// Builder form of [`Catalog::push`]
    pub fn with(mut self, name: impl Into<String>, estimator: impl Into<Estimator>) -> Result<Self> {
        self.push(name, estimator)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Estimator> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, e)| e)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Estimator)> {
        self.entries.iter().map(|(n, e)| (n.as_str(), e))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The six default candidates with library-default hyperparameters
pub fn default_catalog() -> Catalog {
    let entries: Vec<(String, Estimator)> = vec![
        (RANDOM_FOREST.into(), RandomForestRegressor::default().into()),
        (DECISION_TREE.into(), DecisionTreeRegressor::default().into()),
        (GRADIENT_BOOSTING.into(), GradientBoostingRegressor::default().into()),
        (LINEAR_REGRESSION.into(), LinearRegression::default().into()),
        (ADABOOST.into(), AdaBoostRegressor::default().into()),
        (KNEIGHBORS.into(), KNNRegressor::default().into()),
    ];
    Catalog { entries }
}

/// Default search space for each catalog entry
pub fn default_grids() -> GridTable {
    let mut grids = GridTable::new();
    grids.insert(
        RANDOM_FOREST,
        ParamGrid::new().with("n_estimators", ESTIMATOR_COUNTS),
    );
    grids.insert(
        DECISION_TREE,
        ParamGrid::new().with(
            "criterion",
            ["squared_error", "friedman_mse", "absolute_error", "poisson"],
        ),
    );
    grids.insert(
        GRADIENT_BOOSTING,
        ParamGrid::new()
            .with("learning_rate", [0.1, 0.01, 0.05, 0.001])
            .with("subsample", [0.6, 0.7, 0.75, 0.8, 0.85, 0.9])
            .with("n_estimators", ESTIMATOR_COUNTS),
    );
    grids.insert(LINEAR_REGRESSION, ParamGrid::new());
    grids.insert(
        ADABOOST,
        ParamGrid::new()
            .with("learning_rate", [0.1, 0.01, 0.5, 0.001])
            .with("n_estimators", ESTIMATOR_COUNTS),
    );
    grids.insert(KNEIGHBORS, ParamGrid::new().with("n_neighbors", [5, 7, 9, 11]));
    grids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::Regressor;

    #[test]
    fn test_default_catalog_order() {
        let catalog = default_catalog();
        let names: Vec<&str> = catalog.names().collect();
        assert_eq!(
            names,
            vec![
                "Random Forest",
                "Decision Tree",
                "Gradient Boosting",
                "Linear Regression",
                "AdaBoost Regressor",
                "KNeighbors Regressor"
            ]
        );
        assert!(catalog.iter().all(|(_, e)| !e.is_fitted()));
    }

    #[test]
    fn test_default_grids_cover_catalog() {
        let catalog = default_catalog();
        let grids = default_grids();
        assert!(grids.validate().is_ok());
        for name in catalog.names() {
            assert!(grids.get(name).is_some(), "missing grid for {}", name);
        }
        assert_eq!(grids.get(GRADIENT_BOOSTING).unwrap().n_combinations(), 144);
        assert!(grids.get(LINEAR_REGRESSION).unwrap().is_empty());
    }

    #[test]
    fn test_grid_names_are_valid_params() {
        let catalog = default_catalog();
        let grids = default_grids();
        for (name, estimator) in catalog.iter() {
            for params in grids.get(name).unwrap().combinations().unwrap() {
                let mut candidate = estimator.clone_unfitted();
                candidate.set_params(&params).unwrap();
            }
        }
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let catalog = Catalog::new().with("Linear Regression", LinearRegression::new()).unwrap();
        assert!(catalog.with("Linear Regression", LinearRegression::new()).is_err());
    }
}
