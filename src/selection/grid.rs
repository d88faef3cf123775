//! Hyperparameter grids

use crate::error::{Result, TrainerError};
use crate::training::{ParamValue, Params};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Candidate values for one hyperparameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridAxis {
    pub name: String,
    pub values: Vec<ParamValue>,
}

/// Ordered hyperparameter axes searched exhaustively
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamGrid {
    axes: Vec<GridAxis>,
}

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an axis, replacing an existing axis of the same name
    pub fn with<V: Into<ParamValue>>(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let axis = GridAxis {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        };
        match self.axes.iter_mut().find(|a| a.name == axis.name) {
            Some(existing) => *existing = axis,
            None => self.axes.push(axis),
        }
        self
    }

    pub fn axes(&self) -> &[GridAxis] {
        &self.axes
    }

    /// No axes means no search
    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    /// Size of the Cartesian product
    pub fn n_combinations(&self) -> usize {
        self.axes.iter().map(|a| a.values.len()).product()
    }

    /// Every axis must offer at least one value
    pub fn validate(&self) -> Result<()> {
        match self.axes.iter().find(|a| a.values.is_empty()) {
            Some(axis) => Err(TrainerError::ConfigError(format!(
                "grid axis '{}' has no candidate values",
                axis.name
            ))),
            None => Ok(()),
        }
    }

    /// Cartesian product with the first axis varying slowest.
    ///
    /// An empty grid yields a single empty assignment.
    pub fn combinations(&self) -> Result<Vec<Params>> {
        self.validate()?;

        let mut combos = vec![Params::new()];
        for axis in &self.axes {
            combos = combos
                .into_iter()
                .flat_map(|prefix| {
                    axis.values
                        .iter()
                        .map(move |value| prefix.clone().with(axis.name.clone(), value.clone()))
                })
                .collect();
        }
        Ok(combos)
    }
}

/// Grids keyed by catalog entry name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GridTable(BTreeMap<String, ParamGrid>);

impl GridTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, grid: ParamGrid) {
        self.0.insert(name.into(), grid);
    }

    pub fn get(&self, name: &str) -> Option<&ParamGrid> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamGrid)> {
        self.0.iter().map(|(n, g)| (n.as_str(), g))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        for (name, grid) in &self.0 {
            grid.validate()
                .map_err(|e| e.wrap(format!("grid for '{}'", name)))?;
        }
        Ok(())
    }
}

impl FromIterator<(String, ParamGrid)> for GridTable {
    fn from_iter<I: IntoIterator<Item = (String, ParamGrid)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
