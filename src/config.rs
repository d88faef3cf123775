//! Trainer configuration

use crate::error::{Result, TrainerError};
use crate::export::SerializationFormat;
use crate::selection::GridTable;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// What the evaluator does when one catalog entry fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// First failure aborts the whole evaluation
    #[default]
    Abort,
    /// Record the failure and keep scoring the remaining candidates
    Isolate,
}

/// Configuration for a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Where the selected model is written
    pub artifact_path: PathBuf,

    /// Minimum validation R² the best model must reach
    pub score_threshold: f64,

    /// Folds for the internal grid-search cross-validation
    pub cv_folds: usize,

    /// Seed for fold shuffling
    pub random_state: Option<u64>,

    /// Per-candidate failure handling
    pub failure_policy: FailurePolicy,

    /// Artifact encoding
    pub artifact_format: SerializationFormat,

    /// Replacement grids keyed by catalog name; `None` uses the defaults
    pub grids: Option<GridTable>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            artifact_path: PathBuf::from("artifacts").join("model.bin"),
            score_threshold: 0.8,
            cv_folds: 3,
            random_state: Some(42),
            failure_policy: FailurePolicy::Abort,
            artifact_format: SerializationFormat::Binary,
            grids: None,
        }
    }
}

impl TrainerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the artifact path
    pub fn with_artifact_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifact_path = path.into();
        self
    }

    /// Builder method to set the acceptance threshold
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.score_threshold = threshold;
        self
    }

    /// Builder method to set the number of CV folds
    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    pub fn with_random_state(mut self, seed: Option<u64>) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_artifact_format(mut self, format: SerializationFormat) -> Self {
        self.artifact_format = format;
        self
    }

    pub fn with_grids(mut self, grids: GridTable) -> Self {
        self.grids = Some(grids);
        self
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if !self.score_threshold.is_finite() {
            return Err(TrainerError::ConfigError(format!(
                "score_threshold must be finite, got {}",
                self.score_threshold
            )));
        }
        if self.cv_folds < 2 {
            return Err(TrainerError::ConfigError(format!(
                "cv_folds must be at least 2, got {}",
                self.cv_folds
            )));
        }
        if self.artifact_path.as_os_str().is_empty() {
            return Err(TrainerError::ConfigError(
                "artifact_path must not be empty".to_string(),
            ));
        }
        if let Some(grids) = &self.grids {
            grids.validate()?;
        }
        Ok(())
    }

    /// Load a configuration from a JSON file; missing keys take defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|e| {
            TrainerError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&data)
            .map_err(|e| TrainerError::ConfigError(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save the configuration as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
