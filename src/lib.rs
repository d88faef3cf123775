//! Model trainer - grid-search model selection for tabular regression
//!
//! Given a training table and a validation table (features in every column
//! but the last, target in the last), the trainer grid-searches each
//! candidate in a catalog of regressors with k-fold cross-validation,
//! scores the tuned candidates on the validation table with R², and
//! persists the single best model once it clears a score threshold.
//!
//! # Modules
//!
//! - [`training`] - Native regressors, cross-validation and metrics
//! - [`selection`] - Parameter grids, grid search, evaluation and the trainer
//! - [`export`] - Artifact envelope with atomic save and verified load
//! - [`config`] - Trainer configuration
//! - [`utils`] - CSV loading and table splitting
//! - [`cli`] - Command-line interface
//!
//! # Example
//!
//! ```no_run
//! use model_trainer::prelude::*;
//!
//! # fn main() -> model_trainer::Result<()> {
//! let loader = DataLoader::new();
//! let train = loader.load_array("data/train.csv")?;
//! let valid = loader.load_array("data/valid.csv")?;
//!
//! let trainer = ModelTrainer::new(TrainerConfig::default().with_threshold(0.7));
//! let score = trainer.train(&train, &valid)?;
//! println!("best validation R²: {:.4}", score);
//! # Ok(())
//! # }
//! ```

pub mod error;

pub mod config;
pub mod export;
pub mod selection;
pub mod training;
pub mod utils;

pub mod cli;

pub use error::{Result, TrainerError};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{Result, TrainerError};

    pub use crate::config::{FailurePolicy, TrainerConfig};

    pub use crate::training::{
        cross_val_score, r2_score, Estimator, KFold, ParamValue, Params, RegressionMetrics,
        Regressor,
    };

    pub use crate::selection::{
        default_catalog, default_grids, Catalog, GridTable, ModelEvaluator, ModelTrainer,
        ParamGrid, ScoreReport, TrainingOutcome,
    };

    pub use crate::export::{load_artifact, save_artifact, ArtifactMetadata, ModelArtifact, SerializationFormat};

    pub use crate::utils::{split_features_target, DataLoader, DataSaver};
}
