//! Model selection
//!
//! Grid search over each catalog entry, validation scoring, and selection
//! of the single best model.

pub mod catalog;
pub mod evaluator;
pub mod grid;
pub mod search;
pub mod trainer;

pub use crate::config::FailurePolicy;
pub use catalog::{default_catalog, default_grids, Catalog};
pub use evaluator::{CandidateFailure, CandidateScore, ModelEvaluator, ScoreReport};
pub use grid::{GridAxis, GridTable, ParamGrid};
pub use search::{GridSearch, SearchResult};
pub use trainer::{ModelTrainer, TrainingOutcome};
