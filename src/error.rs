//! Error types for the model trainer

use thiserror::Error;

/// Result type alias for trainer operations
pub type Result<T> = std::result::Result<T, TrainerError>;

/// Main error type for the model trainer
#[derive(Error, Debug)]
pub enum TrainerError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("No adequate model found: best was {best_model} with R² {best_score:.4}, threshold {threshold}")]
    NoAdequateModel {
        best_model: String,
        best_score: f64,
        threshold: f64,
    },

    /// Application-level wrapper carrying the failed stage and its cause
    #[error("{context}")]
    Pipeline {
        context: String,
        #[source]
        source: Box<TrainerError>,
    },
}

impl TrainerError {
    /// Wrap this error with pipeline context
    pub fn wrap(self, context: impl Into<String>) -> Self {
        TrainerError::Pipeline {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error underneath any pipeline wrappers
    pub fn root_cause(&self) -> &TrainerError {
        let mut err = self;
        while let TrainerError::Pipeline { source, .. } = err {
            err = source;
        }
        err
    }

    /// Every message in the wrapper chain, outermost first, joined by `: `
    pub fn chain_message(&self) -> String {
        let mut parts = Vec::new();
        let mut err = self;
        loop {
            match err {
                TrainerError::Pipeline { context, source } => {
                    parts.push(context.clone());
                    err = source;
                }
                inner => {
                    parts.push(inner.to_string());
                    break;
                }
            }
        }
        parts.join(": ")
    }

    pub(crate) fn invalid_param(
        name: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        TrainerError::InvalidParameter {
            name: name.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<polars::error::PolarsError> for TrainerError {
    fn from(err: polars::error::PolarsError) -> Self {
        TrainerError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for TrainerError {
    fn from(err: serde_json::Error) -> Self {
        TrainerError::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for TrainerError {
    fn from(err: bincode::Error) -> Self {
        TrainerError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for TrainerError {
    fn from(err: ndarray::ShapeError) -> Self {
        TrainerError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
