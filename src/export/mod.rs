//! Model artifact persistence
//!
//! The selected estimator is written as a single artifact in either a
//! binary (bincode) or JSON envelope with integrity checks.

mod serializer;

pub use serializer::{
    load_artifact, save_artifact, ArtifactMetadata, ModelArtifact, SerializationFormat,
};
