//! Model artifact serialization
//!
//! An artifact is an envelope holding the encoded estimator, its metadata
//! and an FNV-1a checksum of the encoded bytes. Binary artifacts start with
//! the magic bytes; JSON artifacts are a single object.

use crate::error::{Result, TrainerError};
use crate::training::{Estimator, Params};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Serialization format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerializationFormat {
    /// Binary format using bincode (efficient)
    #[default]
    Binary,
    /// JSON format (portable, human-readable)
    Json,
}

impl fmt::Display for SerializationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerializationFormat::Binary => f.write_str("binary"),
            SerializationFormat::Json => f.write_str("json"),
        }
    }
}

impl FromStr for SerializationFormat {
    type Err = TrainerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "binary" | "bin" => Ok(SerializationFormat::Binary),
            "json" => Ok(SerializationFormat::Json),
            other => Err(TrainerError::ConfigError(format!(
                "unknown artifact format '{}', expected binary or json",
                other
            ))),
        }
    }
}

/// Description of the persisted model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    /// Catalog name of the selected model
    pub name: String,
    /// Estimator algorithm
    pub algorithm: String,
    /// Hyperparameters as `(name, value)` text pairs
    pub hyperparameters: Vec<(String, String)>,
    /// Validation R² that won the selection
    pub validation_score: f64,
    /// Number of input features the model expects
    pub n_features: usize,
    /// Training timestamp (RFC 3339)
    pub trained_at: String,
    /// Version of the crate that wrote the artifact
    pub crate_version: String,
}

impl ArtifactMetadata {
    pub fn new(name: impl Into<String>, algorithm: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            algorithm: algorithm.into(),
            hyperparameters: Vec::new(),
            validation_score: f64::NAN,
            n_features: 0,
            trained_at: Utc::now().to_rfc3339(),
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn with_params(mut self, params: &Params) -> Self {
        self.hyperparameters = params
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        self
    }

    pub fn with_validation_score(mut self, score: f64) -> Self {
        self.validation_score = score;
        self
    }

    pub fn with_n_features(mut self, n_features: usize) -> Self {
        self.n_features = n_features;
        self
    }
}

/// Serialized model envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// Magic bytes for format detection
    pub magic: [u8; 4],
    /// Format version
    pub format_version: u32,
    /// Encoding of `model_data`
    pub encoding: SerializationFormat,
    /// Model metadata
    pub metadata: ArtifactMetadata,
    /// Encoded estimator
    pub model_data: Vec<u8>,
    /// Checksum for integrity verification
    pub checksum: u64,
}

impl ModelArtifact {
    /// Magic bytes for model-trainer artifacts
    pub const MAGIC: [u8; 4] = *b"MTRA";
    /// Current format version
    pub const VERSION: u32 = 1;

    /// Encode `model` with `encoding` and wrap it with `metadata`
    pub fn new(
        metadata: ArtifactMetadata,
        model: &Estimator,
        encoding: SerializationFormat,
    ) -> Result<Self> {
        let model_data = match encoding {
            SerializationFormat::Binary => bincode::serialize(model)?,
            SerializationFormat::Json => serde_json::to_vec(model)?,
        };
        let checksum = compute_checksum(&model_data);
        Ok(Self {
            magic: Self::MAGIC,
            format_version: Self::VERSION,
            encoding,
            metadata,
            model_data,
            checksum,
        })
    }

    /// Check magic, version and checksum
    pub fn verify(&self) -> Result<()> {
        if self.magic != Self::MAGIC {
            return Err(TrainerError::SerializationError(
                "not a model artifact (bad magic bytes)".to_string(),
            ));
        }
        if self.format_version != Self::VERSION {
            return Err(TrainerError::SerializationError(format!(
                "unsupported artifact version {} (expected {})",
                self.format_version,
                Self::VERSION
            )));
        }
        if compute_checksum(&self.model_data) != self.checksum {
            return Err(TrainerError::SerializationError(
                "checksum verification failed - artifact may be corrupted".to_string(),
            ));
        }
        Ok(())
    }

    /// Decode the stored estimator
    pub fn model(&self) -> Result<Estimator> {
        self.verify()?;
        let model = match self.encoding {
            SerializationFormat::Binary => bincode::deserialize(&self.model_data)?,
            SerializationFormat::Json => serde_json::from_slice(&self.model_data)?,
        };
        Ok(model)
    }

    pub fn metadata(&self) -> &ArtifactMetadata {
        &self.metadata
    }
}

/// FNV-1a hash
fn compute_checksum(data: &[u8]) -> u64 {
    const FNV_OFFSET: u64 = 14695981039346656037;
    const FNV_PRIME: u64 = 1099511628211;

    let mut hash = FNV_OFFSET;
    for byte in data {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    path.with_file_name(format!(".{}.tmp", file_name))
}

/// Write `artifact` to `path`, replacing any previous artifact.
///
/// Parent directories are created. Bytes go to a sibling temporary file
/// that is renamed over `path`, so readers see either the old or the new
/// artifact.
pub fn save_artifact(
    path: impl AsRef<Path>,
    artifact: &ModelArtifact,
    format: SerializationFormat,
) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let temp_path = temp_path_for(path);
    let written = write_envelope(&temp_path, artifact, format)
        .and_then(|()| fs::rename(&temp_path, path).map_err(TrainerError::from));
    if written.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    written
}

fn write_envelope(path: &Path, artifact: &ModelArtifact, format: SerializationFormat) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    match format {
        SerializationFormat::Binary => bincode::serialize_into(&mut writer, artifact)?,
        SerializationFormat::Json => serde_json::to_writer_pretty(&mut writer, artifact)?,
    }
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(())
}

/// Read and verify an artifact, detecting the envelope format
pub fn load_artifact(path: impl AsRef<Path>) -> Result<ModelArtifact> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| {
        TrainerError::SerializationError(format!("cannot read {}: {}", path.display(), e))
    })?;

    let artifact: ModelArtifact = if bytes.starts_with(&ModelArtifact::MAGIC) {
        bincode::deserialize(&bytes)?
    } else if bytes.iter().find(|b| !b.is_ascii_whitespace()) == Some(&b'{') {
        serde_json::from_slice(&bytes)?
    } else {
        return Err(TrainerError::SerializationError(format!(
            "{} is not a model artifact",
            path.display()
        )));
    };

    artifact.verify()?;
    Ok(artifact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::{LinearRegression, Regressor};
    use ndarray::array;

    fn fitted_model() -> Estimator {
        let mut model = Estimator::from(LinearRegression::new());
        model
            .fit(&array![[1.0], [2.0], [3.0]], &array![2.0, 4.0, 6.0])
            .unwrap();
        model
    }

    fn artifact(format: SerializationFormat) -> ModelArtifact {
        let model = fitted_model();
        let metadata = ArtifactMetadata::new("Linear Regression", model.algorithm())
            .with_params(&model.params())
            .with_validation_score(1.0)
            .with_n_features(1);
        ModelArtifact::new(metadata, &model, format).unwrap()
    }

    #[test]
    fn test_checksum() {
        let mut artifact = artifact(SerializationFormat::Binary);
        assert!(artifact.verify().is_ok());

        artifact.model_data[0] ^= 0xFF;
        assert!(artifact.verify().is_err());
        assert!(artifact.model().is_err());
    }

    #[test]
    fn test_metadata_builder() {
        let artifact = artifact(SerializationFormat::Json);
        let metadata = artifact.metadata();
        assert_eq!(metadata.name, "Linear Regression");
        assert_eq!(metadata.algorithm, "LinearRegression");
        assert_eq!(
            metadata.hyperparameters,
            vec![("fit_intercept".to_string(), "true".to_string())]
        );
        assert_eq!(metadata.crate_version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_save_load_both_formats() {
        let dir = tempfile::tempdir().unwrap();
        for format in [SerializationFormat::Binary, SerializationFormat::Json] {
            let path = dir.path().join(format!("model.{}", format));
            save_artifact(&path, &artifact(format), format).unwrap();

            let loaded = load_artifact(&path).unwrap();
            let model = loaded.model().unwrap();
            let preds = model.predict(&array![[4.0]]).unwrap();
            assert!((preds[0] - 8.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_corrupted_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        save_artifact(&path, &artifact(SerializationFormat::Binary), SerializationFormat::Binary)
            .unwrap();

        // Last byte of the model payload sits just before the 8-byte checksum
        let mut bytes = fs::read(&path).unwrap();
        let idx = bytes.len() - 9;
        bytes[idx] ^= 0xFF;
        fs::write(&path, bytes).unwrap();

        assert!(load_artifact(&path).is_err());
    }

    #[test]
    fn test_unknown_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        fs::write(&path, b"not an artifact").unwrap();
        assert!(matches!(
            load_artifact(&path),
            Err(TrainerError::SerializationError(_))
        ));
    }

    #[test]
    fn test_no_temp_file_left() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("model.bin");
        save_artifact(&path, &artifact(SerializationFormat::Binary), SerializationFormat::Binary)
            .unwrap();

        let names: Vec<String> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["model.bin".to_string()]);
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("json".parse::<SerializationFormat>().unwrap(), SerializationFormat::Json);
        assert_eq!("BINARY".parse::<SerializationFormat>().unwrap(), SerializationFormat::Binary);
        assert!("pickle".parse::<SerializationFormat>().is_err());
    }
}
