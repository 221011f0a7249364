//! Model serialization utilities
//!
//! A fitted [`Estimator`] is written as a bincode envelope carrying magic
//! bytes, a format version, metadata and an FNV-1a checksum of the model
//! payload.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{EvalError, Result};
use crate::training::{Classifier, Estimator};

/// Model metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Model name
    pub name: String,
    /// Model version
    pub version: String,
    /// Save timestamp (RFC 3339)
    pub trained_at: String,
    /// Feature names
    pub feature_names: Vec<String>,
    /// Target name
    pub target_name: String,
    /// Model type
    pub model_type: String,
    /// Evaluation metrics recorded at save time
    pub metrics: BTreeMap<String, f64>,
    /// Additional metadata
    pub extra: BTreeMap<String, String>,
}

impl Default for ModelMetadata {
    fn default() -> Self {
        Self {
            name: "model".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            trained_at: String::new(),
            feature_names: Vec::new(),
            target_name: "class".to_string(),
            model_type: "unknown".to_string(),
            metrics: BTreeMap::new(),
            extra: BTreeMap::new(),
        }
    }
}

impl ModelMetadata {
    /// Create new metadata with name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set feature names
    pub fn with_features(mut self, features: Vec<String>) -> Self {
        self.feature_names = features;
        self
    }

    /// Set target name
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target_name = target.into();
        self
    }

    /// Add metric
    pub fn add_metric(mut self, key: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(key.into(), value);
        self
    }

    pub fn add_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// On-disk envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedModel {
    /// Magic bytes for format detection
    pub magic: [u8; 4],
    /// Format version
    pub format_version: u32,
    /// Model metadata
    pub metadata: ModelMetadata,
    /// bincode-encoded [`Estimator`]
    pub model_data: Vec<u8>,
    /// Checksum for integrity verification
    pub checksum: u64,
}

impl SerializedModel {
    pub const MAGIC: [u8; 4] = *b"CEVM";
    /// Current format version
    pub const VERSION: u32 = 1;

    /// Create new serialized model
    pub fn new(metadata: ModelMetadata, model_data: Vec<u8>) -> Self {
        let checksum = Self::compute_checksum(&model_data);
        Self {
            magic: Self::MAGIC,
            format_version: Self::VERSION,
            metadata,
            model_data,
            checksum,
        }
    }

    /// Compute checksum using FNV-1a hash
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

    /// Verify checksum
    pub fn verify_checksum(&self) -> bool {
        Self::compute_checksum(&self.model_data) == self.checksum
    }

    /// Magic, version and checksum checks, in that order
    pub fn validate(&self) -> Result<()> {
        if self.magic != Self::MAGIC {
            return Err(EvalError::SerializationError(format!(
                "not a classeval model file (magic {:?})",
                self.magic
            )));
        }
        if self.format_version != Self::VERSION {
            return Err(EvalError::SerializationError(format!(
                "unsupported format version {} (expected {})",
                self.format_version,
                Self::VERSION
            )));
        }
        if !self.verify_checksum() {
            return Err(EvalError::SerializationError(
                "Checksum verification failed - file may be corrupted".to_string(),
            ));
        }
        Ok(())
    }
}

/// Conventional file name for a finalized model: `final_<Name>_model.sav`,
/// with spaces in the name replaced by underscores.
pub fn final_model_path(dir: impl AsRef<Path>, name: &str) -> PathBuf {
    dir.as_ref().join(format!("final_{}_model.sav", name.replace(' ', "_")))
}

/// Save a model to file. The model type and timestamp are filled in.
pub fn save_model(model: &Estimator, path: impl AsRef<Path>, metadata: ModelMetadata) -> Result<()> {
    let path = path.as_ref();
    let model_data = bincode::serialize(model)?;

    let mut metadata = metadata;
    metadata.model_type = model.kind().to_string();
    metadata.trained_at = Utc::now().to_rfc3339();

    let serialized = SerializedModel::new(metadata, model_data);

    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    bincode::serialize_into(&mut writer, &serialized)?;
    writer.flush()?;

    info!(
        path = %path.display(),
        model = %serialized.metadata.name,
        bytes = serialized.model_data.len(),
        "model saved"
    );
    Ok(())
}

/// Load a model from file, verifying the envelope first
pub fn load_model(path: impl AsRef<Path>) -> Result<(Estimator, ModelMetadata)> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let serialized: SerializedModel = bincode::deserialize_from(reader)?;
    serialized.validate()?;

    let model: Estimator = bincode::deserialize(&serialized.model_data)?;
    debug!(path = %path.display(), kind = model.kind(), "model loaded");
    Ok((model, serialized.metadata))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::LogisticRegression;
    use ndarray::array;
    use tempfile::tempdir;

    fn fitted() -> Estimator {
        let x = array![[0.0, 1.0], [1.0, 0.0], [3.0, 4.0], [4.0, 3.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];
        let mut model: Estimator = LogisticRegression::new().into();
        model.fit(&x, &y).unwrap();
        model
    }

    #[test]
    fn test_serialized_model_checksum() {
        let data = vec![1, 2, 3, 4, 5];
        let metadata = ModelMetadata::new("test");
        let serialized = SerializedModel::new(metadata, data);

        assert!(serialized.verify_checksum());
        assert!(serialized.validate().is_ok());
    }

    #[test]
    fn test_serialized_model_checksum_failure() {
        let data = vec![1, 2, 3, 4, 5];
        let metadata = ModelMetadata::new("test");
        let mut serialized = SerializedModel::new(metadata, data);

        // Corrupt the data
        serialized.model_data[0] = 99;

        assert!(!serialized.verify_checksum());
        assert!(serialized.validate().is_err());
    }

    #[test]
    fn test_bad_magic_and_version() {
        let mut serialized = SerializedModel::new(ModelMetadata::new("m"), vec![1]);
        serialized.magic = *b"XXXX";
        assert!(serialized.validate().unwrap_err().to_string().contains("magic"));

        let mut serialized = SerializedModel::new(ModelMetadata::new("m"), vec![1]);
        serialized.format_version = 99;
        assert!(serialized.validate().unwrap_err().to_string().contains("version"));
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = final_model_path(dir.path(), "Logistic Regression");
        assert!(path.ends_with("final_Logistic_Regression_model.sav"));

        let model = fitted();
        let metadata = ModelMetadata::new("Logistic Regression").add_metric("accuracy", 1.0);
        save_model(&model, &path, metadata).unwrap();

        let (loaded, meta) = load_model(&path).unwrap();
        assert_eq!(meta.name, "Logistic Regression");
        assert_eq!(meta.model_type, "LogisticRegression");
        assert!(!meta.trained_at.is_empty());

        let x = array![[0.5, 0.5], [3.5, 3.5]];
        assert_eq!(loaded.predict_proba(&x).unwrap(), model.predict_proba(&x).unwrap());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let err = load_model(dir.path().join("nope.sav")).unwrap_err();
        assert!(matches!(err, EvalError::IoError(_)));
    }

    #[test]
    fn test_load_corrupted_payload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.sav");
        let mut serialized = SerializedModel::new(ModelMetadata::new("m"), bincode::serialize(&fitted()).unwrap());
        serialized.checksum ^= 1;
        std::fs::write(&path, bincode::serialize(&serialized).unwrap()).unwrap();

        let err = load_model(&path).unwrap_err();
        assert!(err.to_string().contains("Checksum"));
    }
}
