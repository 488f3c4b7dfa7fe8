use std::path::PathBuf;
use crate::feature::FeatureName;
pub type Result<T> = std::result::Result<T, DatasetError>;
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("`{0}` draws random numbers and cannot run in test mode")]
    InvalidMode(&'static str),
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),
    #[error("Crop size {crop_size} exceeds time length {len}")]
    CropTooLarge { crop_size: usize, len: usize },
    #[error("Feature `{0}` is not present")]
    MissingFeature(FeatureName),
    #[error("Unknown feature name `{0}`")]
    UnknownFeature(String),
    #[error("Index {index} out of range for dataset of {len} examples")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("Feature extraction failed: {0}")]
    Extraction(String),
    #[error("Audio error: {0:#}")]
    Audio(#[from] anyhow::Error),
    #[error("Feature file {path} is missing field `{field}`")]
    PersistenceMismatch { path: PathBuf, field: String },
    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("NPZ read error: {0}")]
    NpzRead(#[from] ndarray_npy::ReadNpzError),
    #[error("NPZ write error: {0}")]
    NpzWrite(#[from] ndarray_npy::WriteNpzError),
    #[error("Ndarray shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error("Config error: {0}")]
    Config(String),
}
impl DatasetError {
    /// Shape, key, width and mode violations: programming or data-layout errors
    /// that no caller should retry.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::InvalidMode(_)
                | Self::ShapeMismatch(_)
                | Self::CropTooLarge { .. }
                | Self::MissingFeature(_)
                | Self::UnknownFeature(_)
                | Self::IndexOutOfRange { .. }
                | Self::Shape(_)
        )
    }
}
