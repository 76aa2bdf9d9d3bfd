//! Error types shared by training, persistence and serving.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the housing price library.
#[derive(Error, Debug)]
pub enum Error {
    /// A record or table lacks a required field, or a feature row has the wrong width.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A training column has zero variance and the scaler was told to reject it.
    #[error("degenerate column '{column}': zero variance across the training set")]
    DegenerateColumn {
        /// Name of the constant column
        column: String,
    },

    /// Two inputs that must line up do not.
    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Expected length or width
        expected: usize,
        /// Observed length or width
        actual: usize,
    },

    /// A persisted artifact could not be read back into a usable shape.
    #[error("corrupt artifact: {0}")]
    CorruptArtifact(String),

    /// A prediction request body is malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No usable rows remain for a stage that needs them.
    #[error("empty dataset: {0}")]
    EmptyDataset(String),

    /// A model was asked to predict before being fitted.
    #[error("model has not been fitted")]
    NotFitted,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV / dataframe error
    #[error("dataframe error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Dataset download error
    #[error("download failed: {0}")]
    Download(#[from] reqwest::Error),

    /// libxgboost rejected parameters or failed to train/predict
    #[cfg(feature = "xgboost")]
    #[error("xgboost: {0}")]
    Backend(String),
}

impl Error {
    /// Whether this error was caused by the caller's input rather than by the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidRequest(_) | Error::SchemaMismatch(_) | Error::ShapeMismatch { .. }
        )
    }
}
