//! Training and serving configuration.
//!
//! Plain structs with defaults; the binaries fill them from command line
//! flags and `HOUSE_*` environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::features::ZeroVariance;
use crate::models::{ModelConfig, ModelKind};

/// Everything a training run needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// CSV file with a header row.
    pub dataset_path: PathBuf,
    /// Fetched into `dataset_path` when that file does not exist yet.
    pub dataset_url: Option<String>,
    /// Directory the fitted transformer and model are written to.
    pub artifact_dir: PathBuf,
    /// Fraction of rows held out for evaluation.
    pub test_size: f64,
    pub seed: u64,
    /// Model that gets persisted.
    pub model: ModelKind,
    /// Extra models trained on the same split, reported but not persisted.
    pub baselines: Vec<ModelKind>,
    pub zero_variance: ZeroVariance,
    pub models: ModelConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from("housing.csv"),
            dataset_url: None,
            artifact_dir: PathBuf::from("model"),
            test_size: 0.2,
            seed: 42,
            model: ModelKind::Forest,
            baselines: Vec::new(),
            zero_variance: ZeroVariance::Clamp,
            models: ModelConfig::default(),
        }
    }
}

/// Where the prediction service listens and what it loads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServeConfig {
    pub artifact_dir: PathBuf,
    /// Directory holding `index.html` and the form's scripts.
    pub asset_dir: PathBuf,
    pub addr: SocketAddr,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from("model"),
            asset_dir: PathBuf::from("static"),
            addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
        }
    }
}
