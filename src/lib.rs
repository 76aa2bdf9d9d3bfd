//! House price prediction from census block features.
//!
//! The crate root holds the dataset plumbing (download, CSV load, train/test
//! split, record extraction). Feature engineering, models, evaluation,
//! persistence and serving live in their own modules:
//!
//! - [`features`] - log transforms, one-hot encoding, ratios and scaling
//! - [`models`] - linear, random forest and gradient boosted regressors
//! - [`metrics`] - MAE / MSE / RMSE / R²
//! - [`pipeline`] - the offline training run
//! - [`store`] - artifact persistence
//! - [`service`] / [`http`] - prediction serving

use std::path::{Path, PathBuf};

use polars::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info, warn};

pub mod config;
pub mod error;
pub mod features;
pub mod http;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod record;
pub mod service;
pub mod store;
pub mod testing;

pub use config::{ServeConfig, TrainingConfig};
pub use error::{Error, Result};
pub use features::{FeatureTransformer, FittedTransformer, ZeroVariance};
pub use metrics::{evaluate, EvaluationReport};
pub use models::{Model, ModelConfig, ModelKind, Regressor};
pub use pipeline::{TrainingOutcome, TrainingPipeline};
pub use record::Record;
pub use service::{PredictionService, ServingContext};
pub use store::ModelStore;

use record::{CATEGORY_FIELD, LABEL_FIELD, NUMERIC_FIELDS};

/// Fetch a remote CSV and store it at `dest`.
pub fn download_csv_file(url: &str, dest: &Path) -> Result<PathBuf> {
    info!(%url, dest = %dest.display(), "downloading dataset");

    let response = reqwest::blocking::get(url)?.error_for_status()?;
    let bytes = response.bytes()?;

    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(dest, &bytes)?;
    debug!(bytes = bytes.len(), "dataset written");

    Ok(dest.to_path_buf())
}

/// Read a CSV file with a header row.
///
/// Every column is read as text. Numeric parsing happens in
/// [`split_features_and_target`], so a malformed cell anywhere in the file
/// only costs its own row.
pub fn load_csv_file(file_path: &Path) -> Result<DataFrame> {
    let df = CsvReader::from_path(file_path)?
        .has_header(true)
        .infer_schema(Some(0))
        .finish()?;
    info!(rows = df.height(), columns = df.width(), "loaded {}", file_path.display());
    Ok(df)
}

/// Seeded shuffle split. The first `ceil(n * test_size)` shuffled rows form
/// the test set, the remainder the training set.
pub fn train_test_split(
    df: &DataFrame,
    test_size: f64,
    seed: u64,
) -> Result<(DataFrame, DataFrame)> {
    let n = df.height();
    // Tolerate float noise in n * test_size.
    let n_test = (n as f64 * test_size - 1e-9).ceil().max(0.0) as usize;
    if !(test_size > 0.0 && test_size < 1.0) || n_test == 0 || n_test >= n {
        return Err(Error::EmptyDataset(format!(
            "cannot split {n} rows with test_size {test_size} into two non-empty sets"
        )));
    }

    let mut indices: Vec<u32> = (0..n as u32).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let test_indices = UInt32Chunked::from_vec("", indices[..n_test].to_vec());
    let train_indices = UInt32Chunked::from_vec("", indices[n_test..].to_vec());

    let train_df = df.take(&train_indices)?;
    let test_df = df.take(&test_indices)?;
    debug!(train = train_df.height(), test = test_df.height(), "split dataset");

    Ok((train_df, test_df))
}

/// Extract typed records and labels.
///
/// Fails with [`Error::SchemaMismatch`] when a required column is absent.
/// Rows with a null or non-numeric value in any required column, or a
/// missing category, are dropped.
pub fn split_features_and_target(df: &DataFrame) -> Result<(Vec<Record>, Vec<f64>)> {
    let present = df.get_column_names();
    let missing: Vec<&str> = NUMERIC_FIELDS
        .iter()
        .chain([&LABEL_FIELD, &CATEGORY_FIELD])
        .copied()
        .filter(|name| !present.contains(name))
        .collect();
    if !missing.is_empty() {
        return Err(Error::SchemaMismatch(format!("dataset is missing columns {missing:?}")));
    }

    let numeric: Vec<Vec<Option<f64>>> = NUMERIC_FIELDS
        .iter()
        .map(|name| float_column(df, name))
        .collect::<Result<_>>()?;
    let labels = float_column(df, LABEL_FIELD)?;
    let categories = df.column(CATEGORY_FIELD)?.cast(&DataType::Utf8)?;
    let categories = categories.utf8()?;

    let mut records = Vec::with_capacity(df.height());
    let mut targets = Vec::with_capacity(df.height());
    let mut dropped = 0usize;

    for (row, (label, category)) in labels.iter().zip(categories.into_iter()).enumerate() {
        let mut values = [0.0; 8];
        let complete = values
            .iter_mut()
            .zip(&numeric)
            .all(|(slot, column)| column[row].map(|v| *slot = v).is_some());

        match (complete, label, category) {
            (true, Some(label), Some(category)) => {
                records.push(Record::from_values(values, Some(category.to_string())));
                targets.push(*label);
            }
            _ => dropped += 1,
        }
    }

    if dropped > 0 {
        warn!(dropped, kept = records.len(), "dropped rows with missing or malformed values");
    }
    if records.is_empty() {
        return Err(Error::EmptyDataset("no complete rows in dataset".into()));
    }

    Ok((records, targets))
}

fn float_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = df.column(name)?.cast(&DataType::Float64)?;
    Ok(series.f64()?.into_iter().collect())
}
