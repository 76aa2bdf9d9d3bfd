//! Persistence of the fitted transformer and model.
//!
//! An artifact directory holds two JSON documents, each wrapped in a small
//! envelope naming its format and version:
//!
//! ```text
//! model/
//!   transformer.json   {"format": "house-price-transformer", "version": 1, "payload": {...}}
//!   model.json         {"format": "house-price-model", "version": 1, "payload": {"kind": ...}}
//! ```
//!
//! Everything is validated on load, so a mismatched or truncated artifact
//! fails at startup instead of producing wrong predictions later.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::error::{Error, Result};
use crate::features::FittedTransformer;
use crate::models::{Model, Regressor};

pub const TRANSFORMER_FILE: &str = "transformer.json";
pub const MODEL_FILE: &str = "model.json";

const TRANSFORMER_FORMAT: &str = "house-price-transformer";
const MODEL_FORMAT: &str = "house-price-model";
const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    format: &'a str,
    version: u32,
    payload: &'a T,
}

#[derive(Deserialize)]
struct Envelope {
    format: String,
    version: u32,
    payload: Value,
}

/// Reads and writes a transformer/model pair under one directory.
#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn transformer_path(&self) -> PathBuf {
        self.dir.join(TRANSFORMER_FILE)
    }

    pub fn model_path(&self) -> PathBuf {
        self.dir.join(MODEL_FILE)
    }

    /// Persist a fitted pair, creating the directory if needed.
    ///
    /// Refuses pairs that would not load back: non-finite scaling parameters
    /// (JSON has no representation for them) or a model whose input width
    /// differs from the transformer's output width.
    pub fn save(&self, transformer: &FittedTransformer, model: &Model) -> Result<()> {
        if let Some(idx) = transformer
            .means()
            .iter()
            .chain(transformer.scales())
            .position(|v| !v.is_finite())
        {
            let column = &transformer.columns()[idx % transformer.n_features().max(1)];
            return Err(Error::CorruptArtifact(format!(
                "refusing to persist non-finite scaling parameter for column '{column}'"
            )));
        }
        model.validate(transformer.n_features())?;

        fs::create_dir_all(&self.dir)?;
        // Both documents are staged before either replaces the old pair.
        let staged_transformer = stage_json(&self.transformer_path(), TRANSFORMER_FORMAT, transformer)?;
        let staged_model = match stage_json(&self.model_path(), MODEL_FORMAT, model) {
            Ok(path) => path,
            Err(e) => {
                let _ = fs::remove_file(&staged_transformer);
                return Err(e);
            }
        };
        fs::rename(&staged_transformer, self.transformer_path())?;
        fs::rename(&staged_model, self.model_path())?;

        info!(
            dir = %self.dir.display(),
            model = model.name(),
            features = transformer.n_features(),
            "artifacts saved"
        );
        Ok(())
    }

    /// Load and validate a previously saved pair.
    pub fn load(&self) -> Result<(FittedTransformer, Model)> {
        let transformer: FittedTransformer = read_json(&self.transformer_path(), TRANSFORMER_FORMAT)?;
        transformer.validate()?;

        let model: Model = read_json(&self.model_path(), MODEL_FORMAT)?;
        model.validate(transformer.n_features())?;

        info!(
            dir = %self.dir.display(),
            model = model.name(),
            features = transformer.n_features(),
            categories = transformer.vocabulary().len(),
            "artifacts loaded"
        );
        Ok((transformer, model))
    }
}

/// Write the envelope next to `path` and return the staging file.
fn stage_json<T: Serialize>(path: &Path, format: &str, payload: &T) -> Result<PathBuf> {
    let tmp = path.with_extension("json.tmp");
    let mut writer = BufWriter::new(File::create(&tmp)?);
    serde_json::to_writer_pretty(&mut writer, &EnvelopeRef { format, version: FORMAT_VERSION, payload })?;
    writer.flush()?;
    Ok(tmp)
}

fn read_json<T: DeserializeOwned>(path: &Path, format: &str) -> Result<T> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(Error::CorruptArtifact(format!("{} not found", path.display())));
        }
        Err(e) => return Err(e.into()),
    };

    let envelope: Envelope = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| Error::CorruptArtifact(format!("{}: {e}", path.display())))?;

    if envelope.format != format {
        return Err(Error::CorruptArtifact(format!(
            "{}: expected format '{format}', found '{}'",
            path.display(),
            envelope.format
        )));
    }
    if envelope.version != FORMAT_VERSION {
        return Err(Error::CorruptArtifact(format!(
            "{}: unsupported version {} (expected {FORMAT_VERSION})",
            path.display(),
            envelope.version
        )));
    }

    serde_json::from_value(envelope.payload)
        .map_err(|e| Error::CorruptArtifact(format!("{}: {e}", path.display())))
}
