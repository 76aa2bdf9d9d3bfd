//! Request-level prediction over a loaded transformer/model pair.

use std::sync::Arc;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::features::FittedTransformer;
use crate::models::{Model, Regressor};
use crate::record::Record;
use crate::store::ModelStore;

/// Read-only state shared by every request. Built once at startup.
#[derive(Debug)]
pub struct ServingContext {
    transformer: FittedTransformer,
    model: Model,
}

impl ServingContext {
    pub fn new(transformer: FittedTransformer, model: Model) -> Result<Self> {
        transformer.validate()?;
        model.validate(transformer.n_features())?;
        Ok(Self { transformer, model })
    }

    pub fn load(store: &ModelStore) -> Result<Self> {
        let (transformer, model) = store.load()?;
        Ok(Self { transformer, model })
    }

    pub fn transformer(&self) -> &FittedTransformer {
        &self.transformer
    }

    pub fn model(&self) -> &Model {
        &self.model
    }
}

/// Stateless predictor; clones share the same context.
#[derive(Debug, Clone)]
pub struct PredictionService {
    context: Arc<ServingContext>,
}

impl PredictionService {
    pub fn new(context: Arc<ServingContext>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &ServingContext {
        &self.context
    }

    /// Predicted price for one record, rounded to cents.
    pub fn predict(&self, record: &Record) -> Result<f64> {
        let predictions = self.predict_batch(std::slice::from_ref(record))?;
        Ok(round_to_cents(predictions[0]))
    }

    /// Unrounded predictions for a batch of records.
    pub fn predict_batch(&self, records: &[Record]) -> Result<Vec<f64>> {
        let x = self.context.transformer.transform(records).map_err(as_invalid_request)?;
        let y = self.context.model.predict(x.view())?;
        Ok(y.to_vec())
    }

    /// Decode a JSON request body and predict.
    pub fn predict_json(&self, body: &Value) -> Result<f64> {
        let record = Record::from_json(body).map_err(as_invalid_request)?;
        self.predict(&record)
    }
}

pub fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn as_invalid_request(err: Error) -> Error {
    match err {
        Error::SchemaMismatch(msg) => Error::InvalidRequest(msg),
        other => other,
    }
}
