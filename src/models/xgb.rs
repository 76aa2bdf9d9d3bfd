//! Boosted trees trained by libxgboost.
//!
//! Built only with the `xgboost` cargo feature. Hyperparameters come from the
//! same [`BoostingParams`] block as the native [`GradientBoosting`] so the two
//! backends are interchangeable from the CLI.
//!
//! A libxgboost `Booster` handle is neither `Send` nor `Sync`, so the fitted
//! model is kept as the booster's binary dump and a short-lived handle is
//! loaded for each `predict` call. That keeps [`XgbBoosted`] shareable across
//! serving requests like every other [`Model`](super::Model).
//!
//! libxgboost treats exact `0.0` inputs in a dense matrix as missing.
//!
//! [`GradientBoosting`]: super::GradientBoosting

use std::fs;

use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use tracing::debug;
use xgboost::parameters::learning::{LearningTaskParametersBuilder, Objective};
use xgboost::parameters::tree::TreeBoosterParametersBuilder;
use xgboost::parameters::{BoosterParametersBuilder, BoosterType, TrainingParametersBuilder};
use xgboost::{Booster, DMatrix};

use super::{check_training_shape, check_width, BoostingParams, Regressor};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XgbBoosted {
    params: BoostingParams,
    n_features: Option<usize>,
    /// libxgboost binary model, as written by `Booster::save`.
    booster: Vec<u8>,
}

impl XgbBoosted {
    pub fn new(params: BoostingParams) -> Self {
        Self { params, n_features: None, booster: Vec::new() }
    }

    pub fn params(&self) -> &BoostingParams {
        &self.params
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.n_features.is_none() || self.booster.is_empty() {
            return Err(Error::CorruptArtifact("xgboost model was never fitted".into()));
        }
        self.load().map(drop).map_err(|e| Error::CorruptArtifact(e.to_string()))
    }

    fn load(&self) -> Result<Booster> {
        Booster::load_buffer(&self.booster).map_err(backend)
    }
}

impl Regressor for XgbBoosted {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()> {
        check_training_shape(x, y)?;

        let mut dtrain = dense_matrix(x)?;
        let labels: Vec<f32> = y.iter().map(|&v| v as f32).collect();
        dtrain.set_labels(&labels).map_err(backend)?;

        let tree_params = TreeBoosterParametersBuilder::default()
            .eta(self.params.learning_rate as f32)
            .max_depth(self.params.max_depth as u32)
            .min_child_weight(self.params.min_samples_leaf as u32)
            .subsample(self.params.subsample as f32)
            .build()
            .map_err(Error::Backend)?;

        let learning_params = LearningTaskParametersBuilder::default()
            .objective(Objective::RegLinear)
            .base_score(y.mean().unwrap_or(0.0) as f32)
            .seed(self.params.seed)
            .build()
            .map_err(Error::Backend)?;

        let booster_params = BoosterParametersBuilder::default()
            .booster_type(BoosterType::Tree(tree_params))
            .learning_params(learning_params)
            .verbose(false)
            .build()
            .map_err(Error::Backend)?;

        let training_params = TrainingParametersBuilder::default()
            .dtrain(&dtrain)
            .boost_rounds(self.params.n_rounds as u32)
            .booster_params(booster_params)
            .build()
            .map_err(Error::Backend)?;

        let booster = Booster::train(&training_params).map_err(backend)?;

        // Booster::save only writes to a path.
        let dump = tempfile::NamedTempFile::new()?;
        booster.save(dump.path()).map_err(backend)?;
        self.booster = fs::read(dump.path())?;
        self.n_features = Some(x.ncols());
        debug!(rounds = self.params.n_rounds, bytes = self.booster.len(), "xgboost model trained");
        Ok(())
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        check_width(self.n_features, x)?;
        if x.nrows() == 0 {
            return Ok(Array1::zeros(0));
        }
        let booster = self.load()?;
        let predictions = booster.predict(&dense_matrix(x)?).map_err(backend)?;
        Ok(predictions.into_iter().map(f64::from).collect())
    }

    fn n_features(&self) -> Option<usize> {
        self.n_features
    }

    fn name(&self) -> &'static str {
        "XGBoost"
    }
}

fn dense_matrix(x: ArrayView2<f64>) -> Result<DMatrix> {
    let data: Vec<f32> = x.rows().into_iter().flat_map(|r| r.into_iter().map(|&v| v as f32)).collect();
    DMatrix::from_dense(&data, x.nrows()).map_err(backend)
}

fn backend(e: xgboost::XGBError) -> Error {
    Error::Backend(e.to_string())
}
