//! Regression models behind a common fit/predict interface.
//!
//! The pipeline and the serving layer only see [`Regressor`]; [`Model`] is the
//! serialisable sum of the concrete implementations.

pub mod boosting;
pub mod forest;
pub mod linear;
pub mod tree;
#[cfg(feature = "xgboost")]
pub mod xgb;

use std::fmt;

use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use boosting::{BoostingParams, GradientBoosting};
pub use forest::{ForestParams, RandomForest};
pub use linear::{LinearParams, LinearRegression};
pub use tree::{RegressionTree, TreeParams};
#[cfg(feature = "xgboost")]
pub use xgb::XgbBoosted;

/// A regression capability over dense feature matrices.
pub trait Regressor {
    /// Learn parameters from `x` (rows × features) and labels `y`.
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()>;

    /// Predict one value per row of `x`.
    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>>;

    /// Input width seen at fit time; `None` before fitting.
    fn n_features(&self) -> Option<usize>;

    /// Human readable model name for reports.
    fn name(&self) -> &'static str;
}

/// Which algorithm backs a [`Model`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Linear,
    Forest,
    Boosted,
    /// Boosted trees trained by libxgboost, from the `boosting` parameters.
    #[cfg(feature = "xgboost")]
    Xgboost,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModelKind::Linear => "linear",
            ModelKind::Forest => "forest",
            ModelKind::Boosted => "boosted",
            #[cfg(feature = "xgboost")]
            ModelKind::Xgboost => "xgboost",
        };
        f.write_str(s)
    }
}

/// Hyperparameters for every model kind; only the selected kind's block is used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub linear: LinearParams,
    pub forest: ForestParams,
    pub boosting: BoostingParams,
}

impl ModelKind {
    /// Create an unfitted model of this kind.
    pub fn build(self, config: &ModelConfig) -> Model {
        match self {
            ModelKind::Linear => Model::Linear(LinearRegression::new(config.linear)),
            ModelKind::Forest => Model::Forest(RandomForest::new(config.forest)),
            ModelKind::Boosted => Model::Boosted(GradientBoosting::new(config.boosting)),
            #[cfg(feature = "xgboost")]
            ModelKind::Xgboost => Model::Xgboost(XgbBoosted::new(config.boosting)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Model {
    Linear(LinearRegression),
    Forest(RandomForest),
    Boosted(GradientBoosting),
    #[cfg(feature = "xgboost")]
    Xgboost(XgbBoosted),
}

impl Model {
    pub fn kind(&self) -> ModelKind {
        match self {
            Model::Linear(_) => ModelKind::Linear,
            Model::Forest(_) => ModelKind::Forest,
            Model::Boosted(_) => ModelKind::Boosted,
            #[cfg(feature = "xgboost")]
            Model::Xgboost(_) => ModelKind::Xgboost,
        }
    }

    fn inner(&self) -> &dyn Regressor {
        match self {
            Model::Linear(m) => m,
            Model::Forest(m) => m,
            Model::Boosted(m) => m,
            #[cfg(feature = "xgboost")]
            Model::Xgboost(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Regressor {
        match self {
            Model::Linear(m) => m,
            Model::Forest(m) => m,
            Model::Boosted(m) => m,
            #[cfg(feature = "xgboost")]
            Model::Xgboost(m) => m,
        }
    }

    /// Check that a model read back from storage is fitted, internally
    /// consistent and expects `n_features` inputs.
    pub fn validate(&self, n_features: usize) -> Result<()> {
        match self {
            Model::Linear(m) => m.validate()?,
            Model::Forest(m) => m.validate()?,
            Model::Boosted(m) => m.validate()?,
            #[cfg(feature = "xgboost")]
            Model::Xgboost(m) => m.validate()?,
        }
        match self.n_features() {
            Some(n) if n == n_features => Ok(()),
            Some(n) => Err(Error::CorruptArtifact(format!(
                "model expects {n} features, transformer produces {n_features}"
            ))),
            None => Err(Error::CorruptArtifact("model was never fitted".into())),
        }
    }
}

impl Regressor for Model {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()> {
        self.inner_mut().fit(x, y)
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        self.inner().predict(x)
    }

    fn n_features(&self) -> Option<usize> {
        self.inner().n_features()
    }

    fn name(&self) -> &'static str {
        self.inner().name()
    }
}

pub(crate) fn check_training_shape(x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(Error::ShapeMismatch { expected: x.nrows(), actual: y.len() });
    }
    if x.nrows() == 0 {
        return Err(Error::EmptyDataset("no training rows".into()));
    }
    Ok(())
}

pub(crate) fn check_width(n_features: Option<usize>, x: ArrayView2<f64>) -> Result<()> {
    match n_features {
        None => Err(Error::NotFitted),
        Some(n) if n != x.ncols() => Err(Error::ShapeMismatch { expected: n, actual: x.ncols() }),
        Some(_) => Ok(()),
    }
}
