//! Gradient boosted regression trees under squared error.
//!
//! Each round fits a depth-limited [`RegressionTree`] to the current residuals
//! and adds it with shrinkage `learning_rate`. The initial prediction is the
//! training label mean.

use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::tree::{RegressionTree, TreeParams};
use super::{check_training_shape, check_width, Regressor};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoostingParams {
    pub n_rounds: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Fraction of rows drawn without replacement for each round.
    pub subsample: f64,
    pub seed: u64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_rounds: 300,
            learning_rate: 0.05,
            max_depth: 6,
            min_samples_leaf: 1,
            subsample: 1.0,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoosting {
    params: BoostingParams,
    n_features: Option<usize>,
    base_score: f64,
    trees: Vec<RegressionTree>,
}

impl GradientBoosting {
    pub fn new(params: BoostingParams) -> Self {
        Self { params, n_features: None, base_score: 0.0, trees: Vec::new() }
    }

    pub fn params(&self) -> &BoostingParams {
        &self.params
    }

    pub fn base_score(&self) -> f64 {
        self.base_score
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let n_features = self
            .n_features
            .ok_or_else(|| Error::CorruptArtifact("boosted model was never fitted".into()))?;
        self.trees.iter().try_for_each(|t| t.validate(n_features))
    }

    fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_depth: Some(self.params.max_depth),
            min_samples_split: 2,
            min_samples_leaf: self.params.min_samples_leaf,
            max_features: None,
        }
    }
}

impl Regressor for GradientBoosting {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()> {
        check_training_shape(x, y)?;

        let n = x.nrows();
        let tree_params = self.tree_params();
        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let sample_size = ((n as f64 * self.params.subsample).round() as usize).clamp(1, n);

        let base_score = y.mean().unwrap_or(0.0);
        let mut predictions = vec![base_score; n];
        let mut residuals = vec![0.0; n];
        let mut trees = Vec::with_capacity(self.params.n_rounds);

        for round in 0..self.params.n_rounds {
            for ((r, &t), &p) in residuals.iter_mut().zip(y.iter()).zip(&predictions) {
                *r = t - p;
            }

            let samples: Vec<usize> = if sample_size < n {
                rand::seq::index::sample(&mut rng, n, sample_size).into_vec()
            } else {
                (0..n).collect()
            };

            let tree = RegressionTree::fit(x, &residuals, &samples, &tree_params, &mut rng);
            for (i, p) in predictions.iter_mut().enumerate() {
                *p += self.params.learning_rate * tree.predict_row(x.row(i));
            }
            trees.push(tree);

            if (round + 1) % 50 == 0 {
                let mse = residuals.iter().map(|r| r * r).sum::<f64>() / n as f64;
                debug!(round = round + 1, train_rmse = mse.sqrt(), "boosting progress");
            }
        }

        self.base_score = base_score;
        self.trees = trees;
        self.n_features = Some(x.ncols());
        Ok(())
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        check_width(self.n_features, x)?;
        let lr = self.params.learning_rate;
        Ok(x.rows()
            .into_iter()
            .map(|row| {
                self.base_score + lr * self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>()
            })
            .collect())
    }

    fn n_features(&self) -> Option<usize> {
        self.n_features
    }

    fn name(&self) -> &'static str {
        "Gradient Boosting"
    }
}
