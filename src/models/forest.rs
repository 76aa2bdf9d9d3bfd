//! Random forest regressor: bagged CART trees averaged at prediction time.

use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::tree::{RegressionTree, TreeParams};
use super::{check_training_shape, check_width, Regressor};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: usize,
    pub tree: TreeParams,
    /// Sample rows with replacement for each tree.
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self { n_trees: 200, tree: TreeParams::default(), bootstrap: true, seed: 42 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    params: ForestParams,
    n_features: Option<usize>,
    trees: Vec<RegressionTree>,
}

impl RandomForest {
    pub fn new(params: ForestParams) -> Self {
        Self { params, n_features: None, trees: Vec::new() }
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let n_features = self
            .n_features
            .ok_or_else(|| Error::CorruptArtifact("forest was never fitted".into()))?;
        if self.trees.is_empty() {
            return Err(Error::CorruptArtifact("forest has no trees".into()));
        }
        self.trees.iter().try_for_each(|t| t.validate(n_features))
    }
}

impl Regressor for RandomForest {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()> {
        check_training_shape(x, y)?;
        if self.params.n_trees == 0 {
            return Err(Error::ShapeMismatch { expected: 1, actual: 0 });
        }

        let n = x.nrows();
        let targets = y.to_vec();
        let params = self.params;

        self.trees = (0..params.n_trees)
            .into_par_iter()
            .map(|i| {
                let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(i as u64));
                let samples: Vec<usize> = if params.bootstrap {
                    (0..n).map(|_| rng.gen_range(0..n)).collect()
                } else {
                    (0..n).collect()
                };
                RegressionTree::fit(x, &targets, &samples, &params.tree, &mut rng)
            })
            .collect();
        self.n_features = Some(x.ncols());

        debug!(
            trees = self.trees.len(),
            leaves = self.trees.iter().map(RegressionTree::n_leaves).sum::<usize>(),
            "fitted random forest"
        );
        Ok(())
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        check_width(self.n_features, x)?;
        let n_trees = self.trees.len() as f64;
        let predictions: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let row = x.row(i);
                self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>() / n_trees
            })
            .collect();
        Ok(Array1::from(predictions))
    }

    fn n_features(&self) -> Option<usize> {
        self.n_features
    }

    fn name(&self) -> &'static str {
        "Random Forest"
    }
}
