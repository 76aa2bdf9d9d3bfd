//! Ordinary least squares with a small ridge term.
//!
//! Solved in closed form from centred normal equations:
//! `(XcᵀXc + l2·n·I) w = Xcᵀyc`, intercept `ȳ − x̄·w`.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{check_training_shape, check_width, Regressor};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearParams {
    /// Ridge strength per training row. Keeps the system solvable when the
    /// one-hot block is collinear with the intercept.
    pub l2: f64,
}

impl Default for LinearParams {
    fn default() -> Self {
        Self { l2: 1e-6 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct LinearFit {
    coefficients: Vec<f64>,
    intercept: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRegression {
    params: LinearParams,
    fit: Option<LinearFit>,
}

impl LinearRegression {
    pub fn new(params: LinearParams) -> Self {
        Self { params, fit: None }
    }

    pub fn coefficients(&self) -> Option<&[f64]> {
        self.fit.as_ref().map(|f| f.coefficients.as_slice())
    }

    pub fn intercept(&self) -> Option<f64> {
        self.fit.as_ref().map(|f| f.intercept)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        match &self.fit {
            Some(_) => Ok(()),
            None => Err(Error::CorruptArtifact("linear model has no coefficients".into())),
        }
    }
}

impl Regressor for LinearRegression {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()> {
        check_training_shape(x, y)?;
        let n = x.nrows() as f64;
        let p = x.ncols();

        let x_mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(p));
        let y_mean = y.mean().unwrap_or(0.0);

        let xc = &x - &x_mean.view().insert_axis(Axis(0));
        let yc = y.mapv(|v| v - y_mean);

        let mut gram = xc.t().dot(&xc);
        for i in 0..p {
            gram[[i, i]] += self.params.l2 * n;
        }
        let rhs = xc.t().dot(&yc);

        let coefficients = solve(gram, rhs)?;
        let intercept = y_mean - x_mean.dot(&coefficients);
        debug!(features = p, intercept, "fitted linear regression");

        self.fit = Some(LinearFit { coefficients: coefficients.to_vec(), intercept });
        Ok(())
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        check_width(self.n_features(), x)?;
        let fit = self.fit.as_ref().ok_or(Error::NotFitted)?;
        let w = ArrayView1::from(fit.coefficients.as_slice());
        Ok(x.dot(&w) + fit.intercept)
    }

    fn n_features(&self) -> Option<usize> {
        self.fit.as_ref().map(|f| f.coefficients.len())
    }

    fn name(&self) -> &'static str {
        "Linear Regression"
    }
}

/// Gaussian elimination with partial pivoting.
fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Result<Array1<f64>> {
    let p = b.len();
    for col in 0..p {
        let pivot = (col..p)
            .max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))
            .unwrap_or(col);
        if a[[pivot, col]] == 0.0 {
            return Err(Error::DegenerateColumn { column: format!("feature #{col}") });
        }
        if pivot != col {
            for k in 0..p {
                a.swap([col, k], [pivot, k]);
            }
            b.swap(col, pivot);
        }
        for row in col + 1..p {
            let factor = a[[row, col]] / a[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..p {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut w = Array1::zeros(p);
    for row in (0..p).rev() {
        let tail: f64 = (row + 1..p).map(|k| a[[row, k]] * w[k]).sum();
        w[row] = (b[row] - tail) / a[[row, row]];
    }
    Ok(w)
}
