//! Regression metrics.

use std::fmt;

use serde::Serialize;

use crate::error::{Error, Result};

/// MAE / MSE / RMSE / R² for one set of predictions.
///
/// `r2` is NaN when every true value is identical, since the total sum of
/// squares is then zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub mae: f64,
    pub mse: f64,
    pub rmse: f64,
    pub r2: f64,
}

/// Compare predictions against ground truth.
pub fn evaluate(y_true: &[f64], y_pred: &[f64]) -> Result<EvaluationReport> {
    if y_true.len() != y_pred.len() {
        return Err(Error::ShapeMismatch { expected: y_true.len(), actual: y_pred.len() });
    }
    if y_true.is_empty() {
        return Err(Error::ShapeMismatch { expected: 1, actual: 0 });
    }

    let n = y_true.len() as f64;
    let (sum_ae, ss_res) = y_true
        .iter()
        .zip(y_pred)
        .fold((0.0f64, 0.0f64), |(sa, ss), (&t, &p)| {
            let diff = t - p;
            (sa + diff.abs(), ss + diff * diff)
        });

    let mean = y_true.iter().sum::<f64>() / n;
    let ss_tot: f64 = y_true.iter().map(|&t| (t - mean) * (t - mean)).sum();

    let mse = ss_res / n;
    let r2 = if ss_tot == 0.0 { f64::NAN } else { 1.0 - ss_res / ss_tot };

    Ok(EvaluationReport { mae: sum_ae / n, mse, rmse: mse.sqrt(), r2 })
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "MAE  : {:.4}", self.mae)?;
        writeln!(f, "MSE  : {:.4}", self.mse)?;
        writeln!(f, "RMSE : {:.4}", self.rmse)?;
        write!(f, "R²   : {:.4}", self.r2)
    }
}
