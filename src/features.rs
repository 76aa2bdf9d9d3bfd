//! Feature engineering: raw [`Record`]s to standardized feature matrices.
//!
//! The same row recipe runs at fit and transform time:
//!
//! 1. `ln(v + 1)` on the four count fields ([`LOG_FIELDS`])
//! 2. one-hot `ocean_proximity` against the fitted vocabulary
//! 3. `bedroom_ratio` and `household_rooms` from the already logged counts
//! 4. concatenate base fields, one-hot block and ratios
//! 5. standardize with the per-column mean/scale learned at fit time
//!
//! Counts below `-1` produce NaN, and a count of exactly zero makes the
//! ratio denominators zero, producing infinities. Neither case is guarded;
//! the values flow through to the scaler and the model unchanged.

use std::collections::BTreeSet;

use ndarray::{Array1, Array2, ArrayViewMut1, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::record::{Record, CATEGORY_FIELD, NUMERIC_FIELDS};

const TOTAL_ROOMS: usize = 3;
const TOTAL_BEDROOMS: usize = 4;
const POPULATION: usize = 5;
const HOUSEHOLDS: usize = 6;
const LOG_INDICES: [usize; 4] = [TOTAL_ROOMS, TOTAL_BEDROOMS, POPULATION, HOUSEHOLDS];

/// Names of the derived ratio columns, in output order.
pub const RATIO_COLUMNS: [&str; 2] = ["bedroom_ratio", "household_rooms"];

/// What to do with a column whose training standard deviation is zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ZeroVariance {
    /// Use a scale of 1.0 so the column only gets centred.
    #[default]
    Clamp,
    /// Fail with [`Error::DegenerateColumn`].
    Reject,
}

/// Full output column list for a given category vocabulary.
pub fn feature_columns(vocabulary: &[String]) -> Vec<String> {
    NUMERIC_FIELDS
        .iter()
        .map(|f| f.to_string())
        .chain(vocabulary.iter().map(|label| format!("{CATEGORY_FIELD}={label}")))
        .chain(RATIO_COLUMNS.iter().map(|f| f.to_string()))
        .collect()
}

/// Unfitted transformer; holds only the zero-variance policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureTransformer {
    zero_variance: ZeroVariance,
}

impl FeatureTransformer {
    pub fn new(zero_variance: ZeroVariance) -> Self {
        Self { zero_variance }
    }

    /// Learn the vocabulary and scaling parameters from `records` and return
    /// the standardized training matrix alongside the fitted state.
    pub fn fit_transform(&self, records: &[Record]) -> Result<(Array2<f64>, FittedTransformer)> {
        if records.is_empty() {
            return Err(Error::EmptyDataset("cannot fit a transformer on zero records".into()));
        }

        let vocabulary: Vec<String> = records
            .iter()
            .filter_map(|r| r.ocean_proximity.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let columns = feature_columns(&vocabulary);

        let mut x = engineer_matrix(records, &vocabulary);

        let mut means = Vec::with_capacity(columns.len());
        let mut scales = Vec::with_capacity(columns.len());
        for (column, name) in x.axis_iter(Axis(1)).zip(&columns) {
            let mean = column.mean().unwrap_or(0.0);
            let mut scale = column.std(0.0);
            if scale == 0.0 {
                match self.zero_variance {
                    ZeroVariance::Clamp => {
                        warn!(column = %name, "zero variance column, scale clamped to 1.0");
                        scale = 1.0;
                    }
                    ZeroVariance::Reject => {
                        return Err(Error::DegenerateColumn { column: name.clone() });
                    }
                }
            }
            means.push(mean);
            scales.push(scale);
        }

        standardize(&mut x, &means, &scales);
        debug!(
            rows = x.nrows(),
            columns = x.ncols(),
            categories = vocabulary.len(),
            "fitted feature transformer"
        );

        let fitted = FittedTransformer { vocabulary, columns, means, scales };
        Ok((x, fitted))
    }
}

/// Transformer state learned from a training set. Immutable once fitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedTransformer {
    vocabulary: Vec<String>,
    columns: Vec<String>,
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl FittedTransformer {
    /// Category labels, in one-hot column order.
    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    /// Output column names, in feature-vector order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn scales(&self) -> &[f64] {
        &self.scales
    }

    /// Apply the fitted recipe to new records without re-fitting.
    pub fn transform(&self, records: &[Record]) -> Result<Array2<f64>> {
        let mut x = engineer_matrix(records, &self.vocabulary);
        if x.ncols() != self.columns.len() {
            return Err(Error::SchemaMismatch(format!(
                "transform produced {} columns, transformer was fitted with {}",
                x.ncols(),
                self.columns.len()
            )));
        }
        standardize(&mut x, &self.means, &self.scales);
        Ok(x)
    }

    /// Transform a single record into one standardized feature vector.
    pub fn transform_one(&self, record: &Record) -> Result<Array1<f64>> {
        let x = self.transform(std::slice::from_ref(record))?;
        Ok(x.row(0).to_owned())
    }

    /// Engineered but unscaled row for `record` (steps 1-4).
    pub fn engineer(&self, record: &Record) -> Vec<f64> {
        engineer_row(record, &self.vocabulary)
    }

    /// Check internal consistency of a transformer read back from storage.
    pub fn validate(&self) -> Result<()> {
        let expected = feature_columns(&self.vocabulary);
        if self.columns != expected {
            return Err(Error::CorruptArtifact(format!(
                "column list does not match vocabulary: stored {:?}, expected {:?}",
                self.columns, expected
            )));
        }
        if self.means.len() != self.columns.len() || self.scales.len() != self.columns.len() {
            return Err(Error::CorruptArtifact(format!(
                "scaling parameters cover {} means / {} scales for {} columns",
                self.means.len(),
                self.scales.len(),
                self.columns.len()
            )));
        }
        if self.scales.iter().any(|&s| s == 0.0) {
            return Err(Error::CorruptArtifact("zero scale in stored transformer".into()));
        }
        let unique: BTreeSet<&String> = self.vocabulary.iter().collect();
        if unique.len() != self.vocabulary.len() {
            return Err(Error::CorruptArtifact("duplicate category in vocabulary".into()));
        }
        Ok(())
    }
}

fn engineer_row(record: &Record, vocabulary: &[String]) -> Vec<f64> {
    let mut values = record.numeric_values();
    for idx in LOG_INDICES {
        values[idx] = values[idx].ln_1p();
    }

    let mut row = Vec::with_capacity(NUMERIC_FIELDS.len() + vocabulary.len() + RATIO_COLUMNS.len());
    row.extend_from_slice(&values);

    // Unseen or missing categories leave the whole block at zero.
    let category = record.ocean_proximity.as_deref();
    row.extend(
        vocabulary
            .iter()
            .map(|label| if category == Some(label.as_str()) { 1.0 } else { 0.0 }),
    );

    row.push(values[TOTAL_BEDROOMS] / values[TOTAL_ROOMS]);
    row.push(values[TOTAL_ROOMS] / values[HOUSEHOLDS]);
    row
}

fn engineer_matrix(records: &[Record], vocabulary: &[String]) -> Array2<f64> {
    let width = NUMERIC_FIELDS.len() + vocabulary.len() + RATIO_COLUMNS.len();
    let mut x = Array2::zeros((records.len(), width));
    for (mut out, record) in x.axis_iter_mut(Axis(0)).zip(records) {
        for (cell, v) in out.iter_mut().zip(engineer_row(record, vocabulary)) {
            *cell = v;
        }
    }
    x
}

fn standardize(x: &mut Array2<f64>, means: &[f64], scales: &[f64]) {
    for ((mut column, &mean), &scale) in x.axis_iter_mut(Axis(1)).zip(means).zip(scales) {
        scale_column(&mut column, mean, scale);
    }
}

fn scale_column(column: &mut ArrayViewMut1<f64>, mean: f64, scale: f64) {
    column.mapv_inplace(|v| (v - mean) / scale);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::LOG_FIELDS;
    use approx::assert_abs_diff_eq;

    fn record(rooms: f64, bedrooms: f64, households: f64, category: Option<&str>) -> Record {
        Record::from_values(
            [-122.0, 37.5, 20.0, rooms, bedrooms, 800.0, households, 4.5],
            category.map(str::to_string),
        )
    }

    fn training_batch() -> Vec<Record> {
        vec![
            record(880.0, 129.0, 126.0, Some("NEAR BAY")),
            record(7099.0, 1106.0, 1138.0, Some("INLAND")),
            record(1467.0, 190.0, 177.0, Some("NEAR BAY")),
            record(1274.0, 235.0, 219.0, Some("<1H OCEAN")),
            record(1627.0, 280.0, 259.0, Some("INLAND")),
        ]
    }

    #[test]
    fn log_indices_match_field_names() {
        for (idx, name) in LOG_INDICES.iter().zip(LOG_FIELDS) {
            assert_eq!(NUMERIC_FIELDS[*idx], name);
        }
    }

    #[test]
    fn vocabulary_is_sorted_and_columns_are_ordered() {
        let (x, fitted) = FeatureTransformer::default().fit_transform(&training_batch()).unwrap();
        assert_eq!(fitted.vocabulary(), ["<1H OCEAN", "INLAND", "NEAR BAY"]);
        assert_eq!(x.ncols(), 8 + 3 + 2);
        assert_eq!(fitted.columns()[8], "ocean_proximity=<1H OCEAN");
        assert_eq!(fitted.columns()[11], "bedroom_ratio");
        assert_eq!(fitted.columns()[12], "household_rooms");
    }

    #[test]
    fn transform_matches_fit_transform_on_training_data() {
        let batch = training_batch();
        let (x_fit, fitted) = FeatureTransformer::default().fit_transform(&batch).unwrap();
        let x_again = fitted.transform(&batch).unwrap();
        assert_eq!(x_fit, x_again);
    }

    #[test]
    fn disjoint_batches_share_column_layout() {
        let (_, fitted) = FeatureTransformer::default().fit_transform(&training_batch()).unwrap();
        let inland = fitted.columns().iter().position(|c| c == "ocean_proximity=INLAND").unwrap();
        let near_bay = fitted.columns().iter().position(|c| c == "ocean_proximity=NEAR BAY").unwrap();

        let a = [record(500.0, 90.0, 80.0, Some("INLAND"))];
        let b = [record(2500.0, 400.0, 350.0, None), record(10.0, 2.0, 3.0, Some("NEAR BAY"))];
        assert_eq!(fitted.transform(&a).unwrap().ncols(), fitted.n_features());
        assert_eq!(fitted.transform(&b).unwrap().ncols(), fitted.n_features());

        let row = fitted.engineer(&a[0]);
        assert_eq!(row[inland], 1.0);
        assert_eq!(row[8..11].iter().sum::<f64>(), 1.0);

        let row = fitted.engineer(&b[1]);
        assert_eq!(row[near_bay], 1.0);
        assert_eq!(row[inland], 0.0);
        assert_eq!(row[8..11].iter().sum::<f64>(), 1.0);

        // Ratios always close the vector, whatever the batch contains.
        assert_eq!(fitted.columns()[fitted.n_features() - 2], RATIO_COLUMNS[0]);
        assert_eq!(fitted.columns()[fitted.n_features() - 1], RATIO_COLUMNS[1]);
    }

    #[test]
    fn standardized_training_columns_have_zero_mean() {
        let (x, _) = FeatureTransformer::default().fit_transform(&training_batch()).unwrap();
        for column in x.axis_iter(Axis(1)) {
            assert_abs_diff_eq!(column.mean().unwrap(), 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn unseen_category_encodes_all_zero() {
        let (_, fitted) = FeatureTransformer::default().fit_transform(&training_batch()).unwrap();
        let row = fitted.engineer(&record(880.0, 129.0, 126.0, Some("ISLAND")));
        assert_eq!(&row[8..11], &[0.0, 0.0, 0.0]);

        let scaled = fitted.transform_one(&record(880.0, 129.0, 126.0, Some("ISLAND"))).unwrap();
        for col in 8..11 {
            assert_abs_diff_eq!(scaled[col], -fitted.means()[col] / fitted.scales()[col]);
        }
    }

    #[test]
    fn zero_count_logs_to_zero() {
        let (_, fitted) = FeatureTransformer::default().fit_transform(&training_batch()).unwrap();
        let row = fitted.engineer(&record(0.0, 129.0, 126.0, Some("INLAND")));
        assert_eq!(row[TOTAL_ROOMS], 0.0);
        // bedrooms / 0 and 0 / households
        assert!(row[11].is_infinite());
        assert_eq!(row[12], 0.0);
    }

    #[test]
    fn count_of_minus_one_is_negative_infinity() {
        let (_, fitted) = FeatureTransformer::default().fit_transform(&training_batch()).unwrap();
        let row = fitted.engineer(&record(-1.0, 129.0, 126.0, None));
        assert_eq!(row[TOTAL_ROOMS], f64::NEG_INFINITY);
        let row = fitted.engineer(&record(-5.0, 129.0, 126.0, None));
        assert!(row[TOTAL_ROOMS].is_nan());
    }

    #[test]
    fn ratios_use_logged_counts() {
        let (_, fitted) = FeatureTransformer::default().fit_transform(&training_batch()).unwrap();
        let row = fitted.engineer(&record(880.0, 129.0, 126.0, None));
        assert_abs_diff_eq!(row[11], 130f64.ln() / 881f64.ln(), epsilon = 1e-12);
        assert_abs_diff_eq!(row[12], 881f64.ln() / 127f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn constant_column_is_clamped_by_default() {
        // Longitude, latitude, age, population and income are constant here.
        let (x, fitted) = FeatureTransformer::default().fit_transform(&training_batch()).unwrap();
        assert_eq!(fitted.scales()[0], 1.0);
        assert!(x.column(0).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn constant_column_can_be_rejected() {
        let err = FeatureTransformer::new(ZeroVariance::Reject)
            .fit_transform(&training_batch())
            .unwrap_err();
        assert!(matches!(err, Error::DegenerateColumn { ref column } if column == "longitude"));
    }

    #[test]
    fn empty_training_set_is_rejected() {
        assert!(matches!(
            FeatureTransformer::default().fit_transform(&[]),
            Err(Error::EmptyDataset(_))
        ));
    }

    #[test]
    fn validate_catches_tampered_columns() {
        let (_, mut fitted) = FeatureTransformer::default().fit_transform(&training_batch()).unwrap();
        assert!(fitted.validate().is_ok());
        fitted.columns.swap(8, 9);
        assert!(matches!(fitted.validate(), Err(Error::CorruptArtifact(_))));
    }

    #[test]
    fn validate_catches_short_scaling_vectors() {
        let (_, mut fitted) = FeatureTransformer::default().fit_transform(&training_batch()).unwrap();
        fitted.means.pop();
        assert!(matches!(fitted.validate(), Err(Error::CorruptArtifact(_))));
    }
}
