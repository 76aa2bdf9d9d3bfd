//! Offline training run.
//!
//! Stages run strictly in order and any error aborts the run; re-running
//! from scratch is the only recovery:
//!
//! `Loaded → Split → TransformedTrain → ModelFitted → TransformedTest →
//! Predicted → Evaluated → Persisted`

use std::fmt;
use std::path::PathBuf;

use ndarray::ArrayView1;
use polars::prelude::DataFrame;
use tracing::{info, warn};

use crate::config::TrainingConfig;
use crate::error::{Error, Result};
use crate::features::FeatureTransformer;
use crate::metrics::{evaluate, EvaluationReport};
use crate::models::{ModelKind, Regressor};
use crate::record::Record;
use crate::store::ModelStore;
use crate::{download_csv_file, load_csv_file, split_features_and_target, train_test_split};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Loaded,
    Split,
    TransformedTrain,
    ModelFitted,
    TransformedTest,
    Predicted,
    Evaluated,
    Persisted,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Loaded => "loaded",
            Stage::Split => "split",
            Stage::TransformedTrain => "transformed(train)",
            Stage::ModelFitted => "model fitted",
            Stage::TransformedTest => "transformed(test)",
            Stage::Predicted => "predicted",
            Stage::Evaluated => "evaluated",
            Stage::Persisted => "persisted",
        };
        f.write_str(s)
    }
}

/// Evaluation of a model trained alongside the persisted one.
#[derive(Debug, Clone)]
pub struct BaselineReport {
    pub kind: ModelKind,
    pub name: &'static str,
    pub report: EvaluationReport,
}

/// Summary of a completed run.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub model: ModelKind,
    pub model_name: &'static str,
    pub report: EvaluationReport,
    pub baselines: Vec<BaselineReport>,
    pub n_train: usize,
    pub n_test: usize,
    pub n_features: usize,
    pub artifact_dir: PathBuf,
    /// Stages in the order they completed.
    pub stages: Vec<Stage>,
}

pub struct TrainingPipeline {
    config: TrainingConfig,
}

impl TrainingPipeline {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Full run from the configured dataset file.
    pub fn run(&self) -> Result<TrainingOutcome> {
        let mut stages = Vec::with_capacity(8);

        let df = self.load()?;
        advance(&mut stages, Stage::Loaded, df.height());

        let (train_df, test_df) = train_test_split(&df, self.config.test_size, self.config.seed)?;
        let (train_records, train_labels) = split_features_and_target(&train_df)?;
        let (test_records, test_labels) = split_features_and_target(&test_df)?;
        advance(&mut stages, Stage::Split, train_records.len());

        self.fit_evaluate_persist(stages, &train_records, &train_labels, &test_records, &test_labels)
    }

    /// Run from already split records; starts after the `Split` stage.
    pub fn run_on(
        &self,
        train: (&[Record], &[f64]),
        test: (&[Record], &[f64]),
    ) -> Result<TrainingOutcome> {
        let stages = vec![Stage::Loaded, Stage::Split];
        self.fit_evaluate_persist(stages, train.0, train.1, test.0, test.1)
    }

    fn load(&self) -> Result<DataFrame> {
        let path = &self.config.dataset_path;
        if !path.exists() {
            match &self.config.dataset_url {
                Some(url) => {
                    download_csv_file(url, path)?;
                }
                None => {
                    return Err(Error::Io(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("dataset {} not found", path.display()),
                    )))
                }
            }
        }

        let df = load_csv_file(path)?;
        let complete = df.drop_nulls::<String>(None)?;
        if complete.height() < df.height() {
            warn!(dropped = df.height() - complete.height(), "dropped rows with missing values");
        }
        if complete.height() == 0 {
            return Err(Error::EmptyDataset(format!("{} has no complete rows", path.display())));
        }
        Ok(complete)
    }

    fn fit_evaluate_persist(
        &self,
        mut stages: Vec<Stage>,
        train_records: &[Record],
        train_labels: &[f64],
        test_records: &[Record],
        test_labels: &[f64],
    ) -> Result<TrainingOutcome> {
        if train_records.len() != train_labels.len() {
            return Err(Error::ShapeMismatch {
                expected: train_records.len(),
                actual: train_labels.len(),
            });
        }
        if test_records.is_empty() {
            return Err(Error::EmptyDataset("test split is empty".into()));
        }

        let transformer = FeatureTransformer::new(self.config.zero_variance);
        let (x_train, fitted) = transformer.fit_transform(train_records)?;
        advance(&mut stages, Stage::TransformedTrain, x_train.ncols());

        let y_train = ArrayView1::from(train_labels);
        let mut model = self.config.model.build(&self.config.models);
        model.fit(x_train.view(), y_train)?;
        advance(&mut stages, Stage::ModelFitted, x_train.nrows());

        let x_test = fitted.transform(test_records)?;
        advance(&mut stages, Stage::TransformedTest, x_test.nrows());

        let y_pred = model.predict(x_test.view())?;
        advance(&mut stages, Stage::Predicted, y_pred.len());

        let report = evaluate(test_labels, &y_pred.to_vec())?;
        info!(model = model.name(), mae = report.mae, rmse = report.rmse, r2 = report.r2, "evaluation");
        advance(&mut stages, Stage::Evaluated, test_labels.len());

        let mut baselines = Vec::with_capacity(self.config.baselines.len());
        for &kind in &self.config.baselines {
            let mut baseline = kind.build(&self.config.models);
            baseline.fit(x_train.view(), y_train)?;
            let pred = baseline.predict(x_test.view())?;
            let report = evaluate(test_labels, &pred.to_vec())?;
            info!(
                model = baseline.name(),
                mae = report.mae,
                rmse = report.rmse,
                r2 = report.r2,
                "baseline evaluation"
            );
            baselines.push(BaselineReport { kind, name: baseline.name(), report });
        }

        ModelStore::new(&self.config.artifact_dir).save(&fitted, &model)?;
        advance(&mut stages, Stage::Persisted, fitted.n_features());

        Ok(TrainingOutcome {
            model: self.config.model,
            model_name: model.name(),
            report,
            baselines,
            n_train: train_records.len(),
            n_test: test_records.len(),
            n_features: fitted.n_features(),
            artifact_dir: self.config.artifact_dir.clone(),
            stages,
        })
    }
}

fn advance(stages: &mut Vec<Stage>, stage: Stage, size: usize) {
    info!(size, "[{}] {}", stages.len() + 1, stage);
    stages.push(stage);
}
