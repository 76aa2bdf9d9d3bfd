//! End-to-end training runs over CSV files.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::sync::Arc;

use house_price_predictor::models::ModelKind;
use house_price_predictor::pipeline::Stage;
use house_price_predictor::testing::{synthetic_housing, write_csv};
use house_price_predictor::{
    load_csv_file, split_features_and_target, train_test_split, Error, ModelStore,
    PredictionService, ServingContext, TrainingConfig, TrainingPipeline,
};

fn config_for(dir: &std::path::Path, model: ModelKind) -> TrainingConfig {
    let mut config = TrainingConfig {
        dataset_path: dir.join("housing.csv"),
        artifact_dir: dir.join("model"),
        model,
        ..TrainingConfig::default()
    };
    config.models.forest.n_trees = 15;
    config.models.boosting.n_rounds = 40;
    config
}

#[test]
fn trains_evaluates_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let (records, labels) = synthetic_housing(300, 21);
    write_csv(&dir.path().join("housing.csv"), &records, &labels).unwrap();

    let mut config = config_for(dir.path(), ModelKind::Forest);
    config.baselines = vec![ModelKind::Linear];
    let outcome = TrainingPipeline::new(config).run().unwrap();

    assert_eq!(outcome.stages.first(), Some(&Stage::Loaded));
    assert_eq!(outcome.stages.last(), Some(&Stage::Persisted));
    assert_eq!(outcome.stages.len(), 8);
    assert_eq!(outcome.n_test, 60);
    assert_eq!(outcome.n_train, 240);
    // 8 numeric + 4 categories + 2 ratios
    assert_eq!(outcome.n_features, 14);
    assert!(outcome.report.r2 > 0.5, "forest r2 = {}", outcome.report.r2);
    assert_eq!(outcome.baselines.len(), 1);
    assert!(outcome.baselines[0].report.r2 > 0.8, "linear r2 = {}", outcome.baselines[0].report.r2);

    let context = ServingContext::load(&ModelStore::new(dir.path().join("model"))).unwrap();
    let service = PredictionService::new(Arc::new(context));
    let price = service.predict(&records[0]).unwrap();
    assert!(price.is_finite());
}

#[test]
fn boosted_model_trains_from_csv() {
    let dir = tempfile::tempdir().unwrap();
    let (records, labels) = synthetic_housing(200, 8);
    write_csv(&dir.path().join("housing.csv"), &records, &labels).unwrap();

    let outcome = TrainingPipeline::new(config_for(dir.path(), ModelKind::Boosted)).run().unwrap();
    assert_eq!(outcome.model, ModelKind::Boosted);
    assert!(outcome.report.r2 > 0.5, "r2 = {}", outcome.report.r2);
}

#[test]
fn same_seed_gives_same_report() {
    let dir = tempfile::tempdir().unwrap();
    let (records, labels) = synthetic_housing(120, 4);
    write_csv(&dir.path().join("housing.csv"), &records, &labels).unwrap();

    let a = TrainingPipeline::new(config_for(dir.path(), ModelKind::Linear)).run().unwrap();
    let b = TrainingPipeline::new(config_for(dir.path(), ModelKind::Linear)).run().unwrap();
    assert_eq!(a.report, b.report);
}

#[test]
fn incomplete_and_malformed_rows_are_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("housing.csv");
    fs::write(
        &path,
        "longitude,latitude,housing_median_age,total_rooms,total_bedrooms,population,households,median_income,median_house_value,ocean_proximity\n\
         -122.23,37.88,41,880,129,322,126,8.3252,452600,NEAR BAY\n\
         -122.22,37.86,21,7099,,2401,1138,8.3014,358500,NEAR BAY\n\
         -122.24,37.85,52,1467,190,496,177,7.2574,352100,NEAR BAY\n\
         -122.25,37.85,52,1274,235,558,219,5.6431,341300,\n\
         -122.25,37.84,52,2535,489,1094,514,3.6591,299200,INLAND\n",
    )
    .unwrap();

    let df = load_csv_file(&path).unwrap();
    assert_eq!(df.height(), 5);
    let (records, labels) = split_features_and_target(&df).unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(labels, vec![452600.0, 352100.0, 299200.0]);
    assert_eq!(records[2].ocean_proximity.as_deref(), Some("INLAND"));
}

#[test]
fn malformed_rows_past_the_first_hundred_are_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("housing.csv");
    let (records, labels) = synthetic_housing(300, 13);
    write_csv(&path, &records, &labels).unwrap();

    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    writeln!(file, "-122.2,37.8,41,abc,129,322,126,8.3,452600,NEAR BAY").unwrap();
    writeln!(file, "-122.2,37.8,41,880.5,129,322,126,8.3,452600,NEAR BAY").unwrap();
    drop(file);

    let df = load_csv_file(&path).unwrap();
    assert_eq!(df.height(), 302);
    let (kept, kept_labels) = split_features_and_target(&df).unwrap();
    assert_eq!(kept.len(), 301);
    assert_eq!(kept[300].total_rooms, 880.5);
    assert_eq!(kept_labels[300], 452600.0);

    let outcome = TrainingPipeline::new(config_for(dir.path(), ModelKind::Linear)).run().unwrap();
    assert_eq!(outcome.n_train + outcome.n_test, 301);
}

#[test]
fn missing_column_is_schema_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("housing.csv");
    fs::write(
        &path,
        "longitude,latitude,housing_median_age,total_rooms,total_bedrooms,population,households,median_house_value,ocean_proximity\n\
         -122.23,37.88,41,880,129,322,126,452600,NEAR BAY\n",
    )
    .unwrap();

    let df = load_csv_file(&path).unwrap();
    let err = split_features_and_target(&df).unwrap_err();
    assert!(matches!(err, Error::SchemaMismatch(ref m) if m.contains("median_income")), "{err}");

    let mut config = config_for(dir.path(), ModelKind::Linear);
    config.dataset_path = path;
    assert!(TrainingPipeline::new(config).run().is_err());
    assert!(!dir.path().join("model").exists());
}

#[test]
fn split_sizes_and_reproducibility() {
    let dir = tempfile::tempdir().unwrap();
    let (records, labels) = synthetic_housing(50, 2);
    let path = dir.path().join("housing.csv");
    write_csv(&path, &records, &labels).unwrap();
    let df = load_csv_file(&path).unwrap();

    let (train, test) = train_test_split(&df, 0.2, 42).unwrap();
    assert_eq!(train.height(), 40);
    assert_eq!(test.height(), 10);

    let (train_again, _) = train_test_split(&df, 0.2, 42).unwrap();
    let first = split_features_and_target(&train).unwrap();
    let second = split_features_and_target(&train_again).unwrap();
    assert_eq!(first, second);

    assert!(matches!(train_test_split(&df, 0.0, 42), Err(Error::EmptyDataset(_))));
    assert!(matches!(train_test_split(&df, 1.0, 42), Err(Error::EmptyDataset(_))));
}
