//! End-to-end: CSV files in, artifact out, predictions back from disk

use model_trainer::cli::{cmd_inspect, cmd_predict, cmd_train, TrainArgs};
use model_trainer::config::TrainerConfig;
use model_trainer::export::{load_artifact, SerializationFormat};
use model_trainer::selection::{Catalog, GridTable, ModelTrainer, ParamGrid};
use model_trainer::training::{DecisionTreeRegressor, LinearRegression, Regressor};
use model_trainer::utils::{split_features_target, DataLoader};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

fn write_csv(path: &Path, rows: std::ops::Range<usize>, with_target: bool) {
    let mut text = String::from(if with_target { "x0,x1,y\n" } else { "x0,x1\n" });
    for i in rows {
        let x0 = i as f64 * 0.5;
        let x1 = ((i * 3) % 7) as f64;
        if with_target {
            writeln!(text, "{},{},{}", x0, x1, 3.0 * x0 - 2.0 * x1 + 1.0).unwrap();
        } else {
            writeln!(text, "{},{}", x0, x1).unwrap();
        }
    }
    fs::write(path, text).unwrap();
}

fn small_catalog() -> (Catalog, GridTable) {
    let catalog = Catalog::new()
        .with("Decision Tree", DecisionTreeRegressor::new())
        .unwrap()
        .with("Linear Regression", LinearRegression::new())
        .unwrap();
    let mut grids = GridTable::new();
    grids.insert("Decision Tree", ParamGrid::new().with("max_depth", [2, 4]));
    (catalog, grids)
}

#[test]
fn test_csv_to_artifact_to_predictions() {
    let dir = tempfile::tempdir().unwrap();
    let train_path = dir.path().join("train.csv");
    let valid_path = dir.path().join("valid.csv");
    let artifact_path = dir.path().join("artifacts").join("model.bin");
    write_csv(&train_path, 0..80, true);
    write_csv(&valid_path, 80..110, true);

    let loader = DataLoader::new();
    let train = loader.load_array(&train_path).unwrap();
    let valid = loader.load_array(&valid_path).unwrap();

    let (catalog, grids) = small_catalog();
    let trainer = ModelTrainer::new(TrainerConfig::new().with_artifact_path(&artifact_path))
        .with_catalog(catalog)
        .with_grids(grids);
    let outcome = trainer.run(&train, &valid).unwrap();

    // Validation rows lie outside the training range; only the line extrapolates
    assert_eq!(outcome.best_model, "Linear Regression");
    assert!(outcome.best_score > 0.999);

    let model = load_artifact(&artifact_path).unwrap().model().unwrap();
    let (x_valid, y_valid) = split_features_target(&valid).unwrap();
    let preds = model.predict(&x_valid).unwrap();
    for (p, y) in preds.iter().zip(y_valid.iter()) {
        assert!((p - y).abs() < 1e-6);
    }
}

fn train_args(dir: &Path, artifact: PathBuf) -> TrainArgs {
    let train = dir.join("train.csv");
    let valid = dir.join("valid.csv");
    write_csv(&train, 0..60, true);
    write_csv(&valid, 60..80, true);

    // Small grids keep the default catalog quick
    let config = dir.join("trainer.json");
    let mut grids = GridTable::new();
    grids.insert("Random Forest", ParamGrid::new().with("n_estimators", [8]));
    grids.insert("Gradient Boosting", ParamGrid::new().with("n_estimators", [16, 32]));
    grids.insert("AdaBoost Regressor", ParamGrid::new().with("n_estimators", [8]));
    TrainerConfig::new().with_grids(grids).save(&config).unwrap();

    TrainArgs {
        train,
        valid,
        artifact: Some(artifact),
        threshold: None,
        cv_folds: Some(3),
        seed: Some(7),
        isolate_failures: false,
        format: Some(SerializationFormat::Json),
        config: Some(config),
    }
}

#[test]
fn test_cli_commands_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let artifact = dir.path().join("model.json");
    let args = train_args(dir.path(), artifact.clone());

    cmd_train(&args).unwrap();
    assert!(artifact.exists());
    cmd_inspect(&artifact).unwrap();

    // Features only
    let features = dir.path().join("features.csv");
    let output = dir.path().join("predictions.csv");
    write_csv(&features, 0..10, false);
    cmd_predict(&artifact, &features, Some(&output)).unwrap();

    let written = DataLoader::new().load_array(&output).unwrap();
    assert_eq!(written.dim(), (10, 1));

    // Features plus target scores the model
    cmd_predict(&artifact, &args.valid, None).unwrap();
}

#[test]
fn test_cli_train_fails_below_threshold() {
    let dir = tempfile::tempdir().unwrap();
    let artifact = dir.path().join("model.bin");
    let mut args = train_args(dir.path(), artifact.clone());
    args.threshold = Some(1.5);
    args.format = None;

    assert!(cmd_train(&args).is_err());
    assert!(!artifact.exists());
}

#[test]
fn test_predict_rejects_missing_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("features.csv");
    write_csv(&data, 0..5, false);
    assert!(cmd_predict(&dir.path().join("missing.bin"), &data, None).is_err());
}
