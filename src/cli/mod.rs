//! Model trainer CLI
//!
//! Command-line interface for training, prediction and artifact inspection.

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::{FailurePolicy, TrainerConfig};
use crate::export::{load_artifact, SerializationFormat};
use crate::selection::ModelTrainer;
use crate::training::{RegressionMetrics, Regressor};
use crate::utils::{split_features_target, DataLoader, DataSaver};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString    { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn kv(key: &str, val: &str) {
    println!("  {:<18} {}", muted(key), val.white());
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "model-trainer")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Grid-search regression model selection with a single persisted artifact")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Select the best regressor and save it
    Train {
        /// Training table (CSV, last column is the target)
        #[arg(long = "train")]
        train: PathBuf,

        /// Validation table (CSV, same layout)
        #[arg(long = "valid")]
        valid: PathBuf,

        /// Where to write the artifact
        #[arg(long)]
        artifact: Option<PathBuf>,

        /// Minimum validation R² to accept the best model
        #[arg(long)]
        threshold: Option<f64>,

        /// Folds for the grid-search cross-validation
        #[arg(long)]
        cv_folds: Option<usize>,

        /// Seed for fold shuffling
        #[arg(long)]
        seed: Option<u64>,

        /// Keep going when a single candidate fails
        #[arg(long)]
        isolate_failures: bool,

        /// Artifact encoding (binary, json)
        #[arg(long)]
        format: Option<SerializationFormat>,

        /// JSON configuration file; flags override its values
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Make predictions using a saved artifact
    Predict {
        /// Artifact file
        #[arg(short, long)]
        model: PathBuf,

        /// Input data file (CSV)
        #[arg(short, long)]
        data: PathBuf,

        /// Output predictions file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show artifact metadata
    Inspect {
        /// Artifact file
        #[arg(short, long)]
        model: PathBuf,
    },
}

/// Flags of the `train` subcommand
pub struct TrainArgs {
    pub train: PathBuf,
    pub valid: PathBuf,
    pub artifact: Option<PathBuf>,
    pub threshold: Option<f64>,
    pub cv_folds: Option<usize>,
    pub seed: Option<u64>,
    pub isolate_failures: bool,
    pub format: Option<SerializationFormat>,
    pub config: Option<PathBuf>,
}

impl TrainArgs {
    /// Config file (or defaults) with command-line overrides applied
    pub fn resolve_config(&self) -> anyhow::Result<TrainerConfig> {
        let mut config = match &self.config {
            Some(path) => TrainerConfig::from_file(path)?,
            None => TrainerConfig::default(),
        };
        if let Some(path) = &self.artifact {
            config.artifact_path = path.clone();
        }
        if let Some(threshold) = self.threshold {
            config.score_threshold = threshold;
        }
        if let Some(folds) = self.cv_folds {
            config.cv_folds = folds;
        }
        if let Some(seed) = self.seed {
            config.random_state = Some(seed);
        }
        if self.isolate_failures {
            config.failure_policy = FailurePolicy::Isolate;
        }
        if let Some(format) = self.format {
            config.artifact_format = format;
        }
        config.validate()?;
        Ok(config)
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(args: &TrainArgs) -> anyhow::Result<()> {
    section("Train");
    let config = args.resolve_config()?;
    let loader = DataLoader::new();

    step_run("Loading data");
    let start = Instant::now();
    let train = loader
        .load_array(&args.train)
        .with_context(|| format!("loading training data {}", args.train.display()))?;
    let valid = loader
        .load_array(&args.valid)
        .with_context(|| format!("loading validation data {}", args.valid.display()))?;
    step_done(&format!(
        "train {}×{}, valid {}×{} in {:?}",
        train.nrows(),
        train.ncols(),
        valid.nrows(),
        valid.ncols(),
        start.elapsed()
    ));

    step_run("Searching candidates");
    let start = Instant::now();
    let trainer = ModelTrainer::new(config);
    let outcome = match trainer.run(&train, &valid) {
        Ok(outcome) => outcome,
        Err(e) => {
            println!("{}", "failed".red());
            return Err(e.into());
        }
    };
    step_done(&format!("{:?}", start.elapsed()));

    println!();
    println!(
        "  {:<24} {:>10} {:>10}  {}",
        muted("Model"),
        muted("valid R²"),
        muted("cv R²"),
        muted("params")
    );
    println!("  {}", dim(&"─".repeat(56)));
    for entry in outcome.report.entries() {
        let cv = entry
            .cv_score
            .map(|s| format!("{:.4}", s))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<24} {:>10.4} {:>10}  {}",
            entry.name,
            entry.validation_score,
            cv,
            dim(&entry.params.to_string())
        );
    }
    for failure in outcome.report.failures() {
        println!("  {:<24} {:>10}  {}", failure.name, "failed".red(), dim(&failure.reason));
    }
    println!("  {}", dim(&"─".repeat(56)));

    println!();
    println!(
        "  {} {} {} {:.4}",
        ok("best"),
        outcome.best_model.white().bold(),
        muted("R²:"),
        outcome.best_score
    );
    println!("  {} {}", muted("saved"), outcome.artifact_path.display());
    println!();

    Ok(())
}

pub fn cmd_predict(model_path: &Path, data_path: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    section("Predict");

    step_run("Loading model");
    let artifact = load_artifact(model_path)
        .with_context(|| format!("loading artifact {}", model_path.display()))?;
    let model = artifact.model()?;
    let n_features = artifact.metadata().n_features;
    step_done(&format!("{} ({} features)", artifact.metadata().name, n_features));

    step_run("Loading data");
    let data = DataLoader::new()
        .load_array(data_path)
        .with_context(|| format!("loading data {}", data_path.display()))?;
    step_done(&format!("{} rows × {} cols", data.nrows(), data.ncols()));

    // One extra column is treated as the known target
    let (x, target) = if data.ncols() == n_features + 1 {
        let (x, y) = split_features_target(&data)?;
        (x, Some(y))
    } else {
        (data, None)
    };

    step_run("Predicting");
    let start = Instant::now();
    let predictions = model.predict(&x)?;
    step_done(&format!("{} rows in {:?}", predictions.len(), start.elapsed()));

    println!();
    if let Some(y) = target {
        let metrics = RegressionMetrics::compute(&y, &predictions)?;
        kv("R²", &format!("{:.4}", metrics.r2));
        kv("RMSE", &format!("{:.4}", metrics.rmse));
        kv("MAE", &format!("{:.4}", metrics.mae));
    }

    match output {
        Some(path) => {
            DataSaver::save_predictions(&predictions, path)?;
            kv("written", &path.display().to_string());
        }
        None => {
            for (i, p) in predictions.iter().take(10).enumerate() {
                kv(&format!("row {}", i), &format!("{:.4}", p));
            }
            if predictions.len() > 10 {
                println!("  {}", dim(&format!("… {} more", predictions.len() - 10)));
            }
        }
    }
    println!();

    Ok(())
}

pub fn cmd_inspect(model_path: &Path) -> anyhow::Result<()> {
    section("Inspect");

    let artifact = load_artifact(model_path)
        .with_context(|| format!("loading artifact {}", model_path.display()))?;
    let meta = artifact.metadata();

    kv("Model", &meta.name);
    kv("Algorithm", &meta.algorithm);
    kv("Validation R²", &format!("{:.4}", meta.validation_score));
    kv("Features", &meta.n_features.to_string());
    kv("Trained at", &meta.trained_at);
    kv("Written by", &format!("model-trainer {}", meta.crate_version));
    kv("Encoding", &artifact.encoding.to_string());
    kv("Format version", &artifact.format_version.to_string());

    if !meta.hyperparameters.is_empty() {
        section("Hyperparameters");
        for (name, value) in &meta.hyperparameters {
            kv(name, value);
        }
    }
    println!();

    Ok(())
}
