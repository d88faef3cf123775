//! Model trainer - main entry point

use clap::Parser;
use model_trainer::cli::{cmd_inspect, cmd_predict, cmd_train, Cli, Commands, TrainArgs};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "model_trainer=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train {
            train,
            valid,
            artifact,
            threshold,
            cv_folds,
            seed,
            isolate_failures,
            format,
            config,
        } => {
            cmd_train(&TrainArgs {
                train,
                valid,
                artifact,
                threshold,
                cv_folds,
                seed,
                isolate_failures,
                format,
                config,
            })?;
        }
        Commands::Predict { model, data, output } => {
            cmd_predict(&model, &data, output.as_deref())?;
        }
        Commands::Inspect { model } => {
            cmd_inspect(&model)?;
        }
    }

    Ok(())
}
