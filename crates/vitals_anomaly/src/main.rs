//! Vital-sign anomaly detection service
//!
//! Trains per-user outlier models and serves real-time classification.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use config::Config;
use tracing_subscriber::EnvFilter;
use vitals_anomaly::TrainingConfig;
use vitals_anomaly::commands;

/// Per-user vital-sign anomaly detection
#[derive(Parser)]
#[command(name = "vitals-anomaly")]
#[command(about = "Trains per-user outlier models and classifies vital-sign samples")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit and publish a model per user from a historical dataset
    Train {
        /// CSV file with a `user_id,hr,rr,in_room,ts` header
        #[arg(short, long)]
        dataset: PathBuf,

        /// Drop rows with a heart rate at or below this
        #[arg(long, default_value = "1")]
        min_hr: f64,

        /// Drop rows with a respiration rate at or below this
        #[arg(long, default_value = "3")]
        min_rr: f64,

        /// Share of each user's most recent rows held out for validation
        #[arg(long, default_value = "0.2")]
        validation_ratio: f64,

        /// Expected share of outliers in the training data
        #[arg(long, default_value = "0.12")]
        contamination: f64,

        /// Users trained at the same time
        #[arg(short, long, default_value = "4")]
        concurrency: usize,
    },

    /// Classify one `user_id,hr,rr,in_room,ts` record
    Predict {
        #[arg(short, long)]
        record: String,
    },

    /// Serve predictions over HTTP
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// List users with a published model
    Models,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env()?;
    let store = commands::open_store(&config)?;

    match cli.command {
        Commands::Train {
            dataset,
            min_hr,
            min_rr,
            validation_ratio,
            contamination,
            concurrency,
        } => {
            let training = TrainingConfig {
                min_hr,
                min_rr,
                validation_ratio,
                contamination,
                concurrency,
            };
            commands::train::run(store, &dataset, training).await?;
        }
        Commands::Predict { record } => {
            commands::predict::run(store, &record).await?;
        }
        Commands::Serve { host, port } => {
            commands::serve::run(store, &host, port).await?;
        }
        Commands::Models => {
            commands::models::run(store).await?;
        }
    }

    Ok(())
}
