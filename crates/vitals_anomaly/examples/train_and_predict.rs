//! Example: Train a model from a dataset and classify one record.
//!
//! Usage: cargo run --example train_and_predict -- <dataset.csv> "<user_id,hr,rr,in_room,ts>"
//!
//! Uses the store configured through `VITALS_*` environment variables.

use std::path::PathBuf;

use anyhow::{Context, Result};
use config::Config;
use tracing_subscriber::EnvFilter;
use vitals_anomaly::{TrainingConfig, commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("info"))
        .init();

    let mut args = std::env::args().skip(1);
    let dataset = PathBuf::from(args.next().context("Missing dataset path")?);
    let record = args.next().context("Missing record")?;

    let store = commands::open_store(&Config::from_env()?)?;

    commands::train::run(store.clone(), &dataset, TrainingConfig::default()).await?;
    commands::predict::run(store, &record).await?;

    Ok(())
}
