//! Train command - fits and publishes per-user models from a historical dataset.

use std::path::Path;

use anyhow::{Context, Result, bail};
use artifact_store::ArtifactStore;
use sample_parser::read_history;
use tracing::{info, warn};

use crate::training::{TrainingConfig, TrainingPipeline};

/// Runs the train command.
///
/// # Errors
///
/// Returns an error if the dataset cannot be read, the configuration is invalid,
/// or any user failed to publish.
pub async fn run(store: ArtifactStore, dataset: &Path, config: TrainingConfig) -> Result<()> {
    info!(dataset = %dataset.display(), "Starting training");

    let text = tokio::fs::read_to_string(dataset)
        .await
        .with_context(|| format!("Failed to read dataset {}", dataset.display()))?;
    let history = read_history(&text).context("Failed to parse dataset")?;

    if history.skipped_rows > 0 {
        warn!(skipped_rows = history.skipped_rows, "Ignored malformed dataset rows");
    }
    info!(samples = history.samples.len(), "Loaded samples");

    let summary = TrainingPipeline::new(store, config)
        .train_all(&history.samples)
        .await?;

    for failure in &summary.failed {
        warn!(user_id = failure.user_id, error = %failure.error, "User not published");
    }
    if !summary.is_success() {
        bail!("{} user(s) failed to train or publish", summary.failed.len());
    }

    info!(
        trained = summary.trained.len(),
        skipped = summary.skipped.len(),
        "All users published"
    );
    Ok(())
}
