//! Predict command - runs one record through the inference service.

use anyhow::Result;
use artifact_store::ArtifactStore;

use crate::service::InferenceService;

/// Runs the predict command and prints the JSON response.
///
/// Waits for the archive write before returning.
///
/// # Errors
///
/// Returns an error if the response cannot be serialized or the archive task panics.
pub async fn run(store: ArtifactStore, record: &str) -> Result<()> {
    let service = InferenceService::from_store(store);
    let (response, archive) = service.handle_with_archive(record).await;

    println!("{}", serde_json::to_string(&response)?);

    if let Some(archive) = archive {
        archive.await?;
    }
    Ok(())
}
