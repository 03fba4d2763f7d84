//! Models command - lists users with a published model.

use anyhow::Result;
use artifact_store::ArtifactStore;
use tracing::info;

use crate::registry::ModelRegistry;

/// Prints one user id per line.
///
/// # Errors
///
/// Returns an error if the store cannot be listed.
pub async fn run(store: ArtifactStore) -> Result<()> {
    let users = ModelRegistry::new(store).published_users().await?;
    info!(users = users.len(), "Published models");

    for user_id in users {
        println!("{user_id}");
    }
    Ok(())
}
