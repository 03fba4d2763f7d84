//! CLI command implementations.

use anyhow::{Context, Result};
use artifact_store::ArtifactStore;
use config::{Config, build_object_store};

pub mod models;
pub mod predict;
pub mod serve;
pub mod train;

/// Opens the artifact store described by `config`.
///
/// # Errors
///
/// Returns an error if the backend cannot be constructed.
pub fn open_store(config: &Config) -> Result<ArtifactStore> {
    let inner = build_object_store(&config.store).context("Failed to open artifact store")?;
    Ok(ArtifactStore::new(inner, config.naming.clone()).with_retry(config.retry))
}
