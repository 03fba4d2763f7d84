//! Serve command - HTTP front end.

use anyhow::{Context, Result};
use artifact_store::ArtifactStore;
use tracing::info;

use crate::server::create_router;
use crate::service::InferenceService;

/// Runs the HTTP server until the process is stopped.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn run(store: ArtifactStore, host: &str, port: u16) -> Result<()> {
    let addr = format!("{host}:{port}");
    let app = create_router(InferenceService::from_store(store));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "Serving predictions");

    axum::serve(listener, app).await?;
    Ok(())
}
