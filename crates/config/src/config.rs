use core::time::Duration;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use object_store::ObjectStore;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use vitals_structs::{ArtifactKind, UserId};

/// Default root directory of the local artifact store.
const DEFAULT_STORE_PATH: &str = "./store";

/// Default number of retries for transient storage failures.
const DEFAULT_STORE_RETRIES: usize = 3;

/// Where artifacts and archived samples are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// Directory on the local filesystem.
    Local(PathBuf),
    /// Process-local store, lost on exit. Useful for smoke runs.
    Memory,
    /// Amazon S3 bucket. Requires the `aws` feature.
    S3 { bucket: String },
}

/// File naming of per-user artifacts under the `model/` prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactNaming {
    pub model_prefix: String,
    pub scaler_prefix: String,
    pub report_prefix: String,
    /// Extension including the leading dot, e.g. `.json`.
    pub extension: String,
}

impl Default for ArtifactNaming {
    fn default() -> Self {
        Self {
            model_prefix: "model_".to_string(),
            scaler_prefix: "scaler_".to_string(),
            report_prefix: "report_".to_string(),
            extension: ".json".to_string(),
        }
    }
}

impl ArtifactNaming {
    /// Returns the filename prefix for an artifact kind.
    #[must_use]
    pub fn prefix(&self, kind: ArtifactKind) -> &str {
        match kind {
            ArtifactKind::Model => &self.model_prefix,
            ArtifactKind::Scaler => &self.scaler_prefix,
            ArtifactKind::Report => &self.report_prefix,
        }
    }

    /// Returns `{prefix}{user_id}{extension}`.
    #[must_use]
    pub fn file_name(&self, kind: ArtifactKind, user_id: UserId) -> String {
        format!("{}{user_id}{}", self.prefix(kind), self.extension)
    }

    /// Recovers the user id from a file name written for `kind`.
    #[must_use]
    pub fn parse_user_id(&self, kind: ArtifactKind, file_name: &str) -> Option<UserId> {
        file_name
            .strip_prefix(self.prefix(kind))?
            .strip_suffix(self.extension.as_str())?
            .parse()
            .ok()
    }
}

/// Retry policy for transient storage failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt. Zero disables retrying.
    pub max_times: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_times: DEFAULT_STORE_RETRIES,
            min_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_times: 0,
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub store: StoreBackend,
    pub naming: ArtifactNaming,
    pub retry: RetryPolicy,
}

impl Config {
    /// Loads configuration from the process environment, reading `.env` first if present.
    ///
    /// Environment variables (all optional unless noted):
    /// - `VITALS_STORE`: `local` (default), `memory` or `s3`
    /// - `VITALS_STORE_PATH`: root directory of the local store (default: `./store`)
    /// - `VITALS_BUCKET`: bucket name, required when `VITALS_STORE=s3`
    /// - `VITALS_MODEL_PREFIX`, `VITALS_SCALER_PREFIX`, `VITALS_REPORT_PREFIX`: artifact filename prefixes
    /// - `VITALS_ARTIFACT_EXTENSION`: artifact file extension (default: `.json`)
    /// - `VITALS_STORE_RETRIES`: retries for transient storage failures (default: 3)
    ///
    /// # Errors
    ///
    /// Returns an error if a variable holds an unusable value.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable holds an unusable value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let store = match lookup("VITALS_STORE").as_deref().unwrap_or("local") {
            "local" => StoreBackend::Local(
                lookup("VITALS_STORE_PATH").map_or_else(|| PathBuf::from(DEFAULT_STORE_PATH), PathBuf::from),
            ),
            "memory" => StoreBackend::Memory,
            "s3" => StoreBackend::S3 {
                bucket: lookup("VITALS_BUCKET")
                    .context("VITALS_BUCKET environment variable not set")?,
            },
            other => bail!("Unknown VITALS_STORE backend: {other} (expected local, memory or s3)"),
        };

        let defaults = ArtifactNaming::default();
        let naming = ArtifactNaming {
            model_prefix: lookup("VITALS_MODEL_PREFIX").unwrap_or(defaults.model_prefix),
            scaler_prefix: lookup("VITALS_SCALER_PREFIX").unwrap_or(defaults.scaler_prefix),
            report_prefix: lookup("VITALS_REPORT_PREFIX").unwrap_or(defaults.report_prefix),
            extension: lookup("VITALS_ARTIFACT_EXTENSION").unwrap_or(defaults.extension),
        };

        if naming.model_prefix == naming.scaler_prefix
            || naming.model_prefix == naming.report_prefix
            || naming.scaler_prefix == naming.report_prefix
        {
            bail!("Model, scaler and report prefixes must all differ");
        }

        let mut retry = RetryPolicy::default();
        if let Some(raw) = lookup("VITALS_STORE_RETRIES") {
            retry.max_times = raw
                .parse()
                .with_context(|| format!("Invalid VITALS_STORE_RETRIES: {raw}"))?;
        }

        Ok(Self {
            store,
            naming,
            retry,
        })
    }
}

/// Creates the object store for the configured backend.
///
/// # Errors
///
/// Returns an error if the backend cannot be initialised.
pub fn build_object_store(backend: &StoreBackend) -> anyhow::Result<Arc<dyn ObjectStore>> {
    match backend {
        StoreBackend::Local(base_path) => {
            std::fs::create_dir_all(base_path).with_context(|| {
                format!("Failed to create store directory {}", base_path.display())
            })?;
            let store = LocalFileSystem::new_with_prefix(base_path)
                .context("Failed to create local object store")?;
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => Ok(Arc::new(InMemory::new())),
        StoreBackend::S3 { bucket } => build_s3(bucket),
    }
}

#[cfg(feature = "aws")]
fn build_s3(bucket: &str) -> anyhow::Result<Arc<dyn ObjectStore>> {
    let store = object_store::aws::AmazonS3Builder::from_env()
        .with_bucket_name(bucket)
        .build()
        .context("Failed to create S3 object store")?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "aws"))]
fn build_s3(bucket: &str) -> anyhow::Result<Arc<dyn ObjectStore>> {
    bail!("S3 bucket {bucket} requested but this build lacks the `aws` feature")
}
