//! Versioned JSON envelope for fitted artifacts.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use vitals_structs::UserId;

pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Failed to encode artifact: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to decode artifact: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Unsupported artifact format version {0}")]
    UnsupportedVersion(u32),
}

/// Fitted parameters plus the metadata needed to pair and audit them.
///
/// Artifacts produced by the same training run share a `fit_id`, so a scaler
/// and a model read back together can be checked to belong to one fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact<T> {
    pub format_version: u32,
    pub user_id: UserId,
    pub fit_id: Uuid,
    pub trained_at: DateTime<Utc>,
    pub params: T,
}

impl<T> Artifact<T> {
    #[must_use]
    pub fn new(user_id: UserId, fit_id: Uuid, trained_at: DateTime<Utc>, params: T) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            user_id,
            fit_id,
            trained_at,
            params,
        }
    }
}

impl<T: Serialize> Artifact<T> {
    /// # Errors
    ///
    /// Returns [`ArtifactError::Encode`] if the parameters cannot be serialized.
    pub fn to_bytes(&self) -> Result<Bytes, ArtifactError> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(ArtifactError::Encode)
    }
}

impl<T: DeserializeOwned> Artifact<T> {
    /// # Errors
    ///
    /// Returns an error if `bytes` is not a valid artifact or was written by an
    /// incompatible format version.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArtifactError> {
        let artifact: Self = serde_json::from_slice(bytes).map_err(ArtifactError::Decode)?;
        if artifact.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(ArtifactError::UnsupportedVersion(artifact.format_version));
        }
        Ok(artifact)
    }
}
