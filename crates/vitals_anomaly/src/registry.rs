//! Per-user model registry.
//!
//! Resolves a user to the scaler and classifier of one training run, or to nothing.

use anomaly_model::{Artifact, ArtifactError, EllipticEnvelope, StandardScaler};
use artifact_store::{ArtifactStore, StoreError};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;
use vitals_structs::{ArtifactKind, UserId};

/// Why a user's inference bundle could not be resolved.
///
/// Every variant means the same thing to a caller: the user cannot be served.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Failed to fetch {kind} for user {user_id}: {source}")]
    Fetch {
        kind: ArtifactKind,
        user_id: UserId,
        #[source]
        source: StoreError,
    },

    #[error("Failed to decode {kind} for user {user_id}: {source}")]
    Decode {
        kind: ArtifactKind,
        user_id: UserId,
        #[source]
        source: ArtifactError,
    },

    #[error("{kind} stored for user {requested} belongs to user {found}")]
    WrongUser {
        kind: ArtifactKind,
        requested: UserId,
        found: UserId,
    },

    #[error("Scaler fit {scaler} and model fit {model} differ for user {user_id}")]
    FitMismatch {
        user_id: UserId,
        scaler: Uuid,
        model: Uuid,
    },
}

impl ResolveError {
    /// True when an artifact simply has not been published.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Fetch { source, .. } if source.is_not_found())
    }
}

/// Scaler and classifier fitted together for one user.
#[derive(Debug, Clone)]
pub struct InferenceBundle {
    pub user_id: UserId,
    pub fit_id: Uuid,
    pub scaler: StandardScaler,
    pub classifier: EllipticEnvelope,
}

/// Looks up per-user artifacts in the artifact store.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    store: ArtifactStore,
}

impl ModelRegistry {
    #[must_use]
    pub const fn new(store: ArtifactStore) -> Self {
        Self { store }
    }

    /// Resolves the current scaler and model of `user_id` as one bundle.
    ///
    /// Both artifacts are fetched concurrently. The bundle is only returned if both
    /// exist, decode, belong to `user_id` and come from the same fit.
    pub async fn resolve(&self, user_id: UserId) -> Result<InferenceBundle, ResolveError> {
        let (scaler, classifier) = tokio::join!(
            self.fetch::<StandardScaler>(ArtifactKind::Scaler, user_id),
            self.fetch::<EllipticEnvelope>(ArtifactKind::Model, user_id),
        );
        let (scaler, classifier) = (scaler?, classifier?);

        if scaler.fit_id != classifier.fit_id {
            return Err(ResolveError::FitMismatch {
                user_id,
                scaler: scaler.fit_id,
                model: classifier.fit_id,
            });
        }

        debug!(user_id, fit_id = %classifier.fit_id, "Resolved inference bundle");
        Ok(InferenceBundle {
            user_id,
            fit_id: classifier.fit_id,
            scaler: scaler.params,
            classifier: classifier.params,
        })
    }

    /// Lists users with a published model, sorted ascending.
    pub async fn published_users(&self) -> Result<Vec<UserId>, StoreError> {
        self.store.published_users(ArtifactKind::Model).await
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        kind: ArtifactKind,
        user_id: UserId,
    ) -> Result<Artifact<T>, ResolveError> {
        let bytes = self
            .store
            .get_artifact(kind, user_id)
            .await
            .map_err(|source| ResolveError::Fetch {
                kind,
                user_id,
                source,
            })?;

        let artifact = Artifact::<T>::from_bytes(&bytes).map_err(|source| {
            warn!(user_id, %kind, error = %source, "Stored artifact is unreadable");
            ResolveError::Decode {
                kind,
                user_id,
                source,
            }
        })?;

        if artifact.user_id != user_id {
            return Err(ResolveError::WrongUser {
                kind,
                requested: user_id,
                found: artifact.user_id,
            });
        }
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use anomaly_model::EnvelopeConfig;
    use bytes::Bytes;
    use chrono::Utc;

    use super::*;

    fn fitted() -> (StandardScaler, EllipticEnvelope) {
        let data: Vec<[f64; 2]> = (0_i32..40)
            .map(|i| [60.0 + f64::from(i % 8), 15.0 + f64::from(i / 8) * 0.5])
            .collect();
        let (scaler, scaled) = StandardScaler::fit_transform(&data).unwrap();
        let envelope = EllipticEnvelope::fit(&scaled, &EnvelopeConfig::default()).unwrap();
        (scaler, envelope)
    }

    async fn publish(
        store: &ArtifactStore,
        user_id: UserId,
        scaler_fit: Uuid,
        model_fit: Uuid,
    ) {
        let (scaler, envelope) = fitted();
        let scaler = Artifact::new(user_id, scaler_fit, Utc::now(), scaler);
        let model = Artifact::new(user_id, model_fit, Utc::now(), envelope);
        store
            .put_artifact(ArtifactKind::Scaler, user_id, scaler.to_bytes().unwrap())
            .await
            .unwrap();
        store
            .put_artifact(ArtifactKind::Model, user_id, model.to_bytes().unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_resolves_matching_pair() {
        let store = ArtifactStore::in_memory();
        let fit_id = Uuid::new_v4();
        publish(&store, 4, fit_id, fit_id).await;

        let bundle = ModelRegistry::new(store).resolve(4).await.unwrap();
        assert_eq!(bundle.user_id, 4);
        assert_eq!(bundle.fit_id, fit_id);
    }

    #[tokio::test]
    async fn test_missing_user_is_not_found() {
        let registry = ModelRegistry::new(ArtifactStore::in_memory());
        let error = registry.resolve(1).await.unwrap_err();
        assert!(error.is_not_found());
    }

    #[tokio::test]
    async fn test_missing_scaler_fails_whole_bundle() {
        let store = ArtifactStore::in_memory();
        let model = Artifact::new(2, Uuid::new_v4(), Utc::now(), fitted().1);
        store
            .put_artifact(ArtifactKind::Model, 2, model.to_bytes().unwrap())
            .await
            .unwrap();

        let error = ModelRegistry::new(store).resolve(2).await.unwrap_err();
        assert!(matches!(
            error,
            ResolveError::Fetch {
                kind: ArtifactKind::Scaler,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_mismatched_fits_are_rejected() {
        let store = ArtifactStore::in_memory();
        publish(&store, 3, Uuid::new_v4(), Uuid::new_v4()).await;

        let error = ModelRegistry::new(store).resolve(3).await.unwrap_err();
        assert!(matches!(error, ResolveError::FitMismatch { user_id: 3, .. }));
        assert!(!error.is_not_found());
    }

    #[tokio::test]
    async fn test_artifact_of_another_user_is_rejected() {
        let store = ArtifactStore::in_memory();
        let fit_id = Uuid::new_v4();
        publish(&store, 5, fit_id, fit_id).await;
        let copied = store.get_artifact(ArtifactKind::Model, 5).await.unwrap();
        let scaler = store.get_artifact(ArtifactKind::Scaler, 5).await.unwrap();
        store.put_artifact(ArtifactKind::Model, 6, copied).await.unwrap();
        store.put_artifact(ArtifactKind::Scaler, 6, scaler).await.unwrap();

        let error = ModelRegistry::new(store).resolve(6).await.unwrap_err();
        assert!(matches!(error, ResolveError::WrongUser { requested: 6, found: 5, .. }));
    }

    #[tokio::test]
    async fn test_corrupt_artifact_is_decode_error() {
        let store = ArtifactStore::in_memory();
        let fit_id = Uuid::new_v4();
        publish(&store, 8, fit_id, fit_id).await;
        store
            .put_artifact(ArtifactKind::Model, 8, Bytes::from_static(b"{broken"))
            .await
            .unwrap();

        let error = ModelRegistry::new(store).resolve(8).await.unwrap_err();
        assert!(matches!(error, ResolveError::Decode { kind: ArtifactKind::Model, .. }));
    }

    #[tokio::test]
    async fn test_published_users() {
        let store = ArtifactStore::in_memory();
        let fit_id = Uuid::new_v4();
        publish(&store, 9, fit_id, fit_id).await;
        publish(&store, 2, fit_id, fit_id).await;

        let users = ModelRegistry::new(store).published_users().await.unwrap();
        assert_eq!(users, vec![2, 9]);
    }
}
