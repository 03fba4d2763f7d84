//! Retrying get/put/list over an injected object store.

use std::sync::Arc;

use backon::{ExponentialBuilder, Retryable};
use bytes::Bytes;
use config::{ArtifactNaming, RetryPolicy};
use futures::TryStreamExt;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectStorePath;
use object_store::{ObjectStore, ObjectStoreExt, PutPayload};
use thiserror::Error;
use tracing::{debug, warn};
use vitals_structs::{ArtifactKind, UserId};

use crate::keys::{MODEL_DIR, artifact_key};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Object {key} not found")]
    NotFound { key: String },

    #[error("Object store request for {key} failed: {source}")]
    Backend {
        key: String,
        #[source]
        source: object_store::Error,
    },
}

impl StoreError {
    fn from_backend(key: &ObjectStorePath, source: object_store::Error) -> Self {
        match source {
            object_store::Error::NotFound { .. } => Self::NotFound {
                key: key.to_string(),
            },
            source => Self::Backend {
                key: key.to_string(),
                source,
            },
        }
    }

    /// True when the object does not exist, as opposed to a failed request.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Only failed requests are retried; a missing object stays missing.
fn is_transient(error: &object_store::Error) -> bool {
    !matches!(error, object_store::Error::NotFound { .. })
}

/// Blob store shared by training and serving.
///
/// Cheap to clone: clones share the underlying object store.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    inner: Arc<dyn ObjectStore>,
    naming: ArtifactNaming,
    retry: RetryPolicy,
}

impl ArtifactStore {
    /// Wraps an object store with the given artifact naming and the default retry policy.
    #[must_use]
    pub fn new(inner: Arc<dyn ObjectStore>, naming: ArtifactNaming) -> Self {
        Self {
            inner,
            naming,
            retry: RetryPolicy::default(),
        }
    }

    /// An empty in-memory store with default naming and no retries.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()), ArtifactNaming::default())
            .with_retry(RetryPolicy::none())
    }

    /// Replaces the retry policy for transient failures.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub const fn naming(&self) -> &ArtifactNaming {
        &self.naming
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.retry.min_delay)
            .with_max_delay(self.retry.max_delay)
            .with_max_times(self.retry.max_times)
    }

    /// Reads the object at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if there is no such object, or
    /// [`StoreError::Backend`] if the request still fails after retries.
    pub async fn get(&self, key: &ObjectStorePath) -> Result<Bytes, StoreError> {
        let inner = &self.inner;

        (|| async { inner.get(key).await?.bytes().await })
            .retry(self.backoff())
            .when(is_transient)
            .notify(|error, delay| {
                warn!(key = %key, error = %error, ?delay, "Retrying object store read");
            })
            .await
            .map_err(|source| StoreError::from_backend(key, source))
    }

    /// Writes `bytes` at `key`, replacing any existing object.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the write still fails after retries.
    pub async fn put(&self, key: &ObjectStorePath, bytes: Bytes) -> Result<(), StoreError> {
        let inner = &self.inner;

        (|| async { inner.put(key, PutPayload::from(bytes.clone())).await })
            .retry(self.backoff())
            .when(is_transient)
            .notify(|error, delay| {
                warn!(key = %key, error = %error, ?delay, "Retrying object store write");
            })
            .await
            .map_err(|source| StoreError::from_backend(key, source))?;

        debug!(key = %key, bytes = bytes.len(), "Stored object");
        Ok(())
    }

    /// Lists every object key under `prefix`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if listing still fails after retries.
    pub async fn list(&self, prefix: &ObjectStorePath) -> Result<Vec<ObjectStorePath>, StoreError> {
        let inner = &self.inner;

        (|| async {
            inner
                .list(Some(prefix))
                .map_ok(|meta| meta.location)
                .try_collect::<Vec<_>>()
                .await
        })
        .retry(self.backoff())
        .when(is_transient)
        .await
        .map_err(|source| StoreError::from_backend(prefix, source))
    }

    /// Reads the artifact of `kind` published for `user_id`.
    ///
    /// # Errors
    ///
    /// See [`ArtifactStore::get`].
    pub async fn get_artifact(&self, kind: ArtifactKind, user_id: UserId) -> Result<Bytes, StoreError> {
        self.get(&artifact_key(&self.naming, kind, user_id)).await
    }

    /// Publishes the artifact of `kind` for `user_id`, overwriting the previous version.
    ///
    /// # Errors
    ///
    /// See [`ArtifactStore::put`].
    pub async fn put_artifact(
        &self,
        kind: ArtifactKind,
        user_id: UserId,
        bytes: Bytes,
    ) -> Result<(), StoreError> {
        self.put(&artifact_key(&self.naming, kind, user_id), bytes).await
    }

    /// Lists the users that have an artifact of `kind`, sorted ascending.
    ///
    /// # Errors
    ///
    /// See [`ArtifactStore::list`].
    pub async fn published_users(&self, kind: ArtifactKind) -> Result<Vec<UserId>, StoreError> {
        let keys = self.list(&ObjectStorePath::from(MODEL_DIR)).await?;

        let mut users: Vec<UserId> = keys
            .iter()
            .filter_map(|key| key.filename())
            .filter_map(|name| self.naming.parse_user_id(kind, name))
            .collect();
        users.sort_unstable();
        users.dedup();

        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use object_store::local::LocalFileSystem;

    use super::*;

    #[tokio::test]
    async fn test_put_then_get() {
        let store = ArtifactStore::in_memory();
        let key = ObjectStorePath::from("data/1/2000/03/20/19/40_00.csv");

        store.put(&key, Bytes::from_static(b"1,60,15,1,ts")).await.unwrap();

        let bytes = store.get(&key).await.unwrap();
        assert_eq!(bytes.as_ref(), b"1,60,15,1,ts");
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let store = ArtifactStore::in_memory();
        let error = store
            .get_artifact(ArtifactKind::Model, 99)
            .await
            .unwrap_err();

        assert!(error.is_not_found());
        assert!(error.to_string().contains("model/model_99.json"));
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let store = ArtifactStore::in_memory();
        store
            .put_artifact(ArtifactKind::Scaler, 1, Bytes::from_static(b"old"))
            .await
            .unwrap();
        store
            .put_artifact(ArtifactKind::Scaler, 1, Bytes::from_static(b"new"))
            .await
            .unwrap();

        let bytes = store.get_artifact(ArtifactKind::Scaler, 1).await.unwrap();
        assert_eq!(bytes.as_ref(), b"new");
    }

    #[tokio::test]
    async fn test_published_users() {
        let store = ArtifactStore::in_memory();
        for user_id in [12, 3] {
            store
                .put_artifact(ArtifactKind::Model, user_id, Bytes::from_static(b"{}"))
                .await
                .unwrap();
        }
        store
            .put_artifact(ArtifactKind::Scaler, 8, Bytes::from_static(b"{}"))
            .await
            .unwrap();
        store
            .put(&ObjectStorePath::from("data/4/x.csv"), Bytes::new())
            .await
            .unwrap();

        assert_eq!(store.published_users(ArtifactKind::Model).await.unwrap(), vec![3, 12]);
        assert_eq!(store.published_users(ArtifactKind::Scaler).await.unwrap(), vec![8]);
    }

    #[tokio::test]
    async fn test_failed_write_is_backend_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the object should go makes the final rename fail.
        std::fs::create_dir_all(dir.path().join("model").join("model_1.json")).unwrap();

        let local = LocalFileSystem::new_with_prefix(dir.path()).unwrap();
        let store = ArtifactStore::new(Arc::new(local), ArtifactNaming::default())
            .with_retry(RetryPolicy::none());

        let error = store
            .put_artifact(ArtifactKind::Model, 1, Bytes::from_static(b"{}"))
            .await
            .unwrap_err();
        assert!(!error.is_not_found());
    }
}
