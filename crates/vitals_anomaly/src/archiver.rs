use artifact_store::{ArtifactStore, StoreError, archive_key};
use bytes::Bytes;
use tracing::debug;
use vitals_structs::Sample;

/// Writes incoming samples to their date-partitioned archive key.
#[derive(Debug, Clone)]
pub struct SampleArchiver {
    store: ArtifactStore,
}

impl SampleArchiver {
    #[must_use]
    pub const fn new(store: ArtifactStore) -> Self {
        Self { store }
    }

    /// Stores `sample` as a one-line CSV record.
    ///
    /// A later sample with the same user and timestamp replaces the earlier one.
    pub async fn archive(&self, sample: &Sample) -> Result<(), StoreError> {
        let key = archive_key(sample);
        self.store
            .put(&key, Bytes::from(sample.to_csv()))
            .await?;

        debug!(user_id = sample.user_id, key = %key, "Archived sample");
        Ok(())
    }
}
