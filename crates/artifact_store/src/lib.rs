//! Artifact store adapter.
//!
//! Uniform get/put/list over an `object_store` backend, keyed by user and artifact kind,
//! plus the deterministic partition keys used to archive incoming samples.

mod keys;
mod store;

pub use keys::{ARCHIVE_DIR, MODEL_DIR, archive_key, artifact_key, partition_key};
pub use object_store::path::Path as ObjectStorePath;
pub use store::{ArtifactStore, StoreError};
