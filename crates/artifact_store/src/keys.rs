//! Key derivation for artifacts and archived samples.

use config::ArtifactNaming;
use object_store::path::Path as ObjectStorePath;
use vitals_structs::{ArtifactKind, Sample, UserId};

/// Top-level directory holding per-user model artifacts.
pub const MODEL_DIR: &str = "model";

/// Top-level directory holding archived samples.
pub const ARCHIVE_DIR: &str = "data";

/// Length of the `MM:SS` tail of a `YYYY-MM-DD HH:MM:SS` timestamp.
const MINUTE_SECOND_LEN: usize = 5;

/// Returns `model/{prefix}{user_id}{extension}` for an artifact.
#[must_use]
pub fn artifact_key(naming: &ArtifactNaming, kind: ArtifactKind, user_id: UserId) -> ObjectStorePath {
    ObjectStorePath::from(format!("{MODEL_DIR}/{}", naming.file_name(kind, user_id)))
}

/// Returns `data/{user_id}/{year}/{month}/{day}/{hour}/{minute}_{second}.csv` for a sample.
///
/// The key is derived by textual substitution on the timestamp and assumes the
/// `YYYY-MM-DD HH:MM:SS` format. Other formats produce an odd but deterministic key.
#[must_use]
pub fn partition_key(sample: &Sample) -> String {
    let ts = sample.ts.as_str();

    let separated: Vec<char> = ts
        .chars()
        .map(|c| if matches!(c, '-' | ' ' | ':') { '/' } else { c })
        .collect();
    let directory: String = separated[..separated.len().saturating_sub(MINUTE_SECOND_LEN)]
        .iter()
        .collect();

    let underscored: Vec<char> = ts.chars().map(|c| if c == ':' { '_' } else { c }).collect();
    let file: String = underscored[underscored.len().saturating_sub(MINUTE_SECOND_LEN)..]
        .iter()
        .collect();

    format!("{ARCHIVE_DIR}/{}/{directory}{file}.csv", sample.user_id)
}

/// Object store path for [`partition_key`].
#[must_use]
pub fn archive_key(sample: &Sample) -> ObjectStorePath {
    ObjectStorePath::from(partition_key(sample))
}
