use serde::{Deserialize, Serialize};

/// Kind of per-user artifact published by training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ArtifactKind {
    /// Fitted outlier classifier.
    Model,
    /// Fitted feature scaler, paired with the model of the same fit.
    Scaler,
    /// Training report with split sizes and validation metrics.
    Report,
}
