//! Per-user vital-sign anomaly detection.
//!
//! Trains a scaler and an outlier model per user, publishes them to object storage,
//! and classifies incoming samples against the right user's model while archiving
//! every sample for later retraining.

pub mod archiver;
pub mod commands;
pub mod inference;
pub mod registry;
pub mod server;
pub mod service;
pub mod training;

pub use archiver::SampleArchiver;
pub use inference::classify;
pub use registry::{InferenceBundle, ModelRegistry, ResolveError};
pub use service::{InferenceService, MALFORMED_INPUT, MODEL_UNAVAILABLE, RequestEvent, Response};
pub use training::{
    FittedUser, TrainingConfig, TrainingError, TrainingPipeline, TrainingReport,
    TrainingSummary, UserFailure,
};
