//! Anomaly model crate for per-user vital-sign outlier detection.
//!
//! Provides the two capabilities serving needs, a [`FeatureTransformer`] and an
//! [`OutlierClassifier`], together with the fitted implementations used by training:
//! a [`StandardScaler`] and an [`EllipticEnvelope`] built on a robust covariance estimate.

use thiserror::Error;
use vitals_structs::{FeatureVector, Prediction};

mod artifact;
mod dataset;
mod envelope;
mod linalg;
mod scaler;

pub use artifact::{ARTIFACT_FORMAT_VERSION, Artifact, ArtifactError};
pub use dataset::chronological_split;
pub use envelope::{DEFAULT_CONTAMINATION, EllipticEnvelope, EnvelopeConfig};
pub use scaler::StandardScaler;

/// Errors raised while fitting or preparing training data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error("No rows to fit on")]
    EmptyDataset,

    #[error("Feature row {row} contains a non-finite value")]
    NonFiniteFeature { row: usize },

    #[error("Contamination must be in (0, 0.5], got {0}")]
    InvalidContamination(f64),

    #[error("Support fraction must be in (0, 1], got {0}")]
    InvalidSupportFraction(f64),

    #[error("Validation ratio must be in [0, 1), got {0}")]
    InvalidValidationRatio(f64),
}

/// A fitted transformation applied to a feature row before classification.
pub trait FeatureTransformer: Send + Sync {
    /// Transforms one feature row.
    fn transform(&self, features: &FeatureVector) -> FeatureVector;
}

/// A fitted binary outlier classifier.
///
/// Implementors only return [`Prediction::Outlier`] or [`Prediction::Normal`].
pub trait OutlierClassifier: Send + Sync {
    /// Signed decision value for one (already transformed) feature row.
    ///
    /// Negative values are outliers.
    fn decision_function(&self, features: &FeatureVector) -> f64;

    /// Classifies one (already transformed) feature row.
    fn predict(&self, features: &FeatureVector) -> Prediction {
        Prediction::from_decision(self.decision_function(features))
    }
}

fn check_finite(data: &[FeatureVector]) -> Result<(), FitError> {
    if data.is_empty() {
        return Err(FitError::EmptyDataset);
    }

    match data
        .iter()
        .position(|row| row.iter().any(|value| !value.is_finite()))
    {
        Some(row) => Err(FitError::NonFiniteFeature { row }),
        None => Ok(()),
    }
}
