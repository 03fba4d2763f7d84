//! Offline training pipeline.
//!
//! Fits one scaler and one elliptic envelope per user from historical samples and
//! publishes them through the artifact store. Users are trained on separate tasks,
//! bounded by a semaphore.

#![allow(clippy::cast_precision_loss)]

use std::collections::BTreeMap;
use std::sync::Arc;

use anomaly_model::{
    Artifact, ArtifactError, DEFAULT_CONTAMINATION, EllipticEnvelope, EnvelopeConfig,
    FeatureTransformer, FitError, OutlierClassifier, StandardScaler, chronological_split,
};
use artifact_store::{ArtifactStore, StoreError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{AcquireError, Semaphore};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info};
use uuid::Uuid;
use vitals_structs::{ArtifactKind, FeatureVector, Prediction, Sample, UserId};

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error(transparent)]
    Fit(#[from] FitError),

    #[error("Concurrency must be at least 1")]
    ZeroConcurrency,

    #[error(transparent)]
    Encode(#[from] ArtifactError),

    #[error("Failed to publish {kind}: {source}")]
    Publish {
        kind: ArtifactKind,
        #[source]
        source: StoreError,
    },

    #[error("Training slot unavailable: {0}")]
    Permit(#[from] AcquireError),

    #[error("Training task failed: {0}")]
    Task(#[from] JoinError),
}

/// Row filter, split and fitting parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Rows with a heart rate at or below this are dropped.
    pub min_hr: f64,
    /// Rows with a respiration rate at or below this are dropped.
    pub min_rr: f64,
    /// Share of each user's most recent rows held out for validation.
    pub validation_ratio: f64,
    pub contamination: f64,
    /// Users trained at the same time.
    pub concurrency: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            min_hr: 1.0,
            min_rr: 3.0,
            validation_ratio: 0.2,
            contamination: DEFAULT_CONTAMINATION,
            concurrency: 4,
        }
    }
}

impl TrainingConfig {
    fn validate(&self) -> Result<(), TrainingError> {
        if self.concurrency == 0 {
            return Err(TrainingError::ZeroConcurrency);
        }
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(FitError::InvalidContamination(self.contamination).into());
        }
        if !(0.0..1.0).contains(&self.validation_ratio) {
            return Err(FitError::InvalidValidationRatio(self.validation_ratio).into());
        }
        Ok(())
    }

    fn keeps(&self, sample: &Sample) -> bool {
        sample.in_room && sample.hr > self.min_hr && sample.rr > self.min_rr
    }
}

/// Fit statistics published next to each user's model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub train_rows: usize,
    pub validation_rows: usize,
    /// Share of validation rows the fitted model flags. `None` without validation rows.
    pub validation_outlier_fraction: Option<f64>,
    pub support_size: usize,
    pub config: TrainingConfig,
}

/// Artifacts of one user's fit, sharing a fit id.
#[derive(Debug, Clone)]
pub struct FittedUser {
    pub scaler: Artifact<StandardScaler>,
    pub model: Artifact<EllipticEnvelope>,
    pub report: Artifact<TrainingReport>,
}

impl FittedUser {
    #[must_use]
    pub const fn fit_id(&self) -> Uuid {
        self.model.fit_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserFailure {
    pub user_id: UserId,
    pub error: String,
}

/// Per-user outcome of a training run, each list sorted by user id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrainingSummary {
    pub trained: Vec<UserId>,
    pub skipped: Vec<UserId>,
    pub failed: Vec<UserFailure>,
}

impl TrainingSummary {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

enum Outcome {
    Trained,
    Skipped,
}

/// Groups qualifying feature rows by user, keeping their original order.
///
/// Every user present in `samples` gets an entry, possibly empty.
#[must_use]
pub fn group_by_user(
    samples: &[Sample],
    config: &TrainingConfig,
) -> BTreeMap<UserId, Vec<FeatureVector>> {
    let mut groups: BTreeMap<UserId, Vec<FeatureVector>> = BTreeMap::new();
    for sample in samples {
        let rows = groups.entry(sample.user_id).or_default();
        if config.keeps(sample) {
            rows.push(sample.features());
        }
    }
    groups
}

/// Fits one user's scaler and model on the chronological front of `rows`.
///
/// Returns `None` when the training split is empty.
pub fn fit_user(
    user_id: UserId,
    rows: &[FeatureVector],
    config: &TrainingConfig,
) -> Result<Option<FittedUser>, FitError> {
    let (train, validation) = chronological_split(rows, config.validation_ratio)?;
    if train.is_empty() {
        return Ok(None);
    }

    let (scaler, scaled) = StandardScaler::fit_transform(train)?;
    let envelope = EllipticEnvelope::fit(
        &scaled,
        &EnvelopeConfig {
            contamination: config.contamination,
            ..EnvelopeConfig::default()
        },
    )?;

    let validation_outlier_fraction = (!validation.is_empty()).then(|| {
        let flagged = validation
            .iter()
            .filter(|row| envelope.predict(&scaler.transform(row)) == Prediction::Outlier)
            .count();
        flagged as f64 / validation.len() as f64
    });

    let report = TrainingReport {
        train_rows: train.len(),
        validation_rows: validation.len(),
        validation_outlier_fraction,
        support_size: envelope.support_size(),
        config: *config,
    };

    let fit_id = Uuid::new_v4();
    let trained_at = Utc::now();
    Ok(Some(FittedUser {
        scaler: Artifact::new(user_id, fit_id, trained_at, scaler),
        model: Artifact::new(user_id, fit_id, trained_at, envelope),
        report: Artifact::new(user_id, fit_id, trained_at, report),
    }))
}

/// Fits and publishes per-user artifacts.
#[derive(Debug, Clone)]
pub struct TrainingPipeline {
    store: ArtifactStore,
    config: TrainingConfig,
}

impl TrainingPipeline {
    #[must_use]
    pub const fn new(store: ArtifactStore, config: TrainingConfig) -> Self {
        Self { store, config }
    }

    /// Trains every user found in `samples`.
    ///
    /// Users without qualifying rows or with an empty training split are skipped.
    /// A user whose fit or publish fails is recorded in the summary and does not
    /// stop the others.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub async fn train_all(&self, samples: &[Sample]) -> Result<TrainingSummary, TrainingError> {
        self.config.validate()?;

        let groups = group_by_user(samples, &self.config);
        info!(
            users = groups.len(),
            samples = samples.len(),
            concurrency = self.config.concurrency,
            "Training per-user models"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let handles = groups
            .into_iter()
            .map(|(user_id, rows)| (user_id, self.spawn_user(&semaphore, user_id, rows)))
            .collect();

        let summary = collect_outcomes(handles).await;
        info!(
            trained = summary.trained.len(),
            skipped = summary.skipped.len(),
            failed = summary.failed.len(),
            "Training complete"
        );
        Ok(summary)
    }

    /// Trains one user on its own task once a slot of `semaphore` is free.
    fn spawn_user(
        &self,
        semaphore: &Arc<Semaphore>,
        user_id: UserId,
        rows: Vec<FeatureVector>,
    ) -> JoinHandle<Result<Outcome, TrainingError>> {
        let semaphore = Arc::clone(semaphore);
        let pipeline = self.clone();

        tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await?;
            pipeline.train_user(user_id, &rows).await
        })
    }

    async fn train_user(
        &self,
        user_id: UserId,
        rows: &[FeatureVector],
    ) -> Result<Outcome, TrainingError> {
        let Some(fitted) = fit_user(user_id, rows, &self.config)? else {
            debug!(user_id, rows = rows.len(), "No training rows, skipping user");
            return Ok(Outcome::Skipped);
        };

        self.publish(user_id, &fitted).await?;

        info!(
            user_id,
            fit_id = %fitted.fit_id(),
            train_rows = fitted.report.params.train_rows,
            validation_rows = fitted.report.params.validation_rows,
            "Published user model"
        );
        Ok(Outcome::Trained)
    }

    /// Publishes the scaler, then the model, then the report.
    async fn publish(&self, user_id: UserId, fitted: &FittedUser) -> Result<(), TrainingError> {
        let artifacts = [
            (ArtifactKind::Scaler, fitted.scaler.to_bytes()?),
            (ArtifactKind::Model, fitted.model.to_bytes()?),
            (ArtifactKind::Report, fitted.report.to_bytes()?),
        ];

        for (kind, bytes) in artifacts {
            self.store
                .put_artifact(kind, user_id, bytes)
                .await
                .map_err(|source| TrainingError::Publish { kind, source })?;
        }
        Ok(())
    }
}

/// Awaits every user task. A task that fails or panics is recorded against its user.
async fn collect_outcomes(
    handles: Vec<(UserId, JoinHandle<Result<Outcome, TrainingError>>)>,
) -> TrainingSummary {
    let mut summary = TrainingSummary::default();
    for (user_id, handle) in handles {
        match handle.await.map_err(TrainingError::from).and_then(|outcome| outcome) {
            Ok(Outcome::Trained) => summary.trained.push(user_id),
            Ok(Outcome::Skipped) => summary.skipped.push(user_id),
            Err(e) => {
                error!(user_id, error = %e, "Failed to train user");
                summary.failed.push(UserFailure {
                    user_id,
                    error: e.to_string(),
                });
            }
        }
    }
    summary
}
