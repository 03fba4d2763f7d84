//! Request handling: parse, archive, resolve, classify.

use artifact_store::ArtifactStore;
use sample_parser::parse_sample;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use vitals_structs::{Prediction, Sample};

use crate::archiver::SampleArchiver;
use crate::inference::classify;
use crate::registry::ModelRegistry;

pub const MALFORMED_INPUT: &str = "Malformed data input.";
pub const MODEL_UNAVAILABLE: &str = "Model not retrieved from object store successfully.";

/// An incoming request: either the raw record or a gateway event wrapping it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RequestEvent {
    Gateway { body: String },
    Raw(String),
}

impl RequestEvent {
    #[must_use]
    pub fn into_record(self) -> String {
        match self {
            Self::Gateway { body } | Self::Raw(body) => body,
        }
    }
}

/// Outcome returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status_code: u16,
    pub body: Value,
}

impl Response {
    #[must_use]
    pub fn classified(prediction: Prediction) -> Self {
        Self {
            status_code: 200,
            body: Value::from(prediction.code()),
        }
    }

    #[must_use]
    pub fn malformed() -> Self {
        Self {
            status_code: 400,
            body: Value::from(MALFORMED_INPUT),
        }
    }

    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            status_code: 503,
            body: Value::from(MODEL_UNAVAILABLE),
        }
    }

    /// The prediction carried by a successful response.
    #[must_use]
    pub fn prediction(&self) -> Option<Prediction> {
        let code = i32::try_from(self.body.as_i64()?).ok()?;
        Prediction::try_from(code).ok()
    }
}

/// Serves classification requests against per-user models.
#[derive(Debug, Clone)]
pub struct InferenceService {
    registry: ModelRegistry,
    archiver: SampleArchiver,
}

impl InferenceService {
    #[must_use]
    pub const fn new(registry: ModelRegistry, archiver: SampleArchiver) -> Self {
        Self { registry, archiver }
    }

    /// Builds the registry and archiver over one shared store.
    #[must_use]
    pub fn from_store(store: ArtifactStore) -> Self {
        Self::new(ModelRegistry::new(store.clone()), SampleArchiver::new(store))
    }

    #[must_use]
    pub const fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub async fn handle_event(&self, event: RequestEvent) -> Response {
        self.handle(&event.into_record()).await
    }

    /// Classifies one raw `user_id,hr,rr,in_room,ts` record.
    ///
    /// Every well-formed sample is archived on a detached task, whatever the
    /// outcome of classification. Must be called within a tokio runtime.
    pub async fn handle(&self, raw: &str) -> Response {
        self.handle_with_archive(raw).await.0
    }

    /// Like [`InferenceService::handle`], also returning the archive task of a
    /// well-formed sample so short-lived callers can wait for it.
    pub async fn handle_with_archive(&self, raw: &str) -> (Response, Option<JoinHandle<()>>) {
        let sample = match parse_sample(raw) {
            Ok(sample) => sample,
            Err(e) => {
                warn!(error = %e, "Rejected malformed record");
                return (Response::malformed(), None);
            }
        };

        let archive = self.spawn_archive(sample.clone());
        (self.respond(&sample).await, Some(archive))
    }

    async fn respond(&self, sample: &Sample) -> Response {
        let bundle = match self.registry.resolve(sample.user_id).await {
            Ok(bundle) => bundle,
            Err(e) if e.is_not_found() => {
                info!(user_id = sample.user_id, error = %e, "No published model for user");
                return Response::unavailable();
            }
            Err(e) => {
                warn!(user_id = sample.user_id, error = %e, "Failed to resolve user model");
                return Response::unavailable();
            }
        };

        let prediction = classify(sample, &bundle.classifier, &bundle.scaler);
        info!(
            user_id = sample.user_id,
            fit_id = %bundle.fit_id,
            %prediction,
            "Classified sample"
        );
        Response::classified(prediction)
    }

    fn spawn_archive(&self, sample: Sample) -> JoinHandle<()> {
        let archiver = self.archiver.clone();
        tokio::spawn(async move {
            if let Err(e) = archiver.archive(&sample).await {
                warn!(user_id = sample.user_id, error = %e, "Failed to archive sample");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_event_accepts_both_shapes() {
        let wrapped: RequestEvent = serde_json::from_str(r#"{"body": "1,2,3,1,ts"}"#).unwrap();
        let raw: RequestEvent = serde_json::from_str(r#""1,2,3,1,ts""#).unwrap();

        assert_eq!(wrapped.into_record(), "1,2,3,1,ts");
        assert_eq!(raw.into_record(), "1,2,3,1,ts");
    }

    #[test]
    fn test_response_bodies() {
        assert_eq!(
            serde_json::to_string(&Response::malformed()).unwrap(),
            r#"{"status_code":400,"body":"Malformed data input."}"#
        );
        assert_eq!(Response::classified(Prediction::SensorAbsent).body, Value::from(-10));
        assert_eq!(
            Response::classified(Prediction::Outlier).prediction(),
            Some(Prediction::Outlier)
        );
        assert_eq!(Response::unavailable().prediction(), None);
    }

    #[tokio::test]
    async fn test_malformed_record() {
        let service = InferenceService::from_store(ArtifactStore::in_memory());
        assert_eq!(service.handle("1,62.5692246835,16.6139240506,1").await, Response::malformed());
        assert_eq!(service.handle("").await, Response::malformed());
        assert_eq!(service.handle("x,62,16,1,ts").await, Response::malformed());
    }

    #[tokio::test]
    async fn test_user_without_model_is_unavailable() {
        let service = InferenceService::from_store(ArtifactStore::in_memory());
        let response = service.handle("42,62.5,16.6,1,2000-03-20 19:40:00").await;
        assert_eq!(response, Response::unavailable());
    }

    #[tokio::test]
    async fn test_sentinel_still_requires_a_model() {
        let service = InferenceService::from_store(ArtifactStore::in_memory());
        let response = service.handle("42,-1,-1,0,2000-03-20 19:40:00").await;
        assert_eq!(response.status_code, 503);
    }
}
