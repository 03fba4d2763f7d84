//! HTTP front end for the inference service.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response as HttpResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::service::{InferenceService, RequestEvent, Response};

/// Builds the router: `POST /predict`, `POST /invoke` and `GET /health`.
pub fn create_router(service: InferenceService) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .route("/invoke", post(invoke))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(service)
}

impl IntoResponse for Response {
    fn into_response(self) -> HttpResponse {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.body)).into_response()
    }
}

/// Raw text body holding one record.
async fn predict(State(service): State<InferenceService>, body: String) -> Response {
    service.handle(&body).await
}

/// Gateway-style JSON event.
async fn invoke(
    State(service): State<InferenceService>,
    Json(event): Json<RequestEvent>,
) -> Response {
    service.handle_event(event).await
}

async fn health() -> &'static str {
    "ok"
}
