//! HTTP surface: `POST /boundly/query` and `GET /health`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::service::{AnswerError, AnsweringService, QueryResponse};

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub question: String,
}

pub fn router(service: Arc<AnsweringService>) -> Router {
    Router::new()
        .route("/boundly/query", post(query))
        .route("/health", get(health))
        .with_state(service)
        .layer(TraceLayer::new_for_http())
}

async fn query(
    State(service): State<Arc<AnsweringService>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AnswerError> {
    info!(question = %request.question, "query");
    let response = service.answer(&request.question).await?;
    Ok(Json(response))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

impl IntoResponse for AnswerError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Retrieval(_) | Self::ModelInvocation(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::MalformedModelOutput { .. } => StatusCode::BAD_GATEWAY,
        };
        if let Self::MalformedModelOutput { raw, .. } = &self {
            error!(error = %self, raw = %raw, "query failed");
        } else {
            error!(error = %self, "query failed");
        }
        (status, Json(json!({ "error": self.kind(), "detail": self.to_string() }))).into_response()
    }
}
