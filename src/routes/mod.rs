//! Router assembly: HTTP endpoints, CORS, and HTTP tracing.

use axum::{
  routing::{get, post},
  Router,
};
use tower_http::{
  cors::{Any, CorsLayer},
  trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::SharedState;

pub mod http;

/// Build the application router with:
/// - REST-ish API under `/api/v1/...`
/// - CORS (allow any origin/method/headers) – adjust for production if needed
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: SharedState) -> Router {
  Router::new()
    .route("/api/v1/health", get(http::http_health))
    .route("/api/v1/upload", post(http::http_post_upload))
    .route("/api/v1/start", post(http::http_post_start))
    .route("/api/v1/level", get(http::http_get_level))
    .route("/api/v1/phase/advance", post(http::http_post_phase_advance))
    .route("/api/v1/flashcard/next", post(http::http_post_flashcard_next))
    .route("/api/v1/flashcard/prev", post(http::http_post_flashcard_prev))
    .route("/api/v1/answer", post(http::http_post_answer))
    .route("/api/v1/submit", post(http::http_post_submit))
    .route("/api/v1/retry", post(http::http_post_retry))
    .route(
      "/api/v1/answers_document",
      post(http::http_post_answers_document),
    )
    .route("/api/v1/hint", get(http::http_get_hint))
    .with_state(state)
    .layer(
      CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any),
    )
    .layer(
      TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO)),
    )
}
