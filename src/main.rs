//! Mastery · Study Content Backend
//!
//! - Axum HTTP API for level-gated study content generation
//! - Pluggable generative backend (Gemini multi-part or OpenAI JSON-mode chat)
//!
//! Important env variables:
//!   PORT              : u16 (default 3000)
//!   PROVIDER          : "gemini" (default) or "openai"
//!   GEMINI_API_KEY    : credential for the multi-part backend
//!   GEMINI_BASE_URL   : default "https://generativelanguage.googleapis.com/v1beta/models"
//!   GEMINI_MODEL      : default "gemini-1.5-flash-latest"
//!   OPENAI_API_KEY    : credential for the chat backend
//!   OPENAI_BASE_URL   : default "https://api.openai.com/v1"
//!   OPENAI_MODEL      : default "gpt-4o-mini"
//!   STUDY_CONFIG_PATH : path to TOML config overriding the level templates
//!   LOG_LEVEL         : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT        : "pretty" (default) or "json"

mod config;
mod domain;
mod error;
mod files;
mod levels;
mod parse;
mod progress;
mod prompt;
mod protocol;
mod provider;
mod routes;
mod session;
mod state;
mod telemetry;
mod util;

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::config::{load_templates_from_env, LevelTemplates, ProviderConfig};
use crate::levels::LevelEngine;
use crate::provider::select_provider;
use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let provider_config = ProviderConfig::from_env();
  info!(
    target: "mastery_backend",
    kind = ?provider_config.kind,
    model = %provider_config.model,
    "Provider selected"
  );

  let templates = load_templates_from_env().unwrap_or_else(LevelTemplates::default);
  let engine = LevelEngine::new(select_provider(&provider_config), templates);

  // Build shared application state (session store + level engine).
  let state = AppState::new(engine);

  // Build the HTTP router with routes, CORS and tracing layers.
  let app = build_router(state);

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "mastery_backend", %addr, "HTTP server listening");
  axum::serve(listener, app).await?;
  Ok(())
}
