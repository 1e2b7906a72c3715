//! Sempro · Thesis Proposal Defense Rehearsal Backend
//!
//! - Axum HTTP + WebSocket API
//! - Gemini examiner (question generation + answer evaluation)
//! - Durable chapter drafts / question sets in a JSON file store
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                  : u16 (default 3000)
//!   GEMINI_API_KEY        : examiner credential, sent as the `key` query parameter
//!   GEMINI_BASE_URL       : default "https://generativelanguage.googleapis.com/v1beta"
//!   GEMINI_MODEL          : default "gemini-2.0-flash"
//!   GEMINI_TIMEOUT_SECS   : upstream request timeout (default 60)
//!   STORE_PATH            : JSON store file (default "./data/sempro_store.json")
//!   STATIC_DIR            : front-end directory (default "./static")
//!   AUTOSAVE_DEBOUNCE_MS  : quiet period before chapter drafts are saved (default 500)
//!   PROMPTS_CONFIG_PATH   : optional TOML file overriding the examiner prompts
//!   LOG_LEVEL             : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT            : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod config;
mod error;
mod normalizer;
mod sanitizer;
mod extractor;
mod store;
mod gemini;
mod speech;
mod autosave;
mod session;
mod state;
mod protocol;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::config::Settings;
use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let settings = Settings::from_env();
  let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));

  // Shared state: examiner client, durable store, prompts.
  let state = Arc::new(AppState::new(settings)?);

  let app = build_router(state.clone());

  let listener = TcpListener::bind(addr).await?;
  info!(target: "sempro_backend", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "sempro_backend", error = %e, "Failed to listen for shutdown signal");
    return;
  }
  info!(target: "sempro_backend", "Shutdown signal received");
}
