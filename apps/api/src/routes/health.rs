use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::config::ScorerBackend;
use crate::state::AppState;

/// GET /health
/// Returns service version plus which optional backends are wired in.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let scorer = match state.config.scorer {
        ScorerBackend::Heuristic => "heuristic",
        ScorerBackend::Llm => "llm",
    };
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "practice-api",
        "scorer": scorer,
        "question_generation": state.config.anthropic_api_key.is_some(),
        "persistence": state.config.database_url.is_some(),
        "recording": state.config.recorder_url.is_some(),
        "live_sessions": state.registry.len().await,
    }))
}
