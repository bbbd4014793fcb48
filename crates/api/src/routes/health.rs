use axum::{extract::State, Json};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;
use vistula_bot_common::RootMessage;
use vistula_bot_core::BotCore;

pub async fn root() -> Json<RootMessage> {
    Json(RootMessage {
        message: "Backend is working!".to_string(),
    })
}

pub async fn health_check(State(core): State<Arc<BotCore>>) -> Json<serde_json::Value> {
    debug!("Health check requested");

    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "kb_records": core.kb_records(),
        "semantic_enabled": core.semantic_enabled(),
        "llm_provider": core.llm_provider(),
        "timestamp": chrono::Utc::now(),
    }))
}
