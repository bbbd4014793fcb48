pub mod ask;
pub mod health;

use crate::error::ApiError;
use axum::{
    http::Uri,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use vistula_bot_core::BotCore;

pub fn create_routes(core: Arc<BotCore>) -> Router {
    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health_check))
        .route("/ask", post(ask::ask_question))
        .with_state(core)
}

// Fallback handler for unmatched routes
pub async fn not_found_handler(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("No route for {}", uri.path()))
}
