use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use std::sync::Arc;
use tracing::debug;
use vistula_bot_common::{AskRequest, AskResponse};
use vistula_bot_core::BotCore;

// Answers always come back as 200; only a malformed body is an error.
pub async fn ask_question(
    State(core): State<Arc<BotCore>>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> ApiResult<Json<AskResponse>> {
    let Json(request) = payload.map_err(|rejection| ApiError::Validation(rejection.body_text()))?;

    debug!("Received question: {}", request.question.trim());

    let answer = core.handler.ask(&request.question).await;

    Ok(Json(AskResponse { answer }))
}
