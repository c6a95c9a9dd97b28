// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Public widget routes: health, start, message and history.
//!
//! These are unauthenticated and return the engine types directly; only
//! failures use the `{success: false, error}` envelope.

use axum::{
    Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    response::IntoResponse,
};
use messenger_core::types::Message;
use messenger_engine::types::{StartRequest, UserMessage};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::server::GatewayState;

/// Unwraps a JSON body, turning extractor rejections into 400s.
pub(crate) fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

pub(crate) fn query<T>(params: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    params
        .map(|Query(value)| value)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// GET /health
pub async fn health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// POST /api/messenger/start
pub async fn start(
    State(state): State<GatewayState>,
    payload: Result<Json<StartRequest>, JsonRejection>,
) -> ApiResult {
    let request = body(payload)?;
    if request.session_id.trim().is_empty() {
        return Err(ApiError::bad_request("sessionId is required"));
    }
    let response = state.engine.start_conversation(&request).await?;
    Ok(Json(response).into_response())
}

/// POST /api/messenger/message
pub async fn message(
    State(state): State<GatewayState>,
    payload: Result<Json<UserMessage>, JsonRejection>,
) -> ApiResult {
    let request = body(payload)?;
    if request.conversation_id.trim().is_empty() {
        return Err(ApiError::bad_request("conversationId is required"));
    }
    let has_choice = request
        .choice_id
        .as_deref()
        .is_some_and(|c| !c.trim().is_empty());
    if request.message.trim().is_empty() && !has_choice {
        return Err(ApiError::bad_request("message is required"));
    }
    let response = state.engine.process_user_message(&request).await?;
    Ok(Json(response).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub success: bool,
    pub conversation_id: String,
    pub messages: Vec<Message>,
}

/// GET /api/messenger/history?conversationId=
pub async fn history(
    State(state): State<GatewayState>,
    params: Result<Query<HistoryQuery>, QueryRejection>,
) -> ApiResult {
    let conversation_id = query(params)?
        .conversation_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("conversationId is required"))?;
    let messages = state.engine.history(&conversation_id).await?;
    Ok(Json(HistoryResponse {
        success: true,
        conversation_id,
        messages,
    })
    .into_response())
}
