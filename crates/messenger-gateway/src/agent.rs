// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent desk routes over live conversations.

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
};
use messenger_core::types::{Conversation, ConversationFilter, Message};
use serde::{Deserialize, Serialize};

use crate::error::{ApiResult, ok};
use crate::handlers::{body, query};
use crate::server::GatewayState;

/// GET /api/chat/messenger-conversations?status=&needs_human=&limit=
pub async fn list(
    State(state): State<GatewayState>,
    params: Result<Query<ConversationFilter>, QueryRejection>,
) -> ApiResult {
    let filter = query(params)?;
    Ok(ok(state.desk.list(&filter).await?))
}

pub async fn detail(State(state): State<GatewayState>, Path(id): Path<String>) -> ApiResult {
    Ok(ok(state.desk.detail(&id).await?))
}

#[derive(Debug, Deserialize)]
pub struct SendBody {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SendResult {
    pub conversation: Conversation,
    pub message: Message,
}

pub async fn send(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    payload: Result<Json<SendBody>, JsonRejection>,
) -> ApiResult {
    let request = body(payload)?;
    let (conversation, message) = state.desk.send(&id, &request.message).await?;
    Ok(ok(SendResult {
        conversation,
        message,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ToggleBody {
    pub paused: bool,
}

pub async fn clara_toggle(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    payload: Result<Json<ToggleBody>, JsonRejection>,
) -> ApiResult {
    let request = body(payload)?;
    Ok(ok(state.desk.set_paused(&id, request.paused).await?))
}

pub async fn resolve_human(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> ApiResult {
    Ok(ok(state.desk.resolve_human(&id).await?))
}

pub async fn close(State(state): State<GatewayState>, Path(id): Path<String>) -> ApiResult {
    Ok(ok(state.desk.close(&id).await?))
}

pub async fn abandon(State(state): State<GatewayState>, Path(id): Path<String>) -> ApiResult {
    Ok(ok(state.desk.abandon(&id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkContactBody {
    #[serde(default)]
    pub contact_id: String,
    #[serde(default)]
    pub branch_id: Option<String>,
}

pub async fn link_contact(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    payload: Result<Json<LinkContactBody>, JsonRejection>,
) -> ApiResult {
    let request = body(payload)?;
    let conversation = state
        .desk
        .link_contact(&id, &request.contact_id, request.branch_id.as_deref())
        .await?;
    Ok(ok(conversation))
}
