// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Admin CRUD over workflows, steps, modules, validation formats, settings
//! and FAQ entries. Every response uses the `{success, data}` envelope.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};
use messenger_core::MessengerError;
use messenger_core::types::{
    FaqDraft, MessengerSettings, ModuleDraft, StepDraft, ValidationFormat, Workflow,
    WorkflowDraft, WorkflowStep,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::error::{ApiError, ApiResult, created, ok};
use crate::handlers::body;
use crate::server::GatewayState;

fn deleted(id: &str) -> ApiResult {
    Ok(ok(json!({ "deleted": id })))
}

// --- Workflows ---

#[derive(Debug, Serialize)]
pub struct WorkflowDetail {
    #[serde(flatten)]
    pub workflow: Workflow,
    pub steps: Vec<WorkflowStep>,
}

pub async fn list_workflows(State(state): State<GatewayState>) -> ApiResult {
    Ok(ok(state.storage.list_workflows().await?))
}

pub async fn get_workflow(State(state): State<GatewayState>, Path(id): Path<String>) -> ApiResult {
    let workflow = state
        .storage
        .get_workflow(&id)
        .await?
        .ok_or_else(|| MessengerError::not_found("workflow", &id))?;
    let steps = state.storage.list_steps(&id).await?;
    Ok(ok(WorkflowDetail { workflow, steps }))
}

pub async fn create_workflow(
    State(state): State<GatewayState>,
    payload: Result<Json<WorkflowDraft>, JsonRejection>,
) -> ApiResult {
    let draft = body(payload)?;
    draft.validate()?;
    let workflow = state.storage.create_workflow(&draft).await?;
    info!(workflow_id = %workflow.id, active = workflow.is_active, "workflow created");
    Ok(created(workflow))
}

pub async fn update_workflow(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    payload: Result<Json<WorkflowDraft>, JsonRejection>,
) -> ApiResult {
    let draft = body(payload)?;
    draft.validate()?;
    Ok(ok(state.storage.update_workflow(&id, &draft).await?))
}

pub async fn activate_workflow(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> ApiResult {
    let workflow = state.storage.activate_workflow(&id).await?;
    info!(workflow_id = %workflow.id, "workflow activated");
    Ok(ok(workflow))
}

pub async fn delete_workflow(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> ApiResult {
    state.storage.delete_workflow(&id).await?;
    info!(workflow_id = %id, "workflow deleted");
    deleted(&id)
}

// --- Steps ---

pub async fn list_steps(State(state): State<GatewayState>, Path(id): Path<String>) -> ApiResult {
    if state.storage.get_workflow(&id).await?.is_none() {
        return Err(MessengerError::not_found("workflow", &id).into());
    }
    Ok(ok(state.storage.list_steps(&id).await?))
}

pub async fn create_step(
    State(state): State<GatewayState>,
    Path(workflow_id): Path<String>,
    payload: Result<Json<StepDraft>, JsonRejection>,
) -> ApiResult {
    let draft = body(payload)?;
    draft.validate()?;
    let step = state.storage.create_step(&workflow_id, &draft).await?;
    Ok(created(step))
}

pub async fn get_step(State(state): State<GatewayState>, Path(id): Path<String>) -> ApiResult {
    let step = state
        .storage
        .get_step_by_id(&id)
        .await?
        .ok_or_else(|| MessengerError::not_found("step", &id))?;
    Ok(ok(step))
}

pub async fn update_step(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    payload: Result<Json<StepDraft>, JsonRejection>,
) -> ApiResult {
    let draft = body(payload)?;
    draft.validate()?;
    Ok(ok(state.storage.update_step(&id, &draft).await?))
}

pub async fn delete_step(State(state): State<GatewayState>, Path(id): Path<String>) -> ApiResult {
    state.storage.delete_step(&id).await?;
    deleted(&id)
}

// --- Modules ---

/// A validated-field module must reference an existing, active format.
async fn check_module(state: &GatewayState, draft: &ModuleDraft) -> Result<(), ApiError> {
    draft.validate()?;
    if let Some(code) = draft.definition.validation_format_code() {
        let format = state.storage.get_validation_format(code).await?;
        if !format.is_some_and(|f| f.is_active) {
            return Err(ApiError::bad_request(format!(
                "validation format `{code}` does not exist or is inactive"
            )));
        }
    }
    Ok(())
}

pub async fn list_modules(State(state): State<GatewayState>) -> ApiResult {
    Ok(ok(state.storage.list_modules().await?))
}

pub async fn get_module(State(state): State<GatewayState>, Path(id): Path<String>) -> ApiResult {
    let module = state
        .storage
        .get_module(&id)
        .await?
        .ok_or_else(|| MessengerError::not_found("module", &id))?;
    Ok(ok(module))
}

pub async fn create_module(
    State(state): State<GatewayState>,
    payload: Result<Json<ModuleDraft>, JsonRejection>,
) -> ApiResult {
    let draft = body(payload)?;
    check_module(&state, &draft).await?;
    Ok(created(state.storage.create_module(&draft).await?))
}

pub async fn update_module(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    payload: Result<Json<ModuleDraft>, JsonRejection>,
) -> ApiResult {
    let draft = body(payload)?;
    check_module(&state, &draft).await?;
    Ok(ok(state.storage.update_module(&id, &draft).await?))
}

pub async fn delete_module(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> ApiResult {
    state.storage.delete_module(&id).await?;
    deleted(&id)
}

// --- Validation formats ---

/// Rejects formats the engine could not apply: unknown function or a
/// pattern that does not compile.
fn check_format(state: &GatewayState, format: &ValidationFormat) -> Result<(), ApiError> {
    format.validate()?;
    if !format.is_active {
        return Ok(());
    }
    state
        .engine
        .registry()
        .check(format)
        .map_err(|e| match e {
            MessengerError::WorkflowConfig(message) => ApiError::bad_request(message),
            other => ApiError(other),
        })
}

pub async fn list_formats(State(state): State<GatewayState>) -> ApiResult {
    Ok(ok(state.storage.list_validation_formats(true).await?))
}

pub async fn get_format(State(state): State<GatewayState>, Path(code): Path<String>) -> ApiResult {
    let format = state
        .storage
        .get_validation_format(&code)
        .await?
        .ok_or_else(|| MessengerError::not_found("validation format", &code))?;
    Ok(ok(format))
}

pub async fn create_format(
    State(state): State<GatewayState>,
    payload: Result<Json<ValidationFormat>, JsonRejection>,
) -> ApiResult {
    let format = body(payload)?;
    check_format(&state, &format)?;
    if state
        .storage
        .get_validation_format(&format.format_code)
        .await?
        .is_some()
    {
        return Err(ApiError::bad_request(format!(
            "validation format `{}` already exists",
            format.format_code
        )));
    }
    Ok(created(state.storage.upsert_validation_format(&format).await?))
}

/// PUT replaces the format stored under the path code.
pub async fn update_format(
    State(state): State<GatewayState>,
    Path(code): Path<String>,
    payload: Result<Json<ValidationFormat>, JsonRejection>,
) -> ApiResult {
    let mut format = body(payload)?;
    format.format_code = code;
    check_format(&state, &format)?;
    if state
        .storage
        .get_validation_format(&format.format_code)
        .await?
        .is_none()
    {
        return Err(MessengerError::not_found("validation format", &format.format_code).into());
    }
    Ok(ok(state.storage.upsert_validation_format(&format).await?))
}

pub async fn delete_format(
    State(state): State<GatewayState>,
    Path(code): Path<String>,
) -> ApiResult {
    state.storage.delete_validation_format(&code).await?;
    deleted(&code)
}

// --- Settings ---

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Default, Deserialize)]
pub struct SettingsPatch {
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub welcome_delay_seconds: Option<u32>,
    #[serde(default)]
    pub auto_resume_minutes: Option<u32>,
}

impl SettingsPatch {
    fn apply(self, mut settings: MessengerSettings) -> Result<MessengerSettings, ApiError> {
        if let Some(active) = self.is_active {
            settings.is_active = active;
        }
        if let Some(delay) = self.welcome_delay_seconds {
            settings.welcome_delay_seconds = delay;
        }
        if let Some(minutes) = self.auto_resume_minutes {
            if minutes == 0 {
                return Err(ApiError::bad_request("auto_resume_minutes must be positive"));
            }
            settings.auto_resume_minutes = minutes;
        }
        Ok(settings)
    }
}

pub async fn get_settings(State(state): State<GatewayState>) -> ApiResult {
    Ok(ok(state.storage.get_settings().await?))
}

pub async fn update_settings(
    State(state): State<GatewayState>,
    payload: Result<Json<SettingsPatch>, JsonRejection>,
) -> ApiResult {
    let patch = body(payload)?;
    let settings = patch.apply(state.storage.get_settings().await?)?;
    let stored = state.storage.update_settings(&settings).await?;
    info!(is_active = stored.is_active, "messenger settings updated");
    Ok(ok(stored))
}

// --- FAQ ---

pub async fn list_faqs(State(state): State<GatewayState>) -> ApiResult {
    Ok(ok(state.storage.list_faqs(false).await?))
}

pub async fn get_faq(State(state): State<GatewayState>, Path(id): Path<String>) -> ApiResult {
    let entry = state
        .storage
        .get_faq(&id)
        .await?
        .ok_or_else(|| MessengerError::not_found("faq", &id))?;
    Ok(ok(entry))
}

pub async fn create_faq(
    State(state): State<GatewayState>,
    payload: Result<Json<FaqDraft>, JsonRejection>,
) -> ApiResult {
    let draft = body(payload)?;
    draft.validate()?;
    let entry = state.storage.create_faq(&draft).await?;
    state.faq_sync.spawn_entry(entry.clone());
    Ok(created(entry))
}

/// The stored embedding is cleared when the text changes; only then is a
/// new sync scheduled.
pub async fn update_faq(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    payload: Result<Json<FaqDraft>, JsonRejection>,
) -> ApiResult {
    let draft = body(payload)?;
    draft.validate()?;
    let entry = state.storage.update_faq(&id, &draft).await?;
    if entry.embedding.is_none() {
        state.faq_sync.spawn_entry(entry.clone());
    }
    Ok(ok(entry))
}

pub async fn delete_faq(State(state): State<GatewayState>, Path(id): Path<String>) -> ApiResult {
    state.storage.delete_faq(&id).await?;
    deleted(&id)
}

/// POST /faq/sync-embeddings
pub async fn sync_embeddings(State(state): State<GatewayState>) -> ApiResult {
    if !state.faq_sync.is_enabled() {
        return Err(MessengerError::Unavailable("no embedding provider configured".into()).into());
    }
    let report = state.faq_sync.sync_all().await?;
    info!(
        synced = report.synced,
        failed = report.failed,
        total = report.total,
        "FAQ embeddings resynced"
    );
    Ok(ok(report))
}
