// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON envelope and error-to-status mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use messenger_core::MessengerError;
use serde::Serialize;
use serde_json::json;

/// Message shown for failures whose detail stays in the server log.
const GENERIC_FAILURE: &str = "the request could not be processed";

/// `{ "success": true, "data": ... }`
pub fn ok<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(json!({ "success": true, "data": data }))).into_response()
}

pub fn created<T: Serialize>(data: T) -> Response {
    (
        StatusCode::CREATED,
        Json(json!({ "success": true, "data": data })),
    )
        .into_response()
}

/// An engine error on its way to the client.
#[derive(Debug)]
pub struct ApiError(pub MessengerError);

impl From<MessengerError> for ApiError {
    fn from(e: MessengerError) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self(MessengerError::InvalidInput(message.into()))
    }

    pub fn status(&self) -> StatusCode {
        match &self.0 {
            MessengerError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            MessengerError::Unauthenticated => StatusCode::UNAUTHORIZED,
            MessengerError::PermissionDenied { .. } => StatusCode::FORBIDDEN,
            MessengerError::NotFound { .. } => StatusCode::NOT_FOUND,
            MessengerError::ConversationClosed { .. } | MessengerError::Conflict { .. } => {
                StatusCode::CONFLICT
            }
            MessengerError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            MessengerError::Provider { .. } => StatusCode::BAD_GATEWAY,
            MessengerError::Timeout { .. } => StatusCode::BAD_GATEWAY,
            MessengerError::Config(_)
            | MessengerError::WorkflowConfig(_)
            | MessengerError::Storage { .. }
            | MessengerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match &self.0 {
            MessengerError::InvalidInput(_) => "invalid_input",
            MessengerError::Unauthenticated => "unauthenticated",
            MessengerError::PermissionDenied { .. } => "permission_denied",
            MessengerError::NotFound { .. } => "not_found",
            MessengerError::ConversationClosed { .. } => "conversation_closed",
            MessengerError::Conflict { .. } => "conflict",
            MessengerError::Unavailable(_) => "unavailable",
            MessengerError::Provider { .. } => "provider_error",
            MessengerError::Timeout { .. } => "timeout",
            MessengerError::Config(_) | MessengerError::WorkflowConfig(_) => "configuration_error",
            MessengerError::Storage { .. } | MessengerError::Internal(_) => "internal_error",
        }
    }

    fn message(&self) -> String {
        if self.status().is_server_error() && !matches!(self.0, MessengerError::Unavailable(_)) {
            GENERIC_FAILURE.to_string()
        } else {
            self.0.to_string()
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self.0, "request failed");
        }
        let mut body = json!({
            "success": false,
            "error": self.message(),
            "code": self.code(),
        });
        if let MessengerError::ConversationClosed { status, .. } = &self.0 {
            body["conversationStatus"] = json!(status);
        }
        (status, Json(body)).into_response()
    }
}

pub type ApiResult = Result<Response, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use messenger_core::types::ConversationStatus;

    #[test]
    fn statuses_follow_the_taxonomy() {
        let cases = [
            (MessengerError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (MessengerError::not_found("workflow", "w1"), StatusCode::NOT_FOUND),
            (
                MessengerError::ConversationClosed {
                    conversation_id: "c1".into(),
                    status: ConversationStatus::Completed,
                },
                StatusCode::CONFLICT,
            ),
            (MessengerError::workflow("no active workflow"), StatusCode::INTERNAL_SERVER_ERROR),
            (MessengerError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (MessengerError::Unavailable("off".into()), StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (error, status) in cases {
            assert_eq!(ApiError(error).status(), status);
        }
    }

    #[test]
    fn configuration_detail_is_not_exposed() {
        let error = ApiError(MessengerError::workflow("step `X` references unknown module"));
        assert_eq!(error.message(), GENERIC_FAILURE);
        assert_eq!(error.code(), "configuration_error");

        let error = ApiError(MessengerError::Unavailable("messenger is disabled".into()));
        assert!(error.message().contains("disabled"));
    }
}
