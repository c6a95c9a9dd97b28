// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authentication and authorization for the admin and agent routes.
//!
//! Callers present `Authorization: Bearer <token>`. The built-in
//! [`ApiKeyAuth`] matches the token against the configured API keys, whose
//! grants read `resource:action` with `*` wildcards on either side.
//!
//! When no API key is configured, all protected requests are rejected
//! (fail-closed).

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, Method},
    middleware::Next,
    response::Response,
};
use messenger_config::model::ApiKeyConfig;
use messenger_core::types::{
    AdapterType, AuthIdentity, AuthToken, HealthStatus, PermissionAction,
};
use messenger_core::{AuthAdapter, MessengerError, PluginAdapter};

use crate::error::ApiError;

/// Static API keys from the gateway configuration.
pub struct ApiKeyAuth {
    keys: Vec<ApiKeyConfig>,
}

impl std::fmt::Debug for ApiKeyAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyAuth")
            .field("keys", &self.keys.len())
            .finish()
    }
}

impl ApiKeyAuth {
    pub fn new(keys: Vec<ApiKeyConfig>) -> Self {
        let keys = keys
            .into_iter()
            .filter(|k| !k.token.trim().is_empty())
            .collect();
        Self { keys }
    }
}

/// Whether one `resource:action` grant covers the request.
pub fn grant_allows(grant: &str, resource: &str, action: PermissionAction) -> bool {
    let grant = grant.trim();
    if grant == "*" {
        return true;
    }
    let Some((granted_resource, granted_action)) = grant.split_once(':') else {
        return false;
    };
    let resource_ok = granted_resource == "*" || granted_resource == resource;
    let action_ok = granted_action == "*" || granted_action == action.to_string();
    resource_ok && action_ok
}

#[async_trait]
impl PluginAdapter for ApiKeyAuth {
    fn name(&self) -> &str {
        "api-key-auth"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Auth
    }

    async fn health_check(&self) -> Result<HealthStatus, MessengerError> {
        if self.keys.is_empty() {
            Ok(HealthStatus::Degraded("no API keys configured".into()))
        } else {
            Ok(HealthStatus::Healthy)
        }
    }

    async fn shutdown(&self) -> Result<(), MessengerError> {
        Ok(())
    }
}

#[async_trait]
impl AuthAdapter for ApiKeyAuth {
    async fn authenticate(&self, token: AuthToken) -> Result<AuthIdentity, MessengerError> {
        if self.keys.is_empty() {
            tracing::error!("gateway has no API keys configured -- rejecting request");
            return Err(MessengerError::Unauthenticated);
        }
        self.keys
            .iter()
            .find(|key| key.token == token.token)
            .map(|key| AuthIdentity {
                name: key.name.clone(),
                grants: key.grants.clone(),
            })
            .ok_or(MessengerError::Unauthenticated)
    }

    fn authorize(
        &self,
        identity: &AuthIdentity,
        resource: &str,
        action: PermissionAction,
    ) -> Result<(), MessengerError> {
        if identity
            .grants
            .iter()
            .any(|grant| grant_allows(grant, resource, action))
        {
            Ok(())
        } else {
            Err(MessengerError::PermissionDenied {
                resource: resource.to_string(),
                action: action.to_string(),
            })
        }
    }
}

/// How a route group derives the required action from the HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionPolicy {
    /// GET view, POST create, PUT/PATCH edit, DELETE delete.
    Crud,
    /// GET view, anything else edit.
    ViewOrEdit,
}

impl ActionPolicy {
    pub fn action(&self, method: &Method) -> PermissionAction {
        match (self, method) {
            (_, &Method::GET | &Method::HEAD) => PermissionAction::View,
            (ActionPolicy::ViewOrEdit, _) => PermissionAction::Edit,
            (ActionPolicy::Crud, &Method::POST) => PermissionAction::Create,
            (ActionPolicy::Crud, &Method::DELETE) => PermissionAction::Delete,
            (ActionPolicy::Crud, _) => PermissionAction::Edit,
        }
    }
}

/// Middleware state: which resource a route group protects.
#[derive(Clone)]
pub struct RouteGuard {
    pub auth: Arc<dyn AuthAdapter>,
    pub resource: &'static str,
    pub policy: ActionPolicy,
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Authenticates the caller and checks the grant for this route group.
///
/// The verified [`AuthIdentity`] is stored in the request extensions.
pub async fn auth_middleware(
    State(guard): State<RouteGuard>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer(request.headers()).ok_or(MessengerError::Unauthenticated)?;
    let identity = guard.auth.authenticate(AuthToken { token }).await?;
    let action = guard.policy.action(request.method());
    guard
        .auth
        .authorize(&identity, guard.resource, action)
        .inspect_err(|_| {
            tracing::debug!(
                caller = %identity.name,
                resource = guard.resource,
                action = %action,
                "permission denied"
            );
        })?;
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}
