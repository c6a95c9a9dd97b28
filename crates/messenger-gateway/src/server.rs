// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::future::Future;
use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use messenger_config::model::GatewayConfig;
use messenger_core::{AuthAdapter, MessengerError, StorageAdapter};
use messenger_engine::{AgentDesk, Engine};
use messenger_faq::FaqSync;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::admin;
use crate::agent;
use crate::auth::{ActionPolicy, RouteGuard, auth_middleware};
use crate::handlers;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub engine: Arc<Engine>,
    pub desk: AgentDesk,
    pub storage: Arc<dyn StorageAdapter>,
    /// Schedules FAQ embedding refreshes after admin edits.
    pub faq_sync: Arc<FaqSync>,
    pub auth: Arc<dyn AuthAdapter>,
    /// Process start time for uptime calculation.
    pub start_time: std::time::Instant,
}

/// Builds the full route table.
///
/// - public widget routes under `/api/messenger` plus `/health`
/// - admin CRUD under `/api/admin/messenger` (resource `messenger`)
/// - agent desk under `/api/chat/messenger-conversations` (resource `conversations`)
pub fn router(state: GatewayState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/api/messenger/start", post(handlers::start))
        .route("/api/messenger/message", post(handlers::message))
        .route("/api/messenger/history", get(handlers::history));

    let admin_guard = RouteGuard {
        auth: state.auth.clone(),
        resource: "messenger",
        policy: ActionPolicy::Crud,
    };
    let admin_routes = Router::new()
        .route(
            "/api/admin/messenger/workflows",
            get(admin::list_workflows).post(admin::create_workflow),
        )
        .route(
            "/api/admin/messenger/workflows/{id}",
            get(admin::get_workflow)
                .put(admin::update_workflow)
                .delete(admin::delete_workflow),
        )
        .route(
            "/api/admin/messenger/workflows/{id}/activate",
            post(admin::activate_workflow),
        )
        .route(
            "/api/admin/messenger/workflows/{id}/steps",
            get(admin::list_steps).post(admin::create_step),
        )
        .route(
            "/api/admin/messenger/steps/{id}",
            get(admin::get_step)
                .put(admin::update_step)
                .delete(admin::delete_step),
        )
        .route(
            "/api/admin/messenger/modules",
            get(admin::list_modules).post(admin::create_module),
        )
        .route(
            "/api/admin/messenger/modules/{id}",
            get(admin::get_module)
                .put(admin::update_module)
                .delete(admin::delete_module),
        )
        .route(
            "/api/admin/messenger/validation-formats",
            get(admin::list_formats).post(admin::create_format),
        )
        .route(
            "/api/admin/messenger/validation-formats/{code}",
            get(admin::get_format)
                .put(admin::update_format)
                .delete(admin::delete_format),
        )
        .route(
            "/api/admin/messenger/settings",
            get(admin::get_settings).put(admin::update_settings),
        )
        .route(
            "/api/admin/messenger/faq",
            get(admin::list_faqs).post(admin::create_faq),
        )
        .route(
            "/api/admin/messenger/faq/sync-embeddings",
            post(admin::sync_embeddings),
        )
        .route(
            "/api/admin/messenger/faq/{id}",
            get(admin::get_faq)
                .put(admin::update_faq)
                .delete(admin::delete_faq),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            admin_guard,
            auth_middleware,
        ));

    let desk_guard = RouteGuard {
        auth: state.auth.clone(),
        resource: "conversations",
        policy: ActionPolicy::ViewOrEdit,
    };
    let desk_routes = Router::new()
        .route("/api/chat/messenger-conversations", get(agent::list))
        .route("/api/chat/messenger-conversations/{id}", get(agent::detail))
        .route("/api/chat/messenger-conversations/{id}/send", post(agent::send))
        .route(
            "/api/chat/messenger-conversations/{id}/clara-toggle",
            post(agent::clara_toggle).put(agent::clara_toggle),
        )
        .route(
            "/api/chat/messenger-conversations/{id}/resolve-human",
            post(agent::resolve_human),
        )
        .route("/api/chat/messenger-conversations/{id}/close", post(agent::close))
        .route(
            "/api/chat/messenger-conversations/{id}/abandon",
            post(agent::abandon),
        )
        .route(
            "/api/chat/messenger-conversations/{id}/link-contact",
            post(agent::link_contact).put(agent::link_contact),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            desk_guard,
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .merge(desk_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Binds `host:port` and serves until `shutdown` resolves.
pub async fn start_server(
    config: &GatewayConfig,
    state: GatewayState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), MessengerError> {
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| MessengerError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| MessengerError::Internal(format!("gateway server error: {e}")))?;

    tracing::info!("gateway stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_state_is_clone() {
        fn assert_clone<T: Clone + Send + Sync + 'static>() {}
        assert_clone::<GatewayState>();
    }
}
