// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for the messenger.
//!
//! Exposes the conversation engine to the chat widget, the workflow admin
//! surface and the agent desk. Admin and desk routes sit behind an
//! [`AuthAdapter`](messenger_core::AuthAdapter) permission check.

pub mod admin;
pub mod agent;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;

pub use auth::{ActionPolicy, ApiKeyAuth, RouteGuard};
pub use error::ApiError;
pub use server::{GatewayState, router, start_server};
