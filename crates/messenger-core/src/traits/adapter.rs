// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base adapter trait that all backends implement.

use async_trait::async_trait;

use crate::error::MessengerError;
use crate::types::{AdapterType, HealthStatus};

/// The base trait for all messenger adapters.
///
/// Storage, LLM provider, embedding, and auth backends share identity,
/// lifecycle, and health check capabilities through this trait.
#[async_trait]
pub trait PluginAdapter: Send + Sync + 'static {
    /// Returns the human-readable name of this adapter instance.
    fn name(&self) -> &str;

    /// Returns the semantic version of this adapter.
    fn version(&self) -> semver::Version;

    /// Returns the kind of backend this adapter is.
    fn adapter_type(&self) -> AdapterType;

    /// Performs a health check and returns the adapter's current status.
    async fn health_check(&self) -> Result<HealthStatus, MessengerError>;

    /// Gracefully shuts down the adapter, releasing any held resources.
    async fn shutdown(&self) -> Result<(), MessengerError>;
}
