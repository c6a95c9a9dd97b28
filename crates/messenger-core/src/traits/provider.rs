// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider adapter trait for LLM integrations.

use async_trait::async_trait;

use crate::error::MessengerError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ProviderRequest, ProviderResponse};

/// Adapter for the language model behind delegated modules.
#[async_trait]
pub trait ProviderAdapter: PluginAdapter {
    /// Sends a completion request and returns the full response.
    async fn complete(&self, request: ProviderRequest)
    -> Result<ProviderResponse, MessengerError>;
}
