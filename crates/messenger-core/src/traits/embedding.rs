// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding adapter trait for FAQ vectorization.

use async_trait::async_trait;

use crate::error::MessengerError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{EmbeddingInput, EmbeddingOutput};

/// Adapter that turns texts into vectors for semantic FAQ lookup.
#[async_trait]
pub trait EmbeddingAdapter: PluginAdapter {
    /// Generates one embedding per input text, in input order.
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, MessengerError>;
}
