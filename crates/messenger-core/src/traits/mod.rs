// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for the messenger's pluggable backends.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod auth;
pub mod embedding;
pub mod provider;
pub mod storage;

pub use adapter::PluginAdapter;
pub use auth::AuthAdapter;
pub use embedding::EmbeddingAdapter;
pub use provider::ProviderAdapter;
pub use storage::StorageAdapter;
