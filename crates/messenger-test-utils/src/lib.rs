// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for messenger integration tests.
//!
//! Provides mock adapters and a seeded test harness for fast,
//! deterministic, CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`MockProvider`] - Mock LLM provider with pre-configured responses
//! - [`MockEmbedder`] - Deterministic bag-of-words embedder
//! - [`TestHarness`] - Temp database seeded with the booking workflow

pub mod harness;
pub mod mock_embedder;
pub mod mock_provider;

pub use harness::TestHarness;
pub use mock_embedder::MockEmbedder;
pub use mock_provider::MockProvider;
