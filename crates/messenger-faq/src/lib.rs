// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! FAQ lookup for the messenger.
//!
//! Entries are embedded through an OpenAI-compatible endpoint and matched by
//! cosine similarity; keyword scoring covers the cases where no embedder is
//! available or nothing clears the similarity threshold.

pub mod embedder;
pub mod keyword;
pub mod retriever;
pub mod sync;
pub mod types;

pub use embedder::OpenAiEmbedder;
pub use retriever::FaqRetriever;
pub use sync::FaqSync;
pub use types::{FaqMatch, MatchSource, SyncReport, cosine_similarity, format_faq_block};
