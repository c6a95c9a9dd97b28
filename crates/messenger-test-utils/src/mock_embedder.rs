// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic embedder for FAQ tests.
//!
//! Each lowercased word is hashed into one of [`DIMENSIONS`] buckets, so
//! texts sharing words get a high cosine similarity.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use messenger_core::types::{AdapterType, EmbeddingInput, EmbeddingOutput, HealthStatus};
use messenger_core::{EmbeddingAdapter, MessengerError, PluginAdapter};

pub const DIMENSIONS: usize = 64;

#[derive(Default)]
pub struct MockEmbedder {
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following call fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; DIMENSIONS];
        for word in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() > 2)
        {
            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            vector[(hasher.finish() % DIMENSIONS as u64) as usize] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl PluginAdapter for MockEmbedder {
    fn name(&self) -> &str {
        "mock-embedder"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, MessengerError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), MessengerError> {
        Ok(())
    }
}

#[async_trait]
impl EmbeddingAdapter for MockEmbedder {
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, MessengerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(MessengerError::Provider {
                message: "mock embedder failure".into(),
                source: None,
            });
        }
        Ok(EmbeddingOutput {
            embeddings: input.texts.iter().map(|t| Self::vector(t)).collect(),
            dimensions: DIMENSIONS,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shared_words_give_identical_buckets() {
        let embedder = MockEmbedder::new();
        let out = embedder
            .embed(EmbeddingInput {
                texts: vec!["Parking hours".into(), "parking HOURS!".into()],
            })
            .await
            .unwrap();
        assert_eq!(out.embeddings[0], out.embeddings[1]);
        assert_eq!(out.dimensions, DIMENSIONS);
        assert_eq!(embedder.calls(), 1);
    }

    #[tokio::test]
    async fn failing_mode_errors() {
        let embedder = MockEmbedder::new();
        embedder.set_failing(true);
        assert!(embedder
            .embed(EmbeddingInput {
                texts: vec!["x".into()]
            })
            .await
            .is_err());
    }
}
