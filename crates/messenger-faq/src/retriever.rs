// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! FAQ retriever: semantic lookup first, keyword scoring as fallback.
//!
//! The query is embedded and compared by cosine similarity against every
//! active entry that carries an embedding. Matches below the threshold are
//! dropped. When no embedder is configured, embedding fails, or nothing
//! clears the threshold, entries are scored on keywords instead.

use std::sync::Arc;

use messenger_config::model::EmbeddingConfig;
use messenger_core::types::{EmbeddingInput, Locale};
use messenger_core::{EmbeddingAdapter, MessengerError, StorageAdapter};
use tracing::{debug, warn};

use crate::keyword::score_entries;
use crate::types::{FaqMatch, MatchSource, cosine_similarity};

pub struct FaqRetriever {
    storage: Arc<dyn StorageAdapter>,
    embedder: Option<Arc<dyn EmbeddingAdapter>>,
    match_threshold: f32,
    match_count: usize,
}

impl FaqRetriever {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        embedder: Option<Arc<dyn EmbeddingAdapter>>,
        config: &EmbeddingConfig,
    ) -> Self {
        Self {
            storage,
            embedder,
            match_threshold: config.match_threshold as f32,
            match_count: config.match_count.max(1),
        }
    }

    /// Best FAQ matches for `query`, highest score first.
    ///
    /// Only storage failures are errors; embedding failures degrade to
    /// keyword matching.
    pub async fn search(
        &self,
        query: &str,
        locale: Locale,
        fallback: Locale,
    ) -> Result<Vec<FaqMatch>, MessengerError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(embedder) = &self.embedder {
            match self.semantic_search(embedder.as_ref(), query).await {
                Ok(matches) if !matches.is_empty() => return Ok(matches),
                Ok(_) => debug!("no semantic FAQ match above threshold"),
                Err(e) => warn!(error = %e, "FAQ embedding lookup failed, using keywords"),
            }
        }

        let entries = self.storage.list_faqs(true).await?;
        Ok(score_entries(
            &entries,
            query,
            locale,
            fallback,
            self.match_count,
        ))
    }

    async fn semantic_search(
        &self,
        embedder: &dyn EmbeddingAdapter,
        query: &str,
    ) -> Result<Vec<FaqMatch>, MessengerError> {
        let output = embedder
            .embed(EmbeddingInput {
                texts: vec![query.to_string()],
            })
            .await?;
        let query_embedding = output.embeddings.into_iter().next().ok_or_else(|| {
            MessengerError::Provider {
                message: "embedding returned no vector".into(),
                source: None,
            }
        })?;

        let mut matches: Vec<FaqMatch> = self
            .storage
            .list_faq_embeddings()
            .await?
            .into_iter()
            .filter_map(|entry| {
                let score = cosine_similarity(&query_embedding, entry.embedding.as_deref()?);
                (score >= self.match_threshold).then_some(FaqMatch {
                    entry,
                    score,
                    source: MatchSource::Semantic,
                })
            })
            .collect();
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(self.match_count);
        Ok(matches)
    }
}
