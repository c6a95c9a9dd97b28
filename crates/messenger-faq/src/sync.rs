// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding synchronization for FAQ entries.
//!
//! Admin edits schedule a detached sync through [`FaqSync::spawn_entry`];
//! failures are logged and never reach the caller. [`FaqSync::sync_all`]
//! recomputes every active entry in order-index order.

use std::sync::Arc;
use std::time::Duration;

use messenger_core::types::{EmbeddingInput, FaqEntry};
use messenger_core::{EmbeddingAdapter, MessengerError, StorageAdapter};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::types::SyncReport;

#[derive(Clone)]
pub struct FaqSync {
    storage: Arc<dyn StorageAdapter>,
    embedder: Option<Arc<dyn EmbeddingAdapter>>,
    retries: u32,
}

impl FaqSync {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        embedder: Option<Arc<dyn EmbeddingAdapter>>,
        retries: u32,
    ) -> Self {
        Self {
            storage,
            embedder,
            retries,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.embedder.is_some()
    }

    /// Embed one entry and store the vector. `Ok(false)` when there is
    /// nothing to embed.
    pub async fn sync_entry(&self, entry: &FaqEntry) -> Result<bool, MessengerError> {
        let embedder = self.embedder.as_ref().ok_or_else(|| {
            MessengerError::Unavailable("no embedding provider configured".into())
        })?;
        let text = entry.embedding_text();
        if text.is_empty() {
            return Ok(false);
        }

        let mut attempt = 0;
        let embedding = loop {
            let result = embedder
                .embed(EmbeddingInput {
                    texts: vec![text.clone()],
                })
                .await
                .and_then(|output| {
                    output.embeddings.into_iter().next().ok_or_else(|| {
                        MessengerError::Provider {
                            message: "embedding returned no vector".into(),
                            source: None,
                        }
                    })
                });
            match result {
                Ok(embedding) => break embedding,
                Err(e) if attempt < self.retries => {
                    attempt += 1;
                    debug!(faq_id = %entry.id, attempt, error = %e, "retrying FAQ embedding");
                    tokio::time::sleep(Duration::from_millis(200 * u64::from(attempt))).await;
                }
                Err(e) => return Err(e),
            }
        };

        self.storage.set_faq_embedding(&entry.id, &embedding).await?;
        Ok(true)
    }

    /// Schedule a detached sync of `entry`. Returns `None` without an embedder.
    pub fn spawn_entry(&self, entry: FaqEntry) -> Option<JoinHandle<()>> {
        if !self.is_enabled() {
            debug!(faq_id = %entry.id, "embedding sync skipped, no provider");
            return None;
        }
        let sync = self.clone();
        Some(tokio::spawn(async move {
            match sync.sync_entry(&entry).await {
                Ok(true) => debug!(faq_id = %entry.id, "FAQ embedding stored"),
                Ok(false) => debug!(faq_id = %entry.id, "FAQ entry has no text to embed"),
                Err(e) => warn!(faq_id = %entry.id, error = %e, "FAQ embedding sync failed"),
            }
        }))
    }

    /// Recompute embeddings for all active entries.
    pub async fn sync_all(&self) -> Result<SyncReport, MessengerError> {
        if !self.is_enabled() {
            return Err(MessengerError::Unavailable(
                "no embedding provider configured".into(),
            ));
        }
        let entries = self.storage.list_faqs(true).await?;
        let mut report = SyncReport {
            total: entries.len(),
            ..Default::default()
        };
        for entry in &entries {
            match self.sync_entry(entry).await {
                Ok(true) => report.synced += 1,
                Ok(false) => report.failed += 1,
                Err(e) => {
                    warn!(faq_id = %entry.id, error = %e, "FAQ embedding sync failed");
                    report.failed += 1;
                }
            }
        }
        info!(
            synced = report.synced,
            failed = report.failed,
            total = report.total,
            "FAQ embeddings synced"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use messenger_config::model::StorageConfig;
    use messenger_core::PluginAdapter;
    use messenger_core::types::{
        AdapterType, EmbeddingOutput, FaqDraft, HealthStatus, Locale, LocalizedText,
    };
    use messenger_storage::SqliteStorage;
    use tempfile::TempDir;

    /// Fails the first `failures` calls, then returns `[len, 1.0]`.
    struct FlakyEmbedder {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl PluginAdapter for FlakyEmbedder {
        fn name(&self) -> &str {
            "flaky"
        }
        fn version(&self) -> semver::Version {
            semver::Version::new(0, 0, 0)
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
    impl EmbeddingAdapter for FlakyEmbedder {
        async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, MessengerError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(MessengerError::Provider {
                    message: "flaky".into(),
                    source: None,
                });
            }
            Ok(EmbeddingOutput {
                embeddings: input
                    .texts
                    .iter()
                    .map(|t| vec![t.len() as f32, 1.0])
                    .collect(),
                dimensions: 2,
            })
        }
    }

    async fn storage() -> (TempDir, Arc<SqliteStorage>) {
        let dir = tempfile::tempdir().unwrap();
        let storage = SqliteStorage::new(StorageConfig {
            database_path: dir.path().join("sync.db").to_str().unwrap().to_string(),
            wal_mode: true,
        });
        storage.initialize().await.unwrap();
        (dir, Arc::new(storage))
    }

    async fn faq(storage: &SqliteStorage, question: &str, is_active: bool) -> FaqEntry {
        storage
            .create_faq(&FaqDraft {
                category: "general".into(),
                question: LocalizedText::single(Locale::Fr, question),
                answer: LocalizedText::single(Locale::Fr, "Oui"),
                order_index: 0,
                is_active,
            })
            .await
            .unwrap()
    }

    fn flaky(failures: u32) -> Arc<FlakyEmbedder> {
        Arc::new(FlakyEmbedder {
            failures,
            calls: AtomicU32::new(0),
        })
    }

    #[tokio::test]
    async fn sync_entry_retries_then_stores() {
        let (_dir, storage) = storage().await;
        let entry = faq(&storage, "Parking ?", true).await;
        let sync = FaqSync::new(storage.clone(), Some(flaky(2)), 2);

        assert!(sync.sync_entry(&entry).await.unwrap());
        let stored = storage.get_faq(&entry.id).await.unwrap().unwrap();
        assert_eq!(stored.embedding.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn sync_entry_gives_up_after_retries() {
        let (_dir, storage) = storage().await;
        let entry = faq(&storage, "Parking ?", true).await;
        let sync = FaqSync::new(storage.clone(), Some(flaky(5)), 1);

        assert!(sync.sync_entry(&entry).await.is_err());
        assert!(storage.list_faq_embeddings().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sync_all_counts_active_entries_only() {
        let (_dir, storage) = storage().await;
        faq(&storage, "Horaires ?", true).await;
        faq(&storage, "Prix ?", true).await;
        faq(&storage, "Ancien", false).await;
        let sync = FaqSync::new(storage.clone(), Some(flaky(0)), 0);

        let report = sync.sync_all().await.unwrap();
        assert_eq!(
            report,
            SyncReport {
                synced: 2,
                failed: 0,
                total: 2
            }
        );
        assert_eq!(storage.list_faq_embeddings().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn spawned_sync_runs_detached() {
        let (_dir, storage) = storage().await;
        let entry = faq(&storage, "Anniversaire ?", true).await;
        let sync = FaqSync::new(storage.clone(), Some(flaky(0)), 0);

        sync.spawn_entry(entry.clone()).unwrap().await.unwrap();
        assert!(storage.get_faq(&entry.id).await.unwrap().unwrap().embedding.is_some());
    }

    #[tokio::test]
    async fn without_embedder_sync_is_unavailable() {
        let (_dir, storage) = storage().await;
        let entry = faq(&storage, "Horaires ?", true).await;
        let sync = FaqSync::new(storage.clone(), None, 2);

        assert!(sync.spawn_entry(entry).is_none());
        assert!(matches!(
            sync.sync_all().await.unwrap_err(),
            MessengerError::Unavailable(_)
        ));
    }
}
