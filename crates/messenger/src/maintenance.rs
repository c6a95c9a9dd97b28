// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `messenger migrate` and `messenger sync-faq`.

use messenger_config::MessengerConfig;
use messenger_core::MessengerError;
use messenger_faq::FaqSync;
use tracing::info;

use crate::serve::{embedder, open_storage};

pub async fn run_migrate(config: &MessengerConfig) -> Result<(), MessengerError> {
    let storage = open_storage(config).await?;
    storage.close().await?;
    println!("database at {} is up to date", config.storage.database_path);
    Ok(())
}

pub async fn run_sync_faq(config: &MessengerConfig) -> Result<(), MessengerError> {
    let Some(embedder) = embedder(config)? else {
        return Err(MessengerError::Config(
            "embedding.api_key is required to sync FAQ embeddings".into(),
        ));
    };
    let storage = open_storage(config).await?;
    let sync = FaqSync::new(storage.clone(), Some(embedder), config.embedding.sync_retries);
    let report = sync.sync_all().await?;
    storage.close().await?;

    info!(synced = report.synced, failed = report.failed, "FAQ resync finished");
    println!(
        "synced {} of {} FAQ entries ({} failed)",
        report.synced, report.total, report.failed
    );
    Ok(())
}
