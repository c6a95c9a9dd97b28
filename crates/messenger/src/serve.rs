// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `messenger serve` command implementation.
//!
//! Opens SQLite storage, wires the optional Anthropic provider and
//! embedding client into the engine, and serves the HTTP gateway until
//! SIGINT or SIGTERM.

use std::sync::Arc;

use messenger_anthropic::AnthropicProvider;
use messenger_config::MessengerConfig;
use messenger_core::{EmbeddingAdapter, MessengerError, ProviderAdapter, StorageAdapter};
use messenger_engine::{AgentDesk, Engine};
use messenger_faq::{FaqRetriever, FaqSync, OpenAiEmbedder};
use messenger_gateway::{ApiKeyAuth, GatewayState};
use messenger_storage::SqliteStorage;
use tracing::{info, warn};

use crate::shutdown;

/// Opens the database, running pending migrations.
pub async fn open_storage(
    config: &MessengerConfig,
) -> Result<Arc<dyn StorageAdapter>, MessengerError> {
    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    info!(path = %config.storage.database_path, "storage ready");
    Ok(Arc::new(storage))
}

/// The embedding client, when an API key is configured.
pub fn embedder(
    config: &MessengerConfig,
) -> Result<Option<Arc<dyn EmbeddingAdapter>>, MessengerError> {
    Ok(OpenAiEmbedder::from_config(&config.embedding)?
        .map(|embedder| Arc::new(embedder) as Arc<dyn EmbeddingAdapter>))
}

fn provider(config: &MessengerConfig) -> Result<Option<Arc<dyn ProviderAdapter>>, MessengerError> {
    Ok(AnthropicProvider::from_config(&config.anthropic)?
        .map(|provider| Arc::new(provider) as Arc<dyn ProviderAdapter>))
}

/// Assembles the gateway state from configuration.
pub async fn build_state(config: &MessengerConfig) -> Result<GatewayState, MessengerError> {
    let storage = open_storage(config).await?;
    let embedder = embedder(config)?;
    if embedder.is_none() {
        info!("no embedding API key, FAQ lookup uses keyword matching");
    }

    let faq = Arc::new(FaqRetriever::new(
        storage.clone(),
        embedder.clone(),
        &config.embedding,
    ));
    let faq_sync = Arc::new(FaqSync::new(
        storage.clone(),
        embedder,
        config.embedding.sync_retries,
    ));

    let mut builder = Engine::builder(storage.clone(), &config.engine).faq(faq);
    match provider(config)? {
        Some(provider) => builder = builder.provider(provider),
        None => warn!("no Anthropic API key, delegated modules will hand off to an agent"),
    }
    let engine = Arc::new(builder.build());
    let desk = AgentDesk::new(storage.clone(), config.engine.auto_resume_minutes);

    if config.gateway.api_keys.is_empty() {
        warn!("no gateway API keys configured, admin and agent routes are closed");
    }
    let auth = Arc::new(ApiKeyAuth::new(config.gateway.api_keys.clone()));

    Ok(GatewayState {
        engine,
        desk,
        storage,
        faq_sync,
        auth,
        start_time: std::time::Instant::now(),
    })
}

/// Runs the `messenger serve` command.
pub async fn run_serve(config: MessengerConfig) -> Result<(), MessengerError> {
    info!("starting messenger serve");

    if !config.gateway.enabled {
        warn!("gateway is disabled in configuration, nothing to serve");
        return Ok(());
    }

    let state = build_state(&config).await?;
    let storage = state.storage.clone();

    let cancel = shutdown::install_signal_handler();
    let shutdown_signal = {
        let cancel = cancel.clone();
        async move { cancel.cancelled().await }
    };

    let served = messenger_gateway::start_server(&config.gateway, state, shutdown_signal).await;
    cancel.cancel();

    if let Err(e) = storage.close().await {
        warn!(error = %e, "storage did not close cleanly");
    }
    served?;

    info!("messenger serve shutdown complete");
    Ok(())
}
