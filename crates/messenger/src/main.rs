// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Messenger - workflow-driven chat for the website widget.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod maintenance;
mod serve;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use messenger_config::MessengerConfig;

/// Messenger - workflow-driven chat for the website widget.
#[derive(Parser, Debug)]
#[command(name = "messenger", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Start the HTTP gateway (default).
    Serve,
    /// Open the database, apply pending migrations and exit.
    Migrate,
    /// Recompute the embeddings of all active FAQ entries.
    SyncFaq,
}

fn load_config(path: Option<&PathBuf>) -> MessengerConfig {
    let loaded = match path {
        Some(path) => messenger_config::load_and_validate_path(path),
        None => messenger_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            messenger_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

fn init_tracing(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("messenger={level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());
    init_tracing(&config.logging.level);

    let result = match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve::run_serve(config).await,
        Commands::Migrate => maintenance::run_migrate(&config).await,
        Commands::SyncFaq => maintenance::run_sync_faq(&config).await,
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "messenger exited with an error");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        // Only jemalloc supports advancing the epoch.
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn binary_loads_config_defaults() {
        let config = messenger_config::load_and_validate_str("").expect("defaults are valid");
        assert_eq!(config.gateway.port, 3000);
        assert_eq!(config.engine.default_locale, "fr");
    }

    #[test]
    fn subcommands_parse() {
        let cli = Cli::try_parse_from(["messenger", "sync-faq"]).unwrap();
        assert_eq!(cli.command, Some(Commands::SyncFaq));

        let cli = Cli::try_parse_from(["messenger", "--config", "/tmp/m.toml", "migrate"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Migrate));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/m.toml")));

        let cli = Cli::try_parse_from(["messenger"]).unwrap();
        assert!(cli.command.is_none());
    }
}
