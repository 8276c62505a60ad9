//! GuildScope HTTP Server Binary
//!
//! Loads a dataset table produced by `guildscope-ingest`, opens the
//! application database and serves the REST API.
//!
//! # Usage
//!
//! ```bash
//! # Default settings (port 3001, ./data/guildscope.db, ./data/funguild.sqlite)
//! cargo run --bin guildscope-server
//!
//! # NEMAGuild dataset keyed by taxon
//! GUILDSCOPE_DATASET_TABLE=nemaguild GUILDSCOPE_DATASET_KEY=taxon \
//!   cargo run --bin guildscope-server
//! ```
//!
//! # Environment Variables
//!
//! See [`guildscope_server::config`] for the full list. `RUST_LOG` sets the
//! logging level (e.g., "info", "debug", "trace").

use guildscope_server::{start_server, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("🚀 GuildScope HTTP Server");
    tracing::info!("==================================");

    let config = ServerConfig::from_env();
    tracing::info!("📡 Port: {}", config.port);
    if config.admin_token.is_none() {
        tracing::warn!("GUILDSCOPE_ADMIN_TOKEN is unset; account approval is disabled");
    }

    start_server(config).await
}
