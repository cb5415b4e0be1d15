//! ICAP Daemon Entry Point
//!
//! Loads configuration, initializes tracing and the crypto provider, then
//! serves ICAP until interrupted. Uses `anyhow` for startup errors only.

mod config;

use std::sync::Arc;

use anyhow::Context;
use icap::IcapServer;
use tokenizer::{
    DualModeCrypto, InMemoryCardVault, KeyHierarchy, KeyMaterial, LegacyCipher, Tokenizer,
};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.default_log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let crypto = Arc::new(build_crypto(&config)?);
    let vault = Arc::new(InMemoryCardVault::new(crypto.clone()));
    let tokenizer = Arc::new(Tokenizer::new(
        vault,
        crypto,
        Arc::new(config.tokenizer.clone()),
    ));

    tracing::info!(
        token_format = %config.tokenizer.token_format,
        use_kek_dek = config.tokenizer.use_kek_dek,
        debug = config.tokenizer.debug,
        "Tokenizer ready"
    );

    let icap_config = Arc::new(config.icap.clone());
    let listener = TcpListener::bind(icap_config.bind_addr())
        .await
        .with_context(|| format!("failed to bind {}", icap_config.bind_addr()))?;
    let server = Arc::new(IcapServer::new(tokenizer, icap_config));

    tokio::select! {
        result = server.serve(listener) => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}

fn build_crypto(config: &AppConfig) -> anyhow::Result<DualModeCrypto> {
    let legacy_key = match &config.encryption_key {
        Some(encoded) => KeyMaterial::from_base64(encoded).context("invalid ENCRYPTION_KEY")?,
        None => {
            tracing::warn!(
                "ENCRYPTION_KEY not set, generated an ephemeral key; stored cards will not survive a restart"
            );
            KeyMaterial::generate()
        }
    };
    let legacy = LegacyCipher::new(legacy_key);

    if !config.tokenizer.use_kek_dek {
        return Ok(DualModeCrypto::legacy(legacy));
    }

    let kek = match &config.kek_key {
        Some(encoded) => KeyMaterial::from_base64(encoded).context("invalid KEK_KEY")?,
        None => {
            tracing::warn!("KEK_KEY not set, generated an ephemeral master key");
            KeyMaterial::generate()
        }
    };
    let hierarchy = KeyHierarchy::new(kek).context("failed to initialize key hierarchy")?;
    tracing::info!(
        kek_id = %hierarchy.active_kek_id(),
        dek_id = %hierarchy.active_dek_id(),
        "KEK/DEK encryption enabled"
    );

    Ok(DualModeCrypto::with_hierarchy(legacy, hierarchy))
}
