//! Daemon Configuration
//!
//! Assembled from environment variables (optionally seeded from `.env`).

use icap::IcapConfig;
use platform::config::{env_flag, env_or, env_parse};
use tokenizer::{TokenFormat, TokenizerConfig};

/// Default log filter
const DEFAULT_FILTER: &str = "icapd=info,icap=info,tokenizer=info,platform=info";

/// Log filter when `DEBUG_MODE` is set
const DEBUG_FILTER: &str = "icapd=debug,icap=debug,tokenizer=debug,platform=debug";

/// Top-level daemon configuration
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub icap: IcapConfig,
    pub tokenizer: TokenizerConfig,
    /// URL-safe base64 legacy key
    pub encryption_key: Option<String>,
    /// URL-safe base64 master key for the key hierarchy
    pub kek_key: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = IcapConfig::default();
        let icap = IcapConfig {
            host: env_or("ICAP_HOST", &defaults.host),
            port: env_parse("ICAP_PORT", defaults.port),
            max_body_bytes: env_parse("ICAP_MAX_BODY_BYTES", defaults.max_body_bytes),
            max_connections: env_parse("ICAP_MAX_CONNECTIONS", defaults.max_connections),
        };

        let tokenizer = TokenizerConfig {
            token_format: env_parse("TOKEN_FORMAT", TokenFormat::default()),
            use_kek_dek: env_flag("USE_KEK_DEK", false),
            debug: env_flag("DEBUG_MODE", false),
        };

        Self {
            icap,
            tokenizer,
            encryption_key: secret("ENCRYPTION_KEY"),
            kek_key: secret("KEK_KEY"),
        }
    }

    /// Filter used when `RUST_LOG` is not set
    pub fn default_log_filter(&self) -> &'static str {
        if self.tokenizer.debug {
            DEBUG_FILTER
        } else {
            DEFAULT_FILTER
        }
    }
}

fn secret(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
