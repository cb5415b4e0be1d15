//! Application Configuration
//!
//! Configuration for the tokenization engine.

use crate::domain::token::TokenFormat;

/// Tokenizer configuration
#[derive(Debug, Clone, Default)]
pub struct TokenizerConfig {
    /// Format of newly generated tokens, and the sentinel checked before tokenizing
    pub token_format: TokenFormat,
    /// Encrypt with the KEK/DEK hierarchy instead of the legacy key
    pub use_kek_dek: bool,
    /// Verbose per-substitution logging
    pub debug: bool,
}

impl TokenizerConfig {
    pub fn new(token_format: TokenFormat) -> Self {
        Self {
            token_format,
            ..Default::default()
        }
    }

    /// Create config for development (verbose logging)
    pub fn development() -> Self {
        Self {
            debug: true,
            ..Default::default()
        }
    }
}
