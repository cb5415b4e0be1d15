//! Tokenization Engine
//!
//! Walks decoded JSON (or scans raw HTML) and swaps card numbers for tokens,
//! or tokens back for card numbers.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use platform::card::last_four;
use serde_json::Value;

use crate::application::config::TokenizerConfig;
use crate::domain::card_field::{is_credit_card_field, looks_like_card_number};
use crate::domain::repository::{CardStore, CryptoProvider};
use crate::domain::token::{TokenFormat, TokenGenerator};
use crate::error::{CryptoError, TokenizerError, TokenizerResult};

type VisitFuture<'a> = Pin<Box<dyn Future<Output = bool> + Send + 'a>>;

/// Result of a payload transformation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transformed {
    pub body: String,
    pub modified: bool,
}

impl Transformed {
    fn unchanged(body: &str) -> Self {
        Self {
            body: body.to_string(),
            modified: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Tokenize,
    Detokenize,
}

/// Tokenization engine
pub struct Tokenizer<S, C>
where
    S: CardStore,
    C: CryptoProvider,
{
    store: Arc<S>,
    crypto: Arc<C>,
    generator: TokenGenerator,
    config: Arc<TokenizerConfig>,
}

impl<S, C> Tokenizer<S, C>
where
    S: CardStore + Sync,
    C: CryptoProvider,
{
    pub fn new(store: Arc<S>, crypto: Arc<C>, config: Arc<TokenizerConfig>) -> Self {
        Self {
            store,
            crypto,
            generator: TokenGenerator::new(config.token_format),
            config,
        }
    }

    pub fn config(&self) -> &TokenizerConfig {
        &self.config
    }

    pub fn token_format(&self) -> TokenFormat {
        self.config.token_format
    }

    /// Generate a fresh token in the configured format
    pub fn generate_token(&self) -> String {
        self.generator.generate()
    }

    /// Encrypt a card number, returning ciphertext and key id
    pub fn encrypt_card_number(&self, card_number: &str) -> TokenizerResult<(Vec<u8>, String)> {
        Ok(self.crypto.encrypt_data(card_number.as_bytes())?)
    }

    /// Decrypt a card number produced by [`Self::encrypt_card_number`]
    pub fn decrypt_card_number(&self, ciphertext: &[u8], key_id: &str) -> TokenizerResult<String> {
        let plaintext = self.crypto.decrypt_data(ciphertext, key_id)?;
        String::from_utf8(plaintext).map_err(|_| TokenizerError::Crypto(CryptoError::InvalidUtf8))
    }

    /// Replace card numbers in card fields with tokens
    pub async fn tokenize_json(&self, text: &str) -> TokenizerResult<Transformed> {
        self.transform_json(text, Direction::Tokenize).await
    }

    /// Replace known tokens anywhere in the document with card numbers
    pub async fn detokenize_json(&self, text: &str) -> TokenizerResult<Transformed> {
        self.transform_json(text, Direction::Detokenize).await
    }

    /// Replace every known token found in raw text
    ///
    /// Plain substring replacement, not markup-aware.
    pub async fn detokenize_html(&self, text: &str) -> TokenizerResult<Transformed> {
        let mut seen = HashSet::new();
        let tokens: Vec<&str> = self
            .token_format()
            .pattern()
            .find_iter(text)
            .map(|m| m.as_str())
            .filter(|t| seen.insert(*t))
            .collect();

        if tokens.is_empty() {
            return Ok(Transformed::unchanged(text));
        }

        let mut body = text.to_string();
        let mut modified = false;
        for token in tokens {
            if let Some(card_number) = self.store.retrieve_card(token).await {
                body = body.replace(token, &card_number);
                modified = true;
                self.log_substitution("Detokenized HTML token", &card_number);
            }
        }

        Ok(Transformed { body, modified })
    }

    async fn transform_json(&self, text: &str, direction: Direction) -> TokenizerResult<Transformed> {
        let mut document: Value = serde_json::from_str(text).map_err(TokenizerError::Decode)?;

        if !self.visit(&mut document, direction).await {
            return Ok(Transformed::unchanged(text));
        }

        let body = serde_json::to_string(&document).map_err(TokenizerError::Encode)?;
        Ok(Transformed {
            body,
            modified: true,
        })
    }

    fn visit<'a>(&'a self, value: &'a mut Value, direction: Direction) -> VisitFuture<'a> {
        Box::pin(async move {
            let mut modified = false;
            match value {
                Value::Object(map) => {
                    for (key, child) in map.iter_mut() {
                        let card_field =
                            direction == Direction::Tokenize && is_credit_card_field(key);
                        match child {
                            Value::String(s) if card_field => {
                                if let Some(token) = self.tokenize_value(s).await {
                                    *s = token;
                                    modified = true;
                                }
                            }
                            _ => modified |= self.visit(&mut *child, direction).await,
                        }
                    }
                }
                Value::Array(items) => {
                    for item in items.iter_mut() {
                        modified |= self.visit(item, direction).await;
                    }
                }
                Value::String(s) if direction == Direction::Detokenize => {
                    if let Some(card_number) = self.detokenize_value(s).await {
                        *s = card_number;
                        modified = true;
                    }
                }
                _ => {}
            }
            modified
        })
    }

    async fn tokenize_value(&self, value: &str) -> Option<String> {
        if !looks_like_card_number(value) || self.token_format().is_token(value) {
            return None;
        }

        let token = self.generator.generate();
        if let Err(e) = self.store.store_card(&token, value).await {
            // The substitution still goes out; the mapping may be lost.
            e.log();
            tracing::warn!(last_four = last_four(value), "Card stored without durable mapping");
        }
        self.log_substitution("Tokenized card number", value);
        Some(token)
    }

    async fn detokenize_value(&self, value: &str) -> Option<String> {
        if !self.token_format().pattern().is_match(value) {
            return None;
        }

        let card_number = self.store.retrieve_card(value).await?;
        self.log_substitution("Detokenized card number", &card_number);
        Some(card_number)
    }

    fn log_substitution(&self, event: &'static str, card_number: &str) {
        if self.config.debug {
            tracing::info!(last_four = last_four(card_number), "{event}");
        } else {
            tracing::debug!(last_four = last_four(card_number), "{event}");
        }
    }
}
