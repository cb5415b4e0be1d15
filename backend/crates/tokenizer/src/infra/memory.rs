//! In-Memory Card Vault
//!
//! Card store that keeps encrypted records in process memory. Used by the
//! daemon when no external store is attached, and by tests.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use platform::card::{last_four, mask_card_number};

use crate::domain::entities::CardRecord;
use crate::domain::repository::{CardStore, CryptoProvider};
use crate::error::{CryptoError, TokenizerError, TokenizerResult};

/// Encrypting in-memory card store
pub struct InMemoryCardVault<C: CryptoProvider> {
    crypto: Arc<C>,
    records: RwLock<HashMap<String, CardRecord>>,
}

impl<C: CryptoProvider> InMemoryCardVault<C> {
    pub fn new(crypto: Arc<C>) -> Self {
        Self {
            crypto,
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Stored metadata for `token`, without decrypting
    pub fn record(&self, token: &str) -> Option<CardRecord> {
        self.records.read().get(token).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl<C: CryptoProvider> CardStore for InMemoryCardVault<C> {
    async fn store_card(&self, token: &str, card_number: &str) -> TokenizerResult<()> {
        let (encrypted, key_id) = self.crypto.encrypt_data(card_number.as_bytes())?;
        let record = CardRecord::new(token, card_number, encrypted, key_id);

        tracing::debug!(
            card = %mask_card_number(card_number),
            card_type = %record.card_type,
            key_id = %record.key_id,
            "Stored card"
        );

        let mut records = self.records.write();
        if records.contains_key(token) {
            return Err(TokenizerError::Storage(format!("token already stored: {token}")));
        }
        records.insert(token.to_string(), record);
        Ok(())
    }

    async fn retrieve_card(&self, token: &str) -> Option<String> {
        let (encrypted, key_id) = {
            let records = self.records.read();
            let record = records.get(token)?;
            (record.encrypted_card.clone(), record.key_id.clone())
        };

        let decrypted = self
            .crypto
            .decrypt_data(&encrypted, &key_id)
            .map_err(TokenizerError::from)
            .and_then(|plain| {
                String::from_utf8(plain).map_err(|_| TokenizerError::Crypto(CryptoError::InvalidUtf8))
            });

        match decrypted {
            Ok(card_number) => {
                tracing::debug!(last_four = last_four(&card_number), "Retrieved card");
                Some(card_number)
            }
            Err(e) => {
                e.log();
                tracing::warn!(key_id = %key_id, "Card record could not be decrypted");
                None
            }
        }
    }
}
