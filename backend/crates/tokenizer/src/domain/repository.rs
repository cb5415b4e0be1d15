//! Collaborator Traits
//!
//! Interfaces for card persistence and encryption. Implementations live in
//! the infrastructure layer or outside this crate.

use crate::error::{CryptoError, TokenizerResult};

/// Card store trait
#[trait_variant::make(CardStore: Send)]
pub trait LocalCardStore {
    /// Persist the mapping from `token` to the plaintext card number
    async fn store_card(&self, token: &str, card_number: &str) -> TokenizerResult<()>;

    /// Resolve a token, `None` when no mapping exists
    async fn retrieve_card(&self, token: &str) -> Option<String>;
}

/// Encryption of card material
///
/// `encrypt_data` returns the ciphertext together with the identifier of the
/// key that produced it; `decrypt_data` takes that identifier back.
pub trait CryptoProvider: Send + Sync {
    fn encrypt_data(&self, plaintext: &[u8]) -> Result<(Vec<u8>, String), CryptoError>;

    fn decrypt_data(&self, ciphertext: &[u8], key_id: &str) -> Result<Vec<u8>, CryptoError>;
}
