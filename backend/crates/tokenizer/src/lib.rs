//! Card Tokenization Engine
//!
//! Clean Architecture structure:
//! - `domain/` - Token formats, card-field heuristic, collaborator traits
//! - `application/` - The tokenization engine and its configuration
//! - `infra/` - Crypto strategies and an in-memory card vault
//!
//! ## Security Model
//! - Values already carrying the active token sentinel are never re-tokenized
//! - Card numbers are persisted only in encrypted form
//! - Logs carry at most the last four digits of a card number
//! - A failed store is logged and the substitution still happens

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;

// Re-exports for convenience
pub use application::config::TokenizerConfig;
pub use application::engine::{Tokenizer, Transformed};
pub use domain::entities::CardRecord;
pub use domain::repository::{CardStore, CryptoProvider, LocalCardStore};
pub use domain::token::{TokenFormat, TokenGenerator};
pub use error::{CryptoError, TokenizerError, TokenizerResult};
pub use infra::crypto::{DualModeCrypto, KeyHierarchy, KeyMaterial, LegacyCipher};
pub use infra::memory::InMemoryCardVault;

// Re-export kernel error kind for unified error handling
pub use kernel::error::kind::ErrorKind;

#[cfg(test)]
mod tests;
