//! Crypto Provider Strategies
//!
//! ## Strategies
//! - `LegacyCipher`: one fixed AES-256-GCM key, key id `legacy`
//! - `KeyHierarchy`: data keys (DEKs) wrapped by a master key (KEK), both versioned
//! - `DualModeCrypto`: prefers the hierarchy and falls back to legacy on decrypt,
//!   so records written before a mode switch stay readable

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use platform::crypto::{AEAD_KEY_LEN, from_base64_url, open, random_bytes, random_key, seal};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::domain::repository::CryptoProvider;
use crate::error::CryptoError;

/// Key id reported by the legacy strategy
pub const LEGACY_KEY_ID: &str = "legacy";

/// Random bytes behind a key identifier
const KEY_ID_BYTES: usize = 8;

/// 32-byte symmetric key, zeroized on drop
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial([u8; AEAD_KEY_LEN]);

impl KeyMaterial {
    pub fn generate() -> Self {
        Self(random_key())
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let key: [u8; AEAD_KEY_LEN] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKey(format!(
                "expected {AEAD_KEY_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(key))
    }

    /// Decode a URL-safe base64 key
    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let bytes = Zeroizing::new(
            from_base64_url(encoded.trim()).map_err(|e| CryptoError::InvalidKey(e.to_string()))?,
        );
        Self::from_slice(&bytes)
    }

    fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyMaterial([REDACTED])")
    }
}

fn new_key_id(prefix: &str) -> String {
    format!("{prefix}_{}", hex::encode(random_bytes(KEY_ID_BYTES)))
}

// ============================================================================
// Legacy single-key scheme
// ============================================================================

/// Fixed-key authenticated encryption
#[derive(Debug)]
pub struct LegacyCipher {
    key: KeyMaterial,
}

impl LegacyCipher {
    pub fn new(key: KeyMaterial) -> Self {
        Self { key }
    }
}

impl CryptoProvider for LegacyCipher {
    fn encrypt_data(&self, plaintext: &[u8]) -> Result<(Vec<u8>, String), CryptoError> {
        let ciphertext = seal(self.key.as_bytes(), plaintext)?;
        Ok((ciphertext, LEGACY_KEY_ID.to_string()))
    }

    fn decrypt_data(&self, ciphertext: &[u8], _key_id: &str) -> Result<Vec<u8>, CryptoError> {
        Ok(open(self.key.as_bytes(), ciphertext)?)
    }
}

// ============================================================================
// KEK/DEK hierarchy
// ============================================================================

/// Master key entry
#[derive(Debug)]
struct KekEntry {
    id: String,
    version: u32,
    key: KeyMaterial,
}

/// Data key, stored only in wrapped form
#[derive(Debug, Clone)]
struct WrappedDek {
    version: u32,
    kek_id: String,
    wrapped: Vec<u8>,
    created_at: DateTime<Utc>,
}

#[derive(Debug)]
struct HierarchyState {
    kek: KekEntry,
    deks: HashMap<String, WrappedDek>,
    active_dek: String,
    dek_version: u32,
}

impl HierarchyState {
    fn unwrap_dek(&self, dek_id: &str) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let dek = self
            .deks
            .get(dek_id)
            .ok_or_else(|| CryptoError::UnknownKey(dek_id.to_string()))?;
        Ok(Zeroizing::new(open(self.kek.key.as_bytes(), &dek.wrapped)?))
    }

    fn add_dek(&mut self) -> Result<String, CryptoError> {
        let dek = KeyMaterial::generate();
        let id = new_key_id("dek");
        self.dek_version += 1;
        self.deks.insert(
            id.clone(),
            WrappedDek {
                version: self.dek_version,
                kek_id: self.kek.id.clone(),
                wrapped: seal(self.kek.key.as_bytes(), dek.as_bytes())?,
                created_at: Utc::now(),
            },
        );
        self.active_dek = id.clone();
        Ok(id)
    }
}

/// Summary of one data key, without key material
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DekInfo {
    pub id: String,
    pub version: u32,
    pub kek_id: String,
    pub created_at: DateTime<Utc>,
    pub active: bool,
}

/// Envelope encryption with rotating master and data keys
#[derive(Debug)]
pub struct KeyHierarchy {
    state: RwLock<HierarchyState>,
}

impl KeyHierarchy {
    /// Build a hierarchy under `kek` with one active data key
    pub fn new(kek: KeyMaterial) -> Result<Self, CryptoError> {
        let mut state = HierarchyState {
            kek: KekEntry {
                id: new_key_id("kek"),
                version: 1,
                key: kek,
            },
            deks: HashMap::new(),
            active_dek: String::new(),
            dek_version: 0,
        };
        let dek_id = state.add_dek()?;

        tracing::info!(kek_id = %state.kek.id, dek_id = %dek_id, "Key hierarchy initialized");
        Ok(Self {
            state: RwLock::new(state),
        })
    }

    pub fn active_kek_id(&self) -> String {
        self.state.read().kek.id.clone()
    }

    pub fn kek_version(&self) -> u32 {
        self.state.read().kek.version
    }

    pub fn active_dek_id(&self) -> String {
        self.state.read().active_dek.clone()
    }

    pub fn deks(&self) -> Vec<DekInfo> {
        let state = self.state.read();
        let mut deks: Vec<DekInfo> = state
            .deks
            .iter()
            .map(|(id, dek)| DekInfo {
                id: id.clone(),
                version: dek.version,
                kek_id: dek.kek_id.clone(),
                created_at: dek.created_at,
                active: *id == state.active_dek,
            })
            .collect();
        deks.sort_by_key(|d| d.version);
        deks
    }

    /// Create a new active data key; older keys remain for decryption
    pub fn rotate_dek(&self) -> Result<String, CryptoError> {
        let mut state = self.state.write();
        let id = state.add_dek()?;
        tracing::info!(dek_id = %id, version = state.dek_version, "Rotated DEK");
        Ok(id)
    }

    /// Replace the master key and re-wrap every data key under it
    pub fn rotate_kek(&self) -> Result<String, CryptoError> {
        let mut state = self.state.write();
        let kek = KekEntry {
            id: new_key_id("kek"),
            version: state.kek.version + 1,
            key: KeyMaterial::generate(),
        };

        let mut rewrapped = HashMap::with_capacity(state.deks.len());
        for (id, dek) in &state.deks {
            let plain = state.unwrap_dek(id)?;
            rewrapped.insert(
                id.clone(),
                WrappedDek {
                    kek_id: kek.id.clone(),
                    wrapped: seal(kek.key.as_bytes(), &plain)?,
                    ..dek.clone()
                },
            );
        }

        state.deks = rewrapped;
        state.kek = kek;

        tracing::info!(
            kek_id = %state.kek.id,
            version = state.kek.version,
            deks = state.deks.len(),
            "Rotated KEK"
        );
        Ok(state.kek.id.clone())
    }
}

impl CryptoProvider for KeyHierarchy {
    fn encrypt_data(&self, plaintext: &[u8]) -> Result<(Vec<u8>, String), CryptoError> {
        let state = self.state.read();
        let dek = state.unwrap_dek(&state.active_dek)?;
        let ciphertext = seal(&dek, plaintext)?;
        Ok((ciphertext, state.active_dek.clone()))
    }

    fn decrypt_data(&self, ciphertext: &[u8], key_id: &str) -> Result<Vec<u8>, CryptoError> {
        let state = self.state.read();
        let dek_id = if key_id.is_empty() {
            state.active_dek.as_str()
        } else {
            key_id
        };
        let dek = state.unwrap_dek(dek_id)?;
        Ok(open(&dek, ciphertext)?)
    }
}

// ============================================================================
// Dual-mode selector
// ============================================================================

/// Hierarchy-first crypto with transparent legacy fallback
#[derive(Debug)]
pub struct DualModeCrypto {
    legacy: LegacyCipher,
    hierarchy: Option<KeyHierarchy>,
}

impl DualModeCrypto {
    /// Legacy-only mode
    pub fn legacy(legacy: LegacyCipher) -> Self {
        Self {
            legacy,
            hierarchy: None,
        }
    }

    /// Hierarchy mode with legacy fallback
    pub fn with_hierarchy(legacy: LegacyCipher, hierarchy: KeyHierarchy) -> Self {
        Self {
            legacy,
            hierarchy: Some(hierarchy),
        }
    }

    pub fn uses_kek_dek(&self) -> bool {
        self.hierarchy.is_some()
    }

    /// Access for key rotation
    pub fn hierarchy(&self) -> Option<&KeyHierarchy> {
        self.hierarchy.as_ref()
    }
}

impl CryptoProvider for DualModeCrypto {
    fn encrypt_data(&self, plaintext: &[u8]) -> Result<(Vec<u8>, String), CryptoError> {
        match &self.hierarchy {
            Some(hierarchy) => hierarchy.encrypt_data(plaintext),
            None => self.legacy.encrypt_data(plaintext),
        }
    }

    fn decrypt_data(&self, ciphertext: &[u8], key_id: &str) -> Result<Vec<u8>, CryptoError> {
        if let Some(hierarchy) = &self.hierarchy {
            match hierarchy.decrypt_data(ciphertext, key_id) {
                Ok(plaintext) => return Ok(plaintext),
                Err(e) => {
                    tracing::debug!(key_id, error = %e, "Hierarchy decrypt failed, trying legacy key");
                }
            }
        }
        self.legacy.decrypt_data(ciphertext, key_id)
    }
}
