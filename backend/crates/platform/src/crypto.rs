//! Cryptographic Utilities

use base64::{Engine, engine::general_purpose};
use rand::RngCore;
use ring::aead::{AES_256_GCM, Aad, LessSafeKey, NONCE_LEN, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};

/// AES-256 key length in bytes
pub const AEAD_KEY_LEN: usize = 32;

/// GCM authentication tag length in bytes
pub const AEAD_TAG_LEN: usize = 16;

/// Errors raised by [`seal`] and [`open`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AeadError {
    #[error("invalid key length: expected {AEAD_KEY_LEN} bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("failed to generate nonce")]
    NonceGeneration,

    #[error("AES-256-GCM seal failed")]
    Seal,

    #[error("ciphertext too short: {0} bytes")]
    TooShort(usize),

    #[error("AES-256-GCM open failed (wrong key or tampered data)")]
    Open,
}

/// Generate random bytes from the thread-local CSPRNG
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rand::rng().fill_bytes(&mut bytes);
    bytes
}

/// Generate a fresh 32-byte symmetric key
pub fn random_key() -> [u8; AEAD_KEY_LEN] {
    let mut key = [0u8; AEAD_KEY_LEN];
    rand::rng().fill_bytes(&mut key);
    key
}

/// Encode bytes as padded URL-safe base64
pub fn to_base64_url(bytes: &[u8]) -> String {
    general_purpose::URL_SAFE.encode(bytes)
}

/// Decode padded URL-safe base64
pub fn from_base64_url(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    general_purpose::URL_SAFE.decode(s)
}

fn aead_key(key: &[u8]) -> Result<LessSafeKey, AeadError> {
    let unbound =
        UnboundKey::new(&AES_256_GCM, key).map_err(|_| AeadError::InvalidKeyLength(key.len()))?;
    Ok(LessSafeKey::new(unbound))
}

/// Encrypt with AES-256-GCM under a random nonce
///
/// Output layout: `nonce (12) ‖ ciphertext ‖ tag (16)`.
pub fn seal(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, AeadError> {
    let key = aead_key(key)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    SystemRandom::new()
        .fill(&mut nonce_bytes)
        .map_err(|_| AeadError::NonceGeneration)?;

    let mut in_out = plaintext.to_vec();
    key.seal_in_place_append_tag(
        Nonce::assume_unique_for_key(nonce_bytes),
        Aad::empty(),
        &mut in_out,
    )
    .map_err(|_| AeadError::Seal)?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + in_out.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&in_out);
    Ok(sealed)
}

/// Decrypt the output of [`seal`]
pub fn open(key: &[u8], sealed: &[u8]) -> Result<Vec<u8>, AeadError> {
    let key = aead_key(key)?;

    if sealed.len() < NONCE_LEN + AEAD_TAG_LEN {
        return Err(AeadError::TooShort(sealed.len()));
    }

    let (nonce_bytes, ct_and_tag) = sealed.split_at(NONCE_LEN);
    let nonce = Nonce::try_assume_unique_for_key(nonce_bytes).map_err(|_| AeadError::Open)?;

    let mut buf = ct_and_tag.to_vec();
    let plaintext = key
        .open_in_place(nonce, Aad::empty(), &mut buf)
        .map_err(|_| AeadError::Open)?;
    Ok(plaintext.to_vec())
}
