//! Platform Crate - Technical Infrastructure
//!
//! This crate provides shared technical foundations:
//! - Cryptographic utilities (random bytes, URL-safe Base64, AES-256-GCM sealing)
//! - Environment-driven configuration helpers
//! - Card number utilities (Luhn, brand detection, masking)
//! - Input sanitization and injection detection
//! - Per-endpoint request validation
//! - Rate limiting infrastructure

pub mod card;
pub mod config;
pub mod crypto;
pub mod rate_limit;
pub mod sanitize;
pub mod validation;
