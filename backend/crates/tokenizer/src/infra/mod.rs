//! Infrastructure Layer - Crypto strategies and the in-memory card vault

pub mod crypto;
pub mod memory;
