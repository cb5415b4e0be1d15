//! Application Layer - Tokenization engine
//!
//! Orchestrates token generation, the card store and the crypto provider
//! over decoded payloads.

pub mod config;
pub mod engine;
