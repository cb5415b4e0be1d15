//! Domain Layer - Tokens, card records and collaborator contracts
//!
//! This layer contains:
//! - Token formats and generation
//! - The card-field naming heuristic
//! - Card record entity
//! - Card store and crypto provider traits

pub mod card_field;
pub mod entities;
pub mod repository;
pub mod token;
