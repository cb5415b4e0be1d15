//! Domain Entities

use chrono::{DateTime, Utc};
use platform::card::{CardType, detect_card_type, strip_separators};
use serde::Serialize;

/// Stored token-to-card mapping
///
/// The card number itself is only held encrypted; the brand and the
/// first six / last four digits are kept for display and search.
#[derive(Debug, Clone, Serialize)]
pub struct CardRecord {
    pub token: String,
    #[serde(skip)]
    pub encrypted_card: Vec<u8>,
    pub key_id: String,
    pub card_type: CardType,
    pub last_four: String,
    pub first_six: String,
    pub created_at: DateTime<Utc>,
}

impl CardRecord {
    /// Create a record for `card_number` already encrypted under `key_id`
    pub fn new(token: &str, card_number: &str, encrypted_card: Vec<u8>, key_id: String) -> Self {
        let digits = strip_separators(card_number);
        let first_six = digits.chars().take(6).collect();
        let last_four = digits
            .chars()
            .skip(digits.chars().count().saturating_sub(4))
            .collect();

        Self {
            token: token.to_string(),
            encrypted_card,
            key_id,
            card_type: detect_card_type(&digits),
            last_four,
            first_six,
            created_at: Utc::now(),
        }
    }
}
