//! Card Field Detection
//!
//! Which JSON keys carry card numbers, and what a card number looks like.

use std::sync::LazyLock;

use regex::Regex;

/// Keys that are card fields only when matched exactly
const EXACT_FIELDS: [&str; 2] = ["card", "pan"];

/// Keys that are card fields when contained anywhere in the name
const COMPOUND_FIELDS: [&str; 5] = [
    "card_number",
    "cardnumber",
    "creditcard",
    "credit_card",
    "account_number",
];

/// Visa, Mastercard, Amex, Diners, Discover and JCB number shapes
pub static CARD_NUMBER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:4[0-9]{12}(?:[0-9]{3})?|5[1-5][0-9]{14}|3[47][0-9]{13}|3(?:0[0-5]|[68][0-9])[0-9]{11}|6(?:011|5[0-9]{2})[0-9]{12}|(?:2131|1800|35[0-9]{3})[0-9]{11})\b",
    )
    .expect("valid card number pattern")
});

/// Whether a JSON key names a card number field (case-insensitive)
pub fn is_credit_card_field(key: &str) -> bool {
    let lower = key.to_lowercase();
    EXACT_FIELDS.contains(&lower.as_str()) || COMPOUND_FIELDS.iter().any(|f| lower.contains(f))
}

/// Whether a value has the shape of a card number
pub fn looks_like_card_number(value: &str) -> bool {
    CARD_NUMBER_PATTERN.is_match(value)
}
