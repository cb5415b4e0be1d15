//! Card Number Utilities
//!
//! Brand detection, Luhn validation and check digit computation, masking.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Card brand inferred from the number's prefix and length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CardType {
    Visa,
    Mastercard,
    Amex,
    Discover,
    Unknown,
}

impl CardType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            CardType::Visa => "Visa",
            CardType::Mastercard => "Mastercard",
            CardType::Amex => "Amex",
            CardType::Discover => "Discover",
            CardType::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for CardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static BRAND_PATTERNS: LazyLock<Vec<(CardType, Regex)>> = LazyLock::new(|| {
    [
        (CardType::Visa, r"^4[0-9]{12}(?:[0-9]{3})?$"),
        (CardType::Mastercard, r"^5[1-5][0-9]{14}$"),
        (CardType::Mastercard, r"^2[2-7][0-9]{14}$"),
        (CardType::Amex, r"^3[47][0-9]{13}$"),
        (CardType::Discover, r"^6011[0-9]{12}$"),
        (CardType::Discover, r"^64[4-9][0-9]{13}$"),
        (CardType::Discover, r"^65[0-9]{14}$"),
    ]
    .into_iter()
    .map(|(brand, pattern)| (brand, Regex::new(pattern).expect("valid brand pattern")))
    .collect()
});

/// Remove the separators people commonly type into card numbers
pub fn strip_separators(card_number: &str) -> String {
    card_number
        .chars()
        .filter(|c| *c != ' ' && *c != '-')
        .collect()
}

/// Determine the card brand
pub fn detect_card_type(card_number: &str) -> CardType {
    let digits = strip_separators(card_number);
    BRAND_PATTERNS
        .iter()
        .find(|(_, pattern)| pattern.is_match(&digits))
        .map(|(brand, _)| *brand)
        .unwrap_or(CardType::Unknown)
}

/// Validate a number with the Luhn checksum
///
/// Spaces and dashes are ignored; any other non-digit, or fewer than two
/// digits, makes the number invalid.
pub fn is_valid_luhn(card_number: &str) -> bool {
    let digits = strip_separators(card_number);
    if digits.len() < 2 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    luhn_sum(digits.bytes().map(|b| b - b'0'), false) % 10 == 0
}

/// Compute the Luhn check digit to append to `partial`
///
/// Non-digits are ignored. The rightmost digit of `partial` sits in the
/// first doubled position once the check digit is appended.
pub fn luhn_check_digit(partial: &str) -> u8 {
    let digits = partial
        .bytes()
        .filter(u8::is_ascii_digit)
        .map(|b| b - b'0');
    let sum = luhn_sum(digits, true);
    ((10 - (sum % 10)) % 10) as u8
}

/// Sum digits right to left, doubling every other one
fn luhn_sum<I>(digits: I, double_first: bool) -> u32
where
    I: DoubleEndedIterator<Item = u8>,
{
    let mut double = double_first;
    let mut sum = 0u32;
    for digit in digits.rev() {
        let mut d = u32::from(digit);
        if double {
            d *= 2;
            if d > 9 {
                d = d / 10 + d % 10;
            }
        }
        sum += d;
        double = !double;
    }
    sum
}

/// Mask all but the last four characters (`************1111`)
pub fn mask_card_number(card_number: &str) -> String {
    let len = card_number.chars().count();
    if len <= 4 {
        return "*".repeat(len);
    }
    let last_four: String = card_number.chars().skip(len - 4).collect();
    format!("{}{}", "*".repeat(len - 4), last_four)
}

/// Last four characters, used for log lines and card records
pub fn last_four(card_number: &str) -> &str {
    let start = card_number
        .char_indices()
        .rev()
        .nth(3)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &card_number[start..]
}
