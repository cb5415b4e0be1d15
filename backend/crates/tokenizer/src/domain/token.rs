//! Token Formats and Generation
//!
//! Two mutually exclusive formats are supported:
//! - `prefix`: `tok_` + 32 random bytes as URL-safe base64
//! - `luhn`: `9999` + 11 random digits + Luhn check digit (16 digits, passes Luhn)
//!
//! Each format's leading sentinel marks a value as already tokenized.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use platform::card::luhn_check_digit;
use platform::crypto::{random_bytes, to_base64_url};
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::TokenizerError;

/// Sentinel for prefix-format tokens
pub const PREFIX_SENTINEL: &str = "tok_";

/// Sentinel for Luhn-format tokens
pub const LUHN_SENTINEL: &str = "9999";

/// Random bytes behind a prefix token
const PREFIX_RANDOM_BYTES: usize = 32;

/// Random digits between the Luhn sentinel and the check digit
const LUHN_RANDOM_DIGITS: usize = 11;

static PREFIX_TOKEN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"tok_[a-zA-Z0-9_\-]+=*").expect("valid prefix token pattern"));

static LUHN_TOKEN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b9999[0-9]{12}\b").expect("valid luhn token pattern"));

/// Token format policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenFormat {
    #[default]
    Prefix,
    Luhn,
}

impl TokenFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenFormat::Prefix => "prefix",
            TokenFormat::Luhn => "luhn",
        }
    }

    /// Leading marker carried by every token of this format
    pub fn sentinel(&self) -> &'static str {
        match self {
            TokenFormat::Prefix => PREFIX_SENTINEL,
            TokenFormat::Luhn => LUHN_SENTINEL,
        }
    }

    /// Whether `value` already carries this format's sentinel
    pub fn is_token(&self, value: &str) -> bool {
        value.starts_with(self.sentinel())
    }

    /// Pattern locating tokens of this format inside text
    pub fn pattern(&self) -> &'static Regex {
        match self {
            TokenFormat::Prefix => &PREFIX_TOKEN_PATTERN,
            TokenFormat::Luhn => &LUHN_TOKEN_PATTERN,
        }
    }
}

impl fmt::Display for TokenFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenFormat {
    type Err = TokenizerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prefix" => Ok(TokenFormat::Prefix),
            "luhn" => Ok(TokenFormat::Luhn),
            other => Err(TokenizerError::UnknownTokenFormat(other.to_string())),
        }
    }
}

/// Produces fresh tokens in the configured format
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenGenerator {
    format: TokenFormat,
}

impl TokenGenerator {
    pub fn new(format: TokenFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> TokenFormat {
        self.format
    }

    pub fn generate(&self) -> String {
        match self.format {
            TokenFormat::Prefix => prefix_token(),
            TokenFormat::Luhn => luhn_token(),
        }
    }
}

fn prefix_token() -> String {
    format!(
        "{PREFIX_SENTINEL}{}",
        to_base64_url(&random_bytes(PREFIX_RANDOM_BYTES))
    )
}

fn luhn_token() -> String {
    let mut rng = rand::rng();
    let mut token = String::with_capacity(LUHN_SENTINEL.len() + LUHN_RANDOM_DIGITS + 1);
    token.push_str(LUHN_SENTINEL);
    for _ in 0..LUHN_RANDOM_DIGITS {
        token.push(char::from(b'0' + rng.random_range(0..10u8)));
    }
    let check = luhn_check_digit(&token);
    token.push(char::from(b'0' + check));
    token
}
