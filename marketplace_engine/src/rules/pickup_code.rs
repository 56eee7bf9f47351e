use std::{fmt::Display, str::FromStr, sync::OnceLock};

use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const PICKUP_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const PICKUP_CODE_LENGTH: usize = 6;
/// How many fresh codes to try before giving up on finding one that no other open order of the store is using.
pub const MAX_PICKUP_CODE_ATTEMPTS: usize = 10;

#[derive(Debug, Clone, Error)]
#[error("Invalid pickup code: '{0}'. Codes are {PICKUP_CODE_LENGTH} characters from A-Z and 0-9.")]
pub struct InvalidPickupCode(String);

/// A short verification token the customer shows at handoff.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PickupCode(String);

fn pickup_code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Z0-9]{6}$").expect("pickup code pattern is a valid regex"))
}

impl PickupCode {
    /// Draws a new code, each character chosen uniformly from `[A-Z0-9]`.
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::thread_rng())
    }

    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let code = (0..PICKUP_CODE_LENGTH)
            .map(|_| PICKUP_CODE_ALPHABET[rng.gen_range(0..PICKUP_CODE_ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compares a code typed in by a person. Surrounding whitespace and case are ignored.
    pub fn matches(&self, input: &str) -> bool {
        self.0.eq_ignore_ascii_case(input.trim())
    }
}

impl FromStr for PickupCode {
    type Err = InvalidPickupCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();
        if pickup_code_pattern().is_match(&code) {
            Ok(Self(code))
        } else {
            Err(InvalidPickupCode(s.to_string()))
        }
    }
}

impl TryFrom<String> for PickupCode {
    type Error = InvalidPickupCode;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PickupCode> for String {
    fn from(code: PickupCode) -> Self {
        code.0
    }
}

impl Display for PickupCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
