//! Fixed-point currency amounts
//!
//! The ledger counts value in wei, an integer with 18 implied decimal places.
//! Users type decimal ether strings; `Amount::parse` and `Display` convert
//! between the two without losing precision.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::PayError;

/// Number of decimal places in the ledger's native unit
pub const DECIMALS: u32 = 18;

const WEI_PER_ETHER: u128 = 10u128.pow(DECIMALS);

/// Non-negative amount in the ledger's smallest unit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(u128);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_wei(wei: u128) -> Self {
        Self(wei)
    }

    pub const fn as_wei(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Parse a human-entered decimal string such as `"1.5"` or `".25"`
    ///
    /// Rejects empty, signed, non-numeric, over-precise (more than 18
    /// fractional digits) and overflowing input.
    pub fn parse(text: &str) -> Result<Self, PayError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(PayError::invalid_amount("amount is empty"));
        }
        if text.starts_with('-') {
            return Err(PayError::invalid_amount(format!("{} is negative", text)));
        }

        let (whole, fraction) = match text.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (text, ""),
        };

        let is_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
        if (whole.is_empty() && fraction.is_empty()) || !is_digits(whole) || !is_digits(fraction) {
            return Err(PayError::invalid_amount(format!("{} is not a number", text)));
        }
        if fraction.len() > DECIMALS as usize {
            return Err(PayError::invalid_amount(format!(
                "{} has more than {} decimal places",
                text, DECIMALS
            )));
        }

        let overflow = || PayError::invalid_amount(format!("{} is too large", text));

        let whole_wei = if whole.is_empty() {
            0
        } else {
            whole
                .parse::<u128>()
                .map_err(|_| overflow())?
                .checked_mul(WEI_PER_ETHER)
                .ok_or_else(overflow)?
        };

        let fraction_wei = if fraction.is_empty() {
            0
        } else {
            let scale = 10u128.pow(DECIMALS - fraction.len() as u32);
            // At most 18 digits, always fits
            fraction.parse::<u128>().map_err(|_| overflow())? * scale
        };

        whole_wei
            .checked_add(fraction_wei)
            .map(Amount)
            .ok_or_else(overflow)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / WEI_PER_ETHER;
        let fraction = self.0 % WEI_PER_ETHER;
        let digits = format!("{:0width$}", fraction, width = DECIMALS as usize);
        let trimmed = digits.trim_end_matches('0');
        if trimmed.is_empty() {
            write!(f, "{}.0", whole)
        } else {
            write!(f, "{}.{}", whole, trimmed)
        }
    }
}

impl FromStr for Amount {
    type Err = PayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Amount::parse(s)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Amount::parse(&text).map_err(serde::de::Error::custom)
    }
}
