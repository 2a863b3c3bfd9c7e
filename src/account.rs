//! Wallet account addresses

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::PayError;

/// Length of an address including the `0x` prefix
pub const ADDRESS_LEN: usize = 42;

/// A wallet address, `0x` followed by 20 hex-encoded bytes
///
/// Wallets report checksummed mixed-case addresses while the ledger returns
/// whatever casing it stored, so addresses are kept lowercase and compare
/// case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Account(String);

impl Account {
    pub fn parse(text: &str) -> Result<Self, PayError> {
        let text = text.trim();
        let digits = text
            .strip_prefix("0x")
            .or_else(|| text.strip_prefix("0X"))
            .ok_or_else(|| PayError::invalid_address(format!("{} is missing the 0x prefix", text)))?;

        let bytes = hex::decode(digits)
            .map_err(|e| PayError::invalid_address(format!("{}: {}", text, e)))?;
        if bytes.len() != 20 {
            return Err(PayError::invalid_address(format!(
                "{} is {} bytes, expected 20",
                text,
                bytes.len()
            )));
        }

        Ok(Self(format!("0x{}", hex::encode(bytes))))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive substring match used by the history filter
    pub fn contains(&self, needle_lowercase: &str) -> bool {
        self.0.contains(needle_lowercase)
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Account {
    type Err = PayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Account::parse(s)
    }
}

impl AsRef<str> for Account {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for Account {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Account {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Account::parse(&text).map_err(serde::de::Error::custom)
    }
}
