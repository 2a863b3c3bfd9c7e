//! Client configuration from environment variables
//!
//! Controls which payment contract the session binds to, which chains the
//! wallet may be on, where the connection hint is persisted and which locale
//! labels exports use.

use std::env;
use std::path::PathBuf;

use crate::account::Account;
use crate::display::Locale;

/// Payment contract deployed on Sepolia
pub const DEFAULT_CONTRACT_ADDRESS: &str = "0x3fCDB5Fc85a91D3914F17d9f7C8087F05e5930b6";

/// Mainnet, Ropsten, Rinkeby, Goerli, Kovan, Sepolia
pub const DEFAULT_CHAIN_IDS: [u64; 6] = [1, 3, 4, 5, 42, 11155111];

#[derive(Clone, Debug)]
pub struct LedgerConfig {
    /// Address of the payment contract
    pub contract_address: Account,
    /// Chain ids the wallet may be connected to
    pub supported_chain_ids: Vec<u64>,
    /// File backing the persisted connection hint
    pub session_store_path: PathBuf,
    /// Locale for export labels
    pub locale: Locale,
}

impl LedgerConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `LEDGER_CONTRACT_ADDRESS`: payment contract address
    /// - `SUPPORTED_CHAIN_IDS`: comma separated chain ids, e.g. "1,11155111"
    /// - `SESSION_STORE_PATH`: file for the persisted connection hint
    /// - `LEDGER_LOCALE`: "pt" (default) or "en"
    ///
    /// Invalid values are logged and replaced by their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as `from_env` but reads variables through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let contract_address = match lookup("LEDGER_CONTRACT_ADDRESS") {
            Some(raw) => match Account::parse(&raw) {
                Ok(address) => address,
                Err(e) => {
                    log::warn!("⚠️  Invalid LEDGER_CONTRACT_ADDRESS ({}), using default", e);
                    defaults.contract_address.clone()
                }
            },
            None => defaults.contract_address.clone(),
        };
        log::info!("📄 Payment contract: {}", contract_address);

        let supported_chain_ids = match lookup("SUPPORTED_CHAIN_IDS") {
            Some(raw) => {
                let parsed: Result<Vec<u64>, _> = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::parse::<u64>)
                    .collect();
                match parsed {
                    Ok(ids) if !ids.is_empty() => ids,
                    Ok(_) => {
                        log::warn!("⚠️  SUPPORTED_CHAIN_IDS is empty, using defaults");
                        defaults.supported_chain_ids.clone()
                    }
                    Err(e) => {
                        log::warn!("⚠️  Invalid SUPPORTED_CHAIN_IDS '{}' ({}), using defaults", raw, e);
                        defaults.supported_chain_ids.clone()
                    }
                }
            }
            None => defaults.supported_chain_ids.clone(),
        };
        log::info!("🔗 Supported chains: {:?}", supported_chain_ids);

        let session_store_path = lookup("SESSION_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| defaults.session_store_path.clone());

        let locale = match lookup("LEDGER_LOCALE") {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                log::warn!("⚠️  {}, defaulting to pt", e);
                Locale::Pt
            }),
            None => defaults.locale,
        };

        Self {
            contract_address,
            supported_chain_ids,
            session_store_path,
            locale,
        }
    }

    pub fn supports_chain(&self, chain_id: u64) -> bool {
        self.supported_chain_ids.contains(&chain_id)
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            contract_address: Account::parse(DEFAULT_CONTRACT_ADDRESS)
                .expect("Invalid default contract address"),
            supported_chain_ids: DEFAULT_CHAIN_IDS.to_vec(),
            session_store_path: PathBuf::from("./session.json"),
            locale: Locale::Pt,
        }
    }
}
