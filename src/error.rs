//! Error types for wallet session and ledger operations
//!
//! `PayError` is what every public operation returns. Ledger and wallet
//! provider failures keep their original cause attached so callers can show
//! the user what actually went wrong.

use thiserror::Error;

/// Core error type for the session/ledger core
#[derive(Error, Debug)]
pub enum PayError {
    /// No wallet provider is installed
    #[error("No wallet provider available, install a wallet to continue")]
    WalletUnavailable,

    /// The provider refused or failed the account handshake
    #[error("Wallet rejected the request: {0}")]
    WalletRejected(#[from] ProviderError),

    /// The wallet is on a chain the ledger is not deployed to
    #[error("Unsupported chain id: {0}")]
    UnsupportedChain(u64),

    /// Operation attempted without an active session
    #[error("Wallet is not connected")]
    NotConnected,

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Recipient address is required")]
    RecipientRequired,

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// The remote ledger failed or reverted the call
    #[error("Ledger rejected the operation: {0}")]
    LedgerRejected(#[source] LedgerFault),

    /// Another mutating action is still pending
    #[error("Another action is already in progress")]
    ActionInProgress,

    /// The session changed while the call was outstanding; its result was discarded
    #[error("Session changed before the operation completed")]
    SessionChanged,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl PayError {
    pub fn invalid_amount(msg: impl Into<String>) -> Self {
        Self::InvalidAmount(msg.into())
    }

    pub fn invalid_address(msg: impl Into<String>) -> Self {
        Self::InvalidAddress(msg.into())
    }

    /// True for errors raised by local input validation (no network round-trip)
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidAmount(_) | Self::RecipientRequired | Self::InvalidAddress(_)
        )
    }
}

impl From<LedgerFault> for PayError {
    fn from(fault: LedgerFault) -> Self {
        Self::LedgerRejected(fault)
    }
}

/// Failure reported by the remote ledger contract
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerFault {
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("Execution reverted: {0}")]
    Reverted(String),

    #[error("Network error: {0}")]
    Network(String),

    /// The ledger answered with data this client cannot interpret
    #[error("Malformed ledger response: {0}")]
    Malformed(String),
}

/// Failure reported by the wallet provider
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("User rejected the request")]
    UserRejected,

    #[error("Wallet returned no accounts")]
    NoAccounts,

    #[error("Provider error: {0}")]
    Rpc(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A store guarded by a poisoned lock
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}
