//! External collaborators: the wallet provider and the ledger contract
//!
//! Transport (JSON-RPC to the wallet, calls to the chain) lives behind these
//! traits. The core only needs to request and list accounts, read the chain
//! id, derive an authenticated contract handle, and observe wallet events.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::account::Account;
use crate::amount::Amount;
use crate::error::{LedgerFault, ProviderError};

/// Event emitted by the wallet provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    /// The set of authorized accounts changed, primary account first
    AccountsChanged(Vec<String>),
    /// The provider lost its connection to the chain
    Disconnected,
}

/// Browser-style wallet provider (injected extension, mobile bridge, ...)
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Ask the user to authorize accounts (may prompt)
    async fn request_accounts(&self) -> Result<Vec<String>, ProviderError>;

    /// Accounts already authorized for this client (never prompts)
    async fn authorized_accounts(&self) -> Result<Vec<String>, ProviderError>;

    async fn chain_id(&self) -> Result<u64, ProviderError>;

    /// Bind the ledger contract at `contract` to `account`'s signer
    async fn connect_ledger(
        &self,
        account: &Account,
        contract: &Account,
    ) -> Result<Arc<dyn LedgerContract>, ProviderError>;

    /// Subscribe to accounts-changed and disconnect events
    fn subscribe(&self) -> broadcast::Receiver<WalletEvent>;
}

/// Transaction record as returned by `getTransactionHistory`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub sender: String,
    pub recipient: String,
    /// Value in wei
    pub amount: u128,
    /// Unix seconds
    pub timestamp: u64,
    pub completed: bool,
}

/// Hash of a submitted ledger transaction
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHash(pub String);

impl std::fmt::Display for TxHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Confirmation of a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    /// False when the execution reverted
    pub success: bool,
}

/// The payment contract, already bound to the connected account's signer
#[async_trait]
pub trait LedgerContract: Send + Sync {
    async fn get_balance(&self) -> Result<Amount, LedgerFault>;

    async fn get_transaction_history(&self) -> Result<Vec<LedgerRecord>, LedgerFault>;

    async fn deposit(&self, amount: Amount) -> Result<TxHash, LedgerFault>;

    async fn withdraw(&self, amount: Amount) -> Result<TxHash, LedgerFault>;

    async fn send_payment(&self, recipient: &Account, amount: Amount) -> Result<TxHash, LedgerFault>;

    /// Wait until `tx` is mined
    async fn wait_for_receipt(&self, tx: &TxHash) -> Result<TxReceipt, LedgerFault>;
}
