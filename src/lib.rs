//! ledger-pay: Wallet Session and Ledger Sync for a Payment Contract
//!
//! This crate is the client core behind a single-account payment ledger
//! deployed as a smart contract. It links a browser-style wallet, keeps one
//! authenticated contract handle consistent with the wallet's state, moves
//! funds (deposit, withdraw, pay) and caches a filterable transfer history.
//!
//! # Architecture
//!
//! - **WalletSession**: connect/disconnect/account-switch state machine
//! - **LedgerClient**: typed calls against the session's contract handle
//! - **ActionDispatcher**: at most one pending mutation at a time
//! - **TransactionLedgerCache**: cached history, filters and CSV export
//! - **SessionStore**: persisted hint driving silent reconnect at startup
//!
//! Wallet transport and the contract itself are supplied by the caller
//! through the `WalletProvider` and `LedgerContract` traits.
//!
//! # Example
//!
//! ```ignore
//! use ledger_pay::{Action, ActionDispatcher, FileStore, LedgerClient, LedgerConfig, SessionStore, WalletSession};
//! use std::sync::Arc;
//!
//! let config = LedgerConfig::from_env();
//! let store = SessionStore::new(Arc::new(FileStore::with_path(config.session_store_path.clone())));
//! let session = Arc::new(WalletSession::new(Some(provider), store, config));
//! session.listen();
//! session.try_auto_reconnect().await?;
//!
//! let client = LedgerClient::new(session.clone());
//! let dispatcher = ActionDispatcher::new(client.clone());
//! dispatcher.dispatch(Action::deposit("0.5")).await?;
//! let balance = client.get_balance().await?;
//! ```

// Public modules
pub mod account;
pub mod amount;
pub mod cache;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod display;
pub mod error;
pub mod provider;
pub mod session;
pub mod storage;
pub mod transaction;

// Re-exports for convenience
pub use account::Account;
pub use amount::Amount;
pub use cache::{TransactionFilter, TransactionLedgerCache};
pub use client::LedgerClient;
pub use config::LedgerConfig;
pub use dispatcher::{Action, ActionDispatcher, ActionKind, ActionOutcome, PendingAction};
pub use display::{display_address, export_file_name, payment_uri, Labels, Locale};
pub use error::{LedgerFault, PayError, ProviderError, StorageError};
pub use provider::{LedgerContract, LedgerRecord, TxHash, TxReceipt, WalletEvent, WalletProvider};
pub use session::{LedgerHandle, SessionEvent, SessionSnapshot, SessionStatus, WalletSession};
pub use storage::{FileStore, KeyValueStore, MemoryStore, PersistedConnection, SessionStore};
pub use transaction::Transaction;

// Common result type
pub type Result<T> = std::result::Result<T, PayError>;
