//! Data models for persisted session state

use serde::{Deserialize, Serialize};

use crate::account::Account;

/// Hint recorded on every session transition
///
/// Only used to decide whether to reconnect silently at startup, never as the
/// current connection state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedConnection {
    pub was_connected: bool,
    pub last_account: Option<Account>,
}

impl PersistedConnection {
    pub fn connected(account: Account) -> Self {
        Self {
            was_connected: true,
            last_account: Some(account),
        }
    }

    pub fn disconnected() -> Self {
        Self::default()
    }

    /// True when the hint says `account` was the last linked account
    pub fn matches(&self, account: &Account) -> bool {
        self.was_connected && self.last_account.as_ref() == Some(account)
    }
}
