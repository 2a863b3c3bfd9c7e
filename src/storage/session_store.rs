use std::sync::Arc;

use super::file_system::KeyValueStore;
use super::models::PersistedConnection;
use crate::account::Account;
use crate::error::StorageError;

/// Key holding `"true"`/`"false"`
pub const WAS_CONNECTED_KEY: &str = "walletConnected";
/// Key holding the last linked account address
pub const LAST_ACCOUNT_KEY: &str = "lastConnectedAccount";

/// Reads and writes the persisted connection hint
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Load the hint; an unreadable account entry counts as absent
    pub fn load(&self) -> Result<PersistedConnection, StorageError> {
        let was_connected = self
            .backend
            .get(WAS_CONNECTED_KEY)?
            .map(|v| v == "true")
            .unwrap_or(false);

        let last_account = match self.backend.get(LAST_ACCOUNT_KEY)? {
            Some(raw) => match Account::parse(&raw) {
                Ok(account) => Some(account),
                Err(e) => {
                    log::warn!("Ignoring stored account {:?}: {}", raw, e);
                    None
                }
            },
            None => None,
        };

        Ok(PersistedConnection {
            was_connected,
            last_account,
        })
    }

    pub fn record_connected(&self, account: &Account) -> Result<(), StorageError> {
        self.backend.set(WAS_CONNECTED_KEY, "true")?;
        self.backend.set(LAST_ACCOUNT_KEY, account.as_str())
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        self.backend.set(WAS_CONNECTED_KEY, "false")?;
        self.backend.remove(LAST_ACCOUNT_KEY)
    }
}
