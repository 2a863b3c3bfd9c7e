//! Storage and persistence layer
//!
//! - Key-value backends (file system, memory)
//! - Persisted connection hint
//! - Session store used for auto-reconnect

mod file_system;
mod models;
mod session_store;

pub use file_system::{FileStore, KeyValueStore, MemoryStore};
pub use models::PersistedConnection;
pub use session_store::{SessionStore, LAST_ACCOUNT_KEY, WAS_CONNECTED_KEY};
