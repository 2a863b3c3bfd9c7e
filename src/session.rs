//! Wallet Session - Connection State Machine
//!
//! Owns the connect/disconnect/account-switch lifecycle and the single
//! authenticated ledger handle. Every event goes through `WalletSession::apply`.
//!
//! States: `Disconnected -> Connecting -> Connected`, and back to
//! `Disconnected` from any state. Each transition bumps an epoch; handles and
//! in-flight work carry the epoch they started under, and results that come
//! back under an older epoch are discarded.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::account::Account;
use crate::cache::TransactionLedgerCache;
use crate::config::LedgerConfig;
use crate::error::{PayError, ProviderError};
use crate::provider::{LedgerContract, WalletEvent, WalletProvider};
use crate::storage::SessionStore;
use crate::transaction::Transaction;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Disconnected,
    Connecting,
    Connected,
}

/// Authenticated reference to the ledger on behalf of one account
#[derive(Clone)]
pub struct LedgerHandle {
    account: Account,
    contract: Arc<dyn LedgerContract>,
    epoch: u64,
}

impl LedgerHandle {
    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn contract(&self) -> &Arc<dyn LedgerContract> {
        &self.contract
    }

    /// Session epoch this handle was issued under
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

impl fmt::Debug for LedgerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerHandle")
            .field("account", &self.account)
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}

/// Point-in-time view of the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub account: Option<Account>,
    pub epoch: u64,
}

/// Inputs to the session state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// User asked to link a wallet
    Connect,
    /// Startup check of the persisted hint
    AutoReconnect,
    /// User asked to unlink
    Disconnect,
    /// Wallet reported a new account list, primary first
    AccountsChanged(Vec<String>),
    /// Wallet lost its connection
    ProviderDisconnected,
}

struct InFlight {
    epoch: u64,
    /// Account being linked, once known
    target: Option<Account>,
}

struct SessionState {
    status: SessionStatus,
    account: Option<Account>,
    handle: Option<LedgerHandle>,
    epoch: u64,
    in_flight: Option<InFlight>,
}

impl SessionState {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            account: self.account.clone(),
            epoch: self.epoch,
        }
    }

    fn reset(&mut self, status: SessionStatus) {
        self.status = status;
        self.account = None;
        self.handle = None;
    }
}

enum AccountSource {
    /// Prompt the wallet for accounts
    Request,
    /// Account already known (switch, silent reconnect)
    Known(Account),
}

/// The process-wide wallet session
pub struct WalletSession {
    provider: Option<Arc<dyn WalletProvider>>,
    store: SessionStore,
    config: LedgerConfig,
    state: Mutex<SessionState>,
    cache: Mutex<TransactionLedgerCache>,
    subscription: Mutex<Option<JoinHandle<()>>>,
}

impl WalletSession {
    /// Create a disconnected session; `provider` is `None` when no wallet is installed
    pub fn new(
        provider: Option<Arc<dyn WalletProvider>>,
        store: SessionStore,
        config: LedgerConfig,
    ) -> Self {
        Self {
            provider,
            store,
            config,
            state: Mutex::new(SessionState {
                status: SessionStatus::Disconnected,
                account: None,
                handle: None,
                epoch: 0,
                in_flight: None,
            }),
            cache: Mutex::new(TransactionLedgerCache::new()),
            subscription: Mutex::new(None),
        }
    }

    // ============================================================================
    // Accessors
    // ============================================================================

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state().snapshot()
    }

    pub fn status(&self) -> SessionStatus {
        self.state().status
    }

    pub fn account(&self) -> Option<Account> {
        self.state().account.clone()
    }

    /// Current authenticated handle, present only while connected
    pub fn handle(&self) -> Option<LedgerHandle> {
        let state = self.state();
        match state.status {
            SessionStatus::Connected => state.handle.clone(),
            _ => None,
        }
    }

    /// True while the session is still the connected one from `epoch`
    pub fn is_current(&self, epoch: u64) -> bool {
        let state = self.state();
        state.status == SessionStatus::Connected && state.epoch == epoch
    }

    /// Run `f` against the cached transaction history
    pub fn with_cache<R>(&self, f: impl FnOnce(&mut TransactionLedgerCache) -> R) -> R {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut cache)
    }

    /// Store a fetched history if the session that fetched it is still current
    pub fn apply_history(&self, epoch: u64, transactions: Vec<Transaction>) -> Result<usize> {
        let state = self.state();
        if state.status != SessionStatus::Connected || state.epoch != epoch {
            log::info!("Discarding history fetched under stale session epoch {}", epoch);
            return Err(PayError::SessionChanged);
        }
        let count = transactions.len();
        self.with_cache(|cache| cache.replace_all(transactions));
        Ok(count)
    }

    // ============================================================================
    // Operations
    // ============================================================================

    pub async fn connect(&self) -> Result<SessionSnapshot> {
        self.apply(SessionEvent::Connect).await
    }

    /// Unlink the wallet; never fails
    pub async fn disconnect(&self) -> SessionSnapshot {
        match self.apply(SessionEvent::Disconnect).await {
            Ok(snapshot) => snapshot,
            Err(_) => self.snapshot(),
        }
    }

    pub async fn on_accounts_changed(&self, accounts: Vec<String>) -> Result<SessionSnapshot> {
        self.apply(SessionEvent::AccountsChanged(accounts)).await
    }

    pub async fn on_provider_disconnect(&self) -> SessionSnapshot {
        match self.apply(SessionEvent::ProviderDisconnected).await {
            Ok(snapshot) => snapshot,
            Err(_) => self.snapshot(),
        }
    }

    /// Silently restore the previous session at startup if the hint still holds
    pub async fn try_auto_reconnect(&self) -> Result<SessionSnapshot> {
        self.apply(SessionEvent::AutoReconnect).await
    }

    /// Single entry point of the state machine
    pub async fn apply(&self, event: SessionEvent) -> Result<SessionSnapshot> {
        log::debug!("Session event: {:?}", event);
        match event {
            SessionEvent::Connect => self.run_connect().await,
            SessionEvent::AutoReconnect => self.run_auto_reconnect().await,
            SessionEvent::Disconnect => Ok(self.teardown("user disconnect")),
            SessionEvent::ProviderDisconnected => Ok(self.teardown("provider disconnected")),
            SessionEvent::AccountsChanged(accounts) => self.run_accounts_changed(accounts).await,
        }
    }

    // ============================================================================
    // Wallet events
    // ============================================================================

    /// Subscribe to the provider's events and feed them into `apply`
    ///
    /// Events are applied in arrival order on a background task that holds
    /// only a weak reference to the session. Calling again replaces the
    /// previous subscription.
    pub fn listen(self: &Arc<Self>) {
        let Some(provider) = &self.provider else {
            log::debug!("No wallet provider, not subscribing to events");
            return;
        };

        let mut events = provider.subscribe();
        let session: Weak<Self> = Arc::downgrade(self);

        let task = tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(missed)) => {
                        log::warn!("Missed {} wallet events", missed);
                        continue;
                    }
                    Err(RecvError::Closed) => {
                        log::debug!("Wallet event stream closed");
                        break;
                    }
                };

                let Some(session) = session.upgrade() else {
                    break;
                };
                let event = match event {
                    WalletEvent::AccountsChanged(accounts) => SessionEvent::AccountsChanged(accounts),
                    WalletEvent::Disconnected => SessionEvent::ProviderDisconnected,
                };
                if let Err(e) = session.apply(event).await {
                    log::warn!("Wallet event left session disconnected: {}", e);
                }
            }
        });

        let mut subscription = self.subscription.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = subscription.replace(task) {
            previous.abort();
        }
        log::info!("Subscribed to wallet events");
    }

    /// Drop the event subscription
    pub fn shutdown(&self) {
        let mut subscription = self.subscription.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(task) = subscription.take() {
            task.abort();
            log::info!("Unsubscribed from wallet events");
        }
    }

    // ============================================================================
    // Transitions
    // ============================================================================

    async fn run_connect(&self) -> Result<SessionSnapshot> {
        let Some(provider) = self.provider.clone() else {
            log::warn!("Connect requested but no wallet provider is installed");
            return Err(PayError::WalletUnavailable);
        };

        let Some(epoch) = self.begin() else {
            log::debug!("Connect dropped: session busy or already connected");
            return Ok(self.snapshot());
        };

        log::info!("Connecting wallet (epoch {})", epoch);
        let result = self.handshake(provider.as_ref(), epoch, AccountSource::Request).await;
        self.finish(epoch, result)
    }

    async fn run_auto_reconnect(&self) -> Result<SessionSnapshot> {
        let Some(provider) = self.provider.clone() else {
            log::info!("No wallet provider at startup, clearing saved connection");
            self.persist_cleared();
            return Ok(self.snapshot());
        };

        let Some(epoch) = self.begin() else {
            log::debug!("Auto-reconnect dropped: session busy or already connected");
            return Ok(self.snapshot());
        };

        let candidate = match self.reconnect_candidate(provider.as_ref()).await {
            Ok(candidate) => candidate,
            Err(e) => {
                log::warn!("Auto-reconnect check failed: {}", e);
                None
            }
        };

        match candidate {
            Some(account) => {
                // From here an account switch supersedes the reconnect
                if let Err(e) = self.set_target(epoch, &account) {
                    log::info!("Auto-reconnect superseded before the handshake");
                    return Err(e);
                }
                log::info!("Restoring session for {} (epoch {})", account, epoch);
                let result = self
                    .handshake(provider.as_ref(), epoch, AccountSource::Known(account))
                    .await;
                self.finish(epoch, result)
            }
            None => {
                let (snapshot, stale) = {
                    let mut state = self.state();
                    let stale = state.epoch == epoch;
                    if stale {
                        state.reset(SessionStatus::Disconnected);
                        state.in_flight = None;
                    }
                    (state.snapshot(), stale)
                };
                if stale {
                    self.persist_cleared();
                    log::info!("Saved connection is stale, staying disconnected");
                }
                Ok(snapshot)
            }
        }
    }

    /// The account to restore, if every reconnect condition holds
    async fn reconnect_candidate(&self, provider: &dyn WalletProvider) -> Result<Option<Account>> {
        let authorized = provider.authorized_accounts().await?;
        let Some(primary) = authorized.first() else {
            log::debug!("Wallet reports no authorized accounts");
            return Ok(None);
        };
        let primary = Account::parse(primary)?;
        let hint = self.store.load()?;

        if hint.matches(&primary) {
            Ok(Some(primary))
        } else {
            log::debug!(
                "Saved hint {:?} does not match wallet account {}",
                hint.last_account,
                primary
            );
            Ok(None)
        }
    }

    async fn run_accounts_changed(&self, accounts: Vec<String>) -> Result<SessionSnapshot> {
        let Some(first) = accounts.first() else {
            return Ok(self.teardown("wallet reported no accounts"));
        };
        let primary = match Account::parse(first) {
            Ok(account) => account,
            Err(e) => {
                log::warn!("Wallet reported an unreadable account {:?}", first);
                self.teardown("unreadable wallet account");
                return Err(e);
            }
        };
        let Some(provider) = self.provider.clone() else {
            return Ok(self.snapshot());
        };

        let epoch = {
            let mut state = self.state();
            let linked_to = match (state.status, &state.in_flight) {
                (SessionStatus::Connected, _) => state.account.clone(),
                (SessionStatus::Connecting, Some(InFlight { target: Some(target), .. })) => {
                    Some(target.clone())
                }
                (SessionStatus::Connecting, _) => {
                    log::debug!("Account change ignored: handshake is still requesting accounts");
                    return Ok(state.snapshot());
                }
                (SessionStatus::Disconnected, _) => {
                    log::debug!("Account change ignored while disconnected");
                    return Ok(state.snapshot());
                }
            };
            if linked_to.as_ref() == Some(&primary) {
                return Ok(state.snapshot());
            }

            state.epoch += 1;
            state.reset(SessionStatus::Connecting);
            state.in_flight = Some(InFlight {
                epoch: state.epoch,
                target: Some(primary.clone()),
            });
            self.with_cache(|cache| cache.clear());
            state.epoch
        };
        self.persist_connected(&primary);

        log::info!("Wallet switched to {} (epoch {})", primary, epoch);
        let result = self
            .handshake(provider.as_ref(), epoch, AccountSource::Known(primary))
            .await;
        self.finish(epoch, result)
    }

    /// Claim the transition slot
    ///
    /// `None` while another handshake is in flight or the session is already
    /// connected.
    fn begin(&self) -> Option<u64> {
        let mut state = self.state();
        if state.in_flight.is_some() || state.status == SessionStatus::Connected {
            return None;
        }

        state.epoch += 1;
        state.reset(SessionStatus::Connecting);
        state.in_flight = Some(InFlight {
            epoch: state.epoch,
            target: None,
        });
        self.with_cache(|cache| cache.clear());
        Some(state.epoch)
    }

    async fn handshake(
        &self,
        provider: &dyn WalletProvider,
        epoch: u64,
        source: AccountSource,
    ) -> Result<(Account, Arc<dyn LedgerContract>)> {
        let account = match source {
            AccountSource::Request => {
                let accounts = provider.request_accounts().await?;
                let first = accounts.first().ok_or(ProviderError::NoAccounts)?;
                let account = Account::parse(first)?;
                self.set_target(epoch, &account)?;
                account
            }
            AccountSource::Known(account) => account,
        };

        let chain_id = provider.chain_id().await?;
        if !self.config.supports_chain(chain_id) {
            log::warn!("Wallet is on unsupported chain {}", chain_id);
            return Err(PayError::UnsupportedChain(chain_id));
        }

        let contract = provider
            .connect_ledger(&account, &self.config.contract_address)
            .await?;
        Ok((account, contract))
    }

    fn set_target(&self, epoch: u64, account: &Account) -> Result<()> {
        let mut state = self.state();
        match &mut state.in_flight {
            Some(in_flight) if in_flight.epoch == epoch => {
                in_flight.target = Some(account.clone());
                Ok(())
            }
            _ => Err(PayError::SessionChanged),
        }
    }

    /// Apply a handshake result if its epoch is still current
    fn finish(
        &self,
        epoch: u64,
        result: Result<(Account, Arc<dyn LedgerContract>)>,
    ) -> Result<SessionSnapshot> {
        let applied = {
            let mut state = self.state();
            if state.epoch != epoch {
                log::info!("Discarding handshake from superseded epoch {}", epoch);
                return Err(PayError::SessionChanged);
            }
            state.in_flight = None;

            match result {
                Ok((account, contract)) => {
                    state.status = SessionStatus::Connected;
                    state.account = Some(account.clone());
                    state.handle = Some(LedgerHandle {
                        account: account.clone(),
                        contract,
                        epoch,
                    });
                    Ok((account, state.snapshot()))
                }
                Err(e) => {
                    state.reset(SessionStatus::Disconnected);
                    self.with_cache(|cache| cache.clear());
                    Err(e)
                }
            }
        };

        match applied {
            Ok((account, snapshot)) => {
                self.persist_connected(&account);
                log::info!("✅ Wallet connected: {} (epoch {})", account, epoch);
                Ok(snapshot)
            }
            Err(e) => {
                self.persist_cleared();
                log::warn!("Wallet connection failed: {}", e);
                Err(e)
            }
        }
    }

    fn teardown(&self, reason: &str) -> SessionSnapshot {
        let snapshot = {
            let mut state = self.state();
            state.epoch += 1;
            state.reset(SessionStatus::Disconnected);
            state.in_flight = None;
            self.with_cache(|cache| cache.clear());
            state.snapshot()
        };
        self.persist_cleared();
        log::info!("Wallet disconnected: {} (epoch {})", reason, snapshot.epoch);
        snapshot
    }

    // Store writes happen outside the state lock; the hint is last-writer-wins

    fn persist_connected(&self, account: &Account) {
        if let Err(e) = self.store.record_connected(account) {
            log::error!("Failed to persist connection: {}", e);
        }
    }

    fn persist_cleared(&self) {
        if let Err(e) = self.store.clear() {
            log::error!("Failed to clear saved connection: {}", e);
        }
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for WalletSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}
