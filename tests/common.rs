//! Common test utilities for wallet session and ledger tests
//!
//! This module provides shared test infrastructure including:
//! - An in-memory payment ledger (`MockLedger`) with failure injection
//! - A wallet provider (`MockWallet`) with scripted accounts and events
//! - Gates that hold calls open to exercise in-flight behavior
//! - `TestEnvironment` wiring a session, client and dispatcher over a temp store

#![allow(dead_code)]

use async_trait::async_trait;
use ledger_pay::{
    Account, ActionDispatcher, Amount, FileStore, LedgerClient, LedgerConfig, LedgerContract,
    LedgerFault, LedgerRecord, PersistedConnection, ProviderError, SessionStore, TxHash, TxReceipt,
    WalletEvent, WalletProvider, WalletSession,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::{broadcast, Notify};

/// Checksummed the way a wallet reports it
pub const ALICE: &str = "0xA11CE000000000000000000000000000000A11CE";
pub const BOB: &str = "0xb0b0000000000000000000000000000000000b0b";
pub const CAROL: &str = "0xca201000000000000000000000000000000ca201";

pub const SEPOLIA: u64 = 11155111;
pub const ONE_ETH: u128 = 1_000_000_000_000_000_000;

pub fn init_logging() {
    dotenv::dotenv().ok();
    env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init()
        .ok();
}

pub fn acct(address: &str) -> Account {
    Account::parse(address).expect("valid test address")
}

/// Poll `condition` until it holds or two seconds pass
pub async fn wait_until<F>(mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    for _ in 0..400 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// Run `future` with a timeout so a stuck test fails instead of hanging
pub async fn bounded<T>(future: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("operation timed out")
}

// ============================================================================
// Gate
// ============================================================================

/// Holds callers until opened
pub struct Gate {
    open: AtomicBool,
    notify: Notify,
    waiting: AtomicUsize,
}

impl Gate {
    pub fn new() -> Self {
        Self {
            open: AtomicBool::new(true),
            notify: Notify::new(),
            waiting: AtomicUsize::new(0),
        }
    }

    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    pub fn open(&self) {
        self.open.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Number of callers currently held
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    pub async fn pass(&self) {
        self.waiting.fetch_add(1, Ordering::SeqCst);
        loop {
            let notified = self.notify.notified();
            if self.open.load(Ordering::SeqCst) {
                break;
            }
            notified.await;
        }
        self.waiting.fetch_sub(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Mock ledger
// ============================================================================

/// Shared state of the in-memory payment contract
pub struct LedgerState {
    pub balances: HashMap<Account, u128>,
    pub history: Vec<LedgerRecord>,
    pub next_block: u64,
    pub clock: u64,
}

pub struct MockLedgerBackend {
    pub contract: Account,
    pub state: Mutex<LedgerState>,
    pub gate: Gate,
    /// Mutating submissions that reached the ledger
    pub submissions: AtomicUsize,
    /// Reads (balance, history) that reached the ledger
    pub reads: AtomicUsize,
    /// Next receipt reports a revert
    pub revert_next: AtomicBool,
    /// Next call fails with a network fault
    pub fail_next: AtomicBool,
}

impl MockLedgerBackend {
    pub fn new(contract: Account) -> Self {
        Self {
            contract,
            state: Mutex::new(LedgerState {
                balances: HashMap::new(),
                history: Vec::new(),
                next_block: 1,
                clock: 1_700_000_000,
            }),
            gate: Gate::new(),
            submissions: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
            revert_next: AtomicBool::new(false),
            fail_next: AtomicBool::new(false),
        }
    }

    pub fn balance_of(&self, account: &Account) -> u128 {
        self.state.lock().unwrap().balances.get(account).copied().unwrap_or(0)
    }

    pub fn fund(&self, account: &Account, wei: u128) {
        *self
            .state
            .lock()
            .unwrap()
            .balances
            .entry(account.clone())
            .or_insert(0) += wei;
    }

    /// Append a raw history record at `timestamp`
    pub fn record(&self, sender: &str, recipient: &str, wei: u128, timestamp: u64, completed: bool) {
        self.state.lock().unwrap().history.push(LedgerRecord {
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            amount: wei,
            timestamp,
            completed,
        });
    }

    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> Result<(), LedgerFault> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(LedgerFault::Network("connection reset".to_string()));
        }
        Ok(())
    }

    fn transfer(
        &self,
        from: Option<&Account>,
        to: Option<&Account>,
        wei: u128,
        sender: &Account,
        recipient: &Account,
    ) -> Result<TxHash, LedgerFault> {
        let mut state = self.state.lock().unwrap();
        if let Some(from) = from {
            let balance = state.balances.get(from).copied().unwrap_or(0);
            if balance < wei {
                return Err(LedgerFault::InsufficientFunds(format!(
                    "balance {} < {}",
                    balance, wei
                )));
            }
            state.balances.insert(from.clone(), balance - wei);
        }
        if let Some(to) = to {
            *state.balances.entry(to.clone()).or_insert(0) += wei;
        }
        state.clock += 60;
        let timestamp = state.clock;
        state.history.push(LedgerRecord {
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            amount: wei,
            timestamp,
            completed: true,
        });
        let block = state.next_block;
        state.next_block += 1;
        Ok(TxHash(format!("0x{:064x}", block)))
    }
}

/// The contract bound to one account's signer
pub struct MockLedger {
    pub backend: Arc<MockLedgerBackend>,
    pub account: Account,
}

#[async_trait]
impl LedgerContract for MockLedger {
    async fn get_balance(&self) -> Result<Amount, LedgerFault> {
        self.backend.gate.pass().await;
        self.backend.reads.fetch_add(1, Ordering::SeqCst);
        self.backend.take_failure()?;
        Ok(Amount::from_wei(self.backend.balance_of(&self.account)))
    }

    async fn get_transaction_history(&self) -> Result<Vec<LedgerRecord>, LedgerFault> {
        self.backend.gate.pass().await;
        self.backend.reads.fetch_add(1, Ordering::SeqCst);
        self.backend.take_failure()?;
        Ok(self.backend.state.lock().unwrap().history.clone())
    }

    async fn deposit(&self, amount: Amount) -> Result<TxHash, LedgerFault> {
        self.backend.gate.pass().await;
        self.backend.submissions.fetch_add(1, Ordering::SeqCst);
        self.backend.take_failure()?;
        let contract = self.backend.contract.clone();
        self.backend
            .transfer(None, Some(&self.account), amount.as_wei(), &self.account, &contract)
    }

    async fn withdraw(&self, amount: Amount) -> Result<TxHash, LedgerFault> {
        self.backend.gate.pass().await;
        self.backend.submissions.fetch_add(1, Ordering::SeqCst);
        self.backend.take_failure()?;
        let contract = self.backend.contract.clone();
        self.backend
            .transfer(Some(&self.account), None, amount.as_wei(), &contract, &self.account)
    }

    async fn send_payment(&self, recipient: &Account, amount: Amount) -> Result<TxHash, LedgerFault> {
        self.backend.gate.pass().await;
        self.backend.submissions.fetch_add(1, Ordering::SeqCst);
        self.backend.take_failure()?;
        self.backend.transfer(
            Some(&self.account),
            Some(recipient),
            amount.as_wei(),
            &self.account,
            recipient,
        )
    }

    async fn wait_for_receipt(&self, tx: &TxHash) -> Result<TxReceipt, LedgerFault> {
        let block_number = u64::from_str_radix(tx.0.trim_start_matches("0x"), 16)
            .map_err(|e| LedgerFault::Malformed(e.to_string()))?;
        Ok(TxReceipt {
            tx_hash: tx.clone(),
            block_number,
            success: !self.backend.revert_next.swap(false, Ordering::SeqCst),
        })
    }
}

// ============================================================================
// Mock wallet
// ============================================================================

pub struct WalletState {
    /// Returned by `request_accounts`
    pub accounts: Vec<String>,
    /// Returned by `authorized_accounts`
    pub authorized: Vec<String>,
    pub chain_id: u64,
    pub reject_requests: bool,
}

pub struct MockWallet {
    pub state: Mutex<WalletState>,
    pub ledger: Arc<MockLedgerBackend>,
    /// Holds `connect_ledger` callers
    pub gate: Gate,
    pub request_calls: AtomicUsize,
    pub connect_calls: AtomicUsize,
    events: broadcast::Sender<WalletEvent>,
}

impl MockWallet {
    pub fn new(account: &str, contract: Account) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            state: Mutex::new(WalletState {
                accounts: vec![account.to_string()],
                authorized: vec![account.to_string()],
                chain_id: SEPOLIA,
                reject_requests: false,
            }),
            ledger: Arc::new(MockLedgerBackend::new(contract)),
            gate: Gate::new(),
            request_calls: AtomicUsize::new(0),
            connect_calls: AtomicUsize::new(0),
            events,
        }
    }

    /// Switch the wallet's active account (without emitting an event)
    pub fn select(&self, account: &str) {
        let mut state = self.state.lock().unwrap();
        state.accounts = vec![account.to_string()];
        state.authorized = vec![account.to_string()];
    }

    pub fn set_authorized(&self, accounts: &[&str]) {
        self.state.lock().unwrap().authorized = accounts.iter().map(|a| a.to_string()).collect();
    }

    pub fn set_chain(&self, chain_id: u64) {
        self.state.lock().unwrap().chain_id = chain_id;
    }

    pub fn set_reject(&self, reject: bool) {
        self.state.lock().unwrap().reject_requests = reject;
    }

    pub fn emit(&self, event: WalletEvent) {
        self.events.send(event).ok();
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WalletProvider for MockWallet {
    async fn request_accounts(&self) -> Result<Vec<String>, ProviderError> {
        self.request_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        if state.reject_requests {
            return Err(ProviderError::UserRejected);
        }
        Ok(state.accounts.clone())
    }

    async fn authorized_accounts(&self) -> Result<Vec<String>, ProviderError> {
        Ok(self.state.lock().unwrap().authorized.clone())
    }

    async fn chain_id(&self) -> Result<u64, ProviderError> {
        Ok(self.state.lock().unwrap().chain_id)
    }

    async fn connect_ledger(
        &self,
        account: &Account,
        contract: &Account,
    ) -> Result<Arc<dyn LedgerContract>, ProviderError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        self.gate.pass().await;
        if contract != &self.ledger.contract {
            return Err(ProviderError::Rpc(format!("no contract at {}", contract)));
        }
        let ledger: Arc<dyn LedgerContract> = Arc::new(MockLedger {
            backend: self.ledger.clone(),
            account: account.clone(),
        });
        Ok(ledger)
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }
}

// ============================================================================
// Test environment
// ============================================================================

/// Session, client and dispatcher over a mock wallet and a temp-dir store
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub store: SessionStore,
    pub wallet: Arc<MockWallet>,
    pub session: Arc<WalletSession>,
    pub client: LedgerClient,
    pub dispatcher: Arc<ActionDispatcher>,
}

impl TestEnvironment {
    pub fn new() -> anyhow::Result<Self> {
        Self::build(ALICE, true)
    }

    /// Environment whose session has no wallet provider installed
    pub fn without_provider() -> anyhow::Result<Self> {
        Self::build(ALICE, false)
    }

    pub fn with_account(account: &str) -> anyhow::Result<Self> {
        Self::build(account, true)
    }

    fn build(account: &str, with_provider: bool) -> anyhow::Result<Self> {
        init_logging();

        let temp_dir = TempDir::new()?;
        log::info!("📁 Test directory: {:?}", temp_dir.path());

        let config = LedgerConfig {
            session_store_path: temp_dir.path().join("session.json"),
            ..LedgerConfig::default()
        };
        let store = SessionStore::new(Arc::new(FileStore::with_path(
            config.session_store_path.clone(),
        )));

        let wallet = Arc::new(MockWallet::new(account, config.contract_address.clone()));
        let provider: Option<Arc<dyn WalletProvider>> = if with_provider {
            Some(wallet.clone() as Arc<dyn WalletProvider>)
        } else {
            None
        };

        let session = Arc::new(WalletSession::new(provider, store.clone(), config));
        let client = LedgerClient::new(session.clone());
        let dispatcher = Arc::new(ActionDispatcher::new(client.clone()));

        Ok(Self {
            temp_dir,
            store,
            wallet,
            session,
            client,
            dispatcher,
        })
    }

    pub fn ledger(&self) -> &Arc<MockLedgerBackend> {
        &self.wallet.ledger
    }

    pub fn persisted(&self) -> PersistedConnection {
        self.store.load().expect("readable session store")
    }

    /// Connected session for the wallet's current account
    pub async fn connected() -> anyhow::Result<Self> {
        let env = Self::new()?;
        env.session.connect().await?;
        Ok(env)
    }
}
