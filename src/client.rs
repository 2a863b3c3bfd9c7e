//! Ledger Client - typed facade over the payment contract
//!
//! Every call takes the session's current handle, so nothing can reach the
//! ledger while disconnected. Results are only returned if the session that
//! issued the call is still the current one.

use std::sync::Arc;

use crate::account::Account;
use crate::amount::Amount;
use crate::error::{LedgerFault, PayError};
use crate::provider::{TxHash, TxReceipt};
use crate::session::{LedgerHandle, WalletSession};
use crate::transaction::Transaction;
use crate::Result;

#[derive(Clone)]
pub struct LedgerClient {
    session: Arc<WalletSession>,
}

impl LedgerClient {
    pub fn new(session: Arc<WalletSession>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<WalletSession> {
        &self.session
    }

    /// Balance of the connected account
    pub async fn get_balance(&self) -> Result<Amount> {
        let handle = self.handle()?;
        let balance = handle.contract().get_balance().await;
        let balance = self.settle(&handle, balance.map_err(PayError::from))?;
        log::debug!("Balance for {}: {} ETH", handle.account(), balance);
        Ok(balance)
    }

    /// Full transaction history in ledger order
    pub async fn fetch_history(&self) -> Result<Vec<Transaction>> {
        let handle = self.handle()?;
        let records = handle.contract().get_transaction_history().await;
        let transactions = records.and_then(|records| {
            records
                .into_iter()
                .map(Transaction::try_from)
                .collect::<std::result::Result<Vec<_>, LedgerFault>>()
        });
        let transactions = self.settle(&handle, transactions.map_err(PayError::from))?;
        log::debug!("Fetched {} transactions for {}", transactions.len(), handle.account());
        Ok(transactions)
    }

    /// Fetch the history and store it in the session cache
    ///
    /// Returns the number of cached transactions. A fetch that completes after
    /// the session changed is discarded.
    pub async fn sync_history(&self) -> Result<usize> {
        let handle = self.handle()?;
        let transactions = self.fetch_history().await?;
        self.session.apply_history(handle.epoch(), transactions)
    }

    pub async fn deposit(&self, amount: &str) -> Result<TxReceipt> {
        let handle = self.handle()?;
        let amount = positive_amount(amount)?;

        log::info!("Depositing {} ETH from {}", amount, handle.account());
        let submitted = handle.contract().deposit(amount).await;
        self.confirm(&handle, submitted, "deposit").await
    }

    pub async fn withdraw(&self, amount: &str) -> Result<TxReceipt> {
        let handle = self.handle()?;
        let amount = positive_amount(amount)?;

        log::info!("Withdrawing {} ETH to {}", amount, handle.account());
        let submitted = handle.contract().withdraw(amount).await;
        self.confirm(&handle, submitted, "withdraw").await
    }

    pub async fn send(&self, recipient: &str, amount: &str) -> Result<TxReceipt> {
        let handle = self.handle()?;
        let recipient = recipient.trim();
        if recipient.is_empty() {
            return Err(PayError::RecipientRequired);
        }
        let recipient = Account::parse(recipient)?;
        let amount = positive_amount(amount)?;

        log::info!("Sending {} ETH from {} to {}", amount, handle.account(), recipient);
        let submitted = handle.contract().send_payment(&recipient, amount).await;
        self.confirm(&handle, submitted, "send").await
    }

    /// Wait for a submitted transaction to be mined
    async fn confirm(
        &self,
        handle: &LedgerHandle,
        submitted: std::result::Result<TxHash, LedgerFault>,
        operation: &str,
    ) -> Result<TxReceipt> {
        let tx_hash = match submitted {
            Ok(tx_hash) => tx_hash,
            Err(fault) => {
                log::warn!("Ledger rejected {}: {}", operation, fault);
                return self.settle(handle, Err(fault.into()));
            }
        };
        log::debug!("{} submitted as {}, waiting for receipt", operation, tx_hash);

        let receipt = match handle.contract().wait_for_receipt(&tx_hash).await {
            Ok(receipt) if receipt.success => Ok(receipt),
            Ok(receipt) => {
                log::warn!("{} {} reverted in block {}", operation, tx_hash, receipt.block_number);
                Err(LedgerFault::Reverted(format!("transaction {} reverted", tx_hash)).into())
            }
            Err(fault) => {
                log::warn!("Waiting for {} {} failed: {}", operation, tx_hash, fault);
                Err(fault.into())
            }
        };

        let receipt = self.settle(handle, receipt)?;
        log::info!("{} {} confirmed in block {}", operation, tx_hash, receipt.block_number);
        Ok(receipt)
    }

    fn handle(&self) -> Result<LedgerHandle> {
        self.session.handle().ok_or(PayError::NotConnected)
    }

    /// Pass `result` through only if `handle`'s session is still current
    fn settle<T>(&self, handle: &LedgerHandle, result: Result<T>) -> Result<T> {
        if self.session.is_current(handle.epoch()) {
            result
        } else {
            log::info!(
                "Discarding ledger result for {}: session changed while the call was outstanding",
                handle.account()
            );
            Err(PayError::SessionChanged)
        }
    }
}

/// Parse a user-entered amount that must be greater than zero
pub fn positive_amount(text: &str) -> Result<Amount> {
    let amount = Amount::parse(text)?;
    if amount.is_zero() {
        return Err(PayError::invalid_amount("amount must be greater than zero"));
    }
    Ok(amount)
}
