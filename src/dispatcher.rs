//! Action Dispatcher - one mutating ledger call at a time
//!
//! A dispatched action is `Pending` until the ledger confirms or rejects it;
//! a second action is refused with `ActionInProgress` instead of being
//! queued. The dispatcher never refetches balance or history itself.

use std::sync::{Mutex, MutexGuard};

use crate::client::LedgerClient;
use crate::error::PayError;
use crate::provider::TxReceipt;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Send,
    Deposit,
    Withdraw,
}

/// User-initiated mutation, with the amount as typed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Send { recipient: String, amount: String },
    Deposit { amount: String },
    Withdraw { amount: String },
}

impl Action {
    pub fn send(recipient: impl Into<String>, amount: impl Into<String>) -> Self {
        Self::Send {
            recipient: recipient.into(),
            amount: amount.into(),
        }
    }

    pub fn deposit(amount: impl Into<String>) -> Self {
        Self::Deposit {
            amount: amount.into(),
        }
    }

    pub fn withdraw(amount: impl Into<String>) -> Self {
        Self::Withdraw {
            amount: amount.into(),
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Send { .. } => ActionKind::Send,
            Self::Deposit { .. } => ActionKind::Deposit,
            Self::Withdraw { .. } => ActionKind::Withdraw,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Pending,
    Succeeded(TxReceipt),
    Failed(String),
}

/// A dispatched action and what became of it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAction {
    pub id: u64,
    pub action: Action,
    /// Session epoch the action was dispatched under
    pub epoch: u64,
    pub outcome: ActionOutcome,
}

#[derive(Default)]
struct Slots {
    in_flight: Option<PendingAction>,
    last: Option<PendingAction>,
    next_id: u64,
}

pub struct ActionDispatcher {
    client: LedgerClient,
    slots: Mutex<Slots>,
}

impl ActionDispatcher {
    pub fn new(client: LedgerClient) -> Self {
        Self {
            client,
            slots: Mutex::new(Slots::default()),
        }
    }

    pub fn client(&self) -> &LedgerClient {
        &self.client
    }

    /// Submit `action` unless another one is still pending
    pub async fn dispatch(&self, action: Action) -> Result<TxReceipt> {
        let id = self.claim(&action)?;
        let mut slot = SlotGuard {
            dispatcher: self,
            id,
            settled: false,
        };

        let result = match &action {
            Action::Send { recipient, amount } => self.client.send(recipient, amount).await,
            Action::Deposit { amount } => self.client.deposit(amount).await,
            Action::Withdraw { amount } => self.client.withdraw(amount).await,
        };

        match &result {
            Err(e) if e.is_validation() => {
                log::debug!("Action #{} refused before submission: {}", id, e)
            }
            Err(e) => log::warn!("Action #{} failed: {}", id, e),
            Ok(_) => {}
        }
        slot.settle(match &result {
            Ok(receipt) => ActionOutcome::Succeeded(receipt.clone()),
            Err(e) => ActionOutcome::Failed(e.to_string()),
        });
        result
    }

    /// The action currently awaiting the ledger, if any
    pub fn pending(&self) -> Option<PendingAction> {
        self.slots().in_flight.clone()
    }

    pub fn is_busy(&self) -> bool {
        match &self.slots().in_flight {
            Some(pending) => self.client.session().is_current(pending.epoch),
            None => false,
        }
    }

    /// The most recently finished action
    pub fn last_outcome(&self) -> Option<PendingAction> {
        self.slots().last.clone()
    }

    fn claim(&self, action: &Action) -> Result<u64> {
        let session = self.client.session();
        let mut slots = self.slots();

        if let Some(pending) = &slots.in_flight {
            if session.is_current(pending.epoch) {
                log::warn!(
                    "Rejecting {:?}: {:?} #{} is still pending",
                    action.kind(),
                    pending.action.kind(),
                    pending.id
                );
                return Err(PayError::ActionInProgress);
            }
            log::debug!("Releasing action #{} left over from epoch {}", pending.id, pending.epoch);
        }

        slots.next_id += 1;
        let id = slots.next_id;
        slots.in_flight = Some(PendingAction {
            id,
            action: action.clone(),
            epoch: session.snapshot().epoch,
            outcome: ActionOutcome::Pending,
        });
        log::debug!("Dispatching {:?} as action #{}", action.kind(), id);
        Ok(id)
    }

    fn release(&self, id: u64, outcome: ActionOutcome) {
        let mut slots = self.slots();
        // A leftover slot may already have been replaced by a newer action
        if slots.in_flight.as_ref().map(|p| p.id) != Some(id) {
            return;
        }
        if let Some(mut finished) = slots.in_flight.take() {
            log::debug!("Action #{} finished: {:?}", id, outcome);
            finished.outcome = outcome;
            slots.last = Some(finished);
        }
    }

    fn slots(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Frees the in-flight slot even if the dispatch future is dropped
struct SlotGuard<'a> {
    dispatcher: &'a ActionDispatcher,
    id: u64,
    settled: bool,
}

impl SlotGuard<'_> {
    fn settle(&mut self, outcome: ActionOutcome) {
        self.settled = true;
        self.dispatcher.release(self.id, outcome);
    }
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.dispatcher
                .release(self.id, ActionOutcome::Failed("dispatch cancelled".to_string()));
        }
    }
}
