//! Transfers recorded by the ledger

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::account::Account;
use crate::amount::Amount;
use crate::error::LedgerFault;
use crate::provider::LedgerRecord;

/// A transfer as reported by the ledger, never modified locally
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: Account,
    pub recipient: Account,
    pub amount: Amount,
    pub occurred_at: DateTime<Utc>,
    pub completed: bool,
}

impl TryFrom<LedgerRecord> for Transaction {
    type Error = LedgerFault;

    fn try_from(record: LedgerRecord) -> Result<Self, Self::Error> {
        let sender = Account::parse(&record.sender)
            .map_err(|e| LedgerFault::Malformed(format!("sender: {}", e)))?;
        let recipient = Account::parse(&record.recipient)
            .map_err(|e| LedgerFault::Malformed(format!("recipient: {}", e)))?;
        let seconds = i64::try_from(record.timestamp)
            .map_err(|_| LedgerFault::Malformed(format!("timestamp {} out of range", record.timestamp)))?;
        let occurred_at = Utc
            .timestamp_opt(seconds, 0)
            .single()
            .ok_or_else(|| LedgerFault::Malformed(format!("timestamp {} out of range", record.timestamp)))?;

        Ok(Self {
            sender,
            recipient,
            amount: Amount::from_wei(record.amount),
            occurred_at,
            completed: record.completed,
        })
    }
}
