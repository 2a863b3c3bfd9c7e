//! Transaction Ledger Cache - Filtered History View
//!
//! Holds the last history fetched from the ledger and the filtered view shown
//! to the user. The view is rebuilt from scratch whenever the transactions or
//! the filter change, so it never drifts from `all`.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};

use crate::display::{export_file_name, Labels};
use crate::error::StorageError;
use crate::transaction::Transaction;

/// History filter; empty fields impose no constraint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    /// Matched case-insensitively against sender and recipient
    pub address: String,
    /// Inclusive, from 00:00:00 UTC
    pub start_date: Option<NaiveDate>,
    /// Inclusive, through 23:59:59.999 UTC
    pub end_date: Option<NaiveDate>,
}

impl TransactionFilter {
    pub fn by_address(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Default::default()
        }
    }

    pub fn between(start_date: Option<NaiveDate>, end_date: Option<NaiveDate>) -> Self {
        Self {
            start_date,
            end_date,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.address.trim().is_empty() && self.start_date.is_none() && self.end_date.is_none()
    }

    fn compile(&self) -> CompiledFilter {
        let needle = self.address.trim().to_lowercase();
        CompiledFilter {
            needle: (!needle.is_empty()).then_some(needle),
            start: self
                .start_date
                .map(|d| d.and_time(NaiveTime::MIN).and_utc()),
            end: self.end_date.map(|d| {
                d.and_hms_milli_opt(23, 59, 59, 999)
                    .unwrap_or_else(|| d.and_time(NaiveTime::MIN))
                    .and_utc()
            }),
        }
    }
}

struct CompiledFilter {
    needle: Option<String>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

impl CompiledFilter {
    fn matches(&self, tx: &Transaction) -> bool {
        if let Some(needle) = &self.needle {
            if !tx.sender.contains(needle) && !tx.recipient.contains(needle) {
                return false;
            }
        }
        if let Some(start) = self.start {
            if tx.occurred_at < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if tx.occurred_at > end {
                return false;
            }
        }
        true
    }
}

/// Cached ledger history plus its filtered view
#[derive(Debug, Default)]
pub struct TransactionLedgerCache {
    all: Vec<Transaction>,
    filter: TransactionFilter,
    view: Vec<Transaction>,
}

impl TransactionLedgerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached history with a fresh fetch
    pub fn replace_all(&mut self, transactions: Vec<Transaction>) {
        log::debug!("History cache: replacing {} with {} transactions", self.all.len(), transactions.len());
        self.all = transactions;
        self.recompute();
    }

    pub fn set_filter(&mut self, filter: TransactionFilter) {
        self.filter = filter;
        self.recompute();
    }

    /// Drop the cached history, keeping the filter
    pub fn clear(&mut self) {
        if !self.all.is_empty() {
            log::debug!("History cache: clearing {} transactions", self.all.len());
        }
        self.all.clear();
        self.recompute();
    }

    pub fn all(&self) -> &[Transaction] {
        &self.all
    }

    pub fn view(&self) -> &[Transaction] {
        &self.view
    }

    pub fn filter(&self) -> &TransactionFilter {
        &self.filter
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    fn recompute(&mut self) {
        let compiled = self.filter.compile();
        self.view = self
            .all
            .iter()
            .filter(|tx| compiled.matches(tx))
            .cloned()
            .collect();
    }

    /// Serialize every cached transaction as CSV
    ///
    /// Exports the full history, not the filtered view.
    pub fn export_csv(&self, labels: &Labels) -> String {
        let header = [labels.date, labels.from, labels.to, labels.value, labels.status].join(",");

        let rows = self.all.iter().map(|tx| {
            [
                tx.occurred_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                tx.sender.to_string(),
                tx.recipient.to_string(),
                tx.amount.to_string(),
                labels.status_label(tx.completed).to_string(),
            ]
            .iter()
            .map(|field| csv_field(field))
            .collect::<Vec<_>>()
            .join(",")
        });

        std::iter::once(header)
            .chain(rows)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Write `export_csv` to `dir/transactions-<date>.csv`
    pub fn export_to_dir(
        &self,
        dir: &Path,
        date: NaiveDate,
        labels: &Labels,
    ) -> Result<PathBuf, StorageError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(export_file_name(date));
        fs::write(&path, self.export_csv(labels))?;
        log::info!("Exported {} transactions to {}", self.all.len(), path.display());
        Ok(path)
    }
}

fn csv_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
