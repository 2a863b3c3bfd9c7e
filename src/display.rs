//! Localized labels and display helpers shared with the presentation layer
//!
//! The CSV export and the history table must agree on how statuses and the
//! connected account are shown, so those strings live here.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::account::Account;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Pt,
    En,
}

impl Locale {
    pub fn labels(&self) -> &'static Labels {
        match self {
            Locale::Pt => &PT,
            Locale::En => &EN,
        }
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pt" | "pt-br" => Ok(Locale::Pt),
            "en" | "en-us" => Ok(Locale::En),
            other => Err(format!("unknown locale '{}'", other)),
        }
    }
}

/// Strings used by the history table and CSV export
#[derive(Debug, PartialEq, Eq)]
pub struct Labels {
    pub date: &'static str,
    pub from: &'static str,
    pub to: &'static str,
    pub value: &'static str,
    pub status: &'static str,
    pub completed: &'static str,
    pub pending: &'static str,
    pub you: &'static str,
}

impl Labels {
    pub fn status_label(&self, completed: bool) -> &'static str {
        if completed {
            self.completed
        } else {
            self.pending
        }
    }
}

static PT: Labels = Labels {
    date: "Data",
    from: "De",
    to: "Para",
    value: "Valor (ETH)",
    status: "Status",
    completed: "Concluída",
    pending: "Pendente",
    you: "Você",
};

static EN: Labels = Labels {
    date: "Date",
    from: "From",
    to: "To",
    value: "Value (ETH)",
    status: "Status",
    completed: "Completed",
    pending: "Pending",
    you: "You",
};

/// Short form of `address`, or the "you" label for the connected account
///
/// `0x1234567890...` becomes `0x1234...` plus the last four hex digits.
pub fn display_address(address: &Account, me: Option<&Account>, labels: &Labels) -> String {
    if me == Some(address) {
        return labels.you.to_string();
    }
    let text = address.as_str();
    format!("{}...{}", &text[..6], &text[38..])
}

/// Payment request URI rendered as a QR code for `account`
pub fn payment_uri(account: &Account, amount: &str) -> String {
    let amount = amount.trim();
    let value = if amount.is_empty() { "0" } else { amount };
    format!("ethereum:{}?value={}", account, value)
}

/// File name for a CSV export made on `date`
pub fn export_file_name(date: NaiveDate) -> String {
    format!("transactions-{}.csv", date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Account {
        Account::parse("0x1234567890abcdef1234567890abcdef12345678").unwrap()
    }

    #[test]
    fn test_display_address_short_form() {
        let labels = Locale::En.labels();
        assert_eq!(display_address(&alice(), None, labels), "0x1234...5678");
    }

    #[test]
    fn test_display_address_you() {
        let me = alice();
        assert_eq!(display_address(&alice(), Some(&me), Locale::Pt.labels()), "Você");
        assert_eq!(display_address(&alice(), Some(&me), Locale::En.labels()), "You");
    }

    #[test]
    fn test_payment_uri() {
        assert_eq!(
            payment_uri(&alice(), "1.5"),
            "ethereum:0x1234567890abcdef1234567890abcdef12345678?value=1.5"
        );
        assert_eq!(
            payment_uri(&alice(), ""),
            "ethereum:0x1234567890abcdef1234567890abcdef12345678?value=0"
        );
    }

    #[test]
    fn test_export_file_name() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(export_file_name(date), "transactions-2024-03-09.csv");
    }

    #[test]
    fn test_locale_parse() {
        assert_eq!("EN".parse::<Locale>().unwrap(), Locale::En);
        assert_eq!("pt-BR".parse::<Locale>().unwrap(), Locale::Pt);
        assert!("fr".parse::<Locale>().is_err());
        assert_eq!(Locale::default().labels().completed, "Concluída");
    }
}
