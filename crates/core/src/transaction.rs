use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::hash::FieldDigest;
use super::money::Money;
use super::period::MonthKey;

/// Category assigned when the source has no category and no name rule applies.
pub const UNDETERMINED_CATEGORY: &str = "Не определено";

/// Institution whose export produced a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bank {
    Tinkoff,
    Alfabank,
    Sberbank,
    Raiffeisen,
}

impl Bank {
    pub fn as_str(self) -> &'static str {
        match self {
            Bank::Tinkoff => "tinkoff",
            Bank::Alfabank => "alfabank",
            Bank::Sberbank => "sberbank",
            Bank::Raiffeisen => "raiffeisen",
        }
    }
}

impl fmt::Display for Bank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}


/// Normalizes a source currency code: trimmed, upper-case, legacy aliases mapped.
pub fn normalize_currency(code: &str) -> String {
    let code = code.trim().to_uppercase();
    match code.as_str() {
        "RUR" => "RUB".to_string(),
        _ => code,
    }
}

#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("dateKey {date_key} does not match date {date}")]
    DateKeyMismatch {
        date_key: String,
        date: NaiveDateTime,
    },
}

/// Canonical transaction every adapter converges to.
///
/// `date_key` is derived from `date` rather than stored, so the two cannot drift.
/// The content hash is absent until [`Transaction::hashed`] is called by the merge stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "TransactionRecord", try_from = "TransactionRecord")]
pub struct Transaction {
    pub date: NaiveDateTime,
    pub amount: Money,
    pub currency: String,
    pub name: String,
    pub category: String,
    pub bank: Bank,
    hash: Option<String>,
}

impl Transaction {
    pub fn new(
        date: NaiveDateTime,
        amount: Money,
        currency: &str,
        name: impl Into<String>,
        category: impl Into<String>,
        bank: Bank,
    ) -> Self {
        let category = category.into();
        let category = if category.trim().is_empty() {
            UNDETERMINED_CATEGORY.to_string()
        } else {
            category
        };
        Transaction {
            date,
            amount,
            currency: normalize_currency(currency),
            name: name.into(),
            category,
            bank,
            hash: None,
        }
    }

    pub fn date_key(&self) -> MonthKey {
        MonthKey::of(&self.date)
    }

    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    /// Deterministic fingerprint over every field except the hash itself.
    pub fn content_hash(&self) -> String {
        FieldDigest::new()
            .field("date", self.date.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
            .field("dateKey", self.date_key().to_string())
            .field("amount", self.amount.canonical())
            .field("currency", self.currency.as_str())
            .field("name", self.name.as_str())
            .field("category", self.category.as_str())
            .field("bank", self.bank.as_str())
            .finish()
    }

    /// Returns the transaction with its content hash attached. Idempotent.
    pub fn hashed(mut self) -> Self {
        if self.hash.is_none() {
            self.hash = Some(self.content_hash());
        }
        self
    }

    /// Equality of everything except the hash.
    pub fn same_content(&self, other: &Transaction) -> bool {
        self.date == other.date
            && self.amount == other.amount
            && self.currency == other.currency
            && self.name == other.name
            && self.category == other.category
            && self.bank == other.bank
    }

    pub fn is_income(&self) -> bool {
        self.amount.is_credit()
    }

    pub fn is_expense(&self) -> bool {
        self.amount.is_debit()
    }
}

/// Wire form used for persisted history; carries the derived `dateKey`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionRecord {
    date: NaiveDateTime,
    date_key: MonthKey,
    amount: Money,
    currency: String,
    name: String,
    category: String,
    bank: Bank,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hash: Option<String>,
}

impl From<Transaction> for TransactionRecord {
    fn from(tx: Transaction) -> Self {
        TransactionRecord {
            date_key: tx.date_key(),
            date: tx.date,
            amount: tx.amount,
            currency: tx.currency,
            name: tx.name,
            category: tx.category,
            bank: tx.bank,
            hash: tx.hash,
        }
    }
}

impl TryFrom<TransactionRecord> for Transaction {
    type Error = ModelError;

    fn try_from(record: TransactionRecord) -> Result<Self, Self::Error> {
        if record.date_key != MonthKey::of(&record.date) {
            return Err(ModelError::DateKeyMismatch {
                date_key: record.date_key.to_string(),
                date: record.date,
            });
        }
        Ok(Transaction {
            date: record.date,
            amount: record.amount,
            currency: record.currency,
            name: record.name,
            category: record.category,
            bank: record.bank,
            hash: record.hash,
        })
    }
}
