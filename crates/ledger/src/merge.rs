use std::collections::HashMap;

use tally_core::Transaction;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("Hash collision on {hash}: history has {existing:?}, incoming is {incoming:?}")]
    HashCollision {
        hash: String,
        existing: Box<Transaction>,
        incoming: Box<Transaction>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub history: Vec<Transaction>,
    pub added: usize,
    pub skipped: usize,
}

fn hash_of(tx: &Transaction) -> String {
    tx.hash().map(str::to_string).unwrap_or_else(|| tx.content_hash())
}

/// Hash-keyed union of `history` and `batch`.
///
/// Every entry leaves with a hash. History entries are never replaced; an incoming
/// transaction is appended only when its hash is new. Merging the same batch twice
/// gives the same history as merging it once.
pub fn merge(history: Vec<Transaction>, batch: Vec<Transaction>) -> Result<MergeOutcome, MergeError> {
    let mut merged: Vec<Transaction> = Vec::with_capacity(history.len() + batch.len());
    let mut by_hash: HashMap<String, usize> = HashMap::new();

    for tx in history {
        let tx = tx.hashed();
        let hash = hash_of(&tx);
        if let Some(&idx) = by_hash.get(&hash) {
            check_same(&hash, &merged[idx], &tx)?;
        } else {
            by_hash.insert(hash, merged.len());
        }
        merged.push(tx);
    }

    let mut added = 0;
    let mut skipped = 0;
    for tx in batch {
        let tx = tx.hashed();
        let hash = hash_of(&tx);
        match by_hash.get(&hash) {
            Some(&idx) => {
                check_same(&hash, &merged[idx], &tx)?;
                skipped += 1;
            }
            None => {
                by_hash.insert(hash, merged.len());
                merged.push(tx);
                added += 1;
            }
        }
    }

    info!("Merged batch: {added} added, {skipped} already in history");
    Ok(MergeOutcome {
        history: merged,
        added,
        skipped,
    })
}

fn check_same(hash: &str, existing: &Transaction, incoming: &Transaction) -> Result<(), MergeError> {
    if existing.same_content(incoming) {
        Ok(())
    } else {
        Err(MergeError::HashCollision {
            hash: hash.to_string(),
            existing: Box::new(existing.clone()),
            incoming: Box::new(incoming.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tally_core::{Bank, Money};

    fn tx(day: u32, name: &str, amount: i64) -> Transaction {
        Transaction::new(
            NaiveDate::from_ymd_opt(2022, 2, day)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
            Money::from_units(amount),
            "RUB",
            name,
            "Покупки",
            Bank::Alfabank,
        )
    }

    #[test]
    fn merge_into_empty_history_hashes_everything() {
        let out = merge(Vec::new(), vec![tx(1, "A", -10), tx(2, "B", -20)]).unwrap();
        assert_eq!(out.added, 2);
        assert_eq!(out.skipped, 0);
        assert!(out.history.iter().all(|t| t.hash().is_some()));
    }

    #[test]
    fn merge_is_idempotent() {
        let history = vec![tx(1, "A", -10)];
        let batch = vec![tx(1, "A", -10), tx(2, "B", -20), tx(3, "C", 30)];

        let once = merge(history, batch.clone()).unwrap();
        assert_eq!(once.added, 2);
        assert_eq!(once.skipped, 1);

        let twice = merge(once.history.clone(), batch).unwrap();
        assert_eq!(twice.history, once.history);
        assert_eq!(twice.added, 0);
        assert_eq!(twice.skipped, 3);
    }

    #[test]
    fn history_entries_are_never_replaced() {
        let history = merge(Vec::new(), vec![tx(1, "A", -10)]).unwrap().history;
        let out = merge(history.clone(), vec![tx(1, "A", -10)]).unwrap();
        assert_eq!(out.history, history);
    }

    #[test]
    fn duplicates_within_batch_are_added_once() {
        let out = merge(Vec::new(), vec![tx(1, "A", -10), tx(1, "A", -10)]).unwrap();
        assert_eq!(out.history.len(), 1);
        assert_eq!(out.added, 1);
        assert_eq!(out.skipped, 1);
    }

    #[test]
    fn new_entries_follow_history_in_batch_order() {
        let out = merge(vec![tx(5, "H", -1)], vec![tx(2, "B", -2), tx(1, "A", -3)]).unwrap();
        let names: Vec<&str> = out.history.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["H", "B", "A"]);
    }

    #[test]
    fn stored_hash_with_different_content_is_a_collision() {
        // Simulate a history record whose stored hash no longer matches its content.
        let original = tx(1, "A", -10).hashed();
        let mut json = serde_json::to_value(&original).unwrap();
        json["name"] = "Tampered".into();
        let tampered: Transaction = serde_json::from_value(json).unwrap();
        assert_eq!(tampered.hash(), original.hash());

        let err = merge(vec![tampered], vec![tx(1, "A", -10)]).unwrap_err();
        match err {
            MergeError::HashCollision { hash, existing, incoming } => {
                assert_eq!(Some(hash.as_str()), original.hash());
                assert_eq!(existing.name, "Tampered");
                assert_eq!(incoming.name, "A");
            }
        }
    }
}
