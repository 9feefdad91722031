//! Removal of charge/refund pairs inside a single imported batch.

use serde::Serialize;
use tally_core::Transaction;
use tracing::{debug, info};

/// What two transactions must share to count as a charge and its reversal.
/// Amounts must always be exact negations with the same name and currency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReversalPolicy {
    /// Also require equal categories.
    pub match_category: bool,
}

impl ReversalPolicy {
    pub fn strict() -> Self {
        Self {
            match_category: true,
        }
    }

    fn reverses(&self, original: &Transaction, candidate: &Transaction) -> bool {
        candidate.amount == -original.amount
            && candidate.name == original.name
            && candidate.currency == original.currency
            && (!self.match_category || candidate.category == original.category)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReversalPair {
    pub original: Transaction,
    pub reversal: Transaction,
}

impl ReversalPair {
    fn contains(&self, tx: &Transaction) -> bool {
        self.original == *tx || self.reversal == *tx
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReversalOutcome {
    pub kept: Vec<Transaction>,
    pub removed_pairs: Vec<ReversalPair>,
}

/// Removes charge/refund pairs from one batch.
///
/// Every transaction in turn is paired with the first later transaction that reverses
/// it and has not yet been taken as the second half of a pair. A second half can still
/// open a pair of its own with a later transaction. The result drops every transaction
/// equal in value to a member of any removed pair.
pub fn remove_reversals(batch: Vec<Transaction>, policy: ReversalPolicy) -> ReversalOutcome {
    // Second halves already taken.
    let mut claimed = vec![false; batch.len()];
    let mut removed_pairs = Vec::new();

    for i in 0..batch.len() {
        let partner = (i + 1..batch.len())
            .find(|&j| !claimed[j] && policy.reverses(&batch[i], &batch[j]));

        if let Some(j) = partner {
            claimed[j] = true;
            debug!(
                name = %batch[i].name,
                amount = %batch[i].amount,
                first = i,
                second = j,
                "reversal pair"
            );
            removed_pairs.push(ReversalPair {
                original: batch[i].clone(),
                reversal: batch[j].clone(),
            });
        }
    }

    let kept: Vec<Transaction> = batch
        .into_iter()
        .filter(|tx| !removed_pairs.iter().any(|pair| pair.contains(tx)))
        .collect();

    if !removed_pairs.is_empty() {
        info!(
            "Removed {} reversal pairs, {} transactions kept",
            removed_pairs.len(),
            kept.len()
        );
    }

    ReversalOutcome {
        kept,
        removed_pairs,
    }
}
