pub mod aggregate;
pub mod merge;
pub mod reversal;

pub use aggregate::{split_by_sign, Aggregator, CurrencyConverter, PassThrough, PivotTable};
pub use merge::{merge, MergeError, MergeOutcome};
pub use reversal::{remove_reversals, ReversalOutcome, ReversalPair, ReversalPolicy};
