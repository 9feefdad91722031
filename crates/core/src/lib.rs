pub mod hash;
pub mod money;
pub mod period;
pub mod serial;
pub mod transaction;

pub use money::Money;
pub use period::MonthKey;
pub use serial::{datetime_to_serial, serial_to_datetime};
pub use transaction::{normalize_currency, Bank, ModelError, Transaction, UNDETERMINED_CATEGORY};
