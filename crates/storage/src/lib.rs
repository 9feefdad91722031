pub mod history;

pub use history::{HistoryFile, StorageError};
