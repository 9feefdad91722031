use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tally_core::Transaction;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to read history {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("History {path} is not valid: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to write history {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("History {path}: entries {first} and {second} share hash {hash} but differ")]
    Invariant {
        path: PathBuf,
        hash: String,
        first: usize,
        second: usize,
    },
}

/// Transaction history persisted as one JSON array.
#[derive(Debug, Clone)]
pub struct HistoryFile {
    path: PathBuf,
}

impl HistoryFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is an empty history. Any other failure is returned.
    pub async fn load(&self) -> Result<Vec<Transaction>, StorageError> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!("No history at {}, starting empty", self.path.display());
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(StorageError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let history: Vec<Transaction> =
            serde_json::from_slice(&data).map_err(|source| StorageError::Corrupt {
                path: self.path.clone(),
                source,
            })?;
        self.check_hashes(&history)?;

        tracing::info!(
            "Loaded {} transactions from {}",
            history.len(),
            self.path.display()
        );
        Ok(history)
    }

    fn check_hashes(&self, history: &[Transaction]) -> Result<(), StorageError> {
        let mut seen: HashMap<&str, usize> = HashMap::new();
        for (idx, tx) in history.iter().enumerate() {
            let Some(hash) = tx.hash() else { continue };
            match seen.get(hash) {
                Some(&first) if !history[first].same_content(tx) => {
                    return Err(StorageError::Invariant {
                        path: self.path.clone(),
                        hash: hash.to_string(),
                        first,
                        second: idx,
                    });
                }
                Some(_) => {}
                None => {
                    seen.insert(hash, idx);
                }
            }
        }
        Ok(())
    }

    /// Writes through a sibling temp file so a failed save leaves the old history intact.
    pub async fn save(&self, history: &[Transaction]) -> Result<(), StorageError> {
        let write_err = |source: std::io::Error| StorageError::Write {
            path: self.path.clone(),
            source,
        };

        let json = serde_json::to_vec_pretty(history)
            .map_err(|e| write_err(std::io::Error::new(ErrorKind::InvalidData, e)))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, json).await.map_err(write_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(write_err)?;

        tracing::info!(
            "Saved {} transactions to {}",
            history.len(),
            self.path.display()
        );
        Ok(())
    }
}
