use std::fmt;
use std::path::{Path, PathBuf};

use tally_core::{Bank, Transaction};

use crate::delimited::{AlfabankCsv, TinkoffCsv};
use crate::document::{RaiffeisenStatement, SberbankStatement};
use crate::error::ImportError;
use crate::extract::{default_extractor, TextExtractor};
use crate::ofx::{self, TinkoffOfx};
use crate::util::decode_windows_1251;

/// A bank-specific statement parser working on already-decoded text.
pub trait StatementParser: Send + Sync {
    fn bank(&self) -> Bank;

    fn name(&self) -> &'static str;

    /// Whether this text looks like one of ours. Parsers of a family are asked in priority order.
    fn detect(&self, _text: &str) -> bool {
        true
    }

    fn parse(&self, text: &str) -> Result<Vec<Transaction>, ImportError>;
}

/// Container format, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Delimited,
    Document,
    Tagged,
}

impl Family {
    pub fn from_path(path: &Path) -> Result<Self, ImportError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => Ok(Family::Delimited),
            "pdf" => Ok(Family::Document),
            "ofx" => Ok(Family::Tagged),
            _ => Err(ImportError::UnrecognizedFormat(
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string()),
            )),
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Family::Delimited => "CSV",
            Family::Document => "PDF",
            Family::Tagged => "OFX",
        })
    }
}

/// One imported file.
#[derive(Debug, Clone)]
pub struct Statement {
    pub path: PathBuf,
    pub bank: Bank,
    pub transactions: Vec<Transaction>,
}

/// Routes files to the right parser: extension picks the family, content picks the bank.
pub struct Importer {
    extractor: Box<dyn TextExtractor>,
    parsers: Vec<(Family, Box<dyn StatementParser>)>,
}

impl Default for Importer {
    fn default() -> Self {
        Self::new(default_extractor())
    }
}

impl Importer {
    pub fn new(extractor: Box<dyn TextExtractor>) -> Self {
        let parsers: Vec<(Family, Box<dyn StatementParser>)> = vec![
            (Family::Delimited, Box::new(TinkoffCsv)),
            (Family::Delimited, Box::new(AlfabankCsv)),
            (Family::Document, Box::new(RaiffeisenStatement)),
            (Family::Document, Box::new(SberbankStatement)),
            (Family::Tagged, Box::new(TinkoffOfx)),
        ];
        Self { extractor, parsers }
    }

    fn decode(&self, family: Family, data: &[u8]) -> Result<String, ImportError> {
        match family {
            Family::Delimited => Ok(decode_windows_1251(data)),
            Family::Document => Ok(self.extractor.extract_text(data)?),
            Family::Tagged => Ok(ofx::decode(data)),
        }
    }

    fn select(&self, family: Family, text: &str) -> Result<&dyn StatementParser, ImportError> {
        self.parsers
            .iter()
            .filter(|(f, _)| *f == family)
            .map(|(_, p)| p.as_ref())
            .find(|p| p.detect(text))
            .ok_or(ImportError::UnknownVariant(family))
    }

    /// Parses an in-memory file; `path` only supplies the extension and the label.
    pub fn import_bytes(&self, path: &Path, data: &[u8]) -> Result<Statement, ImportError> {
        let family = Family::from_path(path)?;
        let text = self.decode(family, data)?;
        let parser = self.select(family, &text)?;
        tracing::info!("{}: detected {} statement", path.display(), parser.name());

        let transactions = parser.parse(&text)?;
        tracing::info!(
            "{}: {} transactions from {}",
            path.display(),
            transactions.len(),
            parser.bank()
        );
        Ok(Statement {
            path: path.to_path_buf(),
            bank: parser.bank(),
            transactions,
        })
    }

    pub async fn import_file(&self, path: &Path) -> Result<Statement, ImportError> {
        // Reject unsupported extensions before touching the disk.
        Family::from_path(path)?;
        let data = tokio::fs::read(path).await.map_err(|source| ImportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.import_bytes(path, &data)
    }
}
