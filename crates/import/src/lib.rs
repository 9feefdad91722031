macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static regex::Regex {
            static R: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
            R.get_or_init(|| regex::Regex::new($pat).expect("invalid regex"))
        }
    };
}

pub mod delimited;
pub mod dispatch;
pub mod document;
pub mod error;
pub mod extract;
pub mod ofx;
pub mod rules;
pub(crate) mod util;

pub use delimited::{AlfabankCsv, TinkoffCsv};
pub use dispatch::{Family, Importer, Statement, StatementParser};
pub use document::{RaiffeisenStatement, SberbankStatement};
pub use error::ImportError;
pub use extract::{default_extractor, ExtractError, StaticText, TextExtractor, Unavailable};
pub use ofx::TinkoffOfx;
pub use rules::{categorize, Categorized};
