use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Document decode error: {0}")]
    Decode(String),
    #[error("PDF text backend not available, rebuild with the `pdf` feature")]
    NotAvailable,
}

/// Abstraction over a paginated-document text backend.
/// Implementations accept the raw document bytes and return its text as one linear stream.
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, document: &[u8]) -> Result<String, ExtractError>;
}

// ── Fixed-text backend (always available, used for tests) ────────────────────

/// Returns a pre-set string, so statement parsers can be driven by literal
/// text fixtures without a real document.
pub struct StaticText {
    pub text: String,
}

impl StaticText {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl TextExtractor for StaticText {
    fn extract_text(&self, _document: &[u8]) -> Result<String, ExtractError> {
        Ok(self.text.clone())
    }
}

/// Stand-in used when no document backend is compiled in.
pub struct Unavailable;

impl TextExtractor for Unavailable {
    fn extract_text(&self, _document: &[u8]) -> Result<String, ExtractError> {
        Err(ExtractError::NotAvailable)
    }
}

// ── pdf-extract backend (optional, gated behind `pdf` feature) ────────────────

#[cfg(feature = "pdf")]
pub mod pdf_backend {
    use super::{ExtractError, TextExtractor};

    pub struct PdfTextExtractor;

    impl TextExtractor for PdfTextExtractor {
        fn extract_text(&self, document: &[u8]) -> Result<String, ExtractError> {
            pdf_extract::extract_text_from_mem(document)
                .map_err(|e| ExtractError::Decode(e.to_string()))
        }
    }
}

/// The best backend this build offers.
pub fn default_extractor() -> Box<dyn TextExtractor> {
    #[cfg(feature = "pdf")]
    {
        Box::new(pdf_backend::PdfTextExtractor)
    }
    #[cfg(not(feature = "pdf"))]
    {
        Box::new(Unavailable)
    }
}
