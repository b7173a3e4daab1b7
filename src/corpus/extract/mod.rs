
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use super::Document;

/// Text of one page, or the reason it could not be read
pub type PageText = Result<String, ExtractionError>;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse PDF: {0}")]
    Pdf(String),
    #[error("Failed to extract page {page}: {message}")]
    Page { page: usize, message: String },
}

/// Converts a document into the ordered text of its pages
///
/// The outer error means the document could not be opened at all; a single
/// unreadable page is reported in place so the caller can skip it.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, document: &Document) -> Result<Vec<PageText>, ExtractionError>;
}

impl<T: TextExtractor + ?Sized> TextExtractor for Box<T> {
    #[inline]
    fn extract(&self, document: &Document) -> Result<Vec<PageText>, ExtractionError> {
        (**self).extract(document)
    }
}

/// PDF text extraction, one page at a time
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    #[inline]
    fn extract(&self, document: &Document) -> Result<Vec<PageText>, ExtractionError> {
        let pdf = lopdf::Document::load(document.path())
            .map_err(|e| ExtractionError::Pdf(e.to_string()))?;
        if pdf.is_encrypted() {
            return Err(ExtractionError::Pdf("document is encrypted".to_string()));
        }

        let pages: Vec<PageText> = pdf
            .get_pages()
            .keys()
            .map(|&number| {
                pdf.extract_text(&[number])
                    .map(|text| text.trim().to_string())
                    .map_err(|e| ExtractionError::Page {
                        page: number as usize,
                        message: e.to_string(),
                    })
            })
            .collect();

        debug!("Extracted {} PDF pages from {}", pages.len(), document.id);
        Ok(pages)
    }
}

/// Pre-extracted text with pages separated by form feeds, as `pdftotext` writes it
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl PlainTextExtractor {
    /// Split raw bytes into pages; pages that are not UTF-8 are reported individually
    #[inline]
    pub fn split_pages(bytes: &[u8]) -> Vec<PageText> {
        let mut raw_pages: Vec<&[u8]> = bytes.split(|&b| b == b'\x0c').collect();
        // A trailing form feed terminates the last page rather than starting a new one
        if raw_pages.len() > 1 && raw_pages.last().is_some_and(|page| page.is_empty()) {
            raw_pages.pop();
        }

        raw_pages
            .into_iter()
            .enumerate()
            .map(|(index, page)| {
                std::str::from_utf8(page)
                    .map(|text| text.trim().to_string())
                    .map_err(|e| ExtractionError::Page {
                        page: index + 1,
                        message: e.to_string(),
                    })
            })
            .collect()
    }
}

impl TextExtractor for PlainTextExtractor {
    #[inline]
    fn extract(&self, document: &Document) -> Result<Vec<PageText>, ExtractionError> {
        let bytes = fs::read(document.path()).map_err(|source| ExtractionError::Io {
            path: document.path().to_path_buf(),
            source,
        })?;
        if bytes.is_empty() {
            return Ok(Vec::new());
        }
        Ok(Self::split_pages(&bytes))
    }
}

/// Pick an extractor from the file extension: `.pdf` or plain text
#[inline]
pub fn extractor_for_path(path: &Path) -> Box<dyn TextExtractor> {
    let is_pdf = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if is_pdf {
        Box::new(PdfExtractor)
    } else {
        Box::new(PlainTextExtractor)
    }
}
