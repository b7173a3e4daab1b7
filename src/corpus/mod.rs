// Corpus module
// Offline pipeline turning a report into an index of embedded passages

pub mod builder;
pub mod cleaning;
pub mod extract;


use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;
use crate::embeddings::ChunkingError;
use crate::index::IndexError;

pub use builder::{BuildOutcome, BuildReport, CorpusBuilder};
pub use cleaning::{NoiseFilter, filter_margins};
pub use extract::{
    ExtractionError, PageText, PdfExtractor, PlainTextExtractor, TextExtractor,
    extractor_for_path,
};

/// Default pattern for running headers: a page-number line and the line after it
pub const DEFAULT_NOISE_PATTERN: &str = r"(?m)^[ \t]*\d+[ \t]*\n[^\n]*\n";

#[derive(Debug, Error)]
#[error("Invalid document identifier: {0:?}")]
pub struct InvalidDocumentId(pub String);

/// Stable key of a source document, used to name its persisted index
///
/// Identifiers are lowercase and limited to `[a-z0-9_-]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Normalize `raw` into an identifier
    ///
    /// Characters outside `[a-z0-9_-]` become `-` and leading or trailing `-`
    /// are dropped.
    #[inline]
    pub fn new(raw: &str) -> Result<Self, InvalidDocumentId> {
        let normalized: String = raw
            .trim()
            .chars()
            .map(|c| {
                let c = c.to_ascii_lowercase();
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '-'
                }
            })
            .collect();
        let normalized = normalized.trim_matches('-');

        if normalized.is_empty() {
            return Err(InvalidDocumentId(raw.to_string()));
        }
        Ok(Self(normalized.to_string()))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The source report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: DocumentId,
    pub path: PathBuf,
}

impl Document {
    /// Identify the document by its file stem
    #[inline]
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self, InvalidDocumentId> {
        let path = path.into();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            id: DocumentId::new(&stem)?,
            path,
        })
    }

    #[inline]
    pub fn with_id(id: DocumentId, path: impl Into<PathBuf>) -> Self {
        Self {
            id,
            path: path.into(),
        }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A chunk of document text stored for retrieval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passage {
    pub text: String,
    pub source_document_id: DocumentId,
    /// Position within the document; unique and increasing
    pub ordinal: u32,
    pub token_count: u32,
}

/// Page margins and noise patterns applied before chunking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CorpusConfig {
    /// Leading pages dropped as cover material
    pub skip_leading_pages: usize,
    /// Trailing pages dropped as appendix material
    pub skip_trailing_pages: usize,
    /// Regular expressions whose matches are deleted from every page
    pub noise_patterns: Vec<String>,
}

impl Default for CorpusConfig {
    #[inline]
    fn default() -> Self {
        Self {
            skip_leading_pages: 5,
            skip_trailing_pages: 5,
            noise_patterns: vec![DEFAULT_NOISE_PATTERN.to_string()],
        }
    }
}

impl CorpusConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        NoiseFilter::new(&self.noise_patterns)
            .map(|_| ())
            .map_err(|e| ConfigError::InvalidNoisePattern(e.pattern, e.message))
    }
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Failed to extract {document}: {source}")]
    Extraction {
        document: DocumentId,
        #[source]
        source: ExtractionError,
    },
    #[error("Invalid chunking parameters: {0}")]
    Chunking(#[from] ChunkingError),
    #[error("Invalid noise pattern {pattern:?}: {message}")]
    NoisePattern { pattern: String, message: String },
    #[error("Failed to persist index: {0}")]
    Persist(#[from] IndexError),
}

impl From<cleaning::NoisePatternError> for BuildError {
    #[inline]
    fn from(error: cleaning::NoisePatternError) -> Self {
        Self::NoisePattern {
            pattern: error.pattern,
            message: error.message,
        }
    }
}
