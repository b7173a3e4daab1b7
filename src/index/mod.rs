// Index module
// Exact nearest-neighbour search over the embedded passages of one document

pub mod store;

#[cfg(test)]
mod tests;

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::corpus::{DocumentId, Passage};

pub use store::{IndexStore, SharedIndex};

/// Version written to and accepted from index files
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Embedding dimension {actual} does not match index dimension {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("Embedding is empty")]
    EmptyEmbedding,
    #[error("Passage ordinal {ordinal} does not follow {previous}")]
    OrdinalOrder { previous: u32, ordinal: u32 },
    #[error("Passage belongs to {actual}, not {expected}")]
    ForeignPassage {
        expected: DocumentId,
        actual: DocumentId,
    },
    #[error("Unsupported index format version {0} (expected {FORMAT_VERSION})")]
    UnsupportedVersion(u32),
    #[error("Index file is for {actual}, not {expected}")]
    DocumentMismatch {
        expected: DocumentId,
        actual: DocumentId,
    },
    #[error("No index stored for {0}")]
    NotFound(DocumentId),
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Index serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Distance used to rank passages; smaller is more similar
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// `1 - cos(a, b)`; a zero vector is at distance 1 from everything
    #[default]
    Cosine,
    Euclidean,
}

impl DistanceMetric {
    #[inline]
    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::Cosine => {
                let mut dot = 0.0_f32;
                let mut norm_a = 0.0_f32;
                let mut norm_b = 0.0_f32;
                for (x, y) in a.iter().zip(b) {
                    dot += x * y;
                    norm_a += x * x;
                    norm_b += y * y;
                }
                if norm_a == 0.0 || norm_b == 0.0 {
                    return 1.0;
                }
                1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
            }
            Self::Euclidean => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>()
                .sqrt(),
        }
    }
}

impl fmt::Display for DistanceMetric {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cosine => f.write_str("cosine"),
            Self::Euclidean => f.write_str("euclidean"),
        }
    }
}

/// Identity of an index: what was embedded, with which model, and when
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexHeader {
    pub format_version: u32,
    pub document_id: DocumentId,
    /// Embedding model identifier, `<provider>:<model>`
    pub model: String,
    /// Length of every embedding; 0 until the first insert
    pub dimension: usize,
    pub metric: DistanceMetric,
    pub created_at: DateTime<Utc>,
    pub build_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub passage: Passage,
    pub embedding: Vec<f32>,
}

/// A retrieved passage with its distance to the query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPassage {
    pub passage: Passage,
    pub distance: f32,
}

/// Passages of one document with their embeddings, searched exhaustively
///
/// Built only through [`VectorIndex::insert`] or [`VectorIndex::from_parts`], so every
/// instance satisfies the dimension and ordinal checks.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    header: IndexHeader,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    #[inline]
    pub fn new(document_id: DocumentId, model: impl Into<String>, metric: DistanceMetric) -> Self {
        Self {
            header: IndexHeader {
                format_version: FORMAT_VERSION,
                document_id,
                model: model.into(),
                dimension: 0,
                metric,
                created_at: Utc::now(),
                build_id: Uuid::new_v4(),
            },
            entries: Vec::new(),
        }
    }

    /// Rebuild an index from persisted parts, checking every entry
    #[inline]
    pub fn from_parts(header: IndexHeader, entries: Vec<IndexEntry>) -> Result<Self, IndexError> {
        if header.format_version != FORMAT_VERSION {
            return Err(IndexError::UnsupportedVersion(header.format_version));
        }
        let dimension = header.dimension;
        let mut index = Self {
            header,
            entries: Vec::with_capacity(entries.len()),
        };
        for entry in entries {
            if entry.embedding.len() != dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: dimension,
                    actual: entry.embedding.len(),
                });
            }
            index.insert(entry.passage, entry.embedding)?;
        }
        Ok(index)
    }

    /// Append a passage; its embedding must match the index dimension and its
    /// ordinal must follow the last one
    #[inline]
    pub fn insert(&mut self, passage: Passage, embedding: Vec<f32>) -> Result<(), IndexError> {
        if embedding.is_empty() {
            return Err(IndexError::EmptyEmbedding);
        }
        if passage.source_document_id != self.header.document_id {
            return Err(IndexError::ForeignPassage {
                expected: self.header.document_id.clone(),
                actual: passage.source_document_id,
            });
        }
        if self.header.dimension == 0 {
            self.header.dimension = embedding.len();
        } else if embedding.len() != self.header.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.header.dimension,
                actual: embedding.len(),
            });
        }
        if let Some(last) = self.entries.last() {
            if passage.ordinal <= last.passage.ordinal {
                return Err(IndexError::OrdinalOrder {
                    previous: last.passage.ordinal,
                    ordinal: passage.ordinal,
                });
            }
        }

        self.entries.push(IndexEntry { passage, embedding });
        Ok(())
    }

    /// The `min(k, len)` passages closest to `query`, nearest first
    ///
    /// Equal distances are ordered by ascending ordinal.
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredPassage>, IndexError> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.header.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.header.dimension,
                actual: query.len(),
            });
        }

        let metric = self.header.metric;
        let mut scored: Vec<(f32, &IndexEntry)> = self
            .entries
            .iter()
            .map(|entry| (metric.distance(query, &entry.embedding), entry))
            .collect();
        scored.sort_by(|(da, a), (db, b)| {
            da.total_cmp(db)
                .then_with(|| a.passage.ordinal.cmp(&b.passage.ordinal))
        });

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(distance, entry)| ScoredPassage {
                passage: entry.passage.clone(),
                distance,
            })
            .collect())
    }

    #[inline]
    pub fn header(&self) -> &IndexHeader {
        &self.header
    }

    #[inline]
    pub fn document_id(&self) -> &DocumentId {
        &self.header.document_id
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.header.model
    }

    #[inline]
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    #[inline]
    pub fn passages(&self) -> impl Iterator<Item = &Passage> {
        self.entries.iter().map(|entry| &entry.passage)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
