#[cfg(test)]
mod tests;

use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use fancy_regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::ConfigError;

/// Boundaries tried when ending a character chunk, highest priority first
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

static WORD_TOKEN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+|[^\w\s]").expect("valid regex"));

/// A contiguous piece of the input text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// The chunk text, an exact slice of the input
    pub text: String,
    /// Position in the splitter's unit: characters or tokens
    pub units: Range<usize>,
}

impl TextChunk {
    /// Size of the chunk in the splitter's unit
    #[inline]
    pub fn unit_count(&self) -> usize {
        self.units.len()
    }
}

/// Configuration for the two chunking passes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Character budget of a first-pass chunk
    pub chunk_size: usize,
    /// Characters shared by adjacent first-pass chunks
    pub chunk_overlap: usize,
    /// Token budget of a final passage
    pub tokens_per_chunk: usize,
    /// Fraction of `tokens_per_chunk` shared by adjacent passages
    pub token_overlap_ratio: f32,
    /// Hugging Face `tokenizer.json` matching the embedding model
    pub tokenizer_path: Option<PathBuf>,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            tokens_per_chunk: 256,
            token_overlap_ratio: 0.2,
            tokenizer_path: None,
        }
    }
}

impl ChunkingConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(100..=8000).contains(&self.chunk_size) {
            return Err(ConfigError::InvalidChunkSize(self.chunk_size));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::OverlapTooLarge(
                self.chunk_overlap,
                self.chunk_size,
            ));
        }
        if !(16..=8192).contains(&self.tokens_per_chunk) {
            return Err(ConfigError::InvalidTokensPerChunk(self.tokens_per_chunk));
        }
        if !(0.0..=0.9).contains(&self.token_overlap_ratio) {
            return Err(ConfigError::InvalidTokenOverlapRatio(
                self.token_overlap_ratio,
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ChunkingError {
    #[error("Chunk size must be greater than zero")]
    ZeroBudget,
    #[error("Overlap ({overlap}) must be smaller than chunk size ({budget})")]
    OverlapTooLarge { overlap: usize, budget: usize },
    #[error("Invalid overlap ratio: {0}")]
    InvalidOverlapRatio(f32),
    #[error("Tokenization failed: {0}")]
    Tokenization(String),
    #[error("Failed to load tokenizer from {path}: {message}")]
    TokenizerLoad { path: PathBuf, message: String },
}

fn check_budget(budget: usize, overlap: usize) -> Result<(), ChunkingError> {
    if budget == 0 {
        return Err(ChunkingError::ZeroBudget);
    }
    if overlap >= budget {
        return Err(ChunkingError::OverlapTooLarge { overlap, budget });
    }
    Ok(())
}

/// First pass: character windows ending at the best available boundary
///
/// A window starting at character `s` ends at the last paragraph break, line
/// break, sentence end or space found in `(s + overlap, s + chunk_size]`, in
/// that priority order, or at `s + chunk_size` when none exists. The next
/// window starts `overlap` characters before that end, so every non-final
/// chunk shares exactly its last `overlap` characters with its successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacterSplitter {
    chunk_size: usize,
    overlap: usize,
}

impl CharacterSplitter {
    #[inline]
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, ChunkingError> {
        check_budget(chunk_size, overlap)?;
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    #[inline]
    pub fn from_config(config: &ChunkingConfig) -> Result<Self, ChunkingError> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    #[inline]
    pub fn split(&self, text: &str) -> Vec<TextChunk> {
        // Byte offset of every character, plus the end of the text
        let offsets: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let total = offsets.len() - 1;

        let mut chunks = Vec::new();
        if total == 0 {
            return chunks;
        }

        let mut start = 0;
        loop {
            if total - start <= self.chunk_size {
                chunks.push(slice_chunk(text, &offsets, start, total));
                break;
            }

            let end = self.find_break(text, &offsets, start);
            chunks.push(slice_chunk(text, &offsets, start, end));
            start = end - self.overlap;
        }

        debug!(
            "Split {} characters into {} chunks (size {}, overlap {})",
            total,
            chunks.len(),
            self.chunk_size,
            self.overlap
        );
        chunks
    }

    fn find_break(&self, text: &str, offsets: &[usize], start: usize) -> usize {
        let limit = start + self.chunk_size;
        // Ending at or before this would not move the next window forward
        let earliest = start + self.overlap + 1;
        let window_start = offsets[start];
        let window = &text[window_start..offsets[limit]];

        for separator in SEPARATORS {
            let Some(position) = window.rfind(separator) else {
                continue;
            };
            let end_byte = window_start + position + separator.len();
            if let Ok(end) = offsets.binary_search(&end_byte) {
                if end >= earliest {
                    return end;
                }
            }
        }

        limit
    }
}

fn slice_chunk(text: &str, offsets: &[usize], start: usize, end: usize) -> TextChunk {
    TextChunk {
        text: text[offsets[start]..offsets[end]].to_string(),
        units: start..end,
    }
}

/// Splits text into tokens, reporting each token's byte span in the input
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Result<Vec<Range<usize>>, ChunkingError>;
}

/// Words and individual punctuation marks
#[derive(Debug, Clone, Copy, Default)]
pub struct WordTokenizer;

impl Tokenizer for WordTokenizer {
    #[inline]
    fn tokenize(&self, text: &str) -> Result<Vec<Range<usize>>, ChunkingError> {
        WORD_TOKEN_REGEX
            .find_iter(text)
            .map(|m| {
                m.map(|m| m.range())
                    .map_err(|e| ChunkingError::Tokenization(e.to_string()))
            })
            .collect()
    }
}

/// Tokenizer loaded from a Hugging Face `tokenizer.json`
///
/// Truncation and padding are disabled so that every token of the input is
/// reported.
pub struct HfTokenizer {
    inner: tokenizers::Tokenizer,
}

impl HfTokenizer {
    #[inline]
    pub fn from_file(path: &Path) -> Result<Self, ChunkingError> {
        let load_error = |message: String| ChunkingError::TokenizerLoad {
            path: path.to_path_buf(),
            message,
        };

        let mut inner =
            tokenizers::Tokenizer::from_file(path).map_err(|e| load_error(e.to_string()))?;
        inner
            .with_truncation(None)
            .map_err(|e| load_error(e.to_string()))?;
        inner.with_padding(None);

        Ok(Self { inner })
    }
}

impl Tokenizer for HfTokenizer {
    #[inline]
    fn tokenize(&self, text: &str) -> Result<Vec<Range<usize>>, ChunkingError> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| ChunkingError::Tokenization(e.to_string()))?;

        Ok(encoding
            .get_offsets()
            .iter()
            .filter(|(start, end)| end > start)
            .map(|&(start, end)| floor_char_boundary(text, start)..ceil_char_boundary(text, end))
            .collect())
    }
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(text: &str, mut index: usize) -> usize {
    index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

/// Build the tokenizer named by the configuration, falling back to words
#[inline]
pub fn tokenizer_from_config(config: &ChunkingConfig) -> Result<Box<dyn Tokenizer>, ChunkingError> {
    match &config.tokenizer_path {
        Some(path) => Ok(Box::new(HfTokenizer::from_file(path)?)),
        None => Ok(Box::new(WordTokenizer)),
    }
}

/// Second pass: fixed token windows with a fractional overlap
pub struct TokenSplitter {
    tokenizer: Box<dyn Tokenizer>,
    tokens_per_chunk: usize,
    overlap: usize,
}

impl TokenSplitter {
    /// `overlap_ratio` of `tokens_per_chunk`, rounded down, is shared between windows
    #[inline]
    pub fn new(
        tokenizer: Box<dyn Tokenizer>,
        tokens_per_chunk: usize,
        overlap_ratio: f32,
    ) -> Result<Self, ChunkingError> {
        if !(0.0..1.0).contains(&overlap_ratio) {
            return Err(ChunkingError::InvalidOverlapRatio(overlap_ratio));
        }
        // f32 ratios such as 0.7 sit just below their decimal value
        let overlap =
            (tokens_per_chunk as f64 * f64::from(overlap_ratio) + 1e-6).floor() as usize;
        check_budget(tokens_per_chunk, overlap)?;

        Ok(Self {
            tokenizer,
            tokens_per_chunk,
            overlap,
        })
    }

    #[inline]
    pub fn from_config(config: &ChunkingConfig) -> Result<Self, ChunkingError> {
        Self::new(
            tokenizer_from_config(config)?,
            config.tokens_per_chunk,
            config.token_overlap_ratio,
        )
    }

    /// Number of tokens shared by adjacent windows
    #[inline]
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    #[inline]
    pub fn split(&self, text: &str) -> Result<Vec<TextChunk>, ChunkingError> {
        let spans = self.tokenizer.tokenize(text)?;
        let total = spans.len();
        let stride = self.tokens_per_chunk - self.overlap;

        let mut chunks = Vec::new();
        let mut start = 0;
        while start < total {
            let end = (start + self.tokens_per_chunk).min(total);
            let byte_range = spans[start].start..spans[end - 1].end;
            let chunk_text = text.get(byte_range.clone()).ok_or_else(|| {
                ChunkingError::Tokenization(format!(
                    "token span {byte_range:?} is not a valid slice of the text"
                ))
            })?;

            chunks.push(TextChunk {
                text: chunk_text.to_string(),
                units: start..end,
            });

            if end == total {
                break;
            }
            start += stride;
        }

        Ok(chunks)
    }
}
