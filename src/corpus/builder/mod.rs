
use std::path::PathBuf;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use super::cleaning::{NoiseFilter, filter_margins};
use super::extract::TextExtractor;
use super::{BuildError, CorpusConfig, Document, Passage};
use crate::embeddings::{CharacterSplitter, ChunkingConfig, Embedder, TokenSplitter};
use crate::index::{DistanceMetric, IndexStore, VectorIndex};

const DEFAULT_BATCH_SIZE: usize = 16;

/// What happened to the pages and chunks of one build
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub pages_total: usize,
    /// Pages dropped by the leading and trailing margins
    pub pages_filtered: usize,
    /// Pages whose text could not be extracted
    pub pages_failed: usize,
    pub character_chunks: usize,
    pub token_chunks: usize,
    pub chunk_failures: usize,
    pub embedding_failures: usize,
    pub passages_stored: usize,
}

#[derive(Debug)]
pub struct BuildOutcome {
    pub index: VectorIndex,
    pub report: BuildReport,
}

/// Turns one document into a searchable index
///
/// Unreadable pages, chunks that fail to tokenize and passages that fail to
/// embed are logged and skipped; only a document that cannot be opened at
/// all, or an index that cannot be saved, fails the build.
pub struct CorpusBuilder<X, E> {
    extractor: X,
    embedder: E,
    skip_leading_pages: usize,
    skip_trailing_pages: usize,
    noise: NoiseFilter,
    character_splitter: CharacterSplitter,
    token_splitter: TokenSplitter,
    metric: DistanceMetric,
    batch_size: usize,
    show_progress: bool,
}

impl<X: TextExtractor, E: Embedder> CorpusBuilder<X, E> {
    #[inline]
    pub fn new(
        extractor: X,
        embedder: E,
        corpus: &CorpusConfig,
        chunking: &ChunkingConfig,
    ) -> Result<Self, BuildError> {
        Ok(Self {
            extractor,
            embedder,
            skip_leading_pages: corpus.skip_leading_pages,
            skip_trailing_pages: corpus.skip_trailing_pages,
            noise: NoiseFilter::new(&corpus.noise_patterns)?,
            character_splitter: CharacterSplitter::from_config(chunking)?,
            token_splitter: TokenSplitter::from_config(chunking)?,
            metric: DistanceMetric::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            show_progress: console::user_attended_stderr(),
        })
    }

    #[inline]
    pub fn with_token_splitter(mut self, splitter: TokenSplitter) -> Self {
        self.token_splitter = splitter;
        self
    }

    #[inline]
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    #[inline]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    #[inline]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Extract, filter, clean and chunk the document into ordered passages
    #[inline]
    pub fn passages(&self, document: &Document) -> Result<(Vec<Passage>, BuildReport), BuildError> {
        let mut report = BuildReport::default();

        let pages = self
            .extractor
            .extract(document)
            .map_err(|source| BuildError::Extraction {
                document: document.id.clone(),
                source,
            })?;
        report.pages_total = pages.len();

        let kept = filter_margins(pages, self.skip_leading_pages, self.skip_trailing_pages);
        report.pages_filtered = report.pages_total - kept.len();

        let mut cleaned_pages = Vec::with_capacity(kept.len());
        for page in kept {
            match page {
                Ok(text) => {
                    let cleaned = self.noise.clean(&text);
                    if !cleaned.trim().is_empty() {
                        cleaned_pages.push(cleaned.trim().to_string());
                    }
                }
                Err(e) => {
                    warn!("Skipping page of {}: {}", document.id, e);
                    report.pages_failed += 1;
                }
            }
        }

        let text = cleaned_pages.join("\n\n");
        let character_chunks = self.character_splitter.split(&text);
        report.character_chunks = character_chunks.len();

        let mut passages = Vec::new();
        for (chunk_index, chunk) in character_chunks.iter().enumerate() {
            match self.token_splitter.split(&chunk.text) {
                Ok(token_chunks) => {
                    for token_chunk in token_chunks {
                        let ordinal = u32::try_from(passages.len()).unwrap_or(u32::MAX);
                        passages.push(Passage {
                            token_count: u32::try_from(token_chunk.unit_count())
                                .unwrap_or(u32::MAX),
                            text: token_chunk.text,
                            source_document_id: document.id.clone(),
                            ordinal,
                        });
                    }
                }
                Err(e) => {
                    warn!(
                        "Skipping chunk {} of {}: {}",
                        chunk_index, document.id, e
                    );
                    report.chunk_failures += 1;
                }
            }
        }
        report.token_chunks = passages.len();

        debug!(
            "{}: {} pages, {} kept, {} character chunks, {} passages",
            document.id,
            report.pages_total,
            cleaned_pages.len(),
            report.character_chunks,
            report.token_chunks
        );
        Ok((passages, report))
    }

    /// Build the index for `document` in memory
    #[inline]
    pub fn build(&self, document: &Document) -> Result<BuildOutcome, BuildError> {
        info!("Building index for {}", document.id);
        let (passages, mut report) = self.passages(document)?;

        let mut index =
            VectorIndex::new(document.id.clone(), self.embedder.model_id(), self.metric);
        let progress = self.progress_bar(passages.len());

        for batch in passages.chunks(self.batch_size) {
            for (passage, vector) in batch.iter().zip(self.embed_batch(batch)) {
                let stored = vector.and_then(|vector| {
                    index
                        .insert(passage.clone(), vector)
                        .map_err(|e| e.to_string())
                });
                if let Err(message) = stored {
                    warn!(
                        "Skipping passage {} of {}: {}",
                        passage.ordinal, document.id, message
                    );
                    report.embedding_failures += 1;
                }
                progress.inc(1);
            }
        }
        progress.finish_and_clear();

        report.passages_stored = index.len();
        info!(
            "Built index for {}: {} passages stored, {} skipped",
            document.id,
            report.passages_stored,
            report.embedding_failures + report.chunk_failures
        );
        Ok(BuildOutcome { index, report })
    }

    /// Build the index and persist it in `store`
    #[inline]
    pub fn build_into(
        &self,
        document: &Document,
        store: &IndexStore,
    ) -> Result<(BuildOutcome, PathBuf), BuildError> {
        let outcome = self.build(document)?;
        let path = store.save(&outcome.index)?;
        Ok((outcome, path))
    }

    /// Embed a batch in one request, retrying each text alone if the batch fails
    fn embed_batch(&self, batch: &[Passage]) -> Vec<Result<Vec<f32>, String>> {
        let texts: Vec<String> = batch.iter().map(|p| p.text.clone()).collect();

        match self.embedder.embed_batch(&texts) {
            Ok(vectors) if vectors.len() == texts.len() => {
                return vectors.into_iter().map(Ok).collect();
            }
            Ok(vectors) => warn!(
                "Batch of {} returned {} embeddings, embedding individually",
                texts.len(),
                vectors.len()
            ),
            Err(e) => warn!(
                "Batch of {} failed ({}), embedding individually",
                texts.len(),
                e
            ),
        }

        texts
            .iter()
            .map(|text| self.embedder.embed(text).map_err(|e| e.to_string()))
            .collect()
    }

    fn progress_bar(&self, total: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        ProgressBar::new(total as u64).with_style(
            ProgressStyle::with_template("{bar:40} [{pos}/{len}] Embedding passages")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        )
    }
}
