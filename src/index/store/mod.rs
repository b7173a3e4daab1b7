#[cfg(test)]
mod tests;

use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use super::{IndexEntry, IndexError, IndexHeader, VectorIndex};
use crate::corpus::DocumentId;

const INDEX_SUFFIX: &str = ".index.json";

#[derive(Serialize)]
struct IndexFileRef<'a> {
    header: &'a IndexHeader,
    entries: &'a [IndexEntry],
}

#[derive(Deserialize)]
struct IndexFile {
    header: IndexHeader,
    entries: Vec<IndexEntry>,
}

#[derive(Deserialize)]
struct HeaderOnly {
    header: IndexHeader,
}

/// Directory of persisted indexes, one `<document_id>.index.json` per document
#[derive(Debug, Clone)]
pub struct IndexStore {
    dir: PathBuf,
}

impl IndexStore {
    #[inline]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[inline]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[inline]
    pub fn path_for(&self, document_id: &DocumentId) -> PathBuf {
        self.dir.join(format!("{document_id}{INDEX_SUFFIX}"))
    }

    /// Write the index to a temporary file in the store and rename it into place
    ///
    /// A concurrent reader sees either the previous file or the new one.
    #[inline]
    pub fn save(&self, index: &VectorIndex) -> Result<PathBuf, IndexError> {
        fs::create_dir_all(&self.dir).map_err(|source| io_error(&self.dir, source))?;
        let path = self.path_for(index.document_id());

        let temp = NamedTempFile::new_in(&self.dir).map_err(|source| io_error(&self.dir, source))?;
        {
            let mut writer = BufWriter::new(temp.as_file());
            serde_json::to_writer(
                &mut writer,
                &IndexFileRef {
                    header: index.header(),
                    entries: index.entries(),
                },
            )?;
            writer.flush().map_err(|source| io_error(temp.path(), source))?;
        }
        temp.as_file()
            .sync_all()
            .map_err(|source| io_error(temp.path(), source))?;
        temp.persist(&path)
            .map_err(|e| io_error(&path, e.error))?;

        info!(
            "Saved index for {} ({} passages) to {}",
            index.document_id(),
            index.len(),
            path.display()
        );
        Ok(path)
    }

    /// Load and validate the index stored for `document_id`
    #[inline]
    pub fn load(&self, document_id: &DocumentId) -> Result<VectorIndex, IndexError> {
        let path = self.path_for(document_id);
        let file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(IndexError::NotFound(document_id.clone()));
            }
            Err(source) => return Err(io_error(&path, source)),
        };

        let stored: IndexFile = serde_json::from_reader(BufReader::new(file))?;
        if stored.header.format_version != super::FORMAT_VERSION {
            return Err(IndexError::UnsupportedVersion(stored.header.format_version));
        }
        if &stored.header.document_id != document_id {
            return Err(IndexError::DocumentMismatch {
                expected: document_id.clone(),
                actual: stored.header.document_id,
            });
        }

        let index = VectorIndex::from_parts(stored.header, stored.entries)?;
        debug!(
            "Loaded index for {} with {} passages",
            document_id,
            index.len()
        );
        Ok(index)
    }

    /// Remove the stored index; returns whether a file existed
    #[inline]
    pub fn delete(&self, document_id: &DocumentId) -> Result<bool, IndexError> {
        let path = self.path_for(document_id);
        match fs::remove_file(&path) {
            Ok(()) => {
                info!("Deleted index {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(io_error(&path, source)),
        }
    }

    /// Headers of every readable index in the store, ordered by document id
    ///
    /// Files that cannot be parsed are skipped with a warning.
    #[inline]
    pub fn list(&self) -> Result<Vec<IndexHeader>, IndexError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(io_error(&self.dir, source)),
        };

        let mut headers = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| io_error(&self.dir, source))?;
            let path = entry.path();
            let is_index = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(INDEX_SUFFIX));
            if !is_index {
                continue;
            }

            match read_header(&path) {
                Ok(header) => headers.push(header),
                Err(e) => warn!("Skipping unreadable index {}: {}", path.display(), e),
            }
        }

        headers.sort_by(|a, b| a.document_id.cmp(&b.document_id));
        Ok(headers)
    }
}

fn read_header(path: &Path) -> Result<IndexHeader, IndexError> {
    let file = fs::File::open(path).map_err(|source| io_error(path, source))?;
    let stored: HeaderOnly = serde_json::from_reader(BufReader::new(file))?;
    Ok(stored.header)
}

fn io_error(path: &Path, source: std::io::Error) -> IndexError {
    IndexError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// The index currently served to queries
///
/// Readers take a snapshot and search it without holding the lock; a rebuild
/// swaps the whole index in one step.
#[derive(Debug)]
pub struct SharedIndex {
    current: RwLock<Arc<VectorIndex>>,
}

impl SharedIndex {
    #[inline]
    pub fn new(index: VectorIndex) -> Self {
        Self {
            current: RwLock::new(Arc::new(index)),
        }
    }

    #[inline]
    pub fn current(&self) -> Arc<VectorIndex> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Publish a new index and return the one it replaced
    #[inline]
    pub fn replace(&self, index: VectorIndex) -> Arc<VectorIndex> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, Arc::new(index))
    }
}
