//! On-disk vector index.
//!
//! The index directory holds two files: `manifest.json` describing the
//! embedder and entry count, and `entries.jsonl` with one serialized
//! [`IndexedEntry`] per line. Entries are addressed by their chunk id, which
//! is a digest of the chunk content and provenance, so writing the same chunk
//! twice is a no-op. The whole index is held in memory once opened.

use crate::embeddings::{cosine_similarity, Embedder};
use crate::error::{IngestError, SearchError, StorageError};
use crate::models::{Chunk, IndexedEntry, ScoredChunk};
use crate::traits::Retriever;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

const MANIFEST_FILE: &str = "manifest.json";
const ENTRIES_FILE: &str = "entries.jsonl";
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexManifest {
    pub format_version: u32,
    pub embedder: Option<String>,
    pub dimensions: Option<usize>,
    pub entry_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for IndexManifest {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            format_version: FORMAT_VERSION,
            embedder: None,
            dimensions: None,
            entry_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

pub struct VectorIndex {
    directory: PathBuf,
    embedder: Arc<dyn Embedder>,
    manifest: IndexManifest,
    entries: Vec<IndexedEntry>,
    known_ids: HashSet<String>,
}

impl VectorIndex {
    /// Opens the index stored in `directory`. A directory that does not exist
    /// yet is an empty index; it is created by the first [`VectorIndex::build`].
    pub fn open(
        directory: impl Into<PathBuf>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, StorageError> {
        let directory = directory.into();
        let manifest_path = directory.join(MANIFEST_FILE);
        let entries_path = directory.join(ENTRIES_FILE);

        let mut manifest = if manifest_path.exists() {
            read_manifest(&manifest_path)?
        } else {
            IndexManifest::default()
        };

        let stored = if entries_path.exists() {
            read_entries(&entries_path, manifest.dimensions)?
        } else {
            Vec::new()
        };

        let mut known_ids = HashSet::new();
        let mut entries = Vec::with_capacity(stored.len());
        let mut duplicates = 0usize;
        for entry in stored {
            if known_ids.insert(entry.chunk.chunk_id.clone()) {
                entries.push(entry);
            } else {
                duplicates += 1;
            }
        }

        if duplicates > 0 {
            warn!(directory = %directory.display(), duplicates, "ignored repeated index entries");
        }
        // entries.jsonl is authoritative; the manifest lags behind it after an
        // interrupted build.
        if entries.len() != manifest.entry_count {
            warn!(
                directory = %directory.display(),
                manifest_count = manifest.entry_count,
                found = entries.len(),
                "manifest entry count is stale, using the entries file"
            );
            manifest.entry_count = entries.len();
        }
        if manifest.dimensions.is_none() {
            manifest.dimensions = entries.first().map(|entry| entry.embedding.len());
        }

        if let Some(recorded) = &manifest.embedder {
            if recorded != embedder.name() {
                warn!(
                    recorded = %recorded,
                    configured = %embedder.name(),
                    "index was built with a different embedder"
                );
            }
        }

        Ok(Self {
            directory,
            embedder,
            manifest,
            entries,
            known_ids,
        })
    }

    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.entries.iter().map(|entry| &entry.chunk)
    }

    /// Embeds and appends `chunks`, skipping any already stored. Returns the
    /// number of entries written.
    pub async fn build(&mut self, chunks: &[Chunk]) -> Result<usize, IngestError> {
        let mut fresh = Vec::new();
        let mut batch_ids = HashSet::new();
        let mut dimensions = self.manifest.dimensions;

        for chunk in chunks {
            if self.known_ids.contains(&chunk.chunk_id) || !batch_ids.insert(&chunk.chunk_id) {
                continue;
            }

            let embedding = self.embedder.embed(&chunk.content).await?;
            match dimensions {
                Some(expected) if expected != embedding.len() => {
                    return Err(StorageError::DimensionMismatch {
                        expected,
                        found: embedding.len(),
                    }
                    .into());
                }
                _ => dimensions = Some(embedding.len()),
            }

            fresh.push(IndexedEntry {
                chunk: chunk.clone(),
                embedding,
            });
        }

        if fresh.is_empty() {
            if self.manifest.entry_count != self.entries.len() {
                self.persist_manifest()?;
            }
            info!(directory = %self.directory.display(), "no new chunks to index");
            return Ok(0);
        }

        fs::create_dir_all(&self.directory).map_err(io_error(&self.directory))?;
        append_entries(&self.directory.join(ENTRIES_FILE), &fresh)?;

        // The entries are on disk from here on, so memory must follow even if
        // the manifest write below fails.
        let added = fresh.len();
        for entry in fresh {
            self.known_ids.insert(entry.chunk.chunk_id.clone());
            self.entries.push(entry);
        }
        self.persist_manifest()?;

        info!(
            directory = %self.directory.display(),
            added,
            total = self.entries.len(),
            "vector index updated"
        );
        Ok(added)
    }

    fn persist_manifest(&mut self) -> Result<(), StorageError> {
        let mut manifest = self.manifest.clone();
        manifest.embedder = Some(self.embedder.name().to_string());
        manifest.dimensions = self
            .entries
            .first()
            .map(|entry| entry.embedding.len())
            .or(manifest.dimensions);
        manifest.entry_count = self.entries.len();
        manifest.updated_at = Utc::now();

        write_manifest(&self.directory.join(MANIFEST_FILE), &manifest)?;
        self.manifest = manifest;
        Ok(())
    }

    /// The `k` stored entries most similar to `text`, best first. Equal scores
    /// keep insertion order.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<ScoredChunk>, SearchError> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed(text).await?;
        if let Some(expected) = self.manifest.dimensions {
            if expected != query_vector.len() {
                return Err(StorageError::DimensionMismatch {
                    expected,
                    found: query_vector.len(),
                }
                .into());
            }
        }

        let mut scored: Vec<ScoredChunk> = self
            .entries
            .iter()
            .map(|entry| ScoredChunk {
                chunk: entry.chunk.clone(),
                score: cosine_similarity(&entry.embedding, &query_vector),
            })
            .collect();

        scored.sort_by(|left, right| right.score.total_cmp(&left.score));
        scored.truncate(k);
        Ok(scored)
    }
}

#[async_trait]
impl Retriever for VectorIndex {
    fn label(&self) -> &'static str {
        "vector"
    }

    async fn retrieve(&self, text: &str, k: usize) -> Result<Vec<ScoredChunk>, SearchError> {
        self.query(text, k).await
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn read_manifest(path: &Path) -> Result<IndexManifest, StorageError> {
    let raw = fs::read_to_string(path).map_err(io_error(path))?;
    let manifest: IndexManifest =
        serde_json::from_str(&raw).map_err(|error| StorageError::Corrupt {
            path: path.to_path_buf(),
            line: error.line(),
            details: error.to_string(),
        })?;

    if manifest.format_version != FORMAT_VERSION {
        return Err(StorageError::Corrupt {
            path: path.to_path_buf(),
            line: 0,
            details: format!("unsupported format version {}", manifest.format_version),
        });
    }

    Ok(manifest)
}

fn read_entries(path: &Path, dimensions: Option<usize>) -> Result<Vec<IndexedEntry>, StorageError> {
    let file = File::open(path).map_err(io_error(path))?;
    let mut dimensions = dimensions;
    let mut entries = Vec::new();

    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(io_error(path))?;
        if line.trim().is_empty() {
            continue;
        }

        let entry: IndexedEntry =
            serde_json::from_str(&line).map_err(|error| StorageError::Corrupt {
                path: path.to_path_buf(),
                line: index + 1,
                details: error.to_string(),
            })?;

        if let Some(expected) = dimensions {
            if entry.embedding.len() != expected {
                return Err(StorageError::Corrupt {
                    path: path.to_path_buf(),
                    line: index + 1,
                    details: format!(
                        "embedding has {} dimensions, index has {expected}",
                        entry.embedding.len()
                    ),
                });
            }
        }
        if dimensions.is_none() {
            dimensions = Some(entry.embedding.len());
        }

        entries.push(entry);
    }

    Ok(entries)
}

fn append_entries(path: &Path, entries: &[IndexedEntry]) -> Result<(), StorageError> {
    let mut payload = String::new();
    for entry in entries {
        payload.push_str(&serde_json::to_string(entry)?);
        payload.push('\n');
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(io_error(path))?;
    file.write_all(payload.as_bytes()).map_err(io_error(path))?;
    file.sync_all().map_err(io_error(path))
}

fn write_manifest(path: &Path, manifest: &IndexManifest) -> Result<(), StorageError> {
    let staging = path.with_extension("json.tmp");
    fs::write(&staging, serde_json::to_vec_pretty(manifest)?).map_err(io_error(&staging))?;
    fs::rename(&staging, path).map_err(io_error(path))
}
