use crate::error::IngestError;
use crate::models::{Chunk, Document, IngestionOptions};
use sha2::{Digest, Sha256};

/// Cut candidates in order of preference. Each cut lands right after the
/// separator, so the separator stays with the preceding chunk.
const PARAGRAPH_SEPARATORS: &[&str] = &["\n\n"];
const LINE_SEPARATORS: &[&str] = &["\n"];
const SENTENCE_SEPARATORS: &[&str] = &[". ", "! ", "? ", ".\n", "!\n", "?\n"];
const WORD_SEPARATORS: &[&str] = &[" ", "\t"];

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub size: usize,
    pub overlap: usize,
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.size == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if self.overlap >= self.size {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap {} must be smaller than chunk size {}",
                self.overlap, self.size
            )));
        }
        Ok(())
    }
}

impl From<&IngestionOptions> for ChunkingConfig {
    fn from(value: &IngestionOptions) -> Self {
        Self {
            size: value.chunk_size,
            overlap: value.chunk_overlap,
        }
    }
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('\u{a0}', " ")
}

/// Character spans `[start, end)` covering `chars` completely, each at most
/// `config.size` long and overlapping the previous span by at most
/// `config.overlap` characters.
pub fn split_spans(chars: &[char], config: ChunkingConfig) -> Vec<(usize, usize)> {
    let total = chars.len();
    let mut spans = Vec::new();
    let mut start = 0;

    while start < total {
        if total - start <= config.size {
            spans.push((start, total));
            break;
        }

        let limit = start + config.size;
        // A cut at or before this point would not move past the overlap.
        let floor = start + config.overlap;
        let end = [
            PARAGRAPH_SEPARATORS,
            LINE_SEPARATORS,
            SENTENCE_SEPARATORS,
            WORD_SEPARATORS,
        ]
        .iter()
        .find_map(|separators| last_cut(chars, floor, limit, separators))
        .unwrap_or(limit);

        spans.push((start, end));
        start = overlap_start(chars, end, config.overlap);
    }

    spans
}

fn last_cut(chars: &[char], floor: usize, limit: usize, separators: &[&str]) -> Option<usize> {
    let mut best = None;
    for separator in separators {
        let pattern: Vec<char> = separator.chars().collect();
        let mut cut = limit;
        while cut > floor && cut >= pattern.len() {
            if chars[cut - pattern.len()..cut] == pattern[..] {
                best = best.max(Some(cut));
                break;
            }
            cut -= 1;
        }
    }
    best
}

fn overlap_start(chars: &[char], end: usize, overlap: usize) -> usize {
    if overlap == 0 {
        return end;
    }

    let earliest = end - overlap;
    (earliest..end)
        .find(|&index| index > 0 && chars[index - 1].is_whitespace() && !chars[index].is_whitespace())
        .unwrap_or(earliest)
}

pub fn split_document(document: &Document, config: ChunkingConfig) -> Vec<Chunk> {
    let chars: Vec<char> = document.content.chars().collect();

    split_spans(&chars, config)
        .into_iter()
        .map(|(start, end)| {
            let content: String = chars[start..end].iter().collect();
            Chunk {
                chunk_id: make_chunk_id(document, start, end, &content),
                content,
                metadata: document.metadata.clone(),
                start_char: start,
                end_char: end,
            }
        })
        .collect()
}

pub fn build_chunks(
    documents: &[Document],
    options: &IngestionOptions,
) -> Result<Vec<Chunk>, IngestError> {
    let config = ChunkingConfig::from(options);
    config.validate()?;

    Ok(documents
        .iter()
        .flat_map(|document| split_document(document, config))
        .collect())
}

fn make_chunk_id(document: &Document, start: usize, end: usize, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document.metadata.source.as_bytes());
    hasher.update(document.metadata.page.unwrap_or(0).to_le_bytes());
    hasher.update((start as u64).to_le_bytes());
    hasher.update((end as u64).to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
