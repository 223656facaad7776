//! BM25 ranking over the in-memory chunk set. Rebuilt from the vector index
//! contents at every start, never persisted.

use crate::models::{Chunk, ScoredChunk};
use crate::traits::Retriever;
use crate::SearchError;
use async_trait::async_trait;
use std::collections::HashMap;

const K1: f64 = 1.5;
const B: f64 = 0.75;

struct TermStats {
    frequencies: HashMap<String, usize>,
    length: usize,
}

pub struct LexicalRetriever {
    chunks: Vec<Chunk>,
    stats: Vec<TermStats>,
    idf: HashMap<String, f64>,
    average_length: f64,
}

impl LexicalRetriever {
    pub fn new(chunks: Vec<Chunk>) -> Self {
        let stats = chunks
            .iter()
            .map(|chunk| {
                let tokens = tokenize(&chunk.content);
                let mut frequencies = HashMap::new();
                for token in &tokens {
                    *frequencies.entry(token.clone()).or_insert(0) += 1;
                }
                TermStats {
                    frequencies,
                    length: tokens.len(),
                }
            })
            .collect::<Vec<_>>();

        let mut document_frequency = HashMap::<String, usize>::new();
        for stat in &stats {
            for term in stat.frequencies.keys() {
                *document_frequency.entry(term.clone()).or_insert(0) += 1;
            }
        }

        let total = stats.len() as f64;
        let idf = document_frequency
            .into_iter()
            .map(|(term, frequency)| {
                let frequency = frequency as f64;
                let weight = (1.0 + (total - frequency + 0.5) / (frequency + 0.5)).ln();
                (term, weight)
            })
            .collect();

        let average_length = if stats.is_empty() {
            0.0
        } else {
            stats.iter().map(|stat| stat.length).sum::<usize>() as f64 / total
        };

        Self {
            chunks,
            stats,
            idf,
            average_length,
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// The `k` chunks with the highest positive BM25 score, best first. Equal
    /// scores keep corpus order.
    pub fn query(&self, text: &str, k: usize) -> Vec<ScoredChunk> {
        let query_terms = tokenize(text);
        if query_terms.is_empty() || self.chunks.is_empty() {
            return Vec::new();
        }

        let mut scored = self
            .stats
            .iter()
            .enumerate()
            .filter_map(|(position, stat)| {
                let score = self.score(stat, &query_terms);
                (score > 0.0).then(|| (position, score))
            })
            .collect::<Vec<_>>();

        scored.sort_by(|left, right| right.1.total_cmp(&left.1));
        scored
            .into_iter()
            .take(k)
            .map(|(position, score)| ScoredChunk {
                chunk: self.chunks[position].clone(),
                score,
            })
            .collect()
    }

    fn score(&self, stat: &TermStats, query_terms: &[String]) -> f64 {
        let length_norm = if self.average_length > 0.0 {
            stat.length as f64 / self.average_length
        } else {
            0.0
        };

        query_terms
            .iter()
            .filter_map(|term| {
                let frequency = *stat.frequencies.get(term)? as f64;
                let idf = self.idf.get(term).copied().unwrap_or(0.0);
                Some(idf * frequency * (K1 + 1.0) / (frequency + K1 * (1.0 - B + B * length_norm)))
            })
            .sum()
    }
}

#[async_trait]
impl Retriever for LexicalRetriever {
    fn label(&self) -> &'static str {
        "lexical"
    }

    async fn retrieve(&self, text: &str, k: usize) -> Result<Vec<ScoredChunk>, SearchError> {
        Ok(self.query(text, k))
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}
