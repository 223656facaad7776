use crate::lexical::LexicalRetriever;
use crate::models::{Chunk, RetrievalOptions, ScoredChunk};
use crate::traits::Retriever;
use crate::vector_index::VectorIndex;
use crate::SearchError;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Rank offset of reciprocal-rank fusion.
const RRF_K: f64 = 60.0;

/// Merges a lexical and a vector retriever with weighted reciprocal-rank
/// fusion. Each component returns up to `k` hits; the fused list is the
/// deduplicated union, so it never exceeds `2 * k` entries.
pub struct FusionRetriever<L, V>
where
    L: Retriever,
    V: Retriever,
{
    lexical: L,
    vector: V,
    lexical_weight: f64,
    vector_weight: f64,
}

impl<L, V> FusionRetriever<L, V>
where
    L: Retriever,
    V: Retriever,
{
    pub fn new(lexical: L, vector: V, options: &RetrievalOptions) -> Self {
        Self {
            lexical,
            vector,
            lexical_weight: options.lexical_weight,
            vector_weight: options.vector_weight,
        }
    }

    pub async fn query(&self, text: &str, k_per_retriever: usize) -> Result<Vec<ScoredChunk>, SearchError> {
        let (lexical_hits, vector_hits) = tokio::try_join!(
            self.lexical.retrieve(text, k_per_retriever),
            self.vector.retrieve(text, k_per_retriever)
        )?;

        debug!(
            lexical = self.lexical.label(),
            lexical_hits = lexical_hits.len(),
            vector = self.vector.label(),
            vector_hits = vector_hits.len(),
            "component retrievers returned"
        );

        Ok(fuse(
            &lexical_hits,
            self.lexical_weight,
            &vector_hits,
            self.vector_weight,
        ))
    }
}

impl FusionRetriever<LexicalRetriever, VectorIndex> {
    /// Builds the lexical side from every chunk currently stored in `index`.
    pub fn from_index(index: VectorIndex, options: &RetrievalOptions) -> Self {
        let lexical = LexicalRetriever::new(index.chunks().cloned().collect());
        info!(chunks = lexical.len(), "lexical retriever built from vector index");
        Self::new(lexical, index, options)
    }
}

#[async_trait]
impl<L, V> Retriever for FusionRetriever<L, V>
where
    L: Retriever,
    V: Retriever,
{
    fn label(&self) -> &'static str {
        "hybrid"
    }

    async fn retrieve(&self, text: &str, k: usize) -> Result<Vec<ScoredChunk>, SearchError> {
        self.query(text, k).await
    }
}

#[derive(Debug)]
struct FusedHit {
    chunk: Chunk,
    total_score: f64,
    primary_rank: Option<usize>,
    secondary_rank: Option<usize>,
}

/// Weighted RRF: `score = Σ weight / (60 + rank)` with 1-based ranks. Ties go
/// to the better rank in the higher-weighted list (the lexical list when the
/// weights are equal), then to the better rank in the other list.
pub fn fuse(
    lexical: &[ScoredChunk],
    lexical_weight: f64,
    vector: &[ScoredChunk],
    vector_weight: f64,
) -> Vec<ScoredChunk> {
    let (primary, primary_weight, secondary, secondary_weight) = if vector_weight > lexical_weight {
        (vector, vector_weight, lexical, lexical_weight)
    } else {
        (lexical, lexical_weight, vector, vector_weight)
    };

    let mut scored = HashMap::<String, FusedHit>::new();
    apply_rrf(&mut scored, primary, primary_weight, ListSlot::Primary);
    apply_rrf(&mut scored, secondary, secondary_weight, ListSlot::Secondary);

    let mut fused = scored.into_values().collect::<Vec<_>>();
    fused.sort_by(|left, right| {
        right
            .total_score
            .total_cmp(&left.total_score)
            .then_with(|| rank_order(left.primary_rank, right.primary_rank))
            .then_with(|| rank_order(left.secondary_rank, right.secondary_rank))
            .then_with(|| left.chunk.chunk_id.cmp(&right.chunk.chunk_id))
    });

    fused
        .into_iter()
        .map(|hit| ScoredChunk {
            chunk: hit.chunk,
            score: hit.total_score,
        })
        .collect()
}

#[derive(Clone, Copy)]
enum ListSlot {
    Primary,
    Secondary,
}

fn apply_rrf(target: &mut HashMap<String, FusedHit>, hits: &[ScoredChunk], weight: f64, slot: ListSlot) {
    let mut seen = HashSet::new();
    for (position, hit) in hits.iter().enumerate() {
        // A list that repeats a chunk only counts its best rank.
        if !seen.insert(hit.chunk.chunk_id.as_str()) {
            continue;
        }

        let rank = position + 1;
        let entry = target
            .entry(hit.chunk.chunk_id.clone())
            .or_insert_with(|| FusedHit {
                chunk: hit.chunk.clone(),
                total_score: 0.0,
                primary_rank: None,
                secondary_rank: None,
            });

        match slot {
            ListSlot::Primary => entry.primary_rank = Some(rank),
            ListSlot::Secondary => entry.secondary_rank = Some(rank),
        }
        entry.total_score += weight / (RRF_K + rank as f64);
    }
}

/// Present ranks sort before missing ones; lower ranks sort first.
fn rank_order(left: Option<usize>, right: Option<usize>) -> std::cmp::Ordering {
    match (left, right) {
        (Some(l), Some(r)) => l.cmp(&r),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentMetadata;

    struct FakeRetriever {
        hits: Vec<ScoredChunk>,
    }

    #[async_trait]
    impl Retriever for FakeRetriever {
        fn label(&self) -> &'static str {
            "fake"
        }

        async fn retrieve(&self, _text: &str, k: usize) -> Result<Vec<ScoredChunk>, SearchError> {
            Ok(self.hits.iter().take(k).cloned().collect())
        }
    }

    fn hit(id: &str, score: f64) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                chunk_id: id.to_string(),
                content: format!("content of {id}"),
                metadata: DocumentMetadata {
                    source: format!("{id}.pdf"),
                    page: Some(1),
                },
                start_char: 0,
                end_char: 10,
            },
            score,
        }
    }

    fn ids(hits: &[ScoredChunk]) -> Vec<&str> {
        hits.iter().map(|hit| hit.chunk.chunk_id.as_str()).collect()
    }

    #[tokio::test]
    async fn chunk_in_both_lists_ranks_first() -> Result<(), SearchError> {
        let lexical = FakeRetriever {
            hits: vec![hit("a", 3.0), hit("shared", 2.0)],
        };
        let vector = FakeRetriever {
            hits: vec![hit("b", 0.9), hit("shared", 0.8)],
        };

        let retriever = FusionRetriever::new(lexical, vector, &RetrievalOptions::default());
        let fused = retriever.retrieve("question", 2).await?;

        assert_eq!(ids(&fused), vec!["shared", "a", "b"]);
        let expected = 0.5 / 62.0 + 0.5 / 62.0;
        assert!((fused[0].score - expected).abs() < 1e-12);
        Ok(())
    }

    #[tokio::test]
    async fn fused_hits_are_a_deduplicated_subset_of_the_union() -> Result<(), SearchError> {
        let lexical = FakeRetriever {
            hits: vec![hit("a", 3.0), hit("b", 2.0), hit("c", 1.0)],
        };
        let vector = FakeRetriever {
            hits: vec![hit("b", 0.9), hit("d", 0.8), hit("e", 0.7)],
        };

        let retriever = FusionRetriever::new(lexical, vector, &RetrievalOptions::default());
        let fused = retriever.query("question", 2).await?;
        let fused_ids = ids(&fused);

        assert_eq!(fused_ids.len(), 3);
        for id in &fused_ids {
            assert!(["a", "b", "d"].contains(id));
        }
        let mut unique = fused_ids.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), fused_ids.len());
        Ok(())
    }

    #[test]
    fn equal_weights_break_ties_in_favour_of_the_lexical_list() {
        let fused = fuse(&[hit("lex", 1.0)], 0.5, &[hit("vec", 1.0)], 0.5);
        assert_eq!(ids(&fused), vec!["lex", "vec"]);
    }

    #[test]
    fn heavier_vector_weight_wins_ties_and_scores() {
        let fused = fuse(&[hit("lex", 1.0)], 0.3, &[hit("vec", 1.0)], 0.7);
        assert_eq!(ids(&fused), vec!["vec", "lex"]);

        let tied = fuse(&[hit("lex", 1.0)], 0.5, &[hit("vec", 1.0)], 0.5 + f64::EPSILON);
        assert_eq!(ids(&tied)[0], "vec");
    }

    #[test]
    fn repeated_chunk_within_one_list_counts_once() {
        let fused = fuse(&[hit("a", 2.0), hit("a", 1.0)], 0.5, &[], 0.5);
        assert_eq!(fused.len(), 1);
        assert!((fused[0].score - 0.5 / 61.0).abs() < 1e-12);
    }

    #[test]
    fn empty_inputs_fuse_to_nothing() {
        assert!(fuse(&[], 0.5, &[], 0.5).is_empty());
    }
}
