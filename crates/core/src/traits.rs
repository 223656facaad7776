use crate::{ScoredChunk, SearchError};
use async_trait::async_trait;

/// Ranked retrieval over indexed chunks, best first.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Short label used in logs and fusion diagnostics.
    fn label(&self) -> &'static str;

    async fn retrieve(&self, text: &str, k: usize) -> Result<Vec<ScoredChunk>, SearchError>;
}
