//! Conversational retrieval pipeline.
//!
//! One invocation runs rewrite, retrieve, synthesize and record in that
//! order, each step awaited before the next starts. Only the session store
//! carries state between invocations. Two invocations for the same session
//! running at once may interleave their history entries.

use crate::chunking::normalize_whitespace;
use crate::error::PipelineError;
use crate::models::{Chunk, RetrievalOptions};
use crate::rewriter::QueryRewriter;
use crate::session::{SessionStore, DEFAULT_SESSION_ID};
use crate::synthesizer::AnswerSynthesizer;
use crate::traits::Retriever;
use tracing::info;

const PREVIEW_CHARS: usize = 250;

/// Everything one invocation produced, for callers that audit retrieval.
#[derive(Debug, Clone)]
pub struct Turn {
    pub session_id: String,
    pub rewritten_query: String,
    pub answer: String,
    pub context: Vec<Chunk>,
    pub refused: bool,
}

pub struct ConversationalPipeline<R, S>
where
    R: Retriever,
    S: SessionStore,
{
    rewriter: QueryRewriter,
    retriever: R,
    synthesizer: AnswerSynthesizer,
    sessions: S,
    k_per_retriever: usize,
}

impl<R, S> ConversationalPipeline<R, S>
where
    R: Retriever,
    S: SessionStore,
{
    pub fn new(
        rewriter: QueryRewriter,
        retriever: R,
        synthesizer: AnswerSynthesizer,
        sessions: S,
        options: &RetrievalOptions,
    ) -> Self {
        Self {
            rewriter,
            retriever,
            synthesizer,
            sessions,
            k_per_retriever: options.k_per_retriever,
        }
    }

    pub fn sessions(&self) -> &S {
        &self.sessions
    }

    pub async fn respond(
        &self,
        message: &str,
        session_id: Option<&str>,
    ) -> Result<String, PipelineError> {
        Ok(self.respond_detailed(message, session_id).await?.answer)
    }

    pub async fn respond_detailed(
        &self,
        message: &str,
        session_id: Option<&str>,
    ) -> Result<Turn, PipelineError> {
        if message.trim().is_empty() {
            return Err(PipelineError::EmptyMessage);
        }

        let session_id = session_id.unwrap_or(DEFAULT_SESSION_ID);
        info!(session_id, question = %message, "new question received");

        let history = self.sessions.get_or_create(session_id).await;

        let rewritten_query = self.rewriter.rewrite(&history, message).await?;
        info!(session_id, rewritten_query = %rewritten_query, "retrieval query");

        let hits = self
            .retriever
            .retrieve(&rewritten_query, self.k_per_retriever)
            .await?;

        if hits.is_empty() {
            info!(session_id, "no context retrieved");
        }
        for (rank, hit) in hits.iter().enumerate() {
            let page = hit
                .chunk
                .metadata
                .page
                .map(|page| page.to_string())
                .unwrap_or_else(|| "n/a".to_string());
            info!(
                session_id,
                rank = rank + 1,
                source = %hit.chunk.metadata.source,
                page = %page,
                score = hit.score,
                preview = %preview(&hit.chunk.content),
                "retrieved chunk"
            );
        }

        let context = hits.into_iter().map(|hit| hit.chunk).collect();
        let answer = self.synthesizer.answer(context, &history, message).await?;
        info!(session_id, refused = answer.refused, answer = %answer.text, "answer generated");

        self.sessions
            .record_turn(session_id, message, &answer.text)
            .await;

        Ok(Turn {
            session_id: session_id.to_string(),
            rewritten_query,
            answer: answer.text,
            context: answer.context,
            refused: answer.refused,
        })
    }
}

fn preview(content: &str) -> String {
    let normalized = normalize_whitespace(content);
    if normalized.chars().count() <= PREVIEW_CHARS {
        return normalized;
    }
    let mut truncated: String = normalized.chars().take(PREVIEW_CHARS).collect();
    truncated.push_str("...");
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_is_whitespace_normalized_and_truncated() {
        assert_eq!(preview("a  b\n\nc"), "a b c");

        let long = "x".repeat(PREVIEW_CHARS + 10);
        let shortened = preview(&long);
        assert_eq!(shortened.chars().count(), PREVIEW_CHARS + 3);
        assert!(shortened.ends_with("..."));
    }
}
