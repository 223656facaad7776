use crate::error::ModelError;
use crate::llm::ChatModel;
use crate::models::{ChatMessage, Chunk, Language};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    /// The chunks given to the model, in prompt order.
    pub context: Vec<Chunk>,
    pub refused: bool,
}

/// Produces answers grounded only in the supplied chunks, or the fixed
/// refusal sentence of the configured language.
pub struct AnswerSynthesizer {
    model: Arc<dyn ChatModel>,
    language: Language,
}

impl AnswerSynthesizer {
    pub fn new(model: Arc<dyn ChatModel>, language: Language) -> Self {
        Self { model, language }
    }

    pub async fn answer(
        &self,
        context: Vec<Chunk>,
        history: &[ChatMessage],
        question: &str,
    ) -> Result<Answer, ModelError> {
        let refusal = self.language.refusal();

        if context.is_empty() {
            return Ok(Answer {
                text: refusal.to_string(),
                context,
                refused: true,
            });
        }

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(self.system_prompt(&context)));
        messages.extend(history.iter().cloned());
        messages.push(ChatMessage::user(question));

        let reply = self.model.complete(&messages).await?;

        // Any reply carrying the refusal sentence collapses to exactly it.
        if reply.contains(refusal) {
            return Ok(Answer {
                text: refusal.to_string(),
                context,
                refused: true,
            });
        }

        Ok(Answer {
            text: reply,
            context,
            refused: false,
        })
    }

    fn system_prompt(&self, context: &[Chunk]) -> String {
        let blocks = context
            .iter()
            .map(|chunk| {
                format!(
                    "{}\n{}",
                    self.language.citation(&chunk.metadata),
                    chunk.content.trim()
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        format!(
            "{}\n\n{}\n{}",
            self.language.answer_instruction(),
            self.language.context_heading(),
            blocks
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentMetadata;
    use crate::prompts::REFUSAL_EN;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CannedModel {
        reply: String,
        calls: AtomicUsize,
    }

    impl CannedModel {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ChatModel for CannedModel {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(messages[0].content.contains("(Source: brief.txt)"));
            assert!(messages[0].content.contains("The buyer is Jane Doe."));
            Ok(self.reply.clone())
        }
    }

    fn brief_chunk() -> Chunk {
        Chunk {
            chunk_id: "brief-0".to_string(),
            content: "The buyer is Jane Doe.".to_string(),
            metadata: DocumentMetadata {
                source: "brief.txt".to_string(),
                page: None,
            },
            start_char: 0,
            end_char: 22,
        }
    }

    #[tokio::test]
    async fn empty_context_refuses_without_calling_the_model() -> Result<(), ModelError> {
        let model = CannedModel::new("should not be used");
        let synthesizer = AnswerSynthesizer::new(model.clone(), Language::English);

        let answer = synthesizer.answer(Vec::new(), &[], "Who is the buyer?").await?;

        assert_eq!(answer.text, REFUSAL_EN);
        assert!(answer.refused);
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test]
    async fn grounded_reply_is_returned_with_its_context() -> Result<(), ModelError> {
        let model = CannedModel::new("The buyer is Jane Doe. (Source: brief.txt)");
        let synthesizer = AnswerSynthesizer::new(model.clone(), Language::English);

        let answer = synthesizer
            .answer(vec![brief_chunk()], &[], "Who is the buyer?")
            .await?;

        assert_eq!(answer.text, "The buyer is Jane Doe. (Source: brief.txt)");
        assert!(!answer.refused);
        assert_eq!(answer.context, vec![brief_chunk()]);
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn decorated_refusal_is_normalized() -> Result<(), ModelError> {
        let model = CannedModel::new(&format!("  {REFUSAL_EN}\n"));
        let synthesizer = AnswerSynthesizer::new(model, Language::English);

        let answer = synthesizer
            .answer(vec![brief_chunk()], &[], "Who is the seller?")
            .await?;

        assert_eq!(answer.text, REFUSAL_EN);
        assert!(answer.refused);
        Ok(())
    }
}
