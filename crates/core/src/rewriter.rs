use crate::error::ModelError;
use crate::llm::ChatModel;
use crate::models::{ChatMessage, Language};
use std::sync::Arc;

/// Turns a follow-up question into a standalone retrieval query using the
/// conversation so far. The rewritten text only drives retrieval.
pub struct QueryRewriter {
    model: Arc<dyn ChatModel>,
    language: Language,
}

impl QueryRewriter {
    pub fn new(model: Arc<dyn ChatModel>, language: Language) -> Self {
        Self { model, language }
    }

    pub async fn rewrite(
        &self,
        history: &[ChatMessage],
        question: &str,
    ) -> Result<String, ModelError> {
        if history.is_empty() {
            return Ok(question.to_string());
        }

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(self.language.rewrite_instruction()));
        messages.extend(history.iter().cloned());
        messages.push(ChatMessage::user(question));

        self.model.complete(&messages).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingModel {
        calls: Mutex<Vec<Vec<ChatMessage>>>,
    }

    #[async_trait]
    impl ChatModel for RecordingModel {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ModelError> {
            self.calls
                .lock()
                .map_err(|_| ModelError::BackendResponse {
                    backend: "fake".to_string(),
                    details: "poisoned".to_string(),
                })?
                .push(messages.to_vec());
            Ok("What is the population of France?".to_string())
        }
    }

    #[tokio::test]
    async fn empty_history_returns_question_without_model_call() -> Result<(), ModelError> {
        let model = Arc::new(RecordingModel::default());
        let rewriter = QueryRewriter::new(model.clone(), Language::English);

        let rewritten = rewriter.rewrite(&[], "Who is the buyer?").await?;

        assert_eq!(rewritten, "Who is the buyer?");
        assert!(model.calls.lock().map(|calls| calls.is_empty()).unwrap_or(false));
        Ok(())
    }

    #[tokio::test]
    async fn history_is_sent_between_instruction_and_question() -> Result<(), ModelError> {
        let model = Arc::new(RecordingModel::default());
        let rewriter = QueryRewriter::new(model.clone(), Language::English);
        let history = vec![
            ChatMessage::user("What is the capital of France?"),
            ChatMessage::assistant("Paris."),
        ];

        let rewritten = rewriter.rewrite(&history, "And its population?").await?;
        assert_eq!(rewritten, "What is the population of France?");

        let calls = model.calls.lock().expect("lock is not poisoned");
        assert_eq!(calls.len(), 1);
        let roles = calls[0].iter().map(|message| message.role).collect::<Vec<_>>();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
        assert_eq!(calls[0][0].content, Language::English.rewrite_instruction());
        assert_eq!(calls[0][3].content, "And its population?");
        Ok(())
    }
}
