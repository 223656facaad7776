use crate::error::ModelError;
use crate::models::ChatMessage;
use async_trait::async_trait;

/// A chat-completion capability. One call per invocation, no streaming.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ModelError>;
}
