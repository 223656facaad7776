pub mod ollama;

pub use ollama::{
    OllamaChatModel, OllamaEmbedder, DEFAULT_CHAT_MODEL, DEFAULT_EMBEDDING_MODEL, DEFAULT_OLLAMA_URL,
};
