pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod fusion;
pub mod ingest;
pub mod lexical;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod prompts;
pub mod providers;
pub mod rewriter;
pub mod session;
pub mod synthesizer;
#[cfg(test)]
mod test_support;
pub mod traits;
pub mod vector_index;

pub use chunking::{build_chunks, normalize_whitespace, split_document, ChunkingConfig};
pub use embeddings::{cosine_similarity, CharacterNgramEmbedder, Embedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{ExtractionError, IngestError, ModelError, PipelineError, SearchError, StorageError};
pub use extractor::{extract_page_texts, extract_plain_text, PageText, PdfExtractor, SourceKind};
pub use fusion::{fuse, FusionRetriever};
pub use ingest::{
    discover_documents, ingest_folder, load_documents, IngestionReport, LoadReport, SkippedFile,
};
pub use lexical::LexicalRetriever;
pub use llm::ChatModel;
pub use models::{
    ChatMessage, Chunk, Document, DocumentMetadata, IndexedEntry, IngestionOptions, Language,
    RetrievalOptions, Role, ScoredChunk,
};
pub use pipeline::{ConversationalPipeline, Turn};
pub use prompts::{REFUSAL_EN, REFUSAL_ES};
pub use providers::{
    OllamaChatModel, OllamaEmbedder, DEFAULT_CHAT_MODEL, DEFAULT_EMBEDDING_MODEL, DEFAULT_OLLAMA_URL,
};
pub use rewriter::QueryRewriter;
pub use session::{InMemorySessionStore, SessionStore, DEFAULT_SESSION_ID};
pub use synthesizer::{Answer, AnswerSynthesizer};
pub use traits::Retriever;
pub use vector_index::{IndexManifest, VectorIndex};
