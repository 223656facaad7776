use std::path::PathBuf;
use thiserror::Error;

/// Per-file failure while turning a source file into documents. Never fatal
/// for an ingestion run: the file is skipped and reported.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("file is not valid utf-8 text: {0}")]
    InvalidText(String),

    #[error("no readable text in {0}")]
    EmptyContent(String),

    #[error("path has no file name: {0}")]
    MissingFileName(String),
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("source directory does not exist: {}", .0.display())]
    MissingDirectory(PathBuf),

    #[error("no documents could be loaded from {}", .0.display())]
    NoDocuments(PathBuf),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt index file {} (line {line}): {details}", path.display())]
    Corrupt {
        path: PathBuf,
        line: usize,
        details: String,
    },

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("embedding dimension {found} does not match index dimension {expected}")]
    DimensionMismatch { expected: usize, found: usize },
}

/// Failure of the embedding provider or the chat model. Propagated as-is,
/// nothing in the crate retries.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("message is empty")]
    EmptyMessage,

    #[error("retrieval failed: {0}")]
    Retrieval(#[from] SearchError),

    #[error("model call failed: {0}")]
    Model(#[from] ModelError),
}
