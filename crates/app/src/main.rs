use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use legal_qa_core::{
    ingest_folder, AnswerSynthesizer, CharacterNgramEmbedder, ChatModel, ConversationalPipeline,
    Embedder, FusionRetriever, InMemorySessionStore, IngestionOptions, Language, LexicalRetriever,
    OllamaChatModel, OllamaEmbedder, QueryRewriter, RetrievalOptions, VectorIndex,
    DEFAULT_CHAT_MODEL, DEFAULT_EMBEDDING_MODEL, DEFAULT_OLLAMA_URL,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "legal-qa", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory that holds the persisted vector index.
    #[arg(long, env = "LEGAL_QA_INDEX_DIR", default_value = "./vector_index")]
    index_dir: PathBuf,

    /// Ollama base URL
    #[arg(long, env = "OLLAMA_URL", default_value = DEFAULT_OLLAMA_URL)]
    ollama_url: String,

    /// Chat model used for rewriting and answering.
    #[arg(long, env = "LEGAL_QA_CHAT_MODEL", default_value = DEFAULT_CHAT_MODEL)]
    chat_model: String,

    /// Embedding model served by Ollama.
    #[arg(long, env = "LEGAL_QA_EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    embedding_model: String,

    #[arg(long, env = "LEGAL_QA_EMBEDDER", value_enum, default_value_t = EmbedderKind::Ollama)]
    embedder: EmbedderKind,

    /// Language of prompts, citations and the refusal sentence.
    #[arg(long, env = "LEGAL_QA_LANGUAGE", value_enum, default_value_t = AnswerLanguage::Es)]
    language: AnswerLanguage,

    #[arg(long, env = "LEGAL_QA_CHUNK_SIZE", default_value = "1000")]
    chunk_size: usize,

    #[arg(long, env = "LEGAL_QA_CHUNK_OVERLAP", default_value = "150")]
    chunk_overlap: usize,

    /// Hits requested from each retriever before fusion.
    #[arg(long, env = "LEGAL_QA_TOP_K", default_value = "2")]
    top_k: usize,

    #[arg(long, env = "LEGAL_QA_LEXICAL_WEIGHT", default_value = "0.5")]
    lexical_weight: f64,

    #[arg(long, env = "LEGAL_QA_VECTOR_WEIGHT", default_value = "0.5")]
    vector_weight: f64,
}

#[derive(Subcommand)]
enum Command {
    /// Load, chunk and index every PDF and text file under a folder.
    Ingest {
        /// Folder that contains the documents, searched recursively.
        #[arg(long)]
        folder: PathBuf,
    },
    /// Answer a single message.
    Ask {
        #[arg(long)]
        message: String,
        #[arg(long)]
        session_id: Option<String>,
    },
    /// Read messages from stdin, one per line, within one session.
    Chat {
        #[arg(long)]
        session_id: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum EmbedderKind {
    Ollama,
    /// Offline character trigram hashing.
    Ngram,
}

#[derive(Clone, Copy, ValueEnum)]
enum AnswerLanguage {
    Es,
    En,
}

impl From<AnswerLanguage> for Language {
    fn from(value: AnswerLanguage) -> Self {
        match value {
            AnswerLanguage::Es => Language::Spanish,
            AnswerLanguage::En => Language::English,
        }
    }
}

type Pipeline =
    ConversationalPipeline<FusionRetriever<LexicalRetriever, VectorIndex>, InMemorySessionStore>;

impl Cli {
    fn embedder(&self) -> anyhow::Result<Arc<dyn Embedder>> {
        Ok(match self.embedder {
            EmbedderKind::Ollama => Arc::new(OllamaEmbedder::new(
                &self.ollama_url,
                self.embedding_model.clone(),
            )?),
            EmbedderKind::Ngram => Arc::new(CharacterNgramEmbedder::default()),
        })
    }

    fn ingestion_options(&self) -> IngestionOptions {
        IngestionOptions {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
        }
    }

    fn retrieval_options(&self) -> RetrievalOptions {
        RetrievalOptions {
            k_per_retriever: self.top_k,
            lexical_weight: self.lexical_weight,
            vector_weight: self.vector_weight,
        }
    }

    fn open_index(&self) -> anyhow::Result<VectorIndex> {
        VectorIndex::open(self.index_dir.clone(), self.embedder()?)
            .with_context(|| format!("unable to open index at {}", self.index_dir.display()))
    }

    fn pipeline(&self) -> anyhow::Result<Pipeline> {
        let index = self.open_index()?;
        if index.is_empty() {
            warn!(
                index_dir = %self.index_dir.display(),
                "vector index is empty; every question will be refused until documents are ingested"
            );
        }

        let language = Language::from(self.language);
        let model: Arc<dyn ChatModel> =
            Arc::new(OllamaChatModel::new(&self.ollama_url, self.chat_model.clone())?);
        let options = self.retrieval_options();

        Ok(ConversationalPipeline::new(
            QueryRewriter::new(model.clone(), language),
            FusionRetriever::from_index(index, &options),
            AnswerSynthesizer::new(model, language),
            InMemorySessionStore::new(),
            &options,
        ))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "legal-qa boot"
    );

    let outcome = match &cli.command {
        Command::Ingest { folder } => run_ingest(&cli, folder).await,
        Command::Ask {
            message,
            session_id,
        } => run_ask(&cli, message, session_id.as_deref()).await,
        Command::Chat { session_id } => run_chat(&cli, session_id.clone()).await,
    };

    if let Err(failure) = &outcome {
        error!(error = %format!("{failure:#}"), "command failed");
    }
    outcome
}

async fn run_ingest(cli: &Cli, folder: &Path) -> anyhow::Result<()> {
    let mut index = cli.open_index()?;
    let report = ingest_folder(folder, &cli.ingestion_options(), &mut index)
        .await
        .with_context(|| format!("ingestion of {} failed", folder.display()))?;

    if !report.skipped_files.is_empty() {
        warn!(
            "skipped_files={} for folder={}",
            report.skipped_files.len(),
            folder.display()
        );
        for skipped in &report.skipped_files {
            warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped file");
        }
    }

    println!(
        "{} documents, {} chunks, {} new entries indexed into {} at {}",
        report.documents,
        report.chunks,
        report.added,
        cli.index_dir.display(),
        Utc::now().to_rfc3339()
    );
    Ok(())
}

async fn run_ask(cli: &Cli, message: &str, session_id: Option<&str>) -> anyhow::Result<()> {
    let pipeline = cli.pipeline()?;
    let answer = pipeline.respond(message, session_id).await?;
    println!("{answer}");
    Ok(())
}

async fn run_chat(cli: &Cli, session_id: Option<String>) -> anyhow::Result<()> {
    let pipeline = cli.pipeline()?;
    let session_id = session_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    info!(session_id = %session_id, "chat session started");

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    stdout.write_all(b"> ").await?;
    stdout.flush().await?;
    while let Some(line) = lines.next_line().await? {
        let message = line.trim();
        if !message.is_empty() {
            let reply = match pipeline.respond(message, Some(&session_id)).await {
                Ok(answer) => answer,
                Err(failure) => {
                    error!(session_id = %session_id, error = %failure, "turn failed");
                    "Sorry, something went wrong while answering. Please try again.".to_string()
                }
            };
            stdout.write_all(format!("{reply}\n").as_bytes()).await?;
        }
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
    }

    Ok(())
}
