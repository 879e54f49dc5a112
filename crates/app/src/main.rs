use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use pdf_chat_core::{
    load_documents, models, CharacterNgramEmbedder, EmbeddingService, GeminiChat, GeminiConfig,
    GeminiEmbeddings, IndexStore, PipelineOptions, SessionController, SessionError,
};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

type Embedder = Box<dyn EmbeddingService + Send + Sync>;

#[derive(Parser)]
#[command(name = "pdf-chat", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// API key for the Gemini embedding and chat endpoints
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Directory holding the persisted vector index
    #[arg(long, env = "PDF_CHAT_INDEX_DIR", default_value = models::DEFAULT_INDEX_DIR)]
    index_dir: PathBuf,

    /// Embedding backend used to build and query the index
    #[arg(long, value_enum, default_value_t = EmbedderKind::Gemini)]
    embedder: EmbedderKind,

    /// Embedding model identifier
    #[arg(long, env = "PDF_CHAT_EMBEDDING_MODEL", default_value = models::DEFAULT_EMBEDDING_MODEL)]
    embedding_model: String,

    /// Chat model identifier
    #[arg(long, env = "PDF_CHAT_MODEL", default_value = models::DEFAULT_CHAT_MODEL)]
    chat_model: String,

    /// Sampling temperature for answers
    #[arg(long, default_value_t = models::DEFAULT_TEMPERATURE)]
    temperature: f32,

    /// Maximum characters per chunk
    #[arg(long, default_value_t = models::DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Characters shared by consecutive chunks
    #[arg(long, default_value_t = models::DEFAULT_CHUNK_OVERLAP)]
    chunk_overlap: usize,

    /// Number of chunks retrieved per question
    #[arg(long, default_value_t = models::DEFAULT_TOP_K)]
    top_k: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum EmbedderKind {
    Gemini,
    /// Offline character-trigram embedder
    Local,
}

#[derive(Subcommand)]
enum Command {
    /// Extract, chunk and index PDFs, replacing the current index.
    Process {
        /// PDF files to process.
        files: Vec<PathBuf>,
        /// Folders searched recursively for PDFs.
        #[arg(long)]
        folder: Vec<PathBuf>,
    },
    /// Answer one question from the current index.
    Ask {
        #[arg(long)]
        question: String,
    },
    /// Answer one question per line read from stdin; a blank line exits.
    Chat,
    /// Show whether an index exists and what it was built from.
    Status,
}

impl Cli {
    fn options(&self) -> PipelineOptions {
        PipelineOptions {
            embedding_model: self.embedding_model.clone(),
            chat_model: self.chat_model.clone(),
            temperature: self.temperature,
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            top_k: self.top_k,
            index_dir: self.index_dir.clone(),
        }
    }

    fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    /// The key is only demanded by the calls that reach Gemini.
    fn session(&self, needs_chat: bool) -> anyhow::Result<SessionController<Embedder, GeminiChat>> {
        let options = self.options();
        if needs_chat || self.embedder == EmbedderKind::Gemini {
            self.api_key().context("GOOGLE_API_KEY is not set")?;
        }
        let config = GeminiConfig::new(self.api_key().unwrap_or_default());
        let embedder: Embedder = match self.embedder {
            EmbedderKind::Gemini => Box::new(GeminiEmbeddings::new(
                config.clone(),
                options.embedding_model.clone(),
            )),
            EmbedderKind::Local => Box::new(CharacterNgramEmbedder::default()),
        };
        let chat = GeminiChat::new(config, options.chat_model.clone());
        SessionController::new(embedder, chat, &options)
            .map_err(|error| anyhow::anyhow!(error.to_string()))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        index_dir = %cli.index_dir.display(),
        "pdf-chat boot"
    );

    match &cli.command {
        Command::Process { files, folder } => {
            let documents = load_documents(files, folder)
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            let mut session = cli.session(false)?;

            match session.process(&documents).await {
                Ok(report) => {
                    print_document_failures(&report.unreadable, &report.scanned);
                    println!(
                        "Processing complete! {} chunks indexed (dataset {}). You can now ask your question.",
                        report.chunk_count,
                        short_version(&report.dataset_version)
                    );
                }
                Err(SessionError::NoExtractableText { unreadable, scanned }) => {
                    print_document_failures(&unreadable, &scanned);
                    std::process::exit(1);
                }
                Err(error) => {
                    warn!(error = %error, "processing failed");
                    anyhow::bail!(error.user_message());
                }
            }
        }
        Command::Ask { question } => {
            if let Some(message) = missing_index_message(&cli) {
                eprintln!("{message}");
                std::process::exit(1);
            }
            let mut session = cli.session(true)?;
            if !answer(&mut session, question).await {
                std::process::exit(1);
            }
        }
        Command::Chat => {
            if let Some(message) = missing_index_message(&cli) {
                eprintln!("{message}");
                std::process::exit(1);
            }
            let mut session = cli.session(true)?;
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            let mut stdout = tokio::io::stdout();

            loop {
                stdout.write_all(b"Ask a question from your PDF files: ").await?;
                stdout.flush().await?;

                let Some(line) = lines.next_line().await? else {
                    break;
                };
                if line.trim().is_empty() {
                    break;
                }
                answer(&mut session, &line).await;
            }
        }
        Command::Status => {
            let store = IndexStore::new(cli.index_dir.clone());
            if !store.exists() {
                println!("no index at {}", store.path().display());
                return Ok(());
            }
            let manifest = store
                .read_manifest()
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            println!("index: {}", store.path().display());
            println!("  embedding_model={}", manifest.embedding_model);
            println!("  dimensions={}", manifest.dimensions);
            println!("  chunks={}", manifest.chunk_count);
            println!("  dataset_version={}", manifest.dataset_version);
            println!("  built_at={}", manifest.built_at.to_rfc3339());
        }
    }

    Ok(())
}

/// Run one ask and print the outcome. Returns whether an answer was produced.
async fn answer(session: &mut SessionController<Embedder, GeminiChat>, question: &str) -> bool {
    match session.ask(question).await {
        Ok(answer) => {
            println!("Question: {}", question.trim());
            println!("Reply: {}", answer.text.trim());
            true
        }
        Err(error) => {
            warn!(error = %error, "question failed");
            eprintln!("{}", error.user_message());
            false
        }
    }
}

/// Questions need a built index before any credentials matter.
fn missing_index_message(cli: &Cli) -> Option<String> {
    (!IndexStore::new(cli.index_dir.clone()).exists())
        .then(|| SessionError::IndexNotBuilt.user_message())
}

fn print_document_failures(unreadable: &BTreeMap<String, String>, scanned: &BTreeSet<String>) {
    for (name, reason) in unreadable {
        eprintln!("Failed to read {name}: {reason}");
    }
    for name in scanned {
        eprintln!("No extractable text found in {name}. Please upload a text-based PDF.");
    }
}

fn short_version(version: &str) -> &str {
    version.get(..12).unwrap_or(version)
}
