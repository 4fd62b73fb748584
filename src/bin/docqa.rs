//! Docqa CLI
//!
//! Ingest extracted document text, then ask questions answered from the
//! most relevant chunks. All output is JSON on stdout; logs go to stderr.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use docqa_lib::{
    // Documents
    format_context, ingest_files, CachedEmbedder, HashEmbedder, Pipeline, RankedChunk,
    // Storage
    DocumentStore, Settings,
    // Sharing
    create_chat_session, create_shareable_link, get_document_by_share_token,
    resolve_shared_session, revoke_share_access,
};

type DocPipeline = Pipeline<CachedEmbedder<HashEmbedder>>;

#[derive(Parser)]
#[command(name = "docqa")]
#[command(about = "Docqa CLI - ask questions of ingested documents", long_about = None)]
struct Cli {
    /// Config file (default: <config dir>/docqa/config.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Override the data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index extracted text files (pages separated by form feeds)
    Ingest {
        /// Files to ingest
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Title (single file only; defaults to the file name)
        #[arg(short, long)]
        title: Option<String>,
        /// Maximum chunk length in characters
        #[arg(long)]
        max_chunk_size: Option<usize>,
    },
    /// List documents, newest first
    List,
    /// Show document title, chunk count, and creation time
    Info {
        document_id: String,
    },
    /// Retrieve the chunks most relevant to a question
    Ask {
        document_id: String,
        question: String,
        /// Number of chunks to return
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },
    /// Delete a document and its chunks
    Delete {
        document_id: String,
    },
    /// Share link commands
    Share {
        #[command(subcommand)]
        action: ShareAction,
    },
    /// Shared chat session commands
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
}

#[derive(Subcommand)]
enum ShareAction {
    /// Create (or reuse) a share link
    Create { document_id: String },
    /// Make a shared document private again
    Revoke { document_id: String },
    /// Look up the public document behind a share token
    Resolve { share_token: String },
}

#[derive(Subcommand)]
enum SessionAction {
    /// Open a chat session on a document
    Open { document_id: String },
    /// Ask a question through a session token
    Ask {
        session_token: String,
        question: String,
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },
}

// ============ Output Types ============

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ContextChunk {
    page: u32,
    score: f32,
    content: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AskOutput {
    document_id: String,
    question: String,
    found: bool,
    chunks: Vec<ContextChunk>,
    context: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionAskOutput {
    session_token: String,
    document_title: String,
    #[serde(flatten)]
    answer: AskOutput,
}

#[derive(Serialize)]
struct ErrorOutput {
    error: String,
}

// ============ Main ============

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(json) => println!("{}", json),
        Err(e) => {
            let error = ErrorOutput { error: format!("{:#}", e) };
            println!(
                "{}",
                serde_json::to_string(&error).unwrap_or_else(|_| r#"{"error":"unknown"}"#.to_string())
            );
            std::process::exit(1);
        }
    }
}

/// Structured logs to stderr; `RUST_LOG` overrides the default filter
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,docqa=info,docqa_lib=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<String> {
    let mut settings = Settings::load(cli.config.as_deref()).context("loading settings")?;
    if let Some(dir) = cli.data_dir {
        settings.data_dir = dir;
    }

    match cli.command {
        Commands::Ingest { files, title, max_chunk_size } => {
            if let Some(size) = max_chunk_size {
                settings.max_chunk_size = size;
            }
            settings.validate()?;
            handle_ingest(&settings, files, title).await
        }
        Commands::List => {
            let store = open_store(&settings)?;
            Ok(serde_json::to_string(&store.list_documents()?)?)
        }
        Commands::Info { document_id } => {
            let store = open_store(&settings)?;
            Ok(serde_json::to_string(&store.document_info(&document_id)?)?)
        }
        Commands::Ask { document_id, question, top_k } => {
            apply_top_k(&mut settings, top_k)?;
            let store = open_store(&settings)?;
            let output = ask_document(&store, &settings, &document_id, question)?;
            Ok(serde_json::to_string(&output)?)
        }
        Commands::Delete { document_id } => {
            let store = open_store(&settings)?;
            store.delete_document(&document_id)?;
            Ok(r#"{"status": "deleted"}"#.to_string())
        }
        Commands::Share { action } => handle_share(&settings, action),
        Commands::Session { action } => handle_session(&settings, action),
    }
}

fn open_store(settings: &Settings) -> anyhow::Result<DocumentStore> {
    DocumentStore::open(&settings.data_dir)
        .with_context(|| format!("opening store at {}", settings.data_dir.display()))
}

fn build_pipeline(settings: &Settings) -> DocPipeline {
    let embedder = CachedEmbedder::new(HashEmbedder::new(), settings.embedding_cache_capacity);
    Pipeline::new(embedder, settings.max_chunk_size)
}

fn apply_top_k(settings: &mut Settings, top_k: Option<usize>) -> anyhow::Result<()> {
    if let Some(k) = top_k {
        settings.top_k = k;
    }
    settings.validate()?;
    Ok(())
}

// ============ Handlers ============

async fn handle_ingest(
    settings: &Settings,
    files: Vec<PathBuf>,
    title: Option<String>,
) -> anyhow::Result<String> {
    let store = open_store(settings)?;
    let pipeline = Arc::new(build_pipeline(settings));
    let stored = ingest_files(&store, pipeline, files, title).await?;
    Ok(serde_json::to_string(&stored)?)
}

fn ask_document(
    store: &DocumentStore,
    settings: &Settings,
    document_id: &str,
    question: String,
) -> anyhow::Result<AskOutput> {
    let chunks = store.load_chunks(document_id)?;
    let ranked = build_pipeline(settings).answer_context(&question, &chunks, settings.top_k)?;
    Ok(ask_output(document_id, question, &ranked))
}

fn ask_output(document_id: &str, question: String, ranked: &[RankedChunk]) -> AskOutput {
    AskOutput {
        document_id: document_id.to_string(),
        question,
        found: !ranked.is_empty(),
        chunks: ranked.iter().map(|r| ContextChunk {
            page: r.chunk.page_number,
            score: r.score,
            content: r.chunk.content.clone(),
        }).collect(),
        context: format_context(ranked),
    }
}

fn handle_share(settings: &Settings, action: ShareAction) -> anyhow::Result<String> {
    let store = open_store(settings)?;
    match action {
        ShareAction::Create { document_id } => {
            let link = create_shareable_link(&store, &document_id)?;
            Ok(serde_json::to_string(&link)?)
        }
        ShareAction::Revoke { document_id } => {
            revoke_share_access(&store, &document_id)?;
            Ok(r#"{"status": "revoked"}"#.to_string())
        }
        ShareAction::Resolve { share_token } => {
            let document = get_document_by_share_token(&store, &share_token)?;
            Ok(serde_json::to_string(&document)?)
        }
    }
}

fn handle_session(settings: &Settings, action: SessionAction) -> anyhow::Result<String> {
    match action {
        SessionAction::Open { document_id } => {
            let store = open_store(settings)?;
            let session = create_chat_session(&store, &document_id)?;
            Ok(serde_json::to_string(&session)?)
        }
        SessionAction::Ask { session_token, question, top_k } => {
            let mut settings = settings.clone();
            apply_top_k(&mut settings, top_k)?;
            let store = open_store(&settings)?;

            let (session, document) = resolve_shared_session(&store, &session_token)?;
            let answer = ask_document(&store, &settings, &document.id, question)?;

            let output = SessionAskOutput {
                session_token: session.session_token,
                document_title: document.title,
                answer,
            };
            Ok(serde_json::to_string(&output)?)
        }
    }
}
