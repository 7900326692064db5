//! # Bonsai Sensei
//!
//! Retrieval-augmented bonsai-care Q&A backend.
//!
//! Usage:
//!   bonsai serve                  # Start the HTTP API (default 127.0.0.1:8000)
//!   bonsai embed                  # chunks.json -> chunks_with_embeddings.json
//!   bonsai build-index            # chunks_with_embeddings.json -> flat index + metadata
//!   bonsai search                 # Interactive top-K search over the knowledge base
//!   bonsai ask "水やりの頻度は？"  # One-shot question

use anyhow::{Context, Result};
use bonsai_agent::{Agent, AnswerGenerator};
use bonsai_core::config::{BonsaiConfig, RetrievalMode};
use bonsai_core::traits::{ChatModel, Embedder};
use bonsai_knowledge::{CosineRetriever, EmbeddingCache, IndexRetriever, KnowledgeStore, Retriever};
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bonsai", version, about = "Bonsai Sensei: bonsai-care Q&A backend")]
struct Cli {
    /// Config file (defaults to $BONSAI_CONFIG, ./bonsai.toml, ~/.bonsai/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP API server
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
        /// Retrieval path, overrides `retrieval.mode`
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
    },
    /// Embed every chunk of the knowledge source file
    Embed {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Build the flat L2 index and metadata sidecar from embedded chunks
    BuildIndex {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        index: Option<PathBuf>,
        #[arg(long)]
        meta: Option<PathBuf>,
    },
    /// Interactive search; prints ranked chunks for each line read from stdin
    Search {
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
    },
    /// Answer one question and exit
    Ask {
        question: String,
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum ModeArg {
    Index,
    Cosine,
}

impl From<ModeArg> for RetrievalMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Index => RetrievalMode::Index,
            ModeArg::Cosine => RetrievalMode::Cosine,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = load_dotenv(None);
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "bonsai=debug,bonsai_agent=debug,bonsai_knowledge=debug,bonsai_providers=debug,bonsai_gateway=debug,tower_http=debug"
    } else {
        "bonsai=info,bonsai_agent=info,bonsai_knowledge=info,bonsai_providers=info,bonsai_gateway=info"
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    if cli.log_json {
        tracing_subscriber::fmt().json().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).with_target(false).init();
    }
    if let Err(e) = dotenv {
        tracing::warn!("ignoring unreadable .env file: {e}");
    }

    let mut config = match &cli.config {
        Some(path) => BonsaiConfig::load_from(path),
        None => BonsaiConfig::load(),
    }
    .context("failed to load configuration")?;

    match cli.command {
        Command::Serve { host, port, mode } => {
            if let Some(host) = host {
                config.gateway.host = host;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }
            if let Some(mode) = mode {
                config.retrieval.mode = mode.into();
            }
            let agent = build_agent(&config).await?;

            println!("🌳 Bonsai Sensei v{}", env!("CARGO_PKG_VERSION"));
            println!("   Retrieval: {}", agent.retriever().kind());
            println!("   Chunks:    {}", agent.retriever().len());
            println!("   Listening: http://{}:{}", config.gateway.host, config.gateway.port);

            let state = bonsai_gateway::AppState::new(config, agent);
            bonsai_gateway::start(state).await?;
        }
        Command::Embed { input, output } => {
            let input = input.unwrap_or_else(|| config.knowledge.chunks_path());
            let output = output.unwrap_or_else(|| config.knowledge.embedded_path());
            let provider = bonsai_providers::create_provider(&config.llm)?;
            let stats = bonsai_knowledge::generate_embedding_file(&input, &output, &provider).await?;
            println!("✅ Embedded {} chunks (dim {}) -> {}", stats.chunks, stats.dim, output.display());
        }
        Command::BuildIndex { input, index, meta } => {
            let input = input.unwrap_or_else(|| config.knowledge.embedded_path());
            let index = index.unwrap_or_else(|| config.knowledge.index_path());
            let meta = meta.unwrap_or_else(|| config.knowledge.meta_path());
            let stats = bonsai_knowledge::build_index_files(&input, &index, &meta)?;
            println!("✅ Indexed {} chunks (dim {})", stats.chunks, stats.dim);
            println!("   Index:    {}", index.display());
            println!("   Metadata: {}", meta.display());
        }
        Command::Search { top_k, mode } => {
            if let Some(mode) = mode {
                config.retrieval.mode = mode.into();
            }
            let provider = Arc::new(bonsai_providers::create_provider(&config.llm)?);
            let retriever = build_retriever(&config, provider).await?;
            let top_k = top_k.unwrap_or(config.retrieval.default_top_k);
            search_repl(retriever.as_ref(), top_k).await?;
        }
        Command::Ask { question, top_k, mode } => {
            if let Some(mode) = mode {
                config.retrieval.mode = mode.into();
            }
            let agent = build_agent(&config).await?;
            let resp = agent.ask(&question, top_k).await?;
            println!("{}", resp.answer);
            println!();
            for hit in &resp.matched_chunks {
                println!("  [{}] {} ({}) score={:.4}", hit.rank, hit.title, hit.category, hit.score);
            }
        }
    }

    Ok(())
}

/// Load `.env` (or `path`) into the environment. A missing file is fine.
fn load_dotenv(path: Option<&Path>) -> std::result::Result<(), dotenvy::Error> {
    let loaded = match path {
        Some(path) => dotenvy::from_path(path),
        None => dotenvy::dotenv().map(|_| ()),
    };
    match loaded {
        Err(e) if e.not_found() => Ok(()),
        other => other,
    }
}

/// Create the provider (fails fast without a credential), load the knowledge
/// base once and wire the agent.
async fn build_agent(config: &BonsaiConfig) -> Result<Agent> {
    let provider = Arc::new(bonsai_providers::create_provider(&config.llm)?);
    let chat: Arc<dyn ChatModel> = provider.clone();
    let retriever = build_retriever(config, provider).await?;
    let generator = AnswerGenerator::from_config(chat, &config.llm, &config.answer);
    Ok(Agent::new(retriever, generator, &config.retrieval))
}

async fn build_retriever<E>(config: &BonsaiConfig, embedder: Arc<E>) -> Result<Arc<dyn Retriever>>
where
    E: Embedder + 'static,
{
    let embedder: Arc<dyn Embedder> = embedder;
    let knowledge = &config.knowledge;
    match config.retrieval.mode {
        RetrievalMode::Index => {
            let retriever = IndexRetriever::open(&knowledge.index_path(), &knowledge.meta_path(), embedder)
                .context("failed to open flat index; run `bonsai embed` and `bonsai build-index` first")?;
            Ok(Arc::new(retriever))
        }
        RetrievalMode::Cosine => {
            let embedded_path = knowledge.embedded_path();
            let cache = if embedded_path.exists() {
                EmbeddingCache::from_embedded(KnowledgeStore::load_embedded_chunks(&embedded_path)?)?
            } else {
                let chunks = KnowledgeStore::load_chunks(&knowledge.chunks_path())?;
                tracing::warn!(
                    chunks = chunks.len(),
                    "no precomputed embeddings at {}, embedding every chunk now",
                    embedded_path.display()
                );
                EmbeddingCache::build(chunks, embedder.as_ref()).await?
            };
            tracing::info!(chunks = cache.len(), dim = ?cache.dim(), "embedding cache ready");
            Ok(Arc::new(CosineRetriever::new(cache, embedder)))
        }
    }
}

async fn search_repl(retriever: &dyn Retriever, top_k: usize) -> Result<()> {
    println!("🔎 {} chunks loaded ({} search). Empty line or Ctrl-D to quit.", retriever.len(), retriever.kind());
    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let query = line.trim();
        if query.is_empty() {
            break;
        }
        match retriever.search(query, top_k).await {
            Ok(results) if results.is_empty() => println!("(no results)"),
            Ok(results) => {
                for r in results {
                    match r.distance {
                        Some(d) => println!("[{}] {} ({}) score={:.4} distance={:.4}", r.rank, r.title, r.category, r.score, d),
                        None => println!("[{}] {} ({}) score={:.4}", r.rank, r.title, r.category, r.score),
                    }
                    println!("    {}", r.summary);
                }
            }
            Err(e) => eprintln!("❌ {e}"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_env_file(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("bonsai-dotenv-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_dotenv_missing_file_is_ok() {
        assert!(load_dotenv(Some(Path::new("/nonexistent/bonsai/.env"))).is_ok());
    }

    #[test]
    fn test_load_dotenv_reports_malformed_file() {
        let path = temp_env_file("bad.env", "BONSAI_TEST_DOTENV=\"unterminated\n");
        let err = load_dotenv(Some(&path)).unwrap_err();
        assert!(!err.not_found());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_dotenv_sets_variables() {
        let path = temp_env_file("good.env", "BONSAI_TEST_DOTENV_OK=sensei\n");
        load_dotenv(Some(&path)).unwrap();
        assert_eq!(std::env::var("BONSAI_TEST_DOTENV_OK").unwrap(), "sensei");
        std::fs::remove_file(&path).ok();
    }
}
