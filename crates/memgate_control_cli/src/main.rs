use clap::{Parser, Subcommand};
use dotenvy::from_path as dotenv_from_path;
use memgate_config::{ConfigReport, OrchestratorConfig, RetrievalScope};
use memgate_consent::ConsentGate;
use memgate_embedding::{
    resolve_provider, EmbeddingCredentials, EmbeddingProvider, EmbeddingProviderKind, EmbeddingService, LocalProvider,
};
use memgate_embedding::{GeminiProvider as EmbeddingGeminiProvider, OpenAiCompatProvider as EmbeddingOpenAiProvider};
use memgate_events::{EventBus, StatsCollector};
use memgate_memory::{MemoryRepository, SearchScope};
use memgate_providers::{GeminiProvider as AnswerGeminiProvider, OpenAiCompatProvider as AnswerOpenAiProvider, Orchestrator};
use memgate_redaction::RedactionEngine;
use memgate_retrieval::RetrievalController;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
enum CliError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("repository error: {0}")]
    Repository(#[from] memgate_memory::RepositoryError),
    #[error("startup configuration had errors: {0:?}")]
    Config(Vec<String>),
}

#[derive(Parser)]
#[command(name = "memgate-control", version, about = "memgate retrieval-core control-plane utilities")]
struct Args {
    /// Directory holding documents.json / user_facts.json / stats.json / the embedding cache.
    #[arg(long, global = true, default_value = "runtime/memory")]
    data_dir: PathBuf,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the `query_personal_memory` pipeline and print the resulting payload.
    Query {
        topic: String,
    },
    /// Run the `save_memory` tool.
    SaveFact {
        fact: String,
        #[arg(long)]
        category: Option<String>,
    },
    /// Save a document chunk directly, bypassing file ingestion (ingestion itself is out of scope here).
    SaveDocument {
        #[arg(long)]
        text: String,
        #[arg(long)]
        source: String,
    },
    /// Grant a pending high-risk topic, permitting one follow-up query to succeed.
    ConsentGrant {
        topic: String,
    },
    /// Erase a pending consent grant without consuming it.
    ConsentDeny {
        topic: String,
    },
    /// Print the persisted stats snapshot, if one exists.
    Stats,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();
    if let Err(e) = run().await {
        eprintln!("ERROR: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    let args = Args::parse();

    load_dotenv();
    std::fs::create_dir_all(&args.data_dir)?;

    let report = memgate_config::from_process_env();
    for warning in &report.warnings {
        eprintln!("config warning: {warning}");
    }
    if !report.errors.is_empty() {
        for err in &report.errors {
            eprintln!("config error: {err}");
        }
        return Err(CliError::Config(report.errors));
    }

    let controller = build_controller(&args.data_dir, &report).await?;

    match args.cmd {
        Command::Query { topic } => {
            println!("{}", controller.handle_query(&topic).await);
        }
        Command::SaveFact { fact, category } => {
            println!("{}", controller.save_memory(&fact, category.as_deref()).await);
        }
        Command::SaveDocument { text, source } => {
            controller.repository().save_document(&text, &source).await?;
            println!("MEMORY_SAVED: {text}");
        }
        Command::ConsentGrant { topic } => {
            controller.consent().grant(&topic).await;
            println!("consent granted for '{topic}'");
        }
        Command::ConsentDeny { topic } => {
            controller.consent().deny(&topic).await;
            println!("consent denied/cleared for '{topic}'");
        }
        Command::Stats => {
            let path = args.data_dir.join("stats.json");
            match std::fs::read(&path) {
                Ok(bytes) => println!("{}", String::from_utf8_lossy(&bytes)),
                Err(_) => println!("{{}}"),
            }
        }
    }

    Ok(())
}

fn load_dotenv() {
    if Path::new(".env").exists() {
        let _ = dotenv_from_path(".env");
        eprintln!("loaded env from ./.env");
    }
}

async fn build_controller(data_dir: &Path, report: &ConfigReport) -> Result<RetrievalController, CliError> {
    let config = &report.config;

    let creds = EmbeddingCredentials {
        gemini_key: config.gemini_key.clone(),
        openai_compatible_key: config.openai_compatible_key.clone(),
    };
    let embedding_kind = resolve_provider(config.embedding_provider, &creds);
    let embedding_provider: Arc<dyn EmbeddingProvider> = build_embedding_provider(embedding_kind, config);
    let embedder = EmbeddingService::new(embedding_provider, config.retrieval.embedding_dim, &data_dir.join("embedding_cache.json"));

    let scope = match config.retrieval.scope {
        RetrievalScope::Hybrid => SearchScope::Hybrid,
        RetrievalScope::FactsOnly => SearchScope::FactsOnly,
        RetrievalScope::DocumentsOnly => SearchScope::DocumentsOnly,
    };
    let repository = MemoryRepository::open(embedder, data_dir, scope, config.retrieval.strict_match)?;

    let redactor = RedactionEngine::new();
    let consent = ConsentGate::new(Duration::from_millis(config.consent.ttl_ms));
    let bus = EventBus::new(config.event_ring_capacity);
    let (_collector, _subscription) = StatsCollector::attach(&bus, Some(data_dir.join("stats.json"))).await;

    let orchestrator = build_orchestrator(&config.orchestrator);

    Ok(RetrievalController::new(
        repository,
        redactor,
        consent,
        orchestrator,
        bus,
        config.retrieval.top_k,
        config.retrieval.max_result_chars,
        config.consent.enabled,
        config.privacy_debug,
        !config.orchestrator.extractive_mode,
    ))
}

fn build_embedding_provider(kind: EmbeddingProviderKind, config: &memgate_config::RuntimeConfig) -> Arc<dyn EmbeddingProvider> {
    match kind {
        EmbeddingProviderKind::Local => Arc::new(LocalProvider),
        EmbeddingProviderKind::OpenAiCompatible => Arc::new(EmbeddingOpenAiProvider::new(
            config.orchestrator.base_url.clone(),
            config.openai_compatible_key.clone().unwrap_or_default(),
            embedding_model_env().unwrap_or_else(|| "text-embedding-3-small".to_string()),
        )),
        EmbeddingProviderKind::Gemini => Arc::new(EmbeddingGeminiProvider::new(
            config.orchestrator.base_url.clone(),
            config.gemini_key.clone().unwrap_or_default(),
            embedding_model_env().unwrap_or_else(|| "text-embedding-004".to_string()),
            config.retrieval.embedding_dim,
        )),
    }
}

fn embedding_model_env() -> Option<String> {
    std::env::var("MEMGATE_EMBEDDING_MODEL").ok().filter(|s| !s.is_empty())
}

fn build_orchestrator(config: &OrchestratorConfig) -> Orchestrator {
    if config.extractive_mode {
        return Orchestrator::extractive();
    }
    let grounding_mode = config.grounding_mode;
    let provider: Box<dyn memgate_providers::Provider> = match config.provider_alias.as_str() {
        "gemini" => Box::new(AnswerGeminiProvider::new(
            config.base_url.clone(),
            std::env::var("MEMGATE_GEMINI_API_KEY").unwrap_or_default(),
            config.model_id.clone(),
        )),
        _ => Box::new(AnswerOpenAiProvider::new(
            config.base_url.clone(),
            std::env::var("MEMGATE_OPENAI_COMPATIBLE_API_KEY").ok(),
            config.model_id.clone(),
        )),
    };
    Orchestrator::remote(provider, grounding_mode)
}
