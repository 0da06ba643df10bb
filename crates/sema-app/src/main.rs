//! `sema` binary - composition root.
//!
//! 1. Parse CLI and load configuration from TOML
//! 2. Open (or create) the persisted vector index
//! 3. Build the embedder, retriever and completer
//! 4. Run the requested subcommand

mod cli;

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use sema_api::{start_server, AppState};
use sema_core::config::SemaConfig;
use sema_index::{build_embedder, read_documents, Retriever, StreamIngestor, VectorIndex};
use sema_rag::{build_completer, RagPipeline};

use cli::{CliArgs, Command};

fn load_config(path: &Path) -> Result<SemaConfig, Box<dyn std::error::Error>> {
    if path.exists() {
        Ok(SemaConfig::load(path)?)
    } else {
        tracing::info!(path = %path.display(), "No configuration file, using defaults");
        Ok(SemaConfig::default())
    }
}

fn open_retriever(config: &SemaConfig) -> Result<Arc<Retriever>, Box<dyn std::error::Error>> {
    let embedder = build_embedder(&config.embedding);
    let index_path = config.index.resolved_path(&config.general);
    let index = Arc::new(VectorIndex::open_or_create(
        embedder.dimension(),
        config.index.backend,
        &index_path,
    )?);
    tracing::info!(
        model = embedder.model_name(),
        dimension = index.dimension(),
        backend = %index.backend(),
        documents = index.len(),
        "Retriever ready"
    );
    Ok(Arc::new(Retriever::new_dyn(index, embedder)))
}

fn save_index(config: &SemaConfig, retriever: &Retriever) -> Result<(), Box<dyn std::error::Error>> {
    let index_path = config.index.resolved_path(&config.general);
    retriever.index().save(&index_path)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config is read before tracing starts, so its own log lines are dropped.
    let config_file = args.resolve_config_path();
    let mut config = load_config(&config_file)?;
    if let Some(dir) = &args.data_dir {
        config.general.data_dir = dir.clone();
    }

    let level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level)),
        )
        .init();

    tracing::info!("Starting sema v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration resolved");

    let retriever = open_retriever(&config)?;

    match args.command {
        Command::Serve { .. } => {
            config.api.port = args.resolve_port(config.api.port);
            let api_config = config.api.clone();
            let completer = build_completer(&config.llm);
            let state = AppState::new(config, retriever, completer);
            start_server(&api_config, state).await?;
        }
        Command::Ingest { ref file } => {
            let docs = read_documents(file)?;
            let mut indexed = 0;
            for batch in docs.chunks(config.ingest.batch_size) {
                indexed += retriever.index_documents(batch.to_vec()).await?;
            }
            save_index(&config, &retriever)?;
            println!(
                "{}",
                serde_json::json!({ "indexed": indexed, "total": retriever.index().len() })
            );
        }
        Command::Query { ref text, top_k } => {
            let pipeline = RagPipeline::new(Arc::clone(&retriever), build_completer(&config.llm));
            let answer = pipeline.answer(text, top_k).await?;
            println!("{}", serde_json::to_string_pretty(&answer)?);
        }
        Command::Stream => {
            let ingestor = StreamIngestor::new(Arc::clone(&retriever), config.ingest.batch_size);
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            let report = ingestor.run(stdin).await?;
            save_index(&config, &retriever)?;
            println!("{}", serde_json::to_string(&report)?);
        }
    }

    Ok(())
}
