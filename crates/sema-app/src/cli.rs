//! CLI argument definitions for the `sema` binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Semantic engine: index documents, answer questions over them, serve HTTP.
#[derive(Parser, Debug)]
#[command(name = "sema", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Data directory holding the persisted index.
    #[arg(short = 'd', long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Start the HTTP API.
    Serve {
        /// API server port.
        #[arg(short = 'p', long = "port")]
        port: Option<u16>,
    },
    /// Index a newline-delimited text or JSON-lines file and save the index.
    Ingest {
        file: PathBuf,
    },
    /// Answer a question from the persisted index and print JSON.
    Query {
        text: String,
        #[arg(short = 'k', long = "top-k", default_value_t = 5)]
        top_k: usize,
    },
    /// Index documents streamed on stdin until EOF, then save the index.
    Stream,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > SEMA_CONFIG env var > ./sema.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("SEMA_CONFIG") {
            return PathBuf::from(p);
        }
        PathBuf::from("sema.toml")
    }

    /// Resolve the API server port.
    ///
    /// Priority: --port flag > SEMA_PORT env var > config file value.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        if let Command::Serve { port: Some(p) } = self.command {
            return p;
        }
        if let Ok(val) = std::env::var("SEMA_PORT") {
            if let Ok(p) = val.parse::<u16>() {
                return p;
            }
        }
        config_port
    }

    /// Resolve the log level, falling back to the config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}
