use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, SemaError};

/// Top-level configuration for the semantic engine.
///
/// Loaded from a TOML file and passed explicitly to each component at
/// construction time. Every section falls back to its defaults when absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SemaConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

impl SemaConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SemaConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.embedding.dimension == 0 {
            return Err(SemaError::Config(
                "embedding.dimension must be greater than 0".to_string(),
            ));
        }
        if self.ingest.batch_size == 0 {
            return Err(SemaError::Config(
                "ingest.batch_size must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(SemaError::Config(format!(
                "llm.temperature must be within 0.0..=2.0, got {}",
                self.llm.temperature
            )));
        }
        if self.index.path.as_os_str().is_empty() {
            return Err(SemaError::Config("index.path must not be empty".to_string()));
        }
        Ok(())
    }
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Base directory for relative data paths.
    pub data_dir: PathBuf,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            log_level: "info".to_string(),
        }
    }
}

/// Embedding model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Model identifier, used for logging and provenance.
    pub model: String,
    /// Output dimension. Overridden by the model when one is loaded.
    pub dimension: usize,
    /// Directory holding `model.onnx` and `tokenizer.json`.
    pub model_dir: Option<PathBuf>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "sentence-transformers/all-mpnet-base-v2".to_string(),
            dimension: 768,
            model_dir: None,
        }
    }
}

/// Nearest-neighbor strategy used by the vector index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Delegate storage and scanning to an optimized array library.
    #[default]
    Specialized,
    /// Explicit linear scan.
    BruteForce,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Specialized => f.write_str("specialized"),
            BackendKind::BruteForce => f.write_str("brute_force"),
        }
    }
}

/// Vector index settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Requested backend. Falls back to brute force if unavailable.
    pub backend: BackendKind,
    /// Base path of the persisted index artifacts.
    pub path: PathBuf,
}

impl IndexConfig {
    /// Resolve `path` against `data_dir` when it is relative.
    pub fn resolved_path(&self, general: &GeneralConfig) -> PathBuf {
        if self.path.is_absolute() {
            self.path.clone()
        } else {
            general.data_dir.join(&self.path)
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Specialized,
            path: PathBuf::from("faiss_index"),
        }
    }
}

/// Language-model endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// OpenAI-compatible base URL. No completions are requested when unset.
    pub endpoint: Option<String>,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub system_prompt: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: 0.3,
            max_tokens: 400,
            system_prompt: "You are a helpful AI assistant.".to_string(),
        }
    }
}

/// HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// Ingestion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Documents embedded per batch by the streaming consumer.
    pub batch_size: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self { batch_size: 64 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = SemaConfig::default();
        assert_eq!(config.embedding.dimension, 768);
        assert_eq!(config.index.backend, BackendKind::Specialized);
        assert_eq!(config.api.port, 8000);
        assert_eq!(config.llm.max_tokens, 400);
        assert!(config.llm.endpoint.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_valid_config() {
        let file = create_temp_config(
            r#"
[embedding]
dimension = 384

[index]
backend = "brute_force"
path = "/tmp/idx"

[llm]
endpoint = "http://localhost:11434/v1"
model = "llama3"
"#,
        );
        let config = SemaConfig::load(file.path()).unwrap();
        assert_eq!(config.embedding.dimension, 384);
        assert_eq!(config.index.backend, BackendKind::BruteForce);
        assert_eq!(config.index.path, PathBuf::from("/tmp/idx"));
        assert_eq!(config.llm.endpoint.as_deref(), Some("http://localhost:11434/v1"));
        assert_eq!(config.llm.model, "llama3");
        // Untouched sections keep their defaults.
        assert_eq!(config.api.port, 8000);
    }

    #[test]
    fn test_load_rejects_zero_dimension() {
        let file = create_temp_config("[embedding]\ndimension = 0\n");
        let err = SemaConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, SemaError::Config(_)));
    }

    #[test]
    fn test_load_rejects_unknown_backend() {
        let file = create_temp_config("[index]\nbackend = \"hnsw\"\n");
        assert!(SemaConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_validate_temperature_and_batch() {
        let mut config = SemaConfig::default();
        config.llm.temperature = 3.5;
        assert!(config.validate().is_err());

        let mut config = SemaConfig::default();
        config.ingest.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = SemaConfig::load_or_default(Path::new("/nonexistent/sema.toml"));
        assert_eq!(config.embedding.dimension, 768);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sema.toml");

        let mut config = SemaConfig::default();
        config.api.port = 9100;
        config.index.backend = BackendKind::BruteForce;
        config.save(&path).unwrap();

        let loaded = SemaConfig::load(&path).unwrap();
        assert_eq!(loaded.api.port, 9100);
        assert_eq!(loaded.index.backend, BackendKind::BruteForce);
    }

    #[test]
    fn test_resolved_index_path() {
        let general = GeneralConfig::default();
        let relative = IndexConfig::default();
        assert_eq!(
            relative.resolved_path(&general),
            PathBuf::from("data").join("faiss_index")
        );

        let absolute = IndexConfig {
            path: PathBuf::from("/var/lib/sema/idx"),
            ..Default::default()
        };
        assert_eq!(
            absolute.resolved_path(&general),
            PathBuf::from("/var/lib/sema/idx")
        );
    }

    #[test]
    fn test_backend_kind_display() {
        assert_eq!(BackendKind::Specialized.to_string(), "specialized");
        assert_eq!(BackendKind::BruteForce.to_string(), "brute_force");
    }
}
