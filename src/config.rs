use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable holding the shared API secret checked by the
/// `x-api-key` header on every API request.
pub const API_KEY_ENV: &str = "NEWSDESK_API_KEY";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub logs: LogsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

/// Chat-completion model settings, used for both intent extraction and
/// grounded answer generation.
#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Base URL for the Ollama provider (default `http://localhost:11434`).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: None,
            url: None,
            max_retries: default_max_retries(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Maximum number of articles returned per search.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogsConfig {
    /// Directory receiving the daily chat log and system log files.
    #[serde(default = "default_logs_dir")]
    pub dir: PathBuf,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            dir: default_logs_dir(),
        }
    }
}

fn default_llm_provider() -> String {
    "openai".to_string()
}
fn default_embedding_provider() -> String {
    "openai".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    60
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    5
}
fn default_batch_size() -> usize {
    64
}
fn default_top_k() -> usize {
    5
}
fn default_logs_dir() -> PathBuf {
    PathBuf::from("logs")
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    match config.llm.provider.as_str() {
        "openai" | "ollama" => {
            if config.llm.model.is_none() {
                anyhow::bail!(
                    "llm.model must be specified when provider is '{}'",
                    config.llm.provider
                );
            }
        }
        other => anyhow::bail!("Unknown llm provider: '{}'. Must be openai or ollama.", other),
    }

    match config.embedding.provider.as_str() {
        "openai" | "ollama" => {
            if config.embedding.model.is_none() {
                anyhow::bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                anyhow::bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be openai or ollama.",
            other
        ),
    }

    Ok(config)
}

/// Reads the shared API secret from the environment.
///
/// Required for `serve`; the key is compared against the `x-api-key`
/// request header.
pub fn api_key_from_env() -> Result<String> {
    std::env::var(API_KEY_ENV)
        .with_context(|| format!("{} environment variable not set", API_KEY_ENV))
}
