//! Configuration management for DocChat
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default.toml, config/{APP_ENV}.toml, config/local.toml)
//! - Default values
//!
//! Every component receives the section it needs at construction time; there is
//! no process-wide model state.

use crate::errors::{AppError, Result};
use crate::hierarchy::{validate_tier_sizes, SizeUnit};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable consulted when no API key is configured
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Source document configuration
    #[serde(default)]
    pub source: SourceConfig,

    /// Index layout and chunking configuration
    #[serde(default)]
    pub index: IndexConfig,

    /// Embedding service configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Retrieval configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Rerank configuration
    #[serde(default)]
    pub rerank: RerankConfig,

    /// Language model configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    /// Sharing link or direct URL of the PDF
    #[serde(default = "default_source_url")]
    pub url: String,

    /// Directory the PDF is downloaded into
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Fixed file name inside the download directory
    #[serde(default = "default_file_name")]
    pub file_name: String,

    /// Download timeout in seconds
    #[serde(default = "default_download_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexConfig {
    /// Directory holding the persisted docstore and vector store
    #[serde(default = "default_persist_dir")]
    pub persist_dir: PathBuf,

    /// Tier sizes from coarsest to finest
    #[serde(default = "default_chunk_sizes")]
    pub chunk_sizes: Vec<usize>,

    /// Unit the tier sizes are measured in
    #[serde(default)]
    pub size_unit: SizeUnit,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: openai, hash
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// API key for embedding service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension for the hash provider and for OpenAI-compatible
    /// models outside the known OpenAI table
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Batch size for embedding requests
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    /// Number of leaf chunks fetched by vector similarity
    #[serde(default = "default_similarity_top_k")]
    pub similarity_top_k: usize,

    /// Fraction of a parent's children that must be present (strictly exceeded) to merge
    #[serde(default = "default_merge_ratio_threshold")]
    pub merge_ratio_threshold: f32,

    /// Insert a single missing sibling between two retrieved siblings
    #[serde(default = "default_fill_gaps")]
    pub fill_gaps: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RerankConfig {
    /// Rerank provider: http, lexical
    #[serde(default = "default_rerank_provider")]
    pub provider: String,

    /// Rerank endpoint (text-embeddings-inference style)
    #[serde(default = "default_rerank_endpoint")]
    pub endpoint: String,

    /// Optional bearer token for the rerank endpoint
    pub api_key: Option<String>,

    /// Cross-encoder model name
    #[serde(default = "default_rerank_model")]
    pub model: String,

    /// Number of chunks kept after reranking
    #[serde(default = "default_rerank_top_n")]
    pub top_n: usize,

    /// Request timeout in seconds
    #[serde(default = "default_rerank_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// Language model provider: openai, echo
    #[serde(default = "default_llm_provider")]
    pub provider: String,

    /// API key
    pub api_key: Option<String>,

    /// API base URL
    #[serde(default = "default_llm_api_base")]
    pub api_base: String,

    /// Model name
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum output tokens (provider default when unset)
    pub max_tokens: Option<u32>,

    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// System prompt sent ahead of every question
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error); RUST_LOG takes precedence
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logging: bool,

    /// Service name attached to log lines
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_source_url() -> String {
    "https://drive.google.com/file/d/1PK7kkvKwCvTumbnoYsLReV68jFexJ06X/view?usp=sharing".to_string()
}
fn default_download_dir() -> PathBuf { PathBuf::from("pdfs") }
fn default_file_name() -> String { "downloaded_file.pdf".to_string() }
fn default_download_timeout() -> u64 { 120 }
fn default_persist_dir() -> PathBuf { PathBuf::from("merging_index") }
fn default_chunk_sizes() -> Vec<usize> { vec![2048, 512, 128] }
fn default_embedding_provider() -> String { "openai".to_string() }
fn default_embedding_model() -> String { "text-embedding-3-large".to_string() }
fn default_embedding_dimension() -> usize { 3072 }
fn default_embedding_timeout() -> u64 { 30 }
fn default_batch_size() -> usize { 100 }
fn default_similarity_top_k() -> usize { 12 }
fn default_merge_ratio_threshold() -> f32 { 0.5 }
fn default_fill_gaps() -> bool { true }
fn default_rerank_provider() -> String { "http".to_string() }
fn default_rerank_endpoint() -> String { "http://localhost:8081/rerank".to_string() }
fn default_rerank_model() -> String { "BAAI/bge-reranker-base".to_string() }
fn default_rerank_top_n() -> usize { 6 }
fn default_rerank_timeout() -> u64 { 30 }
fn default_llm_provider() -> String { "openai".to_string() }
fn default_llm_api_base() -> String { "https://api.openai.com/v1".to_string() }
fn default_llm_model() -> String { "gpt-3.5-turbo".to_string() }
fn default_temperature() -> f32 { 0.1 }
fn default_llm_timeout() -> u64 { 60 }
fn default_system_prompt() -> String {
    "You are a friendly assistant that answers questions about a PDF document.".to_string()
}
fn default_log_level() -> String { "info".to_string() }
fn default_service_name() -> String { "docchat".to_string() }

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: default_source_url(),
            download_dir: default_download_dir(),
            file_name: default_file_name(),
            timeout_secs: default_download_timeout(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            persist_dir: default_persist_dir(),
            chunk_sizes: default_chunk_sizes(),
            size_unit: SizeUnit::default(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            api_base: None,
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_embedding_timeout(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            similarity_top_k: default_similarity_top_k(),
            merge_ratio_threshold: default_merge_ratio_threshold(),
            fill_gaps: default_fill_gaps(),
        }
    }
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            provider: default_rerank_provider(),
            endpoint: default_rerank_endpoint(),
            api_key: None,
            model: default_rerank_model(),
            top_n: default_rerank_top_n(),
            timeout_secs: default_rerank_timeout(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            api_key: None,
            api_base: default_llm_api_base(),
            model: default_llm_model(),
            temperature: default_temperature(),
            max_tokens: None,
            timeout_secs: default_llm_timeout(),
            system_prompt: default_system_prompt(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: false,
            service_name: default_service_name(),
        }
    }
}

fn env_source() -> Environment {
    // e.g., APP__RETRIEVAL__SIMILARITY_TOP_K=8, APP__INDEX__CHUNK_SIZES=1024,256,64
    Environment::with_prefix("APP")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("index.chunk_sizes")
        .try_parsing(true)
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> std::result::Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(env_source())
            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> std::result::Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?;

        config.try_deserialize()
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        validate_tier_sizes(&self.index.chunk_sizes)?;

        if self.retrieval.similarity_top_k == 0 {
            return Err(AppError::config("retrieval.similarity_top_k must be at least 1"));
        }
        if !(0.0..1.0).contains(&self.retrieval.merge_ratio_threshold) {
            return Err(AppError::config(format!(
                "retrieval.merge_ratio_threshold must be in [0, 1), got {}",
                self.retrieval.merge_ratio_threshold
            )));
        }
        if self.rerank.top_n == 0 {
            return Err(AppError::config("rerank.top_n must be at least 1"));
        }
        if self.embedding.batch_size == 0 {
            return Err(AppError::config("embedding.batch_size must be at least 1"));
        }
        Ok(())
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.source.timeout_secs)
    }
}

/// Configured key, falling back to `OPENAI_API_KEY`
pub fn resolve_api_key(configured: &Option<String>) -> Option<String> {
    configured
        .clone()
        .filter(|k| !k.trim().is_empty())
        .or_else(|| std::env::var(OPENAI_API_KEY_ENV).ok())
        .filter(|k| !k.trim().is_empty())
}
