//! Environment-driven configuration for the landmarks vector pipeline.
//!
//! This module loads and validates settings once at startup (via `init_config`) and exposes
//! a global, read‑only view through `get_config`. The configuration powers the query API
//! server and the batch ingestion CLI and includes:
//!
//! - Vector index connectivity (`VECTOR_INDEX_URL`, `VECTOR_INDEX_NAME`, `VECTOR_API_KEY?`,
//!   `VECTOR_NAMESPACE?`).
//! - Landmark catalog and article-quality providers (`CATALOG_API_URL`, `QUALITY_API_URL?`).
//! - Embedding provider (`EMBEDDING_API_URL`, `EMBEDDING_API_KEY?`, `EMBEDDING_MODEL_ID`,
//!   `EMBEDDING_DIMENSION`, `EMBEDDING_BATCH_SIZE?`).
//! - Chunking (`CHUNK_SIZE_TOKENS?`, `CHUNK_OVERLAP_TOKENS?`).
//! - Source fetch limits (`PDF_MAX_BYTES?`, `PDF_READ_TIMEOUT_S?`, `WIKI_READ_TIMEOUT_S?`,
//!   `WIKI_CONNECT_TIMEOUT_S?`).
//! - Batch scheduling (`PARALLELISM?`, `PER_LANDMARK_TIMEOUT_S?`, `GLOBAL_TIMEOUT_S?`,
//!   `DELETE_EXISTING_ON_REPROCESS?`).
//! - Upsert behavior (`UPSERT_BATCH_SIZE?`, `UPSERT_MAX_RETRIES?`).
//! - Logging (`LOG_PROVIDER?`, `LOG_NAME_PREFIX?`) and the HTTP port (`SERVER_PORT?`).
//!
//! Most fields are optional with defaults matching the production deployment; invalid
//! combinations are flagged early with descriptive errors so misconfiguration is easy to
//! diagnose.
use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the pipeline and query server.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Base URL of the vector index that stores embeddings.
    pub vector_index_url: String,
    /// Name of the target index.
    pub vector_index_name: String,
    /// Optional API key required by the vector index.
    pub vector_api_key: Option<String>,
    /// Optional namespace within the index. `None` omits the field from requests entirely;
    /// an empty string is sent verbatim.
    pub vector_namespace: Option<String>,
    /// Base URL of the landmark catalog REST provider.
    pub catalog_api_url: String,
    /// Optional base URL of the article-quality prediction service.
    pub quality_api_url: Option<String>,
    /// Base URL of the embedding provider.
    pub embedding_api_url: String,
    /// Optional bearer token for the embedding provider.
    pub embedding_api_key: Option<String>,
    /// Embedding model identifier passed to the provider.
    pub embedding_model_id: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Maximum number of inputs sent per embedding request.
    pub embedding_batch_size: usize,
    /// Token budget per chunk.
    pub chunk_size_tokens: usize,
    /// Token overlap between adjacent chunks.
    pub chunk_overlap_tokens: usize,
    /// Maximum accepted PDF size in bytes.
    pub pdf_max_bytes: u64,
    /// Read timeout for PDF downloads.
    pub pdf_read_timeout: Duration,
    /// Read timeout for Wikipedia fetches.
    pub wiki_read_timeout: Duration,
    /// Connect timeout for Wikipedia fetches.
    pub wiki_connect_timeout: Duration,
    /// Timeout for individual catalog calls.
    pub catalog_timeout: Duration,
    /// Timeout for individual embedding calls.
    pub embedding_timeout: Duration,
    /// Timeout for individual vector store operations.
    pub vector_store_timeout: Duration,
    /// Number of concurrent ingestion workers.
    pub parallelism: usize,
    /// Per-landmark processing deadline.
    pub per_landmark_timeout: Duration,
    /// Deadline for a whole batch run (default 6 h); `GLOBAL_TIMEOUT_S=0` disables it.
    pub global_timeout: Option<Duration>,
    /// Number of vectors per upsert request.
    pub upsert_batch_size: usize,
    /// Maximum retries per upsert batch.
    pub upsert_max_retries: usize,
    /// Whether reprocessing deletes previously stored vectors first.
    pub delete_existing_on_reprocess: bool,
    /// Structured-log routing target.
    pub log_provider: LogProvider,
    /// Prefix applied to log file names when file logging is enabled.
    pub log_name_prefix: Option<String>,
    /// Optional directory receiving per-run result summaries.
    pub results_dir: Option<String>,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported log output providers.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogProvider {
    /// Human-readable compact output on stdout.
    Stdout,
    /// JSON output with flattened fields, suitable for Google Cloud Logging ingestion.
    Google,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let embedding_dimension = load_usize_with_default("EMBEDDING_DIMENSION", 1536)?;
        let chunk_size_tokens = load_usize_with_default("CHUNK_SIZE_TOKENS", 500)?;
        let chunk_overlap_tokens = load_usize_with_default("CHUNK_OVERLAP_TOKENS", 50)?;
        let parallelism = load_usize_with_default("PARALLELISM", 4)?;
        let upsert_batch_size = load_usize_with_default("UPSERT_BATCH_SIZE", 100)?;
        let embedding_batch_size = load_usize_with_default("EMBEDDING_BATCH_SIZE", 64)?;

        if embedding_dimension == 0 {
            return Err(ConfigError::InvalidValue(
                "EMBEDDING_DIMENSION must be at least 1".into(),
            ));
        }
        if chunk_size_tokens == 0 {
            return Err(ConfigError::InvalidValue(
                "CHUNK_SIZE_TOKENS must be at least 1".into(),
            ));
        }
        if chunk_overlap_tokens >= chunk_size_tokens {
            return Err(ConfigError::InvalidValue(
                "CHUNK_OVERLAP_TOKENS must be smaller than CHUNK_SIZE_TOKENS".into(),
            ));
        }
        if parallelism == 0 {
            return Err(ConfigError::InvalidValue(
                "PARALLELISM must be at least 1".into(),
            ));
        }
        if upsert_batch_size == 0 {
            return Err(ConfigError::InvalidValue(
                "UPSERT_BATCH_SIZE must be at least 1".into(),
            ));
        }
        if embedding_batch_size == 0 {
            return Err(ConfigError::InvalidValue(
                "EMBEDDING_BATCH_SIZE must be at least 1".into(),
            ));
        }

        Ok(Self {
            vector_index_url: load_env("VECTOR_INDEX_URL")?,
            vector_index_name: load_env("VECTOR_INDEX_NAME")?,
            vector_api_key: load_env_optional("VECTOR_API_KEY"),
            vector_namespace: load_env_verbatim("VECTOR_NAMESPACE"),
            catalog_api_url: load_env("CATALOG_API_URL")?,
            quality_api_url: load_env_optional("QUALITY_API_URL"),
            embedding_api_url: load_env("EMBEDDING_API_URL")?,
            embedding_api_key: load_env_optional("EMBEDDING_API_KEY"),
            embedding_model_id: load_env("EMBEDDING_MODEL_ID")?,
            embedding_dimension,
            embedding_batch_size,
            chunk_size_tokens,
            chunk_overlap_tokens,
            pdf_max_bytes: load_u64_with_default("PDF_MAX_BYTES", 52_428_800)?,
            pdf_read_timeout: load_secs_with_default("PDF_READ_TIMEOUT_S", 60.0)?,
            wiki_read_timeout: load_secs_with_default("WIKI_READ_TIMEOUT_S", 27.0)?,
            wiki_connect_timeout: load_secs_with_default("WIKI_CONNECT_TIMEOUT_S", 3.05)?,
            catalog_timeout: load_secs_with_default("CATALOG_TIMEOUT_S", 15.0)?,
            embedding_timeout: load_secs_with_default("EMBEDDING_TIMEOUT_S", 30.0)?,
            vector_store_timeout: load_secs_with_default("VECTOR_STORE_TIMEOUT_S", 20.0)?,
            parallelism,
            per_landmark_timeout: load_secs_with_default("PER_LANDMARK_TIMEOUT_S", 300.0)?,
            global_timeout: match load_env_optional("GLOBAL_TIMEOUT_S") {
                None => Some(Duration::from_secs(6 * 60 * 60)),
                Some(value) => {
                    let secs = value
                        .parse::<f64>()
                        .map_err(|_| ConfigError::InvalidValue("GLOBAL_TIMEOUT_S".into()))?;
                    (secs > 0.0).then(|| Duration::from_secs_f64(secs))
                }
            },
            upsert_batch_size,
            upsert_max_retries: load_usize_with_default("UPSERT_MAX_RETRIES", 3)?,
            delete_existing_on_reprocess: load_bool_with_default(
                "DELETE_EXISTING_ON_REPROCESS",
                true,
            )?,
            log_provider: load_env_optional("LOG_PROVIDER")
                .as_deref()
                .map(|value| match value.to_lowercase().as_str() {
                    "google" => Ok(LogProvider::Google),
                    "stdout" => Ok(LogProvider::Stdout),
                    _ => Err(ConfigError::InvalidValue("LOG_PROVIDER".into())),
                })
                .transpose()?
                .unwrap_or(LogProvider::Stdout),
            log_name_prefix: load_env_optional("LOG_NAME_PREFIX"),
            results_dir: load_env_optional("RESULTS_DIR"),
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        })
    }
}

fn load_usize_with_default(key: &str, default: usize) -> Result<usize, ConfigError> {
    match load_env_optional(key) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

fn load_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    match load_env_optional(key) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

fn load_secs_with_default(key: &str, default: f64) -> Result<Duration, ConfigError> {
    match load_env_optional(key) {
        Some(value) => value
            .parse::<f64>()
            .ok()
            .filter(|secs| *secs > 0.0)
            .map(Duration::from_secs_f64)
            .ok_or_else(|| ConfigError::InvalidValue(key.to_string())),
        None => Ok(Duration::from_secs_f64(default)),
    }
}

fn load_bool_with_default(key: &str, default: bool) -> Result<bool, ConfigError> {
    match load_env_optional(key) {
        Some(value) => match value.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue(key.to_string())),
        },
        None => Ok(default),
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

// Namespace semantics require distinguishing "unset" from "set to empty".
fn load_env_verbatim(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        vector_index_url = %config.vector_index_url,
        index = %config.vector_index_name,
        namespace = ?config.vector_namespace,
        catalog_api_url = %config.catalog_api_url,
        embedding_model = %config.embedding_model_id,
        embedding_dimension = config.embedding_dimension,
        chunk_size_tokens = config.chunk_size_tokens,
        chunk_overlap_tokens = config.chunk_overlap_tokens,
        parallelism = config.parallelism,
        upsert_batch_size = config.upsert_batch_size,
        log_provider = ?config.log_provider,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
