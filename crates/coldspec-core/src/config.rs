use std::collections::HashMap;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub embedding: EmbeddingConfig,
    pub generator: GeneratorConfig,
    pub extraction: ExtractionConfig,
    pub auth: AuthConfig,
    pub ingestion: IngestionConfig,
    pub retrieval: RetrievalConfig,
    pub server: ServerConfig,
}

impl AppConfig {
    /// Load configuration from environment variables with the default
    /// `COLDSPEC` prefix.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_env("COLDSPEC")
    }

    /// Load configuration from environment with a custom prefix.
    pub fn load_from_env(prefix: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(
                Environment::with_prefix(prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .set_default("database.url", "postgres://localhost/coldspec")?
            .set_default("database.max_connections", 20)?
            .set_default("database.min_connections", 5)?
            .set_default("embedding.api_url", "http://localhost:11434/api/embeddings")?
            .set_default("embedding.model", "nomic-embed-text")?
            .set_default("embedding.dimension", 1024)?
            .set_default("embedding.batch_size", 16)?
            .set_default("embedding.max_in_flight", 4)?
            .set_default("embedding.timeout_secs", 20)?
            .set_default("generator.api_url", "http://localhost:11434/api/generate")?
            .set_default("generator.model", "llama3.1:8b")?
            .set_default("generator.max_tokens", 2048)?
            .set_default("generator.temperature", 0.1)?
            .set_default("generator.timeout_secs", 60)?
            .set_default("extraction.api_url", "http://localhost:9300/extract")?
            .set_default("extraction.timeout_secs", 30)?
            .set_default("auth.api_keys", "dev-key-001:admin")?
            .set_default("ingestion.workers", 0)?
            .set_default("ingestion.max_upload_mb", 50)?
            .set_default("ingestion.supported_extensions", ".pdf,.txt,.md")?
            .set_default("ingestion.graceful_shutdown_secs", 30)?
            .set_default("retrieval.vector_top_k", 40)?
            .set_default("retrieval.keyword_top_k", 40)?
            .set_default("retrieval.rrf_k", 60)?
            .set_default("retrieval.context_budget_tokens", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8000)?;

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load configuration from file with environment overrides.
    pub fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("COLDSPEC").separator("__"));

        let config = builder.build()?;
        config.try_deserialize()
    }
}

/// Store connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    5
}

/// Embedding provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingConfig {
    pub api_url: String,
    pub model: String,
    /// Fixed output dimension; a deployment constant.
    pub dimension: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    #[serde(default = "default_embed_timeout")]
    pub timeout_secs: u64,
}

impl EmbeddingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_batch_size() -> usize {
    16
}

fn default_max_in_flight() -> usize {
    4
}

fn default_embed_timeout() -> u64 {
    20
}

/// Generator configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorConfig {
    pub api_url: String,
    pub model: String,
    #[serde(default = "default_gen_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_gen_temperature")]
    pub temperature: f32,
    #[serde(default = "default_gen_timeout")]
    pub timeout_secs: u64,
}

impl GeneratorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_gen_max_tokens() -> u32 {
    2048
}

fn default_gen_temperature() -> f32 {
    0.1
}

fn default_gen_timeout() -> u64 {
    60
}

/// External PDF text extraction service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionConfig {
    pub api_url: String,
    #[serde(default = "default_extract_timeout")]
    pub timeout_secs: u64,
}

impl ExtractionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_extract_timeout() -> u64 {
    30
}

/// Authentication configuration. Keys map to roles with the
/// `key1:role1,key2:role2` format.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub api_keys: String,
}

impl AuthConfig {
    /// Parse `key:role,key:role` into a lookup map.
    pub fn api_key_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        for pair in self.api_keys.split(',') {
            let pair = pair.trim();
            if let Some((key, role)) = pair.split_once(':') {
                map.insert(key.trim().to_string(), role.trim().to_string());
            }
        }
        map
    }
}

/// Ingestion pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct IngestionConfig {
    /// Worker pool size; 0 means `min(8, cores)`.
    #[serde(default)]
    pub workers: usize,
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: u64,
    #[serde(default = "default_supported_extensions")]
    pub supported_extensions: String,
    #[serde(default = "default_graceful_shutdown")]
    pub graceful_shutdown_secs: u64,
}

impl IngestionConfig {
    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get().min(8))
                .unwrap_or(4)
        }
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb * 1024 * 1024
    }

    pub fn supported_extension_list(&self) -> Vec<String> {
        self.supported_extensions
            .split(',')
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .collect()
    }

    pub fn graceful_shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.graceful_shutdown_secs)
    }
}

fn default_max_upload_mb() -> u64 {
    50
}

fn default_supported_extensions() -> String {
    ".pdf,.txt,.md".to_string()
}

fn default_graceful_shutdown() -> u64 {
    30
}

/// Retrieval engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub vector_top_k: usize,
    #[serde(default = "default_top_k")]
    pub keyword_top_k: usize,
    #[serde(default = "default_rrf_k")]
    pub rrf_k: usize,
    #[serde(default = "default_context_budget")]
    pub context_budget_tokens: usize,
}

fn default_top_k() -> usize {
    40
}

fn default_rrf_k() -> usize {
    60
}

fn default_context_budget() -> usize {
    3000
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_load() {
        let config = AppConfig::load_from_env("COLDSPEC_TEST_UNSET").unwrap();
        assert_eq!(config.embedding.dimension, 1024);
        assert_eq!(config.embedding.batch_size, 16);
        assert_eq!(config.retrieval.rrf_k, 60);
        assert_eq!(config.retrieval.context_budget_tokens, 3000);
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_api_key_map() {
        let auth = AuthConfig {
            api_keys: "dev-key-001:admin, se-key:sales_engineer".to_string(),
        };
        let map = auth.api_key_map();
        assert_eq!(map.get("dev-key-001").map(String::as_str), Some("admin"));
        assert_eq!(map.get("se-key").map(String::as_str), Some("sales_engineer"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_worker_count_defaults_to_bounded_parallelism() {
        let ingestion = IngestionConfig {
            workers: 0,
            max_upload_mb: 50,
            supported_extensions: ".pdf".to_string(),
            graceful_shutdown_secs: 30,
        };
        let n = ingestion.worker_count();
        assert!(n >= 1 && n <= 8);

        let pinned = IngestionConfig {
            workers: 3,
            ..ingestion
        };
        assert_eq!(pinned.worker_count(), 3);
    }

    #[test]
    fn test_extension_list_parsing() {
        let ingestion = IngestionConfig {
            workers: 1,
            max_upload_mb: 50,
            supported_extensions: ".pdf, .txt,.md,".to_string(),
            graceful_shutdown_secs: 30,
        };
        assert_eq!(ingestion.supported_extension_list(), vec![".pdf", ".txt", ".md"]);
    }
}
