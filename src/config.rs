//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub similarity: SimilarityConfig,
    #[serde(default)]
    pub decision: DecisionConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Allowed CORS origins (empty = any origin)
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout_secs(),
            cors_allowed_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Paths of the artifacts produced by the training job
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_classifier_path")]
    pub classifier_path: String,
    #[serde(default = "default_scaler_path")]
    pub scaler_path: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            classifier_path: default_classifier_path(),
            scaler_path: default_scaler_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimilarityConfig {
    /// Labeled transaction CSV
    #[serde(default = "default_dataset_path")]
    pub dataset_path: String,
    /// Persisted index snapshot
    #[serde(default = "default_index_path")]
    pub index_path: String,
    /// Embedding dimensions
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
    /// Ignore an existing snapshot and rebuild from the dataset
    #[serde(default)]
    pub rebuild_on_start: bool,
    /// Write the snapshot after building from the dataset
    #[serde(default = "default_true")]
    pub save_after_build: bool,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            dataset_path: default_dataset_path(),
            index_path: default_index_path(),
            dimensions: default_dimensions(),
            rebuild_on_start: false,
            save_after_build: true,
        }
    }
}

/// Classifier / similarity gate
#[derive(Debug, Clone, Deserialize)]
pub struct DecisionConfig {
    /// Below this confidence the similarity fallback runs
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    /// Neighbors fetched when falling back
    #[serde(default = "default_fallback_k")]
    pub fallback_k: usize,
    /// Include the neighbors in the response
    #[serde(default = "default_true")]
    pub attach_similar: bool,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            fallback_k: default_fallback_k(),
            attach_similar: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: default_cache_ttl_secs(),
            max_entries: default_cache_max_entries(),
        }
    }
}

/// Settings for talking to a running analyzer service
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_client_base_url")]
    pub base_url: String,
    #[serde(default = "default_client_timeout_ms")]
    pub timeout_ms: u64,
    /// Give up retrying after this long
    #[serde(default = "default_client_max_elapsed_ms")]
    pub max_elapsed_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_client_base_url(),
            timeout_ms: default_client_timeout_ms(),
            max_elapsed_ms: default_client_max_elapsed_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    8000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_classifier_path() -> String {
    "artifacts/classifier.json".into()
}

fn default_scaler_path() -> String {
    "artifacts/scaler.json".into()
}

fn default_dataset_path() -> String {
    "data/data.csv".into()
}

fn default_index_path() -> String {
    "artifacts/wallet_index.bin".into()
}

fn default_dimensions() -> usize {
    384
}

fn default_confidence_threshold() -> f64 {
    0.4
}

fn default_fallback_k() -> usize {
    1
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_cache_max_entries() -> usize {
    10_000
}

fn default_client_base_url() -> String {
    "http://127.0.0.1:8000".into()
}

fn default_client_timeout_ms() -> u64 {
    10_000
}

fn default_client_max_elapsed_ms() -> u64 {
    5_000
}

fn default_log_level() -> String {
    "info".into()
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix WALLET_ANALYZER_)
            .add_source(
                config::Environment::with_prefix("WALLET_ANALYZER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let threshold = self.decision.confidence_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            anyhow::bail!("confidence_threshold must be in (0, 1], got {}", threshold);
        }

        if self.decision.fallback_k == 0 {
            anyhow::bail!("fallback_k must be at least 1");
        }

        if self.similarity.dimensions == 0 {
            anyhow::bail!("similarity dimensions must be positive");
        }

        if self.server.port == 0 {
            anyhow::bail!("server port must be non-zero");
        }

        if self.cache.enabled && self.cache.max_entries == 0 {
            anyhow::bail!("cache max_entries must be positive when the cache is enabled");
        }

        url::Url::parse(&self.client.base_url)
            .with_context(|| format!("Invalid client base_url: {}", self.client.base_url))?;

        if self.similarity.rebuild_on_start && !Path::new(&self.similarity.dataset_path).exists() {
            tracing::warn!(
                "rebuild_on_start is set but dataset {} does not exist",
                self.similarity.dataset_path
            );
        }

        Ok(())
    }

    /// Get configuration for display
    pub fn masked_display(&self) -> String {
        format!(
            r#"Configuration:
  Server:
    bind: {}
    request_timeout: {}s
    cors_origins: {}
  Model:
    classifier: {}
    scaler: {}
  Similarity:
    dataset: {}
    index: {}
    dimensions: {}
    rebuild_on_start: {}
  Decision:
    confidence_threshold: {}
    fallback_k: {}
    attach_similar: {}
  Cache:
    enabled: {}
    ttl: {}s
    max_entries: {}
  Client:
    base_url: {}
    timeout: {}ms
  Logging:
    level: {}
    json: {}
"#,
            self.server.bind_address(),
            self.server.request_timeout_secs,
            if self.server.cors_allowed_origins.is_empty() {
                "(any)".to_string()
            } else {
                self.server.cors_allowed_origins.join(", ")
            },
            self.model.classifier_path,
            self.model.scaler_path,
            self.similarity.dataset_path,
            self.similarity.index_path,
            self.similarity.dimensions,
            self.similarity.rebuild_on_start,
            self.decision.confidence_threshold,
            self.decision.fallback_k,
            self.decision.attach_similar,
            self.cache.enabled,
            self.cache.ttl_secs,
            self.cache.max_entries,
            mask_url(&self.client.base_url),
            self.client.timeout_ms,
            self.logging.level,
            self.logging.json,
        )
    }
}

/// Mask URL for display (hide API keys in query params)
fn mask_url(url: &str) -> String {
    if let Some(idx) = url.find('?') {
        format!("{}?***", &url[..idx])
    } else {
        url.to_string()
    }
}
