//! Configuration management for the evaluation client

use serde::Deserialize;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Evaluation service API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the evaluation service
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_base_url() -> String {
    std::env::var("PROOF_API_URL").unwrap_or_else(|_| "http://localhost:4000".to_string())
}

fn default_timeout() -> u64 {
    30
}

/// Tunables for the evaluation run itself
#[derive(Debug, Clone, Deserialize)]
pub struct EvaluationConfig {
    /// In-flight cap for the per-wallet fallback tier
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// In-flight cap for ENS resolution
    #[serde(default = "default_ens_concurrency")]
    pub ens_concurrency: usize,
    /// Re-evaluate one wallet after a batch success and warn on proof-hash
    /// mismatch
    #[serde(default)]
    pub verify_determinism: bool,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            ens_concurrency: default_ens_concurrency(),
            verify_determinism: false,
        }
    }
}

fn default_concurrency() -> usize {
    8
}

fn default_ens_concurrency() -> usize {
    5
}

/// Cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Maximum cache entries
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
    /// Cache TTL in seconds
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: default_max_capacity(),
            ttl_seconds: default_ttl(),
        }
    }
}

fn default_max_capacity() -> u64 {
    10_000
}

fn default_ttl() -> u64 {
    300 // 5 minutes
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            // Start with defaults
            .set_default("api.base_url", default_base_url())?
            .set_default("api.timeout_seconds", default_timeout() as i64)?
            .set_default("evaluation.concurrency", default_concurrency() as i64)?
            .set_default(
                "evaluation.ens_concurrency",
                default_ens_concurrency() as i64,
            )?
            .set_default("evaluation.verify_determinism", false)?
            .set_default("cache.max_capacity", default_max_capacity() as i64)?
            .set_default("cache.ttl_seconds", default_ttl() as i64)?
            // Load from file if present
            .add_source(config::File::with_name("proof-eval").required(false))
            // Override with environment variables (PROOF__API__BASE_URL, etc.)
            .add_source(
                config::Environment::with_prefix("PROOF")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = AppConfig::default();
        assert_eq!(config.api.timeout_seconds, 30);
        assert_eq!(config.evaluation.concurrency, 8);
        assert_eq!(config.evaluation.ens_concurrency, 5);
        assert!(!config.evaluation.verify_determinism);
        assert_eq!(config.cache.ttl_seconds, 300);
    }
}
