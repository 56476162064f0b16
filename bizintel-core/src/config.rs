use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Environment variable holding the completion/embedding API credential.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Environment variable that overrides `retrieval.index_path`.
pub const INDEX_PATH_ENV: &str = "BIZINTEL_INDEX_PATH";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct BizintelConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub log_level: String,
    /// Upper bound on a single pipeline run, mirroring the host invocation timeout.
    pub invocation_timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            invocation_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8780,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    pub base_url: String,
    pub model: String,
    pub analysis_temperature: f32,
    pub analysis_max_tokens: u32,
    pub risk_temperature: f32,
    pub risk_max_tokens: u32,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
    pub request_timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-2024-08-06".to_string(),
            analysis_temperature: 0.2,
            analysis_max_tokens: 1000,
            risk_temperature: 0.3,
            risk_max_tokens: 2500,
            max_retries: 3,
            retry_delay_ms: 1000,
            max_delay_ms: 10_000,
            jitter: true,
            request_timeout_secs: 45,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub model: String,
    pub dimensions: usize,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
            max_retries: 3,
            retry_delay_ms: 500,
            max_delay_ms: 10_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Pre-built similarity index. `None` disables augmentation.
    pub index_path: Option<String>,
    pub top_k: usize,
    pub chunk_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            index_path: None,
            top_k: 4,
            chunk_chars: 1200,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PromptConfig {
    /// Longest rendered value accepted for a single request field.
    pub max_field_chars: usize,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            max_field_chars: 4000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ValidationConfig {
    pub reject_unknown_fields: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            reject_unknown_fields: true,
        }
    }
}

impl BizintelConfig {
    /// Load `path` (optional TOML file) layered under `BIZINTEL__SECTION__KEY`
    /// environment overrides.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("BIZINTEL")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;
        let mut config: Self = s.try_deserialize()?;

        if let Ok(index_path) = std::env::var(INDEX_PATH_ENV) {
            if !index_path.trim().is_empty() {
                config.retrieval.index_path = Some(index_path);
            }
        }

        Ok(config)
    }
}

/// Read the completion API key from the environment; blank counts as missing.
pub fn api_key_from_env() -> Option<String> {
    std::env::var(API_KEY_ENV)
        .ok()
        .filter(|k| !k.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_when_file_missing() {
        let config = BizintelConfig::load("/nonexistent/bizintel-test-config").unwrap();
        assert_eq!(config.http.port, 8780);
        assert_eq!(config.completion.max_retries, 3);
        assert!(config.validation.reject_unknown_fields);
        assert_eq!(config.retrieval.top_k, 4);
    }

    #[test]
    fn test_partial_file_keeps_section_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[completion]\nbase_url = \"http://localhost:9999\"\nmodel = \"test-model\"\n\
             analysis_temperature = 0.1\nanalysis_max_tokens = 10\nrisk_temperature = 0.1\n\
             risk_max_tokens = 10\nmax_retries = 1\nretry_delay_ms = 5\nmax_delay_ms = 50\n\
             jitter = false\nrequest_timeout_secs = 2\n\n[prompt]\nmax_field_chars = 12"
        )
        .unwrap();

        let config = BizintelConfig::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.completion.model, "test-model");
        assert!(!config.completion.jitter);
        assert_eq!(config.prompt.max_field_chars, 12);
        assert_eq!(config.http.host, "127.0.0.1");
    }
}
