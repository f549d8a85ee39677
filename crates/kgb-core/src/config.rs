//! KGB Configuration Management
//!
//! Handles configuration from environment variables, config files,
//! and command-line arguments with sensible defaults for development.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::EntityLabel;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Hosted inference API (NER and REBEL models)
    pub inference: InferenceConfig,

    /// Dependency parser service
    pub dependency: DependencyConfig,

    /// Extraction pipeline configuration
    pub extraction: ExtractionConfig,

    /// HTML rendering configuration
    pub render: RenderConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        self.apply_env()?;
        Ok(self)
    }

    /// Load from an optional file, then apply environment overrides
    pub fn load(path: Option<impl Into<PathBuf>>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path)?.with_env_override(),
            None => Self::from_env(),
        }
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        // Server
        if let Ok(host) = std::env::var("API_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("API_PORT") {
            self.server.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                key: "API_PORT".to_string(),
                value: port,
            })?;
        }

        // CORS origins from environment variable (comma-separated)
        if let Ok(origins) = std::env::var("CORS_ORIGINS") {
            self.server.cors_origins = split_list(&origins);
        }

        // Hosted inference
        if let Ok(token) = std::env::var("HF_API_TOKEN") {
            if !token.trim().is_empty() {
                self.inference.api_token = Some(token);
            }
        }
        if let Ok(url) = std::env::var("KGB_INFERENCE_URL") {
            self.inference.base_url = url;
        }
        if let Ok(model) = std::env::var("KGB_NER_MODEL") {
            self.inference.ner_model = model;
        }
        if let Ok(model) = std::env::var("KGB_REBEL_MODEL") {
            self.inference.rebel_model = model;
        }

        // Dependency parser
        if let Ok(url) = std::env::var("KGB_UDPIPE_URL") {
            self.dependency.udpipe_url = url;
        }
        if let Ok(model) = std::env::var("KGB_UDPIPE_MODEL") {
            self.dependency.model = model;
        }

        // Extraction
        if let Ok(backend) = std::env::var("KGB_NER_BACKEND") {
            self.extraction.ner_backend = backend.parse()?;
        }
        if let Ok(labels) = std::env::var("KGB_ALLOWED_LABELS") {
            self.extraction.allowed_labels = parse_labels("KGB_ALLOWED_LABELS", &labels)?;
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("LOG_FORMAT") {
            self.logging.json_format = format.eq_ignore_ascii_case("json");
        }

        Ok(())
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_labels(key: &str, value: &str) -> Result<Vec<EntityLabel>, ConfigError> {
    split_list(value)
        .into_iter()
        .map(|label| {
            label.parse().map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: label,
            })
        })
        .collect()
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes (uploads included)
    pub max_body_size: usize,

    /// Enable CORS
    pub cors_enabled: bool,

    /// Allowed origins for CORS
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_secs: 120,
            max_body_size: 20 * 1024 * 1024, // 20MB
            cors_enabled: true,
            // Empty by default for security - set via CORS_ORIGINS env var
            cors_origins: vec![],
        }
    }
}

/// Hosted inference API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Base URL; the model id is appended as a path
    pub base_url: String,

    /// Bearer token for the inference API
    pub api_token: Option<String>,

    /// Token-classification model used for NER; OntoNotes-trained so that
    /// PRODUCT and EVENT can be recognized
    pub ner_model: String,

    /// Sequence-to-triple model used for relation extraction
    pub rebel_model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api-inference.huggingface.co/models".to_string(),
            api_token: None,
            ner_model: "djagatiya/ner-roberta-base-ontonotesv5-englishv4".to_string(),
            rebel_model: "Babelscape/rebel-large".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Dependency parser service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DependencyConfig {
    /// UDPipe REST API root
    pub udpipe_url: String,

    /// UDPipe model name
    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for DependencyConfig {
    fn default() -> Self {
        Self {
            udpipe_url: "https://lindat.mff.cuni.cz/services/udpipe/api".to_string(),
            model: "english".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Extraction pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Entity labels kept after recognition
    pub allowed_labels: Vec<EntityLabel>,

    /// Which recognizer to use
    pub ner_backend: NerBackend,

    /// Minimum score for hosted NER spans
    pub min_ner_score: f32,

    /// Maximum bytes per hosted NER request
    pub ner_chunk_size: usize,

    /// Run subject-verb-object rules over the dependency parse
    pub enable_dependency: bool,

    /// Query the REBEL model
    pub enable_rebel: bool,

    /// Confidence for dependency-rule relations
    pub dependency_confidence: f32,

    /// Confidence for REBEL relations
    pub rebel_confidence: f32,

    /// Maximum characters per REBEL request
    pub rebel_chunk_size: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            allowed_labels: EntityLabel::DEFAULT_ALLOWED.to_vec(),
            ner_backend: NerBackend::Hosted,
            min_ner_score: 0.0,
            ner_chunk_size: 1500,
            enable_dependency: true,
            enable_rebel: true,
            dependency_confidence: crate::DEPENDENCY_CONFIDENCE,
            rebel_confidence: crate::REBEL_CONFIDENCE,
            rebel_chunk_size: 1500,
        }
    }
}

/// Supported NER backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NerBackend {
    /// Token-classification model on the inference API
    Hosted,
    /// Offline dictionary and pattern rules
    Rules,
}

impl std::str::FromStr for NerBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hosted" | "api" => Ok(Self::Hosted),
            "rules" | "rule" | "offline" => Ok(Self::Rules),
            _ => Err(ConfigError::InvalidValue {
                key: "KGB_NER_BACKEND".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// HTML rendering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Canvas height (CSS)
    pub height: String,

    /// Canvas width (CSS)
    pub width: String,

    /// Smallest zoom scale the viewer allows
    pub min_zoom: f64,

    /// Largest zoom scale the viewer allows
    pub max_zoom: f64,

    /// vis-network script URL
    pub vis_network_url: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            height: "850px".to_string(),
            width: "100%".to_string(),
            min_zoom: 0.3,
            max_zoom: 2.0,
            vis_network_url:
                "https://unpkg.com/vis-network@9.1.9/standalone/umd/vis-network.min.js"
                    .to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,

    /// Include file/line in logs
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            include_location: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.inference.rebel_model, "Babelscape/rebel-large");
        assert!(config.inference.ner_model.contains("ontonotes"));
        assert_eq!(config.extraction.allowed_labels.len(), 5);
        assert_eq!(config.extraction.ner_chunk_size, 1500);
        assert_eq!(config.render.height, "850px");
    }

    #[test]
    fn test_ner_backend_parse() {
        assert_eq!("hosted".parse::<NerBackend>().unwrap(), NerBackend::Hosted);
        assert_eq!("Rules".parse::<NerBackend>().unwrap(), NerBackend::Rules);
        assert!("spacy".parse::<NerBackend>().is_err());
    }

    #[test]
    fn test_parse_labels() {
        let labels = parse_labels("K", "person, org ,GPE").unwrap();
        assert_eq!(
            labels,
            vec![EntityLabel::Person, EntityLabel::Org, EntityLabel::Gpe]
        );
        assert!(parse_labels("K", "PERSON,ALIEN").is_err());
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 9090

[extraction]
ner_backend = "rules"
allowed_labels = ["PERSON", "ORG"]
enable_rebel = false
"#
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.extraction.ner_backend, NerBackend::Rules);
        assert_eq!(
            config.extraction.allowed_labels,
            vec![EntityLabel::Person, EntityLabel::Org]
        );
        assert!(!config.extraction.enable_rebel);
        assert!(config.extraction.enable_dependency);
    }

    #[test]
    fn test_from_file_missing() {
        let err = AppConfig::from_file("/nonexistent/kgb.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileReadError { .. }));
    }

    #[test]
    fn test_from_file_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nport = ").unwrap();

        let err = AppConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }
}
