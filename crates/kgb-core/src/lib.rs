//! KGB Core - Domain models, traits, and shared types
//!
//! This crate defines the core abstractions used throughout the KGB system:
//! - Entity and relation models produced by extraction
//! - Common error types
//! - Extractor traits implemented by the NER and RE backends
//! - Configuration management

pub mod config;

pub use config::{
    AppConfig, ConfigError, DependencyConfig, ExtractionConfig, InferenceConfig, LoggingConfig,
    NerBackend, RenderConfig, ServerConfig,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for KGB operations
#[derive(Error, Debug)]
pub enum KgbError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Graph error: {0}")]
    Graph(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<ConfigError> for KgbError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, KgbError>;

// ============================================================================
// Confidence defaults
// ============================================================================

/// Confidence assigned to relations found by dependency rules
pub const DEPENDENCY_CONFIDENCE: f32 = 0.85;

/// Confidence assigned to relations decoded from the REBEL model
pub const REBEL_CONFIDENCE: f32 = 0.90;

/// Confidence used for edges that carry no explicit score
pub const DEFAULT_CONFIDENCE: f32 = 0.8;

// ============================================================================
// Entity Labels
// ============================================================================

/// Named entity labels (OntoNotes scheme, plus CoNLL `MISC`)
///
/// `Generic` is never produced by a recognizer; the graph uses it for
/// nodes that only appear as relation endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityLabel {
    Person,
    Norp,
    Fac,
    Org,
    Gpe,
    Loc,
    Product,
    Event,
    WorkOfArt,
    Law,
    Language,
    Date,
    Time,
    Percent,
    Money,
    Quantity,
    Ordinal,
    Cardinal,
    Misc,
    Generic,
}

impl EntityLabel {
    /// Labels kept by default when filtering recognizer output
    pub const DEFAULT_ALLOWED: [EntityLabel; 5] = [
        Self::Person,
        Self::Org,
        Self::Gpe,
        Self::Product,
        Self::Event,
    ];

    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Person => "PERSON",
            Self::Norp => "NORP",
            Self::Fac => "FAC",
            Self::Org => "ORG",
            Self::Gpe => "GPE",
            Self::Loc => "LOC",
            Self::Product => "PRODUCT",
            Self::Event => "EVENT",
            Self::WorkOfArt => "WORK_OF_ART",
            Self::Law => "LAW",
            Self::Language => "LANGUAGE",
            Self::Date => "DATE",
            Self::Time => "TIME",
            Self::Percent => "PERCENT",
            Self::Money => "MONEY",
            Self::Quantity => "QUANTITY",
            Self::Ordinal => "ORDINAL",
            Self::Cardinal => "CARDINAL",
            Self::Misc => "MISC",
            Self::Generic => "GENERIC",
        }
    }
}

impl std::fmt::Display for EntityLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityLabel {
    type Err = KgbError;

    fn from_str(s: &str) -> Result<Self> {
        // B-/I- prefixes show up when a token classifier runs without aggregation
        let tag = s.trim();
        let tag = tag
            .strip_prefix("B-")
            .or_else(|| tag.strip_prefix("I-"))
            .unwrap_or(tag);

        match tag.to_uppercase().as_str() {
            "PERSON" | "PER" => Ok(Self::Person),
            "NORP" => Ok(Self::Norp),
            "FAC" => Ok(Self::Fac),
            "ORG" => Ok(Self::Org),
            "GPE" => Ok(Self::Gpe),
            "LOC" => Ok(Self::Loc),
            "PRODUCT" => Ok(Self::Product),
            "EVENT" => Ok(Self::Event),
            "WORK_OF_ART" => Ok(Self::WorkOfArt),
            "LAW" => Ok(Self::Law),
            "LANGUAGE" => Ok(Self::Language),
            "DATE" => Ok(Self::Date),
            "TIME" => Ok(Self::Time),
            "PERCENT" => Ok(Self::Percent),
            "MONEY" => Ok(Self::Money),
            "QUANTITY" => Ok(Self::Quantity),
            "ORDINAL" => Ok(Self::Ordinal),
            "CARDINAL" => Ok(Self::Cardinal),
            "MISC" => Ok(Self::Misc),
            "GENERIC" => Ok(Self::Generic),
            _ => Err(KgbError::Validation(format!("Unknown entity label: {s}"))),
        }
    }
}

// ============================================================================
// Extraction Models
// ============================================================================

/// A named entity found in text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Surface text as it appears in the input
    pub text: String,

    /// Entity label
    pub label: EntityLabel,
}

impl Entity {
    /// Create a new entity
    pub fn new(text: impl Into<String>, label: EntityLabel) -> Self {
        Self {
            text: text.into(),
            label,
        }
    }
}

/// Which extractor produced a relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationOrigin {
    /// Subject-verb-object rules over a dependency parse
    Dependency,
    /// Triples decoded from the REBEL sequence-to-sequence model
    Rebel,
}

impl RelationOrigin {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dependency => "dependency",
            Self::Rebel => "rebel",
        }
    }
}

impl std::fmt::Display for RelationOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directed relation between two surface strings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    /// Subject text
    pub source: String,

    /// Object text
    pub target: String,

    /// Relation label (verb lemma or REBEL relation name)
    pub relation: String,

    /// Confidence score (0.0 - 1.0)
    pub confidence: f32,

    /// Extractor that produced this relation
    pub origin: RelationOrigin,
}

impl Relation {
    /// Create a new relation with the default confidence for its origin
    pub fn new(
        source: impl Into<String>,
        relation: impl Into<String>,
        target: impl Into<String>,
        origin: RelationOrigin,
    ) -> Self {
        let confidence = match origin {
            RelationOrigin::Dependency => DEPENDENCY_CONFIDENCE,
            RelationOrigin::Rebel => REBEL_CONFIDENCE,
        };

        Self {
            source: source.into(),
            target: target.into(),
            relation: relation.into(),
            confidence,
            origin,
        }
    }

    /// Override the confidence score
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Case-insensitive identity used for deduplication
    pub fn dedup_key(&self) -> (String, String, String) {
        (
            self.source.to_lowercase(),
            self.relation.to_lowercase(),
            self.target.to_lowercase(),
        )
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Trait for named entity recognizers
#[async_trait::async_trait]
pub trait EntityExtractor: Send + Sync {
    /// Extract entities from text (unfiltered, may contain duplicates)
    async fn extract(&self, text: &str) -> Result<Vec<Entity>>;

    /// Get extractor name for logging
    fn name(&self) -> &str;
}

/// Trait for relation extractors
#[async_trait::async_trait]
pub trait RelationExtractor: Send + Sync {
    /// Extract relations from text
    async fn extract(&self, text: &str) -> Result<Vec<Relation>>;

    /// Get extractor name for logging
    fn name(&self) -> &str;
}

// ============================================================================
// Tests
// ============================================================================
