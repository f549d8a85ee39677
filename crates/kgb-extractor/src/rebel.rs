//! REBEL relation extraction
//!
//! REBEL is a sequence-to-sequence model that linearises the triples it
//! finds as `<triplet> subject <subj> object <obj> relation`. A `<subj>`
//! right after a relation starts another object for the same subject.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::inference::InferenceClient;
use kgb_core::{Relation, RelationExtractor, RelationOrigin, Result, REBEL_CONFIDENCE};
use kgb_parser::{chunk_text, ChunkConfig};

const TRIPLET: &str = "<triplet>";
const SUBJ: &str = "<subj>";
const OBJ: &str = "<obj>";

/// Sequence markers stripped before decoding
const SPECIAL_TOKENS: &[&str] = &["<s>", "</s>", "<pad>"];

/// One decoded triple
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebelTriple {
    pub subject: String,
    pub relation: String,
    pub object: String,
}

impl RebelTriple {
    /// Convert into a graph relation
    pub fn into_relation(self, confidence: f32) -> Relation {
        Relation::new(self.subject, self.relation, self.object, RelationOrigin::Rebel)
            .with_confidence(confidence)
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Slot {
    None,
    Subject,
    Object,
    Relation,
}

/// Decode REBEL's linearised output into triples
///
/// Triples missing a subject, object or relation are dropped. Malformed
/// input yields whatever complete triples could be read.
pub fn parse_rebel_output(generated: &str) -> Vec<RebelTriple> {
    let mut text = generated.to_string();
    for token in SPECIAL_TOKENS {
        text = text.replace(token, " ");
    }
    for marker in [TRIPLET, SUBJ, OBJ] {
        text = text.replace(marker, &format!(" {marker} "));
    }

    let mut triples = Vec::new();
    let mut subject: Vec<&str> = Vec::new();
    let mut object: Vec<&str> = Vec::new();
    let mut relation: Vec<&str> = Vec::new();
    let mut slot = Slot::None;

    let mut flush = |subject: &[&str], object: &[&str], relation: &[&str]| {
        let triple = RebelTriple {
            subject: subject.join(" "),
            relation: relation.join(" "),
            object: object.join(" "),
        };
        if !triple.subject.is_empty() && !triple.object.is_empty() && !triple.relation.is_empty()
        {
            triples.push(triple);
        }
    };

    for word in text.split_whitespace() {
        match word {
            TRIPLET => {
                if slot == Slot::Relation {
                    flush(&subject, &object, &relation);
                }
                subject.clear();
                object.clear();
                relation.clear();
                slot = Slot::Subject;
            }
            SUBJ => {
                if slot == Slot::Relation {
                    flush(&subject, &object, &relation);
                }
                object.clear();
                relation.clear();
                slot = Slot::Object;
            }
            OBJ => {
                relation.clear();
                slot = Slot::Relation;
            }
            _ => match slot {
                Slot::Subject => subject.push(word),
                Slot::Object => object.push(word),
                Slot::Relation => relation.push(word),
                Slot::None => {}
            },
        }
    }

    if slot == Slot::Relation {
        flush(&subject, &object, &relation);
    }

    triples
}

/// Pull the generated text out of a text2text response
///
/// Accepts a bare string, `{"generated_text": ...}` or a list whose
/// first element has `generated_text`.
pub fn decode_generated_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Object(map) => map
            .get("generated_text")
            .and_then(Value::as_str)
            .map(str::to_string),
        Value::Array(items) => items
            .first()?
            .get("generated_text")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

/// Relation extractor backed by a hosted REBEL model
pub struct RebelExtractor {
    client: Arc<InferenceClient>,
    model: String,
    confidence: f32,
    chunk: ChunkConfig,
}

impl RebelExtractor {
    /// Create a new REBEL extractor
    pub fn new(client: Arc<InferenceClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            confidence: REBEL_CONFIDENCE,
            chunk: ChunkConfig::default(),
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Maximum characters sent per request
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk = ChunkConfig::with_size(chunk_size);
        self
    }

    async fn extract_chunk(&self, chunk: &str) -> Vec<RebelTriple> {
        let value = match self.client.infer::<Value>(&self.model, chunk, None).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(model = %self.model, error = %e, "REBEL request failed");
                return Vec::new();
            }
        };

        match decode_generated_text(&value) {
            Some(text) => parse_rebel_output(&text),
            None => {
                tracing::warn!(model = %self.model, "No valid REBEL output received");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl RelationExtractor for RebelExtractor {
    async fn extract(&self, text: &str) -> Result<Vec<Relation>> {
        let mut relations = Vec::new();

        for chunk in chunk_text(text, &self.chunk) {
            if chunk.content.trim().is_empty() {
                continue;
            }
            let triples = self.extract_chunk(&chunk.content).await;
            tracing::debug!(chunk = chunk.index, triples = triples.len(), "REBEL chunk decoded");

            relations.extend(
                triples
                    .into_iter()
                    .map(|triple| triple.into_relation(self.confidence)),
            );
        }

        Ok(relations)
    }

    fn name(&self) -> &str {
        "rebel"
    }
}

// ============================================================================
// Tests
// ============================================================================
