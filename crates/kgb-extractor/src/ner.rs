//! Named Entity Recognition (NER) module
//!
//! Provides two recognizers behind the `EntityExtractor` trait:
//! - Hosted: a token-classification model on the inference API
//! - Rule-based: regex patterns + dictionary matching, for offline use
//!
//! Recognizer output is filtered to an allowed label set and
//! deduplicated case-insensitively by `filter_entities`.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;

use crate::inference::InferenceClient;
use kgb_core::{Entity, EntityExtractor, EntityLabel, KgbError, Result};
use kgb_parser::{chunk_text, ChunkConfig};

// ============================================================================
// Filtering
// ============================================================================

/// Keep entities whose label is allowed, dropping case-insensitive
/// duplicates of the text. The first occurrence wins and order is kept.
pub fn filter_entities(raw: Vec<Entity>, allowed: &[EntityLabel]) -> Vec<Entity> {
    let mut seen = HashSet::new();

    raw.into_iter()
        .filter(|e| allowed.contains(&e.label))
        .filter(|e| !e.text.trim().is_empty())
        .filter(|e| seen.insert(e.text.to_lowercase()))
        .collect()
}

// ============================================================================
// Hosted NER
// ============================================================================

/// Span returned by a token-classification model
#[derive(Debug, Deserialize)]
struct TokenSpan {
    #[serde(alias = "entity")]
    entity_group: String,
    score: f32,
    word: String,
    start: Option<usize>,
    end: Option<usize>,
}

/// NER backed by a hosted token-classification model
pub struct HostedNer {
    client: Arc<InferenceClient>,
    model: String,
    min_score: f32,
    chunk: ChunkConfig,
}

impl HostedNer {
    /// Create a new hosted NER
    pub fn new(client: Arc<InferenceClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            min_score: 0.0,
            chunk: ChunkConfig::default(),
        }
    }

    /// Maximum bytes per request, to stay inside the model's token window
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk = ChunkConfig::with_size(chunk_size);
        self
    }

    /// Drop spans scoring below `score`
    pub fn with_min_score(mut self, score: f32) -> Self {
        self.min_score = score.clamp(0.0, 1.0);
        self
    }

    /// Map a model tag onto the label scheme used by the graph
    fn map_label(tag: &str) -> Option<EntityLabel> {
        match tag.parse::<EntityLabel>().ok()? {
            // CoNLL models only know LOC; cities and countries are GPE downstream
            EntityLabel::Loc => Some(EntityLabel::Gpe),
            label => Some(label),
        }
    }

    /// Convert model output into entities
    fn parse_response(&self, value: serde_json::Value, text: &str) -> Result<Vec<Entity>> {
        let spans: Vec<TokenSpan> = serde_json::from_value(value)
            .map_err(|e| KgbError::Inference(format!("Unexpected NER output: {e}")))?;

        let entities = spans
            .into_iter()
            .filter(|span| span.score >= self.min_score)
            .filter_map(|span| {
                let label = Self::map_label(&span.entity_group)?;
                let surface = match (span.start, span.end) {
                    // Offsets are in characters, not bytes
                    (Some(start), Some(end)) if end > start => text
                        .chars()
                        .skip(start)
                        .take(end - start)
                        .collect::<String>(),
                    _ => span.word.replace(" ##", "").replace("##", ""),
                };
                let surface = surface.trim();
                (!surface.is_empty()).then(|| Entity::new(surface, label))
            })
            .collect();

        Ok(entities)
    }
}

#[async_trait]
impl EntityExtractor for HostedNer {
    async fn extract(&self, text: &str) -> Result<Vec<Entity>> {
        let mut entities = Vec::new();

        // Span offsets are relative to the chunk that was sent
        for chunk in chunk_text(text, &self.chunk) {
            let parameters = serde_json::json!({ "aggregation_strategy": "simple" });
            let value = self
                .client
                .infer(&self.model, &chunk.content, Some(parameters))
                .await?;
            entities.extend(self.parse_response(value, &chunk.content)?);
        }

        tracing::debug!(model = %self.model, count = entities.len(), "Hosted NER finished");
        Ok(entities)
    }

    fn name(&self) -> &str {
        "hosted-ner"
    }
}

// ============================================================================
// Rule-based NER
// ============================================================================

/// Dictionary entry for entity matching
#[derive(Debug, Clone)]
pub struct DictionaryEntry {
    pub term: String,
    pub label: EntityLabel,
    pub aliases: Vec<String>,
}

/// Entity with its byte span, used while resolving overlaps
#[derive(Debug, Clone)]
struct Candidate {
    text: String,
    label: EntityLabel,
    start: usize,
    end: usize,
    confidence: f32,
}

/// Rule-based NER using regex patterns and dictionaries
pub struct RuleBasedNer {
    /// Pattern rules (regex -> label); capture group 1, when present, is the entity
    patterns: Vec<(Regex, EntityLabel, f32)>,
    /// Dictionary of known terms with their compiled matchers
    dictionary: Vec<(DictionaryEntry, Regex)>,
}

impl RuleBasedNer {
    /// Create a new rule-based NER with the default English rules
    pub fn new() -> Self {
        let mut ner = Self::empty();
        ner.init_patterns();
        ner.init_dictionary();
        ner
    }

    /// Create a recognizer with no rules
    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
            dictionary: Vec::new(),
        }
    }

    /// Add a dictionary term
    pub fn with_term(mut self, term: &str, label: EntityLabel, aliases: Vec<&str>) -> Self {
        self.add_term(term, label, aliases);
        self
    }

    /// Initialize regex patterns
    fn init_patterns(&mut self) {
        // Organizations by corporate or institutional suffix
        self.add_pattern(
            r"\b((?:[A-Z][\w&'-]*\s+)+(?:Inc|Corp|Corporation|Ltd|LLC|GmbH|Company|Group|Holdings|University|Institute|Foundation|Agency|Bank)\b\.?)",
            EntityLabel::Org,
            0.85,
        );
        self.add_pattern(
            r"\b(University of (?:[A-Z][a-z]+\s?)+)",
            EntityLabel::Org,
            0.85,
        );

        // People introduced by an honorific or title
        self.add_pattern(
            r"\b(?:Mr|Mrs|Ms|Dr|Prof|Sir|Dame|President|Senator|CEO)\.?\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+)*)",
            EntityLabel::Person,
            0.8,
        );

        // Events
        self.add_pattern(
            r"\b(World War (?:I{1,3}|One|Two|2|1))\b",
            EntityLabel::Event,
            0.9,
        );
        self.add_pattern(
            r"\b((?:\d{4}\s+)?(?:Summer\s+|Winter\s+)?Olympics(?:\s+\d{4})?)\b",
            EntityLabel::Event,
            0.85,
        );
        self.add_pattern(
            r"\b((?:[A-Z][\w-]*\s+)+(?:Summit|Conference|Festival|Championship|Cup|Expo))\b",
            EntityLabel::Event,
            0.75,
        );
    }

    /// Initialize dictionary of well-known names
    fn init_dictionary(&mut self) {
        // Countries and cities
        self.add_term(
            "United States",
            EntityLabel::Gpe,
            vec!["USA", "U.S.", "United States of America"],
        );
        self.add_term("United Kingdom", EntityLabel::Gpe, vec!["UK", "Britain"]);
        for place in [
            "China",
            "France",
            "Germany",
            "Japan",
            "India",
            "Canada",
            "Italy",
            "Spain",
            "Brazil",
            "Russia",
            "California",
            "Texas",
            "London",
            "Paris",
            "Berlin",
            "Tokyo",
            "Beijing",
            "Seattle",
            "Cupertino",
            "New York",
            "San Francisco",
        ] {
            self.add_term(place, EntityLabel::Gpe, vec![]);
        }

        // Organizations
        self.add_term("Microsoft", EntityLabel::Org, vec!["Microsoft Corp"]);
        self.add_term("Google", EntityLabel::Org, vec!["Alphabet"]);
        for org in [
            "Apple", "Amazon", "Meta", "Tesla", "SpaceX", "NASA", "OpenAI", "IBM", "Intel",
            "Samsung", "Toyota", "United Nations", "European Union",
        ] {
            self.add_term(org, EntityLabel::Org, vec![]);
        }

        // Products
        for product in [
            "iPhone", "iPad", "MacBook", "Windows", "Android", "PlayStation", "Xbox", "ChatGPT",
        ] {
            self.add_term(product, EntityLabel::Product, vec![]);
        }
    }

    /// Add a regex pattern
    fn add_pattern(&mut self, pattern: &str, label: EntityLabel, confidence: f32) {
        match Regex::new(pattern) {
            Ok(regex) => self.patterns.push((regex, label, confidence)),
            Err(e) => tracing::warn!(pattern, error = %e, "Skipping invalid NER pattern"),
        }
    }

    /// Add a dictionary term
    fn add_term(&mut self, term: &str, label: EntityLabel, aliases: Vec<&str>) {
        let entry = DictionaryEntry {
            term: term.to_string(),
            label,
            aliases: aliases.iter().map(|s| s.to_string()).collect(),
        };

        // Longest alternatives first so "United States of America" beats "United States"
        let mut forms: Vec<&str> = std::iter::once(term).chain(aliases).collect();
        forms.sort_by_key(|f| std::cmp::Reverse(f.len()));
        let alternation = forms
            .iter()
            .map(|f| regex::escape(f))
            .collect::<Vec<_>>()
            .join("|");

        // Word boundaries only where the term itself starts/ends with a word char
        match Regex::new(&format!(r"(?:^|\b|\W)({alternation})(?:\b|$|\W)")) {
            Ok(regex) => self.dictionary.push((entry, regex)),
            Err(e) => tracing::warn!(term, error = %e, "Skipping invalid dictionary term"),
        }
    }

    /// Extract candidates using pattern matching
    fn extract_by_patterns(&self, text: &str) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        for (regex, label, confidence) in &self.patterns {
            for caps in regex.captures_iter(text) {
                let Some(mat) = caps.get(1).or_else(|| caps.get(0)) else {
                    continue;
                };
                let trimmed = mat.as_str().trim_end_matches('.').trim();
                if trimmed.is_empty() {
                    continue;
                }
                candidates.push(Candidate {
                    text: trimmed.to_string(),
                    label: *label,
                    start: mat.start(),
                    end: mat.start() + trimmed.len(),
                    confidence: *confidence,
                });
            }
        }

        candidates
    }

    /// Extract candidates using dictionary lookup
    fn extract_by_dictionary(&self, text: &str) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        for (entry, regex) in &self.dictionary {
            let mut offset = 0;
            // Step manually so adjacent matches sharing a separator are all found
            while offset < text.len() {
                let Some(caps) = regex.captures_at(text, offset) else {
                    break;
                };
                let Some(mat) = caps.get(1) else {
                    break;
                };
                let confidence = if mat.as_str() == entry.term { 0.95 } else { 0.9 };
                candidates.push(Candidate {
                    text: mat.as_str().to_string(),
                    label: entry.label,
                    start: mat.start(),
                    end: mat.end(),
                    confidence,
                });
                offset = mat.end();
            }
        }

        candidates
    }

    /// Remove overlapping candidates, keeping the most confident, then the longest
    fn deduplicate(&self, mut candidates: Vec<Candidate>) -> Vec<Candidate> {
        candidates.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then((b.end - b.start).cmp(&(a.end - a.start)))
                .then(a.start.cmp(&b.start))
        });

        let mut result: Vec<Candidate> = Vec::new();
        for candidate in candidates {
            let overlaps = result
                .iter()
                .any(|kept| candidate.start < kept.end && kept.start < candidate.end);
            if !overlaps {
                result.push(candidate);
            }
        }

        // Sort by position
        result.sort_by_key(|c| c.start);
        result
    }

    /// Run all rules synchronously
    pub fn recognize(&self, text: &str) -> Vec<Entity> {
        let mut candidates = self.extract_by_patterns(text);
        candidates.extend(self.extract_by_dictionary(text));

        self.deduplicate(candidates)
            .into_iter()
            .map(|c| Entity::new(c.text, c.label))
            .collect()
    }
}

impl Default for RuleBasedNer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntityExtractor for RuleBasedNer {
    async fn extract(&self, text: &str) -> Result<Vec<Entity>> {
        Ok(self.recognize(text))
    }

    fn name(&self) -> &str {
        "rule-based-ner"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn texts(entities: &[Entity]) -> Vec<&str> {
        entities.iter().map(|e| e.text.as_str()).collect()
    }

    #[test]
    fn test_filter_entities_label_and_case() {
        let raw = vec![
            Entity::new("Apple", EntityLabel::Org),
            Entity::new("2021", EntityLabel::Date),
            Entity::new("APPLE", EntityLabel::Org),
            Entity::new("Tim Cook", EntityLabel::Person),
            Entity::new("apple", EntityLabel::Product),
        ];

        let filtered = filter_entities(raw, &EntityLabel::DEFAULT_ALLOWED);
        assert_eq!(texts(&filtered), vec!["Apple", "Tim Cook"]);
        assert_eq!(filtered[0].label, EntityLabel::Org);
    }

    #[test]
    fn test_filter_entities_empty_allowed() {
        let raw = vec![Entity::new("Apple", EntityLabel::Org)];
        assert!(filter_entities(raw, &[]).is_empty());
    }

    #[test]
    fn test_rule_based_dictionary() {
        let ner = RuleBasedNer::new();
        let entities = ner.recognize("Apple released the iPhone in the United States.");

        assert!(entities.contains(&Entity::new("Apple", EntityLabel::Org)));
        assert!(entities.contains(&Entity::new("iPhone", EntityLabel::Product)));
        assert!(entities.contains(&Entity::new("United States", EntityLabel::Gpe)));
    }

    #[test]
    fn test_rule_based_prefers_longest_alias() {
        let ner = RuleBasedNer::new();
        let entities = ner.recognize("He moved to the United States of America.");

        assert_eq!(texts(&entities), vec!["United States of America"]);
        assert_eq!(entities[0].label, EntityLabel::Gpe);
    }

    #[test]
    fn test_rule_based_word_boundaries() {
        let ner = RuleBasedNer::new();
        let entities = ner.recognize("Pineapple juice is not a company.");
        assert!(entities.is_empty());
    }

    #[test]
    fn test_rule_based_overlap_keeps_most_confident() {
        let ner = RuleBasedNer::new();
        // Dictionary "Apple" (0.95) overlaps the longer suffix match "Apple Holdings" (0.85)
        let entities = ner.recognize("Apple Holdings reported earnings.");

        assert_eq!(texts(&entities), vec!["Apple"]);
        assert_eq!(entities[0].label, EntityLabel::Org);
    }

    #[test]
    fn test_rule_based_patterns() {
        let ner = RuleBasedNer::new();
        let entities =
            ner.recognize("Dr. Jane Smith joined Acme Widgets Inc. before World War II ended.");

        assert!(entities.contains(&Entity::new("Jane Smith", EntityLabel::Person)));
        assert!(entities.contains(&Entity::new("Acme Widgets Inc", EntityLabel::Org)));
        assert!(entities.contains(&Entity::new("World War II", EntityLabel::Event)));
    }

    #[test]
    fn test_rule_based_custom_term() {
        let ner = RuleBasedNer::empty().with_term("Kestrel", EntityLabel::Product, vec!["K-1"]);
        let entities = ner.recognize("The Kestrel and the K-1 shipped together.");

        assert_eq!(texts(&entities), vec!["Kestrel", "K-1"]);
    }

    #[test]
    fn test_map_label() {
        assert_eq!(HostedNer::map_label("PER"), Some(EntityLabel::Person));
        assert_eq!(HostedNer::map_label("LOC"), Some(EntityLabel::Gpe));
        assert_eq!(HostedNer::map_label("ORG"), Some(EntityLabel::Org));
        assert_eq!(HostedNer::map_label("PRODUCT"), Some(EntityLabel::Product));
        assert_eq!(HostedNer::map_label("EVENT"), Some(EntityLabel::Event));
        assert_eq!(HostedNer::map_label("GPE"), Some(EntityLabel::Gpe));
        assert_eq!(HostedNer::map_label("O"), None);
    }

    #[tokio::test]
    async fn test_hosted_ner_parses_spans() {
        let server = MockServer::start().await;
        let text = "Barack Obama visited Paris with the ACLU.";

        Mock::given(method("POST"))
            .and(path("/dslim/bert-base-NER"))
            .and(body_partial_json(json!({
                "inputs": text,
                "parameters": {"aggregation_strategy": "simple"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"entity_group": "PER", "score": 0.99, "word": "Barack Obama", "start": 0, "end": 12},
                {"entity_group": "LOC", "score": 0.98, "word": "Paris", "start": 21, "end": 26},
                {"entity_group": "ORG", "score": 0.40, "word": "AC ##LU", "start": null, "end": null}
            ])))
            .mount(&server)
            .await;

        let client =
            Arc::new(InferenceClient::new(server.uri(), None, Duration::from_secs(5)).unwrap());
        let ner = HostedNer::new(client.clone(), "dslim/bert-base-NER");
        let entities = ner.extract(text).await.unwrap();

        assert_eq!(
            entities,
            vec![
                Entity::new("Barack Obama", EntityLabel::Person),
                Entity::new("Paris", EntityLabel::Gpe),
                Entity::new("ACLU", EntityLabel::Org),
            ]
        );

        let strict = HostedNer::new(client, "dslim/bert-base-NER").with_min_score(0.5);
        assert_eq!(strict.extract(text).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_hosted_ner_chunks_long_input() {
        let server = MockServer::start().await;
        let first = "Barack Obama spoke in Paris today.";
        let second = "Later he flew home to Chicago.";
        let text = format!("{first}\n\n{second}");

        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "inputs": first })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"entity_group": "PER", "score": 0.99, "word": "Barack Obama", "start": 0, "end": 12}
            ])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "inputs": second })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"entity_group": "LOC", "score": 0.97, "word": "Chicago", "start": 22, "end": 29}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            Arc::new(InferenceClient::new(server.uri(), None, Duration::from_secs(5)).unwrap());
        let ner = HostedNer::new(client, "m").with_chunk_size(40);
        let entities = ner.extract(&text).await.unwrap();

        assert_eq!(
            entities,
            vec![
                Entity::new("Barack Obama", EntityLabel::Person),
                Entity::new("Chicago", EntityLabel::Gpe),
            ]
        );
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_hosted_ner_unexpected_shape() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "nope"})))
            .mount(&server)
            .await;

        let client =
            Arc::new(InferenceClient::new(server.uri(), None, Duration::from_secs(5)).unwrap());
        let err = HostedNer::new(client, "m").extract("text").await.unwrap_err();
        assert!(matches!(err, KgbError::Inference(_)));
    }
}
