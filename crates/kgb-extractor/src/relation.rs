//! Relation Extraction (RE) module
//!
//! Subject-verb-object rules over a dependency parse, plus the merge
//! step that combines the output of several relation extractors.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::dependency::{DependencyParser, Sentence};
use kgb_core::{Relation, RelationExtractor, RelationOrigin, Result, DEPENDENCY_CONFIDENCE};

/// Dependency labels that mark a direct object or attribute
const OBJECT_DEPS: &[&str] = &["dobj", "obj", "attr"];

/// Dependency labels that mark a subject
const SUBJECT_DEPS: &[&str] = &["nsubj", "nsubjpass", "nsubj:pass"];

// ============================================================================
// Rule-based RE
// ============================================================================

/// Emit `(subject, verb lemma, object)` for every object whose head is a
/// verb with a subject to its left. Only the first subject is used.
pub fn extract_svo(sentences: &[Sentence], confidence: f32) -> Vec<Relation> {
    let mut relations = Vec::new();

    for sentence in sentences {
        for token in &sentence.tokens {
            if !OBJECT_DEPS.contains(&token.deprel.as_str()) {
                continue;
            }

            let Some(verb) = sentence.head_of(token) else {
                continue;
            };
            if verb.upos != "VERB" {
                continue;
            }

            let subject = sentence
                .left_children(verb)
                .find(|child| SUBJECT_DEPS.contains(&child.deprel.as_str()));

            if let Some(subject) = subject {
                relations.push(
                    Relation::new(
                        subject.form.clone(),
                        verb.lemma_or_form(),
                        token.form.clone(),
                        RelationOrigin::Dependency,
                    )
                    .with_confidence(confidence),
                );
            }
        }
    }

    relations
}

/// Relation extractor over a dependency parser
pub struct DependencyRelationExtractor {
    parser: Arc<dyn DependencyParser>,
    confidence: f32,
}

impl DependencyRelationExtractor {
    /// Create a new extractor with the default confidence
    pub fn new(parser: Arc<dyn DependencyParser>) -> Self {
        Self {
            parser,
            confidence: DEPENDENCY_CONFIDENCE,
        }
    }

    /// Set the confidence given to every relation
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }
}

#[async_trait]
impl RelationExtractor for DependencyRelationExtractor {
    async fn extract(&self, text: &str) -> Result<Vec<Relation>> {
        let sentences = self.parser.parse(text).await?;
        let relations = extract_svo(&sentences, self.confidence);

        tracing::debug!(
            sentences = sentences.len(),
            relations = relations.len(),
            "Dependency rules finished"
        );
        Ok(relations)
    }

    fn name(&self) -> &str {
        "dependency-rules"
    }
}

// ============================================================================
// Merging
// ============================================================================

/// Deduplicate relations on their case-insensitive `(source, relation,
/// target)` key. The highest confidence wins; first-seen order is kept.
pub fn merge_relations(relations: impl IntoIterator<Item = Relation>) -> Vec<Relation> {
    let mut merged: Vec<Relation> = Vec::new();
    let mut index: HashMap<(String, String, String), usize> = HashMap::new();

    for relation in relations {
        match index.get(&relation.dedup_key()) {
            Some(&pos) => {
                if relation.confidence > merged[pos].confidence {
                    merged[pos] = relation;
                }
            }
            None => {
                index.insert(relation.dedup_key(), merged.len());
                merged.push(relation);
            }
        }
    }

    merged
}

/// Runs several relation extractors in order and merges their output
///
/// A failing extractor is logged and skipped so the others still
/// contribute to the graph.
pub struct CompositeRelationExtractor {
    extractors: Vec<Arc<dyn RelationExtractor>>,
}

impl CompositeRelationExtractor {
    pub fn new(extractors: Vec<Arc<dyn RelationExtractor>>) -> Self {
        Self { extractors }
    }

    /// Append an extractor
    pub fn with(mut self, extractor: Arc<dyn RelationExtractor>) -> Self {
        self.extractors.push(extractor);
        self
    }

    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }
}

#[async_trait]
impl RelationExtractor for CompositeRelationExtractor {
    async fn extract(&self, text: &str) -> Result<Vec<Relation>> {
        let mut all = Vec::new();

        for extractor in &self.extractors {
            match extractor.extract(text).await {
                Ok(relations) => {
                    tracing::debug!(
                        extractor = extractor.name(),
                        count = relations.len(),
                        "Relations extracted"
                    );
                    all.extend(relations);
                }
                Err(e) => {
                    tracing::warn!(
                        extractor = extractor.name(),
                        error = %e,
                        "Relation extractor failed, continuing without it"
                    );
                }
            }
        }

        Ok(merge_relations(all))
    }

    fn name(&self) -> &str {
        "composite"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::{parse_conllu, tests::JOBS_CONLLU};
    use kgb_core::KgbError;

    struct FixedParser(&'static str);

    #[async_trait]
    impl DependencyParser for FixedParser {
        async fn parse(&self, _text: &str) -> Result<Vec<Sentence>> {
            parse_conllu(self.0)
        }
    }

    struct Fixed(Vec<Relation>);

    #[async_trait]
    impl RelationExtractor for Fixed {
        async fn extract(&self, _text: &str) -> Result<Vec<Relation>> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct Failing;

    #[async_trait]
    impl RelationExtractor for Failing {
        async fn extract(&self, _text: &str) -> Result<Vec<Relation>> {
            Err(KgbError::Inference("model unavailable".to_string()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn rel(source: &str, relation: &str, target: &str, confidence: f32) -> Relation {
        Relation::new(source, relation, target, RelationOrigin::Rebel).with_confidence(confidence)
    }

    #[test]
    fn test_extract_svo() {
        let sentences = parse_conllu(JOBS_CONLLU).unwrap();
        let relations = extract_svo(&sentences, DEPENDENCY_CONFIDENCE);

        assert_eq!(relations.len(), 2);
        assert_eq!(relations[0].source, "Steve");
        assert_eq!(relations[0].relation, "found");
        assert_eq!(relations[0].target, "Apple");
        assert_eq!(relations[0].origin, RelationOrigin::Dependency);
        assert!((relations[0].confidence - 0.85).abs() < f32::EPSILON);

        assert_eq!(relations[1].source, "Apple");
        assert_eq!(relations[1].relation, "make");
        assert_eq!(relations[1].target, "iPhone");
    }

    #[test]
    fn test_svo_requires_verb_head() {
        // "Paris is the capital": attr attached to AUX, not VERB
        let input = "\
1\tParis\tParis\tPROPN\t_\t_\t2\tnsubj\t_\t_
2\tis\tbe\tAUX\t_\t_\t0\troot\t_\t_
3\tthe\tthe\tDET\t_\t_\t4\tdet\t_\t_
4\tcapital\tcapital\tNOUN\t_\t_\t2\tattr\t_\t_
";
        let sentences = parse_conllu(input).unwrap();
        assert!(extract_svo(&sentences, 0.85).is_empty());
    }

    #[test]
    fn test_svo_requires_left_subject() {
        // Subject after the verb is ignored
        let input = "\
1\tFounded\tfound\tVERB\t_\t_\t0\troot\t_\t_
2\tApple\tApple\tPROPN\t_\t_\t1\tobj\t_\t_
3\tJobs\tJobs\tPROPN\t_\t_\t1\tnsubj\t_\t_
";
        let sentences = parse_conllu(input).unwrap();
        assert!(extract_svo(&sentences, 0.85).is_empty());
    }

    #[test]
    fn test_svo_first_subject_and_passive() {
        let input = "\
1\tIBM\tIBM\tPROPN\t_\t_\t4\tnsubj:pass\t_\t_
2\tand\tand\tCCONJ\t_\t_\t3\tcc\t_\t_
3\tHP\tHP\tPROPN\t_\t_\t4\tnsubj\t_\t_
4\tacquired\tacquire\tVERB\t_\t_\t0\troot\t_\t_
5\tRedHat\tRedHat\tPROPN\t_\t_\t4\tdobj\t_\t_
";
        let sentences = parse_conllu(input).unwrap();
        let relations = extract_svo(&sentences, 0.5);

        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].source, "IBM");
        assert_eq!(relations[0].relation, "acquire");
        assert!((relations[0].confidence - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_merge_relations_dedup() {
        let merged = merge_relations(vec![
            rel("Apple", "founded by", "Steve Jobs", 0.85),
            rel("Tim Cook", "works for", "Apple", 0.9),
            rel("apple", "Founded By", "steve jobs", 0.95),
        ]);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].source, "apple");
        assert!((merged[0].confidence - 0.95).abs() < f32::EPSILON);
        assert_eq!(merged[1].source, "Tim Cook");
    }

    #[test]
    fn test_merge_keeps_first_on_tie() {
        let merged = merge_relations(vec![
            rel("A", "r", "B", 0.9),
            rel("a", "R", "b", 0.9),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].source, "A");
    }

    #[tokio::test]
    async fn test_dependency_extractor() {
        let extractor = DependencyRelationExtractor::new(Arc::new(FixedParser(JOBS_CONLLU)));
        let relations = extractor.extract("Steve Jobs founded Apple.").await.unwrap();

        assert_eq!(relations.len(), 2);
        assert_eq!(extractor.name(), "dependency-rules");
    }

    #[tokio::test]
    async fn test_composite_skips_failures() {
        let composite = CompositeRelationExtractor::new(vec![Arc::new(Failing)]).with(Arc::new(
            Fixed(vec![rel("A", "r", "B", 0.9), rel("a", "r", "b", 0.5)]),
        ));
        assert_eq!(composite.len(), 2);

        let relations = composite.extract("text").await.unwrap();
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].source, "A");
    }

    #[tokio::test]
    async fn test_empty_composite() {
        let composite = CompositeRelationExtractor::new(Vec::new());
        assert!(composite.is_empty());
        assert!(composite.extract("text").await.unwrap().is_empty());
    }
}
