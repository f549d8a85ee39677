//! End-to-end extraction pipeline
//!
//! text → entities → relations → graph, run strictly in sequence.

use std::sync::Arc;
use std::time::Instant;

use crate::dependency::UdpipeClient;
use crate::inference::InferenceClient;
use crate::ner::{filter_entities, HostedNer, RuleBasedNer};
use crate::rebel::RebelExtractor;
use crate::relation::{CompositeRelationExtractor, DependencyRelationExtractor};
use kgb_core::{
    AppConfig, Entity, EntityExtractor, EntityLabel, KgbError, NerBackend, Relation,
    RelationExtractor, Result,
};
use kgb_graph::{GraphMetrics, KnowledgeGraph};

/// Result of one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Filtered, deduplicated entities
    pub entities: Vec<Entity>,
    /// Merged relations
    pub relations: Vec<Relation>,
    pub graph: KnowledgeGraph,
    pub metrics: GraphMetrics,
}

/// Knowledge graph construction pipeline
pub struct KnowledgePipeline {
    entity_extractor: Arc<dyn EntityExtractor>,
    relation_extractor: Arc<dyn RelationExtractor>,
    allowed_labels: Vec<EntityLabel>,
}

impl KnowledgePipeline {
    /// Create a pipeline from explicit extractors
    pub fn new(
        entity_extractor: Arc<dyn EntityExtractor>,
        relation_extractor: Arc<dyn RelationExtractor>,
    ) -> Self {
        Self {
            entity_extractor,
            relation_extractor,
            allowed_labels: EntityLabel::DEFAULT_ALLOWED.to_vec(),
        }
    }

    /// Restrict entities to these labels
    pub fn with_allowed_labels(mut self, labels: Vec<EntityLabel>) -> Self {
        self.allowed_labels = labels;
        self
    }

    /// Wire extractors according to the configuration
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let extraction = &config.extraction;
        let client = Arc::new(InferenceClient::from_config(&config.inference)?);

        let entity_extractor: Arc<dyn EntityExtractor> = match extraction.ner_backend {
            NerBackend::Hosted => Arc::new(
                HostedNer::new(client.clone(), config.inference.ner_model.clone())
                    .with_min_score(extraction.min_ner_score)
                    .with_chunk_size(extraction.ner_chunk_size),
            ),
            NerBackend::Rules => Arc::new(RuleBasedNer::new()),
        };

        let mut relations = CompositeRelationExtractor::new(Vec::new());
        if extraction.enable_dependency {
            let parser = Arc::new(UdpipeClient::from_config(&config.dependency)?);
            relations = relations.with(Arc::new(
                DependencyRelationExtractor::new(parser)
                    .with_confidence(extraction.dependency_confidence),
            ));
        }
        if extraction.enable_rebel {
            relations = relations.with(Arc::new(
                RebelExtractor::new(client, config.inference.rebel_model.clone())
                    .with_confidence(extraction.rebel_confidence)
                    .with_chunk_size(extraction.rebel_chunk_size),
            ));
        }

        tracing::info!(
            ner = entity_extractor.name(),
            relation_extractors = relations.len(),
            "Pipeline configured"
        );

        Ok(Self::new(entity_extractor, Arc::new(relations))
            .with_allowed_labels(extraction.allowed_labels.clone()))
    }

    pub fn allowed_labels(&self) -> &[EntityLabel] {
        &self.allowed_labels
    }

    /// Recognize entities and keep the allowed ones
    pub async fn extract_entities(&self, text: &str) -> Result<Vec<Entity>> {
        let raw = self.entity_extractor.extract(text).await?;
        let raw_count = raw.len();
        let entities = filter_entities(raw, &self.allowed_labels);

        tracing::debug!(raw = raw_count, kept = entities.len(), "Entities filtered");
        Ok(entities)
    }

    /// Extract merged relations
    pub async fn extract_relations(&self, text: &str) -> Result<Vec<Relation>> {
        self.relation_extractor.extract(text).await
    }

    /// Run every stage on `text`
    pub async fn run(&self, text: &str) -> Result<PipelineOutput> {
        if text.trim().is_empty() {
            return Err(KgbError::Validation("Input text is empty".to_string()));
        }

        let started = Instant::now();

        let stage = Instant::now();
        let entities = self.extract_entities(text).await?;
        tracing::info!(
            count = entities.len(),
            elapsed_ms = stage.elapsed().as_millis() as u64,
            "Entity extraction finished"
        );

        let stage = Instant::now();
        let relations = self.extract_relations(text).await?;
        tracing::info!(
            count = relations.len(),
            elapsed_ms = stage.elapsed().as_millis() as u64,
            "Relation extraction finished"
        );

        let graph = KnowledgeGraph::build(&entities, &relations);
        let metrics = graph.metrics();
        tracing::info!(
            nodes = metrics.node_count,
            edges = metrics.edge_count,
            density = metrics.density,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Knowledge graph built"
        );

        Ok(PipelineOutput {
            entities,
            relations,
            graph,
            metrics,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
