//! Directed knowledge graph over petgraph

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use kgb_core::{Entity, EntityLabel, Relation, RelationOrigin};

/// Node payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    /// Node name, unique within the graph
    pub id: String,
    /// Display label
    pub label: String,
    /// Entity label, or `GENERIC` for relation-only nodes
    pub tooltip: String,
}

/// Edge payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeData {
    pub label: String,
    pub confidence: f32,
    pub origin: RelationOrigin,
}

/// Owned view of one edge with its endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub source: String,
    pub target: String,
    pub label: String,
    pub confidence: f32,
    pub origin: RelationOrigin,
}

/// Graph statistics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GraphMetrics {
    pub node_count: usize,
    pub edge_count: usize,
    /// Directed density `E / (N * (N - 1))`
    pub density: f64,
}

/// Knowledge graph built from entities and relations
///
/// At most one edge exists per ordered node pair; adding another
/// replaces its attributes.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeGraph {
    graph: DiGraph<NodeData, EdgeData>,
    node_index: HashMap<String, NodeIndex>,
}

impl KnowledgeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from named entities and relations
    ///
    /// Relation endpoints that match an entity case-insensitively attach to
    /// that entity's node; anything else becomes a `GENERIC` node.
    pub fn build(entities: &[Entity], relations: &[Relation]) -> Self {
        let mut graph = Self::new();
        let mut canonical: HashMap<String, String> = HashMap::new();

        for entity in entities {
            graph.upsert_node(&entity.text, entity.label.as_str());
            canonical
                .entry(entity.text.to_lowercase())
                .or_insert_with(|| entity.text.clone());
        }

        for relation in relations {
            if relation.source.trim().is_empty() || relation.target.trim().is_empty() {
                tracing::debug!(?relation, "Skipping relation with blank endpoint");
                continue;
            }

            let source = graph.resolve(&canonical, &relation.source);
            let target = graph.resolve(&canonical, &relation.target);
            graph.graph.update_edge(
                source,
                target,
                EdgeData {
                    label: relation.relation.clone(),
                    confidence: relation.confidence,
                    origin: relation.origin,
                },
            );
        }

        tracing::debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "Graph assembled"
        );
        graph
    }

    /// Insert a node or overwrite its tooltip
    fn upsert_node(&mut self, name: &str, tooltip: &str) -> NodeIndex {
        if let Some(&idx) = self.node_index.get(name) {
            self.graph[idx].tooltip = tooltip.to_string();
            return idx;
        }

        let idx = self.graph.add_node(NodeData {
            id: name.to_string(),
            label: name.to_string(),
            tooltip: tooltip.to_string(),
        });
        self.node_index.insert(name.to_string(), idx);
        idx
    }

    /// Node for a relation endpoint
    fn resolve(&mut self, canonical: &HashMap<String, String>, name: &str) -> NodeIndex {
        if let Some(entity) = canonical.get(&name.to_lowercase()) {
            if let Some(&idx) = self.node_index.get(entity) {
                return idx;
            }
        }

        match self.node_index.get(name) {
            Some(&idx) => idx,
            None => self.upsert_node(name, EntityLabel::Generic.as_str()),
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Compute node/edge counts and directed density
    pub fn metrics(&self) -> GraphMetrics {
        let n = self.node_count();
        let e = self.edge_count();
        let density = if n < 2 {
            0.0
        } else {
            e as f64 / (n as f64 * (n as f64 - 1.0))
        };

        GraphMetrics {
            node_count: n,
            edge_count: e,
            density,
        }
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> Vec<NodeData> {
        self.graph.node_weights().cloned().collect()
    }

    /// Edges in insertion order
    pub fn edges(&self) -> Vec<EdgeRecord> {
        self.graph
            .edge_references()
            .map(|edge| EdgeRecord {
                source: self.graph[edge.source()].id.clone(),
                target: self.graph[edge.target()].id.clone(),
                label: edge.weight().label.clone(),
                confidence: edge.weight().confidence,
                origin: edge.weight().origin,
            })
            .collect()
    }

    pub fn node(&self, name: &str) -> Option<&NodeData> {
        self.node_index.get(name).map(|&idx| &self.graph[idx])
    }

    /// Edge between two named nodes
    pub fn edge(&self, source: &str, target: &str) -> Option<&EdgeData> {
        let a = *self.node_index.get(source)?;
        let b = *self.node_index.get(target)?;
        self.graph
            .find_edge(a, b)
            .and_then(|idx| self.graph.edge_weight(idx))
    }

    /// Underlying petgraph graph
    pub fn inner(&self) -> &DiGraph<NodeData, EdgeData> {
        &self.graph
    }
}

// ============================================================================
// Tests
// ============================================================================
