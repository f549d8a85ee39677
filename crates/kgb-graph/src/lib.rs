//! KGB Graph - Knowledge graph construction and output
//!
//! Builds a directed graph from extracted entities and relations, and
//! turns it into GEXF, edge lists, node-link JSON or an interactive
//! vis-network HTML page.

pub mod export;
pub mod graph;
pub mod render;

pub use export::{to_edge_list, to_gexf, to_gexf_dated, to_node_link_json, ExportFormat, NodeLinkGraph};
pub use graph::{EdgeData, EdgeRecord, GraphMetrics, KnowledgeGraph, NodeData};
pub use render::render_html;
