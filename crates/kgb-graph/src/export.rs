//! Graph export formats
//!
//! GEXF for graph tools like Gephi, a networkx-style edge list, and a
//! node-link JSON document.

use std::fmt::Write;
use std::str::FromStr;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::graph::{EdgeRecord, KnowledgeGraph, NodeData};
use kgb_core::KgbError;

/// Supported export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Gexf,
    Csv,
    Json,
    Html,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Gexf => "gexf",
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Html => "html",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Gexf => "application/xml",
            Self::Csv => "text/csv",
            Self::Json => "application/json",
            Self::Html => "text/html; charset=utf-8",
        }
    }

    /// Download file name
    pub fn file_name(&self) -> String {
        format!("graph.{}", self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = KgbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gexf" | "xml" => Ok(Self::Gexf),
            "csv" | "edgelist" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "html" => Ok(Self::Html),
            other => Err(KgbError::Validation(format!(
                "Unknown export format '{other}' (expected gexf, csv, json or html)"
            ))),
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

// ============================================================================
// GEXF
// ============================================================================

/// Escape text for XML attribute values and content
pub fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            // XML 1.0 forbids most control characters
            c if (c as u32) < 0x20 && !matches!(c, '\t' | '\n' | '\r') => {}
            c => out.push(c),
        }
    }
    out
}

/// GEXF 1.2 document stamped with today's date
pub fn to_gexf(graph: &KnowledgeGraph) -> kgb_core::Result<String> {
    to_gexf_dated(graph, Utc::now().date_naive())
}

/// GEXF 1.2 document with an explicit `lastmodifieddate`
pub fn to_gexf_dated(graph: &KnowledgeGraph, date: NaiveDate) -> kgb_core::Result<String> {
    let mut xml = String::new();
    write_gexf(&mut xml, graph, date)
        .map_err(|e| KgbError::Graph(format!("Failed to write GEXF: {e}")))?;
    Ok(xml)
}

fn write_gexf(xml: &mut String, graph: &KnowledgeGraph, date: NaiveDate) -> std::fmt::Result {
    writeln!(xml, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
    writeln!(
        xml,
        r#"<gexf xmlns="http://www.gexf.net/1.2draft" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:schemaLocation="http://www.gexf.net/1.2draft http://www.gexf.net/1.2draft/gexf.xsd" version="1.2">"#
    )?;
    writeln!(xml, r#"  <meta lastmodifieddate="{}">"#, date.format("%Y-%m-%d"))?;
    writeln!(xml, "    <creator>kgb {}</creator>", env!("CARGO_PKG_VERSION"))?;
    writeln!(xml, "  </meta>")?;
    writeln!(xml, r#"  <graph defaultedgetype="directed" mode="static">"#)?;

    writeln!(xml, r#"    <attributes class="node" mode="static">"#)?;
    writeln!(xml, r#"      <attribute id="0" title="tooltip" type="string" />"#)?;
    writeln!(xml, "    </attributes>")?;
    writeln!(xml, r#"    <attributes class="edge" mode="static">"#)?;
    writeln!(xml, r#"      <attribute id="1" title="confidence" type="double" />"#)?;
    writeln!(xml, r#"      <attribute id="2" title="origin" type="string" />"#)?;
    writeln!(xml, "    </attributes>")?;

    writeln!(xml, "    <nodes>")?;
    for node in graph.nodes() {
        writeln!(
            xml,
            r#"      <node id="{}" label="{}">"#,
            xml_escape(&node.id),
            xml_escape(&node.label)
        )?;
        writeln!(xml, "        <attvalues>")?;
        writeln!(
            xml,
            r#"          <attvalue for="0" value="{}" />"#,
            xml_escape(&node.tooltip)
        )?;
        writeln!(xml, "        </attvalues>")?;
        writeln!(xml, "      </node>")?;
    }
    writeln!(xml, "    </nodes>")?;

    writeln!(xml, "    <edges>")?;
    for (id, edge) in graph.edges().iter().enumerate() {
        writeln!(
            xml,
            r#"      <edge id="{id}" source="{}" target="{}" label="{}">"#,
            xml_escape(&edge.source),
            xml_escape(&edge.target),
            xml_escape(&edge.label)
        )?;
        writeln!(xml, "        <attvalues>")?;
        writeln!(
            xml,
            r#"          <attvalue for="1" value="{}" />"#,
            py_float(edge.confidence)
        )?;
        writeln!(
            xml,
            r#"          <attvalue for="2" value="{}" />"#,
            edge.origin
        )?;
        writeln!(xml, "        </attvalues>")?;
        writeln!(xml, "      </edge>")?;
    }
    writeln!(xml, "    </edges>")?;

    writeln!(xml, "  </graph>")?;
    writeln!(xml, "</gexf>")
}

// ============================================================================
// Edge list
// ============================================================================

/// Python `repr` of a string
fn py_repr(text: &str) -> String {
    let quote = if text.contains('\'') && !text.contains('"') {
        '"'
    } else {
        '\''
    };

    let mut out = String::with_capacity(text.len() + 2);
    out.push(quote);
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// Python `repr` of a float (`1.0`, not `1`)
fn py_float(value: f32) -> String {
    let text = value.to_string();
    if text.contains(['.', 'e', 'E']) || !value.is_finite() {
        text
    } else {
        format!("{text}.0")
    }
}

/// One line per edge: `source<d>target<d>{'label': ..., 'confidence': ...}`
pub fn to_edge_list(graph: &KnowledgeGraph, delimiter: &str) -> String {
    graph
        .edges()
        .iter()
        .map(|edge| {
            format!(
                "{src}{d}{tgt}{d}{{'label': {label}, 'confidence': {conf}}}\n",
                src = edge.source,
                tgt = edge.target,
                d = delimiter,
                label = py_repr(&edge.label),
                conf = py_float(edge.confidence),
            )
        })
        .collect()
}

// ============================================================================
// Node-link JSON
// ============================================================================

/// Node-link graph document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeLinkGraph {
    pub directed: bool,
    pub nodes: Vec<NodeData>,
    pub links: Vec<EdgeRecord>,
}

impl From<&KnowledgeGraph> for NodeLinkGraph {
    fn from(graph: &KnowledgeGraph) -> Self {
        Self {
            directed: true,
            nodes: graph.nodes(),
            links: graph.edges(),
        }
    }
}

/// Serialize the graph as pretty node-link JSON
pub fn to_node_link_json(graph: &KnowledgeGraph) -> kgb_core::Result<String> {
    serde_json::to_string_pretty(&NodeLinkGraph::from(graph))
        .map_err(|e| KgbError::Graph(format!("Failed to serialize graph: {e}")))
}

// ============================================================================
// Tests
// ============================================================================
