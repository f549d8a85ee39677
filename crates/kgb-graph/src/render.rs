//! Interactive HTML rendering
//!
//! Emits a standalone page that draws the graph with vis-network in the
//! browser. Layout is left to the vis-network physics engine.

use serde_json::{json, Value};

use crate::graph::{EdgeRecord, KnowledgeGraph, NodeData};
use kgb_core::RenderConfig;

const BORDER_COLOR: &str = "#1f78b4";
const DEFAULT_COLOR: &str = "#a6cee3";

/// Fill color for an entity label
pub fn node_color(label: &str) -> &'static str {
    match label.to_uppercase().as_str() {
        "PERSON" => "#66c2a5",
        "ORG" => "#fc8d62",
        "GPE" => "#8da0cb",
        "PRODUCT" => "#e78ac3",
        "EVENT" => "#a6d854",
        _ => DEFAULT_COLOR,
    }
}

/// Node size grows with label length within 200..=600
pub fn node_size(label: &str) -> usize {
    (label.chars().count() * 80).clamp(200, 600)
}

/// Edge caption, e.g. `found (0.85)`
pub fn edge_caption(edge: &EdgeRecord) -> String {
    format!("{} ({:.2})", edge.label, edge.confidence)
}

fn node_json(node: &NodeData) -> Value {
    json!({
        "id": node.id,
        "label": node.label,
        "title": node.tooltip,
        "shape": "ellipse",
        "size": node_size(&node.label),
        "color": { "background": node_color(&node.tooltip), "border": BORDER_COLOR },
        "font": { "size": 20, "color": "#000000", "face": "Arial" },
        "widthConstraint": { "minimum": 100, "maximum": 400 },
        "physics": true
    })
}

fn edge_json(edge: &EdgeRecord) -> Value {
    let caption = edge_caption(edge);
    json!({
        "from": edge.source,
        "to": edge.target,
        "label": caption,
        "title": caption,
        "arrows": "to",
        "font": { "align": "top", "size": 25, "face": "Arial" },
        "color": "#333",
        "width": 4,
        "smooth": { "enabled": true, "type": "curvedCW" }
    })
}

/// vis-network options
pub fn network_options() -> Value {
    json!({
        "layout": { "improvedLayout": true },
        "physics": {
            "enabled": true,
            "stabilization": { "enabled": true, "iterations": 200 },
            "solver": "forceAtlas2Based",
            "forceAtlas2Based": {
                "gravitationalConstant": -150,
                "centralGravity": 0.01,
                "springLength": 250,
                "springConstant": 0.05
            }
        },
        "edges": {
            "smooth": { "enabled": true, "type": "dynamic" },
            "color": { "inherit": false }
        },
        "interaction": {
            "dragNodes": true,
            "dragView": true,
            "zoomView": true,
            "navigationButtons": true,
            "hover": true
        }
    })
}

/// Escape text for HTML content and attributes
pub fn html_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// JSON that is safe to inline inside a `<script>` element
fn script_json(value: &Value) -> String {
    value
        .to_string()
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
}

const TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>__TITLE__</title>
<script type="text/javascript" src="__VIS_URL__"></script>
<style type="text/css">
  #mynetwork {
    width: __WIDTH__;
    height: __HEIGHT__;
    background-color: #ffffff;
    border: 1px solid lightgray;
    position: relative;
  }
</style>
</head>
<body>
<div id="mynetwork"></div>
<script type="text/javascript">
  var nodes = new vis.DataSet(__NODES__);
  var edges = new vis.DataSet(__EDGES__);
  var container = document.getElementById("mynetwork");
  var options = __OPTIONS__;
  var network = new vis.Network(container, { nodes: nodes, edges: edges }, options);

  network.fit();

  network.on("zoom", function () {
    const MIN_ZOOM = __MIN_ZOOM__;
    const MAX_ZOOM = __MAX_ZOOM__;
    const scale = network.getScale();

    if (scale < MIN_ZOOM) {
      network.moveTo({ scale: MIN_ZOOM });
    } else if (scale > MAX_ZOOM) {
      network.moveTo({ scale: MAX_ZOOM });
    }
  });
</script>
</body>
</html>
"#;

/// Render the graph as a self-contained HTML page
pub fn render_html(graph: &KnowledgeGraph, config: &RenderConfig) -> String {
    let nodes = Value::Array(graph.nodes().iter().map(node_json).collect());
    let edges = Value::Array(graph.edges().iter().map(edge_json).collect());

    let (min_zoom, max_zoom) = if config.min_zoom <= config.max_zoom {
        (config.min_zoom, config.max_zoom)
    } else {
        (config.max_zoom, config.min_zoom)
    };

    tracing::debug!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "Rendering graph HTML"
    );

    let nodes = script_json(&nodes);
    let edges = script_json(&edges);
    let options = script_json(&network_options());
    let vis_url = html_escape(&config.vis_network_url);
    let width = css_length(&config.width, "100%");
    let height = css_length(&config.height, "850px");
    let min_zoom = min_zoom.to_string();
    let max_zoom = max_zoom.to_string();

    fill_template(
        TEMPLATE,
        &[
            ("__TITLE__", "Knowledge Graph"),
            ("__VIS_URL__", &vis_url),
            ("__WIDTH__", &width),
            ("__HEIGHT__", &height),
            ("__NODES__", &nodes),
            ("__EDGES__", &edges),
            ("__OPTIONS__", &options),
            ("__MIN_ZOOM__", &min_zoom),
            ("__MAX_ZOOM__", &max_zoom),
        ],
    )
}

/// Substitute placeholders in a single left-to-right pass.
///
/// Inserted values are never rescanned, so data that looks like a
/// placeholder stays literal.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("__") {
        let tail = &rest[start..];
        match values.iter().find(|(key, _)| tail.starts_with(key)) {
            Some((key, value)) => {
                out.push_str(&rest[..start]);
                out.push_str(value);
                rest = &tail[key.len()..];
            }
            None => {
                out.push_str(&rest[..=start]);
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// Accept only plain CSS lengths like `850px` or `100%`
fn css_length(value: &str, fallback: &str) -> String {
    let value = value.trim();
    let valid = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '%');
    if valid {
        value.to_string()
    } else {
        fallback.to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================
