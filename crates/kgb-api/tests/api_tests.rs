//! API Integration Tests
//!
//! Run against a router wired with the rule-based NER and a fixed
//! relation extractor, so no model service is needed.
//!
//! Author: hephaex@gmail.com

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use kgb_api::create_router_for_testing;
use serde_json::{json, Value};
use tower::ServiceExt;

const SAMPLE: &str = "Jobs founded Apple in Cupertino. Apple makes the iPhone.";
const BOUNDARY: &str = "kgb-test-boundary";

/// Helper to create a test request
fn create_json_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");

    match body {
        Some(json_body) => builder
            .body(Body::from(serde_json::to_string(&json_body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Helper to build a multipart request from (field, file name, content)
fn create_multipart_request(parts: &[(&str, Option<&str>, &str)]) -> Request<Body> {
    let mut body = String::new();
    for (name, file_name, content) in parts {
        body.push_str(&format!("--{BOUNDARY}\r\n"));
        match file_name {
            Some(file_name) => {
                body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n"
                ));
                body.push_str("Content-Type: application/octet-stream\r\n\r\n");
            }
            None => {
                body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"\r\n\r\n"
                ));
            }
        }
        body.push_str(content);
        body.push_str("\r\n");
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));

    Request::builder()
        .method("POST")
        .uri("/api/v1/graph/upload")
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, body.to_vec())
}

async fn send_json(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, _, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

// =============================================================================
// Health Check Tests
// =============================================================================

#[tokio::test]
async fn test_health_check() {
    let app = create_router_for_testing();

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, json) = send_json(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_readiness_check() {
    let app = create_router_for_testing();

    let request = Request::builder()
        .uri("/ready")
        .body(Body::empty())
        .unwrap();
    let (status, json) = send_json(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ready"], true);
    assert!(json["checks"].is_object());
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = create_router_for_testing();

    let request = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .unwrap();
    let (status, json) = send_json(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["uptime_seconds"].is_number());
    assert!(json["total_requests"].is_number());
    assert_eq!(json["graphs_built"], 0);
}

#[tokio::test]
async fn test_openapi_spec() {
    let app = create_router_for_testing();

    let request = Request::builder()
        .uri("/api-docs/openapi.json")
        .body(Body::empty())
        .unwrap();
    let (status, json) = send_json(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["paths"]["/api/v1/graph"].is_object());
    assert!(json["paths"]["/api/v1/graph/export"].is_object());
}

// =============================================================================
// Graph API Tests
// =============================================================================

#[tokio::test]
async fn test_build_graph() {
    let app = create_router_for_testing();

    let request = create_json_request("POST", "/api/v1/graph", Some(json!({ "text": SAMPLE })));
    let (status, json) = send_json(app, request).await;

    assert_eq!(status, StatusCode::OK);

    let entities = json["entities"].as_array().unwrap();
    assert!(entities
        .iter()
        .any(|e| e["text"] == "Apple" && e["label"] == "ORG"));
    assert!(entities
        .iter()
        .any(|e| e["text"] == "Cupertino" && e["label"] == "GPE"));

    assert_eq!(json["relations"].as_array().unwrap().len(), 3);
    assert_eq!(json["graph"]["directed"], true);
    assert_eq!(json["metrics"]["edge_count"], 3);
    assert!(json["metrics"]["density"].as_f64().unwrap() > 0.0);
    assert!(json.get("sources").is_none());
}

#[tokio::test]
async fn test_build_graph_empty_text() {
    let app = create_router_for_testing();

    let request = create_json_request("POST", "/api/v1/graph", Some(json!({ "text": "   " })));
    let (status, json) = send_json(app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");
    assert!(json["message"].is_string());
}

#[tokio::test]
async fn test_build_graph_invalid_json() {
    let app = create_router_for_testing();

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/graph")
        .header("Content-Type", "application/json")
        .body(Body::from("{ not json"))
        .unwrap();
    let (status, _, _) = send(app, request).await;

    assert!(status.is_client_error());
}

#[tokio::test]
async fn test_render_graph_html() {
    let app = create_router_for_testing();

    let request = create_json_request(
        "POST",
        "/api/v1/graph/render",
        Some(json!({ "text": SAMPLE })),
    );
    let (status, headers, body) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/html"));

    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("vis.Network"));
    assert!(html.contains("found (0.85)"));
}

#[tokio::test]
async fn test_export_formats() {
    let cases = [
        ("gexf", "application/xml", "graph.gexf", "<gexf"),
        ("csv", "text/csv", "graph.csv", "Jobs,Apple,{'label': 'found', 'confidence': 0.85}"),
        ("json", "application/json", "graph.json", "\"directed\": true"),
        ("html", "text/html", "graph.html", "<!DOCTYPE html>"),
    ];

    for (format, mime, file_name, marker) in cases {
        let app = create_router_for_testing();
        let request = create_json_request(
            "POST",
            &format!("/api/v1/graph/export?format={format}"),
            Some(json!({ "text": SAMPLE })),
        );
        let (status, headers, body) = send(app, request).await;

        assert_eq!(status, StatusCode::OK, "format {format}");
        assert!(headers[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with(mime));
        assert!(headers[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .contains(file_name));

        let text = String::from_utf8(body).unwrap();
        assert!(text.contains(marker), "format {format} missing {marker}");
    }
}

#[tokio::test]
async fn test_export_default_is_gexf() {
    let app = create_router_for_testing();

    let request = create_json_request(
        "POST",
        "/api/v1/graph/export",
        Some(json!({ "text": SAMPLE })),
    );
    let (status, headers, _) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "application/xml");
}

#[tokio::test]
async fn test_export_unknown_format() {
    let app = create_router_for_testing();

    let request = create_json_request(
        "POST",
        "/api/v1/graph/export?format=png",
        Some(json!({ "text": SAMPLE })),
    );
    let (status, json) = send_json(app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["message"].as_str().unwrap().contains("png"));
}

// =============================================================================
// Upload Tests
// =============================================================================

#[tokio::test]
async fn test_upload_text_files() {
    let app = create_router_for_testing();

    let request = create_multipart_request(&[
        ("files", Some("a.txt"), "Jobs founded Apple."),
        ("files", Some("b.md"), "Apple makes the iPhone."),
    ]);
    let (status, json) = send_json(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["sources"], json!(["a.txt", "b.md"]));
    assert_eq!(json["relations"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_upload_typed_text_wins() {
    let app = create_router_for_testing();

    let request = create_multipart_request(&[
        ("text", None, "Apple makes the iPhone."),
        ("files", Some("a.txt"), "Jobs founded Apple."),
    ]);
    let (status, json) = send_json(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert!(json.get("sources").is_none());

    let relations = json["relations"].as_array().unwrap();
    assert_eq!(relations.len(), 1);
    assert_eq!(relations[0]["relation"], "manufacturer");
}

#[tokio::test]
async fn test_upload_blank_text_falls_back_to_files() {
    let app = create_router_for_testing();

    let request = create_multipart_request(&[
        ("text", None, "  "),
        ("files", Some("a.txt"), "Jobs founded Apple."),
    ]);
    let (status, json) = send_json(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["sources"], json!(["a.txt"]));
}

#[tokio::test]
async fn test_upload_unsupported_extension() {
    let app = create_router_for_testing();

    let request = create_multipart_request(&[("files", Some("notes.rtf"), "{\\rtf1 hello}")]);
    let (status, json) = send_json(app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["message"].as_str().unwrap().contains("Unsupported"));
}

#[tokio::test]
async fn test_upload_without_input() {
    let app = create_router_for_testing();

    let request = create_multipart_request(&[("files", Some("empty.txt"), "")]);
    let (status, json) = send_json(app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");
}
