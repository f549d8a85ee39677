//! API route definitions
//!
//! Author: hephaex@gmail.com

use crate::handlers::graph;
use crate::state::AppState;
use axum::{routing::post, Router};
use std::sync::Arc;

/// Create API v1 routes
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/graph", post(graph::build_graph))
        .route("/graph/upload", post(graph::upload_graph))
        .route("/graph/render", post(graph::render_graph))
        .route("/graph/export", post(graph::export_graph))
}
