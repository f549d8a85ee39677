//! Knowledge graph construction handlers
//!
//! Author: hephaex@gmail.com

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Multipart, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use kgb_core::{Entity, Relation};
use kgb_extractor::PipelineOutput;
use kgb_graph::{
    render_html, to_edge_list, to_gexf, to_node_link_json, ExportFormat, GraphMetrics,
    NodeLinkGraph,
};
use kgb_parser::{join_texts, select_input};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use utoipa::{IntoParams, ToSchema};

/// Graph request body
#[derive(Debug, Deserialize, ToSchema)]
pub struct GraphRequest {
    /// Text to extract the graph from
    #[schema(example = "Steve Jobs founded Apple in Cupertino.")]
    pub text: String,
}

/// Entity information
#[derive(Debug, Serialize, ToSchema)]
pub struct EntityInfo {
    #[schema(example = "Apple")]
    pub text: String,
    #[schema(example = "ORG")]
    pub label: String,
}

impl From<&Entity> for EntityInfo {
    fn from(entity: &Entity) -> Self {
        Self {
            text: entity.text.clone(),
            label: entity.label.to_string(),
        }
    }
}

/// Relation information
#[derive(Debug, Serialize, ToSchema)]
pub struct RelationInfo {
    #[schema(example = "Steve Jobs")]
    pub source: String,
    #[schema(example = "Apple")]
    pub target: String,
    #[schema(example = "found")]
    pub relation: String,
    #[schema(example = 0.85)]
    pub confidence: f32,
    /// `dependency` or `rebel`
    pub origin: String,
}

impl From<&Relation> for RelationInfo {
    fn from(relation: &Relation) -> Self {
        Self {
            source: relation.source.clone(),
            target: relation.target.clone(),
            relation: relation.relation.clone(),
            confidence: relation.confidence,
            origin: relation.origin.to_string(),
        }
    }
}

/// Graph statistics
#[derive(Debug, Serialize, ToSchema)]
pub struct MetricsInfo {
    pub node_count: usize,
    pub edge_count: usize,
    pub density: f64,
}

impl From<GraphMetrics> for MetricsInfo {
    fn from(metrics: GraphMetrics) -> Self {
        Self {
            node_count: metrics.node_count,
            edge_count: metrics.edge_count,
            density: metrics.density,
        }
    }
}

/// Graph construction response
#[derive(Debug, Serialize, ToSchema)]
pub struct GraphResponse {
    pub entities: Vec<EntityInfo>,
    pub relations: Vec<RelationInfo>,
    /// Node-link graph document
    #[schema(value_type = Object)]
    pub graph: NodeLinkGraph,
    pub metrics: MetricsInfo,
    /// Uploaded files the text came from
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
    pub processing_time_ms: u64,
}

impl GraphResponse {
    fn new(output: &PipelineOutput, sources: Vec<String>, started: Instant) -> Self {
        Self {
            entities: output.entities.iter().map(EntityInfo::from).collect(),
            relations: output.relations.iter().map(RelationInfo::from).collect(),
            graph: NodeLinkGraph::from(&output.graph),
            metrics: output.metrics.into(),
            sources,
            processing_time_ms: started.elapsed().as_millis() as u64,
        }
    }
}

/// Multipart upload form
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    /// Typed text; used instead of the files when not blank
    text: Option<String>,
    /// TXT, Markdown, PDF or DOCX files
    #[schema(value_type = Vec<String>, format = Binary)]
    files: Vec<Vec<u8>>,
}

/// Export query parameters
#[derive(Debug, Deserialize, IntoParams)]
pub struct ExportQuery {
    /// gexf, csv, json or html
    #[param(default = "gexf")]
    pub format: Option<String>,
}

async fn run_pipeline(state: &AppState, text: &str) -> Result<PipelineOutput, AppError> {
    let output = state.pipeline.run(text).await?;
    state.record_graph();
    Ok(output)
}

/// Build a knowledge graph from text
#[utoipa::path(
    post,
    path = "/api/v1/graph",
    tag = "graph",
    request_body = GraphRequest,
    responses(
        (status = 200, description = "Extracted graph", body = GraphResponse),
        (status = 400, description = "Empty text", body = crate::error::ApiError),
        (status = 502, description = "Model service failed", body = crate::error::ApiError)
    )
)]
pub async fn build_graph(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GraphRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.increment_requests();
    let started = Instant::now();

    let output = run_pipeline(&state, &req.text).await?;

    Ok((
        StatusCode::OK,
        Json(GraphResponse::new(&output, Vec::new(), started)),
    ))
}

/// Build a knowledge graph from uploaded documents
#[utoipa::path(
    post,
    path = "/api/v1/graph/upload",
    tag = "graph",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Extracted graph", body = GraphResponse),
        (status = 400, description = "No usable input or unsupported file", body = crate::error::ApiError),
        (status = 502, description = "Model service failed", body = crate::error::ApiError)
    )
)]
pub async fn upload_graph(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    state.increment_requests();
    let started = Instant::now();

    let mut typed: Option<String> = None;
    let mut texts = Vec::new();
    let mut sources = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Failed to read multipart field: {e}")))?
    {
        let field_name = field.name().unwrap_or_default().to_string();

        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let bytes = field.bytes().await.map_err(|e| {
                    AppError::BadRequest(format!("Failed to read upload '{file_name}': {e}"))
                })?;

                let parser_state = state.clone();
                let name = file_name.clone();
                let doc = tokio::task::spawn_blocking(move || {
                    parser_state.parsers.parse_bytes(&name, &bytes)
                })
                .await
                .map_err(|e| AppError::Internal(format!("Parser task failed: {e}")))??;

                tracing::info!(
                    file_name = %file_name,
                    file_type = %doc.file_type,
                    chars = doc.char_count(),
                    "Upload parsed"
                );
                texts.push(doc.content);
                sources.push(file_name);
            }
            None if field_name == "text" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read text field: {e}")))?;
                typed = Some(text);
            }
            None => {
                tracing::debug!(field = %field_name, "Ignoring multipart field");
            }
        }
    }

    let uploaded = join_texts(texts.iter().map(String::as_str));
    let Some(text) = select_input(typed.as_deref(), &uploaded) else {
        return Err(AppError::BadRequest(
            "Provide text or at least one non-empty TXT, PDF or DOCX file".to_string(),
        ));
    };

    // Typed text wins, so the files were not used
    let sources = if typed.as_deref().is_some_and(|t| !t.trim().is_empty()) {
        Vec::new()
    } else {
        sources
    };

    let output = run_pipeline(&state, text).await?;

    Ok((
        StatusCode::OK,
        Json(GraphResponse::new(&output, sources, started)),
    ))
}

/// Render the knowledge graph as an interactive HTML page
#[utoipa::path(
    post,
    path = "/api/v1/graph/render",
    tag = "graph",
    request_body = GraphRequest,
    responses(
        (status = 200, description = "HTML page", content_type = "text/html"),
        (status = 400, description = "Empty text", body = crate::error::ApiError)
    )
)]
pub async fn render_graph(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GraphRequest>,
) -> Result<Html<String>, AppError> {
    state.increment_requests();

    let output = run_pipeline(&state, &req.text).await?;
    Ok(Html(render_html(&output.graph, &state.config.render)))
}

/// Export the knowledge graph as a downloadable file
#[utoipa::path(
    post,
    path = "/api/v1/graph/export",
    tag = "graph",
    params(ExportQuery),
    request_body = GraphRequest,
    responses(
        (status = 200, description = "Graph file attachment"),
        (status = 400, description = "Empty text or unknown format", body = crate::error::ApiError)
    )
)]
pub async fn export_graph(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ExportQuery>,
    Json(req): Json<GraphRequest>,
) -> Result<Response, AppError> {
    state.increment_requests();

    let format: ExportFormat = params.format.as_deref().unwrap_or("gexf").parse()?;
    let output = run_pipeline(&state, &req.text).await?;

    let body = match format {
        ExportFormat::Gexf => to_gexf(&output.graph)?,
        ExportFormat::Csv => to_edge_list(&output.graph, ","),
        ExportFormat::Json => to_node_link_json(&output.graph)?,
        ExportFormat::Html => render_html(&output.graph, &state.config.render),
    };

    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        format.file_name()
    ))
    .map_err(|e| AppError::Internal(e.to_string()))?;

    tracing::info!(%format, bytes = body.len(), "Graph exported");

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(format.mime_type())),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}
