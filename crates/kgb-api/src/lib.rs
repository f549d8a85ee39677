//! KGB API - REST server
//!
//! Exposes the knowledge graph pipeline over HTTP: build a graph from text
//! or uploaded documents, render it as HTML, or export it as a file.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::get,
    Router,
};
use handlers::{graph, health};
use kgb_core::ServerConfig;
use state::AppState;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Knowledge Graph Builder API",
        description = "Extract entities and relations from text and build a knowledge graph",
        license(name = "Apache-2.0"),
    ),
    paths(
        health::health_check,
        health::readiness_check,
        health::metrics,
        graph::build_graph,
        graph::upload_graph,
        graph::render_graph,
        graph::export_graph,
    ),
    components(schemas(
        health::HealthResponse,
        health::BuildInfo,
        health::ReadinessResponse,
        health::ReadinessChecks,
        health::MetricsResponse,
        graph::GraphRequest,
        graph::GraphResponse,
        graph::EntityInfo,
        graph::RelationInfo,
        graph::MetricsInfo,
        graph::UploadForm,
        error::ApiError,
    )),
    tags(
        (name = "health", description = "Liveness, readiness and counters"),
        (name = "graph", description = "Knowledge graph construction"),
    )
)]
pub struct ApiDoc;

/// CORS layer from config; `None` when cross-origin access is off
fn cors_layer(config: &ServerConfig) -> Option<CorsLayer> {
    if !config.cors_enabled || config.cors_origins.is_empty() {
        return None;
    }

    let origin = if config.cors_origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| match o.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    Some(
        CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(Any),
    )
}

/// Build the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let server = state.config.server.clone();

    let router = Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(health::metrics))
        .nest("/api/v1", routes::api_routes())
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(server.max_body_size))
        .layer(TimeoutLayer::new(Duration::from_secs(
            server.request_timeout_secs,
        )));

    let router = match cors_layer(&server) {
        Some(cors) => router.layer(cors),
        None => router,
    };

    router
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Router backed by offline extractors, for integration tests
#[cfg(feature = "test-utils")]
pub fn create_router_for_testing() -> Router {
    create_router(Arc::new(testing::state()))
}

#[cfg(feature = "test-utils")]
pub mod testing {
    //! Offline pipeline used by the integration tests

    use super::AppState;
    use async_trait::async_trait;
    use kgb_core::{AppConfig, Relation, RelationExtractor, RelationOrigin, Result};
    use kgb_extractor::{KnowledgePipeline, RuleBasedNer};
    use std::sync::Arc;

    /// Relation extractor returning relations whose endpoints both occur
    /// in the text
    pub struct StaticRelationExtractor {
        relations: Vec<Relation>,
    }

    impl StaticRelationExtractor {
        pub fn new(relations: Vec<Relation>) -> Self {
            Self { relations }
        }
    }

    #[async_trait]
    impl RelationExtractor for StaticRelationExtractor {
        async fn extract(&self, text: &str) -> Result<Vec<Relation>> {
            Ok(self
                .relations
                .iter()
                .filter(|r| text.contains(&r.source) && text.contains(&r.target))
                .cloned()
                .collect())
        }

        fn name(&self) -> &str {
            "static"
        }
    }

    /// State with rule-based NER and a fixed set of known relations
    pub fn state() -> AppState {
        let relations = StaticRelationExtractor::new(vec![
            Relation::new("Jobs", "found", "Apple", RelationOrigin::Dependency),
            Relation::new("Apple", "manufacturer", "iPhone", RelationOrigin::Rebel),
            Relation::new("Apple", "headquarters location", "Cupertino", RelationOrigin::Rebel),
        ]);
        let pipeline = KnowledgePipeline::new(Arc::new(RuleBasedNer::new()), Arc::new(relations));

        AppState::with_pipeline(AppConfig::default(), Arc::new(pipeline))
    }
}
