//! Application state management
//!
//! Author: hephaex@gmail.com

use kgb_core::{AppConfig, Result};
use kgb_extractor::KnowledgePipeline;
use kgb_parser::ParserRegistry;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Extraction pipeline
    pub pipeline: Arc<KnowledgePipeline>,
    /// Document parsers for uploads
    pub parsers: ParserRegistry,
    /// Server start time
    pub start_time: Instant,
    /// Request counter
    pub request_count: AtomicU64,
    /// Graphs built since start
    pub graphs_built: AtomicU64,
    /// Ready status
    pub is_ready: AtomicBool,
}

impl AppState {
    /// Create state with a pipeline wired from config
    pub fn new(config: AppConfig) -> Result<Self> {
        let pipeline = KnowledgePipeline::from_config(&config)?;
        Ok(Self::with_pipeline(config, Arc::new(pipeline)))
    }

    /// Create state around an existing pipeline
    pub fn with_pipeline(config: AppConfig, pipeline: Arc<KnowledgePipeline>) -> Self {
        Self {
            config,
            pipeline,
            parsers: ParserRegistry::with_defaults(),
            start_time: Instant::now(),
            request_count: AtomicU64::new(0),
            graphs_built: AtomicU64::new(0),
            is_ready: AtomicBool::new(true),
        }
    }

    /// Increment request counter
    pub fn increment_requests(&self) -> u64 {
        self.request_count.fetch_add(1, Ordering::SeqCst)
    }

    /// Get total request count
    pub fn get_request_count(&self) -> u64 {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Count a successfully built graph
    pub fn record_graph(&self) {
        self.graphs_built.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get_graphs_built(&self) -> u64 {
        self.graphs_built.load(Ordering::SeqCst)
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Check if service is ready
    pub fn is_ready(&self) -> bool {
        self.is_ready.load(Ordering::SeqCst)
    }

    /// Set ready status
    pub fn set_ready(&self, ready: bool) {
        self.is_ready.store(ready, Ordering::SeqCst);
    }
}
