use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, routing::get, routing::post};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use marshal_config::AppConfig;
use marshal_core::{CachingSupport, ChainBuilder, ChainError, LocationResolver};

use crate::engine::{BasicValidationEngine, ValidationEngine};
use crate::evaluator::{JsonResourceSerializer, LocationPathEvaluator};
use crate::handlers;

/// Shared request-handling state; everything is immutable once built.
#[derive(Clone)]
pub struct AppState {
    pub chain: Arc<CachingSupport>,
    pub engine: Arc<dyn ValidationEngine>,
    pub resolver: Arc<LocationResolver>,
}

impl AppState {
    pub fn new(chain: Arc<CachingSupport>) -> Self {
        Self {
            chain,
            engine: Arc::new(BasicValidationEngine::new()),
            resolver: Arc::new(LocationResolver::new(
                Arc::new(LocationPathEvaluator::new()),
                Arc::new(JsonResourceSerializer::new()),
            )),
        }
    }
}

pub fn build_app(cfg: &AppConfig, state: AppState) -> Router {
    let body_limit = cfg.server.body_limit_bytes;
    Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .route("/metadata", get(handlers::metadata))
        .route("/validate", post(handlers::validate))
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

pub struct MarshalServer {
    addr: SocketAddr,
    app: Router,
}

pub struct ServerBuilder {
    config: AppConfig,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.config = cfg;
        self
    }

    /// Runs the startup sequence: preflight, retrieval, chain assembly.
    /// Failure here means the service never starts.
    pub async fn build(self) -> Result<MarshalServer, ChainError> {
        let chain = ChainBuilder::from_config(&self.config).build().await?;
        let state = AppState::new(chain);
        let app = build_app(&self.config, state);
        Ok(MarshalServer {
            addr: self.config.addr(),
            app,
        })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MarshalServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
