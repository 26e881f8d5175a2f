//! API server: webhook endpoints, operational probes and the metrics exporter.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::routing::get;
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use survey_core::config::AppConfig;
use survey_engine::SurveyEngine;
use survey_store::ProgressStore;

use crate::{rest, webhook};

/// Shared state for every handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SurveyEngine>,
    pub store: Arc<dyn ProgressStore>,
    pub node_id: String,
    pub verify_token: String,
    pub app_secret: Option<String>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: &AppConfig, engine: Arc<SurveyEngine>, store: Arc<dyn ProgressStore>) -> Self {
        Self {
            engine,
            store,
            node_id: config.node_id.clone(),
            verify_token: config.whatsapp.verify_token.clone(),
            app_secret: config
                .whatsapp
                .app_secret
                .clone()
                .filter(|secret| !secret.is_empty()),
            start_time: Instant::now(),
        }
    }
}

/// Build the HTTP router. The webhook is served on both `/webhook` and `/`
/// so either callback URL can be registered with the platform.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/webhook",
            get(webhook::verify_webhook).post(webhook::receive_webhook),
        )
        .route("/", get(webhook::verify_webhook).post(webhook::receive_webhook))
        // Operational endpoints
        .route("/health", get(rest::health_check))
        .route("/ready", get(rest::readiness))
        .route("/live", get(rest::liveness))
        // Middleware
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Main API server.
pub struct ApiServer {
    config: AppConfig,
    engine: Arc<SurveyEngine>,
    store: Arc<dyn ProgressStore>,
}

impl ApiServer {
    pub fn new(config: AppConfig, engine: Arc<SurveyEngine>, store: Arc<dyn ProgressStore>) -> Self {
        Self {
            config,
            engine,
            store,
        }
    }

    /// Start the HTTP server.
    pub async fn start_http(&self) -> anyhow::Result<()> {
        let state = AppState::new(&self.config, self.engine.clone(), self.store.clone());
        let app = router(state);

        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);

        info!(addr = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    /// Start the metrics server on a separate port.
    pub async fn start_metrics(&self) -> anyhow::Result<()> {
        if !self.config.metrics.enabled {
            info!("Metrics exporter disabled");
            return Ok(());
        }

        let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
        builder
            .with_http_listener(SocketAddr::new(
                self.config.api.host.parse()?,
                self.config.metrics.port,
            ))
            .install()?;

        info!(port = self.config.metrics.port, "Metrics exporter started");
        Ok(())
    }
}
