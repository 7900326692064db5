//! HTTP server implementation using Axum.

use axum::{
    Router,
    routing::{get, post},
};
use bonsai_agent::Agent;
use bonsai_core::config::BonsaiConfig;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Comma-separated list of allowed CORS origins. Unset means any origin.
pub const CORS_ORIGINS_ENV: &str = "BONSAI_CORS_ORIGINS";

/// Shared state for the gateway server. Immutable after startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<BonsaiConfig>,
    /// Retriever + answer generator, built once with the knowledge base loaded.
    pub agent: Arc<Agent>,
    pub start_time: std::time::Instant,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(config: BonsaiConfig, agent: Agent) -> Self {
        Self {
            config: Arc::new(config),
            agent: Arc::new(agent),
            start_time: std::time::Instant::now(),
            started_at: chrono::Utc::now(),
        }
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    build_router_from_arc(Arc::new(state))
}

pub fn build_router_from_arc(shared: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(super::routes::health_check))
        .route("/api/v1/info", get(super::routes::system_info))
        .route("/api/v1/ask", post(super::routes::ask))
        .route("/ask", post(super::routes::ask))
        .route("/chat", post(super::routes::ask))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}

fn cors_layer() -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600));

    // Example: BONSAI_CORS_ORIGINS=https://bonsai.example.jp,https://app.bonsai.example.jp
    match std::env::var(CORS_ORIGINS_ENV) {
        Ok(origins_str) => {
            let origins: Vec<_> = origins_str
                .split(',')
                .filter_map(|s| s.trim().parse::<axum::http::HeaderValue>().ok())
                .collect();
            cors.allow_origin(origins)
        }
        Err(_) => cors.allow_origin(Any),
    }
}

/// Start the HTTP server.
pub async fn start(state: AppState) -> anyhow::Result<()> {
    let addr = format!("{}:{}", state.config.gateway.host, state.config.gateway.port);
    tracing::info!(
        retriever = state.agent.retriever().kind(),
        chunks = state.agent.retriever().len(),
        answer_mode = ?state.agent.generator().mode(),
        "knowledge base ready"
    );

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("gateway server listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
