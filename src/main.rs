use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use salesforge_leads::config::Config;
use salesforge_leads::embedding::EmbeddingClient;
use salesforge_leads::handlers::{self, AppState};
use salesforge_leads::search_client::ElasticsearchClient;

/// Main entry point for the lead scoring service.
///
/// Initializes tracing, loads configuration, builds the Elasticsearch and
/// embedding clients, and serves the HTTP API.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "salesforge_leads=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let store = ElasticsearchClient::new(
        config.elasticsearch_url.clone(),
        config.elasticsearch_api_key.clone(),
    )?;
    tracing::info!("Elasticsearch client initialized: {}", config.elasticsearch_url);

    // Embedding cache lives inside the client (1h TTL, 10k entries)
    let embedder = EmbeddingClient::new(&config)?;
    tracing::info!("Embedding client initialized (model {})", config.embedding_model);

    let app_state = Arc::new(AppState {
        config: config.clone(),
        store,
        embedder,
        batch_lock: Arc::new(Mutex::new(())),
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("invalid rate limiter configuration"))?,
    );

    let protected_routes = Router::new()
        .route("/api/v1/leads/score", post(handlers::score_lead))
        .route("/api/v1/scoring/batch", post(handlers::run_batch))
        .route(
            "/api/v1/leads/similar",
            get(handlers::similar_by_company).post(handlers::similar_by_text),
        )
        .route("/api/v1/leads/top", get(handlers::top_leads))
        .layer(
            ServiceBuilder::new()
                // Request size limit: 5MB max payload
                .layer(RequestBodyLimitLayer::new(5 * 1024 * 1024))
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    // Health check bypasses rate limiting
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
