use crate::batch::{BatchReport, BatchScorer};
use crate::config::Config;
use crate::embedding::EmbeddingClient;
use crate::errors::AppError;
use crate::models::*;
use crate::scoring::{score_lead as apply_rubric, ScoreResult, ScoreTier};
use crate::search_client::{ElasticsearchClient, LeadStore};
use crate::similarity::{SimilarityRetriever, DEFAULT_TOP_K};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const DEFAULT_TOP_LEADS_LIMIT: usize = 20;
pub const MAX_TOP_LEADS_LIMIT: usize = 100;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Client for the Elasticsearch cluster holding leads and the audit trail.
    pub store: ElasticsearchClient,
    /// Client for the embedding service.
    pub embedder: EmbeddingClient,
    /// Held while a batch scoring run is in progress; one run at a time.
    pub batch_lock: Arc<Mutex<()>>,
}

/// Health check endpoint.
///
/// Returns the service status and version.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "salesforge-leads",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// POST /api/v1/leads/score
///
/// Applies the scoring rubric to the posted lead. Nothing is persisted.
pub async fn score_lead(Json(lead): Json<Lead>) -> Json<ScoreResult> {
    let result = apply_rubric(&lead);
    tracing::info!(
        "Scored ad-hoc lead '{}': {}/100 ({})",
        lead.company_name_or_unknown(),
        result.score(),
        result.tier()
    );
    Json(result)
}

/// POST /api/v1/scoring/batch
///
/// Scores every lead in the index, logs one audit entry per lead, and writes
/// the scores back. Rejects with 409 while another run is in progress.
pub async fn run_batch(State(state): State<Arc<AppState>>) -> Result<Json<BatchReport>, AppError> {
    let _guard = state.batch_lock.try_lock().map_err(|_| {
        AppError::Conflict("A batch scoring run is already in progress".to_string())
    })?;

    tracing::info!("POST /scoring/batch - starting batch scoring run");
    let report = BatchScorer::new(&state.store, &state.config).run().await?;

    if report.has_failures() {
        tracing::warn!(
            "Batch {} finished with {} update failures and {} audit failures",
            report.session_id,
            report.update_failures,
            report.audit_failures
        );
    }

    Ok(Json(report))
}

/// GET /api/v1/leads/similar?company=...&top_k=5
///
/// Leads most similar to the named company. 404 when the company is unknown.
pub async fn similar_by_company(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SimilarByCompanyParams>,
) -> Result<Json<SimilarLeads>, AppError> {
    tracing::info!("GET /leads/similar - params: {:?}", params);

    let retriever = SimilarityRetriever::new(&state.store, &state.embedder, &state.config);
    let query = SimilarityQuery {
        source: SimilaritySource::Company(params.company),
        top_k: params.top_k.unwrap_or(DEFAULT_TOP_K),
    };

    Ok(Json(retriever.find_similar(&query).await?))
}

/// POST /api/v1/leads/similar
///
/// Leads most similar to a free-text description.
pub async fn similar_by_text(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SimilarByTextRequest>,
) -> Result<Json<SimilarLeads>, AppError> {
    tracing::info!("POST /leads/similar - query: '{}'", request.query);

    let retriever = SimilarityRetriever::new(&state.store, &state.embedder, &state.config);
    let query = SimilarityQuery {
        source: SimilaritySource::Text(request.query),
        top_k: request.top_k.unwrap_or(DEFAULT_TOP_K),
    };

    Ok(Json(retriever.find_similar(&query).await?))
}

/// GET /api/v1/leads/top?tier=Hot&limit=20
///
/// Highest-scored leads of one tier, best first.
pub async fn top_leads(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TopLeadsParams>,
) -> Result<Json<Vec<StoredLead>>, AppError> {
    let tier = match params.tier.as_deref() {
        Some(raw) => ScoreTier::parse(raw)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown tier '{}'", raw)))?,
        None => ScoreTier::Hot,
    };
    let limit = params
        .limit
        .unwrap_or(DEFAULT_TOP_LEADS_LIMIT)
        .clamp(1, MAX_TOP_LEADS_LIMIT);

    tracing::info!("GET /leads/top - tier: {}, limit: {}", tier, limit);
    let leads = state
        .store
        .top_leads_by_tier(&state.config.leads_index, tier, limit)
        .await?;

    Ok(Json(leads))
}
