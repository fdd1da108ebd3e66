//! "Find me more leads like this one."
//!
//! Two entry points converge on one nearest-neighbor step:
//!
//! 1. By company: resolve the lead by name, reuse its stored vector or embed
//!    its description when the vector is missing.
//! 2. By text: embed the supplied text.
//!
//! The kNN query asks for one extra hit when the source lead must be excluded,
//! drops it, then truncates to `top_k` without reordering.

use crate::config::Config;
use crate::embedding::Embedder;
use crate::errors::{AppError, ResultExt};
use crate::models::{
    LeadHit, SimilarLeads, SimilarityQuery, SimilaritySource, StoredLead, VECTOR_FIELD,
};
use crate::search_client::{KnnQuery, LeadStore};

/// Candidate pool size for approximate search; larger improves recall.
pub const NUM_CANDIDATES: usize = 50;
pub const DEFAULT_TOP_K: usize = 5;
/// Largest accepted `top_k`.
pub const MAX_TOP_K: usize = 100;

pub struct SimilarityRetriever<'a, S, E> {
    store: &'a S,
    embedder: &'a E,
    index: &'a str,
}

impl<'a, S: LeadStore, E: Embedder> SimilarityRetriever<'a, S, E> {
    pub fn new(store: &'a S, embedder: &'a E, config: &'a Config) -> Self {
        Self {
            store,
            embedder,
            index: &config.leads_index,
        }
    }

    pub async fn find_similar(&self, query: &SimilarityQuery) -> Result<SimilarLeads, AppError> {
        match &query.source {
            SimilaritySource::Company(name) => {
                self.find_similar_to_company(name, query.top_k).await
            }
            SimilaritySource::Text(text) => self.find_similar_to_text(text, query.top_k).await,
        }
    }

    /// Leads similar to the best match for `company_name`, excluding that lead.
    ///
    /// Returns `AppError::NotFound` when no company matches; no search runs.
    pub async fn find_similar_to_company(
        &self,
        company_name: &str,
        top_k: usize,
    ) -> Result<SimilarLeads, AppError> {
        validate_top_k(top_k)?;
        let mut source = self.resolve_company(company_name).await?;

        let vector = match source.lead.vector() {
            Some(vector) => vector.to_vec(),
            None => {
                tracing::info!(
                    "Lead {} has no vector embedding, generating one",
                    source.id
                );
                let description = source.lead.embedding_text().trim();
                if description.is_empty() {
                    return Err(AppError::BadRequest(format!(
                        "Lead '{}' has no vector and no description to embed",
                        source.lead.company_name_or_unknown()
                    )));
                }
                self.embedder
                    .embed(description)
                    .await
                    .with_context(|| format!("embedding description of lead {}", source.id))?
            }
        };

        let results = self
            .find_similar_by_vector(vector, Some(&source.id), top_k)
            .await?;

        source.lead.company_description_vector = None;
        Ok(SimilarLeads {
            source: Some(source),
            results,
        })
    }

    /// Leads similar to a free-text description.
    pub async fn find_similar_to_text(
        &self,
        text: &str,
        top_k: usize,
    ) -> Result<SimilarLeads, AppError> {
        validate_top_k(top_k)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::BadRequest("Query text cannot be empty".to_string()));
        }

        tracing::info!("Searching for leads similar to: '{}'", text);
        let vector = self
            .embedder
            .embed(text)
            .await
            .context("embedding query text")?;

        let results = self.find_similar_by_vector(vector, None, top_k).await?;
        Ok(SimilarLeads {
            source: None,
            results,
        })
    }

    /// Runs the nearest-neighbor query and applies exclusion and truncation.
    pub async fn find_similar_by_vector(
        &self,
        vector: Vec<f32>,
        exclude_id: Option<&str>,
        top_k: usize,
    ) -> Result<Vec<LeadHit>, AppError> {
        validate_top_k(top_k)?;
        let query = knn_query(vector, top_k, exclude_id.is_some());
        let hits = self.store.knn_search(self.index, &query).await?;

        let results = select_results(hits, exclude_id, top_k);
        tracing::info!("Found {} similar leads", results.len());
        Ok(results)
    }

    /// Best match on company name, or `NotFound`.
    pub async fn resolve_company(&self, company_name: &str) -> Result<StoredLead, AppError> {
        let company_name = company_name.trim();
        if company_name.is_empty() {
            return Err(AppError::BadRequest("Company name cannot be empty".to_string()));
        }

        tracing::info!("Looking up company: '{}'", company_name);
        self.store
            .find_by_company_name(self.index, company_name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Company '{}' not found", company_name)))
    }
}

fn validate_top_k(top_k: usize) -> Result<(), AppError> {
    if top_k == 0 {
        return Err(AppError::BadRequest("top_k must be at least 1".to_string()));
    }
    if top_k > MAX_TOP_K {
        return Err(AppError::BadRequest(format!(
            "top_k must be at most {}",
            MAX_TOP_K
        )));
    }
    Ok(())
}

/// Builds the kNN request: one extra hit when the source will be dropped.
pub fn knn_query(vector: Vec<f32>, top_k: usize, has_exclusion: bool) -> KnnQuery {
    let k = top_k + usize::from(has_exclusion);
    KnnQuery {
        field: VECTOR_FIELD.to_string(),
        vector,
        k,
        num_candidates: NUM_CANDIDATES.max(k),
        excluded_fields: vec![VECTOR_FIELD.to_string()],
    }
}

/// Drops the excluded id, keeps engine order, truncates to `top_k`, and strips
/// vectors from the payloads.
pub fn select_results(hits: Vec<LeadHit>, exclude_id: Option<&str>, top_k: usize) -> Vec<LeadHit> {
    hits.into_iter()
        .filter(|hit| Some(hit.id.as_str()) != exclude_id)
        .take(top_k)
        .map(|mut hit| {
            hit.lead.company_description_vector = None;
            hit
        })
        .collect()
}
