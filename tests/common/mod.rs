//! Shared in-memory fakes for the store and embedding seams
#![allow(dead_code)]

use salesforge_leads::config::Config;
use salesforge_leads::embedding::Embedder;
use salesforge_leads::errors::AppError;
use salesforge_leads::models::{Lead, LeadHit, StoredLead};
use salesforge_leads::scoring::ScoreTier;
use salesforge_leads::search_client::{BulkOutcome, KnnQuery, LeadStore};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

pub fn create_test_config(elasticsearch_url: String) -> Config {
    Config {
        port: 8080,
        elasticsearch_url,
        elasticsearch_api_key: None,
        leads_index: "leads-raw".to_string(),
        actions_index: "agent-actions-log".to_string(),
        embedding_base_url: "http://localhost:1".to_string(),
        embedding_api_key: Some("test_key".to_string()),
        embedding_model: "text-embedding-3-small".to_string(),
        batch_size: 2,
    }
}

pub fn lead(name: &str, employees: i64, stage: &str, industry: &str, description: &str) -> Lead {
    Lead {
        company_name: Some(name.to_string()),
        employee_count: Some(employees),
        funding_stage: Some(stage.to_string()),
        industry: Some(industry.to_string()),
        company_description: Some(description.to_string()),
        ..Lead::default()
    }
}

pub fn stored(id: &str, lead: Lead) -> StoredLead {
    StoredLead {
        id: id.to_string(),
        lead,
    }
}

pub fn hit(id: &str, similarity: f64) -> LeadHit {
    LeadHit {
        id: id.to_string(),
        lead: Lead {
            company_name: Some(format!("Company {}", id)),
            company_description_vector: Some(vec![0.5; 4]),
            ..Lead::default()
        },
        similarity,
    }
}

#[derive(Default)]
pub struct StoreState {
    pub leads: Vec<StoredLead>,
    pub knn_hits: Vec<LeadHit>,
    pub knn_queries: Vec<KnnQuery>,
    /// (index, id, fields) per written document.
    pub updates: Vec<(String, String, Value)>,
    /// (index, document) per appended audit entry.
    pub appended: Vec<(String, Value)>,
    pub existing_indices: HashSet<String>,
    pub created_indices: Vec<String>,
    pub refreshed: Vec<String>,
    pub fetch_page_sizes: Vec<usize>,
    pub rejected_ids: HashSet<String>,
    pub fail_fetch: bool,
    pub fail_bulk: bool,
    pub fail_append: bool,
    /// Number of upcoming appends that fail before the store recovers.
    pub failing_appends: usize,
    pub append_attempts: usize,
    pub fail_refresh: bool,
}

/// In-memory `LeadStore`. Every call is recorded for assertions.
#[derive(Default)]
pub struct FakeStore {
    pub state: Mutex<StoreState>,
}

impl FakeStore {
    pub fn with_leads(leads: Vec<StoredLead>) -> Self {
        let store = Self::default();
        store.state.lock().unwrap().leads = leads;
        store
    }

    pub fn with_hits(leads: Vec<StoredLead>, hits: Vec<LeadHit>) -> Self {
        let store = Self::with_leads(leads);
        store.state.lock().unwrap().knn_hits = hits;
        store
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, StoreState> {
        self.state.lock().unwrap()
    }
}

fn unavailable(what: &str) -> AppError {
    AppError::StoreError(format!("{} unavailable", what))
}

impl LeadStore for FakeStore {
    async fn fetch_all(&self, _index: &str, page_size: usize) -> Result<Vec<StoredLead>, AppError> {
        let mut state = self.state();
        if state.fail_fetch {
            return Err(unavailable("fetch"));
        }
        state.fetch_page_sizes.push(page_size);
        Ok(state.leads.clone())
    }

    async fn update_fields(&self, index: &str, id: &str, fields: &Value) -> Result<(), AppError> {
        let mut state = self.state();
        if state.rejected_ids.contains(id) {
            return Err(AppError::NotFound(id.to_string()));
        }
        state
            .updates
            .push((index.to_string(), id.to_string(), fields.clone()));
        Ok(())
    }

    async fn bulk_update(
        &self,
        index: &str,
        updates: &[(String, Value)],
    ) -> Result<BulkOutcome, AppError> {
        let mut state = self.state();
        if state.fail_bulk {
            return Err(unavailable("bulk"));
        }

        let mut outcome = BulkOutcome::default();
        for (id, fields) in updates {
            if state.rejected_ids.contains(id) {
                outcome
                    .failed
                    .push((id.clone(), "document missing".to_string()));
            } else {
                state
                    .updates
                    .push((index.to_string(), id.clone(), fields.clone()));
                outcome.succeeded += 1;
            }
        }
        Ok(outcome)
    }

    async fn bulk_index(
        &self,
        _index: &str,
        docs: &[(String, Value)],
    ) -> Result<BulkOutcome, AppError> {
        let mut state = self.state();
        for (id, doc) in docs {
            let lead: Lead = serde_json::from_value(doc.clone())?;
            state.leads.retain(|s| &s.id != id);
            state.leads.push(stored(id, lead));
        }
        Ok(BulkOutcome {
            succeeded: docs.len(),
            failed: Vec::new(),
        })
    }

    async fn knn_search(&self, _index: &str, query: &KnnQuery) -> Result<Vec<LeadHit>, AppError> {
        let mut state = self.state();
        state.knn_queries.push(query.clone());
        Ok(state.knn_hits.iter().take(query.k).cloned().collect())
    }

    async fn find_by_company_name(
        &self,
        _index: &str,
        company_name: &str,
    ) -> Result<Option<StoredLead>, AppError> {
        let needle = company_name.to_lowercase();
        Ok(self
            .state()
            .leads
            .iter()
            .find(|s| s.lead.company_name_or_unknown().to_lowercase().contains(&needle))
            .cloned())
    }

    async fn top_leads_by_tier(
        &self,
        _index: &str,
        tier: ScoreTier,
        limit: usize,
    ) -> Result<Vec<StoredLead>, AppError> {
        let mut leads: Vec<StoredLead> = self
            .state()
            .leads
            .iter()
            .filter(|s| s.lead.score_tier.as_deref() == Some(tier.as_str()))
            .cloned()
            .collect();
        leads.sort_by(|a, b| b.lead.score.cmp(&a.lead.score));
        leads.truncate(limit);
        Ok(leads)
    }

    async fn append(&self, index: &str, doc: &Value) -> Result<String, AppError> {
        let mut state = self.state();
        state.append_attempts += 1;
        if state.fail_append {
            return Err(unavailable("append"));
        }
        if state.failing_appends > 0 {
            state.failing_appends -= 1;
            return Err(unavailable("append"));
        }
        state.appended.push((index.to_string(), doc.clone()));
        Ok(uuid::Uuid::new_v4().to_string())
    }

    async fn ensure_index(&self, index: &str, _mappings: &Value) -> Result<(), AppError> {
        let mut state = self.state();
        if state.existing_indices.insert(index.to_string()) {
            state.created_indices.push(index.to_string());
        }
        Ok(())
    }

    async fn refresh(&self, index: &str) -> Result<(), AppError> {
        let mut state = self.state();
        if state.fail_refresh {
            return Err(unavailable("refresh"));
        }
        state.refreshed.push(index.to_string());
        Ok(())
    }
}

/// Deterministic embedder: the vector is derived from the text bytes.
#[derive(Default)]
pub struct FakeEmbedder {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
    pub seen: Mutex<Vec<String>>,
}

impl FakeEmbedder {
    pub fn failing() -> Self {
        let embedder = Self::default();
        embedder.fail.store(true, Ordering::SeqCst);
        embedder
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector_for(text: &str) -> Vec<f32> {
        let sum: u32 = text.bytes().map(u32::from).sum();
        vec![text.len() as f32, (sum % 97) as f32, 1.0, 0.0]
    }
}

impl Embedder for FakeEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::ExternalApiError("embedding service down".to_string()));
        }
        self.seen.lock().unwrap().push(text.to_string());
        Ok(Self::vector_for(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}
