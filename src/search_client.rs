use crate::errors::AppError;
use crate::models::{Lead, LeadHit, StoredLead, VECTOR_FIELD};
use crate::scoring::ScoreTier;
use serde_json::{json, Value};
use std::future::Future;
use std::time::Duration;

/// Mappings for the audit trail index.
pub fn actions_index_mappings() -> Value {
    json!({
        "mappings": {
            "properties": {
                "lead_id": { "type": "keyword" },
                "company_name": { "type": "text", "fields": { "keyword": { "type": "keyword" } } },
                "action_type": { "type": "keyword" },
                "action_details": { "type": "text" },
                "score": { "type": "float" },
                "score_tier": { "type": "keyword" },
                "agent_session": { "type": "keyword" },
                "timestamp": { "type": "date" }
            }
        }
    })
}

/// Approximate nearest-neighbor request.
#[derive(Debug, Clone, PartialEq)]
pub struct KnnQuery {
    pub field: String,
    pub vector: Vec<f32>,
    pub k: usize,
    pub num_candidates: usize,
    pub excluded_fields: Vec<String>,
}

/// Per-document outcome of a bulk request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkOutcome {
    pub succeeded: usize,
    /// (document id, reason) for each rejected item.
    pub failed: Vec<(String, String)>,
}

/// Contract with the search/index store holding leads and the audit trail.
pub trait LeadStore: Send + Sync {
    /// Every document of `index`, in store order, fetched `page_size` at a time.
    fn fetch_all(
        &self,
        index: &str,
        page_size: usize,
    ) -> impl Future<Output = Result<Vec<StoredLead>, AppError>> + Send;

    /// Partially updates one document.
    fn update_fields(
        &self,
        index: &str,
        id: &str,
        fields: &Value,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Partially updates many documents in one request.
    fn bulk_update(
        &self,
        index: &str,
        updates: &[(String, Value)],
    ) -> impl Future<Output = Result<BulkOutcome, AppError>> + Send;

    /// Indexes (creates or replaces) many documents in one request.
    fn bulk_index(
        &self,
        index: &str,
        docs: &[(String, Value)],
    ) -> impl Future<Output = Result<BulkOutcome, AppError>> + Send;

    /// Nearest-neighbor search, results in relevance order.
    fn knn_search(
        &self,
        index: &str,
        query: &KnnQuery,
    ) -> impl Future<Output = Result<Vec<LeadHit>, AppError>> + Send;

    /// Best full-text match on `company_name`.
    fn find_by_company_name(
        &self,
        index: &str,
        company_name: &str,
    ) -> impl Future<Output = Result<Option<StoredLead>, AppError>> + Send;

    /// Highest-scored leads of one tier.
    fn top_leads_by_tier(
        &self,
        index: &str,
        tier: ScoreTier,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<StoredLead>, AppError>> + Send;

    /// Appends a new document and returns its generated id.
    fn append(
        &self,
        index: &str,
        doc: &Value,
    ) -> impl Future<Output = Result<String, AppError>> + Send;

    /// Creates `index` with `mappings` unless it already exists.
    fn ensure_index(
        &self,
        index: &str,
        mappings: &Value,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Makes recent writes visible to search.
    fn refresh(&self, index: &str) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Elasticsearch REST client.
#[derive(Clone)]
pub struct ElasticsearchClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl ElasticsearchClient {
    /// Creates a new `ElasticsearchClient`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Cluster URL, e.g. `https://my-deployment.es.io:443`.
    /// * `api_key` - Optional encoded API key sent as `Authorization: ApiKey ...`.
    pub fn new(base_url: String, api_key: Option<String>) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create Elasticsearch client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let builder = self.client.request(method, url);
        match &self.api_key {
            Some(key) => builder.header("Authorization", format!("ApiKey {}", key)),
            None => builder,
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder, what: &str) -> Result<Value, AppError> {
        let response = builder
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("{} request failed: {}", what, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::StoreError(format!(
                "{} returned {}: {}",
                what, status, error_text
            )));
        }

        response.json().await.map_err(|e| {
            AppError::StoreError(format!("Failed to parse {} response: {}", what, e))
        })
    }

    async fn search(&self, index: &str, body: &Value) -> Result<Vec<Value>, AppError> {
        let data = self
            .send(
                self.request(reqwest::Method::POST, &format!("{}/_search", index))
                    .json(body),
                "search",
            )
            .await?;

        Ok(search_hits(&data))
    }

    async fn open_point_in_time(&self, index: &str) -> Result<String, AppError> {
        let data = self
            .send(
                self.request(
                    reqwest::Method::POST,
                    &format!("{}/_pit?keep_alive={}", index, PIT_KEEP_ALIVE),
                ),
                "open point-in-time",
            )
            .await?;

        data.get("id")
            .and_then(|id| id.as_str())
            .map(str::to_string)
            .ok_or_else(|| AppError::StoreError("Point-in-time response missing 'id'".to_string()))
    }

    async fn close_point_in_time(&self, pit_id: &str) -> Result<(), AppError> {
        self.send(
            self.request(reqwest::Method::DELETE, "_pit")
                .json(&json!({ "id": pit_id })),
            "close point-in-time",
        )
        .await?;
        Ok(())
    }

    /// Walks the snapshot with `search_after`. `pit_id` tracks the id the
    /// cluster hands back on each page.
    async fn fetch_pages(
        &self,
        pit_id: &mut String,
        page_size: usize,
    ) -> Result<Vec<StoredLead>, AppError> {
        let mut leads = Vec::new();
        let mut search_after: Option<Value> = None;

        loop {
            let body = page_request(pit_id, page_size, search_after.as_ref());
            let data = self
                .send(
                    self.request(reqwest::Method::POST, "_search").json(&body),
                    "search",
                )
                .await?;

            if let Some(id) = data.get("pit_id").and_then(|id| id.as_str()) {
                *pit_id = id.to_string();
            }

            let hits = search_hits(&data);
            let page_len = hits.len();
            search_after = hits.last().and_then(|hit| hit.get("sort")).cloned();
            for hit in hits {
                leads.push(parse_stored_lead(hit)?);
            }

            tracing::debug!("Fetched {} leads (page of {})", leads.len(), page_len);
            if page_len < page_size {
                break;
            }
            if search_after.is_none() {
                return Err(AppError::StoreError(
                    "Search hits carry no sort values, cannot page further".to_string(),
                ));
            }
        }

        Ok(leads)
    }

    async fn bulk(&self, lines: String, what: &str) -> Result<BulkOutcome, AppError> {
        let data = self
            .send(
                self.request(reqwest::Method::POST, "_bulk")
                    .header("Content-Type", "application/x-ndjson")
                    .body(lines),
                what,
            )
            .await?;

        Ok(parse_bulk_response(&data))
    }
}

impl LeadStore for ElasticsearchClient {
    async fn fetch_all(&self, index: &str, page_size: usize) -> Result<Vec<StoredLead>, AppError> {
        let page_size = page_size.max(1);
        let mut pit_id = self.open_point_in_time(index).await?;

        let result = self.fetch_pages(&mut pit_id, page_size).await;

        if let Err(e) = self.close_point_in_time(&pit_id).await {
            tracing::warn!("Failed to close point-in-time on '{}': {}", index, e);
        }
        if let Ok(leads) = &result {
            tracing::info!("Fetched {} leads from '{}'", leads.len(), index);
        }
        result
    }

    async fn update_fields(&self, index: &str, id: &str, fields: &Value) -> Result<(), AppError> {
        self.send(
            self.request(reqwest::Method::POST, &format!("{}/_update/{}", index, id))
                .json(&json!({ "doc": fields })),
            "update",
        )
        .await?;
        Ok(())
    }

    async fn bulk_update(
        &self,
        index: &str,
        updates: &[(String, Value)],
    ) -> Result<BulkOutcome, AppError> {
        if updates.is_empty() {
            return Ok(BulkOutcome::default());
        }

        let mut lines = String::new();
        for (id, fields) in updates {
            lines.push_str(&json!({ "update": { "_index": index, "_id": id } }).to_string());
            lines.push('\n');
            lines.push_str(&json!({ "doc": fields }).to_string());
            lines.push('\n');
        }

        tracing::info!("Bulk updating {} documents in '{}'", updates.len(), index);
        self.bulk(lines, "bulk update").await
    }

    async fn bulk_index(
        &self,
        index: &str,
        docs: &[(String, Value)],
    ) -> Result<BulkOutcome, AppError> {
        if docs.is_empty() {
            return Ok(BulkOutcome::default());
        }

        let mut lines = String::new();
        for (id, doc) in docs {
            lines.push_str(&json!({ "index": { "_index": index, "_id": id } }).to_string());
            lines.push('\n');
            lines.push_str(&doc.to_string());
            lines.push('\n');
        }

        tracing::info!("Bulk indexing {} documents into '{}'", docs.len(), index);
        self.bulk(lines, "bulk index").await
    }

    async fn knn_search(&self, index: &str, query: &KnnQuery) -> Result<Vec<LeadHit>, AppError> {
        let body = json!({
            "knn": {
                "field": query.field,
                "query_vector": query.vector,
                "k": query.k,
                "num_candidates": query.num_candidates,
            },
            "_source": { "excludes": query.excluded_fields },
            "size": query.k,
        });

        tracing::debug!(
            "kNN search on '{}': k={}, num_candidates={}",
            index,
            query.k,
            query.num_candidates
        );

        self.search(index, &body)
            .await?
            .into_iter()
            .map(|hit| {
                let similarity = hit.get("_score").and_then(|s| s.as_f64()).unwrap_or(0.0);
                let stored = parse_stored_lead(hit)?;
                Ok(LeadHit {
                    id: stored.id,
                    lead: stored.lead,
                    similarity,
                })
            })
            .collect()
    }

    async fn find_by_company_name(
        &self,
        index: &str,
        company_name: &str,
    ) -> Result<Option<StoredLead>, AppError> {
        let body = json!({
            "query": { "match": { "company_name": company_name } },
            "size": 1,
        });

        self.search(index, &body)
            .await?
            .into_iter()
            .next()
            .map(parse_stored_lead)
            .transpose()
    }

    async fn top_leads_by_tier(
        &self,
        index: &str,
        tier: ScoreTier,
        limit: usize,
    ) -> Result<Vec<StoredLead>, AppError> {
        let body = json!({
            "query": { "term": { "score_tier": tier.as_str() } },
            "sort": [{ "score": "desc" }],
            "size": limit,
            "_source": { "excludes": [VECTOR_FIELD] },
        });

        self.search(index, &body)
            .await?
            .into_iter()
            .map(parse_stored_lead)
            .collect()
    }

    async fn append(&self, index: &str, doc: &Value) -> Result<String, AppError> {
        let data = self
            .send(
                self.request(reqwest::Method::POST, &format!("{}/_doc", index))
                    .json(doc),
                "append",
            )
            .await?;

        data.get("_id")
            .and_then(|id| id.as_str())
            .map(str::to_string)
            .ok_or_else(|| AppError::StoreError("Append response missing '_id' field".to_string()))
    }

    async fn ensure_index(&self, index: &str, mappings: &Value) -> Result<(), AppError> {
        let response = self
            .request(reqwest::Method::HEAD, index)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("index check failed: {}", e)))?;

        if response.status().is_success() {
            tracing::debug!("Index '{}' already exists", index);
            return Ok(());
        }
        if response.status() != reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::StoreError(format!(
                "index check for '{}' returned {}",
                index,
                response.status()
            )));
        }

        self.send(
            self.request(reqwest::Method::PUT, index).json(mappings),
            "create index",
        )
        .await?;
        tracing::info!("Created index '{}'", index);
        Ok(())
    }

    async fn refresh(&self, index: &str) -> Result<(), AppError> {
        self.send(
            self.request(reqwest::Method::POST, &format!("{}/_refresh", index)),
            "refresh",
        )
        .await?;
        Ok(())
    }
}

/// Point-in-time lifetime between two page requests.
const PIT_KEEP_ALIVE: &str = "1m";

/// One page of a point-in-time scan in shard order. Unlike `from`/`size`
/// paging this is not bounded by the index's result window.
fn page_request(pit_id: &str, page_size: usize, search_after: Option<&Value>) -> Value {
    let mut body = json!({
        "query": { "match_all": {} },
        "pit": { "id": pit_id, "keep_alive": PIT_KEEP_ALIVE },
        "sort": [{ "_shard_doc": "asc" }],
        "size": page_size,
        "track_total_hits": false,
        "_source": { "excludes": [VECTOR_FIELD] },
    });
    if let Some(after) = search_after {
        body["search_after"] = after.clone();
    }
    body
}

fn search_hits(data: &Value) -> Vec<Value> {
    data.get("hits")
        .and_then(|h| h.get("hits"))
        .and_then(|h| h.as_array())
        .cloned()
        .unwrap_or_default()
}

fn parse_stored_lead(hit: Value) -> Result<StoredLead, AppError> {
    let id = hit
        .get("_id")
        .and_then(|id| id.as_str())
        .ok_or_else(|| AppError::StoreError("Search hit missing '_id' field".to_string()))?
        .to_string();

    let source = hit.get("_source").cloned().unwrap_or_else(|| json!({}));
    let lead: Lead = serde_json::from_value(source).map_err(|e| {
        AppError::StoreError(format!("Document {} is not a valid lead: {}", id, e))
    })?;

    Ok(StoredLead { id, lead })
}

fn parse_bulk_response(data: &Value) -> BulkOutcome {
    let mut outcome = BulkOutcome::default();
    let items = data
        .get("items")
        .and_then(|i| i.as_array())
        .cloned()
        .unwrap_or_default();

    for item in items {
        // Each item is keyed by its action name ("update", "index", ...).
        let Some(result) = item.as_object().and_then(|o| o.values().next()) else {
            continue;
        };
        let id = result
            .get("_id")
            .and_then(|id| id.as_str())
            .unwrap_or("")
            .to_string();

        match result.get("error") {
            Some(error) => {
                let reason = error
                    .get("reason")
                    .and_then(|r| r.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| error.to_string());
                outcome.failed.push((id, reason));
            }
            None => outcome.succeeded += 1,
        }
    }

    outcome
}
