use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::scoring::{ScoreResult, ScoreTier};

/// Field holding the description embedding on lead documents.
pub const VECTOR_FIELD: &str = "company_description_vector";

// ============ Index Documents ============

/// A business lead as stored in the leads index.
///
/// Every field is optional on the wire: sparse records still deserialize and
/// still score. A mistyped value never fails the whole document; numbers and
/// booleans in text fields are read as text, anything else as missing. Attributes this crate does not interpret are kept in `extra`
/// so a read-modify-write never drops them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    /// Company legal or trading name.
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub company_name: Option<String>,
    /// Company web domain.
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub company_domain: Option<String>,
    /// Contact full name.
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub full_name: Option<String>,
    /// Contact job title.
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub job_title: Option<String>,
    /// Contact email.
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub email: Option<String>,
    /// Industry label (e.g. "SaaS", "FinTech").
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub industry: Option<String>,
    /// Funding stage label (e.g. "Series A").
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub funding_stage: Option<String>,
    /// Headcount. Accepts numbers or numeric strings.
    #[serde(
        default,
        deserialize_with = "lenient_integer",
        skip_serializing_if = "Option::is_none"
    )]
    pub employee_count: Option<i64>,
    /// Free-text company positioning.
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub company_description: Option<String>,
    /// Comma separated keyword list.
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub keywords: Option<String>,
    /// Embedding of `company_description`.
    #[serde(
        default,
        deserialize_with = "lenient_vector",
        skip_serializing_if = "Option::is_none"
    )]
    pub company_description_vector: Option<Vec<f32>>,
    /// Total score written by the scoring pass.
    #[serde(
        default,
        deserialize_with = "lenient_integer",
        skip_serializing_if = "Option::is_none"
    )]
    pub score: Option<i64>,
    /// Tier label written by the scoring pass.
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub score_tier: Option<String>,
    /// Multi-line reasoning written by the scoring pass.
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub score_reasoning: Option<String>,
    /// Per-dimension breakdown written by the scoring pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_breakdown: Option<Value>,
    /// Last time the scoring pass touched this document.
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<String>,
    /// Any other attributes on the document.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Lead {
    pub fn company_name_or_unknown(&self) -> &str {
        self.company_name.as_deref().unwrap_or("Unknown")
    }

    /// Missing headcount scores as zero.
    pub fn employee_count_or_zero(&self) -> i64 {
        self.employee_count.unwrap_or(0)
    }

    pub fn funding_stage_or_unknown(&self) -> &str {
        self.funding_stage.as_deref().unwrap_or("Unknown")
    }

    pub fn industry_or_empty(&self) -> &str {
        self.industry.as_deref().unwrap_or("")
    }

    pub fn description(&self) -> &str {
        self.company_description.as_deref().unwrap_or("")
    }

    /// Text to embed: the description, else an untyped `description` attribute.
    pub fn embedding_text(&self) -> &str {
        self.company_description
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .or_else(|| self.extra.get("description").and_then(Value::as_str))
            .unwrap_or("")
    }

    pub fn keywords(&self) -> &str {
        self.keywords.as_deref().unwrap_or("")
    }

    /// Stable document id for imports: UUID v5 of the domain, else the name.
    ///
    /// Re-importing the same company overwrites its document instead of
    /// duplicating it. Leads with neither get a random id.
    pub fn document_id(&self) -> String {
        let key = [&self.company_domain, &self.company_name]
            .into_iter()
            .flatten()
            .map(|s| s.trim().to_lowercase())
            .find(|s| !s.is_empty());

        match key {
            Some(key) => Uuid::new_v5(&Uuid::NAMESPACE_DNS, key.as_bytes()).to_string(),
            None => Uuid::new_v4().to_string(),
        }
    }

    /// Returns the stored embedding if it is present and non-empty.
    pub fn vector(&self) -> Option<&[f32]> {
        self.company_description_vector
            .as_deref()
            .filter(|v| !v.is_empty())
    }
}

fn lenient_integer<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    })
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

fn lenient_vector<'de, D>(deserializer: D) -> Result<Option<Vec<f32>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let Some(Value::Array(items)) = value else {
        return Ok(None);
    };
    Ok(items
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32))
        .collect::<Option<Vec<f32>>>())
}

/// Parses an import file: either a JSON list of leads or `{"leads": [...]}`.
pub fn parse_lead_file(raw: &str) -> Result<Vec<Lead>, serde_json::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum LeadFile {
        List(Vec<Lead>),
        Wrapped { leads: Vec<Lead> },
    }

    Ok(match serde_json::from_str::<LeadFile>(raw)? {
        LeadFile::List(leads) => leads,
        LeadFile::Wrapped { leads } => leads,
    })
}

/// A lead together with its document id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredLead {
    pub id: String,
    pub lead: Lead,
}

/// One nearest-neighbor result, in engine relevance order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeadHit {
    pub id: String,
    pub lead: Lead,
    /// Engine similarity score; higher is closer.
    pub similarity: f64,
}

// ============ Audit Trail ============

/// Kind of action recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Scored,
}

/// Append-only audit record. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionLogEntry {
    pub lead_id: String,
    pub company_name: String,
    pub action_type: ActionType,
    pub action_details: String,
    pub score: Option<u32>,
    pub score_tier: Option<ScoreTier>,
    pub agent_session: String,
    pub timestamp: DateTime<Utc>,
}

impl ActionLogEntry {
    /// Builds the `scored` entry for one lead of a batch session.
    pub fn scored(
        lead_id: &str,
        company_name: &str,
        result: &ScoreResult,
        session_id: &str,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            lead_id: lead_id.to_string(),
            company_name: company_name.to_string(),
            action_type: ActionType::Scored,
            action_details: result.reasoning().to_string(),
            score: Some(result.score()),
            score_tier: Some(result.tier()),
            agent_session: session_id.to_string(),
            timestamp,
        }
    }
}

// ============ Similarity ============

/// What a similarity lookup starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimilaritySource {
    /// Resolve a lead by company name and use its vector.
    Company(String),
    /// Embed free text directly.
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimilarityQuery {
    pub source: SimilaritySource,
    pub top_k: usize,
}

/// Outcome of a similarity lookup.
#[derive(Debug, Clone, Serialize)]
pub struct SimilarLeads {
    /// The resolved source lead, when the lookup started from a company.
    pub source: Option<StoredLead>,
    pub results: Vec<LeadHit>,
}

// ============ API Requests ============

/// Query parameters for `GET /api/v1/leads/similar`.
#[derive(Debug, Clone, Deserialize)]
pub struct SimilarByCompanyParams {
    pub company: String,
    pub top_k: Option<usize>,
}

/// Body of `POST /api/v1/leads/similar`.
#[derive(Debug, Clone, Deserialize)]
pub struct SimilarByTextRequest {
    pub query: String,
    pub top_k: Option<usize>,
}

/// Query parameters for `GET /api/v1/leads/top`.
#[derive(Debug, Clone, Deserialize)]
pub struct TopLeadsParams {
    /// Tier name, case-insensitive. Defaults to Hot.
    pub tier: Option<String>,
    pub limit: Option<usize>,
}
