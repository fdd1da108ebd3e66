use chrono::{DateTime, Utc};

use crate::errors::AppError;
use crate::models::ActionLogEntry;
use crate::scoring::ScoreResult;
use crate::search_client::LeadStore;

/// Session id shared by every entry of one batch run, e.g. `batch-20260118-093000`.
pub fn new_session_id(now: DateTime<Utc>) -> String {
    format!("batch-{}", now.format("%Y%m%d-%H%M%S"))
}

/// Appends audit entries for one session.
///
/// Entries are append-only: there is no update or delete path. Every append
/// is attempted; a failure is returned to the caller and never affects the
/// next call.
pub struct AuditLogger<'a, S> {
    store: &'a S,
    index: &'a str,
    session_id: String,
}

impl<'a, S: LeadStore> AuditLogger<'a, S> {
    pub fn new(store: &'a S, index: &'a str, session_id: String) -> Self {
        Self {
            store,
            index,
            session_id,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Records that `lead_id` was scored, with the full reasoning as details.
    pub async fn log_scored(
        &self,
        lead_id: &str,
        company_name: &str,
        result: &ScoreResult,
    ) -> Result<String, AppError> {
        let entry =
            ActionLogEntry::scored(lead_id, company_name, result, &self.session_id, Utc::now());
        self.append(&entry).await
    }

    /// Appends one entry and returns its document id.
    pub async fn append(&self, entry: &ActionLogEntry) -> Result<String, AppError> {
        let doc = serde_json::to_value(entry)?;
        self.store.append(self.index, &doc).await
    }
}
