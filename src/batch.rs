//! Batch scoring pass over every lead in the index
//!
//! Workflow:
//! 1. Make sure the audit index exists (never recreated, history is kept)
//! 2. Fetch all leads
//! 3. Score each lead, append one audit entry per lead
//! 4. Bulk-write the score fields back
//! 5. Refresh both indices
//!
//! Leads are processed sequentially in fetch order. A write failure for one
//! lead is counted in the report and never aborts the run.
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use crate::audit::{new_session_id, AuditLogger};
use crate::config::Config;
use crate::errors::{AppError, ResultExt};
use crate::scoring::{score_lead, ScoreTier};
use crate::search_client::{actions_index_mappings, LeadStore};

/// Summary of one batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub session_id: String,
    pub total: usize,
    pub hot: usize,
    pub warm: usize,
    pub cold: usize,
    /// Leads whose score fields were written back.
    pub updated: usize,
    /// Leads whose write-back failed.
    pub update_failures: usize,
    /// Leads whose audit entry could not be appended.
    pub audit_failures: usize,
}

impl BatchReport {
    fn record_tier(&mut self, tier: ScoreTier) {
        match tier {
            ScoreTier::Hot => self.hot += 1,
            ScoreTier::Warm => self.warm += 1,
            ScoreTier::Cold => self.cold += 1,
        }
    }

    /// Share of leads in `tier`, as a percentage.
    pub fn percentage(&self, tier: ScoreTier) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let count = match tier {
            ScoreTier::Hot => self.hot,
            ScoreTier::Warm => self.warm,
            ScoreTier::Cold => self.cold,
        };
        count as f64 / self.total as f64 * 100.0
    }

    pub fn has_failures(&self) -> bool {
        self.update_failures > 0 || self.audit_failures > 0
    }
}

pub struct BatchScorer<'a, S> {
    store: &'a S,
    config: &'a Config,
}

impl<'a, S: LeadStore> BatchScorer<'a, S> {
    pub fn new(store: &'a S, config: &'a Config) -> Self {
        Self { store, config }
    }

    /// Runs one full scoring pass.
    ///
    /// Fails only when the leads cannot be fetched or the audit index cannot
    /// be provisioned; everything after that is counted per lead.
    pub async fn run(&self) -> Result<BatchReport, AppError> {
        let leads_index = self.config.leads_index.as_str();
        let actions_index = self.config.actions_index.as_str();

        self.store
            .ensure_index(actions_index, &actions_index_mappings())
            .await
            .context("provisioning audit index")?;

        tracing::info!("Fetching all leads from '{}'", leads_index);
        let leads = self
            .store
            .fetch_all(leads_index, self.config.batch_size)
            .await
            .context("fetching leads")?;
        tracing::info!("Found {} leads to score", leads.len());

        let audit = AuditLogger::new(self.store, actions_index, new_session_id(Utc::now()));
        let mut report = BatchReport {
            session_id: audit.session_id().to_string(),
            total: leads.len(),
            ..BatchReport::default()
        };
        let mut updates: Vec<(String, Value)> = Vec::with_capacity(leads.len());

        for stored in &leads {
            let company = stored.lead.company_name_or_unknown();
            let result = score_lead(&stored.lead);
            report.record_tier(result.tier());

            tracing::info!(
                "{} -> {}/100 ({})",
                company,
                result.score(),
                result.tier()
            );

            updates.push((stored.id.clone(), result.update_fields(Utc::now())));

            if let Err(e) = audit.log_scored(&stored.id, company, &result).await {
                tracing::warn!("Failed to log audit entry for lead {}: {}", stored.id, e);
                report.audit_failures += 1;
            }
        }

        match self.store.bulk_update(leads_index, &updates).await {
            Ok(outcome) => {
                for (id, reason) in &outcome.failed {
                    tracing::warn!("Failed to write score for lead {}: {}", id, reason);
                }
                report.updated = outcome.succeeded;
                report.update_failures = outcome.failed.len();
            }
            Err(e) => {
                tracing::error!("Bulk score write-back failed: {}", e);
                report.update_failures = updates.len();
            }
        }

        for index in [leads_index, actions_index] {
            if let Err(e) = self.store.refresh(index).await {
                tracing::warn!("Failed to refresh '{}': {}", index, e);
            }
        }

        tracing::info!(
            "Batch {} complete: {} leads, {} hot, {} warm, {} cold, {} updated, {} update failures, {} audit failures",
            report.session_id,
            report.total,
            report.hot,
            report.warm,
            report.cold,
            report.updated,
            report.update_failures,
            report.audit_failures
        );

        Ok(report)
    }
}
