/// Batch scoring workflow tests against the in-memory store
mod common;

use common::{create_test_config, lead, stored, FakeStore};
use salesforge_leads::audit::AuditLogger;
use salesforge_leads::batch::BatchScorer;
use salesforge_leads::errors::AppError;
use salesforge_leads::models::ActionLogEntry;
use salesforge_leads::scoring::{score_lead, ScoreTier};
use serde_json::json;

fn sample_leads() -> Vec<salesforge_leads::models::StoredLead> {
    vec![
        stored(
            "lead-1",
            lead(
                "Northwind",
                1500,
                "Public",
                "FinTech",
                "Enterprise payments platform with AI fraud analytics and compliance automation",
            ),
        ),
        stored(
            "lead-2",
            lead(
                "Bluefin Health",
                120,
                "Series A",
                "HealthTech",
                "Patient scheduling with data dashboards",
            ),
        ),
        stored("lead-3", lead("Tiny Bakery", 4, "Angel", "Bakery", "Bread")),
    ]
}

#[tokio::test]
async fn test_batch_scores_every_lead() {
    let store = FakeStore::with_leads(sample_leads());
    let config = create_test_config("http://unused".to_string());

    let report = BatchScorer::new(&store, &config).run().await.unwrap();

    assert_eq!(report.total, 3);
    assert_eq!(report.hot, 1);
    assert_eq!(report.warm, 1);
    assert_eq!(report.cold, 1);
    assert_eq!(report.updated, 3);
    assert!(!report.has_failures());
    assert!(report.session_id.starts_with("batch-"));

    let state = store.state();
    assert_eq!(state.updates.len(), 3);
    for (index, id, fields) in &state.updates {
        assert_eq!(index, "leads-raw");
        let original = sample_leads().into_iter().find(|s| &s.id == id).unwrap();
        let expected = score_lead(&original.lead);
        assert_eq!(fields["score"], json!(expected.score()));
        assert_eq!(fields["score_tier"], json!(expected.tier().as_str()));
        assert_eq!(fields["score_reasoning"], json!(expected.reasoning()));
    }
    assert_eq!(state.fetch_page_sizes, vec![config.batch_size]);
}

#[tokio::test]
async fn test_batch_appends_one_audit_entry_per_lead() {
    let store = FakeStore::with_leads(sample_leads());
    let config = create_test_config("http://unused".to_string());

    let report = BatchScorer::new(&store, &config).run().await.unwrap();

    let state = store.state();
    assert_eq!(state.appended.len(), 3);
    for (index, doc) in &state.appended {
        assert_eq!(index, "agent-actions-log");
        let entry: ActionLogEntry = serde_json::from_value(doc.clone()).unwrap();
        assert_eq!(entry.agent_session, report.session_id);
        assert_eq!(doc["action_type"], json!("scored"));

        let original = sample_leads()
            .into_iter()
            .find(|s| s.id == entry.lead_id)
            .unwrap();
        let expected = score_lead(&original.lead);
        assert_eq!(entry.action_details, expected.reasoning());
        assert_eq!(entry.score, Some(expected.score()));
        assert_eq!(entry.score_tier, Some(expected.tier()));
        assert_eq!(entry.company_name, original.lead.company_name_or_unknown());
    }
}

#[tokio::test]
async fn test_batch_creates_audit_index_once() {
    let store = FakeStore::with_leads(sample_leads());
    let config = create_test_config("http://unused".to_string());

    BatchScorer::new(&store, &config).run().await.unwrap();
    BatchScorer::new(&store, &config).run().await.unwrap();

    let state = store.state();
    assert_eq!(state.created_indices, vec!["agent-actions-log".to_string()]);
    // History from both runs is kept.
    assert_eq!(state.appended.len(), 6);
}

#[tokio::test]
async fn test_batch_refreshes_both_indices() {
    let store = FakeStore::with_leads(sample_leads());
    let config = create_test_config("http://unused".to_string());

    BatchScorer::new(&store, &config).run().await.unwrap();

    assert_eq!(
        store.state().refreshed,
        vec!["leads-raw".to_string(), "agent-actions-log".to_string()]
    );
}

#[tokio::test]
async fn test_refresh_failure_is_not_fatal() {
    let store = FakeStore::with_leads(sample_leads());
    store.state().fail_refresh = true;
    let config = create_test_config("http://unused".to_string());

    let report = BatchScorer::new(&store, &config).run().await.unwrap();
    assert_eq!(report.updated, 3);
}

#[tokio::test]
async fn test_audit_failures_do_not_abort_the_run() {
    let store = FakeStore::with_leads(sample_leads());
    store.state().fail_append = true;
    let config = create_test_config("http://unused".to_string());

    let report = BatchScorer::new(&store, &config).run().await.unwrap();

    assert_eq!(report.audit_failures, 3);
    assert_eq!(report.updated, 3);
    assert!(report.has_failures());
}

#[tokio::test]
async fn test_rejected_updates_are_counted() {
    let store = FakeStore::with_leads(sample_leads());
    store.state().rejected_ids.insert("lead-2".to_string());
    let config = create_test_config("http://unused".to_string());

    let report = BatchScorer::new(&store, &config).run().await.unwrap();

    assert_eq!(report.updated, 2);
    assert_eq!(report.update_failures, 1);
    // The audit entry is still written for the rejected lead.
    assert_eq!(store.state().appended.len(), 3);
}

#[tokio::test]
async fn test_failed_bulk_request_counts_every_lead() {
    let store = FakeStore::with_leads(sample_leads());
    store.state().fail_bulk = true;
    let config = create_test_config("http://unused".to_string());

    let report = BatchScorer::new(&store, &config).run().await.unwrap();

    assert_eq!(report.updated, 0);
    assert_eq!(report.update_failures, 3);
}

#[tokio::test]
async fn test_fetch_failure_aborts() {
    let store = FakeStore::with_leads(sample_leads());
    store.state().fail_fetch = true;
    let config = create_test_config("http://unused".to_string());

    let err = BatchScorer::new(&store, &config).run().await.unwrap_err();
    assert!(matches!(err.root(), AppError::StoreError(_)));
    assert!(store.state().appended.is_empty());
}

#[tokio::test]
async fn test_empty_index_produces_empty_report() {
    let store = FakeStore::default();
    let config = create_test_config("http://unused".to_string());

    let report = BatchScorer::new(&store, &config).run().await.unwrap();

    assert_eq!(report.total, 0);
    assert_eq!(report.percentage(ScoreTier::Hot), 0.0);
    assert!(store.state().updates.is_empty());
}

#[tokio::test]
async fn test_audit_logger_returns_entry_id() {
    let store = FakeStore::default();
    let logger = AuditLogger::new(&store, "agent-actions-log", "batch-test".to_string());
    let result = score_lead(&lead("Acme", 10, "Seed", "SaaS", "CRM"));

    let id = logger.log_scored("lead-9", "Acme", &result).await.unwrap();
    assert!(!id.is_empty());

    let state = store.state();
    assert_eq!(state.appended.len(), 1);
    assert_eq!(state.appended[0].1["agent_session"], json!("batch-test"));
    assert_eq!(state.appended[0].1["score_tier"], json!(result.tier().as_str()));
}

#[tokio::test]
async fn test_audit_recovers_after_transient_store_failures() {
    let leads = (0..8)
        .map(|i| {
            stored(
                &format!("lead-{}", i),
                lead(&format!("Company {}", i), 30 + i, "Seed", "SaaS", "CRM"),
            )
        })
        .collect();
    let store = FakeStore::with_leads(leads);
    store.state().failing_appends = 5;
    let config = create_test_config("http://unused".to_string());

    let report = BatchScorer::new(&store, &config).run().await.unwrap();

    assert_eq!(report.total, 8);
    assert_eq!(report.audit_failures, 5);
    assert_eq!(report.updated, 8);

    // Every lead gets its own attempt; the last three land once the store is back.
    let state = store.state();
    assert_eq!(state.append_attempts, 8);
    let logged: Vec<&str> = state
        .appended
        .iter()
        .map(|(_, doc)| doc["lead_id"].as_str().unwrap())
        .collect();
    assert_eq!(logged, vec!["lead-5", "lead-6", "lead-7"]);
}
