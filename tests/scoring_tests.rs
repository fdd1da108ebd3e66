/// Scoring rubric tests over realistic lead records
mod common;

use common::lead;
use salesforge_leads::models::Lead;
use salesforge_leads::scoring::{
    score_description_quality, score_funding_stage, score_industry_fit, score_lead, ScoreTier,
};
use serde_json::json;

#[test]
fn test_enterprise_saas_lead_is_hot() {
    let mut lead = lead(
        "Northwind Analytics",
        1200,
        "Series C",
        "SaaS",
        "Enterprise AI platform delivering machine learning analytics and data automation for Fortune 500 companies",
    );
    lead.keywords = Some("B2B, compliance".to_string());

    let result = score_lead(&lead);
    let breakdown = result.breakdown();

    assert_eq!(breakdown.employee.score, 25);
    assert_eq!(breakdown.funding.score, 25);
    assert_eq!(breakdown.industry.score, 25);
    // 8 (length) + 10 (tech) + 7 (enterprise)
    assert_eq!(breakdown.description.score, 25);
    assert_eq!(result.score(), 100);
    assert_eq!(result.tier(), ScoreTier::Hot);
}

#[test]
fn test_small_unknown_lead_is_cold() {
    let lead = lead("Tiny Bakery", 4, "Angel", "Bakery", "Bread");
    let result = score_lead(&lead);

    // 3 + 5 + 8 + (2 + 2 + 2)
    assert_eq!(result.score(), 22);
    assert_eq!(result.tier(), ScoreTier::Cold);
    assert_eq!(result.breakdown().funding.reason, "Angel — unknown funding stage");
    assert_eq!(
        result.breakdown().industry.reason,
        "Bakery — unknown industry alignment"
    );
}

#[test]
fn test_mid_market_lead_is_warm() {
    let lead = lead(
        "Bluefin Health",
        120,
        "Series A",
        "HealthTech",
        "Patient scheduling with data dashboards",
    );
    let result = score_lead(&lead);

    // 18 + 15 + 18 + (2 + 6 + 2)
    assert_eq!(result.score(), 61);
    assert_eq!(result.tier(), ScoreTier::Warm);
}

#[test]
fn test_empty_lead_scores_defaults() {
    let result = score_lead(&Lead::default());
    let breakdown = result.breakdown();

    assert_eq!(breakdown.employee.score, 3);
    assert_eq!(breakdown.employee.reason, "Micro (0 employees) — very early stage");
    assert_eq!(breakdown.funding.score, 5);
    assert_eq!(breakdown.funding.reason, "Unknown — unknown funding stage");
    assert_eq!(breakdown.industry.score, 8);
    assert_eq!(breakdown.description.score, 6);
    assert_eq!(result.score(), 22);
    assert_eq!(result.tier(), ScoreTier::Cold);
}

#[test]
fn test_industry_lookup_is_case_sensitive() {
    assert_eq!(score_industry_fit("SaaS").0, 25);
    assert_eq!(score_industry_fit("saas").0, 8);
    assert_eq!(score_funding_stage("Series B").0, 20);
    assert_eq!(score_funding_stage("series b").0, 5);
}

#[test]
fn test_industry_tiers() {
    let cases = [
        ("SaaS", 25),
        ("FinTech", 25),
        ("Cybersecurity", 23),
        ("MarTech", 22),
        ("HealthTech", 18),
        ("EdTech", 17),
        ("E-Commerce", 17),
        ("HRTech", 16),
        ("InsurTech", 16),
        ("PropTech", 12),
        ("LegalTech", 12),
        ("LogTech", 11),
        ("FoodTech", 10),
        ("AgriTech", 8),
        ("CleanTech", 8),
    ];
    for (industry, expected) in cases {
        assert_eq!(score_industry_fit(industry).0, expected, "industry {}", industry);
    }
    assert!(score_industry_fit("MarTech").1.contains("high alignment"));
    assert!(score_industry_fit("EdTech").1.contains("moderate alignment"));
    assert!(score_industry_fit("FoodTech").1.contains("niche fit"));
}

#[test]
fn test_keywords_field_contributes_signals() {
    let (without, _) = score_description_quality("Short text", "");
    let (with, reason) = score_description_quality("Short text", "automation, enterprise");

    assert_eq!(without, 6);
    assert_eq!(with, 2 + 6 + 7);
    assert!(reason.contains("some tech signals (automation)"));
    assert!(reason.contains("enterprise signals (enterprise)"));
}

#[test]
fn test_reasoning_layout() {
    let lead = lead("Acme", 60, "Seed", "FinTech", "Payments");
    let result = score_lead(&lead);
    let lines: Vec<&str> = result.reasoning().lines().collect();

    assert_eq!(lines.len(), 5);
    assert_eq!(
        lines[0],
        format!("Score: {}/100 → {}", result.score(), result.tier())
    );
    assert!(lines[1].starts_with("  Employee (14/25): "));
    assert!(lines[2].starts_with("  Funding (10/25): "));
    assert!(lines[3].starts_with("  Industry (25/25): "));
    assert!(lines[4].starts_with("  Description ("));
}

#[test]
fn test_update_fields_shape() {
    let lead = lead("Acme", 300, "Growth", "MarTech", "Campaign analytics platform");
    let result = score_lead(&lead);
    let fields = result.update_fields(chrono::Utc::now());

    assert_eq!(fields["score"], json!(result.score()));
    assert_eq!(fields["score_tier"], json!(result.tier().as_str()));
    assert_eq!(fields["score_reasoning"], json!(result.reasoning()));
    assert_eq!(fields["score_breakdown"]["employee"]["max"], json!(25));
    assert!(fields["updated_at"].is_string());
}

#[test]
fn test_scoring_ignores_previous_scores() {
    let mut lead = lead("Acme", 300, "Growth", "MarTech", "Campaign analytics platform");
    let first = score_lead(&lead);

    lead.score = Some(1);
    lead.score_tier = Some("Cold".to_string());
    assert_eq!(score_lead(&lead), first);
}

#[test]
fn test_lead_from_index_document() {
    let lead: Lead = serde_json::from_value(json!({
        "company_name": "Acme",
        "employee_count": "75",
        "funding_stage": "Bootstrapped",
        "industry": "LegalTech",
        "company_description": "Contract review",
        "location": "Porto"
    }))
    .unwrap();

    let result = score_lead(&lead);
    assert_eq!(result.breakdown().employee.score, 14);
    assert_eq!(result.breakdown().funding.score, 8);
    assert_eq!(result.breakdown().industry.score, 12);
}
