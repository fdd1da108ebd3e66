//! Deterministic lead scoring rubric.
//!
//! Four independent dimensions, each worth at most 25 points:
//!
//! - Employee count: scale as a proxy for deal size.
//! - Funding stage: budget availability.
//! - Industry fit: alignment with AI/automation services.
//! - Description quality: positioning detail plus tech and enterprise signals.
//!
//! The total (0-100) maps to a tier: Hot (75+), Warm (45-74), Cold (0-44).
//! Every function here is pure; scoring the same lead twice yields identical
//! output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

use crate::models::Lead;

/// Upper bound of every scoring dimension.
pub const MAX_DIMENSION_SCORE: u32 = 25;
pub const HOT_THRESHOLD: u32 = 75;
pub const WARM_THRESHOLD: u32 = 45;

pub const UNKNOWN_FUNDING_POINTS: u32 = 5;
pub const UNKNOWN_INDUSTRY_POINTS: u32 = 8;

/// Technology terms that signal automation readiness. Matching is a
/// case-insensitive substring test; citation order follows this list.
pub const TECH_KEYWORDS: [&str; 6] = [
    "AI",
    "automation",
    "machine learning",
    "analytics",
    "data",
    "platform",
];

/// Terms that signal an enterprise/B2B buyer.
pub const ENTERPRISE_SIGNALS: [&str; 5] = ["enterprise", "B2B", "scale", "compliance", "security"];

// (minimum headcount, points, label, outlook), checked top to bottom.
const EMPLOYEE_BANDS: [(i64, u32, &str, &str); 6] = [
    (1000, 25, "Enterprise", "large deal potential"),
    (250, 22, "Mid-market", "strong deal potential"),
    (100, 18, "Growth-stage", "good opportunity"),
    (50, 14, "Small-mid", "moderate opportunity"),
    (25, 10, "Small business", "standard opportunity"),
    (10, 6, "Startup", "early stage"),
];

/// Score employee count. Anything under 10 (including zero, missing and
/// negative values) lands in the lowest band.
pub fn score_employee_count(count: i64) -> (u32, String) {
    let (points, label, outlook) = EMPLOYEE_BANDS
        .iter()
        .find(|(min, ..)| count >= *min)
        .map(|(_, points, label, outlook)| (*points, *label, *outlook))
        .unwrap_or((3, "Micro", "very early stage"));

    (
        points,
        format!("{} ({} employees) — {}", label, count, outlook),
    )
}

// ============ Funding ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FundingStage {
    PreSeed,
    Seed,
    SeriesA,
    SeriesB,
    SeriesC,
    Growth,
    Public,
    Bootstrapped,
}

impl FundingStage {
    pub const ALL: [FundingStage; 8] = [
        FundingStage::PreSeed,
        FundingStage::Seed,
        FundingStage::SeriesA,
        FundingStage::SeriesB,
        FundingStage::SeriesC,
        FundingStage::Growth,
        FundingStage::Public,
        FundingStage::Bootstrapped,
    ];

    /// Exact, case-sensitive match against the stage labels used in the index.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|stage| stage.label() == label)
    }

    pub fn label(self) -> &'static str {
        match self {
            FundingStage::PreSeed => "Pre-Seed",
            FundingStage::Seed => "Seed",
            FundingStage::SeriesA => "Series A",
            FundingStage::SeriesB => "Series B",
            FundingStage::SeriesC => "Series C",
            FundingStage::Growth => "Growth",
            FundingStage::Public => "Public",
            FundingStage::Bootstrapped => "Bootstrapped",
        }
    }

    pub fn points(self) -> u32 {
        match self {
            FundingStage::SeriesC | FundingStage::Public => 25,
            FundingStage::Growth => 22,
            FundingStage::SeriesB => 20,
            FundingStage::SeriesA => 15,
            FundingStage::Seed => 10,
            FundingStage::Bootstrapped => 8,
            FundingStage::PreSeed => 5,
        }
    }

    fn justification(self) -> &'static str {
        match self {
            FundingStage::SeriesC => "Series C — significant budget, actively scaling",
            FundingStage::Public => "Public company — enterprise budgets available",
            FundingStage::Growth => "Growth stage — investing in tools and automation",
            FundingStage::SeriesB => "Series B — funded, building go-to-market",
            FundingStage::SeriesA => "Series A — funded but selective spending",
            FundingStage::Seed => "Seed — limited budget, early decisions",
            FundingStage::PreSeed => "Pre-Seed — minimal budget, founder-led",
            FundingStage::Bootstrapped => "Bootstrapped — profitable but cost-conscious",
        }
    }
}

/// Score funding stage. Unrecognized stages get a fixed default and are named
/// verbatim in the justification.
pub fn score_funding_stage(stage: &str) -> (u32, String) {
    match FundingStage::from_label(stage) {
        Some(known) => (known.points(), known.justification().to_string()),
        None => (
            UNKNOWN_FUNDING_POINTS,
            format!("{} — unknown funding stage", stage),
        ),
    }
}

// ============ Industry ============

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndustryFit {
    High,
    Medium,
    Lower,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Industry {
    SaaS,
    FinTech,
    Cybersecurity,
    MarTech,
    HealthTech,
    EdTech,
    ECommerce,
    HRTech,
    InsurTech,
    PropTech,
    LegalTech,
    LogTech,
    FoodTech,
    AgriTech,
    CleanTech,
}

impl Industry {
    pub const ALL: [Industry; 15] = [
        Industry::SaaS,
        Industry::FinTech,
        Industry::Cybersecurity,
        Industry::MarTech,
        Industry::HealthTech,
        Industry::EdTech,
        Industry::ECommerce,
        Industry::HRTech,
        Industry::InsurTech,
        Industry::PropTech,
        Industry::LegalTech,
        Industry::LogTech,
        Industry::FoodTech,
        Industry::AgriTech,
        Industry::CleanTech,
    ];

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|industry| industry.label() == label)
    }

    pub fn label(self) -> &'static str {
        match self {
            Industry::SaaS => "SaaS",
            Industry::FinTech => "FinTech",
            Industry::Cybersecurity => "Cybersecurity",
            Industry::MarTech => "MarTech",
            Industry::HealthTech => "HealthTech",
            Industry::EdTech => "EdTech",
            Industry::ECommerce => "E-Commerce",
            Industry::HRTech => "HRTech",
            Industry::InsurTech => "InsurTech",
            Industry::PropTech => "PropTech",
            Industry::LegalTech => "LegalTech",
            Industry::LogTech => "LogTech",
            Industry::FoodTech => "FoodTech",
            Industry::AgriTech => "AgriTech",
            Industry::CleanTech => "CleanTech",
        }
    }

    pub fn fit(self) -> IndustryFit {
        match self {
            Industry::SaaS | Industry::FinTech | Industry::Cybersecurity | Industry::MarTech => {
                IndustryFit::High
            }
            Industry::HealthTech
            | Industry::EdTech
            | Industry::ECommerce
            | Industry::HRTech
            | Industry::InsurTech => IndustryFit::Medium,
            _ => IndustryFit::Lower,
        }
    }

    pub fn points(self) -> u32 {
        match self {
            Industry::SaaS | Industry::FinTech => 25,
            Industry::Cybersecurity => 23,
            Industry::MarTech => 22,
            Industry::HealthTech => 18,
            Industry::EdTech | Industry::ECommerce => 17,
            Industry::HRTech | Industry::InsurTech => 16,
            Industry::PropTech | Industry::LegalTech => 12,
            Industry::LogTech => 11,
            Industry::FoodTech => 10,
            Industry::AgriTech | Industry::CleanTech => 8,
        }
    }
}

/// Score industry alignment. Unknown industries get a fixed default.
pub fn score_industry_fit(industry: &str) -> (u32, String) {
    match Industry::from_label(industry) {
        Some(known) => {
            let outlook = match known.fit() {
                IndustryFit::High => "high alignment with AI/automation services",
                IndustryFit::Medium => "moderate alignment, automation opportunities exist",
                IndustryFit::Lower => "niche fit, specific use cases only",
            };
            (known.points(), format!("{} — {}", known.label(), outlook))
        }
        None => (
            UNKNOWN_INDUSTRY_POINTS,
            format!("{} — unknown industry alignment", industry),
        ),
    }
}

// ============ Description ============

/// Score description sophistication from three additive signals, capped at 25.
pub fn score_description_quality(description: &str, keywords: &str) -> (u32, String) {
    let mut score = 0;
    let mut reasons = Vec::with_capacity(3);

    let length = description.chars().count();
    if length > 80 {
        score += 8;
        reasons.push("detailed positioning".to_string());
    } else if length > 40 {
        score += 5;
        reasons.push("adequate positioning".to_string());
    } else {
        score += 2;
        reasons.push("minimal positioning".to_string());
    }

    let haystack = format!("{} {}", description, keywords).to_lowercase();

    let tech_matches = matching_terms(&haystack, &TECH_KEYWORDS);
    if tech_matches.len() >= 3 {
        score += 10;
        reasons.push(format!(
            "strong tech signals ({})",
            tech_matches[..3].join(", ")
        ));
    } else if !tech_matches.is_empty() {
        score += 6;
        reasons.push(format!("some tech signals ({})", tech_matches.join(", ")));
    } else {
        score += 2;
        reasons.push("no tech signals".to_string());
    }

    let enterprise_matches = matching_terms(&haystack, &ENTERPRISE_SIGNALS);
    if !enterprise_matches.is_empty() {
        score += 7;
        let cited = &enterprise_matches[..enterprise_matches.len().min(2)];
        reasons.push(format!("enterprise signals ({})", cited.join(", ")));
    } else {
        score += 2;
        reasons.push("no enterprise signals".to_string());
    }

    (score.min(MAX_DIMENSION_SCORE), reasons.join("; "))
}

/// `haystack` must already be lowercased.
fn matching_terms<'a>(haystack: &str, terms: &[&'a str]) -> Vec<&'a str> {
    terms
        .iter()
        .copied()
        .filter(|term| haystack.contains(&term.to_lowercase()))
        .collect()
}

// ============ Aggregation ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScoreTier {
    Hot,
    Warm,
    Cold,
}

impl ScoreTier {
    /// Inclusive lower bounds: 75 is Hot, 45 is Warm.
    pub fn from_score(total: u32) -> Self {
        if total >= HOT_THRESHOLD {
            ScoreTier::Hot
        } else if total >= WARM_THRESHOLD {
            ScoreTier::Warm
        } else {
            ScoreTier::Cold
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScoreTier::Hot => "Hot",
            ScoreTier::Warm => "Warm",
            ScoreTier::Cold => "Cold",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "hot" => Some(ScoreTier::Hot),
            "warm" => Some(ScoreTier::Warm),
            "cold" => Some(ScoreTier::Cold),
            _ => None,
        }
    }
}

impl fmt::Display for ScoreTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One scoring dimension: points earned, points possible, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionScore {
    pub score: u32,
    pub max: u32,
    pub reason: String,
}

impl DimensionScore {
    fn new((score, reason): (u32, String)) -> Self {
        Self {
            score,
            max: MAX_DIMENSION_SCORE,
            reason,
        }
    }
}

/// Per-dimension breakdown. The shape is fixed: exactly these four dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub employee: DimensionScore,
    pub funding: DimensionScore,
    pub industry: DimensionScore,
    pub description: DimensionScore,
}

impl ScoreBreakdown {
    pub fn total(&self) -> u32 {
        self.employee.score + self.funding.score + self.industry.score + self.description.score
    }
}

/// Result of one scoring pass. Built only by [`score_lead`], so `score`
/// always equals the breakdown total and `tier` always matches `score`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreResult {
    score: u32,
    tier: ScoreTier,
    reasoning: String,
    breakdown: ScoreBreakdown,
}

impl ScoreResult {
    fn from_breakdown(breakdown: ScoreBreakdown) -> Self {
        let score = breakdown.total();
        let tier = ScoreTier::from_score(score);
        let reasoning = format!(
            "Score: {}/100 → {}\n  Employee ({}/25): {}\n  Funding ({}/25): {}\n  Industry ({}/25): {}\n  Description ({}/25): {}",
            score,
            tier,
            breakdown.employee.score,
            breakdown.employee.reason,
            breakdown.funding.score,
            breakdown.funding.reason,
            breakdown.industry.score,
            breakdown.industry.reason,
            breakdown.description.score,
            breakdown.description.reason,
        );

        Self {
            score,
            tier,
            reasoning,
            breakdown,
        }
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn tier(&self) -> ScoreTier {
        self.tier
    }

    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    pub fn breakdown(&self) -> &ScoreBreakdown {
        &self.breakdown
    }

    /// Partial document written back onto the lead.
    pub fn update_fields(&self, updated_at: DateTime<Utc>) -> Value {
        json!({
            "score": self.score,
            "score_tier": self.tier.as_str(),
            "score_reasoning": self.reasoning,
            "score_breakdown": self.breakdown,
            "updated_at": updated_at.to_rfc3339(),
        })
    }
}

/// Apply the full rubric to a lead. Never fails: missing fields fall back to
/// zero/empty and unknown categories to their default branch.
pub fn score_lead(lead: &Lead) -> ScoreResult {
    let breakdown = ScoreBreakdown {
        employee: DimensionScore::new(score_employee_count(lead.employee_count_or_zero())),
        funding: DimensionScore::new(score_funding_stage(lead.funding_stage_or_unknown())),
        industry: DimensionScore::new(score_industry_fit(lead.industry_or_empty())),
        description: DimensionScore::new(score_description_quality(
            lead.description(),
            lead.keywords(),
        )),
    };

    ScoreResult::from_breakdown(breakdown)
}
