//! Model answer validation.
//!
//! Turns raw completion text into the published response records. A missing
//! or mistyped field is a [`SchemaMismatch`] listing every problem; there is
//! no repair and no partially filled response.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::{FieldIssue, SchemaMismatch};
use crate::models::{BusinessAnalysisResponse, RiskAssessmentResponse, RiskLevel};
use crate::prompt::ANALYSIS_LABELS;

/// `LABEL: value`, tolerating list bullets, headings and bold markers.
static LABEL_LINE: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"^[\s>#*\-•]*\**\s*([A-Z][A-Z_ ]*[A-Z])\s*\**\s*:\s*\**\s*(.*?)\s*\**\s*$"));

/// Body of a fenced code block, optionally tagged `json`.
static FENCED_BLOCK: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"(?s)^\s*```[a-zA-Z]*\s*\n?(.*?)\n?\s*```\s*$"));

const RISK_TEXT_FIELDS: [&str; 7] = [
    "financialRisk",
    "operationalRisk",
    "marketRisk",
    "complianceRisk",
    "riskFactors",
    "mitigationStrategies",
    "riskSummary",
];

fn mismatch(field: &str, expected: impl Into<String>) -> SchemaMismatch {
    SchemaMismatch {
        issues: vec![FieldIssue::new(field, expected)],
    }
}

/// Compiled once per process; later calls share the cached automaton.
fn compiled(re: &'static Lazy<Result<Regex, regex::Error>>) -> Result<&'static Regex, SchemaMismatch> {
    Lazy::force(re)
        .as_ref()
        .map_err(|e| mismatch("$", format!("answer pattern failed to compile: {}", e)))
}

/// Parse a labelled-line analysis answer. Unlabelled lines continue the
/// previous label's value.
pub fn parse_analysis_answer(raw: &str, analysis_id: String) -> Result<BusinessAnalysisResponse, SchemaMismatch> {
    let re = compiled(&LABEL_LINE)?;
    let mut values: [String; ANALYSIS_LABELS.len()] = Default::default();
    let mut current: Option<usize> = None;

    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let labelled = re.captures(trimmed).and_then(|caps| {
            let label = caps[1].trim().replace(' ', "_");
            ANALYSIS_LABELS
                .iter()
                .position(|l| *l == label)
                .map(|slot| (slot, caps[2].to_string()))
        });

        match (labelled, current) {
            (Some((slot, value)), _) => {
                values[slot] = value;
                current = Some(slot);
            }
            (None, Some(slot)) => {
                if !values[slot].is_empty() {
                    values[slot].push(' ');
                }
                values[slot].push_str(trimmed);
            }
            (None, None) => {}
        }
    }

    let issues: Vec<FieldIssue> = ANALYSIS_LABELS
        .iter()
        .zip(values.iter())
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(label, _)| FieldIssue::new(*label, "non-empty labelled line"))
        .collect();
    if !issues.is_empty() {
        return Err(SchemaMismatch { issues });
    }

    let [industry_classification, market_position, growth_potential, strengths_and_advantages, market_opportunities, strategic_recommendations, business_overview] =
        values.map(|v| v.trim().to_string());

    Ok(BusinessAnalysisResponse {
        analysis_id,
        industry_classification,
        market_position,
        growth_potential,
        strengths_and_advantages,
        market_opportunities,
        strategic_recommendations,
        business_overview,
    })
}

/// Strip a surrounding markdown code fence, if any.
pub fn strip_code_fence(raw: &str) -> Result<&str, SchemaMismatch> {
    let re = compiled(&FENCED_BLOCK)?;
    Ok(match re.captures(raw).and_then(|caps| caps.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => raw.trim(),
    })
}

/// Parse a JSON risk answer.
pub fn parse_risk_answer(
    raw: &str,
    assessment_id: String,
    policy_references: Vec<String>,
) -> Result<RiskAssessmentResponse, SchemaMismatch> {
    let body = strip_code_fence(raw)?;
    let value: Value =
        serde_json::from_str(body).map_err(|e| mismatch("$", format!("JSON object ({})", e)))?;
    let object = value
        .as_object()
        .ok_or_else(|| mismatch("$", "JSON object"))?;

    let mut issues = Vec::new();

    let level = match object.get("overallRiskLevel").and_then(Value::as_str) {
        Some(s) => s.parse::<RiskLevel>().ok(),
        None => None,
    };
    if level.is_none() {
        issues.push(FieldIssue::new("overallRiskLevel", "one of Low, Medium, High, Critical"));
    }

    let score = object
        .get("riskScore")
        .and_then(Value::as_u64)
        .filter(|s| *s <= 100)
        .map(|s| s as u8);
    if score.is_none() {
        issues.push(FieldIssue::new("riskScore", "integer 0-100"));
    }

    let mut texts = Vec::with_capacity(RISK_TEXT_FIELDS.len());
    for field in RISK_TEXT_FIELDS {
        match object
            .get(field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            Some(s) => texts.push(s.to_string()),
            None => issues.push(FieldIssue::new(field, "non-empty string")),
        }
    }

    let (Some(overall_risk_level), Some(risk_score), true) = (level, score, issues.is_empty()) else {
        return Err(SchemaMismatch { issues });
    };

    let mut texts = texts.into_iter();
    let mut next = || texts.next().unwrap_or_default();

    Ok(RiskAssessmentResponse {
        assessment_id,
        overall_risk_level,
        risk_score,
        financial_risk: next(),
        operational_risk: next(),
        market_risk: next(),
        compliance_risk: next(),
        risk_factors: next(),
        mitigation_strategies: next(),
        risk_summary: next(),
        policy_references,
    })
}
