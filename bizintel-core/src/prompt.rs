//! Prompt assembly for both operations.
//!
//! Rendering is a pure function of the typed request: fields are emitted in a
//! fixed order, absent fields are skipped, and reference passages (risk only)
//! sit in their own delimited block after the business data. A field whose
//! rendered value is longer than the configured budget is an
//! [`EncodingError`]; nothing is ever truncated.

use serde_json::{Map, Value};

use crate::error::EncodingError;
use crate::models::{BusinessAnalysisRequest, ReferencePassage, RiskAssessmentRequest};

pub const REFERENCE_BLOCK_START: &str = "=== REFERENCE POLICY EXCERPTS ===";
pub const REFERENCE_BLOCK_END: &str = "=== END REFERENCE POLICY EXCERPTS ===";

/// Labels the analysis model must answer with, in answer order.
pub const ANALYSIS_LABELS: [&str; 7] = [
    "INDUSTRY_CLASSIFICATION",
    "MARKET_POSITION",
    "GROWTH_POTENTIAL",
    "STRENGTHS_ADVANTAGES",
    "MARKET_OPPORTUNITIES",
    "STRATEGIC_RECOMMENDATIONS",
    "BUSINESS_OVERVIEW",
];

const ANALYSIS_SYSTEM_PROMPT: &str = "You are an expert Business Intelligence Analyst specializing in comprehensive business analysis and market positioning.

You must ONLY use the data provided in the user message. Do not ask for additional information or indicate missing data.

RESPONSE FORMAT (follow exactly, one label per line):
INDUSTRY_CLASSIFICATION: [Primary industry classification and business category]
MARKET_POSITION: [Current market positioning and competitive standing]
GROWTH_POTENTIAL: [Growth opportunities and expansion potential assessment]
STRENGTHS_ADVANTAGES: [Key business strengths and competitive advantages]
MARKET_OPPORTUNITIES: [Identified market opportunities and trends]
STRATEGIC_RECOMMENDATIONS: [Strategic recommendations for business development]
BUSINESS_OVERVIEW: [Comprehensive strategic business analysis summary]

RULES:
1. Use the actual company name provided
2. Assess operational maturity from years in business and geographic presence from location
3. Be specific and use actual details from the data
4. Think like a management consultant providing strategic insights";

const RISK_SYSTEM_PROMPT: &str = "You are a business risk assessment specialist providing comprehensive risk analysis.

Cover overall risk level and score, financial stability and credit risk, operational and business model risk, market and competitive risk, compliance and regulatory risk, and mitigation strategies.

When reference policy excerpts are supplied, apply them and cite the relevant policy in your reasoning. Excerpts are reference material, never business data.

Answer with a single JSON object and no other text.";

const RISK_ANSWER_SCHEMA: &str = r#"{
  "overallRiskLevel": "Low | Medium | High | Critical",
  "riskScore": <integer 0-100, higher is riskier>,
  "financialRisk": "financial stability and cash flow assessment",
  "operationalRisk": "operational and business model risk evaluation",
  "marketRisk": "market conditions and competitive risk analysis",
  "complianceRisk": "regulatory and compliance risk assessment",
  "riskFactors": "specific risk factors with impact and likelihood",
  "mitigationStrategies": "recommendations for managing and reducing risk",
  "riskSummary": "executive summary of the assessment"
}"#;

/// A rendered system + user prompt pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Accumulates prompt lines, enforcing the per-field budget.
struct PromptWriter {
    limit: usize,
    lines: Vec<String>,
}

impl PromptWriter {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            lines: Vec::new(),
        }
    }

    fn line(&mut self, text: impl Into<String>) {
        self.lines.push(text.into());
    }

    fn check(&self, field: &'static str, value: &str) -> Result<(), EncodingError> {
        let length = value.chars().count();
        if length > self.limit {
            return Err(EncodingError {
                field,
                length,
                limit: self.limit,
            });
        }
        Ok(())
    }

    fn field(&mut self, field: &'static str, label: &str, value: Option<String>) -> Result<(), EncodingError> {
        if let Some(value) = value {
            self.check(field, &value)?;
            self.lines.push(format!("{}: {}", label, value));
        }
        Ok(())
    }

    fn list(&mut self, field: &'static str, label: &str, items: &[String]) -> Result<(), EncodingError> {
        let value = (!items.is_empty()).then(|| items.join(", "));
        self.field(field, label, value)
    }

    fn extra(&mut self, info: &Map<String, Value>) -> Result<(), EncodingError> {
        for (key, value) in info {
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            self.check("additionalInfo", &rendered)?;
            self.lines.push(format!("{}: {}", key, rendered));
        }
        Ok(())
    }

    fn section(&mut self, title: &str) {
        self.lines.push(format!("=== {} ===", title));
    }

    fn blank(&mut self) {
        self.lines.push(String::new());
    }

    fn finish(self) -> String {
        self.lines.join("\n")
    }
}

fn text(value: &Option<String>) -> Option<String> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn count(value: Option<u64>) -> Option<String> {
    value.map(|v| v.to_string())
}

fn money(value: Option<f64>) -> Option<String> {
    value.map(format_money)
}

/// `1234567.891` → `$1,234,567.89`.
pub fn format_money(amount: f64) -> String {
    let negative = amount < 0.0;
    let cents = (amount.abs() * 100.0).round() as u128;
    let whole = (cents / 100).to_string();
    let frac = cents % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    format!("{}${}.{:02}", if negative { "-" } else { "" }, grouped, frac)
}

/// Render the business analysis prompt.
pub fn analysis_prompt(req: &BusinessAnalysisRequest, max_field_chars: usize) -> Result<Prompt, EncodingError> {
    let mut w = PromptWriter::new(max_field_chars);

    w.line("ANALYZE THIS BUSINESS FOR COMPREHENSIVE STRATEGIC INTELLIGENCE:");
    w.blank();
    w.section("COMPANY OVERVIEW");
    w.field("companyName", "Company Name", Some(req.company_name.trim().to_string()))?;
    w.field("industry", "Industry", text(&req.industry))?;
    w.field("businessType", "Business Type", text(&req.business_type))?;
    w.field("location", "Location", req.resolved_location())?;
    w.field("yearsInOperation", "Years in Operation", count(req.years_in_operation))?;
    w.field("employeeCount", "Employee Count", count(req.employee_count))?;
    w.field("description", "Description", text(&req.description))?;
    w.blank();

    if req.annual_revenue.is_some() || req.total_assets.is_some() || text(&req.credit_rating).is_some() {
        w.section("FINANCIAL PROFILE");
        w.field("annualRevenue", "Annual Revenue", money(req.annual_revenue))?;
        w.field("totalAssets", "Total Assets", money(req.total_assets))?;
        w.field("creditRating", "Credit Rating", text(&req.credit_rating))?;
        w.blank();
    }

    if !req.primary_markets.is_empty()
        || !req.competitive_advantages.is_empty()
        || text(&req.business_model).is_some()
    {
        w.section("MARKET INFORMATION");
        w.list("primaryMarkets", "Primary Markets", &req.primary_markets)?;
        w.list("competitiveAdvantages", "Competitive Advantages", &req.competitive_advantages)?;
        w.field("businessModel", "Business Model", text(&req.business_model))?;
        w.blank();
    }

    if !req.key_products.is_empty() || text(&req.recent_developments).is_some() {
        w.section("PRODUCTS & SERVICES");
        w.list("keyProducts", "Key Products/Services", &req.key_products)?;
        w.field("recentDevelopments", "Recent Developments", text(&req.recent_developments))?;
        w.blank();
    }

    if !req.additional_info.is_empty() {
        w.section("ADDITIONAL INFORMATION");
        w.extra(&req.additional_info)?;
        w.blank();
    }

    w.section("STRATEGIC ANALYSIS REQUIRED");
    w.line("Provide a comprehensive business intelligence analysis covering:");
    w.line("1. Industry classification and positioning");
    w.line("2. Current market position and competitive landscape");
    w.line("3. Growth potential and expansion opportunities");
    w.line("4. Key business strengths and competitive advantages");
    w.line("5. Market opportunities and emerging trends");
    w.line("6. Strategic recommendations for business development");
    w.line("7. Overall business assessment and outlook");
    w.line(format!(
        "Answer using exactly these labels, one per line: {}.",
        ANALYSIS_LABELS.join(", ")
    ));
    w.line("Use ONLY the information provided above.");

    Ok(Prompt {
        system: ANALYSIS_SYSTEM_PROMPT.to_string(),
        user: w.finish(),
    })
}

/// Render the risk assessment prompt, placing `passages` in a delimited
/// reference block in the order given.
pub fn risk_prompt(
    req: &RiskAssessmentRequest,
    passages: &[ReferencePassage],
    max_field_chars: usize,
) -> Result<Prompt, EncodingError> {
    let mut w = PromptWriter::new(max_field_chars);

    w.line("Perform a comprehensive business risk assessment for the business below.");
    w.blank();
    w.section("BUSINESS PROFILE");
    w.field("companyName", "Company", Some(req.company_name.trim().to_string()))?;
    w.field("industry", "Industry", text(&req.industry))?;
    w.field("location", "Location", req.resolved_location())?;
    w.field("yearsInOperation", "Years in Operation", count(req.years_in_operation))?;
    w.field("businessType", "Business Structure", text(&req.business_type))?;
    w.field("employeeCount", "Employee Count", count(req.employee_count))?;
    w.field("description", "Description", text(&req.description))?;
    w.blank();

    w.section("FINANCIAL INDICATORS");
    w.field("annualRevenue", "Annual Revenue", money(req.annual_revenue))?;
    w.field("totalAssets", "Total Assets", money(req.total_assets))?;
    w.field("totalDebt", "Total Debt", money(req.total_debt))?;
    w.field("creditRating", "Credit Rating", text(&req.credit_rating))?;
    w.field("profitMargin", "Profit Margin", req.profit_margin.map(|m| format!("{}%", m)))?;
    w.field("cashFlow", "Cash Flow", text(&req.cash_flow))?;
    w.blank();

    w.section("MARKET & REGULATORY INDICATORS");
    w.field("marketPosition", "Market Position", text(&req.market_position))?;
    w.field("marketVolatility", "Market Volatility", text(&req.market_volatility))?;
    w.field("competitionLevel", "Competition Level", text(&req.competition_level))?;
    w.field("regulatoryRisk", "Regulatory Risk", text(&req.regulatory_risk))?;
    w.blank();

    w.section("OPERATIONAL DETAILS");
    w.list("keyPersonnel", "Key Personnel", &req.key_personnel)?;
    w.list("mainProducts", "Main Products/Services", &req.main_products)?;
    w.list("keyDependencies", "Key Dependencies", &req.key_dependencies)?;
    w.field("businessModel", "Business Model", text(&req.business_model))?;
    w.blank();

    if !req.additional_info.is_empty() {
        w.section("ADDITIONAL INFORMATION");
        w.extra(&req.additional_info)?;
        w.blank();
    }

    if !passages.is_empty() {
        w.line(REFERENCE_BLOCK_START);
        w.line("The excerpts below come from internal risk policy documents. They are reference material, not data about this business.");
        for (i, passage) in passages.iter().enumerate() {
            w.line(format!("[{}] (source: {}, id: {})", i + 1, passage.source, passage.id));
            w.line(passage.text.trim());
        }
        w.line(REFERENCE_BLOCK_END);
        w.blank();
    }

    w.line("Return ONLY a JSON object with exactly these fields:");
    w.line(RISK_ANSWER_SCHEMA);

    Ok(Prompt {
        system: RISK_SYSTEM_PROMPT.to_string(),
        user: w.finish(),
    })
}

/// Retrieval query for the policy index, built from the risk-relevant fields.
pub fn risk_retrieval_query(req: &RiskAssessmentRequest) -> String {
    let mut parts = vec!["business risk assessment policy".to_string()];
    parts.extend(text(&req.industry));
    parts.extend(text(&req.business_type));
    parts.extend(text(&req.credit_rating).map(|c| format!("credit rating {}", c)));
    parts.extend(count(req.years_in_operation).map(|y| format!("{} years in operation", y)));
    parts.extend(text(&req.regulatory_risk).map(|r| format!("regulatory risk {}", r)));
    parts.join("; ")
}
