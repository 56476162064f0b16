use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::validate::{parse_request, FieldKind, FieldSpec, RequestSchema};

use super::{id_token, resolve_location};

/// Inbound payload for `POST /risk-assessment`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessmentRequest {
    pub company_name: String,
    pub business_id: Option<String>,
    pub industry: Option<String>,
    pub business_type: Option<String>,
    pub location: Option<String>,
    pub business_city: Option<String>,
    pub business_state: Option<String>,
    pub description: Option<String>,
    pub years_in_operation: Option<u64>,
    pub employee_count: Option<u64>,
    pub annual_revenue: Option<f64>,
    pub total_assets: Option<f64>,
    pub total_debt: Option<f64>,
    pub credit_rating: Option<String>,
    pub profit_margin: Option<f64>,
    pub cash_flow: Option<String>,
    pub market_volatility: Option<String>,
    pub competition_level: Option<String>,
    pub regulatory_risk: Option<String>,
    pub market_position: Option<String>,
    #[serde(default)]
    pub key_personnel: Vec<String>,
    #[serde(default)]
    pub main_products: Vec<String>,
    #[serde(default)]
    pub key_dependencies: Vec<String>,
    pub business_model: Option<String>,
    #[serde(default)]
    pub additional_info: Map<String, Value>,
}

impl RequestSchema for RiskAssessmentRequest {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required(
            "companyName",
            &["company", "businessName", "business_name"],
            FieldKind::Text,
        ),
        FieldSpec::optional("businessId", &[], FieldKind::Text),
        FieldSpec::optional("industry", &[], FieldKind::Text),
        FieldSpec::optional("businessType", &["businessStructure"], FieldKind::Text),
        FieldSpec::optional("location", &[], FieldKind::Text),
        FieldSpec::optional("businessCity", &[], FieldKind::Text),
        FieldSpec::optional("businessState", &[], FieldKind::Text),
        FieldSpec::optional("description", &[], FieldKind::Text),
        FieldSpec::optional("yearsInOperation", &["yearsInBusiness"], FieldKind::Count),
        FieldSpec::optional("employeeCount", &[], FieldKind::Count),
        FieldSpec::optional("annualRevenue", &["totalEquipmentCost"], FieldKind::Amount),
        FieldSpec::optional("totalAssets", &[], FieldKind::Amount),
        FieldSpec::optional("totalDebt", &[], FieldKind::Amount),
        FieldSpec::optional("creditRating", &[], FieldKind::Text),
        FieldSpec::optional("profitMargin", &[], FieldKind::Number),
        FieldSpec::optional("cashFlow", &[], FieldKind::Text),
        FieldSpec::optional("marketVolatility", &[], FieldKind::Text),
        FieldSpec::optional("competitionLevel", &[], FieldKind::Text),
        FieldSpec::optional("regulatoryRisk", &[], FieldKind::Text),
        FieldSpec::optional("marketPosition", &[], FieldKind::Text),
        FieldSpec::optional("keyPersonnel", &[], FieldKind::TextList),
        FieldSpec::optional("mainProducts", &["leadEquipments"], FieldKind::ItemList),
        FieldSpec::optional("keyDependencies", &[], FieldKind::TextList),
        FieldSpec::optional("businessModel", &[], FieldKind::Text),
        FieldSpec::optional("additionalInfo", &[], FieldKind::Object),
    ];
}

impl RiskAssessmentRequest {
    pub fn from_json(body: &Value, reject_unknown: bool) -> Result<Self, ValidationError> {
        parse_request(body, reject_unknown)
    }

    pub fn resolved_location(&self) -> Option<String> {
        resolve_location(
            self.location.as_deref(),
            self.business_city.as_deref(),
            self.business_state.as_deref(),
        )
    }

    /// `RA_<COMPANY>_<businessId>`, or the timestamp when no business id was sent.
    pub fn assessment_id(&self, unix_seconds: i64) -> String {
        let suffix = self
            .business_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(id_token)
            .unwrap_or_else(|| unix_seconds.to_string());
        format!("RA_{}_{}", id_token(&self.company_name), suffix)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 4] = [
        RiskLevel::Low,
        RiskLevel::Medium,
        RiskLevel::High,
        RiskLevel::Critical,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
            RiskLevel::Critical => "Critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(s))
            .ok_or(())
    }
}

/// Published result of a risk assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessmentResponse {
    pub assessment_id: String,
    pub overall_risk_level: RiskLevel,
    /// 0 (no risk) to 100 (certain loss).
    pub risk_score: u8,
    pub financial_risk: String,
    pub operational_risk: String,
    pub market_risk: String,
    pub compliance_risk: String,
    pub risk_factors: String,
    pub mitigation_strategies: String,
    pub risk_summary: String,
    /// Ids of the reference passages injected into the prompt.
    pub policy_references: Vec<String>,
}
