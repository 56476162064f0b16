use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::validate::{parse_request, FieldKind, FieldSpec, RequestSchema};

use super::{id_token, resolve_location};

/// Longest analysis id before the company token is shortened.
const MAX_ANALYSIS_ID_LEN: usize = 60;
const SHORT_COMPANY_TOKEN_LEN: usize = 30;

/// Inbound payload for `POST /business-analysis`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessAnalysisRequest {
    pub company_name: String,
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
    pub credit_rating: Option<String>,
    #[serde(default)]
    pub primary_markets: Vec<String>,
    #[serde(default)]
    pub competitive_advantages: Vec<String>,
    pub business_model: Option<String>,
    #[serde(default)]
    pub key_products: Vec<String>,
    pub recent_developments: Option<String>,
    #[serde(default)]
    pub additional_info: Map<String, Value>,
}

impl RequestSchema for BusinessAnalysisRequest {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required(
            "companyName",
            &["company", "businessName", "business_name"],
            FieldKind::Text,
        ),
        FieldSpec::optional("industry", &[], FieldKind::Text),
        FieldSpec::optional("businessType", &["businessStructure"], FieldKind::Text),
        FieldSpec::optional("location", &[], FieldKind::Text),
        FieldSpec::optional("businessCity", &[], FieldKind::Text),
        FieldSpec::optional("businessState", &[], FieldKind::Text),
        FieldSpec::optional("description", &[], FieldKind::Text),
        FieldSpec::optional("yearsInOperation", &["yearsInBusiness"], FieldKind::Count),
        FieldSpec::optional("employeeCount", &[], FieldKind::Count),
        FieldSpec::optional("annualRevenue", &[], FieldKind::Amount),
        FieldSpec::optional("totalAssets", &["totalEquipmentCost"], FieldKind::Amount),
        FieldSpec::optional("creditRating", &[], FieldKind::Text),
        FieldSpec::optional("primaryMarkets", &[], FieldKind::TextList),
        FieldSpec::optional("competitiveAdvantages", &[], FieldKind::TextList),
        FieldSpec::optional("businessModel", &[], FieldKind::Text),
        FieldSpec::optional("keyProducts", &["leadEquipments"], FieldKind::ItemList),
        FieldSpec::optional("recentDevelopments", &[], FieldKind::Text),
        FieldSpec::optional("additionalInfo", &[], FieldKind::Object),
    ];
}

impl BusinessAnalysisRequest {
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

    /// `<COMPANY>_BA_<unix-seconds>`, shortening the company token when the
    /// whole id would run past 60 characters.
    pub fn analysis_id(&self, unix_seconds: i64) -> String {
        let company = id_token(&self.company_name);
        let id = format!("{}_BA_{}", company, unix_seconds);
        if id.chars().count() <= MAX_ANALYSIS_ID_LEN {
            return id;
        }
        let short: String = company.chars().take(SHORT_COMPANY_TOKEN_LEN).collect();
        format!("{}_BA_{}", short, unix_seconds)
    }
}

/// Published result of a business analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessAnalysisResponse {
    pub analysis_id: String,
    pub industry_classification: String,
    pub market_position: String,
    pub growth_potential: String,
    pub strengths_and_advantages: String,
    pub market_opportunities: String,
    pub strategic_recommendations: String,
    pub business_overview: String,
}
