pub mod analysis;
pub mod passage;
pub mod risk;

pub use analysis::{BusinessAnalysisRequest, BusinessAnalysisResponse};
pub use passage::ReferencePassage;
pub use risk::{RiskAssessmentRequest, RiskAssessmentResponse, RiskLevel};

/// Resolve a display location from an explicit `location` or the legacy
/// city/state pair.
pub(crate) fn resolve_location(
    location: Option<&str>,
    city: Option<&str>,
    state: Option<&str>,
) -> Option<String> {
    fn non_blank(s: Option<&str>) -> Option<&str> {
        s.map(str::trim).filter(|s| !s.is_empty())
    }

    if let Some(loc) = non_blank(location) {
        return Some(loc.to_string());
    }
    match (non_blank(city), non_blank(state)) {
        (Some(c), Some(s)) => Some(format!("{}, {}", c, s)),
        (Some(c), None) => Some(c.to_string()),
        _ => None,
    }
}

/// Uppercase a company name into an id-safe token: alphanumerics kept,
/// spaces become underscores, everything else dropped.
pub fn id_token(company: &str) -> String {
    company
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect::<String>()
        .replace(' ', "_")
        .to_uppercase()
}
