//! Operation dispatch shared by the HTTP server and the gateway event adapter.
//!
//! Every entry point ends up in [`handle_operation`], which parses the body,
//! runs the pipeline under the invocation deadline and renders either the
//! success or the failure envelope.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::StatusCode;
use bizintel_core::{BizintelConfig, CompletionBackend, CompletionError, OpenAiCompletionClient};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::Instrument;

use crate::subsystems::analysis::AnalysisService;
use crate::subsystems::augment::{augmenter_from_config, Augmenter};
use crate::subsystems::risk::RiskService;
use crate::subsystems::{parse_body, ServiceError};

/// Shared read-only state for all handlers.
pub struct AppState {
    pub config: BizintelConfig,
    pub analysis: AnalysisService,
    pub risk: RiskService,
}

impl AppState {
    pub fn new(
        config: BizintelConfig,
        completion: Arc<dyn CompletionBackend>,
        augmenter: Arc<dyn Augmenter>,
    ) -> Self {
        let analysis = AnalysisService::new(
            completion.clone(),
            &config.completion,
            &config.prompt,
            &config.validation,
        );
        let risk = RiskService::new(
            completion,
            augmenter,
            &config.completion,
            &config.prompt,
            &config.validation,
        );
        Self {
            config,
            analysis,
            risk,
        }
    }

    /// Production wiring: OpenAI completion client plus whatever augmentation
    /// the configuration allows.
    pub fn from_config(config: BizintelConfig, api_key: &str) -> Result<Self, CompletionError> {
        let completion = OpenAiCompletionClient::new(api_key, config.completion.clone())?;
        let augmenter = augmenter_from_config(&config, api_key);
        Ok(Self::new(config, Arc::new(completion), augmenter))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    BusinessAnalysis,
    RiskAssessment,
}

impl Operation {
    pub fn service_name(self) -> &'static str {
        match self {
            Operation::BusinessAnalysis => "Business Analysis",
            Operation::RiskAssessment => "Risk Assessment",
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Operation::BusinessAnalysis => "/business-analysis",
            Operation::RiskAssessment => "/risk-assessment",
        }
    }
}

/// A resolved request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Invoke(Operation),
    Health(Operation),
}

impl Route {
    /// Match a request path, ignoring a trailing slash.
    pub fn resolve(path: &str) -> Option<Route> {
        let path = path.trim_end_matches('/');
        [Operation::BusinessAnalysis, Operation::RiskAssessment]
            .into_iter()
            .find_map(|op| match path.strip_prefix(op.path()) {
                Some("") => Some(Route::Invoke(op)),
                Some("/health") => Some(Route::Health(op)),
                _ => None,
            })
    }
}

pub fn success<T: Serialize>(data: &T) -> Value {
    json!({ "success": true, "data": data })
}

pub fn failure(err: &ServiceError) -> Value {
    json!({
        "success": false,
        "error": err.to_string(),
        "kind": err.kind(),
        "details": err.details(),
    })
}

pub fn not_found(path: &str) -> Value {
    json!({
        "success": false,
        "error": format!("No route for {}", path),
        "kind": "not_found",
        "details": [],
    })
}

pub fn method_not_allowed(method: &str, path: &str) -> Value {
    json!({
        "success": false,
        "error": format!("Method {} not allowed on {}", method, path),
        "kind": "method_not_allowed",
        "details": [],
    })
}

/// Health body for one operation. Risk assessment also reports its
/// augmentation strategy. `timestamp` is fractional Unix seconds.
pub fn health(state: &AppState, op: Operation) -> Value {
    let mut body = json!({
        "status": "healthy",
        "service": op.service_name(),
        "timestamp": chrono::Utc::now().timestamp_millis() as f64 / 1000.0,
        "version": env!("CARGO_PKG_VERSION"),
    });
    if op == Operation::RiskAssessment {
        body["augmentation"] = json!(state.risk.augmentation());
    }
    body
}

/// Run one operation on a raw body and render the envelope.
pub async fn handle_operation(state: &AppState, op: Operation, body: &[u8]) -> (StatusCode, Value) {
    let request_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("request", %request_id, operation = op.service_name());

    async move {
        let start = Instant::now();
        let result = run_operation(state, op, body).await;
        let took_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(data) => {
                tracing::info!(took_ms, "Request succeeded");
                (StatusCode::OK, data)
            }
            Err(e) => {
                let status = e.status();
                if status.is_server_error() {
                    tracing::error!(took_ms, kind = e.kind(), error = %e, "Request failed");
                } else {
                    tracing::warn!(took_ms, kind = e.kind(), error = %e, "Request rejected");
                }
                (status, failure(&e))
            }
        }
    }
    .instrument(span)
    .await
}

async fn run_operation(state: &AppState, op: Operation, body: &[u8]) -> Result<Value, ServiceError> {
    let body = parse_body(body)?;
    let deadline = state.config.service.invocation_timeout_secs;

    let pipeline = async {
        match op {
            Operation::BusinessAnalysis => state.analysis.analyze(&body).await.map(|r| success(&r)),
            Operation::RiskAssessment => state.risk.assess(&body).await.map(|r| success(&r)),
        }
    };

    tokio::time::timeout(Duration::from_secs(deadline), pipeline)
        .await
        .map_err(|_| ServiceError::Timeout(deadline))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsystems::augment::NoAugmentation;
    use crate::subsystems::testing::ScriptedCompletion;
    use async_trait::async_trait;
    use bizintel_core::CompletionRequest;

    const ANALYSIS_ANSWER: &str = "INDUSTRY_CLASSIFICATION: Retail\nMARKET_POSITION: Strong\nGROWTH_POTENTIAL: High\nSTRENGTHS_ADVANTAGES: Brand\nMARKET_OPPORTUNITIES: Online\nSTRATEGIC_RECOMMENDATIONS: Expand\nBUSINESS_OVERVIEW: Solid";

    fn state(backend: Arc<dyn CompletionBackend>, config: BizintelConfig) -> AppState {
        AppState::new(config, backend, Arc::new(NoAugmentation))
    }

    struct SlowCompletion;

    #[async_trait]
    impl CompletionBackend for SlowCompletion {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String, CompletionError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(String::new())
        }

        fn model(&self) -> &str {
            "slow"
        }
    }

    #[test]
    fn test_route_resolve() {
        assert_eq!(
            Route::resolve("/business-analysis"),
            Some(Route::Invoke(Operation::BusinessAnalysis))
        );
        assert_eq!(
            Route::resolve("/risk-assessment/health/"),
            Some(Route::Health(Operation::RiskAssessment))
        );
        assert_eq!(Route::resolve("/business-analysis-v2"), None);
        assert_eq!(Route::resolve("/"), None);
    }

    #[tokio::test]
    async fn test_handle_operation_success_envelope() {
        let st = state(
            Arc::new(ScriptedCompletion::answering(ANALYSIS_ANSWER)),
            BizintelConfig::default(),
        );
        let (status, body) =
            handle_operation(&st, Operation::BusinessAnalysis, br#"{"companyName":"Acme"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["industryClassification"], "Retail");
    }

    #[tokio::test]
    async fn test_handle_operation_invalid_json() {
        let st = state(
            Arc::new(ScriptedCompletion::answering(ANALYSIS_ANSWER)),
            BizintelConfig::default(),
        );
        let (status, body) = handle_operation(&st, Operation::BusinessAnalysis, b"{oops").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["kind"], "validation_error");
    }

    #[tokio::test]
    async fn test_handle_operation_missing_field_details() {
        let st = state(
            Arc::new(ScriptedCompletion::answering(ANALYSIS_ANSWER)),
            BizintelConfig::default(),
        );
        let (status, body) = handle_operation(&st, Operation::RiskAssessment, b"").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"][0]["field"], "companyName");
    }

    #[tokio::test]
    async fn test_handle_operation_timeout() {
        let mut config = BizintelConfig::default();
        config.service.invocation_timeout_secs = 1;
        let st = state(Arc::new(SlowCompletion), config);

        let (status, body) =
            handle_operation(&st, Operation::BusinessAnalysis, br#"{"companyName":"Acme"}"#).await;
        assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
        assert_eq!(body["kind"], "timeout");
    }

    #[test]
    fn test_health_bodies() {
        let st = state(
            Arc::new(ScriptedCompletion::answering(ANALYSIS_ANSWER)),
            BizintelConfig::default(),
        );
        let analysis = health(&st, Operation::BusinessAnalysis);
        assert_eq!(analysis["status"], "healthy");
        assert_eq!(analysis["service"], "Business Analysis");
        assert!(analysis.get("augmentation").is_none());
        let ts = analysis["timestamp"].as_f64().unwrap();
        assert!(ts > 1_600_000_000.0, "timestamp {} is not epoch seconds", ts);

        let risk = health(&st, Operation::RiskAssessment);
        assert_eq!(risk["service"], "Risk Assessment");
        assert_eq!(risk["augmentation"], "none");
        assert_eq!(risk["version"], env!("CARGO_PKG_VERSION"));
    }
}
