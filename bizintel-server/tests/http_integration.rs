//! HTTP integration tests for the bizintel REST API
//!
//! The router runs in-process via `oneshot`; the completion and embedding
//! APIs are served by wiremock.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use bizintel_core::config::CompletionConfig;
use bizintel_core::retrieval::IndexedPassage;
use bizintel_core::{BizintelConfig, PolicyIndex};
use bizintel_server::http::build_router;
use bizintel_server::router::AppState;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ANALYSIS_ANSWER: &str = "INDUSTRY_CLASSIFICATION: Retail - general merchandise\n\
MARKET_POSITION: Established regional retailer\n\
GROWTH_POTENTIAL: Moderate, driven by e-commerce\n\
STRENGTHS_ADVANTAGES: Loyal customer base\n\
MARKET_OPPORTUNITIES: Online ordering and delivery\n\
STRATEGIC_RECOMMENDATIONS: Invest in an online storefront\n\
BUSINESS_OVERVIEW: Acme Corp is a stable retail business.";

fn test_config(base_url: &str) -> BizintelConfig {
    let mut config = BizintelConfig::default();
    config.completion = CompletionConfig {
        base_url: base_url.to_string(),
        model: "gpt-test".to_string(),
        max_retries: 2,
        retry_delay_ms: 10,
        max_delay_ms: 50,
        jitter: false,
        request_timeout_secs: 5,
        ..CompletionConfig::default()
    };
    config.embedding.base_url = base_url.to_string();
    config.embedding.retry_delay_ms = 10;
    config
}

fn app(config: BizintelConfig) -> Router {
    let state = AppState::from_config(config, "sk-test").unwrap();
    build_router(Arc::new(state))
}

fn chat_response(content: &str) -> Value {
    json!({
        "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }]
    })
}

fn risk_answer() -> String {
    json!({
        "overallRiskLevel": "Medium",
        "riskScore": 45,
        "financialRisk": "Moderate leverage",
        "operationalRisk": "Single location",
        "marketRisk": "Competitive retail market",
        "complianceRisk": "No known issues",
        "riskFactors": "Leverage and concentration",
        "mitigationStrategies": "Diversify locations",
        "riskSummary": "Moderate overall risk"
    })
    .to_string()
}

async fn post(app: Router, uri: &str, body: &str) -> (StatusCode, Value) {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

// ===========================================================================
// TEST 1: business analysis end to end
// ===========================================================================
#[tokio::test]
async fn test_business_analysis_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("Company Name: Acme Corp"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_response(ANALYSIS_ANSWER)))
        .expect(1)
        .mount(&server)
        .await;

    let (status, body) = post(
        app(test_config(&server.uri())),
        "/business-analysis",
        r#"{"business_name":"Acme Corp","industry":"retail","description":"General merchandise stores"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["success"], true);
    let data = &body["data"];
    assert_eq!(data["industryClassification"], "Retail - general merchandise");
    assert!(!data["marketPosition"].as_str().unwrap().is_empty());
    assert!(!data["strategicRecommendations"].as_str().unwrap().is_empty());
    assert!(data["analysisId"].as_str().unwrap().starts_with("ACME_CORP_BA_"));
}

// ===========================================================================
// TEST 2: missing required field never reaches the model
// ===========================================================================
#[tokio::test]
async fn test_validation_error_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_response(ANALYSIS_ANSWER)))
        .expect(0)
        .mount(&server)
        .await;

    let (status, body) = post(
        app(test_config(&server.uri())),
        "/business-analysis",
        r#"{"industry":"retail","yearsInOperation":"ten"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["kind"], "validation_error");
    let fields: Vec<&str> = body["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["companyName", "yearsInOperation"]);
}

// ===========================================================================
// TEST 3: malformed JSON body
// ===========================================================================
#[tokio::test]
async fn test_invalid_json_envelope() {
    let server = MockServer::start().await;
    let (status, body) = post(app(test_config(&server.uri())), "/risk-assessment", "{\"companyName\":").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation_error");
    assert!(body["error"].as_str().unwrap().contains("Invalid JSON"));
}

// ===========================================================================
// TEST 4: non-retryable upstream failure
// ===========================================================================
#[tokio::test]
async fn test_upstream_error_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"error": {"message": "Incorrect API key"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (status, body) = post(
        app(test_config(&server.uri())),
        "/business-analysis",
        r#"{"companyName":"Acme Corp"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["kind"], "upstream_error");
}

// ===========================================================================
// TEST 5: transient upstream failures are retried, then succeed
// ===========================================================================
#[tokio::test]
async fn test_transient_upstream_failure_recovers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_response(ANALYSIS_ANSWER)))
        .mount(&server)
        .await;

    let (status, body) = post(
        app(test_config(&server.uri())),
        "/business-analysis",
        r#"{"companyName":"Acme Corp"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

// ===========================================================================
// TEST 6: answer missing required output is a schema mismatch
// ===========================================================================
#[tokio::test]
async fn test_schema_mismatch_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_response(r#"{"overallRiskLevel":"Severe","riskScore":45}"#)),
        )
        .mount(&server)
        .await;

    let (status, body) = post(
        app(test_config(&server.uri())),
        "/risk-assessment",
        r#"{"companyName":"Acme Corp"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["kind"], "schema_mismatch");
    let fields: Vec<&str> = body["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"overallRiskLevel"));
    assert!(fields.contains(&"riskSummary"));
}

// ===========================================================================
// TEST 7: risk assessment without an index runs unaugmented
// ===========================================================================
#[tokio::test]
async fn test_risk_assessment_without_index() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"response_format": {"type": "json_object"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_response(&risk_answer())))
        .expect(1)
        .mount(&server)
        .await;

    let (status, body) = post(
        app(test_config(&server.uri())),
        "/risk-assessment",
        r#"{"companyName":"Acme Corp","businessId":"B-77","annualRevenue":1500000,"totalDebt":400000}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["data"]["assessmentId"], "RA_ACME_CORP_B-77");
    assert_eq!(body["data"]["overallRiskLevel"], "Medium");
    assert_eq!(body["data"]["riskScore"], 45);
    assert_eq!(body["data"]["policyReferences"], json!([]));
}

// ===========================================================================
// TEST 8: risk assessment with a policy index injects the nearest passage
// ===========================================================================
#[tokio::test]
async fn test_risk_assessment_with_policy_index() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .and(body_partial_json(json!({"model": "test-embed", "dimensions": 3})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "index": 0, "embedding": [0.9, 0.1, 0.0] }]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("Leverage above three times EBITDA requires collateral"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_response(&risk_answer())))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let index_path = dir.path().join("policy-index.json");
    PolicyIndex {
        model: "test-embed".to_string(),
        dimensions: 3,
        passages: vec![
            IndexedPassage {
                id: "policy#0".into(),
                source: "policy".into(),
                text: "Leverage above three times EBITDA requires collateral.".into(),
                embedding: vec![1.0, 0.0, 0.0],
            },
            IndexedPassage {
                id: "policy#1".into(),
                source: "policy".into(),
                text: "Restaurants need a current health permit.".into(),
                embedding: vec![0.0, 1.0, 0.0],
            },
        ],
    }
    .save(&index_path)
    .unwrap();

    let mut config = test_config(&server.uri());
    config.retrieval.index_path = Some(index_path.display().to_string());
    config.retrieval.top_k = 1;

    let (status, body) = post(app(config), "/risk-assessment", r#"{"companyName":"Acme Corp"}"#).await;

    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["data"]["policyReferences"], json!(["policy#0"]));
}

// ===========================================================================
// TEST 9: health endpoints report the augmentation strategy
// ===========================================================================
#[tokio::test]
async fn test_health_endpoints() {
    let server = MockServer::start().await;
    let router = app(test_config(&server.uri()));

    for (uri, service) in [
        ("/business-analysis/health", "Business Analysis"),
        ("/risk-assessment/health", "Risk Assessment"),
    ] {
        let resp = router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], service);
    }
}
