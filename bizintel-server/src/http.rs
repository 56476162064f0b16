//! bizintel HTTP REST API
//!
//! Axum server exposing both operations. Each endpoint is a thin handler that
//! delegates to the router, so the same code path serves HTTP and gateway
//! events.
//!
//! Endpoints:
//! - POST /business-analysis        : business analysis
//! - POST /risk-assessment          : risk assessment
//! - GET  /business-analysis/health : health check
//! - GET  /risk-assessment/health   : health check with augmentation name
//!
//! CORS is permissive; preflight OPTIONS requests are answered by the layer.

use std::sync::Arc;

use anyhow::Result;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;

use crate::router::{self, AppState, Operation};

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/business-analysis", post(business_analysis_handler))
        .route("/risk-assessment", post(risk_assessment_handler))
        .route("/business-analysis/health", get(business_analysis_health_handler))
        .route("/risk-assessment/health", get(risk_assessment_health_handler))
        .fallback(not_found_handler)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(state: Arc<AppState>, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
    let addr = format!("{}:{}", state.config.http.host, state.config.http.port);

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("bizintel HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

pub async fn business_analysis_handler(State(state): State<Arc<AppState>>, body: Bytes) -> impl IntoResponse {
    let (status, body) = router::handle_operation(&state, Operation::BusinessAnalysis, &body).await;
    (status, Json(body))
}

pub async fn risk_assessment_handler(State(state): State<Arc<AppState>>, body: Bytes) -> impl IntoResponse {
    let (status, body) = router::handle_operation(&state, Operation::RiskAssessment, &body).await;
    (status, Json(body))
}

pub async fn business_analysis_health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(router::health(&state, Operation::BusinessAnalysis)))
}

pub async fn risk_assessment_health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(router::health(&state, Operation::RiskAssessment)))
}

pub async fn not_found_handler(uri: Uri) -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(router::not_found(uri.path())))
}
