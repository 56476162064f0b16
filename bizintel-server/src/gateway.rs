//! API-Gateway proxy event adapter.
//!
//! Translates a proxy event into a routed operation and the envelope back into
//! a proxy response. Used by `bizintel-server invoke`.

use std::collections::BTreeMap;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::router::{self, AppState, Route};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiGatewayEvent {
    #[serde(default)]
    pub http_method: String,
    #[serde(default)]
    pub path: String,
    /// JSON text, or an already-decoded object.
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default)]
    pub is_base64_encoded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiGatewayResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl ApiGatewayResponse {
    fn new(status: StatusCode, body: &Value) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers.insert("Access-Control-Allow-Origin".to_string(), "*".to_string());
        headers.insert(
            "Access-Control-Allow-Headers".to_string(),
            "Content-Type,Authorization".to_string(),
        );
        headers.insert(
            "Access-Control-Allow-Methods".to_string(),
            "GET,POST,OPTIONS".to_string(),
        );
        Self {
            status_code: status.as_u16(),
            headers,
            body: body.to_string(),
        }
    }
}

pub async fn handle_event(state: &AppState, event: ApiGatewayEvent) -> ApiGatewayResponse {
    let method = event.http_method.to_ascii_uppercase();
    tracing::debug!(method = %method, path = %event.path, "Gateway event received");

    if method == "OPTIONS" {
        return ApiGatewayResponse::new(StatusCode::OK, &json!({}));
    }

    let Some(route) = Route::resolve(&event.path) else {
        return ApiGatewayResponse::new(StatusCode::NOT_FOUND, &router::not_found(&event.path));
    };

    match (route, method.as_str()) {
        (Route::Health(op), "GET") => ApiGatewayResponse::new(StatusCode::OK, &router::health(state, op)),
        (Route::Invoke(op), "POST") => {
            if event.is_base64_encoded {
                let body = json!({
                    "success": false,
                    "error": "Base64-encoded bodies are not supported",
                    "kind": "validation_error",
                    "details": [],
                });
                return ApiGatewayResponse::new(StatusCode::BAD_REQUEST, &body);
            }
            let raw = match event.body {
                None | Some(Value::Null) => Vec::new(),
                Some(Value::String(text)) => text.into_bytes(),
                Some(other) => other.to_string().into_bytes(),
            };
            let (status, body) = router::handle_operation(state, op, &raw).await;
            ApiGatewayResponse::new(status, &body)
        }
        _ => ApiGatewayResponse::new(
            StatusCode::METHOD_NOT_ALLOWED,
            &router::method_not_allowed(&method, &event.path),
        ),
    }
}
