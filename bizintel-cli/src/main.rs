//! bizintel-cli: command-line client for a running bizintel server
//!
//! # Subcommands
//! - `analyze <file|-> [--json]`: business analysis for a JSON request
//! - `assess <file|-> [--json]` : risk assessment for a JSON request
//! - `status`                   : show health of both services

use std::io::Read;

use clap::{Parser, Subcommand};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8780";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "bizintel-cli",
    version,
    about = "Business analysis and risk assessment from the command line"
)]
struct Cli {
    /// bizintel HTTP server URL (overrides BIZINTEL_HTTP_URL env var)
    #[arg(long, env = "BIZINTEL_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run a business analysis
    Analyze {
        /// Request JSON file, or `-` for stdin
        input: String,

        /// Print the raw response envelope
        #[arg(long)]
        json: bool,
    },

    /// Run a risk assessment
    Assess {
        /// Request JSON file, or `-` for stdin
        input: String,

        /// Print the raw response envelope
        #[arg(long)]
        json: bool,
    },

    /// Show server status
    Status,
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct FieldDetail {
    pub field: String,
    pub expected: String,
}

/// The response envelope shared by both operations.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub details: Vec<FieldDetail>,
}

/// Human-readable labels for each operation's output fields, in display order.
const ANALYSIS_FIELDS: &[(&str, &str)] = &[
    ("analysisId", "Analysis ID"),
    ("industryClassification", "Industry"),
    ("marketPosition", "Market Position"),
    ("growthPotential", "Growth Potential"),
    ("strengthsAndAdvantages", "Strengths"),
    ("marketOpportunities", "Opportunities"),
    ("strategicRecommendations", "Recommendations"),
    ("businessOverview", "Overview"),
];

const RISK_FIELDS: &[(&str, &str)] = &[
    ("assessmentId", "Assessment ID"),
    ("overallRiskLevel", "Risk Level"),
    ("riskScore", "Risk Score"),
    ("financialRisk", "Financial"),
    ("operationalRisk", "Operational"),
    ("marketRisk", "Market"),
    ("complianceRisk", "Compliance"),
    ("riskFactors", "Risk Factors"),
    ("mitigationStrategies", "Mitigation"),
    ("riskSummary", "Summary"),
    ("policyReferences", "Policy References"),
];

/// Render a successful result as labelled lines, skipping absent fields.
pub fn render_data(data: &serde_json::Value, fields: &[(&str, &str)]) -> String {
    let mut out = String::new();
    for (key, label) in fields {
        let value = match &data[*key] {
            serde_json::Value::Null => continue,
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Array(items) if items.is_empty() => continue,
            serde_json::Value::Array(items) => items
                .iter()
                .map(|i| i.as_str().map(str::to_string).unwrap_or_else(|| i.to_string()))
                .collect::<Vec<_>>()
                .join(", "),
            other => other.to_string(),
        };
        out.push_str(&format!("{:<18} {}\n", format!("{}:", label), value));
    }
    out
}

/// Render a failure envelope for stderr.
pub fn render_error(envelope: &Envelope) -> String {
    let mut out = format!(
        "{} ({})",
        envelope.error.as_deref().unwrap_or("unknown error"),
        envelope.kind.as_deref().unwrap_or("error")
    );
    for d in &envelope.details {
        out.push_str(&format!("\n  - {}: expected {}", d.field, d.expected));
    }
    out
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn read_input(input: &str) -> anyhow::Result<String> {
    if input == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        Ok(std::fs::read_to_string(input)?)
    }
}

fn do_submit(
    server: &str,
    endpoint: &str,
    input: &str,
    fields: &[(&str, &str)],
    json_output: bool,
) -> anyhow::Result<()> {
    let body = read_input(input)?;

    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(120))
        .build()?;

    let url = format!("{}{}", server, endpoint);
    let resp = match client
        .post(&url)
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body(body)
        .send()
    {
        Ok(r) => r,
        Err(e) => {
            eprintln!("bizintel-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    let status = resp.status();
    let text = resp.text()?;

    if json_output {
        println!("{}", text);
        if !status.is_success() {
            std::process::exit(1);
        }
        return Ok(());
    }

    let envelope: Envelope = match serde_json::from_str(&text) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("bizintel-cli: server returned {} with unreadable body: {}", status, e);
            std::process::exit(1);
        }
    };

    match envelope.data.as_ref() {
        Some(data) if envelope.success => print!("{}", render_data(data, fields)),
        _ => {
            eprintln!("bizintel-cli: HTTP {}: {}", status, render_error(&envelope));
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Show the server status by calling both health endpoints.
fn do_status(server: &str) -> anyhow::Result<()> {
    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()?;

    let mut healthy = true;
    for endpoint in ["/business-analysis/health", "/risk-assessment/health"] {
        let url = format!("{}{}", server, endpoint);
        match client.get(&url).send() {
            Ok(r) if r.status().is_success() => {
                let body: serde_json::Value = r.json().unwrap_or_default();
                println!(
                    "{}: {} (v{})",
                    body["service"].as_str().unwrap_or(endpoint),
                    body["status"].as_str().unwrap_or("unknown"),
                    body["version"].as_str().unwrap_or("?")
                );
                if let Some(aug) = body["augmentation"].as_str() {
                    println!("  Augmentation: {}", aug);
                }
            }
            Ok(r) => {
                eprintln!("bizintel-cli: {} unhealthy (HTTP {})", endpoint, r.status());
                healthy = false;
            }
            Err(e) => {
                eprintln!("bizintel-cli: cannot reach {}: {}", url, e);
                healthy = false;
            }
        }
    }

    if !healthy {
        std::process::exit(1);
    }
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::Analyze { input, json } => {
            do_submit(&server, "/business-analysis", &input, ANALYSIS_FIELDS, json)
        }
        Commands::Assess { input, json } => {
            do_submit(&server, "/risk-assessment", &input, RISK_FIELDS, json)
        }
        Commands::Status => do_status(&server),
    };

    if let Err(e) = result {
        eprintln!("bizintel-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_analysis_in_field_order() {
        let data = json!({
            "businessOverview": "Solid",
            "analysisId": "ACME_BA_1",
            "industryClassification": "Retail"
        });
        let out = render_data(&data, ANALYSIS_FIELDS);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Analysis ID:"));
        assert!(lines[0].ends_with("ACME_BA_1"));
        assert!(lines[2].starts_with("Overview:"));
    }

    #[test]
    fn test_render_risk_numbers_and_lists() {
        let data = json!({
            "riskScore": 72,
            "policyReferences": ["policy#0", "policy#3"]
        });
        let out = render_data(&data, RISK_FIELDS);
        assert!(out.contains("72"));
        assert!(out.contains("policy#0, policy#3"));
    }

    #[test]
    fn test_render_skips_empty_references() {
        let out = render_data(&json!({"policyReferences": []}), RISK_FIELDS);
        assert!(out.is_empty());
    }

    #[test]
    fn test_render_error_lists_details() {
        let envelope: Envelope = serde_json::from_value(json!({
            "success": false,
            "error": "Request failed validation",
            "kind": "validation_error",
            "details": [{"field": "companyName", "expected": "non-empty string"}]
        }))
        .unwrap();
        let out = render_error(&envelope);
        assert!(out.starts_with("Request failed validation (validation_error)"));
        assert!(out.contains("companyName: expected non-empty string"));
    }

    #[test]
    fn test_envelope_success_shape() {
        let envelope: Envelope =
            serde_json::from_value(json!({"success": true, "data": {"riskScore": 10}})).unwrap();
        assert!(envelope.success);
        assert!(envelope.details.is_empty());
        assert_eq!(envelope.data.unwrap()["riskScore"], 10);
    }
}
