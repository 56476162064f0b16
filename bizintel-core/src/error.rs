use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BizintelError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing API key: set {0}")]
    MissingApiKey(&'static str),
}

/// A single problem found on one field, either in an inbound request or in
/// a model answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    pub field: String,
    pub expected: String,
}

impl FieldIssue {
    pub fn new(field: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            expected: expected.into(),
        }
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.expected)
    }
}

fn join_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Inbound payload failed the request schema.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid request: {}", join_issues(.issues))]
pub struct ValidationError {
    pub issues: Vec<FieldIssue>,
}

impl ValidationError {
    pub fn single(field: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            issues: vec![FieldIssue::new(field, expected)],
        }
    }

    /// Names of the offending fields, in reporting order.
    pub fn fields(&self) -> Vec<&str> {
        self.issues.iter().map(|i| i.field.as_str()).collect()
    }
}

/// A request field rendered longer than the prompt budget allows.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Field {field} renders to {length} characters, limit is {limit}")]
pub struct EncodingError {
    pub field: &'static str,
    pub length: usize,
    pub limit: usize,
}

/// The model's answer did not match the declared response schema.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Model answer does not match response schema: {}", join_issues(.issues))]
pub struct SchemaMismatch {
    pub issues: Vec<FieldIssue>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_lists_every_issue() {
        let err = ValidationError {
            issues: vec![
                FieldIssue::new("companyName", "required string"),
                FieldIssue::new("employeeCount", "integer >= 0"),
            ],
        };
        assert_eq!(
            err.to_string(),
            "Invalid request: companyName: required string; employeeCount: integer >= 0"
        );
        assert_eq!(err.fields(), vec!["companyName", "employeeCount"]);
    }

    #[test]
    fn test_encoding_error_message() {
        let err = EncodingError {
            field: "description",
            length: 5000,
            limit: 4000,
        };
        assert!(err.to_string().contains("description"));
        assert!(err.to_string().contains("4000"));
    }
}
