//! Risk assessment pipeline: validate → retrieve → prompt → complete → parse.
//!
//! Retrieval is best effort. When the augmenter fails the request continues
//! with no reference passages.

use std::sync::Arc;

use bizintel_core::config::{CompletionConfig, PromptConfig, ValidationConfig};
use bizintel_core::models::{RiskAssessmentRequest, RiskAssessmentResponse};
use bizintel_core::{parse, prompt, CompletionBackend, CompletionRequest};

use super::augment::Augmenter;
use super::ServiceError;

pub struct RiskService {
    completion: Arc<dyn CompletionBackend>,
    augmenter: Arc<dyn Augmenter>,
    temperature: f32,
    max_tokens: u32,
    max_field_chars: usize,
    reject_unknown: bool,
}

impl RiskService {
    pub fn new(
        completion: Arc<dyn CompletionBackend>,
        augmenter: Arc<dyn Augmenter>,
        completion_config: &CompletionConfig,
        prompt_config: &PromptConfig,
        validation: &ValidationConfig,
    ) -> Self {
        Self {
            completion,
            augmenter,
            temperature: completion_config.risk_temperature,
            max_tokens: completion_config.risk_max_tokens,
            max_field_chars: prompt_config.max_field_chars,
            reject_unknown: validation.reject_unknown_fields,
        }
    }

    pub fn augmentation(&self) -> &str {
        self.augmenter.name()
    }

    pub async fn assess(&self, body: &serde_json::Value) -> Result<RiskAssessmentResponse, ServiceError> {
        let request = RiskAssessmentRequest::from_json(body, self.reject_unknown)?;
        tracing::info!(
            company = %request.company_name,
            augmentation = self.augmenter.name(),
            "Assessing risk"
        );

        let assessment_id = request.assessment_id(chrono::Utc::now().timestamp());

        let query = prompt::risk_retrieval_query(&request);
        let passages = match self.augmenter.passages(&query).await {
            Ok(passages) => passages,
            Err(e) => {
                tracing::warn!(error = %e, "Policy retrieval failed; continuing without reference passages");
                Vec::new()
            }
        };
        tracing::debug!(passages = passages.len(), "Reference passages selected");

        let prompt = prompt::risk_prompt(&request, &passages, self.max_field_chars)?;
        let policy_references = passages.into_iter().map(|p| p.id).collect();

        let answer = self
            .completion
            .complete(&CompletionRequest {
                prompt,
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                json_output: true,
            })
            .await?;
        tracing::info!(chars = answer.len(), model = self.completion.model(), "Risk assessment answer received");

        let response = parse::parse_risk_answer(&answer, assessment_id, policy_references).map_err(|e| {
            tracing::error!(error = %e, "Risk assessment answer rejected");
            e
        })?;
        tracing::info!(
            assessment_id = %response.assessment_id,
            level = %response.overall_risk_level,
            score = response.risk_score,
            "Risk assessment completed"
        );
        Ok(response)
    }
}
