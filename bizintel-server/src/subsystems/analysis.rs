//! Business analysis pipeline: validate → prompt → complete → parse.

use std::sync::Arc;

use bizintel_core::config::{CompletionConfig, PromptConfig, ValidationConfig};
use bizintel_core::models::{BusinessAnalysisRequest, BusinessAnalysisResponse};
use bizintel_core::{parse, prompt, CompletionBackend, CompletionRequest};

use super::ServiceError;

pub struct AnalysisService {
    completion: Arc<dyn CompletionBackend>,
    temperature: f32,
    max_tokens: u32,
    max_field_chars: usize,
    reject_unknown: bool,
}

impl AnalysisService {
    pub fn new(
        completion: Arc<dyn CompletionBackend>,
        completion_config: &CompletionConfig,
        prompt_config: &PromptConfig,
        validation: &ValidationConfig,
    ) -> Self {
        Self {
            completion,
            temperature: completion_config.analysis_temperature,
            max_tokens: completion_config.analysis_max_tokens,
            max_field_chars: prompt_config.max_field_chars,
            reject_unknown: validation.reject_unknown_fields,
        }
    }

    pub async fn analyze(&self, body: &serde_json::Value) -> Result<BusinessAnalysisResponse, ServiceError> {
        let request = BusinessAnalysisRequest::from_json(body, self.reject_unknown)?;
        tracing::info!(
            company = %request.company_name,
            years_in_operation = ?request.years_in_operation,
            "Generating business analysis"
        );

        let analysis_id = request.analysis_id(chrono::Utc::now().timestamp());
        let prompt = prompt::analysis_prompt(&request, self.max_field_chars)?;

        let answer = self
            .completion
            .complete(&CompletionRequest {
                prompt,
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                json_output: false,
            })
            .await?;
        tracing::info!(chars = answer.len(), model = self.completion.model(), "Business analysis answer received");

        let response = parse::parse_analysis_answer(&answer, analysis_id).map_err(|e| {
            tracing::error!(error = %e, "Business analysis answer rejected");
            e
        })?;
        tracing::info!(analysis_id = %response.analysis_id, "Business analysis completed");
        Ok(response)
    }
}
