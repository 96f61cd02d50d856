use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::core::config::Settings;
use crate::schemas::context::GradingContext;
use crate::schemas::grading::{GradedBy, GradingResult};
use crate::services::prompt::build_evaluation_prompt;
use crate::services::provider::{ProviderError, ScoringProvider};
use crate::services::response::{extract_json_block, parse_grading_result};

/// Secondary grading provider: a stateless generative-content LLM call. Gets
/// the full prompt (including condensed attempt history) every time, and
/// tends to wrap its JSON in markdown fences.
#[derive(Debug, Clone)]
pub(crate) struct LlmClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f64,
    history_limit: usize,
}

impl LlmClient {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Self> {
        let timeout = Duration::from_secs(settings.llm().request_timeout_seconds);
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key: settings.llm().api_key.clone(),
            base_url: settings.llm().base_url.trim_end_matches('/').to_string(),
            model: settings.llm().model.clone(),
            max_tokens: settings.llm().max_tokens,
            temperature: settings.llm().temperature,
            history_limit: settings.grading().feedback_history_limit,
        })
    }

    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let payload = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": self.max_tokens,
            }
        });

        let timer = Instant::now();
        let response = self.client.post(&url).json(&payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status { status: status.as_u16(), body });
        }

        let body: Value = response.json().await?;
        let text = body
            .get("candidates")
            .and_then(|candidates| candidates.get(0))
            .and_then(|candidate| candidate.get("content"))
            .and_then(|content| content.get("parts"))
            .and_then(|parts| parts.get(0))
            .and_then(|part| part.get("text"))
            .and_then(Value::as_str)
            .ok_or(ProviderError::EmptyPayload)?;

        tracing::info!(
            model = %self.model,
            duration_seconds = timer.elapsed().as_secs_f64(),
            "Fallback LLM grading completed"
        );

        Ok(text.to_string())
    }

    /// Runs a prompt and parses whatever JSON object the reply carries.
    /// Shared by the milestone path and the assessment evaluators.
    pub(crate) async fn generate_json(&self, prompt: &str) -> Result<Value, ProviderError> {
        let text = self.generate(prompt).await?;
        serde_json::from_str(extract_json_block(&text))
            .map_err(|err| ProviderError::Parse(err.to_string()))
    }
}

#[async_trait]
impl ScoringProvider for LlmClient {
    fn name(&self) -> &'static str {
        "fallback_llm"
    }

    fn graded_by(&self) -> GradedBy {
        GradedBy::FallbackLlm
    }

    async fn score(
        &self,
        context: &GradingContext,
        _milestone_id: Option<&str>,
    ) -> Result<GradingResult, ProviderError> {
        let prompt = build_evaluation_prompt(context, self.history_limit)
            .map_err(|err| ProviderError::Prompt(err.to_string()))?;

        let payload = self.generate_json(&prompt).await?;
        parse_grading_result(&payload)
    }
}
