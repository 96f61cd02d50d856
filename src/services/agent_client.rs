use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::core::config::Settings;
use crate::core::time::{format_offset, now_utc};
use crate::schemas::context::GradingContext;
use crate::schemas::grading::{GradedBy, GradingResult};
use crate::services::prompt::build_evaluation_prompt;
use crate::services::provider::{ProviderError, ScoringProvider};
use crate::services::response::{extract_payload, parse_grading_result};

const GRADING_HINTS: &[&str] = &["final_score", "context_relevance_score"];

/// Client for the external grading agent. The agent keeps conversational
/// state per session, so every attempt at the same milestone reuses the
/// stable `milestone-{id}-session` id and the agent sees the student's
/// history without us re-sending it.
#[derive(Debug, Clone)]
pub(crate) struct AgentClient {
    client: Client,
    base_url: String,
    api_key: String,
    agent_id: String,
    user_id: String,
    history_limit: usize,
}

impl AgentClient {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Self> {
        let timeout = Duration::from_secs(settings.agent().request_timeout_seconds);
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: settings.agent().base_url.trim_end_matches('/').to_string(),
            api_key: settings.agent().api_key.clone(),
            agent_id: settings.agent().agent_id.clone(),
            user_id: settings.agent().user_id.clone(),
            history_limit: settings.grading().feedback_history_limit,
        })
    }

    async fn send(&self, message: &str, session_id: &str) -> Result<Value, ProviderError> {
        let payload = json!({
            "user_id": self.user_id,
            "agent_id": self.agent_id,
            "session_id": session_id,
            "message": message,
        });

        let started_at = now_utc();
        let timer = Instant::now();
        let url = format!("{}/v3/inference/chat/", self.base_url);

        let response =
            self.client
                .post(&url)
                .header("x-api-key", self.api_key.as_str())
                .json(&payload)
                .send()
                .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status { status: status.as_u16(), body });
        }

        let body: Value = response.json().await?;
        let payload = extract_payload(&body, GRADING_HINTS)?;

        tracing::info!(
            session_id,
            started_at = %format_offset(started_at),
            duration_seconds = timer.elapsed().as_secs_f64(),
            "External agent grading completed"
        );

        Ok(payload)
    }
}

#[async_trait]
impl ScoringProvider for AgentClient {
    fn name(&self) -> &'static str {
        "external_agent"
    }

    fn graded_by(&self) -> GradedBy {
        GradedBy::ExternalAgent
    }

    async fn score(
        &self,
        context: &GradingContext,
        milestone_id: Option<&str>,
    ) -> Result<GradingResult, ProviderError> {
        let milestone_id = milestone_id
            .ok_or(ProviderError::NotApplicable("agent sessions need a milestone id"))?;

        let prompt = build_evaluation_prompt(context, self.history_limit)
            .map_err(|err| ProviderError::Prompt(err.to_string()))?;
        let session_id = format!("milestone-{milestone_id}-session");

        let payload = self.send(&prompt, &session_id).await?;
        parse_grading_result(&payload)
    }
}
