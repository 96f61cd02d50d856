use async_trait::async_trait;
use thiserror::Error;

use crate::schemas::context::GradingContext;
use crate::schemas::grading::{GradedBy, GradingResult};

/// Any failure from an external grading provider. Callers never see these;
/// the orchestrator logs them and falls through to the next provider in the
/// chain. One attempt per provider, no retries.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("provider response was not valid JSON: {0}")]
    Parse(String),
    #[error("provider response failed validation: {}", issues.join("; "))]
    InvalidSchema { issues: Vec<String> },
    #[error("provider response had no usable payload")]
    EmptyPayload,
    #[error("prompt rendering failed: {0}")]
    Prompt(String),
    #[error("provider not applicable: {0}")]
    NotApplicable(&'static str),
}

impl ProviderError {
    /// Skips are expected control flow; real failures get logged louder.
    pub(crate) fn is_skip(&self) -> bool {
        matches!(self, ProviderError::NotApplicable(_))
    }
}

/// One link in the grading fallback chain. Providers are tried in order; the
/// first success wins and the heuristic scorer is the guaranteed terminal
/// step outside this trait.
#[async_trait]
pub(crate) trait ScoringProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Provenance marker stamped onto results this provider produced.
    fn graded_by(&self) -> GradedBy;

    async fn score(
        &self,
        context: &GradingContext,
        milestone_id: Option<&str>,
    ) -> Result<GradingResult, ProviderError>;
}
