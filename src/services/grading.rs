use std::time::Instant;

use anyhow::Result;
use uuid::Uuid;
use validator::Validate;

use crate::core::config::Settings;
use crate::schemas::context::{ContextValidationError, GradingContext};
use crate::schemas::grading::{GradedBy, GradingResult};
use crate::services::agent_client::AgentClient;
use crate::services::feedback;
use crate::services::heuristics::HeuristicScorer;
use crate::services::llm_client::LlmClient;
use crate::services::provider::ScoringProvider;

/// Milestone grading entry point. Holds the provider chain in strict priority
/// order; the heuristic scorer sits outside the chain as the terminal step
/// that cannot fail. Construct once and share; every call is independent.
pub struct GradingService {
    providers: Vec<Box<dyn ScoringProvider>>,
    heuristic: HeuristicScorer,
    use_rule_based: bool,
}

impl GradingService {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let mut providers: Vec<Box<dyn ScoringProvider>> = Vec::new();

        if settings.agent().is_configured() {
            providers.push(Box::new(AgentClient::from_settings(settings)?));
        }
        if settings.llm().is_configured() {
            providers.push(Box::new(LlmClient::from_settings(settings)?));
        }

        if providers.is_empty() && !settings.grading().use_rule_based {
            tracing::warn!("No grading provider configured; falling back to rule-based grading");
        }

        Ok(Self {
            providers,
            heuristic: HeuristicScorer::new(),
            use_rule_based: settings.grading().use_rule_based,
        })
    }

    #[cfg(test)]
    pub(crate) fn with_providers(
        providers: Vec<Box<dyn ScoringProvider>>,
        use_rule_based: bool,
    ) -> Self {
        Self { providers, heuristic: HeuristicScorer::new(), use_rule_based }
    }

    /// Grades one attempt. The only error a caller can see is a malformed
    /// context; once the input validates, some result always comes back, at
    /// worst a rule-based one.
    pub async fn grade_student_response(
        &self,
        context: &GradingContext,
        milestone_id: Option<&str>,
    ) -> Result<GradingResult, ContextValidationError> {
        context.validate()?;

        let grading_id = Uuid::new_v4();
        let timer = Instant::now();
        let previous = context.previous_feedback.last();

        if !self.use_rule_based {
            for provider in &self.providers {
                match provider.score(context, milestone_id).await {
                    Ok(raw) => {
                        let result = raw
                            .normalize(&context.expected_concepts)
                            .with_graded_by(provider.graded_by());
                        let result = feedback::apply(result, previous);

                        metrics::counter!(
                            "grading_requests_total",
                            "provider" => provider.name(),
                            "status" => "success"
                        )
                        .increment(1);
                        metrics::histogram!("grading_duration_seconds")
                            .record(timer.elapsed().as_secs_f64());

                        tracing::info!(
                            grading_id = %grading_id,
                            provider = provider.name(),
                            final_score = result.final_score,
                            passed = result.passed,
                            attempt = context.attempt_number,
                            "Grading completed"
                        );
                        return Ok(result);
                    }
                    Err(err) if err.is_skip() => {
                        tracing::debug!(
                            grading_id = %grading_id,
                            provider = provider.name(),
                            reason = %err,
                            "Provider skipped"
                        );
                    }
                    Err(err) => {
                        metrics::counter!(
                            "grading_requests_total",
                            "provider" => provider.name(),
                            "status" => "failed"
                        )
                        .increment(1);
                        tracing::warn!(
                            grading_id = %grading_id,
                            provider = provider.name(),
                            error = %err,
                            "Provider failed; trying next in chain"
                        );
                    }
                }
            }
        }

        let result = self
            .heuristic
            .score(context)
            .normalize(&context.expected_concepts)
            .with_graded_by(GradedBy::Heuristic);
        let result = feedback::apply(result, previous);

        metrics::counter!(
            "grading_requests_total",
            "provider" => "heuristic",
            "status" => "success"
        )
        .increment(1);
        metrics::histogram!("grading_duration_seconds").record(timer.elapsed().as_secs_f64());

        tracing::info!(
            grading_id = %grading_id,
            provider = "heuristic",
            final_score = result.final_score,
            passed = result.passed,
            attempt = context.attempt_number,
            "Grading completed"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::schemas::grading::{weighted_final_score, FeedbackType};
    use crate::services::provider::ProviderError;

    struct FailingProvider {
        name: &'static str,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ScoringProvider for FailingProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        fn graded_by(&self) -> GradedBy {
            GradedBy::FallbackLlm
        }

        async fn score(
            &self,
            _context: &GradingContext,
            _milestone_id: Option<&str>,
        ) -> Result<GradingResult, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::Status { status: 503, body: "unavailable".to_string() })
        }
    }

    struct SucceedingProvider;

    #[async_trait]
    impl ScoringProvider for SucceedingProvider {
        fn name(&self) -> &'static str {
            "external_agent"
        }

        fn graded_by(&self) -> GradedBy {
            GradedBy::ExternalAgent
        }

        async fn score(
            &self,
            context: &GradingContext,
            _milestone_id: Option<&str>,
        ) -> Result<GradingResult, ProviderError> {
            // Deliberately inconsistent final score; normalization must fix it.
            let mut result = HeuristicScorer::new().score(context);
            result.context_relevance_score = 90.0;
            result.understanding_depth_score = 80.0;
            result.completeness_score = 70.0;
            result.final_score = 1.0;
            result.concepts_identified.push("hallucinated".to_string());
            Ok(result)
        }
    }

    fn context() -> GradingContext {
        GradingContext {
            assignment_title: "SwiftUI Navigation Basics".to_string(),
            assignment_domain: "mobile_development".to_string(),
            milestone_title: "Screen-to-screen navigation".to_string(),
            competency_requirement: "Explain how you will navigate between screens".to_string(),
            expected_concepts: vec!["navigation".to_string(), "state management".to_string()],
            student_answer: "I need to create a SwiftUI app with navigation between screens and \
                             use @State for managing data"
                .to_string(),
            attempt_number: 1,
            previous_feedback: vec![],
            user_instructions: None,
            difficulty_level: None,
        }
    }

    #[tokio::test]
    async fn falls_back_to_heuristic_when_every_provider_fails() {
        let calls = Arc::new(AtomicUsize::new(0));
        let service = GradingService::with_providers(
            vec![
                Box::new(FailingProvider { name: "external_agent", calls: calls.clone() }),
                Box::new(FailingProvider { name: "fallback_llm", calls: calls.clone() }),
            ],
            false,
        );

        let result = service
            .grade_student_response(&context(), Some("m-42"))
            .await
            .expect("grading never fails on valid input");

        assert_eq!(result.graded_by, GradedBy::Heuristic);
        assert!(result.passed);
        // Each provider is attempted exactly once; this is a fallback chain,
        // not a retry loop.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            result.final_score,
            weighted_final_score(
                result.context_relevance_score,
                result.understanding_depth_score,
                result.completeness_score,
            )
        );
    }

    #[tokio::test]
    async fn first_successful_provider_wins_and_is_normalized() {
        let calls = Arc::new(AtomicUsize::new(0));
        let service = GradingService::with_providers(
            vec![
                Box::new(SucceedingProvider),
                Box::new(FailingProvider { name: "fallback_llm", calls: calls.clone() }),
            ],
            false,
        );

        let result =
            service.grade_student_response(&context(), Some("m-42")).await.expect("graded");

        assert_eq!(result.graded_by, GradedBy::ExternalAgent);
        // round(0.5*90 + 0.3*80 + 0.2*70) = 83, not the provider's bogus 1.
        assert_eq!(result.final_score, 83.0);
        assert!(result.passed);
        assert!(!result.concepts_identified.contains(&"hallucinated".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn rule_based_mode_skips_providers_entirely() {
        let calls = Arc::new(AtomicUsize::new(0));
        let service = GradingService::with_providers(
            vec![Box::new(FailingProvider { name: "external_agent", calls: calls.clone() })],
            true,
        );

        let result = service.grade_student_response(&context(), None).await.expect("graded");
        assert_eq!(result.graded_by, GradedBy::Heuristic);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invalid_context_is_the_only_error() {
        let service = GradingService::with_providers(vec![], false);
        let mut invalid = context();
        invalid.assignment_title = String::new();

        let err = service.grade_student_response(&invalid, None).await.expect_err("invalid");
        assert!(err.errors().field_errors().contains_key("assignment_title"));
    }

    #[tokio::test]
    async fn off_topic_answer_fails_through_the_full_pipeline() {
        let service = GradingService::with_providers(vec![], false);
        let mut ctx = context();
        ctx.assignment_domain = "web_development".to_string();
        ctx.expected_concepts = vec!["react".to_string(), "api".to_string()];
        ctx.student_answer =
            "I will implement a binary search tree with AVL balancing and depth-first traversal"
                .to_string();

        let result = service.grade_student_response(&ctx, None).await.expect("graded");
        assert!(matches!(
            result.feedback_type,
            FeedbackType::CompletelyOffTopic | FeedbackType::ContextMismatch
        ));
        assert!(!result.passed);
        assert!(result.final_score <= 25.0);
    }

    #[tokio::test]
    async fn previous_attempt_produces_trend_commentary() {
        let service = GradingService::with_providers(vec![], false);

        let mut first_ctx = context();
        first_ctx.student_answer = "I will use navigation somehow".to_string();
        let first = service.grade_student_response(&first_ctx, None).await.expect("first");

        let mut second_ctx = context();
        second_ctx.attempt_number = 2;
        second_ctx.previous_feedback = vec![first.clone()];
        let second = service.grade_student_response(&second_ctx, None).await.expect("second");

        assert!(second.understanding_depth_score > first.understanding_depth_score);
        assert!(
            second.improvement_suggestions[0].contains("improved"),
            "expected a trend remark first, got {:?}",
            second.improvement_suggestions
        );
    }
}
