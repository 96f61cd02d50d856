pub mod core;
pub mod schemas;
pub mod services;

pub use crate::core::config::Settings;
pub use crate::schemas::{
    AssessmentResult, CodeReview, ConceptExplanation, ContextValidationError, FeedbackType,
    GradedBy, GradingContext, GradingResult, SkillAssessment, SkillQuestion, SkillResponse,
};
pub use crate::services::assessment::AssessmentService;
pub use crate::services::grading::GradingService;

use anyhow::Context;

/// CLI entry: grade one context document and print the result as JSON.
/// Usage: `grade <context.json> [milestone-id]`.
pub async fn run_grader() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    core::telemetry::init_tracing(&settings)?;

    let mut args = std::env::args().skip(1);
    let path = args.next().context("usage: grade <context.json> [milestone-id]")?;
    let milestone_id = args.next();

    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read context file {path}"))?;
    let context: GradingContext =
        serde_json::from_str(&raw).context("Context file is not a valid grading context")?;

    let service = GradingService::from_settings(&settings)?;

    tracing::info!(
        path = %path,
        milestone_id = milestone_id.as_deref().unwrap_or("-"),
        environment = settings.runtime().environment.as_str(),
        "Grading context document"
    );

    let result = service.grade_student_response(&context, milestone_id.as_deref()).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}
