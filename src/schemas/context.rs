use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::{Validate, ValidationError, ValidationErrors};

use super::grading::GradingResult;

/// Malformed grading input. Propagated to the caller untouched; the fallback
/// chain only ever starts with a context that passed validation.
#[derive(Debug, Error)]
#[error("invalid grading context: {0}")]
pub struct ContextValidationError(#[from] ValidationErrors);

impl ContextValidationError {
    pub fn errors(&self) -> &ValidationErrors {
        &self.0
    }
}

/// Everything the grading pipeline knows about one attempt. Immutable per
/// call; `previous_feedback` is the caller-owned attempt history, oldest
/// first.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GradingContext {
    #[validate(custom(function = "not_blank"))]
    pub assignment_title: String,
    #[validate(custom(function = "not_blank"))]
    pub assignment_domain: String,
    #[validate(custom(function = "not_blank"))]
    pub milestone_title: String,
    #[validate(custom(function = "not_blank"))]
    pub competency_requirement: String,
    #[serde(default)]
    pub expected_concepts: Vec<String>,
    /// May legitimately be empty; an empty answer is scored, not rejected.
    #[serde(default)]
    pub student_answer: String,
    #[validate(range(min = 1, message = "attempt_number starts at 1"))]
    pub attempt_number: u32,
    #[serde(default)]
    pub previous_feedback: Vec<GradingResult>,
    #[serde(default)]
    pub user_instructions: Option<String>,
    #[validate(range(min = 1, max = 10, message = "difficulty_level is 1-10"))]
    #[serde(default)]
    pub difficulty_level: Option<u8>,
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("must not be blank"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_context() -> GradingContext {
        GradingContext {
            assignment_title: "SwiftUI Navigation Basics".to_string(),
            assignment_domain: "mobile_development".to_string(),
            milestone_title: "Screen-to-screen navigation".to_string(),
            competency_requirement: "Explain how you will navigate between screens".to_string(),
            expected_concepts: vec!["navigation".to_string(), "state management".to_string()],
            student_answer: "I will use a NavigationStack with @State".to_string(),
            attempt_number: 1,
            previous_feedback: vec![],
            user_instructions: None,
            difficulty_level: Some(3),
        }
    }

    #[test]
    fn valid_context_passes_validation() {
        valid_context().validate().expect("context should be valid");
    }

    #[test]
    fn blank_required_fields_are_rejected() {
        let mut context = valid_context();
        context.assignment_title = "   ".to_string();
        let err = context.validate().expect_err("blank title");
        assert!(err.field_errors().contains_key("assignment_title"));
    }

    #[test]
    fn attempt_number_zero_is_rejected() {
        let mut context = valid_context();
        context.attempt_number = 0;
        assert!(context.validate().is_err());
    }

    #[test]
    fn difficulty_out_of_range_is_rejected() {
        let mut context = valid_context();
        context.difficulty_level = Some(11);
        assert!(context.validate().is_err());
    }

    #[test]
    fn empty_answer_is_still_valid_input() {
        let mut context = valid_context();
        context.student_answer = String::new();
        context.validate().expect("empty answers are scored, not rejected");
    }
}
