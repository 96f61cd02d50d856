use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Pass threshold for the competency-assessment path. Deliberately different
/// from the milestone grading threshold; the two schemas were never unified
/// upstream and collapsing them would silently change pass/fail behavior.
pub const ASSESSMENT_PASS_SCORE: f64 = 80.0;

/// Shingle-overlap ratio above which an explanation counts as copied from the
/// assignment text.
pub const PLAGIARISM_RATIO: f64 = 0.30;

/// Outcome of a concept-explanation, skill, or code-review evaluation.
///
/// Wire names are camelCase, unlike [`super::grading::GradingResult`]; the two
/// result families use different JSON conventions and callers depend on both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentResult {
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_relevance_score: Option<f64>,
    pub comprehension_score: f64,
    pub accuracy_score: f64,
    pub originality_score: f64,
    pub plagiarism_detected: bool,
    pub plagiarism_score: f64,
    pub feedback: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    pub is_passed: bool,
    #[serde(default)]
    pub detailed_analysis: String,
}

impl AssessmentResult {
    /// Enforces the pass rule: a plagiarism hit fails the assessment no
    /// matter what the other scores say.
    pub(crate) fn normalize(mut self) -> Self {
        self.score = self.score.clamp(0.0, 100.0);
        self.comprehension_score = self.comprehension_score.clamp(0.0, 100.0);
        self.accuracy_score = self.accuracy_score.clamp(0.0, 100.0);
        self.originality_score = self.originality_score.clamp(0.0, 100.0);
        self.plagiarism_score = self.plagiarism_score.clamp(0.0, 100.0);
        self.is_passed = self.score >= ASSESSMENT_PASS_SCORE && !self.plagiarism_detected;
        self
    }
}

/// A student's written explanation of a single concept.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ConceptExplanation {
    #[validate(custom(function = "not_blank"))]
    pub concept: String,
    #[validate(custom(function = "not_blank"))]
    pub domain: String,
    /// May be empty; an empty explanation scores near zero instead of erroring.
    #[serde(default)]
    pub explanation: String,
}

/// A completed skill check: a mix of multiple-choice and free-text questions.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SkillAssessment {
    #[validate(custom(function = "not_blank"))]
    pub domain: String,
    #[validate(length(min = 1, message = "a skill assessment needs at least one question"))]
    pub questions: Vec<SkillQuestion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillQuestion {
    pub prompt: String,
    pub response: SkillResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkillResponse {
    MultipleChoice {
        /// Index the student picked; `None` means left unanswered.
        selected: Option<usize>,
        correct: usize,
    },
    FreeText {
        answer: String,
        #[serde(default)]
        expected_keywords: Vec<String>,
    },
}

/// A student's review of a provided code sample.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CodeReview {
    #[validate(custom(function = "not_blank"))]
    pub domain: String,
    #[validate(custom(function = "not_blank"))]
    pub code: String,
    /// The review text being graded. May be empty.
    #[serde(default)]
    pub review: String,
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("must not be blank"));
    }
    Ok(())
}
