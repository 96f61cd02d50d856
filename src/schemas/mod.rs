pub mod assessment;
pub mod context;
pub mod grading;

pub use assessment::{
    AssessmentResult, CodeReview, ConceptExplanation, SkillAssessment, SkillQuestion,
    SkillResponse, ASSESSMENT_PASS_SCORE,
};
pub use context::{ContextValidationError, GradingContext};
pub use grading::{
    DetailedFeedback, FeedbackType, GradedBy, GradingResult, LearningIndicators, PASS_SCORE,
    RELEVANCE_FLOOR,
};
