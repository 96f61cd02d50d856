use serde::{Deserialize, Serialize};

/// Minimum weighted score required to pass a checkpoint.
pub const PASS_SCORE: f64 = 70.0;
/// Minimum context relevance required to pass, regardless of the final score.
pub const RELEVANCE_FLOOR: f64 = 60.0;

const RELEVANCE_WEIGHT: f64 = 0.5;
const DEPTH_WEIGHT: f64 = 0.3;
const COMPLETENESS_WEIGHT: f64 = 0.2;

pub fn weighted_final_score(relevance: f64, depth: f64, completeness: f64) -> f64 {
    (relevance * RELEVANCE_WEIGHT + depth * DEPTH_WEIGHT + completeness * COMPLETENESS_WEIGHT)
        .round()
}

pub fn is_passing(final_score: f64, relevance: f64) -> bool {
    final_score >= PASS_SCORE && relevance >= RELEVANCE_FLOOR
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackType {
    Excellent,
    GoodProgress,
    NeedsImprovement,
    ContextMismatch,
    CompletelyOffTopic,
}

impl FeedbackType {
    /// Bucket for a normally-scored result. The off-topic short circuit is
    /// assigned directly by the topic gate, never derived here.
    pub(crate) fn from_scores(final_score: f64, relevance: f64) -> Self {
        if relevance < RELEVANCE_FLOOR {
            FeedbackType::ContextMismatch
        } else if final_score >= 90.0 {
            FeedbackType::Excellent
        } else if final_score >= PASS_SCORE {
            FeedbackType::GoodProgress
        } else {
            FeedbackType::NeedsImprovement
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FeedbackType::Excellent => "excellent",
            FeedbackType::GoodProgress => "good_progress",
            FeedbackType::NeedsImprovement => "needs_improvement",
            FeedbackType::ContextMismatch => "context_mismatch",
            FeedbackType::CompletelyOffTopic => "completely_off_topic",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradedBy {
    ExternalAgent,
    FallbackLlm,
    Heuristic,
}

impl GradedBy {
    pub fn as_str(self) -> &'static str {
        match self {
            GradedBy::ExternalAgent => "external_agent",
            GradedBy::FallbackLlm => "fallback_llm",
            GradedBy::Heuristic => "heuristic",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetailedFeedback {
    #[serde(default)]
    pub context_feedback: String,
    #[serde(default)]
    pub understanding_feedback: String,
    #[serde(default)]
    pub completeness_feedback: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub encouragement: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConceptGrasp {
    Developing,
    Solid,
    Advanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationSkill {
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriticalThinking {
    Basic,
    Developing,
    Strong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningIndicators {
    pub concept_grasp: ConceptGrasp,
    pub application_skill: ApplicationSkill,
    pub critical_thinking: CriticalThinking,
}

impl LearningIndicators {
    /// Score-sensitive defaults used both by the heuristic scorer and when a
    /// provider omits the field entirely.
    pub(crate) fn from_final_score(final_score: f64) -> Self {
        let concept_grasp =
            if final_score >= 80.0 { ConceptGrasp::Solid } else { ConceptGrasp::Developing };
        let application_skill = if final_score >= 90.0 {
            ApplicationSkill::Advanced
        } else if final_score >= 75.0 {
            ApplicationSkill::Intermediate
        } else {
            ApplicationSkill::Beginner
        };
        let critical_thinking = if final_score >= 85.0 {
            CriticalThinking::Strong
        } else if final_score >= PASS_SCORE {
            CriticalThinking::Developing
        } else {
            CriticalThinking::Basic
        };

        Self { concept_grasp, application_skill, critical_thinking }
    }
}

impl Default for LearningIndicators {
    fn default() -> Self {
        Self::from_final_score(0.0)
    }
}

/// Canonical grading outcome for a milestone attempt. Immutable once returned;
/// callers own the attempt history this gets appended to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingResult {
    pub context_relevance_score: f64,
    pub understanding_depth_score: f64,
    pub completeness_score: f64,
    pub final_score: f64,
    pub passed: bool,
    pub feedback_type: FeedbackType,
    #[serde(default)]
    pub concepts_identified: Vec<String>,
    #[serde(default)]
    pub detailed_feedback: DetailedFeedback,
    #[serde(default)]
    pub improvement_suggestions: Vec<String>,
    #[serde(default)]
    pub next_steps: Vec<String>,
    #[serde(default)]
    pub learning_indicators: LearningIndicators,
    #[serde(default = "default_graded_by")]
    pub graded_by: GradedBy,
}

fn default_graded_by() -> GradedBy {
    GradedBy::Heuristic
}

impl GradingResult {
    /// Re-derives every field the invariants constrain. Applied to each
    /// provider payload so an LLM cannot return a result where the weighted
    /// final score, the pass rule, or the concept subset do not hold.
    pub(crate) fn normalize(mut self, expected_concepts: &[String]) -> Self {
        self.context_relevance_score = clamp_score(self.context_relevance_score);
        self.understanding_depth_score = clamp_score(self.understanding_depth_score);
        self.completeness_score = clamp_score(self.completeness_score);

        self.final_score = weighted_final_score(
            self.context_relevance_score,
            self.understanding_depth_score,
            self.completeness_score,
        );
        self.passed = is_passing(self.final_score, self.context_relevance_score);

        if self.context_relevance_score < RELEVANCE_FLOOR {
            if self.feedback_type != FeedbackType::CompletelyOffTopic {
                self.feedback_type = FeedbackType::ContextMismatch;
            }
        } else if matches!(
            self.feedback_type,
            FeedbackType::ContextMismatch | FeedbackType::CompletelyOffTopic
        ) {
            self.feedback_type =
                FeedbackType::from_scores(self.final_score, self.context_relevance_score);
        }

        self.concepts_identified = intersect_concepts(&self.concepts_identified, expected_concepts);
        self
    }

    pub(crate) fn with_graded_by(mut self, graded_by: GradedBy) -> Self {
        self.graded_by = graded_by;
        self
    }
}

fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}

/// Keeps only concepts that actually appear in the expected list, preserving
/// the expected list's casing and order, without duplicates.
fn intersect_concepts(identified: &[String], expected: &[String]) -> Vec<String> {
    let identified_lower: Vec<String> =
        identified.iter().map(|concept| concept.to_lowercase()).collect();

    let mut kept = Vec::new();
    for concept in expected {
        let lower = concept.to_lowercase();
        if identified_lower.contains(&lower) && !kept.contains(concept) {
            kept.push(concept.clone());
        }
    }
    kept
}
