//! The competency-assessment path: concept explanations, skill checks, and
//! code reviews. Parallel to milestone grading but with its own result
//! schema and an 80-point pass bar. Tries the LLM when one is configured,
//! falls back to rule-based scoring, and always resolves for valid input.

use anyhow::Result;
use validator::Validate;

use crate::core::config::Settings;
use crate::schemas::assessment::{
    AssessmentResult, CodeReview, ConceptExplanation, SkillAssessment, SkillResponse,
    PLAGIARISM_RATIO,
};
use crate::schemas::context::ContextValidationError;
use crate::services::heuristics::shingle_overlap;
use crate::services::llm_client::LlmClient;
use crate::services::prompt::{build_code_review_prompt, build_concept_prompt, build_skill_prompt};
use crate::services::response::parse_assessment_result;

/// Fixed partial credit for a wrong but answered multiple-choice question.
const PARTIAL_CREDIT: f64 = 20.0;

/// Review aspects a thorough code review is expected to touch.
const REVIEW_ASPECTS: &[(&str, &[&str])] = &[
    ("correctness", &["bug", "error", "incorrect", "fix", "crash", "edge case", "off-by-one"]),
    ("performance", &["performance", "slow", "complexity", "optimiz", "allocation", "cache"]),
    ("readability", &["readab", "naming", "rename", "clarity", "comment", "style", "confusing"]),
    ("testing", &["test", "coverage", "assert", "regression"]),
    ("security", &["security", "injection", "unsafe", "validate", "sanitiz", "overflow"]),
];

pub struct AssessmentService {
    llm: Option<LlmClient>,
    use_rule_based: bool,
}

impl AssessmentService {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let llm = if settings.llm().is_configured() {
            Some(LlmClient::from_settings(settings)?)
        } else {
            None
        };

        Ok(Self { llm, use_rule_based: settings.grading().use_rule_based })
    }

    #[cfg(test)]
    pub(crate) fn rule_based_only() -> Self {
        Self { llm: None, use_rule_based: true }
    }

    pub async fn evaluate_concept_explanation(
        &self,
        submission: &ConceptExplanation,
        assignment_content: Option<&str>,
    ) -> Result<AssessmentResult, ContextValidationError> {
        submission.validate()?;

        if let Some(llm_result) = self
            .try_llm(
                "concept_explanation",
                build_concept_prompt(
                    &submission.concept,
                    &submission.domain,
                    &submission.explanation,
                    assignment_content,
                ),
            )
            .await
        {
            // The plagiarism check stays local even when the LLM grades; a
            // copied explanation fails regardless of what the model thought.
            let mut result = llm_result;
            if let Some(content) = assignment_content {
                let ratio = shingle_overlap(&submission.explanation, content);
                if ratio > PLAGIARISM_RATIO {
                    result.plagiarism_detected = true;
                    result.plagiarism_score = result.plagiarism_score.max((ratio * 100.0).round());
                }
            }
            return Ok(result.normalize());
        }

        Ok(score_concept_explanation(submission, assignment_content).normalize())
    }

    pub async fn evaluate_skill_assessment(
        &self,
        submission: &SkillAssessment,
    ) -> Result<AssessmentResult, ContextValidationError> {
        submission.validate()?;

        if let Some(result) = self.try_llm("skill_assessment", build_skill_prompt(submission)).await
        {
            return Ok(result.normalize());
        }

        Ok(score_skill_assessment(submission).normalize())
    }

    pub async fn evaluate_code_review(
        &self,
        submission: &CodeReview,
    ) -> Result<AssessmentResult, ContextValidationError> {
        submission.validate()?;

        if let Some(result) = self.try_llm("code_review", build_code_review_prompt(submission)).await
        {
            return Ok(result.normalize());
        }

        Ok(score_code_review(submission).normalize())
    }

    /// One LLM attempt, no retries. Any failure is logged and the rule-based
    /// scorer takes over.
    async fn try_llm(&self, kind: &'static str, prompt: String) -> Option<AssessmentResult> {
        if self.use_rule_based {
            return None;
        }
        let llm = self.llm.as_ref()?;

        match llm.generate_json(&prompt).await.and_then(|value| parse_assessment_result(&value)) {
            Ok(result) => {
                metrics::counter!(
                    "assessment_requests_total",
                    "kind" => kind,
                    "status" => "success"
                )
                .increment(1);
                Some(result)
            }
            Err(err) => {
                metrics::counter!(
                    "assessment_requests_total",
                    "kind" => kind,
                    "status" => "failed"
                )
                .increment(1);
                tracing::warn!(kind, error = %err, "LLM assessment failed; using rule-based scoring");
                None
            }
        }
    }
}

fn score_concept_explanation(
    submission: &ConceptExplanation,
    assignment_content: Option<&str>,
) -> AssessmentResult {
    let explanation = submission.explanation.trim();
    let explanation_lower = explanation.to_lowercase();
    let chars = explanation.chars().count();
    let mentions_concept = explanation_lower.contains(&submission.concept.to_lowercase());

    let comprehension = if chars > 150 {
        85.0
    } else if chars > 80 {
        75.0
    } else if chars > 30 {
        60.0
    } else {
        35.0
    };

    let topic_relevance = if mentions_concept {
        85.0
    } else if chars > 30 {
        60.0
    } else {
        30.0
    };

    let mut accuracy = 55.0;
    if mentions_concept {
        accuracy += 15.0;
    }
    if explanation_lower.contains("because")
        || explanation_lower.contains("so that")
        || explanation_lower.contains("for example")
    {
        accuracy += 15.0;
    }

    let (originality, plagiarism_detected, plagiarism_score) = match assignment_content {
        Some(content) => {
            let ratio = shingle_overlap(explanation, content);
            let detected = ratio > PLAGIARISM_RATIO;
            (((1.0 - ratio) * 100.0).round(), detected, (ratio * 100.0).round())
        }
        None => (90.0, false, 0.0),
    };

    let score = ((comprehension + accuracy + originality) / 3.0).round();

    let mut strengths = Vec::new();
    let mut weaknesses = Vec::new();
    let mut recommendations = Vec::new();

    if mentions_concept {
        strengths.push(format!("Engages directly with \"{}\".", submission.concept));
    } else {
        weaknesses.push(format!("Never names or defines \"{}\".", submission.concept));
        recommendations.push("Anchor the explanation on the concept itself.".to_string());
    }
    if chars > 80 {
        strengths.push("Substantial explanation in the student's own words.".to_string());
    } else {
        weaknesses.push("The explanation is too short to show understanding.".to_string());
        recommendations.push("Expand the explanation with an example.".to_string());
    }
    if plagiarism_detected {
        weaknesses.push("Large portions match the assignment text verbatim.".to_string());
        recommendations.push("Rewrite the explanation entirely in your own words.".to_string());
    }

    let feedback = if plagiarism_detected {
        "The explanation overlaps heavily with the source material; it cannot be accepted."
            .to_string()
    } else if score >= 80.0 {
        "A clear explanation that demonstrates real understanding.".to_string()
    } else {
        "The explanation needs more substance before this concept counts as understood."
            .to_string()
    };

    AssessmentResult {
        score,
        topic_relevance_score: Some(topic_relevance),
        comprehension_score: comprehension,
        accuracy_score: accuracy.min(100.0),
        originality_score: originality,
        plagiarism_detected,
        plagiarism_score,
        feedback,
        strengths,
        weaknesses,
        recommendations,
        is_passed: false,
        detailed_analysis: format!(
            "comprehension {comprehension}, accuracy {accuracy}, originality {originality}"
        ),
    }
}

fn score_skill_assessment(submission: &SkillAssessment) -> AssessmentResult {
    let mut question_scores = Vec::new();
    let mut choice_scores = Vec::new();
    let mut text_scores = Vec::new();
    let mut weaknesses = Vec::new();

    for question in &submission.questions {
        let score = match &question.response {
            SkillResponse::MultipleChoice { selected, correct } => {
                let score = match selected {
                    Some(choice) if choice == correct => 100.0,
                    Some(_) => PARTIAL_CREDIT,
                    None => 0.0,
                };
                if score < 100.0 {
                    weaknesses.push(format!("Missed: {}", question.prompt));
                }
                choice_scores.push(score);
                score
            }
            SkillResponse::FreeText { answer, expected_keywords } => {
                let score = score_free_text(answer, expected_keywords);
                if score < 60.0 {
                    weaknesses.push(format!("Thin answer: {}", question.prompt));
                }
                text_scores.push(score);
                score
            }
        };
        question_scores.push(score);
    }

    let score = mean(&question_scores).round();
    let accuracy = choice_scores
        .is_empty()
        .then(|| score)
        .unwrap_or_else(|| mean(&choice_scores).round());
    let comprehension =
        text_scores.is_empty().then(|| score).unwrap_or_else(|| mean(&text_scores).round());

    let feedback = if score >= 80.0 {
        "Strong performance across the skill check.".to_string()
    } else {
        "Several questions need another pass before this skill is demonstrated.".to_string()
    };

    AssessmentResult {
        score,
        topic_relevance_score: None,
        comprehension_score: comprehension,
        accuracy_score: accuracy,
        originality_score: 100.0,
        plagiarism_detected: false,
        plagiarism_score: 0.0,
        feedback,
        strengths: if weaknesses.is_empty() {
            vec!["Every question answered well.".to_string()]
        } else {
            vec![]
        },
        weaknesses,
        recommendations: if score >= 80.0 {
            vec![]
        } else {
            vec!["Review the missed questions and retake the assessment.".to_string()]
        },
        is_passed: false,
        detailed_analysis: format!("{} questions scored", question_scores.len()),
    }
}

fn score_free_text(answer: &str, expected_keywords: &[String]) -> f64 {
    let answer_lower = answer.to_lowercase();
    let chars = answer.trim().chars().count();

    if expected_keywords.is_empty() {
        return if chars > 100 {
            80.0
        } else if chars > 50 {
            65.0
        } else if chars > 20 {
            45.0
        } else {
            20.0
        };
    }

    let hits = expected_keywords
        .iter()
        .filter(|keyword| answer_lower.contains(&keyword.to_lowercase()))
        .count();
    let coverage = (hits as f64 / expected_keywords.len() as f64) * 80.0;
    let length_bonus = if chars > 50 { 20.0 } else { 0.0 };
    (coverage + length_bonus).min(100.0)
}

fn score_code_review(submission: &CodeReview) -> AssessmentResult {
    let review_lower = submission.review.to_lowercase();
    let chars = submission.review.trim().chars().count();

    let mut covered = Vec::new();
    let mut missed = Vec::new();
    for (aspect, keywords) in REVIEW_ASPECTS {
        if keywords.iter().any(|keyword| review_lower.contains(keyword)) {
            covered.push(*aspect);
        } else {
            missed.push(*aspect);
        }
    }

    let coverage_score = (covered.len() as f64 / REVIEW_ASPECTS.len() as f64) * 100.0;
    let depth_score = if chars > 200 {
        85.0
    } else if chars > 80 {
        70.0
    } else if chars > 20 {
        50.0
    } else {
        20.0
    };

    let score = ((coverage_score + depth_score) / 2.0).round();

    AssessmentResult {
        score,
        topic_relevance_score: None,
        comprehension_score: depth_score,
        accuracy_score: coverage_score.round(),
        originality_score: 100.0,
        plagiarism_detected: false,
        plagiarism_score: 0.0,
        feedback: if score >= 80.0 {
            "A thorough review that looks at the code from several angles.".to_string()
        } else {
            "The review misses whole categories of problems; look wider.".to_string()
        },
        strengths: covered
            .iter()
            .map(|aspect| format!("Considers {aspect}."))
            .collect(),
        weaknesses: missed
            .iter()
            .map(|aspect| format!("Does not consider {aspect}."))
            .collect(),
        recommendations: if missed.is_empty() {
            vec![]
        } else {
            vec![format!("Also review the code for: {}.", missed.join(", "))]
        },
        is_passed: false,
        detailed_analysis: format!(
            "covered {} of {} review aspects",
            covered.len(),
            REVIEW_ASPECTS.len()
        ),
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
