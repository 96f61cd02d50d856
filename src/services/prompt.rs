//! Prompt rendering for the LLM providers. Pure string formatting: the same
//! context always renders the same prompt.

use validator::Validate;

use crate::schemas::assessment::{CodeReview, SkillAssessment};
use crate::schemas::context::{ContextValidationError, GradingContext};
use crate::schemas::grading::GradingResult;

const GRADING_SYSTEM_PROMPT: &str = r#"You are a strict but encouraging programming instructor.
Your task is to grade a student's answer to a competency checkpoint against the assignment context.

Grade step by step, in this order:
1. context_relevance_score (0-100): does the answer address the same subject and technology as the assignment?
2. understanding_depth_score (0-100): does the student show genuine understanding, not just restated keywords?
3. completeness_score (0-100): how many of the expected concepts does the answer cover?
4. final_score = round(0.5 * context_relevance_score + 0.3 * understanding_depth_score + 0.2 * completeness_score)
5. passed = final_score >= 70 AND context_relevance_score >= 60
6. feedback_type: one of "excellent" (>=90), "good_progress" (>=70), "needs_improvement" (<70),
   "context_mismatch" (context_relevance_score < 60), "completely_off_topic" (answer is about a different subject entirely).

Respond with strict JSON only, no prose outside the object:
{
  "context_relevance_score": <number>,
  "understanding_depth_score": <number>,
  "completeness_score": <number>,
  "final_score": <number>,
  "passed": <boolean>,
  "feedback_type": "<string>",
  "concepts_identified": ["<expected concept present in the answer>"],
  "detailed_feedback": {
    "context_feedback": "<string>",
    "understanding_feedback": "<string>",
    "completeness_feedback": "<string>",
    "suggestions": ["<string>"],
    "encouragement": "<string>"
  },
  "improvement_suggestions": ["<string>"],
  "next_steps": ["<string>"],
  "learning_indicators": {
    "concept_grasp": "developing|solid|advanced",
    "application_skill": "beginner|intermediate|advanced",
    "critical_thinking": "basic|developing|strong"
  }
}"#;

/// Fixed anchors that keep the model's scale stable between calls.
const CALIBRATION_EXAMPLES: &[(&str, &str, u32)] = &[
    (
        "mobile_development",
        "I will use a SwiftUI NavigationStack and keep screen state in @State properties, \
         passing bindings down to child views.",
        88,
    ),
    (
        "web_development",
        "Something with components I guess",
        34,
    ),
    (
        "web_development",
        "I will implement a binary search tree with AVL balancing",
        5,
    ),
];

/// Renders the full evaluation prompt for one grading call. Fails only on a
/// malformed context; the error propagates to the caller untouched.
pub(crate) fn build_evaluation_prompt(
    context: &GradingContext,
    history_limit: usize,
) -> Result<String, ContextValidationError> {
    context.validate()?;

    let expected_concepts = serde_json::to_string(&context.expected_concepts)
        .unwrap_or_else(|_| "[]".to_string());

    let mut prompt = format!(
        "{GRADING_SYSTEM_PROMPT}\n\n\
         Calibration examples (domain / answer / expected final_score):\n{}\n\n\
         Assignment: {} ({})\n\
         Milestone: {}\n\
         Requirement: {}\n\
         Expected concepts: {}\n\
         Attempt number: {}\n",
        render_calibration(),
        context.assignment_title,
        context.assignment_domain,
        context.milestone_title,
        context.competency_requirement,
        expected_concepts,
        context.attempt_number,
    );

    if let Some(difficulty) = context.difficulty_level {
        prompt.push_str(&format!("Difficulty level: {difficulty}/10\n"));
    }
    if let Some(instructions) = context.user_instructions.as_deref() {
        prompt.push_str(&format!("Additional grading instructions: {instructions}\n"));
    }

    if !context.previous_feedback.is_empty() {
        prompt.push_str("\nPrior attempts (oldest first):\n");
        prompt.push_str(&render_history(&context.previous_feedback, history_limit));
    }

    prompt.push_str(&format!("\nStudent answer:\n{}\n", context.student_answer));
    Ok(prompt)
}

fn render_calibration() -> String {
    CALIBRATION_EXAMPLES
        .iter()
        .map(|(domain, answer, score)| format!("- [{domain}] \"{answer}\" -> {score}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Condensed history: attempt index, outcome bucket, and the suggestions the
/// student was already given. The remote agent keeps its own session memory;
/// this is for the stateless fallback provider.
fn render_history(previous: &[GradingResult], limit: usize) -> String {
    let skip = previous.len().saturating_sub(limit);
    previous
        .iter()
        .enumerate()
        .skip(skip)
        .map(|(index, result)| {
            let suggestions = if result.improvement_suggestions.is_empty() {
                "none".to_string()
            } else {
                result.improvement_suggestions.join("; ")
            };
            format!(
                "- attempt {}: {} (final {}), suggestions: {}",
                index + 1,
                result.feedback_type.as_str(),
                result.final_score,
                suggestions
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

const ASSESSMENT_OUTPUT_SCHEMA: &str = r#"Respond with strict JSON only:
{"score": <number>, "topicRelevanceScore": <number>, "comprehensionScore": <number>, "accuracyScore": <number>, "originalityScore": <number>, "plagiarismDetected": <boolean>, "plagiarismScore": <number>, "feedback": "<string>", "strengths": ["<string>"], "weaknesses": ["<string>"], "recommendations": ["<string>"], "isPassed": <boolean>, "detailedAnalysis": "<string>"}
A passing assessment needs score >= 80 and no plagiarism."#;

/// Prompt for the concept-explanation assessment path.
pub(crate) fn build_concept_prompt(
    concept: &str,
    domain: &str,
    explanation: &str,
    assignment_content: Option<&str>,
) -> String {
    let mut prompt = format!(
        "You are grading a student's explanation of a concept, in their own words.\n\
         Score comprehension, accuracy, and originality from 0-100.\n\
         {ASSESSMENT_OUTPUT_SCHEMA}\n\n\
         Concept: {concept}\nDomain: {domain}\n"
    );
    if let Some(content) = assignment_content {
        prompt.push_str(&format!(
            "Assignment source text (flag explanations copied from it):\n{content}\n"
        ));
    }
    prompt.push_str(&format!("\nStudent explanation:\n{explanation}\n"));
    prompt
}

/// Prompt for the skill-assessment path; the completed questions are embedded
/// as JSON so the model sees selections and free-text answers verbatim.
pub(crate) fn build_skill_prompt(submission: &SkillAssessment) -> String {
    let questions =
        serde_json::to_string_pretty(&submission.questions).unwrap_or_else(|_| "[]".to_string());
    format!(
        "You are grading a completed skill assessment.\n\
         Grade multiple-choice answers on correctness and free-text answers on substance.\n\
         {ASSESSMENT_OUTPUT_SCHEMA}\n\n\
         Domain: {}\nCompleted questions:\n{questions}\n",
        submission.domain
    )
}

/// Prompt for the code-review assessment path.
pub(crate) fn build_code_review_prompt(submission: &CodeReview) -> String {
    format!(
        "You are grading a student's review of the code below.\n\
         Reward reviews that identify concrete problems (correctness, performance, readability, \
         testing, security) and suggest fixes.\n\
         {ASSESSMENT_OUTPUT_SCHEMA}\n\n\
         Domain: {}\n\nCode under review:\n{}\n\nStudent review:\n{}\n",
        submission.domain, submission.code, submission.review
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::grading::{FeedbackType, GradedBy};

    fn context_with_history() -> GradingContext {
        let mut previous = base_context();
        let mut history_entry = crate::services::heuristics::HeuristicScorer::new()
            .score(&previous);
        history_entry.feedback_type = FeedbackType::NeedsImprovement;
        history_entry.improvement_suggestions = vec!["Mention state management.".to_string()];
        history_entry.graded_by = GradedBy::Heuristic;
        previous.previous_feedback = vec![history_entry];
        previous.attempt_number = 2;
        previous
    }

    fn base_context() -> GradingContext {
        GradingContext {
            assignment_title: "SwiftUI Navigation Basics".to_string(),
            assignment_domain: "mobile_development".to_string(),
            milestone_title: "Screen-to-screen navigation".to_string(),
            competency_requirement: "Explain how you will navigate between screens".to_string(),
            expected_concepts: vec!["navigation".to_string()],
            student_answer: "I will use a NavigationStack".to_string(),
            attempt_number: 1,
            previous_feedback: vec![],
            user_instructions: None,
            difficulty_level: Some(4),
        }
    }

    #[test]
    fn prompt_embeds_context_and_schema() {
        let prompt = build_evaluation_prompt(&base_context(), 5).expect("prompt");
        assert!(prompt.contains("SwiftUI Navigation Basics"));
        assert!(prompt.contains("[\"navigation\"]"));
        assert!(prompt.contains("I will use a NavigationStack"));
        assert!(prompt.contains("context_relevance_score"));
        assert!(prompt.contains("Difficulty level: 4/10"));
        assert!(prompt.contains("Calibration examples"));
    }

    #[test]
    fn prompt_is_deterministic() {
        let context = base_context();
        assert_eq!(
            build_evaluation_prompt(&context, 5).expect("prompt"),
            build_evaluation_prompt(&context, 5).expect("prompt")
        );
    }

    #[test]
    fn history_is_condensed_into_the_prompt() {
        let prompt = build_evaluation_prompt(&context_with_history(), 5).expect("prompt");
        assert!(prompt.contains("Prior attempts"));
        assert!(prompt.contains("needs_improvement"));
        assert!(prompt.contains("Mention state management."));
    }

    #[test]
    fn history_respects_the_limit() {
        let mut context = context_with_history();
        let entry = context.previous_feedback[0].clone();
        context.previous_feedback = vec![entry.clone(), entry.clone(), entry];
        let prompt = build_evaluation_prompt(&context, 2).expect("prompt");
        assert!(!prompt.contains("attempt 1:"));
        assert!(prompt.contains("attempt 2:"));
        assert!(prompt.contains("attempt 3:"));
    }

    #[test]
    fn malformed_context_is_rejected() {
        let mut context = base_context();
        context.competency_requirement = "  ".to_string();
        assert!(build_evaluation_prompt(&context, 5).is_err());
    }

    #[test]
    fn concept_prompt_includes_source_when_given() {
        let prompt =
            build_concept_prompt("binding", "mobile_development", "my words", Some("source text"));
        assert!(prompt.contains("source text"));
        assert!(prompt.contains("plagiarismDetected"));
    }
}
