//! Rule-based grading: the terminal fallback of the provider chain and the
//! default scorer when rule-based-only grading is configured. Pure functions
//! of the grading context; no I/O, no randomness, identical input gives
//! byte-identical output.

mod topics;

use crate::schemas::context::GradingContext;
use crate::schemas::grading::{
    is_passing, weighted_final_score, DetailedFeedback, FeedbackType, GradedBy, GradingResult,
    LearningIndicators, RELEVANCE_FLOOR,
};

use self::topics::{
    domain_categories, has_programming_vocab, keyword_matches, relevance_keywords, TopicCategory,
    WRONG_TOPIC_SETS,
};

/// Matches in a wrong-topic table needed before an answer is gated off topic.
const GATE_MATCH_THRESHOLD: usize = 3;
/// Answer length above which the generous relevance floor applies.
const SUBSTANTIAL_ANSWER_CHARS: usize = 50;

#[derive(Debug, Clone, Default)]
pub(crate) struct HeuristicScorer;

impl HeuristicScorer {
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) fn score(&self, context: &GradingContext) -> GradingResult {
        let answer = context.student_answer.trim();
        let answer_lower = answer.to_lowercase();
        let answer_chars = answer.chars().count();
        let categories = domain_categories(&context.assignment_domain);

        if let Some(off_topic) = detect_wrong_topic(&answer_lower, answer_chars, &categories) {
            return off_topic_result(context, off_topic);
        }

        let relevance = relevance_score(&answer_lower, answer_chars, &categories);
        let depth = depth_score(&answer_lower, answer_chars, context.attempt_number);
        let (completeness, concepts_identified, concepts_missing) =
            completeness_score(&answer_lower, answer_chars, &context.expected_concepts);

        let final_score = weighted_final_score(relevance, depth, completeness);
        let passed = is_passing(final_score, relevance);
        let feedback_type = FeedbackType::from_scores(final_score, relevance);

        let detailed_feedback = build_feedback(
            context,
            relevance,
            depth,
            completeness,
            answer_chars,
            &concepts_missing,
        );
        let improvement_suggestions = detailed_feedback.suggestions.clone();
        let next_steps = next_steps(passed, &concepts_missing);

        GradingResult {
            context_relevance_score: relevance,
            understanding_depth_score: depth,
            completeness_score: completeness,
            final_score,
            passed,
            feedback_type,
            concepts_identified,
            detailed_feedback,
            improvement_suggestions,
            next_steps,
            learning_indicators: LearningIndicators::from_final_score(final_score),
            graded_by: GradedBy::Heuristic,
        }
    }
}

/// Returns the offending category when the wrong-topic gate fires. The gate
/// always wins over normal scoring.
fn detect_wrong_topic(
    answer_lower: &str,
    answer_chars: usize,
    categories: &[TopicCategory],
) -> Option<TopicCategory> {
    let general_domain = categories.contains(&TopicCategory::General);
    if general_domain
        && answer_chars > SUBSTANTIAL_ANSWER_CHARS
        && has_programming_vocab(answer_lower)
    {
        // Generic domains get the benefit of the doubt on substantial,
        // clearly-programming answers.
        return None;
    }

    for (category, keywords) in WRONG_TOPIC_SETS {
        if categories.contains(category) {
            continue;
        }
        if keyword_matches(answer_lower, keywords) >= GATE_MATCH_THRESHOLD {
            return Some(*category);
        }
    }
    None
}

fn off_topic_result(context: &GradingContext, category: TopicCategory) -> GradingResult {
    let suggestions = vec![
        format!(
            "Your answer discusses {} topics, but this milestone is about {}.",
            category_label(category),
            context.assignment_domain
        ),
        format!("Re-read the requirement: {}", context.competency_requirement),
    ];

    GradingResult {
        context_relevance_score: 5.0,
        understanding_depth_score: 5.0,
        completeness_score: 5.0,
        final_score: 5.0,
        passed: false,
        feedback_type: FeedbackType::CompletelyOffTopic,
        concepts_identified: vec![],
        detailed_feedback: DetailedFeedback {
            context_feedback: format!(
                "This answer does not address \"{}\"; it reads as {} material.",
                context.milestone_title,
                category_label(category)
            ),
            understanding_feedback: "Understanding cannot be assessed from an unrelated answer."
                .to_string(),
            completeness_feedback: "None of the expected concepts appear in the answer."
                .to_string(),
            suggestions: suggestions.clone(),
            encouragement: "Take another look at the assignment and try again.".to_string(),
        },
        improvement_suggestions: suggestions,
        next_steps: vec![format!(
            "Revisit the {} material for this assignment before your next attempt.",
            context.assignment_domain
        )],
        learning_indicators: LearningIndicators::from_final_score(5.0),
        graded_by: GradedBy::Heuristic,
    }
}

fn category_label(category: TopicCategory) -> &'static str {
    match category {
        TopicCategory::MobileDevelopment => "mobile development",
        TopicCategory::WebDevelopment => "web development",
        TopicCategory::DataStructures => "data structures and algorithms",
        TopicCategory::BackendDevelopment => "backend development",
        TopicCategory::MachineLearning => "machine learning",
        TopicCategory::General => "general programming",
    }
}

fn relevance_score(
    answer_lower: &str,
    answer_chars: usize,
    categories: &[TopicCategory],
) -> f64 {
    let keywords = relevance_keywords(categories);
    let matches = keyword_matches(answer_lower, &keywords);

    let mut score = if matches == 0 { 15.0 } else { (30.0 + 14.0 * matches as f64).min(100.0) };

    // Substantial answers that talk about programming at all get a generous
    // floor; false negatives on relevance are worse than false positives.
    if answer_chars > SUBSTANTIAL_ANSWER_CHARS && has_programming_vocab(answer_lower) {
        score = score.max(80.0);
    }

    score
}

fn depth_score(answer_lower: &str, answer_chars: usize, attempt_number: u32) -> f64 {
    let mut score: f64 = if answer_chars > 100 {
        75.0
    } else if answer_chars > 50 {
        65.0
    } else if answer_chars > 20 {
        50.0
    } else {
        30.0
    };

    if attempt_number > 1 {
        score += 5.0;
    }
    if has_programming_vocab(answer_lower) {
        score += 10.0;
    }

    score.min(100.0)
}

/// Returns (score, concepts found, concepts missing). Concepts keep the
/// caller's casing; matching is case-insensitive substring containment.
fn completeness_score(
    answer_lower: &str,
    answer_chars: usize,
    expected_concepts: &[String],
) -> (f64, Vec<String>, Vec<String>) {
    if expected_concepts.is_empty() {
        let score = if answer_chars > 100 {
            90.0
        } else if answer_chars > 50 {
            80.0
        } else {
            60.0
        };
        return (score, vec![], vec![]);
    }

    let mut found = Vec::new();
    let mut missing = Vec::new();
    for concept in expected_concepts {
        if answer_lower.contains(&concept.to_lowercase()) {
            if !found.contains(concept) {
                found.push(concept.clone());
            }
        } else if !missing.contains(concept) {
            missing.push(concept.clone());
        }
    }

    let total = found.len() + missing.len();
    let mut score = (found.len() as f64 / total as f64) * 100.0;
    if found.len() * 2 >= total {
        score = (score + 20.0).min(100.0);
    }

    (score, found, missing)
}

fn build_feedback(
    context: &GradingContext,
    relevance: f64,
    depth: f64,
    completeness: f64,
    answer_chars: usize,
    concepts_missing: &[String],
) -> DetailedFeedback {
    let context_feedback = if relevance >= 80.0 {
        format!("Your answer clearly addresses the {} assignment.", context.assignment_domain)
    } else if relevance >= RELEVANCE_FLOOR {
        "Your answer is on topic but could connect more directly to the assignment.".to_string()
    } else {
        format!(
            "Your answer does not engage with what \"{}\" is asking for.",
            context.milestone_title
        )
    };

    let understanding_feedback = if depth >= 75.0 {
        "You explain your approach in enough detail to show real understanding.".to_string()
    } else if depth >= 50.0 {
        "There is some reasoning here, but the explanation stays on the surface.".to_string()
    } else {
        "The answer is too brief to demonstrate understanding.".to_string()
    };

    let completeness_feedback = if concepts_missing.is_empty() {
        if completeness >= 80.0 {
            "You covered the expected ground.".to_string()
        } else {
            "The answer covers the basics but stays thin.".to_string()
        }
    } else {
        format!("Not yet covered: {}.", concepts_missing.join(", "))
    };

    let mut suggestions = Vec::new();
    if !concepts_missing.is_empty() {
        suggestions
            .push(format!("Work the following into your answer: {}.", concepts_missing.join(", ")));
    }
    if answer_chars <= SUBSTANTIAL_ANSWER_CHARS {
        suggestions.push("Expand your answer with a concrete example.".to_string());
    }
    if relevance < RELEVANCE_FLOOR {
        suggestions.push(format!(
            "Re-read the requirement and respond to it directly: {}",
            context.competency_requirement
        ));
    }
    if suggestions.is_empty() {
        suggestions.push("Push one step further: explain why your approach works.".to_string());
    }

    let encouragement = if context.attempt_number > 1 {
        format!("Attempt {} shows persistence; keep refining.", context.attempt_number)
    } else {
        "Good start; build on this.".to_string()
    };

    DetailedFeedback {
        context_feedback,
        understanding_feedback,
        completeness_feedback,
        suggestions,
        encouragement,
    }
}

fn next_steps(passed: bool, concepts_missing: &[String]) -> Vec<String> {
    let mut steps = Vec::new();
    if passed {
        steps.push("Move on to the next milestone in this pathway.".to_string());
        steps.push("Try applying the same idea in a small practice project.".to_string());
    } else if !concepts_missing.is_empty() {
        steps.push(format!("Review these concepts before retrying: {}.", concepts_missing.join(", ")));
    } else {
        steps.push("Revise your answer and attempt the checkpoint again.".to_string());
    }
    steps
}

/// Ratio of the answer's 3-word shingles that also occur in the source text.
/// Used by the concept-explanation evaluator to flag copied explanations.
pub(crate) fn shingle_overlap(answer: &str, source: &str) -> f64 {
    let answer_shingles = shingles(answer);
    if answer_shingles.is_empty() {
        return 0.0;
    }
    let source_shingles = shingles(source);
    if source_shingles.is_empty() {
        return 0.0;
    }

    let matched =
        answer_shingles.iter().filter(|shingle| source_shingles.contains(*shingle)).count();
    matched as f64 / answer_shingles.len() as f64
}

fn shingles(text: &str) -> Vec<String> {
    let words: Vec<String> = text
        .to_lowercase()
        .split_whitespace()
        .map(|word| word.trim_matches(|ch: char| !ch.is_alphanumeric()).to_string())
        .filter(|word| !word.is_empty())
        .collect();

    if words.len() < 3 {
        return vec![];
    }
    words.windows(3).map(|window| window.join(" ")).collect()
}
