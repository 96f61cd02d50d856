//! Trend commentary across attempts. Pure: never mutates its inputs, builds
//! a fresh result with the remarks folded in.

use crate::schemas::grading::GradingResult;

/// Score movement below this is treated as noise, not a trend.
const TREND_DELTA: f64 = 5.0;
/// Dimensions under this get a targeted reflection prompt.
const REFLECTION_THRESHOLD: f64 = 70.0;

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct AdaptiveFeedback {
    pub(crate) trend_remarks: Vec<String>,
    pub(crate) reflection_prompts: Vec<String>,
}

/// Compares the freshly-graded result against the immediately preceding
/// attempt (if any) and derives remarks plus reflection prompts.
pub(crate) fn derive(
    current: &GradingResult,
    previous: Option<&GradingResult>,
) -> AdaptiveFeedback {
    let mut trend_remarks = Vec::new();

    if let Some(previous) = previous {
        push_trend(
            &mut trend_remarks,
            "context relevance",
            previous.context_relevance_score,
            current.context_relevance_score,
        );
        push_trend(
            &mut trend_remarks,
            "understanding",
            previous.understanding_depth_score,
            current.understanding_depth_score,
        );
        push_trend(
            &mut trend_remarks,
            "completeness",
            previous.completeness_score,
            current.completeness_score,
        );

        if current.final_score - previous.final_score >= TREND_DELTA {
            trend_remarks.push(format!(
                "Overall score moved from {} to {} since your last attempt.",
                previous.final_score, current.final_score
            ));
        }
    }

    let mut reflection_prompts = Vec::new();
    if current.context_relevance_score < REFLECTION_THRESHOLD {
        reflection_prompts.push(
            "What do you think this milestone is actually asking for, in one sentence?"
                .to_string(),
        );
    }
    if current.understanding_depth_score < REFLECTION_THRESHOLD {
        reflection_prompts
            .push("Can you explain your approach in your own words, without jargon?".to_string());
    }
    if current.completeness_score < REFLECTION_THRESHOLD {
        reflection_prompts
            .push("Which part of the expected material did your answer leave out?".to_string());
    }
    if current.passed {
        reflection_prompts.push(
            "Where else in this pathway could you apply what you just demonstrated?".to_string(),
        );
    }

    AdaptiveFeedback { trend_remarks, reflection_prompts }
}

/// Folds derived feedback into a result: trend remarks go ahead of the
/// result's own suggestions, reflection prompts extend the next steps.
pub(crate) fn apply(current: GradingResult, previous: Option<&GradingResult>) -> GradingResult {
    let adaptive = derive(&current, previous);
    let mut enriched = current;

    if !adaptive.trend_remarks.is_empty() {
        let mut suggestions = adaptive.trend_remarks;
        suggestions.extend(enriched.improvement_suggestions);
        enriched.improvement_suggestions = suggestions;
    }

    for prompt in adaptive.reflection_prompts {
        if !enriched.next_steps.contains(&prompt) {
            enriched.next_steps.push(prompt);
        }
    }

    enriched
}

fn push_trend(remarks: &mut Vec<String>, dimension: &str, before: f64, after: f64) {
    if after - before >= TREND_DELTA {
        remarks.push(format!("Your {dimension} improved since your last attempt."));
    } else if before - after >= TREND_DELTA {
        remarks.push(format!("Your {dimension} regressed since your last attempt."));
    }
}
