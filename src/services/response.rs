//! Turning loosely-shaped provider replies into canonical results.
//!
//! Providers disagree about where the JSON payload lives: nested under
//! `response` (as a string or an object), under `message` or `content`, or as
//! the top-level object itself. Extraction runs an ordered list of
//! strategies, and text payloads may wrap the object in markdown code fences.

use serde_json::{json, Value};

use crate::schemas::assessment::AssessmentResult;
use crate::schemas::grading::{GradingResult, LearningIndicators};
use crate::services::provider::ProviderError;

const ENVELOPE_KEYS: &[&str] = &["response", "message", "content"];

const FEEDBACK_TYPES: &[&str] = &[
    "excellent",
    "good_progress",
    "needs_improvement",
    "context_mismatch",
    "completely_off_topic",
];

/// Unwraps a provider reply to the JSON object holding the result. A
/// candidate counts only if it carries at least one of `hint_keys`, so an
/// envelope holding unrelated chatter falls through to the next strategy.
pub(crate) fn extract_payload(body: &Value, hint_keys: &[&str]) -> Result<Value, ProviderError> {
    for key in ENVELOPE_KEYS {
        if let Some(candidate) = body.get(*key).and_then(unwrap_envelope_field) {
            if matches_hint(&candidate, hint_keys) {
                return Ok(candidate);
            }
        }
    }

    if body.is_object() && matches_hint(body, hint_keys) {
        return Ok(body.clone());
    }

    Err(ProviderError::EmptyPayload)
}

fn unwrap_envelope_field(value: &Value) -> Option<Value> {
    match value {
        Value::String(text) => serde_json::from_str::<Value>(extract_json_block(text))
            .ok()
            .filter(Value::is_object),
        Value::Object(_) => Some(value.clone()),
        _ => None,
    }
}

fn matches_hint(candidate: &Value, hint_keys: &[&str]) -> bool {
    hint_keys.iter().any(|key| candidate.get(*key).is_some())
}

/// Strips markdown code fences from an LLM text reply and falls back to the
/// outermost brace span when no fence is present.
pub(crate) fn extract_json_block(content: &str) -> &str {
    if let Some(start) = content.find("```json") {
        let rest = &content[start + 7..];
        if let Some(end) = rest.find("```") {
            return rest[..end].trim();
        }
    }

    if let Some(start) = content.find("```") {
        let rest = &content[start + 3..];
        if let Some(end) = rest.find("```") {
            let candidate = rest[..end].trim();
            if candidate.starts_with('{') || candidate.starts_with('[') {
                return candidate;
            }
        }
    }

    if let (Some(start), Some(end)) = (content.find('{'), content.rfind('}')) {
        if end > start {
            return &content[start..=end];
        }
    }

    content.trim()
}

/// Validates a grading payload against the canonical schema, collecting every
/// problem before failing so a single bad reply is debuggable in one pass.
/// Optional fields absent from the payload get score-sensitive defaults.
pub(crate) fn parse_grading_result(payload: &Value) -> Result<GradingResult, ProviderError> {
    let mut issues = Vec::new();

    for field in [
        "context_relevance_score",
        "understanding_depth_score",
        "completeness_score",
        "final_score",
    ] {
        if !payload.get(field).map(Value::is_number).unwrap_or(false) {
            issues.push(format!("{field} must be a number"));
        }
    }

    if !payload.get("passed").map(Value::is_boolean).unwrap_or(false) {
        issues.push("passed must be a boolean".to_string());
    }

    match payload.get("feedback_type").and_then(Value::as_str) {
        Some(value) if FEEDBACK_TYPES.contains(&value) => {}
        Some(value) => issues.push(format!("feedback_type \"{value}\" is not a known bucket")),
        None => issues.push("feedback_type must be a string".to_string()),
    }

    if !payload.get("concepts_identified").map(Value::is_array).unwrap_or(false) {
        issues.push("concepts_identified must be an array".to_string());
    }

    if !payload.get("detailed_feedback").map(Value::is_object).unwrap_or(false) {
        issues.push("detailed_feedback must be an object".to_string());
    }

    if !issues.is_empty() {
        return Err(ProviderError::InvalidSchema { issues });
    }

    let mut patched = payload.clone();
    apply_grading_defaults(&mut patched);

    serde_json::from_value(patched).map_err(|err| ProviderError::Parse(err.to_string()))
}

fn apply_grading_defaults(payload: &mut Value) {
    let final_score = payload.get("final_score").and_then(Value::as_f64).unwrap_or(0.0);
    let passed = payload.get("passed").and_then(Value::as_bool).unwrap_or(false);

    let object = match payload.as_object_mut() {
        Some(object) => object,
        None => return,
    };

    if !object.contains_key("improvement_suggestions") {
        let suggestion = if final_score >= 80.0 {
            "Keep deepening this answer with concrete trade-offs."
        } else {
            "Revisit the assignment material and expand the weakest part of your answer."
        };
        object.insert("improvement_suggestions".to_string(), json!([suggestion]));
    }

    if !object.contains_key("next_steps") {
        let step = if passed {
            "Move on to the next milestone in this pathway."
        } else {
            "Revise your answer and attempt the checkpoint again."
        };
        object.insert("next_steps".to_string(), json!([step]));
    }

    if !object.contains_key("learning_indicators") {
        let indicators = LearningIndicators::from_final_score(final_score);
        if let Ok(value) = serde_json::to_value(indicators) {
            object.insert("learning_indicators".to_string(), value);
        }
    }
}

/// Same treatment for the assessment path's camelCase payloads.
pub(crate) fn parse_assessment_result(payload: &Value) -> Result<AssessmentResult, ProviderError> {
    let mut issues = Vec::new();

    for field in ["score", "comprehensionScore", "accuracyScore", "originalityScore"] {
        if !payload.get(field).map(Value::is_number).unwrap_or(false) {
            issues.push(format!("{field} must be a number"));
        }
    }
    if !payload.get("plagiarismDetected").map(Value::is_boolean).unwrap_or(false) {
        issues.push("plagiarismDetected must be a boolean".to_string());
    }
    if !payload.get("isPassed").map(Value::is_boolean).unwrap_or(false) {
        issues.push("isPassed must be a boolean".to_string());
    }
    if !payload.get("feedback").map(Value::is_string).unwrap_or(false) {
        issues.push("feedback must be a string".to_string());
    }

    if !issues.is_empty() {
        return Err(ProviderError::InvalidSchema { issues });
    }

    let mut patched = payload.clone();
    if let Some(object) = patched.as_object_mut() {
        object.entry("plagiarismScore".to_string()).or_insert(json!(0.0));
        object.entry("detailedAnalysis".to_string()).or_insert(json!(""));
    }

    serde_json::from_value(patched).map_err(|err| ProviderError::Parse(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::grading::{ConceptGrasp, FeedbackType};

    const GRADING_HINTS: &[&str] = &["final_score", "context_relevance_score"];

    fn grading_payload() -> Value {
        json!({
            "context_relevance_score": 85,
            "understanding_depth_score": 75,
            "completeness_score": 70,
            "final_score": 79,
            "passed": true,
            "feedback_type": "good_progress",
            "concepts_identified": ["navigation"],
            "detailed_feedback": {
                "context_feedback": "On topic.",
                "understanding_feedback": "Reasonable depth.",
                "completeness_feedback": "Covers most concepts.",
                "suggestions": ["Mention state management."],
                "encouragement": "Nice work."
            }
        })
    }

    #[test]
    fn unwraps_response_as_embedded_json_string() {
        let body = json!({ "response": grading_payload().to_string() });
        let payload = extract_payload(&body, GRADING_HINTS).expect("payload");
        assert_eq!(payload["final_score"], json!(79));
    }

    #[test]
    fn unwraps_response_as_object() {
        let body = json!({ "response": grading_payload() });
        let payload = extract_payload(&body, GRADING_HINTS).expect("payload");
        assert_eq!(payload["passed"], json!(true));
    }

    #[test]
    fn unwraps_message_and_content_envelopes() {
        for key in ["message", "content"] {
            let body = json!({ key: grading_payload() });
            let payload = extract_payload(&body, GRADING_HINTS).expect("payload");
            assert_eq!(payload["final_score"], json!(79));
        }
    }

    #[test]
    fn falls_back_to_top_level_object() {
        let payload = extract_payload(&grading_payload(), GRADING_HINTS).expect("payload");
        assert_eq!(payload["final_score"], json!(79));
    }

    #[test]
    fn skips_envelopes_holding_unrelated_chatter() {
        let mut body = grading_payload();
        body["response"] = json!("thanks for your patience!");
        let payload = extract_payload(&body, GRADING_HINTS).expect("payload");
        assert_eq!(payload["final_score"], json!(79));
    }

    #[test]
    fn fails_when_nothing_matches() {
        let body = json!({ "response": "no json here", "status": "ok" });
        let err = extract_payload(&body, GRADING_HINTS).expect_err("no payload");
        assert!(matches!(err, ProviderError::EmptyPayload));
    }

    #[test]
    fn strips_json_fences() {
        let text = format!("Here you go:\n```json\n{}\n```", grading_payload());
        let block = extract_json_block(&text);
        assert!(block.starts_with('{'));
        serde_json::from_str::<Value>(block).expect("parseable");
    }

    #[test]
    fn strips_plain_fences() {
        let text = format!("```\n{}\n```", grading_payload());
        let block = extract_json_block(&text);
        assert!(block.starts_with('{'));
    }

    #[test]
    fn falls_back_to_brace_span() {
        let text = format!("prefix {} suffix", grading_payload());
        let block = extract_json_block(&text);
        serde_json::from_str::<Value>(block).expect("parseable");
    }

    #[test]
    fn parse_accepts_a_complete_payload() {
        let result = parse_grading_result(&grading_payload()).expect("result");
        assert_eq!(result.feedback_type, FeedbackType::GoodProgress);
        assert_eq!(result.concepts_identified, vec!["navigation".to_string()]);
    }

    #[test]
    fn validation_accumulates_all_issues() {
        let payload = json!({
            "context_relevance_score": "high",
            "understanding_depth_score": 70,
            "completeness_score": 70,
            "passed": "yes",
            "feedback_type": "meh",
            "concepts_identified": {},
        });
        let err = parse_grading_result(&payload).expect_err("invalid");
        match err {
            ProviderError::InvalidSchema { issues } => {
                assert!(issues.len() >= 5, "issues: {issues:?}");
                assert!(issues.iter().any(|issue| issue.contains("context_relevance_score")));
                assert!(issues.iter().any(|issue| issue.contains("final_score")));
                assert!(issues.iter().any(|issue| issue.contains("feedback_type")));
                assert!(issues.iter().any(|issue| issue.contains("detailed_feedback")));
            }
            other => panic!("expected InvalidSchema, got {other:?}"),
        }
    }

    #[test]
    fn defaults_are_score_sensitive() {
        let mut payload = grading_payload();
        payload["final_score"] = json!(85);
        let result = parse_grading_result(&payload).expect("result");
        assert_eq!(result.learning_indicators.concept_grasp, ConceptGrasp::Solid);
        assert!(!result.improvement_suggestions.is_empty());
        assert!(!result.next_steps.is_empty());

        let mut payload = grading_payload();
        payload["final_score"] = json!(40);
        payload["passed"] = json!(false);
        let result = parse_grading_result(&payload).expect("result");
        assert_eq!(result.learning_indicators.concept_grasp, ConceptGrasp::Developing);
        assert!(result.next_steps[0].contains("attempt the checkpoint again"));
    }

    #[test]
    fn assessment_payload_round_trips() {
        let payload = json!({
            "score": 86,
            "topicRelevanceScore": 90,
            "comprehensionScore": 84,
            "accuracyScore": 88,
            "originalityScore": 92,
            "plagiarismDetected": false,
            "feedback": "Solid explanation.",
            "isPassed": true
        });
        let result = parse_assessment_result(&payload).expect("result");
        assert_eq!(result.score, 86.0);
        assert_eq!(result.plagiarism_score, 0.0);
        assert!(result.strengths.is_empty());
    }

    #[test]
    fn assessment_validation_accumulates_issues() {
        let payload = json!({ "score": "great", "plagiarismDetected": 1 });
        let err = parse_assessment_result(&payload).expect_err("invalid");
        match err {
            ProviderError::InvalidSchema { issues } => assert!(issues.len() >= 4),
            other => panic!("expected InvalidSchema, got {other:?}"),
        }
    }
}
