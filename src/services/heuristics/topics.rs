//! Keyword tables behind the rule-based scorer.
//!
//! Matching is case-insensitive substring containment, not tokenization; the
//! tables are deliberately permissive and can over-match.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TopicCategory {
    MobileDevelopment,
    WebDevelopment,
    DataStructures,
    BackendDevelopment,
    MachineLearning,
    General,
}

/// Wrong-topic tables for the gate: if an answer racks up enough hits in a
/// category the assignment domain does not cover, it is off topic.
pub(crate) const WRONG_TOPIC_SETS: &[(TopicCategory, &[&str])] = &[
    (
        TopicCategory::MobileDevelopment,
        &[
            "android",
            "kotlin",
            "activity lifecycle",
            "fragment",
            "jetpack",
            "gradle",
            "recyclerview",
            "viewmodel",
            "swiftui",
            "uikit",
            "xcode",
        ],
    ),
    (
        TopicCategory::DataStructures,
        &[
            "binary search tree",
            "linked list",
            "avl",
            "red-black",
            "depth-first",
            "breadth-first",
            "quicksort",
            "mergesort",
            "hash table",
            "dijkstra",
            "traversal",
            "big-o",
        ],
    ),
    (
        TopicCategory::WebDevelopment,
        &[
            "react",
            "angular",
            "vue",
            "html",
            "css",
            "dom",
            "webpack",
            "frontend",
            "jsx",
            "stylesheet",
        ],
    ),
    (
        TopicCategory::BackendDevelopment,
        &[
            "microservice",
            "kubernetes",
            "docker",
            "middleware",
            "sql query",
            "database schema",
            "load balancer",
            "message queue",
        ],
    ),
    (
        TopicCategory::MachineLearning,
        &[
            "neural network",
            "gradient descent",
            "training data",
            "model weights",
            "tensorflow",
            "pytorch",
            "overfitting",
            "hyperparameter",
        ],
    ),
];

/// Positive keyword tables used for context-relevance scoring.
pub(crate) const RELEVANCE_SETS: &[(TopicCategory, &[&str])] = &[
    (
        TopicCategory::MobileDevelopment,
        &[
            "swiftui",
            "swift",
            "ios",
            "xcode",
            "@state",
            "@binding",
            "navigation",
            "view",
            "screen",
            "app",
            "uikit",
            "storyboard",
            "state management",
            "android",
            "kotlin",
        ],
    ),
    (
        TopicCategory::WebDevelopment,
        &[
            "react",
            "component",
            "javascript",
            "typescript",
            "html",
            "css",
            "api",
            "frontend",
            "dom",
            "state",
            "props",
            "hook",
            "browser",
        ],
    ),
    (
        TopicCategory::DataStructures,
        &[
            "array",
            "tree",
            "graph",
            "list",
            "stack",
            "queue",
            "complexity",
            "algorithm",
            "node",
            "traversal",
            "sort",
            "search",
        ],
    ),
    (
        TopicCategory::BackendDevelopment,
        &[
            "server",
            "database",
            "endpoint",
            "request",
            "response",
            "sql",
            "cache",
            "queue",
            "authentication",
            "api",
        ],
    ),
    (
        TopicCategory::MachineLearning,
        &[
            "model",
            "training",
            "dataset",
            "feature",
            "accuracy",
            "loss",
            "neural",
            "prediction",
            "classifier",
        ],
    ),
];

/// Generic programming vocabulary; any of these marks an answer as at least
/// programming-related.
pub(crate) const PROGRAMMING_VOCAB: &[&str] = &[
    "function",
    "variable",
    "loop",
    "class",
    "method",
    "code",
    "implement",
    "algorithm",
    "data",
    "struct",
    "api",
    "interface",
    "test",
    "debug",
    "compile",
    "array",
    "string",
    "object",
    "module",
];

/// Normalizes an assignment domain string to the topic categories it covers.
/// Unknown domains fall back to `General`, which disables the wrong-topic
/// gate entirely (see the carve-out in the scorer).
pub(crate) fn domain_categories(domain: &str) -> Vec<TopicCategory> {
    let normalized: String = domain
        .trim()
        .to_lowercase()
        .chars()
        .map(|ch| if ch == '-' || ch == ' ' { '_' } else { ch })
        .collect();

    match normalized.as_str() {
        "swift" | "swiftui" | "ios" | "android" | "mobile" | "mobile_development"
        | "mobile_dev" => {
            vec![TopicCategory::MobileDevelopment]
        }
        "web" | "web_development" | "web_dev" | "frontend" | "react" | "javascript" => {
            vec![TopicCategory::WebDevelopment]
        }
        "algorithms" | "data_structures" | "computer_science" | "dsa" => {
            vec![TopicCategory::DataStructures]
        }
        "backend" | "backend_development" | "databases" | "devops" => {
            vec![TopicCategory::BackendDevelopment]
        }
        "ml" | "machine_learning" | "ai" | "data_science" => {
            vec![TopicCategory::MachineLearning]
        }
        _ => vec![TopicCategory::General],
    }
}

/// Counts how many keywords from `set` occur in the lowercased answer.
pub(crate) fn keyword_matches(answer_lower: &str, set: &[&str]) -> usize {
    set.iter().filter(|keyword| answer_lower.contains(&keyword.to_lowercase())).count()
}

pub(crate) fn has_programming_vocab(answer_lower: &str) -> bool {
    keyword_matches(answer_lower, PROGRAMMING_VOCAB) > 0
}

/// Relevance keywords for a set of domain categories; `General` (and any
/// category with no table) scores against the generic vocabulary.
pub(crate) fn relevance_keywords(categories: &[TopicCategory]) -> Vec<&'static str> {
    let mut keywords = Vec::new();
    for category in categories {
        match RELEVANCE_SETS.iter().find(|(set_category, _)| set_category == category) {
            Some((_, set)) => keywords.extend_from_slice(set),
            None => keywords.extend_from_slice(PROGRAMMING_VOCAB),
        }
    }
    keywords
}
