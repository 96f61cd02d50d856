use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Settings {
    pub(super) runtime: RuntimeSettings,
    pub(super) agent: AgentSettings,
    pub(super) llm: LlmSettings,
    pub(super) grading: GradingSettings,
    pub(super) telemetry: TelemetrySettings,
}

/// External grading agent endpoint. Disabled when no key/agent id is set.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub base_url: String,
    pub api_key: String,
    pub agent_id: String,
    pub user_id: String,
    pub request_timeout_seconds: u64,
}

impl AgentSettings {
    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty() && !self.api_key.is_empty() && !self.agent_id.is_empty()
    }
}

/// Secondary generative-content LLM used when the agent is unavailable.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub request_timeout_seconds: u64,
}

impl LlmSettings {
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty() && !self.base_url.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct GradingSettings {
    /// Skip both LLM providers and grade rule-based only.
    pub use_rule_based: bool,
    /// How many prior attempts get condensed into the evaluation prompt.
    pub feedback_history_limit: usize,
}

#[derive(Debug, Clone)]
pub struct TelemetrySettings {
    pub log_level: String,
    pub json: bool,
}

#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub environment: Environment,
    pub strict_config: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Staging,
    Test,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Staging => "staging",
            Self::Test => "test",
        }
    }

    pub(super) fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
    #[error("missing required secret for {0}")]
    MissingSecret(&'static str),
}
