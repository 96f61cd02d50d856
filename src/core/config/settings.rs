use super::parsing::{
    env_optional, env_or_default, parse_bool, parse_environment, parse_f64, parse_u32, parse_u64,
};
use super::types::{
    AgentSettings, ConfigError, GradingSettings, LlmSettings, RuntimeSettings, Settings,
    TelemetrySettings,
};

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let environment = parse_environment(
            env_optional("MILESTACK_ENV").or_else(|| env_optional("ENVIRONMENT")),
        );
        let strict_config = env_optional("MILESTACK_STRICT_CONFIG")
            .map(|value| parse_bool(&value))
            .unwrap_or(false)
            || environment.is_production();

        let agent_base_url =
            env_or_default("AGENT_BASE_URL", "").trim_end_matches('/').to_string();
        let agent_api_key = env_or_default("AGENT_API_KEY", "");
        let agent_id = env_or_default("AGENT_ID", "");
        let agent_user_id = env_or_default("AGENT_USER_ID", "milestack-grader");
        let agent_request_timeout =
            parse_u64("AGENT_REQUEST_TIMEOUT", env_or_default("AGENT_REQUEST_TIMEOUT", "120"))?;

        let llm_api_key = env_or_default("LLM_API_KEY", "");
        let llm_base_url =
            env_or_default("LLM_BASE_URL", "https://generativelanguage.googleapis.com/v1beta")
                .trim_end_matches('/')
                .to_string();
        let llm_model = env_or_default("LLM_MODEL", "gemini-2.0-flash");
        let llm_max_tokens = parse_u32("LLM_MAX_TOKENS", env_or_default("LLM_MAX_TOKENS", "2048"))?;
        let llm_temperature =
            parse_f64("LLM_TEMPERATURE", env_or_default("LLM_TEMPERATURE", "0.2"))?;
        let llm_request_timeout =
            parse_u64("LLM_REQUEST_TIMEOUT", env_or_default("LLM_REQUEST_TIMEOUT", "120"))?;

        let use_rule_based = env_optional("USE_RULE_BASED_GRADING")
            .map(|value| parse_bool(&value))
            .unwrap_or(false);
        let feedback_history_limit = parse_u64(
            "FEEDBACK_HISTORY_LIMIT",
            env_or_default("FEEDBACK_HISTORY_LIMIT", "5"),
        )? as usize;

        let log_level = env_or_default("MILESTACK_LOG_LEVEL", "info");
        let json = env_optional("MILESTACK_LOG_JSON")
            .map(|value| parse_bool(&value))
            .unwrap_or(false);

        let settings = Self {
            runtime: RuntimeSettings { environment, strict_config },
            agent: AgentSettings {
                base_url: agent_base_url,
                api_key: agent_api_key,
                agent_id,
                user_id: agent_user_id,
                request_timeout_seconds: agent_request_timeout,
            },
            llm: LlmSettings {
                api_key: llm_api_key,
                base_url: llm_base_url,
                model: llm_model,
                max_tokens: llm_max_tokens,
                temperature: llm_temperature,
                request_timeout_seconds: llm_request_timeout,
            },
            grading: GradingSettings { use_rule_based, feedback_history_limit },
            telemetry: TelemetrySettings { log_level, json },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn agent(&self) -> &AgentSettings {
        &self.agent
    }

    pub fn llm(&self) -> &LlmSettings {
        &self.llm
    }

    pub fn grading(&self) -> &GradingSettings {
        &self.grading
    }

    pub fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::InvalidValue {
                field: "LLM_TEMPERATURE",
                value: self.llm.temperature.to_string(),
            });
        }

        if self.agent.request_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "AGENT_REQUEST_TIMEOUT",
                value: "0".to_string(),
            });
        }

        if self.llm.request_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "LLM_REQUEST_TIMEOUT",
                value: "0".to_string(),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        // Rule-based-only deployments are allowed to run without any provider
        // secrets; everything else must have at least one grading provider.
        if self.grading.use_rule_based {
            return Ok(());
        }

        if !self.agent.is_configured() && !self.llm.is_configured() {
            return Err(ConfigError::MissingSecret("AGENT_API_KEY/LLM_API_KEY"));
        }

        Ok(())
    }
}
