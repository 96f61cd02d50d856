mod parsing;
mod settings;
mod types;

pub use types::{
    AgentSettings, ConfigError, Environment, GradingSettings, LlmSettings, RuntimeSettings,
    Settings, TelemetrySettings,
};
