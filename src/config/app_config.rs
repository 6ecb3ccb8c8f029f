use std::path::PathBuf;

use serde::Deserialize;

use crate::infrastructure::workflow::StepMachineConfig;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub engine: EngineConfig,
    pub browser: BrowserConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Step machine defaults, overridable per workflow
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_step_transitions: usize,
    pub max_for_each_depth: usize,
    pub default_timeout_ms: u64,
    pub default_retry_count: u32,
    pub default_delay_seconds: f64,
    pub continue_on_item_error: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub user_agent: Option<String>,
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        let defaults = StepMachineConfig::default();

        Self {
            max_step_transitions: defaults.max_step_transitions,
            max_for_each_depth: defaults.max_for_each_depth,
            default_timeout_ms: defaults.default_timeout_ms,
            default_retry_count: defaults.default_retry_count,
            default_delay_seconds: defaults.default_delay_seconds,
            continue_on_item_error: defaults.continue_on_item_error,
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            user_agent: None,
            request_timeout_ms: 30000,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("output"),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("SCRAPEFLOW")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Step machine settings derived from this configuration
    pub fn step_machine(&self) -> StepMachineConfig {
        StepMachineConfig {
            max_step_transitions: self.engine.max_step_transitions,
            max_for_each_depth: self.engine.max_for_each_depth,
            default_timeout_ms: self.engine.default_timeout_ms,
            default_retry_count: self.engine.default_retry_count,
            default_delay_seconds: self.engine.default_delay_seconds,
            continue_on_item_error: self.engine.continue_on_item_error,
            output_directory: Some(self.output.directory.clone()),
            user_agent: self.browser.user_agent.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.engine.max_step_transitions, 1000);
        assert_eq!(config.engine.max_for_each_depth, 4);
        assert!(config.engine.continue_on_item_error);
        assert_eq!(config.output.directory, PathBuf::from("output"));
    }

    #[test]
    fn test_partial_sources_keep_defaults() {
        let config: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                [logging]
                format = "json"

                [engine]
                default_retry_count = 3

                [output]
                directory = "data"
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.engine.default_retry_count, 3);
        assert_eq!(config.engine.default_timeout_ms, 30000);

        let machine = config.step_machine();
        assert_eq!(machine.default_retry_count, 3);
        assert_eq!(machine.output_directory, Some(PathBuf::from("data")));
    }
}
