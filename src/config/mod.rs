//! Application configuration

mod app_config;

pub use app_config::{
    AppConfig, BrowserConfig, EngineConfig, LogFormat, LoggingConfig, OutputConfig,
};
