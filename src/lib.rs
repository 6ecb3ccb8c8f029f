//! scrapeflow
//!
//! Declarative scraping workflows:
//! - Step graphs with per-item iteration and pagination
//! - Template variables resolved against a scoped execution context
//! - Schema normalization and sample-based selector generalization
//! - Sequential batch runs producing a serializable run report

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;
