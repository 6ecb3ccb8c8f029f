//! Infrastructure layer - Capability implementations and the workflow engine

pub mod browser;
pub mod logging;
pub mod metrics;
pub mod persistence;
pub mod workflow;
