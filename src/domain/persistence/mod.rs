//! Record persistence capability

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveFormat {
    Json,
    #[serde(alias = "md")]
    Markdown,
}

impl SaveFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Markdown => "md",
        }
    }
}

impl fmt::Display for SaveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => f.write_str("json"),
            Self::Markdown => f.write_str("markdown"),
        }
    }
}

/// A single record handed over by a `save` action
#[derive(Debug, Clone, PartialEq)]
pub struct SaveRequest {
    pub record: Value,
    pub format: SaveFormat,

    /// Resolved filename; the sink picks one when absent
    pub filename: Option<String>,

    /// Overrides the sink's output directory
    pub directory: Option<PathBuf>,
}

impl SaveRequest {
    pub fn new(record: Value, format: SaveFormat) -> Self {
        Self {
            record,
            format,
            filename: None,
            directory: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }
}

/// Where a record ended up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedRecord {
    pub location: String,
    pub bytes: usize,
}

/// Persists records produced by workflows
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RecordSink: Send + Sync + fmt::Debug {
    /// Persist one record in the requested format
    async fn save(&self, request: &SaveRequest) -> Result<SavedRecord, DomainError>;

    /// Persist all records collected by a workflow run as one JSON document
    async fn save_collection(
        &self,
        name: &str,
        records: &[Value],
        directory: Option<PathBuf>,
    ) -> Result<SavedRecord, DomainError>;
}
