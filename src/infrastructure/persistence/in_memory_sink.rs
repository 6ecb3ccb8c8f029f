//! In-memory record sink

use std::path::PathBuf;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::persistence::{RecordSink, SaveRequest, SavedRecord};
use crate::domain::DomainError;

/// A collection persisted at the end of a workflow run
#[derive(Debug, Clone, PartialEq)]
pub struct SavedCollection {
    pub name: String,
    pub records: Vec<Value>,
    pub directory: Option<PathBuf>,
}

/// Keeps saved records in memory
///
/// Useful for testing and dry runs. Data is lost when the process terminates.
#[derive(Debug, Default)]
pub struct InMemoryRecordSink {
    requests: RwLock<Vec<SaveRequest>>,
    collections: RwLock<Vec<SavedCollection>>,
}

impl InMemoryRecordSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<SaveRequest> {
        self.requests.read().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn collections(&self) -> Vec<SavedCollection> {
        self.collections.read().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl RecordSink for InMemoryRecordSink {
    async fn save(&self, request: &SaveRequest) -> Result<SavedRecord, DomainError> {
        let mut requests = self.requests.write().map_err(|e| {
            DomainError::storage(format!("Failed to acquire write lock: {}", e))
        })?;

        let location = format!(
            "memory://{}",
            request
                .filename
                .clone()
                .unwrap_or_else(|| format!("record-{}", requests.len()))
        );
        let bytes = request.record.to_string().len();
        requests.push(request.clone());

        Ok(SavedRecord { location, bytes })
    }

    async fn save_collection(
        &self,
        name: &str,
        records: &[Value],
        directory: Option<PathBuf>,
    ) -> Result<SavedRecord, DomainError> {
        let mut collections = self.collections.write().map_err(|e| {
            DomainError::storage(format!("Failed to acquire write lock: {}", e))
        })?;

        collections.push(SavedCollection {
            name: name.to_string(),
            records: records.to_vec(),
            directory,
        });

        Ok(SavedRecord {
            location: format!("memory://{}.json", name),
            bytes: Value::Array(records.to_vec()).to_string().len(),
        })
    }
}
