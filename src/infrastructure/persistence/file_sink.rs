//! File-backed record sink

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Local;
use serde_json::Value;
use tracing::info;

use crate::domain::persistence::{RecordSink, SaveFormat, SaveRequest, SavedRecord};
use crate::domain::workflow::template::value_to_string;
use crate::domain::DomainError;

/// Writes records as files under an output directory
#[derive(Debug, Clone)]
pub struct FileRecordSink {
    directory: PathBuf,
}

impl FileRecordSink {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    async fn write(&self, directory: &Path, filename: &str, body: &str) -> Result<SavedRecord, DomainError> {
        tokio::fs::create_dir_all(directory).await.map_err(|e| {
            DomainError::storage(format!(
                "Failed to create output directory {}: {}",
                directory.display(),
                e
            ))
        })?;

        let path = directory.join(filename);
        tokio::fs::write(&path, body).await.map_err(|e| {
            DomainError::storage(format!("Failed to write {}: {}", path.display(), e))
        })?;

        info!(path = %path.display(), bytes = body.len(), "Saved record");

        Ok(SavedRecord {
            location: path.display().to_string(),
            bytes: body.len(),
        })
    }
}

#[async_trait]
impl RecordSink for FileRecordSink {
    async fn save(&self, request: &SaveRequest) -> Result<SavedRecord, DomainError> {
        let directory = request
            .directory
            .as_deref()
            .unwrap_or(self.directory.as_path());

        let filename = request
            .filename
            .as_deref()
            .map(sanitize_filename)
            .filter(|name| !name.is_empty())
            .map(|name| with_extension(name, request.format))
            .unwrap_or_else(|| default_filename(request.format));

        let body = match request.format {
            SaveFormat::Json => to_json(&request.record)?,
            SaveFormat::Markdown => render_markdown(&request.record),
        };

        self.write(directory, &filename, &body).await
    }

    async fn save_collection(
        &self,
        name: &str,
        records: &[Value],
        directory: Option<PathBuf>,
    ) -> Result<SavedRecord, DomainError> {
        let directory = directory.unwrap_or_else(|| self.directory.clone());
        let filename = with_extension(sanitize_filename(name), SaveFormat::Json);
        let body = to_json(&Value::Array(records.to_vec()))?;

        self.write(&directory, &filename, &body).await
    }
}

fn to_json(value: &Value) -> Result<String, DomainError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| DomainError::storage(format!("Failed to serialize record: {}", e)))
}

/// `# title`, date, URL, then the content
pub fn render_markdown(record: &Value) -> String {
    let field = |name: &str, default: &str| {
        record
            .get(name)
            .filter(|value| !value.is_null())
            .map(value_to_string)
            .unwrap_or_else(|| default.to_string())
    };

    let content = if record.is_object() {
        field("content", "")
    } else {
        value_to_string(record)
    };

    format!(
        "# {}\n\nDate: {}\n\nURL: {}\n\n{}\n",
        field("title", "Untitled"),
        field("date", "Unknown"),
        field("url", ""),
        content
    )
}

/// Replace path separators and characters unsafe in file names
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    cleaned.trim_start_matches('.').trim().to_string()
}

fn with_extension(name: String, format: SaveFormat) -> String {
    if Path::new(&name).extension().is_some() {
        name
    } else {
        format!("{}.{}", name, format.extension())
    }
}

fn default_filename(format: SaveFormat) -> String {
    format!(
        "output_{}.{}",
        Local::now().format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}
