//! Run report types

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::WorkflowError;

/// Category of a recorded failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Definition,
    UnresolvedVariable,
    ExtractionMiss,
    Capability,
    Persistence,
    Cancelled,
    Internal,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Definition => "definition",
            Self::UnresolvedVariable => "unresolved_variable",
            Self::ExtractionMiss => "extraction_miss",
            Self::Capability => "capability",
            Self::Persistence => "persistence",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Succeeded,
    Partial,
    Failed,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failure with enough context to locate it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub workflow: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_index: Option<usize>,

    pub kind: FailureKind,
    pub message: String,
}

impl FailureRecord {
    /// Build a record from an error, pulling step and item context out of its wrappers
    pub fn from_error(workflow: impl Into<String>, error: &WorkflowError) -> Self {
        let mut step = None;
        let mut item_index = None;
        let mut current = error;

        loop {
            match current {
                WorkflowError::StepExecution { step: s, cause } => {
                    step.get_or_insert_with(|| s.clone());
                    current = cause;
                }
                WorkflowError::ItemFailed {
                    step: s,
                    index,
                    cause,
                } => {
                    step.get_or_insert_with(|| s.clone());
                    item_index.get_or_insert(*index);
                    current = cause;
                }
                _ => break,
            }
        }

        Self {
            workflow: workflow.into(),
            step,
            item_index,
            kind: error.kind(),
            message: current.to_string(),
        }
    }
}

/// Result of running one workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowOutcome {
    pub name: String,
    pub status: WorkflowStatus,
    pub steps_completed: usize,
    pub items_processed: usize,
    pub items_failed: usize,
    pub records_saved: usize,
    pub failures: Vec<FailureRecord>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,

    pub execution_time_ms: u64,
}

impl WorkflowOutcome {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: WorkflowStatus::Succeeded,
            steps_completed: 0,
            items_processed: 0,
            items_failed: 0,
            records_saved: 0,
            failures: Vec::new(),
            output_file: None,
            execution_time_ms: 0,
        }
    }

    /// Outcome of a workflow that failed before or instead of running
    pub fn failed(name: impl Into<String>, error: &WorkflowError) -> Self {
        let mut outcome = Self::new(name);
        outcome.record(error);
        outcome.status = WorkflowStatus::Failed;
        outcome
    }

    /// Attach a failure to this outcome
    pub fn record(&mut self, error: &WorkflowError) {
        self.failures
            .push(FailureRecord::from_error(self.name.clone(), error));
    }

    /// Settle the status once the run is over
    pub fn finish(&mut self, aborted: bool, execution_time_ms: u64) {
        self.execution_time_ms = execution_time_ms;
        self.status = if aborted {
            WorkflowStatus::Failed
        } else if self.failures.is_empty() {
            WorkflowStatus::Succeeded
        } else {
            WorkflowStatus::Partial
        };
    }

    pub fn is_success(&self) -> bool {
        self.status == WorkflowStatus::Succeeded
    }
}

/// Aggregated outcome of a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,

    pub workflows: Vec<WorkflowOutcome>,
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            workflows: Vec::new(),
        }
    }

    pub fn push(&mut self, outcome: WorkflowOutcome) {
        self.workflows.push(outcome);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// True when any workflow did not fully succeed
    pub fn has_failures(&self) -> bool {
        self.workflows.iter().any(|w| !w.is_success())
    }

    pub fn count(&self, status: WorkflowStatus) -> usize {
        self.workflows.iter().filter(|w| w.status == status).count()
    }

    pub fn outcome(&self, name: &str) -> Option<&WorkflowOutcome> {
        self.workflows.iter().find(|w| w.name == name)
    }
}
