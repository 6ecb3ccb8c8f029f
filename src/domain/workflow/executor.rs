//! Workflow executor trait

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::definition::WorkflowDefinition;
use super::error::WorkflowError;
use super::report::WorkflowOutcome;

#[cfg(test)]
use mockall::automock;

/// Runs one workflow definition to completion
///
/// Failures that happen while the workflow runs are part of the returned
/// outcome. `Err` is reserved for workflows that never started, such as an
/// invalid definition.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WorkflowExecutor: Send + Sync + std::fmt::Debug {
    async fn execute(
        &self,
        definition: &WorkflowDefinition,
        cancel: &CancellationToken,
    ) -> Result<WorkflowOutcome, WorkflowError>;
}
