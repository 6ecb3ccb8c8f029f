//! Sequential batch runner

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::domain::workflow::{
    RunReport, WorkflowDefinition, WorkflowError, WorkflowExecutor, WorkflowOutcome,
    WorkflowStatus,
};

/// Runs workflow definitions one after another into a single [`RunReport`]
///
/// A failing workflow never stops the batch. Once the token is cancelled the
/// remaining workflows are reported as cancelled without being started.
#[derive(Debug, Clone)]
pub struct BatchRunner {
    executor: Arc<dyn WorkflowExecutor>,
}

impl BatchRunner {
    pub fn new(executor: Arc<dyn WorkflowExecutor>) -> Self {
        Self { executor }
    }

    pub async fn run_all(
        &self,
        definitions: &[WorkflowDefinition],
        cancel: &CancellationToken,
    ) -> RunReport {
        let mut report = RunReport::new();
        info!(run_id = %report.run_id, workflows = definitions.len(), "Starting batch");

        for definition in definitions {
            if cancel.is_cancelled() {
                warn!(workflow = %definition.name, "Batch cancelled, workflow not started");
                report.push(WorkflowOutcome::failed(
                    definition.name.clone(),
                    &WorkflowError::Cancelled,
                ));
                continue;
            }

            let outcome = match self.executor.execute(definition, cancel).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(workflow = %definition.name, error = %e, "Workflow did not start");
                    WorkflowOutcome::failed(definition.name.clone(), &e)
                }
            };

            report.push(outcome);
        }

        report.finish();

        info!(
            run_id = %report.run_id,
            succeeded = report.count(WorkflowStatus::Succeeded),
            partial = report.count(WorkflowStatus::Partial),
            failed = report.count(WorkflowStatus::Failed),
            "Batch finished"
        );

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::workflow::{
        ActionDefinition, ExtractAction, FailureKind, MockWorkflowExecutor, StepDefinition,
    };
    use crate::infrastructure::browser::{DomBrowser, InMemoryFetcher};
    use crate::infrastructure::persistence::InMemoryRecordSink;
    use crate::infrastructure::workflow::StepMachine;

    fn definition(name: &str) -> WorkflowDefinition {
        WorkflowDefinition::new(name, "https://example.com/")
            .with_step(StepDefinition::new("only"))
    }

    #[tokio::test]
    async fn test_runs_in_order_and_keeps_going() {
        let mut executor = MockWorkflowExecutor::new();
        executor.expect_execute().times(3).returning(|definition, _| {
            if definition.name == "b" {
                Err(WorkflowError::definition("unknown next step"))
            } else {
                let mut outcome = WorkflowOutcome::new(definition.name.clone());
                outcome.finish(false, 1);
                Ok(outcome)
            }
        });

        let runner = BatchRunner::new(Arc::new(executor));
        let report = runner
            .run_all(
                &[definition("a"), definition("b"), definition("c")],
                &CancellationToken::new(),
            )
            .await;

        let names: Vec<&str> = report.workflows.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(report.count(WorkflowStatus::Succeeded), 2);
        assert_eq!(report.count(WorkflowStatus::Failed), 1);
        assert!(report.has_failures());
        assert!(report.finished_at.is_some());

        let failed = report.outcome("b").unwrap();
        assert_eq!(failed.failures[0].kind, FailureKind::Definition);
        assert_eq!(failed.failures[0].workflow, "b");
    }

    #[tokio::test]
    async fn test_cancelled_batch_skips_remaining() {
        let mut executor = MockWorkflowExecutor::new();
        executor.expect_execute().never();

        let cancel = CancellationToken::new();
        cancel.cancel();

        let runner = BatchRunner::new(Arc::new(executor));
        let report = runner
            .run_all(&[definition("a"), definition("b")], &cancel)
            .await;

        assert_eq!(report.workflows.len(), 2);
        assert!(report
            .workflows
            .iter()
            .all(|w| w.failures[0].kind == FailureKind::Cancelled));
    }

    #[tokio::test]
    async fn test_definition_error_does_not_block_next_workflow() {
        let page = r#"<html><body><ul><li><a href="/a">A</a></li><li><a href="/b">B</a></li></ul></body></html>"#;
        let browser = Arc::new(DomBrowser::new(
            InMemoryFetcher::new().with_page("https://example.com/", page),
        ));
        let sink = Arc::new(InMemoryRecordSink::new());
        let runner = BatchRunner::new(Arc::new(StepMachine::new(browser, sink)));

        let broken = WorkflowDefinition::new("broken", "https://example.com/")
            .with_step(StepDefinition::new("list").with_next("missing"));
        let healthy = WorkflowDefinition::new("healthy", "https://example.com/").with_step(
            StepDefinition::new("list").with_action(ActionDefinition::Extract(
                ExtractAction::links("ul a")
                    .with_generalize(false)
                    .with_output("links"),
            )),
        );

        let report = runner
            .run_all(&[broken, healthy], &CancellationToken::new())
            .await;

        assert_eq!(report.outcome("broken").unwrap().status, WorkflowStatus::Failed);
        assert_eq!(
            report.outcome("broken").unwrap().failures[0].kind,
            FailureKind::Definition
        );
        assert_eq!(report.outcome("healthy").unwrap().status, WorkflowStatus::Succeeded);
        assert_eq!(report.outcome("healthy").unwrap().steps_completed, 1);
    }
}
