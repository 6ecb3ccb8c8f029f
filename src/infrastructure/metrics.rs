//! Engine metrics
//!
//! Recorded through the `metrics` facade. Nothing is exported unless the
//! embedding process installs a recorder.

use std::time::Duration;

use metrics::{counter, gauge, histogram};

use crate::domain::WorkflowStatus;

/// Publish static build information
pub fn register_build_info() {
    gauge!("scrapeflow_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
}

/// Record one finished action
pub fn record_action(kind: &'static str, success: bool, duration: Duration) {
    let status = if success { "success" } else { "error" };

    counter!("scrapeflow_actions_total", "kind" => kind, "status" => status).increment(1);
    histogram!("scrapeflow_action_duration_seconds", "kind" => kind)
        .record(duration.as_secs_f64());
}

/// Record a retry of a failed action
pub fn record_retry(kind: &'static str) {
    counter!("scrapeflow_action_retries_total", "kind" => kind).increment(1);
}

/// Record items produced by one extraction
pub fn record_items_extracted(target: &'static str, count: usize) {
    counter!("scrapeflow_items_extracted_total", "target" => target).increment(count as u64);
}

/// Record a finished workflow
pub fn record_workflow(status: WorkflowStatus, duration: Duration) {
    let status = status.as_str();

    counter!("scrapeflow_workflows_total", "status" => status).increment(1);
    histogram!("scrapeflow_workflow_duration_seconds", "status" => status)
        .record(duration.as_secs_f64());
}
