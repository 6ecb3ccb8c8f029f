//! Run command - executes workflow definitions in one batch

use std::fmt::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::AppConfig;
use crate::domain::browser::Browser;
use crate::domain::workflow::{RunReport, WorkflowError, WorkflowOutcome};
use crate::infrastructure::browser::{DomBrowser, HttpFetcher, InMemoryFetcher};
use crate::infrastructure::persistence::FileRecordSink;
use crate::infrastructure::workflow::{load_paths, BatchRunner, StepMachine};
use crate::infrastructure::{logging, metrics};

/// Arguments for the run command
#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Workflow files or directories
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Directory for saved records (overrides config)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Write the JSON run report to this file
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Serve a URL from a local HTML file instead of the network (URL=FILE)
    #[arg(long = "offline-page", value_name = "URL=FILE", value_parser = parse_offline_page)]
    pub offline_pages: Vec<(String, PathBuf)>,
}

/// Run the batch and map failures to the exit code
pub async fn run(args: RunArgs) -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    let mut config = AppConfig::load().unwrap_or_default();
    if let Some(directory) = &args.output_dir {
        config.output.directory = directory.clone();
    }

    logging::init_logging(&config.logging);
    metrics::register_build_info();

    let loaded = load_paths(&args.paths);

    let browser = build_browser(&args, &config)?;
    let sink = Arc::new(FileRecordSink::new(config.output.directory.clone()));
    let machine = StepMachine::with_config(browser, sink, config.step_machine());
    let runner = BatchRunner::new(Arc::new(machine));

    let cancel = CancellationToken::new();
    super::cancel_on_shutdown(cancel.clone());

    let mut report = runner.run_all(&loaded.definitions, &cancel).await;

    for error in &loaded.errors {
        report.push(WorkflowOutcome::failed(
            error.path().display().to_string(),
            &WorkflowError::definition(error.to_string()),
        ));
    }

    print!("{}", render_summary(&report));

    if let Some(path) = &args.report {
        let body = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        tokio::fs::write(path, body)
            .await
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        info!(path = %path.display(), "Wrote run report");
    }

    Ok(if report.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn build_browser(args: &RunArgs, config: &AppConfig) -> anyhow::Result<Arc<dyn Browser>> {
    if args.offline_pages.is_empty() {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.browser.request_timeout_ms))
            .build()
            .context("Failed to build HTTP client")?;

        return Ok(Arc::new(DomBrowser::new(HttpFetcher::with_client(client))));
    }

    let fetcher = InMemoryFetcher::new();
    for (url, file) in &args.offline_pages {
        let html = std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read offline page {}", file.display()))?;
        fetcher.insert(url, html);
        info!(url = %url, file = %file.display(), "Serving offline page");
    }

    Ok(Arc::new(DomBrowser::new(fetcher)))
}

/// `URL=FILE`, split at the last `=` since URLs may contain one
fn parse_offline_page(value: &str) -> Result<(String, PathBuf), String> {
    let (url, file) = value
        .rsplit_once('=')
        .ok_or_else(|| format!("expected URL=FILE, got '{}'", value))?;

    let (url, file) = (url.trim(), file.trim());
    if url.is_empty() || file.is_empty() {
        return Err(format!("expected URL=FILE, got '{}'", value));
    }

    Ok((url.to_string(), PathBuf::from(file)))
}

/// One line per workflow, then its failures
fn render_summary(report: &RunReport) -> String {
    let mut out = String::new();

    for outcome in &report.workflows {
        let _ = writeln!(
            out,
            "{:<9} {} (steps: {}, items: {}, failed items: {}, records: {}, {} ms)",
            outcome.status.as_str(),
            outcome.name,
            outcome.steps_completed,
            outcome.items_processed,
            outcome.items_failed,
            outcome.records_saved,
            outcome.execution_time_ms
        );

        if let Some(file) = &outcome.output_file {
            let _ = writeln!(out, "          output: {}", file);
        }

        for failure in &outcome.failures {
            let mut location = String::new();
            if let Some(step) = &failure.step {
                let _ = write!(location, " step '{}'", step);
            }
            if let Some(index) = failure.item_index {
                let _ = write!(location, " item {}", index);
            }
            let _ = writeln!(out, "          [{}]{}: {}", failure.kind, location, failure.message);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::workflow::WorkflowStatus;

    #[test]
    fn test_parse_offline_page() {
        assert_eq!(
            parse_offline_page("https://example.com/?q=1=page.html").unwrap(),
            ("https://example.com/?q=1".to_string(), PathBuf::from("page.html"))
        );
        assert_eq!(
            parse_offline_page("https://example.com/ = fixtures/home.html").unwrap(),
            ("https://example.com/".to_string(), PathBuf::from("fixtures/home.html"))
        );
        assert!(parse_offline_page("https://example.com/").is_err());
        assert!(parse_offline_page("=page.html").is_err());
    }

    #[test]
    fn test_render_summary() {
        let mut report = RunReport::new();

        let mut ok = WorkflowOutcome::new("news");
        ok.steps_completed = 2;
        ok.output_file = Some("output/news.json".to_string());
        ok.finish(false, 12);
        report.push(ok);

        let failed = WorkflowOutcome::failed(
            "shop",
            &WorkflowError::step_execution("list", WorkflowError::unresolved_variable("items")),
        );
        report.push(failed);

        let summary = render_summary(&report);
        assert!(summary.contains("succeeded news (steps: 2"));
        assert!(summary.contains("output: output/news.json"));
        assert!(summary.contains("failed    shop"));
        assert!(summary.contains("[unresolved_variable] step 'list': Unresolved variable: ${items}"));
        assert_eq!(report.count(WorkflowStatus::Failed), 1);
    }
}
