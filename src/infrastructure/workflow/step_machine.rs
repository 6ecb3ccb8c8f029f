//! Workflow step machine
//!
//! Runs a validated [`WorkflowDefinition`] against one browser session. Every
//! browser interaction is awaited in order; nothing runs in parallel.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::browser::{Browser, BrowserOptions, ElementHandle, Selector};
use crate::domain::extraction::{normalize, ExtractionExecutor, FieldKind, FieldSpec};
use crate::domain::persistence::{RecordSink, SaveRequest};
use crate::domain::workflow::template::has_tokens;
use crate::domain::workflow::{
    is_truthy, ActionDefinition, ClickAction, DefinitionLimits, ElementSpec, ExecutionContext,
    ExtractAction, ExtractTarget, ItemErrorPolicy, PaginationSpec, RetryConfig, SaveAction,
    StepDefinition, VisitAction, WaitAction, WorkflowConfig, WorkflowDefinition, WorkflowError,
    WorkflowExecutor, WorkflowOutcome, CURRENT_ITEM,
};
use crate::infrastructure::metrics;

/// Pause used by a `wait` action without selector or timeout
const DEFAULT_WAIT_MS: u64 = 1000;

type ActionFuture<'s> = Pin<Box<dyn Future<Output = Result<(), WorkflowError>> + Send + 's>>;

/// Configuration for the step machine
#[derive(Debug, Clone)]
pub struct StepMachineConfig {
    /// Maximum number of step transitions per run (prevents runaway chains)
    pub max_step_transitions: usize,

    /// Maximum nesting of for_each iterations
    pub max_for_each_depth: usize,

    /// Default timeout for navigations and waits in milliseconds
    pub default_timeout_ms: u64,

    pub default_retry_count: u32,

    /// Default pause between consecutive navigations
    pub default_delay_seconds: f64,

    /// Skip failed for_each items unless the step says otherwise
    pub continue_on_item_error: bool,

    pub output_directory: Option<PathBuf>,

    pub user_agent: Option<String>,
}

impl Default for StepMachineConfig {
    fn default() -> Self {
        Self {
            max_step_transitions: 1000,
            max_for_each_depth: 4,
            default_timeout_ms: 30000, // 30 seconds
            default_retry_count: 0,
            default_delay_seconds: 0.0,
            continue_on_item_error: true,
            output_directory: None,
            user_agent: None,
        }
    }
}

/// Engine defaults merged with one workflow's own config
#[derive(Debug, Clone)]
struct RunSettings {
    timeout: Duration,
    retry: RetryConfig,
    delay: Duration,
    debug: bool,
    continue_on_item_error: bool,
    max_step_transitions: usize,
    output_directory: Option<PathBuf>,
    browser: BrowserOptions,
}

impl RunSettings {
    fn resolve(engine: &StepMachineConfig, workflow: &WorkflowConfig) -> Self {
        let timeout_ms = workflow.timeout_ms.unwrap_or(engine.default_timeout_ms);
        let delay = workflow
            .delay_seconds
            .unwrap_or(engine.default_delay_seconds);
        let delay = Duration::try_from_secs_f64(delay).unwrap_or(Duration::ZERO);
        let retries = workflow.retry_count.unwrap_or(engine.default_retry_count);

        Self {
            timeout: Duration::from_millis(timeout_ms),
            retry: RetryConfig::fixed(retries, delay),
            delay,
            debug: workflow.debug.unwrap_or(false),
            continue_on_item_error: engine.continue_on_item_error,
            max_step_transitions: engine.max_step_transitions,
            output_directory: workflow
                .output_directory
                .as_ref()
                .map(PathBuf::from)
                .or_else(|| engine.output_directory.clone()),
            browser: BrowserOptions {
                headless: workflow.headless.unwrap_or(true),
                user_agent: workflow
                    .user_agent
                    .clone()
                    .or_else(|| engine.user_agent.clone()),
                timeout_ms,
            },
        }
    }
}

/// Workflow executor driving a browser and a record sink
#[derive(Debug)]
pub struct StepMachine {
    browser: Arc<dyn Browser>,
    sink: Arc<dyn RecordSink>,
    config: StepMachineConfig,
}

impl StepMachine {
    pub fn new(browser: Arc<dyn Browser>, sink: Arc<dyn RecordSink>) -> Self {
        Self::with_config(browser, sink, StepMachineConfig::default())
    }

    pub fn with_config(
        browser: Arc<dyn Browser>,
        sink: Arc<dyn RecordSink>,
        config: StepMachineConfig,
    ) -> Self {
        Self {
            browser,
            sink,
            config,
        }
    }

    pub fn config(&self) -> &StepMachineConfig {
        &self.config
    }
}

#[async_trait]
impl WorkflowExecutor for StepMachine {
    async fn execute(
        &self,
        definition: &WorkflowDefinition,
        cancel: &CancellationToken,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        definition.validate(&DefinitionLimits {
            max_for_each_depth: self.config.max_for_each_depth,
        })?;

        if cancel.is_cancelled() {
            return Err(WorkflowError::Cancelled);
        }

        let settings = RunSettings::resolve(&self.config, &definition.config);
        self.browser.configure(&settings.browser).await?;

        info!(
            workflow = %definition.name,
            steps = definition.steps.len(),
            browser = self.browser.name(),
            "Starting workflow"
        );

        let start = Instant::now();
        let mut run = Run::new(
            self.browser.as_ref(),
            self.sink.as_ref(),
            definition,
            settings,
            cancel,
        );
        let result = run.run().await;

        Ok(run.finish(result, start.elapsed()).await)
    }
}

/// State of one workflow run
struct Run<'a> {
    browser: &'a dyn Browser,
    sink: &'a dyn RecordSink,
    definition: &'a WorkflowDefinition,
    settings: RunSettings,
    cancel: &'a CancellationToken,
    context: ExecutionContext,
    outcome: WorkflowOutcome,
    collected: Vec<Value>,
    step_id: String,
    fail_fast_items: bool,
    navigated: bool,
    appending: bool,
}

impl<'a> Run<'a> {
    fn new(
        browser: &'a dyn Browser,
        sink: &'a dyn RecordSink,
        definition: &'a WorkflowDefinition,
        settings: RunSettings,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            browser,
            sink,
            definition,
            fail_fast_items: !settings.continue_on_item_error,
            settings,
            cancel,
            context: ExecutionContext::new(),
            outcome: WorkflowOutcome::new(definition.name.clone()),
            collected: Vec::new(),
            step_id: String::new(),
            navigated: false,
            appending: false,
        }
    }

    async fn run(&mut self) -> Result<(), WorkflowError> {
        let definition = self.definition;

        let start = ActionDefinition::Visit(VisitAction {
            url: Some(definition.start.clone()),
        });
        self.run_action(&start).await?;

        let mut current = definition.entry_step();
        let mut transitions = 0;

        while let Some(step_id) = current {
            if transitions >= self.settings.max_step_transitions {
                return Err(WorkflowError::TransitionLimit {
                    limit: self.settings.max_step_transitions,
                });
            }
            transitions += 1;

            let step = definition
                .step(step_id)
                .ok_or_else(|| WorkflowError::definition(format!("Unknown step '{}'", step_id)))?;

            self.step_id = step.id.clone();
            info!(workflow = %definition.name, step = %step.id, "Running step");

            self.run_step(step)
                .await
                .map_err(|e| WorkflowError::step_execution(step.id.clone(), e))?;

            self.outcome.steps_completed += 1;
            current = step.next_step();
        }

        Ok(())
    }

    async fn run_step(&mut self, step: &StepDefinition) -> Result<(), WorkflowError> {
        if let Some(condition) = &step.condition {
            let value = self.context.resolve(condition)?;
            if !is_truthy(&value) {
                info!(step = %step.id, condition = %condition, "Step condition is falsy, skipping");
                return Ok(());
            }
        }

        self.fail_fast_items = match step.on_item_error {
            Some(ItemErrorPolicy::Fail) => true,
            Some(ItemErrorPolicy::Skip) => false,
            None => !self.settings.continue_on_item_error,
        };

        match &step.for_each {
            Some(items) => {
                let items = self.resolve_sequence(items)?;
                info!(step = %step.id, items = items.len(), "Iterating step");
                self.run_items(&step.actions, items).await
            }
            None => {
                self.run_actions(&step.actions).await?;

                if let Some(pagination) = &step.pagination {
                    self.paginate(step, pagination).await?;
                }

                Ok(())
            }
        }
    }

    fn run_actions<'s>(&'s mut self, actions: &'s [ActionDefinition]) -> ActionFuture<'s> {
        Box::pin(async move {
            for action in actions {
                self.check_cancelled()?;
                self.run_action(action).await?;
            }
            Ok(())
        })
    }

    /// Run `actions` once per item, each in its own child scope
    async fn run_items(
        &mut self,
        actions: &[ActionDefinition],
        items: Vec<Value>,
    ) -> Result<(), WorkflowError> {
        let total = items.len();

        for (index, item) in items.into_iter().enumerate() {
            self.check_cancelled()?;
            debug!(step = %self.step_id, index, total, "Running item");

            self.context.push_item_scope(item, index);
            let result = self.run_actions(actions).await;
            self.context.pop_scope();
            self.outcome.items_processed += 1;

            match result {
                Ok(()) => {}
                Err(WorkflowError::Cancelled) => return Err(WorkflowError::Cancelled),
                Err(e) => {
                    self.outcome.items_failed += 1;
                    let error = WorkflowError::item_failed(self.step_id.clone(), index, e);

                    if self.fail_fast_items {
                        return Err(error);
                    }

                    warn!(step = %self.step_id, index, error = %error, "Skipping failed item");
                    self.outcome.record(&error);
                }
            }
        }

        Ok(())
    }

    /// Run one action, retrying retryable browser failures
    async fn run_action(&mut self, action: &ActionDefinition) -> Result<(), WorkflowError> {
        let kind = action.kind();
        let retryable = !matches!(
            action,
            ActionDefinition::Condition(_) | ActionDefinition::ForEach(_) | ActionDefinition::Set(_)
        );

        let started = Instant::now();
        let mut attempt = 0;

        let result = loop {
            debug!(action = kind, attempt, "Dispatching action");

            match self.dispatch(action).await {
                Err(e)
                    if retryable
                        && e.is_retryable()
                        && attempt < self.settings.retry.max_retries =>
                {
                    let delay = self.settings.retry.delay_for_attempt(attempt);
                    attempt += 1;
                    warn!(
                        action = kind,
                        attempt,
                        max_retries = self.settings.retry.max_retries,
                        error = %e,
                        "Action failed, retrying"
                    );
                    metrics::record_retry(kind);
                    self.pause(delay).await?;
                }
                other => break other,
            }
        };

        metrics::record_action(kind, result.is_ok(), started.elapsed());
        result
    }

    async fn dispatch(&mut self, action: &ActionDefinition) -> Result<(), WorkflowError> {
        match action {
            ActionDefinition::Visit(visit) => self.visit(visit).await,
            ActionDefinition::Wait(wait) => self.wait(wait).await,
            ActionDefinition::Extract(extract) => self.extract(extract).await,
            ActionDefinition::Click(click) => self.click(click).await,
            ActionDefinition::Save(save) => self.save(save).await,
            ActionDefinition::Condition(condition) => {
                let field = self.resolve_field(&condition.field)?;
                let expected = self.context.resolve_deep(&condition.value)?;
                let matched = condition.operator.evaluate(&field, &expected);
                self.log_arguments(
                    action.kind(),
                    &json!({"field": field, "value": expected, "matched": matched}),
                );

                let branch = if matched {
                    &condition.then
                } else {
                    &condition.otherwise
                };
                self.run_actions(branch).await
            }
            ActionDefinition::ForEach(for_each) => {
                let items = self.resolve_sequence(&for_each.items)?;
                self.run_items(&for_each.actions, items).await
            }
            ActionDefinition::Set(set) => {
                let value = self.context.resolve_deep(&set.value)?;
                self.log_arguments(action.kind(), &json!({"name": set.name, "value": value}));
                self.context.set(set.name.clone(), value);
                Ok(())
            }
        }
    }

    async fn visit(&mut self, action: &VisitAction) -> Result<(), WorkflowError> {
        let url = match &action.url {
            Some(url) => self.context.resolve_string(url)?,
            None => self
                .context
                .resolve_string(&format!("${{{}.href}}", CURRENT_ITEM))?,
        };

        if url.trim().is_empty() {
            return Err(WorkflowError::definition("visit resolved to an empty URL"));
        }

        self.log_arguments("visit", &json!({"url": url}));
        self.throttle().await?;

        let result = tokio::time::timeout(self.settings.timeout, self.browser.navigate(&url))
            .await
            .map_err(|_| {
                WorkflowError::timeout(
                    format!("navigate {}", url),
                    self.settings.timeout.as_millis() as u64,
                )
            })?;
        self.navigated = true;

        Ok(result?)
    }

    async fn wait(&mut self, action: &WaitAction) -> Result<(), WorkflowError> {
        match &action.selector {
            Some(selector) => {
                let selector = Selector::parse(&self.context.resolve_string(selector)?);
                let timeout = action
                    .timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or(self.settings.timeout);
                self.log_arguments(
                    "wait",
                    &json!({"selector": selector.to_string(), "timeout_ms": timeout.as_millis() as u64}),
                );

                Ok(self.browser.wait_for(&selector, timeout).await?)
            }
            None => {
                let pause = Duration::from_millis(action.timeout_ms.unwrap_or(DEFAULT_WAIT_MS));
                self.log_arguments("wait", &json!({"timeout_ms": pause.as_millis() as u64}));
                self.pause(pause).await
            }
        }
    }

    async fn click(&mut self, action: &ClickAction) -> Result<(), WorkflowError> {
        let selector = Selector::parse(&self.context.resolve_string(&action.element)?);
        self.log_arguments("click", &json!({"element": selector.to_string()}));
        self.click_selector(&selector).await?;

        if let Some(wait_for) = &action.wait_for {
            let wait_for = Selector::parse(&self.context.resolve_string(wait_for)?);
            self.browser.wait_for(&wait_for, self.settings.timeout).await?;
        }

        Ok(())
    }

    async fn click_selector(&mut self, selector: &Selector) -> Result<(), WorkflowError> {
        self.throttle().await?;

        let result = tokio::time::timeout(self.settings.timeout, self.browser.click(selector))
            .await
            .map_err(|_| {
                WorkflowError::timeout(
                    format!("click {}", selector),
                    self.settings.timeout.as_millis() as u64,
                )
            })?;
        self.navigated = true;

        Ok(result?)
    }

    async fn extract(&mut self, action: &ExtractAction) -> Result<(), WorkflowError> {
        let executor = ExtractionExecutor::new(self.browser);

        let value = match action.target {
            ExtractTarget::Links => Value::Array(self.extract_links(&executor, action).await?),
            ExtractTarget::Content => {
                Value::Object(self.extract_content(&executor, action).await?)
            }
        };

        let count = match &value {
            Value::Array(items) => items.len(),
            _ => 1,
        };
        metrics::record_items_extracted(action.target.as_str(), count);
        info!(step = %self.step_id, extraction = action.target.as_str(), count, "Extracted");

        match action.output_variable() {
            Some(name) if self.appending => {
                let items = match value {
                    Value::Array(items) => items,
                    other => vec![other],
                };
                self.context.append(name, items);
            }
            Some(name) => self.context.set(name, value),
            None => debug!(step = %self.step_id, "Extraction has no output variable"),
        }

        Ok(())
    }

    async fn extract_links(
        &self,
        executor: &ExtractionExecutor<'_>,
        action: &ExtractAction,
    ) -> Result<Vec<Value>, WorkflowError> {
        if let Some(schema) = &action.schema {
            let schema = normalize(&self.context.resolve_deep(schema)?);
            self.log_arguments("extract", &json!({"target": "links", "fields": schema.field_names()}));
            return Ok(executor.links_from_schema(&schema, None).await?);
        }

        let element = action
            .element
            .as_ref()
            .or_else(|| action.elements.first())
            .ok_or_else(|| WorkflowError::definition("links extraction needs an element or a schema"))?;

        let sample = Selector::parse(&self.context.resolve_string(&element.sample)?);
        let attribute = element
            .attribute
            .as_deref()
            .or(action.attribute.as_deref())
            .unwrap_or("href");
        let generalize = element.generalize.unwrap_or(true);

        self.log_arguments(
            "extract",
            &json!({"target": "links", "sample": sample.to_string(), "generalize": generalize}),
        );

        Ok(executor.links(&sample, generalize, attribute, None).await?)
    }

    async fn extract_content(
        &self,
        executor: &ExtractionExecutor<'_>,
        action: &ExtractAction,
    ) -> Result<Map<String, Value>, WorkflowError> {
        let fields = match &action.schema {
            Some(schema) => normalize(&self.context.resolve_deep(schema)?).fields,
            None => action
                .element
                .iter()
                .chain(&action.elements)
                .map(|spec| self.field_from_spec(spec))
                .collect::<Result<Vec<_>, _>>()?,
        };

        if fields.is_empty() {
            return Err(WorkflowError::definition("content extraction has no fields"));
        }

        let within = self.item_element().await;
        self.log_arguments(
            "extract",
            &json!({
                "target": "content",
                "fields": fields.iter().map(|f| f.name.as_str()).collect::<Vec<_>>(),
                "scoped": within.is_some(),
            }),
        );

        let mut record = executor.content(&fields, within.as_ref()).await?;

        if action.with_metadata {
            let url = self.browser.current_url().await;
            record.insert("url".to_string(), url.map(Value::String).unwrap_or(Value::Null));
            record.insert(
                "extracted_at".to_string(),
                Value::String(Utc::now().to_rfc3339()),
            );
        }

        Ok(record)
    }

    fn field_from_spec(&self, spec: &ElementSpec) -> Result<FieldSpec, WorkflowError> {
        let sample = self.context.resolve_string(&spec.sample)?;
        let name = spec.name.clone().unwrap_or_else(|| sample.clone());
        let kind = FieldKind::from_parts(None, spec.attribute.as_deref());

        Ok(FieldSpec::new(name, Selector::parse(&sample), kind)
            .with_generalize(spec.generalize.unwrap_or(false)))
    }

    /// Element of the current item, when it still belongs to the loaded page
    async fn item_element(&self) -> Option<ElementHandle> {
        let handle = self
            .context
            .get(CURRENT_ITEM)
            .and_then(|item| item.get("element"))
            .and_then(ElementHandle::from_value)?;

        if self.browser.is_attached(&handle).await {
            Some(handle)
        } else {
            debug!("Item element is no longer attached, extracting from the page");
            None
        }
    }

    async fn save(&mut self, action: &SaveAction) -> Result<(), WorkflowError> {
        let data = self.context.resolve_deep(&action.data)?;
        if !has_data(&data) {
            return Err(WorkflowError::persistence("save action has no data"));
        }

        if let Some(format) = action.format {
            let mut request = SaveRequest::new(data.clone(), format);
            if let Some(filename) = &action.filename {
                request = request.with_filename(self.context.resolve_string(filename)?);
            }
            if let Some(directory) = &self.settings.output_directory {
                request = request.with_directory(directory.clone());
            }

            self.log_arguments(
                "save",
                &json!({"format": format.to_string(), "filename": request.filename}),
            );

            let saved = self
                .sink
                .save(&request)
                .await
                .map_err(|e| WorkflowError::persistence(e.to_string()))?;
            info!(step = %self.step_id, location = %saved.location, bytes = saved.bytes, "Saved record");
        }

        match data {
            Value::Array(items) => self.collected.extend(items),
            other => self.collected.push(other),
        }

        Ok(())
    }

    /// Click through further pages, re-running the step's extractions
    async fn paginate(
        &mut self,
        step: &StepDefinition,
        pagination: &PaginationSpec,
    ) -> Result<(), WorkflowError> {
        let next_button = Selector::parse(&self.context.resolve_string(&pagination.next_button)?);

        for page in 2..=pagination.max_pages {
            self.check_cancelled()?;

            match self.browser.query_one(&next_button, None).await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    info!(step = %step.id, page, "No next button, pagination finished");
                    break;
                }
                Err(e) => {
                    warn!(step = %step.id, page, error = %e, "Next button lookup failed, pagination stopped");
                    break;
                }
            }

            match self.click_selector(&next_button).await {
                Ok(()) => {}
                Err(WorkflowError::Cancelled) => return Err(WorkflowError::Cancelled),
                Err(e) => {
                    warn!(step = %step.id, page, error = %e, "Next button not clickable, pagination stopped");
                    break;
                }
            }

            debug!(step = %step.id, page, "Extracting next page");

            self.appending = true;
            let result = self.run_extractions(step).await;
            self.appending = false;

            match result {
                Ok(()) => {}
                Err(WorkflowError::Cancelled) => return Err(WorkflowError::Cancelled),
                Err(e) => {
                    let error = WorkflowError::step_execution(step.id.clone(), e);
                    warn!(step = %step.id, page, error = %error, "Extraction failed, pagination stopped");
                    self.outcome.record(&error);
                    break;
                }
            }
        }

        Ok(())
    }

    async fn run_extractions(&mut self, step: &StepDefinition) -> Result<(), WorkflowError> {
        for action in step.actions.iter().filter(|action| action.is_extract()) {
            self.check_cancelled()?;
            self.run_action(action).await?;
        }
        Ok(())
    }

    /// Settle the outcome and persist collected records
    async fn finish(mut self, result: Result<(), WorkflowError>, elapsed: Duration) -> WorkflowOutcome {
        let aborted = match &result {
            Ok(()) => false,
            Err(e) => {
                error!(workflow = %self.definition.name, error = %e, "Workflow aborted");
                self.outcome.record(e);
                true
            }
        };

        if !self.collected.is_empty() {
            let saved = self
                .sink
                .save_collection(
                    &self.definition.slug(),
                    &self.collected,
                    self.settings.output_directory.clone(),
                )
                .await;

            match saved {
                Ok(saved) => {
                    info!(
                        workflow = %self.definition.name,
                        location = %saved.location,
                        records = self.collected.len(),
                        "Saved collected records"
                    );
                    self.outcome.output_file = Some(saved.location);
                }
                Err(e) => {
                    let error = WorkflowError::persistence(e.to_string());
                    error!(workflow = %self.definition.name, error = %error, "Failed to save collected records");
                    self.outcome.record(&error);
                }
            }
        }

        self.outcome.records_saved = self.collected.len();
        self.outcome.finish(aborted, elapsed.as_millis() as u64);
        metrics::record_workflow(self.outcome.status, elapsed);

        info!(
            workflow = %self.outcome.name,
            status = self.outcome.status.as_str(),
            steps = self.outcome.steps_completed,
            items = self.outcome.items_processed,
            failed_items = self.outcome.items_failed,
            elapsed_ms = self.outcome.execution_time_ms,
            "Workflow finished"
        );

        self.outcome
    }

    /// Condition fields may be a template or a bare variable path
    fn resolve_field(&self, field: &str) -> Result<Value, WorkflowError> {
        if has_tokens(field) {
            self.context.resolve(field)
        } else {
            self.context.resolve(&format!("${{{}}}", field.trim()))
        }
    }

    fn resolve_sequence(&self, template: &str) -> Result<Vec<Value>, WorkflowError> {
        match self.context.resolve(template)? {
            Value::Array(items) => Ok(items),
            Value::Null => {
                warn!(step = %self.step_id, items = %template, "for_each resolved to null, nothing to iterate");
                Ok(Vec::new())
            }
            other => Err(WorkflowError::definition(format!(
                "for_each '{}' resolved to {} instead of a sequence",
                template,
                type_name(&other)
            ))),
        }
    }

    /// Request delay between consecutive navigations
    async fn throttle(&self) -> Result<(), WorkflowError> {
        if self.navigated && !self.settings.delay.is_zero() {
            debug!(delay_ms = self.settings.delay.as_millis() as u64, "Request delay");
            self.pause(self.settings.delay).await?;
        }
        Ok(())
    }

    async fn pause(&self, duration: Duration) -> Result<(), WorkflowError> {
        if duration.is_zero() {
            return Ok(());
        }

        tokio::select! {
            _ = self.cancel.cancelled() => Err(WorkflowError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }

    fn check_cancelled(&self) -> Result<(), WorkflowError> {
        if self.cancel.is_cancelled() {
            Err(WorkflowError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn log_arguments(&self, kind: &str, arguments: &Value) {
        if self.settings.debug {
            info!(step = %self.step_id, action = kind, arguments = %arguments, "Action arguments");
        } else {
            debug!(step = %self.step_id, action = kind, arguments = %arguments, "Action arguments");
        }
    }
}

fn has_data(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a record",
    }
}
