//! Workflow definition entity and load-time validation

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use super::action::ActionDefinition;
use super::error::WorkflowError;
use super::template::Template;

/// Marker accepted in `next` for a terminal step
pub const FINISH: &str = "finish";

/// Per-workflow options overriding engine defaults. Unknown keys are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WorkflowConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headless: Option<bool>,

    #[serde(default, alias = "timeout", skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    #[serde(default, alias = "retries", skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,

    #[serde(default, alias = "request_delay", skip_serializing_if = "Option::is_none")]
    pub delay_seconds: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_directory: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<bool>,
}

/// Click-and-re-extract cycling attached to a step
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaginationSpec {
    pub next_button: String,

    /// Total pages visited including the first one
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
}

fn default_max_pages() -> usize {
    1
}

/// What happens when one `for_each` item fails
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ItemErrorPolicy {
    Skip,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepDefinition {
    #[serde(alias = "step")]
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,

    /// Template; the step is skipped when it resolves falsy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    /// Template evaluating to a sequence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub for_each: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_item_error: Option<ItemErrorPolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationSpec>,

    #[serde(default)]
    pub actions: Vec<ActionDefinition>,
}

impl StepDefinition {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            next: None,
            condition: None,
            for_each: None,
            on_item_error: None,
            pagination: None,
            actions: Vec::new(),
        }
    }

    pub fn with_next(mut self, next: impl Into<String>) -> Self {
        self.next = Some(next.into());
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn with_for_each(mut self, items: impl Into<String>) -> Self {
        self.for_each = Some(items.into());
        self
    }

    pub fn with_on_item_error(mut self, policy: ItemErrorPolicy) -> Self {
        self.on_item_error = Some(policy);
        self
    }

    pub fn with_pagination(mut self, next_button: impl Into<String>, max_pages: usize) -> Self {
        self.pagination = Some(PaginationSpec {
            next_button: next_button.into(),
            max_pages,
        });
        self
    }

    pub fn with_action(mut self, action: ActionDefinition) -> Self {
        self.actions.push(action);
        self
    }

    /// Successor step id; `finish` counts as none
    pub fn next_step(&self) -> Option<&str> {
        self.next
            .as_deref()
            .map(str::trim)
            .filter(|next| !next.is_empty() && *next != FINISH)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowDefinition {
    #[serde(alias = "workflow_name")]
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(
        default,
        deserialize_with = "deserialize_version",
        skip_serializing_if = "Option::is_none"
    )]
    pub version: Option<String>,

    #[serde(default)]
    pub config: WorkflowConfig,

    /// Initial URL, template-eligible
    #[serde(deserialize_with = "deserialize_start")]
    pub start: String,

    /// Designated entry step; the first step when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,

    #[serde(alias = "flow")]
    pub steps: Vec<StepDefinition>,
}

/// Limits enforced when validating a definition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefinitionLimits {
    pub max_for_each_depth: usize,
}

impl Default for DefinitionLimits {
    fn default() -> Self {
        Self {
            max_for_each_depth: 4,
        }
    }
}

impl WorkflowDefinition {
    pub fn new(name: impl Into<String>, start: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            version: None,
            config: WorkflowConfig::default(),
            start: start.into(),
            entry: None,
            steps: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: WorkflowConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_entry(mut self, entry: impl Into<String>) -> Self {
        self.entry = Some(entry.into());
        self
    }

    pub fn with_step(mut self, step: StepDefinition) -> Self {
        self.steps.push(step);
        self
    }

    pub fn step(&self, id: &str) -> Option<&StepDefinition> {
        self.steps.iter().find(|step| step.id == id)
    }

    /// Id of the step execution starts from
    pub fn entry_step(&self) -> Option<&str> {
        self.entry
            .as_deref()
            .or_else(|| self.steps.first().map(|step| step.id.as_str()))
    }

    /// File-name friendly form of the workflow name
    pub fn slug(&self) -> String {
        let slug: String = self
            .name
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
            .collect();

        if slug.is_empty() {
            "workflow".to_string()
        } else {
            slug
        }
    }

    /// Check the definition is self-consistent before any browser interaction
    pub fn validate(&self, limits: &DefinitionLimits) -> Result<(), WorkflowError> {
        if self.name.trim().is_empty() {
            return Err(WorkflowError::definition("workflow name is empty"));
        }

        if self.start.trim().is_empty() {
            return Err(WorkflowError::definition(format!(
                "workflow '{}' has no start URL",
                self.name
            )));
        }
        parse_template(&self.start)?;

        if self.steps.is_empty() {
            return Err(WorkflowError::definition(format!(
                "workflow '{}' has no steps",
                self.name
            )));
        }

        let mut index: HashMap<&str, &StepDefinition> = HashMap::new();
        for step in &self.steps {
            if step.id.trim().is_empty() {
                return Err(WorkflowError::definition("step id is empty"));
            }
            if index.insert(step.id.as_str(), step).is_some() {
                return Err(WorkflowError::definition(format!(
                    "duplicate step id '{}'",
                    step.id
                )));
            }
        }

        for step in &self.steps {
            self.validate_step(step, &index, limits)?;
        }

        let entry = self
            .entry_step()
            .ok_or_else(|| WorkflowError::definition("no entry step"))?;
        if !index.contains_key(entry) {
            return Err(WorkflowError::definition(format!(
                "entry step '{}' does not exist",
                entry
            )));
        }

        let mut visited: HashSet<&str> = HashSet::new();
        let mut current = Some(entry);
        while let Some(id) = current {
            if !visited.insert(id) {
                return Err(WorkflowError::definition(format!(
                    "step chain never terminates: step '{}' is reached twice",
                    id
                )));
            }
            current = index.get(id).and_then(|step| step.next_step());
        }

        for step in &self.steps {
            if !visited.contains(step.id.as_str()) {
                warn!(
                    workflow = %self.name,
                    step = %step.id,
                    "Step is unreachable from the entry step"
                );
            }
        }

        Ok(())
    }

    fn validate_step(
        &self,
        step: &StepDefinition,
        index: &HashMap<&str, &StepDefinition>,
        limits: &DefinitionLimits,
    ) -> Result<(), WorkflowError> {
        let context = |message: String| {
            WorkflowError::definition(format!("step '{}': {}", step.id, message))
        };

        if let Some(next) = step.next_step() {
            if !index.contains_key(next) {
                return Err(context(format!("unknown next step '{}'", next)));
            }
        }

        if let Some(pagination) = &step.pagination {
            if step.for_each.is_some() {
                return Err(context(
                    "pagination cannot be combined with for_each".to_string(),
                ));
            }
            if pagination.max_pages < 1 {
                return Err(context("pagination max_pages must be at least 1".to_string()));
            }
            if pagination.next_button.trim().is_empty() {
                return Err(context("pagination next_button is empty".to_string()));
            }
            if !step.actions.iter().any(ActionDefinition::is_extract) {
                return Err(context("pagination requires an extract action".to_string()));
            }
        }

        for template in step.for_each.iter().chain(step.condition.iter()) {
            parse_template(template)?;
        }

        let base_depth = usize::from(step.for_each.is_some());
        let depth = base_depth + max_for_each_depth(&step.actions);
        if depth > limits.max_for_each_depth {
            return Err(context(format!(
                "for_each nesting depth {} exceeds the limit of {}",
                depth, limits.max_for_each_depth
            )));
        }

        Ok(())
    }
}

fn parse_template(template: &str) -> Result<(), WorkflowError> {
    Template::parse(template).map(|_| ())
}

/// Deepest chain of nested `for_each` actions
fn max_for_each_depth(actions: &[ActionDefinition]) -> usize {
    actions
        .iter()
        .map(|action| {
            let own = usize::from(matches!(action, ActionDefinition::ForEach(_)));
            let nested = action
                .nested()
                .into_iter()
                .map(max_for_each_depth)
                .max()
                .unwrap_or(0);
            own + nested
        })
        .max()
        .unwrap_or(0)
}

/// `start` is either a URL string or a table with a `url` key
fn deserialize_start<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Start {
        Url(String),
        Table { url: String },
    }

    Ok(match Start::deserialize(deserializer)? {
        Start::Url(url) | Start::Table { url } => url,
    })
}

/// Versions may be written as numbers (`1.0`) or strings
fn deserialize_version<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Version {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(Option::<Version>::deserialize(deserializer)?.map(|version| match version {
        Version::Text(text) => text,
        Version::Number(number) => number.to_string(),
    }))
}
