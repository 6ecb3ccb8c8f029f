//! Workflow domain module
//!
//! A workflow is a chain of steps. Each step runs an ordered list of actions,
//! optionally once per element of a sequence (`for_each`) and optionally
//! across several pages (`pagination`).
//!
//! ## Variable References
//!
//! Action arguments may reference variables bound by earlier actions:
//! - `${news_items}` - the whole value, keeping its type
//! - `${article.title}` - nested record field
//! - `${news_items[2].href}` - sequence element
//! - `${limit:10}` - with default value

mod action;
mod context;
mod definition;
mod error;
mod executor;
mod report;
mod retry;
pub mod template;

pub use action::{
    is_truthy, ActionDefinition, ClickAction, ConditionAction, ConditionOperator, ElementSpec,
    ExtractAction, ExtractTarget, ForEachAction, SaveAction, SetAction, VisitAction, WaitAction,
};
pub use context::{ExecutionContext, CURRENT_INDEX, CURRENT_ITEM};
pub use definition::{
    DefinitionLimits, ItemErrorPolicy, PaginationSpec, StepDefinition, WorkflowConfig,
    WorkflowDefinition, FINISH,
};
pub use error::WorkflowError;
pub use executor::WorkflowExecutor;
pub use report::{FailureKind, FailureRecord, RunReport, WorkflowOutcome, WorkflowStatus};
pub use retry::RetryConfig;

#[cfg(test)]
pub use executor::MockWorkflowExecutor;
