//! Domain layer - Core workflow, extraction and capability types

pub mod browser;
pub mod error;
pub mod extraction;
pub mod persistence;
pub mod workflow;

pub use browser::{AncestrySnapshot, Browser, BrowserOptions, ElementHandle, NodeInfo, Selector};
pub use error::DomainError;
pub use extraction::{CanonicalSchema, FieldKind, FieldSpec, RawSchema, Transform};
pub use persistence::{RecordSink, SaveFormat, SaveRequest, SavedRecord};
pub use workflow::{
    ActionDefinition, ExecutionContext, RunReport, StepDefinition, WorkflowDefinition,
    WorkflowError, WorkflowExecutor, WorkflowOutcome, WorkflowStatus,
};
