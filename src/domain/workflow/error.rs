//! Workflow error types

use thiserror::Error;

use super::report::FailureKind;
use crate::domain::DomainError;

/// Errors that can occur while validating or running a workflow
#[derive(Debug, Clone, Error, PartialEq)]
pub enum WorkflowError {
    #[error("Invalid workflow definition: {0}")]
    Definition(String),

    #[error("Unresolved variable: ${{{path}}}")]
    UnresolvedVariable { path: String },

    #[error("Invalid template '{template}': {message}")]
    InvalidTemplate { template: String, message: String },

    #[error("No element matched selector '{selector}'")]
    ExtractionMiss { selector: String },

    #[error("Capability failure ({capability}): {message}")]
    Capability { capability: String, message: String },

    #[error("Timed out after {timeout_ms}ms: {operation}")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("Step '{step}' failed: {cause}")]
    StepExecution {
        step: String,
        cause: Box<WorkflowError>,
    },

    #[error("Item {index} of step '{step}' failed: {cause}")]
    ItemFailed {
        step: String,
        index: usize,
        cause: Box<WorkflowError>,
    },

    #[error("Step transition limit of {limit} exceeded")]
    TransitionLimit { limit: usize },

    #[error("Workflow run was cancelled")]
    Cancelled,

    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WorkflowError {
    pub fn definition(message: impl Into<String>) -> Self {
        Self::Definition(message.into())
    }

    pub fn unresolved_variable(path: impl Into<String>) -> Self {
        Self::UnresolvedVariable { path: path.into() }
    }

    pub fn invalid_template(template: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidTemplate {
            template: template.into(),
            message: message.into(),
        }
    }

    pub fn extraction_miss(selector: impl Into<String>) -> Self {
        Self::ExtractionMiss {
            selector: selector.into(),
        }
    }

    pub fn capability(capability: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Capability {
            capability: capability.into(),
            message: message.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    pub fn step_execution(step: impl Into<String>, cause: WorkflowError) -> Self {
        Self::StepExecution {
            step: step.into(),
            cause: Box::new(cause),
        }
    }

    pub fn item_failed(step: impl Into<String>, index: usize, cause: WorkflowError) -> Self {
        Self::ItemFailed {
            step: step.into(),
            index,
            cause: Box::new(cause),
        }
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether retrying the failed operation may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Capability { .. } | Self::Timeout { .. } => true,
            Self::StepExecution { cause, .. } | Self::ItemFailed { cause, .. } => {
                cause.is_retryable()
            }
            _ => false,
        }
    }

    /// Report category of this failure
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Definition(_) | Self::InvalidTemplate { .. } | Self::TransitionLimit { .. } => {
                FailureKind::Definition
            }
            Self::UnresolvedVariable { .. } => FailureKind::UnresolvedVariable,
            Self::ExtractionMiss { .. } => FailureKind::ExtractionMiss,
            Self::Capability { .. } | Self::Timeout { .. } => FailureKind::Capability,
            Self::StepExecution { cause, .. } | Self::ItemFailed { cause, .. } => cause.kind(),
            Self::Cancelled => FailureKind::Cancelled,
            Self::Persistence(_) => FailureKind::Persistence,
            Self::Internal(_) => FailureKind::Internal,
        }
    }

    /// Innermost error, without step or item wrappers
    pub fn root_cause(&self) -> &WorkflowError {
        match self {
            Self::StepExecution { cause, .. } | Self::ItemFailed { cause, .. } => {
                cause.root_cause()
            }
            other => other,
        }
    }
}

impl From<DomainError> for WorkflowError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::Capability {
                capability,
                message,
            } => Self::Capability {
                capability,
                message,
            },
            DomainError::Timeout {
                operation,
                timeout_ms,
            } => Self::Timeout {
                operation,
                timeout_ms,
            },
            DomainError::NotFound { message } => Self::capability("browser", message),
            DomainError::Storage { message } => Self::Persistence(message),
            DomainError::Validation { message } | DomainError::Configuration { message } => {
                Self::Definition(message)
            }
            DomainError::Internal { message } => Self::Internal(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = WorkflowError::unresolved_variable("news_items[3].href");
        assert_eq!(err.to_string(), "Unresolved variable: ${news_items[3].href}");

        let err = WorkflowError::item_failed(
            "details",
            2,
            WorkflowError::timeout("navigate https://example.com/a", 5000),
        );
        assert_eq!(
            err.to_string(),
            "Item 2 of step 'details' failed: Timed out after 5000ms: navigate https://example.com/a"
        );
    }

    #[test]
    fn test_retryable_errors() {
        assert!(WorkflowError::capability("browser", "connection reset").is_retryable());
        assert!(WorkflowError::timeout("wait", 100).is_retryable());
        assert!(!WorkflowError::unresolved_variable("x").is_retryable());
        assert!(!WorkflowError::definition("bad").is_retryable());
        assert!(!WorkflowError::Cancelled.is_retryable());
    }

    #[test]
    fn test_kind_delegates_through_wrappers() {
        let err = WorkflowError::step_execution(
            "list",
            WorkflowError::item_failed("list", 0, WorkflowError::persistence("disk full")),
        );
        assert_eq!(err.kind(), FailureKind::Persistence);
        assert_eq!(err.root_cause(), &WorkflowError::persistence("disk full"));
    }

    #[test]
    fn test_from_domain_error() {
        let err: WorkflowError = DomainError::timeout("navigate", 10).into();
        assert_eq!(err, WorkflowError::timeout("navigate", 10));

        let err: WorkflowError = DomainError::storage("read-only").into();
        assert_eq!(err.kind(), FailureKind::Persistence);
    }
}
