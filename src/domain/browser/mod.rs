//! Browser capability
//!
//! The engine drives pages only through the [`Browser`] trait. Calls are
//! awaited one at a time by a single step machine.

mod ancestry;
mod selector;

pub use ancestry::{AncestrySnapshot, NodeInfo};
pub use selector::Selector;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::domain::DomainError;

/// Reference to an element of the current page
///
/// `generation` changes on every navigation, so handles from an earlier page
/// are detectably stale. `path` is the element-child index path from the
/// document root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle {
    pub generation: u64,
    pub path: Vec<usize>,
}

impl ElementHandle {
    pub fn new(generation: u64, path: Vec<usize>) -> Self {
        Self { generation, path }
    }

    /// True when `other` is this element or one of its descendants
    pub fn contains(&self, other: &ElementHandle) -> bool {
        self.generation == other.generation && other.path.starts_with(&self.path)
    }

    pub fn to_value(&self) -> Value {
        json!({"generation": self.generation, "path": self.path})
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

/// Session options applied before a workflow starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserOptions {
    pub headless: bool,
    pub user_agent: Option<String>,
    pub timeout_ms: u64,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: true,
            user_agent: None,
            timeout_ms: 30_000,
        }
    }
}

#[async_trait]
pub trait Browser: Send + Sync + std::fmt::Debug {
    /// Name of the browser implementation
    fn name(&self) -> &'static str;

    async fn configure(&self, options: &BrowserOptions) -> Result<(), DomainError>;

    async fn navigate(&self, url: &str) -> Result<(), DomainError>;

    /// URL of the current page, if any page is loaded
    async fn current_url(&self) -> Option<String>;

    /// Absolute form of `href` relative to the current page
    ///
    /// `None` for targets that never lead to a page (`#..`, `javascript:`,
    /// `mailto:`) or that cannot be resolved.
    async fn resolve_url(&self, href: &str) -> Option<String>;

    /// Wait until `selector` matches at least one element
    async fn wait_for(&self, selector: &Selector, timeout: Duration) -> Result<(), DomainError>;

    /// Click the first element matching `selector`
    async fn click(&self, selector: &Selector) -> Result<(), DomainError>;

    /// All matches in document order, optionally scoped to a subtree
    async fn query_all(
        &self,
        selector: &Selector,
        within: Option<&ElementHandle>,
    ) -> Result<Vec<ElementHandle>, DomainError>;

    async fn query_one(
        &self,
        selector: &Selector,
        within: Option<&ElementHandle>,
    ) -> Result<Option<ElementHandle>, DomainError> {
        Ok(self.query_all(selector, within).await?.into_iter().next())
    }

    /// Text content of the element
    async fn text(&self, handle: &ElementHandle) -> Result<String, DomainError>;

    async fn attribute(
        &self,
        handle: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, DomainError>;

    /// Inner or outer HTML of the element
    async fn html(&self, handle: &ElementHandle, outer: bool) -> Result<String, DomainError>;

    async fn ancestry(&self, handle: &ElementHandle) -> Result<AncestrySnapshot, DomainError>;

    /// False when the handle belongs to an earlier page
    async fn is_attached(&self, handle: &ElementHandle) -> bool;
}
