//! Structural ancestry of an element, as seen by the selector generalizer

use serde::{Deserialize, Serialize};

/// One element on the path from the document root to a sample element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Lowercase tag name
    pub tag: String,

    pub id: Option<String>,

    pub classes: Vec<String>,

    /// 1-based position among siblings with the same tag
    pub position: usize,

    /// Siblings (self included) with the same tag
    pub same_tag_siblings: usize,

    /// Siblings (self included) with the same tag and class list
    pub same_signature_siblings: usize,
}

impl NodeInfo {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            id: None,
            classes: Vec::new(),
            position: 1,
            same_tag_siblings: 1,
            same_signature_siblings: 1,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_classes(mut self, classes: &[&str]) -> Self {
        self.classes = classes.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_position(mut self, position: usize, same_tag_siblings: usize) -> Self {
        self.position = position;
        self.same_tag_siblings = same_tag_siblings;
        self
    }

    pub fn with_signature_siblings(mut self, count: usize) -> Self {
        self.same_signature_siblings = count;
        self
    }

    /// Whether this node repeats structurally among its siblings
    pub fn is_repeated(&self) -> bool {
        self.same_signature_siblings > 1
    }

    /// `tag.class1.class2`, positional-free
    pub fn signature_selector(&self) -> String {
        let mut selector = self.tag.clone();
        for class in &self.classes {
            if is_css_identifier(class) {
                selector.push('.');
                selector.push_str(class);
            }
        }
        selector
    }

    /// `tag:nth-of-type(n)`, or just the tag when it has no same-tag siblings
    pub fn positional_selector(&self) -> String {
        if self.same_tag_siblings > 1 {
            format!("{}:nth-of-type({})", self.tag, self.position)
        } else {
            self.tag.clone()
        }
    }

    /// `#id` when the id is a plain CSS identifier
    pub fn id_selector(&self) -> Option<String> {
        self.id
            .as_deref()
            .filter(|id| is_css_identifier(id))
            .map(|id| format!("#{}", id))
    }
}

/// Path of nodes from the document root down to the sample element
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AncestrySnapshot {
    pub nodes: Vec<NodeInfo>,
}

impl AncestrySnapshot {
    pub fn new(nodes: Vec<NodeInfo>) -> Self {
        Self { nodes }
    }

    pub fn sample(&self) -> Option<&NodeInfo> {
        self.nodes.last()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Identifiers usable unescaped in a CSS selector
pub(crate) fn is_css_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '-' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
