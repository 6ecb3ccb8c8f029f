//! Workflow execution context
//!
//! A stack of variable scopes. The root scope lives for the whole workflow
//! run; `for_each` pushes a child scope per item which is discarded when the
//! item's run ends. Lookups search from the innermost scope outwards.

use serde_json::{Map, Value};

use super::error::WorkflowError;
use super::template::{self, VariablePath};

/// Name bound to the element being iterated in a `for_each` scope
pub const CURRENT_ITEM: &str = "current_item";

/// Name bound to the zero-based iteration index in a `for_each` scope
pub const CURRENT_INDEX: &str = "current_index";

#[derive(Debug, Clone)]
pub struct ExecutionContext {
    scopes: Vec<Map<String, Value>>,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self {
            scopes: vec![Map::new()],
        }
    }

    /// Number of scopes including the root
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Map::new());
    }

    /// Push a scope seeded with the iteration bindings
    pub fn push_item_scope(&mut self, item: Value, index: usize) {
        let mut scope = Map::new();
        scope.insert(CURRENT_ITEM.to_string(), item);
        scope.insert(CURRENT_INDEX.to_string(), Value::from(index));
        self.scopes.push(scope);
    }

    /// Discard the innermost scope. The root scope is never removed.
    pub fn pop_scope(&mut self) -> Option<Map<String, Value>> {
        if self.scopes.len() > 1 {
            self.scopes.pop()
        } else {
            None
        }
    }

    /// Bind a variable in the innermost scope
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.into(), value);
        }
    }

    /// Append items to a sequence variable in the innermost scope
    ///
    /// A missing or non-sequence binding is replaced by the new items.
    pub fn append(&mut self, name: &str, items: Vec<Value>) {
        let Some(scope) = self.scopes.last_mut() else {
            return;
        };

        match scope.get_mut(name) {
            Some(Value::Array(existing)) => existing.extend(items),
            _ => {
                scope.insert(name.to_string(), Value::Array(items));
            }
        }
    }

    /// Look up a variable by name, innermost scope first
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    /// Look up a full variable path
    pub fn lookup(&self, path: &VariablePath) -> Option<&Value> {
        self.get(&path.root).and_then(|root| path.walk(root))
    }

    /// All visible bindings, inner scopes shadowing outer ones
    pub fn snapshot(&self) -> Value {
        let mut merged = Map::new();
        for scope in &self.scopes {
            for (name, value) in scope {
                merged.insert(name.clone(), value.clone());
            }
        }
        Value::Object(merged)
    }

    pub fn resolve(&self, template: &str) -> Result<Value, WorkflowError> {
        template::resolve(self, template)
    }

    pub fn resolve_deep(&self, value: &Value) -> Result<Value, WorkflowError> {
        template::resolve_deep(self, value)
    }

    /// Resolve a template and stringify the result
    pub fn resolve_string(&self, template: &str) -> Result<String, WorkflowError> {
        self.resolve(template)
            .map(|value| template::value_to_string(&value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_walks_scopes_outwards() {
        let mut ctx = ExecutionContext::new();
        ctx.set("site", json!({"host": "example.com"}));
        ctx.push_item_scope(json!({"href": "/a"}), 0);

        assert_eq!(ctx.get("site"), Some(&json!({"host": "example.com"})));
        assert_eq!(ctx.get(CURRENT_ITEM), Some(&json!({"href": "/a"})));
        assert_eq!(ctx.get(CURRENT_INDEX), Some(&json!(0)));
        assert_eq!(ctx.depth(), 2);
    }

    #[test]
    fn test_item_scope_isolation() {
        let mut ctx = ExecutionContext::new();
        ctx.set("shared", json!("root"));

        ctx.push_item_scope(json!("first"), 0);
        ctx.set("detail", json!("from first"));
        ctx.set("shared", json!("shadowed"));
        assert_eq!(ctx.get("shared"), Some(&json!("shadowed")));
        ctx.pop_scope();

        ctx.push_item_scope(json!("second"), 1);
        assert_eq!(ctx.get("detail"), None);
        assert_eq!(ctx.get("shared"), Some(&json!("root")));
        ctx.pop_scope();

        assert_eq!(ctx.get("detail"), None);
        assert_eq!(ctx.get(CURRENT_ITEM), None);
        assert_eq!(ctx.depth(), 1);
    }

    #[test]
    fn test_root_scope_is_never_popped() {
        let mut ctx = ExecutionContext::new();
        ctx.set("x", json!(1));

        assert!(ctx.pop_scope().is_none());
        assert_eq!(ctx.get("x"), Some(&json!(1)));
    }

    #[test]
    fn test_append_accumulates() {
        let mut ctx = ExecutionContext::new();
        ctx.append("links", vec![json!(1), json!(2)]);
        ctx.append("links", vec![json!(3)]);
        assert_eq!(ctx.get("links"), Some(&json!([1, 2, 3])));

        ctx.set("scalar", json!("x"));
        ctx.append("scalar", vec![json!(4)]);
        assert_eq!(ctx.get("scalar"), Some(&json!([4])));
    }

    #[test]
    fn test_snapshot_shadows() {
        let mut ctx = ExecutionContext::new();
        ctx.set("a", json!(1));
        ctx.set("b", json!(2));
        ctx.push_scope();
        ctx.set("b", json!(3));

        assert_eq!(ctx.snapshot(), json!({"a": 1, "b": 3}));
    }

    #[test]
    fn test_resolve_string() {
        let mut ctx = ExecutionContext::new();
        ctx.set("page", json!(2));

        assert_eq!(ctx.resolve_string("${page}").unwrap(), "2");
    }
}
