//! Template parsing and resolution
//!
//! Templates embed variable references with `${path}` or `${path:default}`:
//! - `${article.title}` - dotted record access
//! - `${news_items[2].href}` / `${news_items.2.href}` - sequence indexing
//! - `${page_size:20}` - default used when the path is missing (parsed as JSON when possible)
//!
//! A template made of exactly one token resolves to the native value of the
//! variable. Anything else resolves to a string.

use std::fmt;

use serde_json::Value;

use super::context::ExecutionContext;
use super::error::WorkflowError;

/// One step of a variable path after its root name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// `.name` or `.0`
    Key(String),
    /// `[0]`
    Index(usize),
}

/// A parsed variable path such as `news_items[1].href`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariablePath {
    pub root: String,
    pub segments: Vec<PathSegment>,
}

impl VariablePath {
    /// Parse a bare path (without `${` and `}`)
    pub fn parse(input: &str) -> Result<Self, String> {
        PathParser::new(input.trim()).parse()
    }

    /// Walk the path segments starting from a root value
    pub fn walk<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(root, |current, segment| match (segment, current) {
                (PathSegment::Key(key), Value::Object(map)) => map.get(key),
                (PathSegment::Key(key), Value::Array(items)) => {
                    key.parse::<usize>().ok().and_then(|i| items.get(i))
                }
                (PathSegment::Index(index), Value::Array(items)) => items.get(*index),
                (PathSegment::Index(index), Value::Object(map)) => map.get(&index.to_string()),
                _ => None,
            })
    }
}

impl fmt::Display for VariablePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)?;
        for segment in &self.segments {
            match segment {
                PathSegment::Key(key) => write!(f, ".{}", key)?,
                PathSegment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

struct PathParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> PathParser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn parse(mut self) -> Result<VariablePath, String> {
        if self.input.is_empty() {
            return Err("empty variable path".to_string());
        }

        let root = self.identifier()?;
        let mut segments = Vec::new();

        while let Some(c) = self.peek() {
            match c {
                '.' => {
                    self.pos += 1;
                    let key = match self.peek() {
                        Some(d) if d.is_ascii_digit() => self.digits()?,
                        _ => self.identifier()?,
                    };
                    segments.push(PathSegment::Key(key));
                }
                '[' => {
                    self.pos += 1;
                    let digits = self.digits()?;
                    if self.peek() != Some(']') {
                        return Err(format!("expected ']' at offset {}", self.pos));
                    }
                    self.pos += 1;
                    let index = digits
                        .parse::<usize>()
                        .map_err(|e| format!("invalid index '{}': {}", digits, e))?;
                    segments.push(PathSegment::Index(index));
                }
                other => {
                    return Err(format!("unexpected '{}' at offset {}", other, self.pos));
                }
            }
        }

        Ok(VariablePath { root, segments })
    }

    fn identifier(&mut self) -> Result<String, String> {
        let start = self.pos;

        match self.peek() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => self.pos += c.len_utf8(),
            Some(c) => return Err(format!("unexpected '{}' at offset {}", c, self.pos)),
            None => return Err("expected an identifier".to_string()),
        }

        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }

        Ok(self.input[start..self.pos].to_string())
    }

    fn digits(&mut self) -> Result<String, String> {
        let start = self.pos;

        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.pos += 1;
            } else {
                break;
            }
        }

        if start == self.pos {
            return Err(format!("expected digits at offset {}", self.pos));
        }

        Ok(self.input[start..self.pos].to_string())
    }
}

/// A `${...}` reference inside a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub path: VariablePath,
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Token(Token),
}

/// A parsed template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(input: &str) -> Result<Self, WorkflowError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = input;

        while let Some(start) = rest.find("${") {
            literal.push_str(&rest[..start]);
            let body_start = start + 2;
            let body_len = closing_brace(&rest[body_start..]).ok_or_else(|| {
                WorkflowError::invalid_template(input, "unterminated '${'")
            })?;
            let body = &rest[body_start..body_start + body_len];

            let (path, default) = match body.split_once(':') {
                Some((path, default)) => (path, Some(default.to_string())),
                None => (body, None),
            };
            let path = VariablePath::parse(path)
                .map_err(|message| WorkflowError::invalid_template(input, message))?;

            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Token(Token { path, default }));

            rest = &rest[body_start + body_len + 1..];
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// True when the template holds no `${...}` tokens
    pub fn is_literal(&self) -> bool {
        self.segments
            .iter()
            .all(|segment| matches!(segment, Segment::Literal(_)))
    }

    /// Variable paths referenced by this template
    pub fn variables(&self) -> impl Iterator<Item = &VariablePath> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Token(token) => Some(&token.path),
            Segment::Literal(_) => None,
        })
    }

    /// Render the template against a context
    pub fn render(&self, context: &ExecutionContext) -> Result<Value, WorkflowError> {
        if let [Segment::Token(token)] = self.segments.as_slice() {
            return resolve_token(context, token);
        }

        let mut output = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => output.push_str(text),
                Segment::Token(token) => {
                    output.push_str(&value_to_string(&resolve_token(context, token)?))
                }
            }
        }

        Ok(Value::String(output))
    }
}

/// Length of a token body up to its balancing `}`
fn closing_brace(body: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (index, c) in body.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' if depth == 0 => return Some(index),
            '}' => depth -= 1,
            _ => {}
        }
    }

    None
}

fn resolve_token(context: &ExecutionContext, token: &Token) -> Result<Value, WorkflowError> {
    match context.lookup(&token.path) {
        Some(value) => Ok(value.clone()),
        None => match &token.default {
            Some(default) => Ok(parse_default_value(default)),
            None => Err(WorkflowError::unresolved_variable(token.path.to_string())),
        },
    }
}

/// Resolve a template string against a context
pub fn resolve(context: &ExecutionContext, template: &str) -> Result<Value, WorkflowError> {
    if !has_tokens(template) {
        return Ok(Value::String(template.to_string()));
    }

    Template::parse(template)?.render(context)
}

/// Recursively resolve every string leaf of a structure
pub fn resolve_deep(context: &ExecutionContext, value: &Value) -> Result<Value, WorkflowError> {
    match value {
        Value::String(template) => resolve(context, template),
        Value::Array(items) => items
            .iter()
            .map(|item| resolve_deep(context, item))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => map
            .iter()
            .map(|(key, item)| Ok((key.clone(), resolve_deep(context, item)?)))
            .collect::<Result<serde_json::Map<_, _>, WorkflowError>>()
            .map(Value::Object),
        other => Ok(other.clone()),
    }
}

/// Check if a string contains any variable references
pub fn has_tokens(template: &str) -> bool {
    template.contains("${")
}

/// Parse a default value string into a JSON value
fn parse_default_value(default: &str) -> Value {
    serde_json::from_str::<Value>(default).unwrap_or_else(|_| Value::String(default.to_string()))
}

/// Convert a JSON value to its string form
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),

        // For arrays and objects, use JSON representation
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context(root: Value) -> ExecutionContext {
        let mut ctx = ExecutionContext::new();
        if let Value::Object(map) = root {
            for (name, value) in map {
                ctx.set(name, value);
            }
        }
        ctx
    }

    #[test]
    fn test_template_without_tokens_is_unchanged() {
        let ctx = ExecutionContext::new();
        let template = "https://example.com/news?page=1 {not a token} $5";

        assert_eq!(resolve(&ctx, template).unwrap(), json!(template));
    }

    #[test]
    fn test_single_token_preserves_native_value() {
        let article = json!({"title": "Hello", "tags": ["a", "b"], "score": 4.5});
        let ctx = context(json!({"article": article.clone()}));

        assert_eq!(resolve(&ctx, "${article}").unwrap(), article);
        assert_eq!(resolve(&ctx, "${article.tags}").unwrap(), json!(["a", "b"]));
        assert_eq!(resolve(&ctx, "${article.score}").unwrap(), json!(4.5));
    }

    #[test]
    fn test_indexed_path_resolution() {
        let ctx = context(json!({"news_items": [{"href": "a"}, {"href": "b"}]}));

        assert_eq!(resolve(&ctx, "${news_items[1].href}").unwrap(), json!("b"));
        assert_eq!(resolve(&ctx, "${news_items.0.href}").unwrap(), json!("a"));
    }

    #[test]
    fn test_mixed_template_stringifies() {
        let ctx = context(json!({"page": 3, "site": {"host": "example.com"}, "flag": true}));

        assert_eq!(
            resolve(&ctx, "https://${site.host}/list?page=${page}&f=${flag}").unwrap(),
            json!("https://example.com/list?page=3&f=true")
        );
        assert_eq!(
            resolve(&ctx, "site=${site}").unwrap(),
            json!("site={\"host\":\"example.com\"}")
        );
    }

    #[test]
    fn test_missing_variable_fails() {
        let ctx = ExecutionContext::new();

        let err = resolve(&ctx, "${missing}").unwrap_err();
        assert_eq!(err, WorkflowError::unresolved_variable("missing"));

        let err = resolve(&ctx, "prefix ${a.b[0]} suffix").unwrap_err();
        assert_eq!(err, WorkflowError::unresolved_variable("a.b[0]"));
    }

    #[test]
    fn test_default_values() {
        let ctx = ExecutionContext::new();

        assert_eq!(resolve(&ctx, "${limit:20}").unwrap(), json!(20));
        assert_eq!(resolve(&ctx, "${mode:fast}").unwrap(), json!("fast"));
        assert_eq!(resolve(&ctx, "${opts:{\"a\":1}}").unwrap(), json!({"a": 1}));
        assert_eq!(resolve(&ctx, "n=${limit:20}").unwrap(), json!("n=20"));
    }

    #[test]
    fn test_null_value_is_not_missing() {
        let ctx = context(json!({"title": null}));

        assert_eq!(resolve(&ctx, "${title:x}").unwrap(), Value::Null);
        assert_eq!(resolve(&ctx, "[${title}]").unwrap(), json!("[]"));
    }

    #[test]
    fn test_invalid_templates() {
        let ctx = ExecutionContext::new();

        for template in ["${unterminated", "${}", "${9lives}", "${a[x]}", "${a..b}", "${a b}"] {
            let err = resolve(&ctx, template).unwrap_err();
            assert!(
                matches!(err, WorkflowError::InvalidTemplate { .. }),
                "expected InvalidTemplate for {template}, got {err:?}"
            );
        }
    }

    #[test]
    fn test_resolve_deep() {
        let ctx = context(json!({"item": {"href": "/a", "text": "A"}, "count": 2}));
        let input = json!({
            "url": "${item.href}",
            "meta": {"label": "Item ${item.text}", "n": "${count}"},
            "list": ["${item.text}", 7, null, true],
            "${item.text}": "keys are not templates"
        });

        assert_eq!(
            resolve_deep(&ctx, &input).unwrap(),
            json!({
                "url": "/a",
                "meta": {"label": "Item A", "n": 2},
                "list": ["A", 7, null, true],
                "${item.text}": "keys are not templates"
            })
        );
    }

    #[test]
    fn test_template_variables() {
        let template = Template::parse("${a.b} and ${c[1]:x}").unwrap();
        let names: Vec<String> = template.variables().map(|v| v.to_string()).collect();

        assert_eq!(names, vec!["a.b", "c[1]"]);
        assert!(!template.is_literal());
        assert!(Template::parse("plain").unwrap().is_literal());
    }
}
