//! Action definitions
//!
//! Actions are tagged by `action` and run in order inside a step. Every
//! string field may be a template and is resolved right before the action
//! executes.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::domain::persistence::SaveFormat;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionDefinition {
    Visit(VisitAction),
    Wait(WaitAction),
    Extract(ExtractAction),
    Click(ClickAction),
    Save(SaveAction),
    Condition(ConditionAction),
    ForEach(ForEachAction),
    Set(SetAction),
}

impl ActionDefinition {
    /// Action kind label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Visit(_) => "visit",
            Self::Wait(_) => "wait",
            Self::Extract(_) => "extract",
            Self::Click(_) => "click",
            Self::Save(_) => "save",
            Self::Condition(_) => "condition",
            Self::ForEach(_) => "for_each",
            Self::Set(_) => "set",
        }
    }

    pub fn is_extract(&self) -> bool {
        matches!(self, Self::Extract(_))
    }

    /// Nested action lists carried by this action
    pub fn nested(&self) -> Vec<&[ActionDefinition]> {
        match self {
            Self::Condition(c) => vec![c.then.as_slice(), c.otherwise.as_slice()],
            Self::ForEach(f) => vec![f.actions.as_slice()],
            _ => Vec::new(),
        }
    }
}

/// Navigate to a URL, or to `current_item.href` when no URL is given
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VisitAction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WaitAction {
    #[serde(default, alias = "timeout", skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
}

/// What an extract action produces
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExtractTarget {
    /// A sequence of item records with `href`, `text` and `element`
    Links,
    /// One record keyed by field name
    Content,
}

impl ExtractTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Links => "links",
            Self::Content => "content",
        }
    }
}

/// A named element with a sample selector
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElementSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(alias = "selector")]
    pub sample: String,

    /// Defaults to true for links and false for content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generalize: Option<bool>,

    /// `text`, `html`, `outerhtml` or an attribute name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl ElementSpec {
    pub fn new(name: impl Into<String>, sample: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            sample: sample.into(),
            generalize: None,
            attribute: None,
        }
    }

    pub fn with_generalize(mut self, generalize: bool) -> Self {
        self.generalize = Some(generalize);
        self
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractAction {
    pub target: ExtractTarget,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<ElementSpec>,

    #[serde(
        default,
        deserialize_with = "deserialize_elements",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub elements: Vec<ElementSpec>,

    /// Raw schema in any supported shape
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,

    /// Attribute captured for links, `href` by default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    #[serde(default)]
    pub with_metadata: bool,
}

impl ExtractAction {
    pub fn links(sample: impl Into<String>) -> Self {
        Self {
            target: ExtractTarget::Links,
            element: Some(ElementSpec {
                name: None,
                sample: sample.into(),
                generalize: None,
                attribute: None,
            }),
            elements: Vec::new(),
            schema: None,
            attribute: None,
            output: None,
            with_metadata: false,
        }
    }

    pub fn content(elements: Vec<ElementSpec>) -> Self {
        Self {
            target: ExtractTarget::Content,
            element: None,
            elements,
            schema: None,
            attribute: None,
            output: None,
            with_metadata: false,
        }
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_metadata(mut self) -> Self {
        self.with_metadata = true;
        self
    }

    pub fn with_generalize(mut self, generalize: bool) -> Self {
        if let Some(element) = self.element.as_mut() {
            element.generalize = Some(generalize);
        }
        self
    }

    /// Variable the result is bound to
    pub fn output_variable(&self) -> Option<&str> {
        match (&self.output, self.target) {
            (Some(output), _) => Some(output.as_str()),
            (None, ExtractTarget::Content) => Some("extracted_data"),
            (None, ExtractTarget::Links) => None,
        }
    }
}

/// `elements` accepts a list of specs or a mapping of name -> spec, kept in
/// declaration order
fn deserialize_elements<'de, D>(deserializer: D) -> Result<Vec<ElementSpec>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Elements {
        List(Vec<ElementSpec>),
        Map(IndexMap<String, ElementSpec>),
    }

    Ok(match Elements::deserialize(deserializer)? {
        Elements::List(list) => list,
        Elements::Map(map) => map
            .into_iter()
            .map(|(name, mut spec)| {
                spec.name.get_or_insert(name);
                spec
            })
            .collect(),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClickAction {
    pub element: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_for: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SaveAction {
    /// Deep-resolved before saving
    pub data: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<SaveFormat>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// Branch on a resolved value
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConditionAction {
    /// A template, or a bare variable path
    pub field: String,

    pub operator: ConditionOperator,

    /// Value to compare against
    #[serde(default)]
    pub value: Value,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub then: Vec<ActionDefinition>,

    #[serde(default, alias = "else", skip_serializing_if = "Vec::is_empty")]
    pub otherwise: Vec<ActionDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForEachAction {
    /// Template evaluating to a sequence
    pub items: String,

    pub actions: Vec<ActionDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SetAction {
    pub name: String,
    pub value: Value,
}

/// Condition comparison operators
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,

    /// Null, empty string, empty sequence or empty record
    IsEmpty,
    IsNotEmpty,

    /// Substring or sequence membership
    Contains,
    StartsWith,
    EndsWith,

    /// Ignores the compare value
    Truthy,
}

impl ConditionOperator {
    pub fn evaluate(&self, field_value: &Value, compare_value: &Value) -> bool {
        match self {
            Self::Eq => loosely_equal(field_value, compare_value),
            Self::Ne => !loosely_equal(field_value, compare_value),
            Self::Gt => compare_numbers(field_value, compare_value, |a, b| a > b),
            Self::Gte => compare_numbers(field_value, compare_value, |a, b| a >= b),
            Self::Lt => compare_numbers(field_value, compare_value, |a, b| a < b),
            Self::Lte => compare_numbers(field_value, compare_value, |a, b| a <= b),
            Self::IsEmpty => is_empty(field_value),
            Self::IsNotEmpty => !is_empty(field_value),
            Self::Contains => contains(field_value, compare_value),
            Self::StartsWith => starts_with(field_value, compare_value),
            Self::EndsWith => ends_with(field_value, compare_value),
            Self::Truthy => is_truthy(field_value),
        }
    }
}

/// Falsy values: null, false, zero, empty string, empty sequence, empty record
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        other => !is_empty(other),
    }
}

/// Numbers compare by value so `2` equals `2.0` and `"2"` from a page
fn loosely_equal(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }

    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn compare_numbers<F>(a: &Value, b: &Value, f: F) -> bool
where
    F: Fn(f64, f64) -> bool,
{
    match (as_number(a), as_number(b)) {
        (Some(a), Some(b)) => f(a, b),
        _ => false,
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(arr) => arr.is_empty(),
        Value::Object(obj) => obj.is_empty(),
        _ => false,
    }
}

fn contains(field: &Value, value: &Value) -> bool {
    match field {
        Value::String(s) => value.as_str().is_some_and(|v| s.contains(v)),
        Value::Array(arr) => arr.contains(value),
        Value::Object(obj) => value.as_str().is_some_and(|k| obj.contains_key(k)),
        _ => false,
    }
}

fn starts_with(field: &Value, value: &Value) -> bool {
    match (field.as_str(), value.as_str()) {
        (Some(f), Some(v)) => f.starts_with(v),
        _ => false,
    }
}

fn ends_with(field: &Value, value: &Value) -> bool {
    match (field.as_str(), value.as_str()) {
        (Some(f), Some(v)) => f.ends_with(v),
        _ => false,
    }
}
