//! Schema normalization
//!
//! Users describe fields in one of several shapes. Each shape is detected
//! structurally and normalized into the same [`CanonicalSchema`]:
//!
//! 1. Selector array: `{selectors: [{selector: {css|xpath}, fields: {name: {type, selector, attribute}}}]}`
//! 2. Legacy link list: `{container, link_selector, attribute}`
//! 3. Flat fields: `{title: "h1.article-title", ...}`
//! 4. Anything else: every string leaf becomes a text field

use serde_json::{Map, Value};
use tracing::warn;

use crate::domain::browser::Selector;

/// How a field's value is read from its element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// Trimmed text content
    Text,
    /// Raw attribute value
    Attribute(String),
    /// URL-valued attribute, made absolute against the page URL
    Link { attribute: String },
    Html { outer: bool },
}

impl FieldKind {
    /// Kind from an optional `type` and an optional `attribute`
    ///
    /// `attribute` alone may be `text`, `html`, `outerhtml` or an attribute name.
    pub fn from_parts(kind: Option<&str>, attribute: Option<&str>) -> Self {
        let attribute = attribute.map(str::trim).filter(|a| !a.is_empty());

        match kind.map(|k| k.trim().to_ascii_lowercase()).as_deref() {
            Some("html") => Self::Html { outer: false },
            Some("outerhtml" | "outer_html") => Self::Html { outer: true },
            Some("link") => Self::Link {
                attribute: attribute.unwrap_or("href").to_string(),
            },
            Some("attribute") => match attribute {
                Some(name) => Self::attribute(name),
                None => {
                    warn!("Attribute field without an attribute name, extracting text");
                    Self::Text
                }
            },
            Some("text") => Self::Text,
            _ => match attribute.map(str::to_ascii_lowercase).as_deref() {
                None | Some("text") => Self::Text,
                Some("html") => Self::Html { outer: false },
                Some("outerhtml" | "outer_html") => Self::Html { outer: true },
                Some(_) => attribute.map(Self::attribute).unwrap_or(Self::Text),
            },
        }
    }

    fn attribute(name: &str) -> Self {
        match name {
            "href" | "src" => Self::Link {
                attribute: name.to_string(),
            },
            other => Self::Attribute(other.to_string()),
        }
    }
}

/// Post-processing applied to a text value
#[derive(Debug, Clone)]
pub enum Transform {
    Trim,
    Lowercase,
    Uppercase,
    CollapseWhitespace,
    /// First capture group, or the whole match when the pattern has none
    Regex(regex::Regex),
}

impl PartialEq for Transform {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Regex(a), Self::Regex(b)) => a.as_str() == b.as_str(),
            (a, b) => std::mem::discriminant(a) == std::mem::discriminant(b),
        }
    }
}

impl Transform {
    /// Parse `"trim"`, `"lowercase"`, ... or `{regex: "..."}`
    pub fn parse(value: &Value) -> Option<Self> {
        match value {
            Value::String(name) => match name.trim().to_ascii_lowercase().as_str() {
                "trim" => Some(Self::Trim),
                "lowercase" | "lower" => Some(Self::Lowercase),
                "uppercase" | "upper" => Some(Self::Uppercase),
                "collapse_whitespace" | "normalize_whitespace" => Some(Self::CollapseWhitespace),
                other => {
                    warn!(transform = %other, "Unknown transform ignored");
                    None
                }
            },
            Value::Object(map) => {
                let pattern = map.get("regex").and_then(Value::as_str)?;
                match regex::Regex::new(pattern) {
                    Ok(regex) => Some(Self::Regex(regex)),
                    Err(e) => {
                        warn!(pattern = %pattern, error = %e, "Invalid transform regex ignored");
                        None
                    }
                }
            }
            _ => None,
        }
    }

    pub fn apply(&self, value: &str) -> String {
        match self {
            Self::Trim => value.trim().to_string(),
            Self::Lowercase => value.to_lowercase(),
            Self::Uppercase => value.to_uppercase(),
            Self::CollapseWhitespace => value.split_whitespace().collect::<Vec<_>>().join(" "),
            Self::Regex(regex) => regex
                .captures(value)
                .and_then(|caps| caps.get(1).or_else(|| caps.get(0)))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
        }
    }
}

/// One field of a canonical extraction plan
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub selector: Selector,
    pub kind: FieldKind,
    pub transform: Option<Transform>,
    /// Generalize `selector` from a sample before querying
    pub generalize: bool,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, selector: Selector, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            selector,
            kind,
            transform: None,
            generalize: false,
        }
    }

    pub fn text(name: impl Into<String>, selector: &str) -> Self {
        Self::new(name, Selector::parse(selector), FieldKind::Text)
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn with_generalize(mut self, generalize: bool) -> Self {
        self.generalize = generalize;
        self
    }
}

/// Shape-independent extraction plan
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CanonicalSchema {
    pub fields: Vec<FieldSpec>,
}

impl CanonicalSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Fields producing URLs
    pub fn link_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields
            .iter()
            .filter(|f| matches!(f.kind, FieldKind::Link { .. }))
    }
}

/// A field as written in a raw schema
#[derive(Debug, Clone, PartialEq)]
pub struct RawField {
    pub kind: Option<String>,
    pub selector: String,
    pub attribute: Option<String>,
    pub transform: Option<Value>,
}

impl RawField {
    fn text(selector: impl Into<String>) -> Self {
        Self {
            kind: None,
            selector: selector.into(),
            attribute: None,
            transform: None,
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(selector) => Some(Self::text(selector.clone())),
            Value::Object(map) => {
                let selector = str_field(map, "selector")
                    .or_else(|| str_field(map, "sample"))
                    .unwrap_or(".");
                Some(Self {
                    kind: str_field(map, "type").map(str::to_string),
                    selector: selector.to_string(),
                    attribute: str_field(map, "attribute").map(str::to_string),
                    transform: map.get("transform").cloned(),
                })
            }
            _ => None,
        }
    }

    fn into_spec(self, name: String, base: Option<&Selector>) -> FieldSpec {
        let selector = match base {
            Some(base) => base.join(&self.selector),
            None => Selector::parse(&self.selector),
        };

        FieldSpec {
            name,
            selector,
            kind: FieldKind::from_parts(self.kind.as_deref(), self.attribute.as_deref()),
            transform: self.transform.as_ref().and_then(Transform::parse),
            generalize: false,
        }
    }
}

/// One entry of the selector-array shape
#[derive(Debug, Clone, PartialEq)]
pub struct RawSelectorEntry {
    pub selector: Option<Selector>,
    pub fields: Vec<(String, RawField)>,
}

/// Supported raw schema shapes
#[derive(Debug, Clone, PartialEq)]
pub enum RawSchema {
    SelectorArray(Vec<RawSelectorEntry>),
    LegacyLinkList {
        container: Option<String>,
        link_selector: String,
        attribute: String,
    },
    Flat(Vec<(String, RawField)>),
    Unrecognized(Value),
}

impl RawSchema {
    /// Detect the shape of a raw schema, first match wins
    pub fn detect(raw: &Value) -> Self {
        let Value::Object(map) = raw else {
            return Self::Unrecognized(raw.clone());
        };

        if let Some(Value::Array(entries)) = map.get("selectors") {
            return Self::SelectorArray(entries.iter().filter_map(selector_entry).collect());
        }

        let link_selector = str_field(map, "link_selector");
        let container = str_field(map, "container");
        if link_selector.is_some() || container.is_some() {
            return Self::LegacyLinkList {
                container: container.map(str::to_string),
                link_selector: link_selector.unwrap_or("a").to_string(),
                attribute: str_field(map, "attribute").unwrap_or("href").to_string(),
            };
        }

        let flat: Option<Vec<(String, RawField)>> = map
            .iter()
            .map(|(name, value)| flat_field(value).map(|field| (name.clone(), field)))
            .collect();
        match flat {
            Some(fields) if !fields.is_empty() => Self::Flat(fields),
            _ => Self::Unrecognized(raw.clone()),
        }
    }

    pub fn normalize(self) -> CanonicalSchema {
        let fields = match self {
            Self::SelectorArray(entries) => entries
                .into_iter()
                .flat_map(|entry| {
                    let base = entry.selector;
                    let fields = if entry.fields.is_empty() {
                        vec![(
                            "url".to_string(),
                            RawField {
                                kind: Some("link".to_string()),
                                selector: "a[href]".to_string(),
                                attribute: Some("href".to_string()),
                                transform: None,
                            },
                        )]
                    } else {
                        entry.fields
                    };
                    fields
                        .into_iter()
                        .map(move |(name, field)| field.into_spec(name, base.as_ref()))
                        .collect::<Vec<_>>()
                })
                .collect(),
            Self::LegacyLinkList {
                container,
                link_selector,
                attribute,
            } => {
                let selector = match container.as_deref().map(str::trim) {
                    Some(container) if !container.is_empty() && container != "body" => {
                        Selector::parse(container).join(&link_selector)
                    }
                    _ => Selector::parse(&link_selector),
                };
                vec![FieldSpec::new("url", selector, FieldKind::Link { attribute })]
            }
            Self::Flat(fields) => fields
                .into_iter()
                .map(|(name, field)| field.into_spec(name, None))
                .collect(),
            Self::Unrecognized(raw) => {
                let mut leaves = Vec::new();
                collect_string_leaves(&raw, None, &mut leaves);
                warn!(
                    fields = leaves.len(),
                    "Unrecognized schema shape, extracting every string leaf as text"
                );
                leaves
                    .into_iter()
                    .map(|(name, selector)| FieldSpec::text(name, &selector))
                    .collect()
            }
        };

        CanonicalSchema::new(fields)
    }
}

/// Normalize a raw schema of any supported shape. Never fails.
pub fn normalize(raw: &Value) -> CanonicalSchema {
    RawSchema::detect(raw).normalize()
}

fn str_field<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key).and_then(Value::as_str)
}

fn selector_entry(value: &Value) -> Option<RawSelectorEntry> {
    let Value::Object(map) = value else {
        warn!("Selector entry is not a mapping, skipping");
        return None;
    };

    let selector = match map.get("selector") {
        Some(Value::String(raw)) => Some(Selector::parse(raw)),
        Some(Value::Object(sel)) => match (str_field(sel, "css"), str_field(sel, "xpath")) {
            (Some(css), _) => Some(Selector::Css(css.trim().to_string())),
            (None, Some(xpath)) => Some(Selector::XPath(xpath.trim().to_string())),
            (None, None) => None,
        },
        _ => None,
    };

    let fields: Vec<(String, RawField)> = match map.get("fields") {
        Some(Value::Object(fields)) => fields
            .iter()
            .filter_map(|(name, field)| RawField::from_value(field).map(|f| (name.clone(), f)))
            .collect(),
        _ => Vec::new(),
    };

    if selector.is_none() && fields.is_empty() {
        warn!("Selector entry has neither a selector nor fields, skipping");
        return None;
    }

    Some(RawSelectorEntry { selector, fields })
}

/// A flat field is a selector string or a mapping with a selector
fn flat_field(value: &Value) -> Option<RawField> {
    match value {
        Value::String(_) => RawField::from_value(value),
        Value::Object(map) if map.contains_key("selector") || map.contains_key("sample") => {
            RawField::from_value(value)
        }
        _ => None,
    }
}

fn collect_string_leaves(value: &Value, prefix: Option<&str>, out: &mut Vec<(String, String)>) {
    match value {
        Value::String(selector) if !selector.trim().is_empty() => {
            out.push((
                prefix.unwrap_or("value").to_string(),
                selector.clone(),
            ));
        }
        Value::Object(map) => {
            for (key, child) in map {
                let name = match prefix {
                    Some(prefix) => format!("{}.{}", prefix, key),
                    None => key.clone(),
                };
                collect_string_leaves(child, Some(&name), out);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                let name = match prefix {
                    Some(prefix) => format!("{}.{}", prefix, index),
                    None => index.to_string(),
                };
                collect_string_leaves(child, Some(&name), out);
            }
        }
        _ => {}
    }
}
