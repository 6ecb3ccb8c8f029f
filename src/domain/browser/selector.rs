//! Selector expressions
//!
//! A selector is either CSS or XPath. XPath is detected by prefix:
//! - `xpath=...` explicit
//! - `/...`, `./...`, `(...` location paths
//!
//! Simple XPath location paths (tag or `*` steps, positional predicates,
//! `@attr='v'` equality, `contains(@class, 'v')`, `last()`) can be
//! translated to CSS so they run on CSS-only engines.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// A CSS or XPath selector
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Selector {
    Css(String),
    XPath(String),
}

impl Selector {
    /// Parse a raw selector string, detecting XPath by prefix
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();

        if let Some(rest) = trimmed.strip_prefix("xpath=") {
            return Self::XPath(rest.trim().to_string());
        }

        if let Some(rest) = trimmed.strip_prefix("css=") {
            return Self::Css(rest.trim().to_string());
        }

        if trimmed.starts_with('/') || trimmed.starts_with('(') || trimmed.starts_with("./") {
            Self::XPath(trimmed.to_string())
        } else {
            Self::Css(trimmed.to_string())
        }
    }

    /// The raw expression without any `xpath=` prefix
    pub fn as_str(&self) -> &str {
        match self {
            Self::Css(s) | Self::XPath(s) => s,
        }
    }

    pub fn is_xpath(&self) -> bool {
        matches!(self, Self::XPath(_))
    }

    /// Translate to a CSS selector
    pub fn to_css(&self) -> Result<String, DomainError> {
        match self {
            Self::Css(css) => Ok(css.clone()),
            Self::XPath(xpath) => {
                let translated = translate_xpath(xpath)?;
                Ok(match translated.leading {
                    Leading::Root | Leading::Descendant => translated.css,
                    Leading::Child => format!(":scope > {}", translated.css),
                })
            }
        }
    }

    /// Combine this selector with a selector relative to it
    ///
    /// `.` (or an empty string) means "the matched element itself".
    pub fn join(&self, relative: &str) -> Selector {
        let relative = relative.trim();

        if relative.is_empty() || relative == "." {
            return self.clone();
        }

        match (self, Selector::parse(relative)) {
            (Self::Css(base), Self::Css(rel)) => Self::Css(format!("{} {}", base, rel)),
            (Self::XPath(base), Self::XPath(rel)) => {
                if let Some(rest) = rel.strip_prefix('.') {
                    Self::XPath(format!("{}{}", base, rest))
                } else if rel.starts_with('/') {
                    Self::XPath(format!("{}/{}", base, rel.trim_start_matches('/')))
                } else {
                    Self::XPath(rel)
                }
            }
            (Self::XPath(base), Self::Css(rel)) => match Self::XPath(base.clone()).to_css() {
                Ok(css) => Self::Css(format!("{} {}", css, rel)),
                Err(_) => Self::XPath(format!("{}//{}", base, rel)),
            },
            (Self::Css(base), Self::XPath(rel)) => match translate_xpath(&rel) {
                Ok(translated) => match translated.leading {
                    Leading::Child => Self::Css(format!("{} > {}", base, translated.css)),
                    Leading::Descendant | Leading::Root => {
                        Self::Css(format!("{} {}", base, translated.css))
                    }
                },
                Err(_) => Self::XPath(rel),
            },
        }
    }
}

impl From<String> for Selector {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<&str> for Selector {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<Selector> for String {
    fn from(selector: Selector) -> Self {
        selector.to_string()
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(css) => write!(f, "{}", css),
            Self::XPath(xpath) if Selector::parse(xpath).is_xpath() => write!(f, "{}", xpath),
            Self::XPath(xpath) => write!(f, "xpath={}", xpath),
        }
    }
}

/// How a translated path attaches to its context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Leading {
    /// Absolute path from the document root
    Root,
    /// `./step`: direct child of the context node
    Child,
    /// `//step` or `.//step`: any descendant
    Descendant,
}

#[derive(Debug)]
struct Translation {
    leading: Leading,
    css: String,
}

fn translate_xpath(xpath: &str) -> Result<Translation, DomainError> {
    let unsupported = |detail: &str| {
        DomainError::capability(
            "selector",
            format!("unsupported XPath '{}': {}", xpath, detail),
        )
    };

    let mut rest = xpath.trim();
    let leading = if let Some(r) = rest.strip_prefix(".//") {
        rest = r;
        Leading::Descendant
    } else if let Some(r) = rest.strip_prefix("./") {
        rest = r;
        Leading::Child
    } else if let Some(r) = rest.strip_prefix("//") {
        rest = r;
        Leading::Descendant
    } else if let Some(r) = rest.strip_prefix('/') {
        rest = r;
        Leading::Root
    } else {
        return Err(unsupported("expected a location path"));
    };

    let steps = split_steps(rest).map_err(|e| unsupported(&e))?;
    let mut css = String::new();

    for (index, (descendant, step)) in steps.iter().enumerate() {
        if index > 0 {
            css.push_str(if *descendant { " " } else { " > " });
        }
        css.push_str(&translate_step(step).map_err(|e| unsupported(&e))?);
    }

    if css.is_empty() {
        return Err(unsupported("empty path"));
    }

    Ok(Translation { leading, css })
}

/// Split a path (after its leading axis) into `(is_descendant, step)` pairs
fn split_steps(path: &str) -> Result<Vec<(bool, String)>, String> {
    let mut steps = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut descendant = false;
    let mut chars = path.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, quote) {
            ('\'' | '"', None) => {
                quote = Some(c);
                current.push(c);
            }
            (q, Some(open)) if q == open => {
                quote = None;
                current.push(c);
            }
            ('[', None) => {
                depth += 1;
                current.push(c);
            }
            (']', None) => {
                depth = depth.checked_sub(1).ok_or("unbalanced ']'")?;
                current.push(c);
            }
            ('/', None) if depth == 0 => {
                if current.is_empty() {
                    return Err("empty step".to_string());
                }
                steps.push((descendant, std::mem::take(&mut current)));
                descendant = chars.peek() == Some(&'/');
                if descendant {
                    chars.next();
                }
            }
            _ => current.push(c),
        }
    }

    if depth != 0 || quote.is_some() {
        return Err("unterminated predicate".to_string());
    }

    if current.is_empty() {
        return Err("trailing '/'".to_string());
    }

    steps.push((descendant, current));
    Ok(steps)
}

fn translate_step(step: &str) -> Result<String, String> {
    let (name, predicates) = match step.find('[') {
        Some(idx) => (&step[..idx], &step[idx..]),
        None => (step, ""),
    };

    let name = name.trim();
    if name.is_empty() || name.contains(':') || name.contains('(') {
        return Err(format!("unsupported step '{}'", step));
    }

    let wildcard = name == "*";
    let mut css = if wildcard { String::new() } else { name.to_string() };

    for predicate in split_predicates(predicates)? {
        css.push_str(&translate_predicate(&predicate, wildcard)?);
    }

    if css.is_empty() {
        css.push('*');
    }

    Ok(css)
}

fn split_predicates(predicates: &str) -> Result<Vec<String>, String> {
    let mut result = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for c in predicates.chars() {
        match (c, quote) {
            ('\'' | '"', None) => {
                quote = Some(c);
                current.push(c);
            }
            (q, Some(open)) if q == open => {
                quote = None;
                current.push(c);
            }
            ('[', None) => {
                if depth > 0 {
                    current.push(c);
                }
                depth += 1;
            }
            (']', None) => {
                depth = depth.checked_sub(1).ok_or("unbalanced ']'")?;
                if depth == 0 {
                    result.push(std::mem::take(&mut current));
                } else {
                    current.push(c);
                }
            }
            _ if depth == 0 && !c.is_whitespace() => {
                return Err(format!("unexpected '{}' after step name", c));
            }
            _ => current.push(c),
        }
    }

    Ok(result)
}

fn translate_predicate(predicate: &str, wildcard: bool) -> Result<String, String> {
    let predicate = predicate.trim();

    if let Ok(position) = predicate.parse::<usize>() {
        return Ok(if wildcard {
            format!(":nth-child({})", position)
        } else {
            format!(":nth-of-type({})", position)
        });
    }

    if predicate == "last()" {
        return Ok(if wildcard {
            ":last-child".to_string()
        } else {
            ":last-of-type".to_string()
        });
    }

    if let Some(inner) = predicate
        .strip_prefix("contains(")
        .and_then(|p| p.strip_suffix(')'))
    {
        let (attr, value) = inner
            .split_once(',')
            .ok_or_else(|| format!("malformed contains() in '{}'", predicate))?;
        let attr = attr
            .trim()
            .strip_prefix('@')
            .ok_or_else(|| format!("contains() needs an attribute in '{}'", predicate))?;
        let value = unquote(value.trim())?;

        if attr == "class" && !value.contains(char::is_whitespace) && !value.is_empty() {
            return Ok(format!("[class~=\"{}\"]", value));
        }
        return Ok(format!("[{}*=\"{}\"]", attr, value));
    }

    if let Some(attr_expr) = predicate.strip_prefix('@') {
        return match attr_expr.split_once('=') {
            Some((attr, value)) => Ok(format!(
                "[{}=\"{}\"]",
                attr.trim(),
                unquote(value.trim())?
            )),
            None => Ok(format!("[{}]", attr_expr.trim())),
        };
    }

    Err(format!("unsupported predicate '[{}]'", predicate))
}

fn unquote(value: &str) -> Result<String, String> {
    let quoted = (value.starts_with('\'') && value.ends_with('\''))
        || (value.starts_with('"') && value.ends_with('"'));

    if value.len() >= 2 && quoted {
        Ok(value[1..value.len() - 1].replace('"', "\\\""))
    } else {
        Err(format!("expected a quoted literal, got '{}'", value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_detects_xpath() {
        assert!(Selector::parse("/html/body/div").is_xpath());
        assert!(Selector::parse("//li/a").is_xpath());
        assert!(Selector::parse("./span").is_xpath());
        assert!(Selector::parse("xpath=//a").is_xpath());
        assert!(!Selector::parse("div.list > a").is_xpath());
        assert!(!Selector::parse("css=//weird").is_xpath());
        assert_eq!(Selector::parse("xpath=//a").as_str(), "//a");
    }

    #[test]
    fn test_absolute_xpath_translation() {
        let selector = Selector::parse("/html/body/div[2]/ul/li[3]/a");
        assert_eq!(
            selector.to_css().unwrap(),
            "html > body > div:nth-of-type(2) > ul > li:nth-of-type(3) > a"
        );
    }

    #[test]
    fn test_descendant_and_attribute_predicates() {
        let selector = Selector::parse("//div[@id='news']//li[contains(@class, 'item')]/a[@href]");
        assert_eq!(
            selector.to_css().unwrap(),
            "div[id=\"news\"] li[class~=\"item\"] > a[href]"
        );
    }

    #[test]
    fn test_predicate_with_slash_in_literal() {
        let selector = Selector::parse("//a[@href='/news/1']");
        assert_eq!(selector.to_css().unwrap(), "a[href=\"/news/1\"]");
    }

    #[test]
    fn test_unsupported_xpath() {
        assert!(Selector::parse("(//a)[1]").to_css().is_err());
        assert!(Selector::parse("//a/text()").to_css().is_err());
        assert!(Selector::parse("//a[position() > 2]").to_css().is_err());
    }

    #[test]
    fn test_join_css() {
        let base = Selector::parse("div.list");
        assert_eq!(base.join("a.x"), Selector::Css("div.list a.x".to_string()));
        assert_eq!(base.join("."), base);
        assert_eq!(base.join(""), base);
    }

    #[test]
    fn test_join_xpath() {
        let base = Selector::parse("//ul[@id='news']");
        assert_eq!(
            base.join("./li/a"),
            Selector::XPath("//ul[@id='news']/li/a".to_string())
        );
        assert_eq!(
            base.join("a.title"),
            Selector::Css("ul[id=\"news\"] a.title".to_string())
        );
    }

    #[test]
    fn test_join_css_with_relative_xpath() {
        let base = Selector::parse("ul.news");
        assert_eq!(base.join("./li/a"), Selector::Css("ul.news > li > a".to_string()));
        assert_eq!(base.join(".//a"), Selector::Css("ul.news a".to_string()));
    }

    #[test]
    fn test_serde_round_trip() {
        let selector: Selector = serde_json::from_str("\"//li/a\"").unwrap();
        assert!(selector.is_xpath());
        assert_eq!(serde_json::to_string(&selector).unwrap(), "\"//li/a\"");
    }
}
