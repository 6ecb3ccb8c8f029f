//! Extraction executor
//!
//! Runs canonical field plans and link extraction against the current page
//! through the [`Browser`] capability. A field whose selector matches nothing
//! is recorded as null; extraction of the remaining fields continues.

use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::generalizer::generalize;
use super::schema::{CanonicalSchema, FieldKind, FieldSpec, Transform};
use crate::domain::browser::{Browser, ElementHandle, Selector};
use crate::domain::DomainError;

pub struct ExtractionExecutor<'a> {
    browser: &'a dyn Browser,
}

impl<'a> ExtractionExecutor<'a> {
    pub fn new(browser: &'a dyn Browser) -> Self {
        Self { browser }
    }

    /// The selector to query with, generalized when requested
    ///
    /// Recomputed on every call since page structure may differ between pages.
    pub async fn effective_selector(
        &self,
        sample: &Selector,
        generalize_sample: bool,
        within: Option<&ElementHandle>,
    ) -> Result<Selector, DomainError> {
        if !generalize_sample {
            return Ok(sample.clone());
        }

        if within.is_some() {
            debug!(selector = %sample, "Scoped extraction, using the sample selector");
            return Ok(sample.clone());
        }

        Ok(generalize(self.browser, sample).await?.selector)
    }

    /// Link items in document order: `{href, text, element}`
    pub async fn links(
        &self,
        sample: &Selector,
        generalize_sample: bool,
        attribute: &str,
        within: Option<&ElementHandle>,
    ) -> Result<Vec<Value>, DomainError> {
        let selector = self
            .effective_selector(sample, generalize_sample, within)
            .await?;
        let handles = self.browser.query_all(&selector, within).await?;

        if handles.is_empty() {
            warn!(selector = %selector, "Link selector matched nothing");
        }

        let mut items = Vec::with_capacity(handles.len());
        for handle in handles {
            let Some(raw) = self.browser.attribute(&handle, attribute).await? else {
                continue;
            };
            let Some(href) = self.browser.resolve_url(&raw).await else {
                debug!(href = %raw, "Skipping non-navigable link");
                continue;
            };
            let text = self.browser.text(&handle).await?;

            items.push(json!({
                "href": href,
                "text": text.trim(),
                "element": handle.to_value(),
            }));
        }

        Ok(items)
    }

    /// Link items for every URL-valued field of a schema
    pub async fn links_from_schema(
        &self,
        schema: &CanonicalSchema,
        within: Option<&ElementHandle>,
    ) -> Result<Vec<Value>, DomainError> {
        let mut link_fields = schema.link_fields().peekable();
        if link_fields.peek().is_none() {
            return Err(DomainError::validation(
                "schema for a links extraction has no URL-valued field",
            ));
        }

        let mut items = Vec::new();
        for field in link_fields {
            let FieldKind::Link { attribute } = &field.kind else {
                continue;
            };
            items.extend(
                self.links(&field.selector, field.generalize, attribute, within)
                    .await?,
            );
        }

        Ok(items)
    }

    /// One record keyed by field name; unmatched fields are null
    pub async fn content(
        &self,
        fields: &[FieldSpec],
        within: Option<&ElementHandle>,
    ) -> Result<Map<String, Value>, DomainError> {
        let mut record = Map::new();

        for field in fields {
            let handle = match (field.selector.as_str(), within) {
                (".", Some(scope)) => Some(scope.clone()),
                _ => {
                    let selector = self
                        .effective_selector(&field.selector, field.generalize, within)
                        .await?;
                    self.browser.query_one(&selector, within).await?
                }
            };

            let value = match handle {
                Some(handle) => {
                    self.read_field(&handle, &field.kind, field.transform.as_ref())
                        .await?
                }
                None => {
                    warn!(field = %field.name, selector = %field.selector, "No element matched field selector");
                    Value::Null
                }
            };

            record.insert(field.name.clone(), value);
        }

        Ok(record)
    }

    async fn read_field(
        &self,
        handle: &ElementHandle,
        kind: &FieldKind,
        transform: Option<&Transform>,
    ) -> Result<Value, DomainError> {
        let raw = match kind {
            FieldKind::Text => Some(self.browser.text(handle).await?.trim().to_string()),
            FieldKind::Attribute(name) => self.browser.attribute(handle, name).await?,
            FieldKind::Link { attribute } => match self.browser.attribute(handle, attribute).await? {
                Some(href) => Some(self.browser.resolve_url(&href).await.unwrap_or(href)),
                None => None,
            },
            FieldKind::Html { outer } => Some(self.browser.html(handle, *outer).await?.trim().to_string()),
        };

        Ok(match (raw, transform) {
            (Some(value), Some(transform)) => Value::String(transform.apply(&value)),
            (Some(value), None) => Value::String(value),
            (None, _) => Value::Null,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::extraction::normalize;
    use crate::infrastructure::browser::{DomBrowser, InMemoryFetcher};

    const LIST_PAGE: &str = r#"
        <html><body>
          <div class="list">
            <a class="x" href="/news/1">First</a>
            <a class="x" href="https://other.example/2"> Second </a>
            <a class="x" href="javascript:void(0)">Script</a>
            <a class="y" href="/ignored">Other</a>
            <a class="x">No href</a>
          </div>
        </body></html>
    "#;

    const ARTICLE_PAGE: &str = r#"
        <html><body>
          <article lang="en">
            <h1 class="title">  Rust 2024  </h1>
            <span class="author">Ferris</span>
            <p>Body <b>bold</b></p>
          </article>
        </body></html>
    "#;

    async fn browser_on(url: &str, html: &str) -> DomBrowser<InMemoryFetcher> {
        let browser = DomBrowser::new(InMemoryFetcher::new().with_page(url, html));
        browser.navigate(url).await.unwrap();
        browser
    }

    #[tokio::test]
    async fn test_links_in_document_order() {
        let browser = browser_on("https://example.com/list", LIST_PAGE).await;
        let executor = ExtractionExecutor::new(&browser);

        let items = executor
            .links(&Selector::parse("div.list a.x"), false, "href", None)
            .await
            .unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["href"], "https://example.com/news/1");
        assert_eq!(items[0]["text"], "First");
        assert_eq!(items[1]["href"], "https://other.example/2");
        assert_eq!(items[1]["text"], "Second");
        assert!(ElementHandle::from_value(&items[0]["element"]).is_some());
    }

    #[tokio::test]
    async fn test_legacy_and_selector_array_extract_identical_items() {
        let browser = browser_on("https://example.com/list", LIST_PAGE).await;
        let executor = ExtractionExecutor::new(&browser);

        let legacy = normalize(&serde_json::json!({
            "container": "div.list", "link_selector": "a.x", "attribute": "href"
        }));
        let selectors = normalize(&serde_json::json!({
            "selectors": [{
                "selector": {"css": "div.list"},
                "fields": {"url": {"type": "attribute", "selector": "a.x", "attribute": "href"}}
            }]
        }));

        let from_legacy = executor.links_from_schema(&legacy, None).await.unwrap();
        let from_selectors = executor.links_from_schema(&selectors, None).await.unwrap();

        assert_eq!(from_legacy.len(), 2);
        assert_eq!(from_legacy, from_selectors);

        let legacy_record = executor.content(&legacy.fields, None).await.unwrap();
        let selectors_record = executor.content(&selectors.fields, None).await.unwrap();
        assert_eq!(legacy_record, selectors_record);
        assert_eq!(legacy_record["url"], "https://example.com/news/1");
    }

    #[tokio::test]
    async fn test_schema_without_link_field_fails() {
        let browser = browser_on("https://example.com/list", LIST_PAGE).await;
        let executor = ExtractionExecutor::new(&browser);

        let schema = normalize(&serde_json::json!({"title": "h1"}));
        assert!(executor.links_from_schema(&schema, None).await.is_err());
    }

    #[tokio::test]
    async fn test_partial_content_extraction() {
        let browser = browser_on("https://example.com/a", ARTICLE_PAGE).await;
        let executor = ExtractionExecutor::new(&browser);

        let fields = vec![
            FieldSpec::text("title", "h1.title"),
            FieldSpec::text("author", "span.author"),
            FieldSpec::text("published", "time.published"),
        ];
        let record = executor.content(&fields, None).await.unwrap();

        assert_eq!(record.len(), 3);
        assert_eq!(record["title"], "Rust 2024");
        assert_eq!(record["author"], "Ferris");
        assert_eq!(record["published"], Value::Null);
    }

    #[tokio::test]
    async fn test_field_kinds_and_transforms() {
        let browser = browser_on("https://example.com/a", ARTICLE_PAGE).await;
        let executor = ExtractionExecutor::new(&browser);

        let fields = vec![
            FieldSpec::new(
                "lang",
                Selector::parse("article"),
                FieldKind::Attribute("lang".to_string()),
            ),
            FieldSpec::new("body", Selector::parse("article p"), FieldKind::Html { outer: false }),
            FieldSpec::text("shout", "h1").with_transform(Transform::Uppercase),
        ];
        let record = executor.content(&fields, None).await.unwrap();

        assert_eq!(record["lang"], "en");
        assert_eq!(record["body"], "Body <b>bold</b>");
        assert_eq!(record["shout"], "RUST 2024");
    }

    #[tokio::test]
    async fn test_content_scoped_to_element() {
        let page = r#"<html><body><ul>
            <li><a href="/1">One</a><span>first</span></li>
            <li><a href="/2">Two</a><span>second</span></li>
        </ul></body></html>"#;
        let browser = browser_on("https://example.com/", page).await;
        let executor = ExtractionExecutor::new(&browser);

        let items = browser.query_all(&Selector::parse("li"), None).await.unwrap();
        let fields = vec![
            FieldSpec::text("label", "span"),
            FieldSpec::text("whole", "."),
        ];
        let record = executor.content(&fields, Some(&items[1])).await.unwrap();

        assert_eq!(record["label"], "second");
        assert_eq!(record["whole"], "Twosecond");
    }
}
