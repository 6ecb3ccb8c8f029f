//! Browser backed by fetched HTML and `scraper`
//!
//! Pages are static between navigations: the fetched HTML is kept as text and
//! parsed on demand for every query. Clicking follows the `href` of the
//! clicked element.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use scraper::{ElementRef, Html};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::dom;
use super::fetcher::{absolute_url, PageFetcher};
use crate::domain::browser::{AncestrySnapshot, Browser, BrowserOptions, ElementHandle, Selector};
use crate::domain::DomainError;

#[derive(Debug, Clone)]
struct Page {
    url: String,
    html: String,
    generation: u64,
}

#[derive(Debug)]
pub struct DomBrowser<F: PageFetcher> {
    fetcher: F,
    options: RwLock<BrowserOptions>,
    page: RwLock<Option<Page>>,
    generation: AtomicU64,
}

impl<F: PageFetcher> DomBrowser<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            options: RwLock::new(BrowserOptions::default()),
            page: RwLock::new(None),
            generation: AtomicU64::new(0),
        }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Run `f` against the parsed current page
    async fn with_page<T>(
        &self,
        f: impl FnOnce(&Html, &Page) -> Result<T, DomainError>,
    ) -> Result<T, DomainError> {
        let guard = self.page.read().await;
        let page = guard
            .as_ref()
            .ok_or_else(|| DomainError::capability("browser", "no page loaded"))?;
        let document = Html::parse_document(&page.html);
        f(&document, page)
    }

    /// Run `f` against the element behind a handle
    async fn with_element<T>(
        &self,
        handle: &ElementHandle,
        f: impl FnOnce(ElementRef<'_>) -> T,
    ) -> Result<T, DomainError> {
        self.with_page(|document, page| {
            let element = resolve_handle(document, page, handle)?;
            Ok(f(element))
        })
        .await
    }
}

fn resolve_handle<'a>(
    document: &'a Html,
    page: &Page,
    handle: &ElementHandle,
) -> Result<ElementRef<'a>, DomainError> {
    if handle.generation != page.generation {
        return Err(DomainError::capability(
            "browser",
            format!(
                "stale element handle from page generation {} (current {})",
                handle.generation, page.generation
            ),
        ));
    }

    dom::element_at(document, &handle.path).ok_or_else(|| {
        DomainError::not_found(format!("no element at path {:?}", handle.path))
    })
}

#[async_trait]
impl<F: PageFetcher> Browser for DomBrowser<F> {
    fn name(&self) -> &'static str {
        "dom"
    }

    async fn configure(&self, options: &BrowserOptions) -> Result<(), DomainError> {
        if !options.headless {
            info!("Headed mode requested, the DOM browser always runs headless");
        }
        *self.options.write().await = options.clone();
        Ok(())
    }

    async fn navigate(&self, url: &str) -> Result<(), DomainError> {
        let options = self.options.read().await.clone();
        let timeout = Duration::from_millis(options.timeout_ms);

        let fetched = tokio::time::timeout(timeout, self.fetcher.fetch(url, &options))
            .await
            .map_err(|_| DomainError::timeout(format!("navigate {}", url), options.timeout_ms))??;

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(url = %fetched.url, generation, "Navigated");

        *self.page.write().await = Some(Page {
            url: fetched.url,
            html: fetched.html,
            generation,
        });

        Ok(())
    }

    async fn current_url(&self) -> Option<String> {
        self.page.read().await.as_ref().map(|page| page.url.clone())
    }

    async fn resolve_url(&self, href: &str) -> Option<String> {
        let base = self.current_url().await;
        absolute_url(base.as_deref(), href)
    }

    async fn wait_for(&self, selector: &Selector, timeout: Duration) -> Result<(), DomainError> {
        let compiled = dom::compile(selector)?;
        let present = self
            .with_page(|document, _| Ok(document.select(&compiled).next().is_some()))
            .await?;

        // Nothing changes until the next navigation, so waiting longer cannot help
        if present {
            Ok(())
        } else {
            Err(DomainError::timeout(
                format!("wait for '{}'", selector),
                timeout.as_millis() as u64,
            ))
        }
    }

    async fn click(&self, selector: &Selector) -> Result<(), DomainError> {
        let compiled = dom::compile(selector)?;

        let target = self
            .with_page(|document, page| {
                let element = document.select(&compiled).next().ok_or_else(|| {
                    DomainError::capability(
                        "browser",
                        format!("no element to click for '{}'", selector),
                    )
                })?;

                let href = element
                    .value()
                    .attr("href")
                    .map(str::trim)
                    .filter(|href| !href.is_empty() && !href.starts_with('#'))
                    .ok_or_else(|| {
                        DomainError::capability(
                            "browser",
                            format!("element '{}' is not navigable", selector),
                        )
                    })?;

                Url::parse(&page.url)
                    .and_then(|base| base.join(href))
                    .map(String::from)
                    .map_err(|e| {
                        DomainError::capability(
                            "browser",
                            format!("cannot resolve '{}' against {}: {}", href, page.url, e),
                        )
                    })
            })
            .await?;

        debug!(selector = %selector, target = %target, "Click follows link");
        self.navigate(&target).await
    }

    async fn query_all(
        &self,
        selector: &Selector,
        within: Option<&ElementHandle>,
    ) -> Result<Vec<ElementHandle>, DomainError> {
        let compiled = dom::compile(selector)?;

        self.with_page(|document, page| {
            let scope = within
                .map(|handle| resolve_handle(document, page, handle))
                .transpose()?;

            Ok(dom::select(document, &compiled, scope)
                .into_iter()
                .map(|element| ElementHandle::new(page.generation, dom::path_of(element)))
                .collect())
        })
        .await
    }

    async fn text(&self, handle: &ElementHandle) -> Result<String, DomainError> {
        self.with_element(handle, dom::text_of).await
    }

    async fn attribute(
        &self,
        handle: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, DomainError> {
        self.with_element(handle, |element| element.value().attr(name).map(str::to_string))
            .await
    }

    async fn html(&self, handle: &ElementHandle, outer: bool) -> Result<String, DomainError> {
        self.with_element(handle, |element| {
            if outer {
                element.html()
            } else {
                element.inner_html()
            }
        })
        .await
    }

    async fn ancestry(&self, handle: &ElementHandle) -> Result<AncestrySnapshot, DomainError> {
        self.with_element(handle, dom::ancestry_of).await
    }

    async fn is_attached(&self, handle: &ElementHandle) -> bool {
        self.with_element(handle, |_| ()).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::extraction::generalize;
    use crate::infrastructure::browser::InMemoryFetcher;

    const LIST: &str = r#"<html><body>
        <div id="content">
          <ul class="news">
            <li class="item"><a href="/news/1">One</a></li>
            <li class="item"><a href="/news/2">Two</a></li>
            <li class="item"><a href="/news/3">Three</a></li>
          </ul>
          <a class="next" href="?page=2">Next</a>
          <span class="label">not a link</span>
        </div>
    </body></html>"#;

    fn browser() -> DomBrowser<InMemoryFetcher> {
        DomBrowser::new(
            InMemoryFetcher::new()
                .with_page("https://example.com/news", LIST)
                .with_page("https://example.com/news?page=2", "<html><body><p>2</p></body></html>"),
        )
    }

    #[tokio::test]
    async fn test_query_before_navigation_fails() {
        let browser = browser();
        let err = browser.query_all(&Selector::parse("a"), None).await.unwrap_err();
        assert!(matches!(err, DomainError::Capability { .. }));
        assert_eq!(browser.current_url().await, None);
    }

    #[tokio::test]
    async fn test_resolve_url_against_current_page() {
        let browser = browser();
        assert_eq!(browser.resolve_url("/news/1").await, None);

        browser.navigate("https://example.com/news").await.unwrap();
        assert_eq!(
            browser.resolve_url("/news/1").await.as_deref(),
            Some("https://example.com/news/1")
        );
        assert_eq!(
            browser.resolve_url("?page=2").await.as_deref(),
            Some("https://example.com/news?page=2")
        );
        assert_eq!(browser.resolve_url("javascript:void(0)").await, None);
    }

    #[tokio::test]
    async fn test_navigate_and_query() {
        let browser = browser();
        browser.navigate("https://example.com/news").await.unwrap();

        let links = browser
            .query_all(&Selector::parse("ul.news a"), None)
            .await
            .unwrap();
        assert_eq!(links.len(), 3);
        assert_eq!(browser.text(&links[1]).await.unwrap(), "Two");
        assert_eq!(
            browser.attribute(&links[2], "href").await.unwrap().as_deref(),
            Some("/news/3")
        );
        assert_eq!(
            browser.html(&links[0], true).await.unwrap(),
            r#"<a href="/news/1">One</a>"#
        );
    }

    #[tokio::test]
    async fn test_xpath_query() {
        let browser = browser();
        browser.navigate("https://example.com/news").await.unwrap();

        let links = browser
            .query_all(&Selector::parse("/html/body/div/ul/li[2]/a"), None)
            .await
            .unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(browser.text(&links[0]).await.unwrap(), "Two");
    }

    #[tokio::test]
    async fn test_handles_go_stale_after_navigation() {
        let browser = browser();
        browser.navigate("https://example.com/news").await.unwrap();
        let link = browser
            .query_one(&Selector::parse("a.next"), None)
            .await
            .unwrap()
            .unwrap();
        assert!(browser.is_attached(&link).await);

        browser.click(&Selector::parse("a.next")).await.unwrap();

        assert_eq!(
            browser.current_url().await.as_deref(),
            Some("https://example.com/news?page=2")
        );
        assert!(!browser.is_attached(&link).await);
        assert!(browser.text(&link).await.is_err());
    }

    #[tokio::test]
    async fn test_click_non_navigable_element() {
        let browser = browser();
        browser.navigate("https://example.com/news").await.unwrap();

        let err = browser.click(&Selector::parse("span.label")).await.unwrap_err();
        assert!(err.to_string().contains("not navigable"));

        let err = browser.click(&Selector::parse("button.missing")).await.unwrap_err();
        assert!(matches!(err, DomainError::Capability { .. }));
    }

    #[tokio::test]
    async fn test_wait_for() {
        let browser = browser();
        browser.navigate("https://example.com/news").await.unwrap();

        assert!(browser
            .wait_for(&Selector::parse("ul.news"), Duration::from_millis(10))
            .await
            .is_ok());
        let err = browser
            .wait_for(&Selector::parse("table"), Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Timeout { timeout_ms: 10, .. }));
    }

    #[tokio::test]
    async fn test_navigation_timeout() {
        let browser = DomBrowser::new(
            InMemoryFetcher::new()
                .with_page("https://example.com/", "<p>slow</p>")
                .with_latency(Duration::from_millis(200)),
        );
        browser
            .configure(&BrowserOptions {
                timeout_ms: 20,
                ..BrowserOptions::default()
            })
            .await
            .unwrap();

        let err = browser.navigate("https://example.com/").await.unwrap_err();
        assert!(matches!(err, DomainError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_generalizer_keeps_sample_and_matches_siblings() {
        let browser = browser();
        browser.navigate("https://example.com/news").await.unwrap();

        let sample = Selector::parse("/html/body/div/ul/li[2]/a");
        let sample_handle = browser.query_one(&sample, None).await.unwrap().unwrap();

        let result = generalize(&browser, &sample).await.unwrap();
        assert!(result.generalized);
        assert_eq!(result.matches, 3);

        let matched = browser.query_all(&result.selector, None).await.unwrap();
        assert!(matched.contains(&sample_handle));
    }

    #[tokio::test]
    async fn test_generalizer_falls_back_for_unique_elements() {
        let browser = browser();
        browser.navigate("https://example.com/news").await.unwrap();

        for raw in ["span.label", "a.next", "div#content"] {
            let sample = Selector::parse(raw);
            let sample_handle = browser.query_one(&sample, None).await.unwrap().unwrap();

            let result = generalize(&browser, &sample).await.unwrap();
            let matched = browser.query_all(&result.selector, None).await.unwrap();
            assert!(matched.contains(&sample_handle), "lost sample for {raw}");
        }
    }
}
