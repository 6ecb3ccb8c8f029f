//! Page fetchers backing the DOM browser

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use reqwest::Url;
use tracing::debug;

use crate::domain::browser::BrowserOptions;
use crate::domain::DomainError;

/// A fetched HTML document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub url: String,
    pub html: String,
}

/// Loads HTML for a URL
#[async_trait]
pub trait PageFetcher: Send + Sync + std::fmt::Debug {
    async fn fetch(&self, url: &str, options: &BrowserOptions) -> Result<FetchedPage, DomainError>;
}

/// Canonical form used to compare URLs
pub fn normalize_url(url: &str) -> String {
    Url::parse(url.trim())
        .map(String::from)
        .unwrap_or_else(|_| url.trim().to_string())
}

/// Link targets that never lead to a page
const SKIPPED_LINK_PREFIXES: &[&str] = &["#", "javascript:", "mailto:", "tel:"];

/// Resolve `href` against the page URL, skipping non-navigable targets
pub fn absolute_url(base: Option<&str>, href: &str) -> Option<String> {
    let href = href.trim();

    if href.is_empty() {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if SKIPPED_LINK_PREFIXES
        .iter()
        .any(|prefix| lowered.starts_with(prefix))
    {
        return None;
    }

    match base.and_then(|base| Url::parse(base).ok()) {
        Some(base) => base.join(href).ok().map(String::from),
        None => Url::parse(href).ok().map(String::from),
    }
}

/// Fetcher using reqwest
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Use a preconfigured client, e.g. with a connect timeout or proxy
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, options: &BrowserOptions) -> Result<FetchedPage, DomainError> {
        let mut request = self
            .client
            .get(url)
            .timeout(Duration::from_millis(options.timeout_ms));

        if let Some(user_agent) = &options.user_agent {
            request = request.header(USER_AGENT, user_agent);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                DomainError::timeout(format!("GET {}", url), options.timeout_ms)
            } else {
                DomainError::capability("http", format!("Request to {} failed: {}", url, e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DomainError::capability(
                "http",
                format!("GET {} returned HTTP {}", url, status),
            ));
        }

        let final_url = response.url().to_string();
        let html = response.text().await.map_err(|e| {
            DomainError::capability("http", format!("Failed to read body of {}: {}", url, e))
        })?;

        debug!(url = %final_url, bytes = html.len(), "Fetched page");

        Ok(FetchedPage {
            url: final_url,
            html,
        })
    }
}

/// Fetcher serving pages from memory
///
/// Used for tests and offline runs. Requests are recorded in order.
#[derive(Debug, Default)]
pub struct InMemoryFetcher {
    pages: RwLock<HashMap<String, String>>,
    failures: RwLock<HashMap<String, usize>>,
    requests: RwLock<Vec<String>>,
    latency: Option<Duration>,
}

impl InMemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: &str, html: impl Into<String>) -> Self {
        self.insert(url, html);
        self
    }

    /// Fail the next `count` fetches of `url` with a capability error
    pub fn with_failures(self, url: &str, count: usize) -> Self {
        if let Ok(mut failures) = self.failures.write() {
            failures.insert(normalize_url(url), count);
        }
        self
    }

    /// Delay every fetch, to exercise timeouts
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn insert(&self, url: &str, html: impl Into<String>) {
        if let Ok(mut pages) = self.pages.write() {
            pages.insert(normalize_url(url), html.into());
        }
    }

    /// URLs requested so far, in order
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .read()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PageFetcher for InMemoryFetcher {
    async fn fetch(&self, url: &str, _options: &BrowserOptions) -> Result<FetchedPage, DomainError> {
        let key = normalize_url(url);

        if let Ok(mut requests) = self.requests.write() {
            requests.push(key.clone());
        }

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let should_fail = match self.failures.write() {
            Ok(mut failures) => match failures.get_mut(&key) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    true
                }
                _ => false,
            },
            Err(_) => false,
        };
        if should_fail {
            return Err(DomainError::capability(
                "http",
                format!("Simulated failure fetching {}", key),
            ));
        }

        let html = self
            .pages
            .read()
            .map_err(|_| DomainError::internal("page store lock poisoned"))?
            .get(&key)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("No page registered for {}", key)))?;

        Ok(FetchedPage { url: key, html })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_absolute_url() {
        let base = Some("https://example.com/news/index.html");
        assert_eq!(
            absolute_url(base, "item?id=1").as_deref(),
            Some("https://example.com/news/item?id=1")
        );
        assert_eq!(
            absolute_url(base, "/a").as_deref(),
            Some("https://example.com/a")
        );
        assert_eq!(absolute_url(base, "#top"), None);
        assert_eq!(absolute_url(base, "mailto:x@y.z"), None);
        assert_eq!(absolute_url(base, "  "), None);
        assert_eq!(absolute_url(None, "/relative"), None);
    }

    #[tokio::test]
    async fn test_http_fetcher_sends_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/news"))
            .and(header("user-agent", "scrapeflow-test"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>ok</body></html>"))
            .mount(&server)
            .await;

        let options = BrowserOptions {
            user_agent: Some("scrapeflow-test".to_string()),
            ..BrowserOptions::default()
        };
        let page = HttpFetcher::new()
            .fetch(&format!("{}/news", server.uri()), &options)
            .await
            .unwrap();

        assert!(page.html.contains("ok"));
        assert!(page.url.ends_with("/news"));
    }

    #[tokio::test]
    async fn test_http_fetcher_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = HttpFetcher::new()
            .fetch(&format!("{}/down", server.uri()), &BrowserOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::Capability { .. }));
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_http_fetcher_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let options = BrowserOptions {
            timeout_ms: 50,
            ..BrowserOptions::default()
        };
        let err = HttpFetcher::new()
            .fetch(&format!("{}/slow", server.uri()), &options)
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_in_memory_fetcher() {
        let fetcher = InMemoryFetcher::new()
            .with_page("https://example.com", "<p>home</p>")
            .with_failures("https://example.com/", 1);

        let options = BrowserOptions::default();
        assert!(fetcher.fetch("https://example.com/", &options).await.is_err());

        let page = fetcher.fetch("https://example.com/", &options).await.unwrap();
        assert_eq!(page.url, "https://example.com/");
        assert_eq!(page.html, "<p>home</p>");

        let err = fetcher
            .fetch("https://example.com/missing", &options)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
        assert_eq!(fetcher.requests().len(), 3);
    }
}
