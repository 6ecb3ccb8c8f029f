//! Browser capability implementations

mod dom;
mod dom_browser;
mod fetcher;

pub use dom_browser::DomBrowser;
pub use fetcher::{
    absolute_url, normalize_url, FetchedPage, HttpFetcher, InMemoryFetcher, PageFetcher,
};
