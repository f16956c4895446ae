//! Feed retrieval: HTTP transport plus the RSS document model.

mod client;
mod document;

use std::future::Future;

use thiserror::Error;

pub use client::FeedFetcher;
pub use document::{parse_document, unescape_html, RawFeedDocument, RawFeedItem};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build request: {0}")]
    Request(#[source] reqwest::Error),
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("unreadable response body: {0}")]
    Body(String),
    #[error("malformed feed markup: {0}")]
    Markup(String),
}

/// Anything that can turn a feed URL into a parsed document.
///
/// [`FeedFetcher`] is the network implementation; tests substitute canned
/// documents.
pub trait FeedSource {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<RawFeedDocument, FetchError>>;
}
