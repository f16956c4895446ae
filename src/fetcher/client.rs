use reqwest::{header::ACCEPT, Client};

use super::{parse_document, unescape_html, FeedSource, FetchError, RawFeedDocument};
use crate::config::FetchConfig;

// See: https://stackoverflow.com/a/7001617/5155484
const ACCEPT_FEEDS: &str =
    "application/rss+xml, application/rdf+xml, application/atom+xml, application/xml;q=0.9, text/xml;q=0.8";

/// Fetches feeds over HTTP. Holds one client so connections are reused
/// between cycles. Never retries; a failed fetch waits for the feed's next turn.
#[derive(Debug, Clone)]
pub struct FeedFetcher {
    client: Client,
}

impl FeedFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(FetchError::Request)?;
        Ok(Self { client })
    }

    pub async fn fetch_document(&self, url: &str) -> Result<RawFeedDocument, FetchError> {
        tracing::debug!(feed_url = url, "Fetching feed");

        let request = self
            .client
            .get(url)
            .header(ACCEPT, ACCEPT_FEEDS)
            .build()
            .map_err(FetchError::Request)?;

        let response = self
            .client
            .execute(request)
            .await
            .and_then(|response| response.error_for_status())
            .map_err(FetchError::Transport)?;

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Transport(e)
            } else {
                FetchError::Body(e.to_string())
            }
        })?;
        let text = std::str::from_utf8(&body)
            .map_err(|e| FetchError::Body(format!("response is not valid UTF-8: {e}")))?;

        let mut document = parse_document(text)?;
        unescape_html(&mut document);

        tracing::debug!(
            feed_url = url,
            items = document.items.len(),
            "Parsed feed document"
        );
        Ok(document)
    }
}

impl FeedSource for FeedFetcher {
    async fn fetch(&self, url: &str) -> Result<RawFeedDocument, FetchError> {
        self.fetch_document(url).await
    }
}
