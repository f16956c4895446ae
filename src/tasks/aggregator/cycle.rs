use chrono::{NaiveDateTime, Utc};

use super::{CycleError, CycleReport, ItemError, SkippedItem};
use crate::dates;
use crate::fetcher::{FeedSource, RawFeedItem};
use crate::models::post::NewPost;
use crate::store::{FeedStore, StoreError};

enum ItemOutcome {
    Inserted,
    Duplicate,
}

/// Runs one polling cycle at a time against a store and a feed source.
/// Holds no state between cycles; everything lives in the store.
pub struct Aggregator<S, F> {
    store: S,
    source: F,
}

impl<S: FeedStore, F: FeedSource> Aggregator<S, F> {
    pub fn new(store: S, source: F) -> Self {
        Self { store, source }
    }

    pub async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        // The feed is marked fetched before the request goes out, so a slow
        // feed cannot hold its place at the front of the queue. This also
        // means a feed that always fails keeps the same rotation as healthy
        // ones: there is no backoff, only `last_error` for visibility.
        let feed = self
            .store
            .claim_next_feed(Utc::now())
            .map_err(CycleError::Claim)?
            .ok_or(CycleError::NoFeedsAvailable)?;
        tracing::debug!(feed_id = feed.id, feed_url = %feed.url, "Claimed feed");

        let document = match self.source.fetch(&feed.url).await {
            Ok(document) => document,
            Err(source) => {
                let message = source.to_string();
                if let Err(e) = self.store.record_fetch_error(feed.id, Some(message.as_str())) {
                    tracing::warn!(feed_id = feed.id, error = %e, "Could not record fetch error");
                }
                return Err(CycleError::Fetch {
                    feed_id: feed.id,
                    feed_url: feed.url,
                    source,
                });
            }
        };

        if feed.last_error.is_some() {
            if let Err(e) = self.store.record_fetch_error(feed.id, None) {
                tracing::warn!(feed_id = feed.id, error = %e, "Could not clear fetch error");
            }
        }

        let mut report = CycleReport {
            feed_id: feed.id,
            feed_url: feed.url,
            channel_title: document.title,
            items_seen: document.items.len(),
            ..Default::default()
        };

        let created_at = Utc::now().naive_utc();
        for (index, item) in document.items.into_iter().enumerate() {
            match self.ingest_item(report.feed_id, &item, created_at) {
                Ok(ItemOutcome::Inserted) => report.inserted += 1,
                Ok(ItemOutcome::Duplicate) => report.duplicates += 1,
                Err(error) => {
                    tracing::warn!(
                        feed_url = %report.feed_url,
                        item = index,
                        link = %item.link,
                        error = %error,
                        "Skipping feed item"
                    );
                    report.skipped.push(SkippedItem {
                        index,
                        link: item.link,
                        error,
                    });
                }
            }
        }

        Ok(report)
    }

    fn ingest_item(
        &self,
        feed_id: i32,
        item: &RawFeedItem,
        created_at: NaiveDateTime,
    ) -> Result<ItemOutcome, ItemError> {
        let published_at = dates::normalize(&item.pub_date)?;
        let url = item.link.trim();
        if url.is_empty() {
            return Err(ItemError::MissingLink);
        }

        let post = NewPost {
            feed_id,
            url,
            title: &item.title,
            description: Some(item.description.as_str()).filter(|d| !d.is_empty()),
            published_at: published_at.naive_utc(),
            created_at,
        };
        match self.store.insert_post(&post) {
            Ok(_) => Ok(ItemOutcome::Inserted),
            Err(StoreError::DuplicateUrl) => {
                tracing::trace!(url, "Post already stored");
                Ok(ItemOutcome::Duplicate)
            }
            Err(e) => Err(ItemError::Store(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::{parse_document, unescape_html, FetchError, RawFeedDocument};
    use crate::models::{feed::Feed, post::Post};
    use crate::store::SqliteStore;
    use crate::test_helpers::{create_test_db, insert_test_feed};
    use crate::DbPool;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Serves the same markup for every URL, decoded the way the HTTP
    /// fetcher decodes it.
    struct XmlSource(&'static str);

    impl FeedSource for XmlSource {
        async fn fetch(&self, _url: &str) -> Result<RawFeedDocument, FetchError> {
            let mut document = parse_document(self.0)?;
            unescape_html(&mut document);
            Ok(document)
        }
    }

    struct FailingSource;

    impl FeedSource for FailingSource {
        async fn fetch(&self, _url: &str) -> Result<RawFeedDocument, FetchError> {
            Err(FetchError::Body("connection reset".to_string()))
        }
    }

    const THREE_ITEMS_ONE_BAD_DATE: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <title>Example</title>
  <link>https://example.com</link>
  <description>Example feed</description>
  <item>
    <title>First</title>
    <link>https://example.com/1</link>
    <description>one</description>
    <pubDate>Tue, 10 Jun 2025 09:00:00 +0000</pubDate>
  </item>
  <item>
    <title>Second</title>
    <link>https://example.com/2</link>
    <pubDate>not-a-date</pubDate>
  </item>
  <item>
    <title>Third</title>
    <link>https://example.com/3</link>
    <pubDate>2025-06-10T11:00:00Z</pubDate>
  </item>
</channel></rss>"#;

    const VALID_AND_EMPTY_DATE: &str = r#"<rss><channel>
  <title>F</title>
  <item>
    <title><![CDATA[A &amp; B]]></title>
    <link>https://example.com/a</link>
    <pubDate>Tue, 10 Jun 2025 09:00:00 GMT</pubDate>
  </item>
  <item>
    <title>Undated</title>
    <link>https://example.com/b</link>
    <pubDate></pubDate>
  </item>
</channel></rss>"#;

    fn setup(feeds: &[(&str, &str)]) -> (TempDir, DbPool, Vec<Feed>) {
        let (dir, pool) = create_test_db();
        let mut conn = pool.get().unwrap();
        let feeds = feeds
            .iter()
            .map(|(name, url)| insert_test_feed(&mut conn, name, url))
            .collect();
        (dir, pool, feeds)
    }

    #[tokio::test]
    async fn test_bad_date_skips_only_that_item() {
        let (_dir, pool, feeds) = setup(&[("Example", "https://example.com/rss")]);
        let aggregator = Aggregator::new(
            SqliteStore::new(pool.clone()),
            XmlSource(THREE_ITEMS_ONE_BAD_DATE),
        );

        let report = aggregator.run_cycle().await.unwrap();
        assert_eq!(report.feed_id, feeds[0].id);
        assert_eq!(report.channel_title, "Example");
        assert_eq!(report.items_seen, 3);
        assert_eq!(report.inserted, 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].index, 1);
        assert!(matches!(report.skipped[0].error, ItemError::Date(_)));

        let posts = Post::get_by_feed(&mut pool.get().unwrap(), feeds[0].id).unwrap();
        let urls: Vec<&str> = posts.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(urls, vec!["https://example.com/1", "https://example.com/3"]);
        assert_eq!(posts[0].description.as_deref(), Some("one"));
        assert_eq!(posts[1].description, None);
    }

    #[tokio::test]
    async fn test_reingest_does_not_duplicate() {
        let (_dir, pool, _) = setup(&[("Example", "https://example.com/rss")]);
        let aggregator =
            Aggregator::new(SqliteStore::new(pool.clone()), XmlSource(VALID_AND_EMPTY_DATE));

        let first = aggregator.run_cycle().await.unwrap();
        assert_eq!(first.inserted, 1);
        let second = aggregator.run_cycle().await.unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.duplicates, 1);
        assert_eq!(second.skipped.len(), 1);

        let mut conn = pool.get().unwrap();
        assert_eq!(Post::count(&mut conn), Ok(1));
        assert!(Post::get_by_url(&mut conn, "https://example.com/a").is_some());
    }

    #[tokio::test]
    async fn test_single_feed_end_to_end() {
        let (_dir, pool, feeds) = setup(&[("F", "https://f.example/rss")]);
        let aggregator =
            Aggregator::new(SqliteStore::new(pool.clone()), XmlSource(VALID_AND_EMPTY_DATE));

        let report = aggregator.run_cycle().await.unwrap();
        assert_eq!(report.inserted, 1);
        assert!(matches!(report.skipped[0].error, ItemError::Date(_)));

        let mut conn = pool.get().unwrap();
        let posts = Post::get_by_feed(&mut conn, feeds[0].id).unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].title, "A & B");
        assert_eq!(posts[0].published_at.to_string(), "2025-06-10 09:00:00");
        let feed = Feed::get_by_id(&mut conn, feeds[0].id).unwrap();
        assert!(feed.last_fetched_at.is_some());
    }

    #[tokio::test]
    async fn test_missing_link_is_skipped() {
        const NO_LINK: &str = "<rss><channel><item><title>x</title>\
            <pubDate>2025-06-10 09:00:00</pubDate></item></channel></rss>";
        let (_dir, pool, _) = setup(&[("F", "https://f.example/rss")]);
        let aggregator = Aggregator::new(SqliteStore::new(pool.clone()), XmlSource(NO_LINK));

        let report = aggregator.run_cycle().await.unwrap();
        assert_eq!(report.inserted, 0);
        assert!(matches!(report.skipped[0].error, ItemError::MissingLink));
    }

    #[tokio::test]
    async fn test_empty_store_reports_no_feeds() {
        let (_dir, pool, _) = setup(&[]);
        let aggregator = Aggregator::new(SqliteStore::new(pool), FailingSource);
        assert!(matches!(
            aggregator.run_cycle().await,
            Err(CycleError::NoFeedsAvailable)
        ));
    }

    #[tokio::test]
    async fn test_failed_fetch_still_advances_last_fetched_at() {
        let (_dir, pool, feeds) = setup(&[("F", "https://f.example/rss")]);
        let aggregator = Aggregator::new(SqliteStore::new(pool.clone()), FailingSource);

        let mut previous = None;
        for _ in 0..3 {
            let result = aggregator.run_cycle().await;
            match result {
                Err(CycleError::Fetch { feed_id, ref feed_url, .. }) => {
                    assert_eq!(feed_id, feeds[0].id);
                    assert_eq!(feed_url, "https://f.example/rss");
                }
                other => panic!("expected fetch error, got {other:?}"),
            }

            let feed = Feed::get_by_id(&mut pool.get().unwrap(), feeds[0].id).unwrap();
            let fetched_at = feed.last_fetched_at.unwrap();
            if let Some(previous) = previous {
                assert!(fetched_at > previous);
            }
            previous = Some(fetched_at);
            assert_eq!(
                feed.last_error.as_deref(),
                Some("unreadable response body: connection reset")
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_successful_fetch_clears_error() {
        let (_dir, pool, feeds) = setup(&[("F", "https://f.example/rss")]);
        Aggregator::new(SqliteStore::new(pool.clone()), FailingSource)
            .run_cycle()
            .await
            .unwrap_err();

        Aggregator::new(SqliteStore::new(pool.clone()), XmlSource(VALID_AND_EMPTY_DATE))
            .run_cycle()
            .await
            .unwrap();
        let feed = Feed::get_by_id(&mut pool.get().unwrap(), feeds[0].id).unwrap();
        assert_eq!(feed.last_error, None);
    }

    #[tokio::test]
    async fn test_never_fetched_feeds_go_first() {
        let (_dir, pool, feeds) = setup(&[
            ("old", "https://old.example/rss"),
            ("new", "https://new.example/rss"),
        ]);
        let store = SqliteStore::new(pool.clone());
        store.mark_feed_fetched(feeds[0].id, Utc::now()).unwrap();

        let aggregator = Aggregator::new(store, XmlSource(VALID_AND_EMPTY_DATE));
        let report = aggregator.run_cycle().await.unwrap();
        assert_eq!(report.feed_id, feeds[1].id);
        let report = aggregator.run_cycle().await.unwrap();
        assert_eq!(report.feed_id, feeds[0].id);
    }
}
