//! Storage boundary for the aggregator.
//!
//! The pipeline only sees [`FeedStore`]; [`SqliteStore`] is the diesel
//! implementation used by the binary and most tests.

use chrono::{DateTime, Utc};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::SqliteConnection;
use thiserror::Error;

use crate::db::{DbConn, DbPool};
use crate::models::feed::{Feed, PartialFeed};
use crate::models::post::{NewPost, Post};

#[derive(Debug, Error)]
pub enum StoreError {
    /// A post with this URL already exists. Expected during re-ingestion.
    #[error("a post with this URL already exists")]
    DuplicateUrl,
    #[error("feed {0} does not exist")]
    FeedNotFound(i32),
    #[error("could not get a database connection: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("database error: {0}")]
    Database(#[from] DieselError),
}

pub trait FeedStore {
    /// The feed with the oldest `last_fetched_at`, never-fetched feeds first.
    fn select_next_feed_to_fetch(&self) -> Result<Option<Feed>, StoreError>;

    fn mark_feed_fetched(&self, feed_id: i32, at: DateTime<Utc>) -> Result<Feed, StoreError>;

    /// Fails with [`StoreError::DuplicateUrl`] when the URL is already stored.
    fn insert_post(&self, post: &NewPost<'_>) -> Result<Post, StoreError>;

    /// Record the outcome of the last fetch; `None` clears a previous error.
    fn record_fetch_error(&self, feed_id: i32, error: Option<&str>) -> Result<(), StoreError>;

    /// Select and mark in one step. The default is two separate calls, which
    /// is enough for a single scheduler; implementations shared between
    /// workers should make it atomic.
    fn claim_next_feed(&self, at: DateTime<Utc>) -> Result<Option<Feed>, StoreError> {
        let Some(feed) = self.select_next_feed_to_fetch()? else {
            return Ok(None);
        };
        self.mark_feed_fetched(feed.id, at).map(Some)
    }
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> Result<DbConn, StoreError> {
        Ok(self.pool.get()?)
    }
}

fn mark(conn: &mut SqliteConnection, feed_id: i32, at: DateTime<Utc>) -> Result<Feed, StoreError> {
    Feed::mark_fetched(conn, feed_id, at.naive_utc()).map_err(|e| match e {
        DieselError::NotFound => StoreError::FeedNotFound(feed_id),
        other => StoreError::Database(other),
    })
}

impl FeedStore for SqliteStore {
    fn select_next_feed_to_fetch(&self) -> Result<Option<Feed>, StoreError> {
        let mut conn = self.conn()?;
        Ok(Feed::next_to_fetch(&mut conn)?)
    }

    fn mark_feed_fetched(&self, feed_id: i32, at: DateTime<Utc>) -> Result<Feed, StoreError> {
        let mut conn = self.conn()?;
        mark(&mut conn, feed_id, at)
    }

    fn insert_post(&self, post: &NewPost<'_>) -> Result<Post, StoreError> {
        let mut conn = self.conn()?;
        post.insert(&mut conn).map_err(|e| match e {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                StoreError::DuplicateUrl
            }
            other => StoreError::Database(other),
        })
    }

    fn record_fetch_error(&self, feed_id: i32, error: Option<&str>) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let update = PartialFeed {
            last_error: Some(error.map(str::to_string)),
            ..Default::default()
        };
        match Feed::update(&mut conn, feed_id, &update) {
            Ok(_) => Ok(()),
            Err(DieselError::NotFound) => Err(StoreError::FeedNotFound(feed_id)),
            Err(e) => Err(e.into()),
        }
    }

    /// `BEGIN IMMEDIATE` takes the write lock before the select, so two
    /// processes sharing the file can never claim the same feed.
    fn claim_next_feed(&self, at: DateTime<Utc>) -> Result<Option<Feed>, StoreError> {
        let mut conn = self.conn()?;
        conn.immediate_transaction(|conn| {
            let Some(feed) = Feed::next_to_fetch(conn)? else {
                return Ok(None);
            };
            mark(conn, feed.id, at).map(Some)
        })
    }
}
