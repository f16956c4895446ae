//! The polling pipeline: claim one feed, fetch it, store its new posts.

mod cycle;
mod runner;

use thiserror::Error;

use crate::dates::DateParseError;
use crate::fetcher::FetchError;
use crate::store::StoreError;

pub use cycle::Aggregator;
pub use runner::{start, Scheduler};

pub type CycleResult = Result<CycleReport, CycleError>;

/// Why a whole cycle ended early. None of these stop the scheduler.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("no feeds available to fetch")]
    NoFeedsAvailable,
    #[error("could not claim a feed: {0}")]
    Claim(#[source] StoreError),
    #[error("failed to fetch {feed_url}: {source}")]
    Fetch {
        feed_id: i32,
        feed_url: String,
        #[source]
        source: FetchError,
    },
}

/// Why a single item was skipped. Reported, never propagated.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error(transparent)]
    Date(#[from] DateParseError),
    #[error("item has no link")]
    MissingLink,
    #[error("could not store post: {0}")]
    Store(#[source] StoreError),
}

#[derive(Debug)]
pub struct SkippedItem {
    /// Position in the document, zero-based.
    pub index: usize,
    pub link: String,
    pub error: ItemError,
}

/// Outcome of a cycle that reached the item loop.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub feed_id: i32,
    pub feed_url: String,
    pub channel_title: String,
    pub items_seen: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub skipped: Vec<SkippedItem>,
}
