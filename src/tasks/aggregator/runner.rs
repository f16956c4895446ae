use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use super::{Aggregator, CycleResult};
use crate::config::FetchConfig;
use crate::fetcher::{FeedFetcher, FetchError};
use crate::observability::log_cycle_result;
use crate::store::SqliteStore;
use crate::DbPool;

/// Drives a cycle function on a fixed interval. The first cycle runs
/// immediately; a cycle that outlasts the interval delays the next tick
/// instead of stacking up, so cycles never overlap.
#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    interval: Duration,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Run forever. Failed cycles are logged and the next tick proceeds.
    pub async fn run<C, Fut>(&self, cycle: C)
    where
        C: FnMut() -> Fut,
        Fut: Future<Output = CycleResult>,
    {
        self.run_until(cycle, |_, _| ControlFlow::Continue(())).await;
    }

    /// Like [`Scheduler::run`], but hands each result to `on_tick` and
    /// stops when it breaks. Returns the number of cycles run.
    pub async fn run_until<C, Fut, T>(&self, mut cycle: C, mut on_tick: T) -> u64
    where
        C: FnMut() -> Fut,
        Fut: Future<Output = CycleResult>,
        T: FnMut(u64, &CycleResult) -> ControlFlow<()>,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut ticks = 0;
        loop {
            ticker.tick().await;
            let result = cycle().await;
            ticks += 1;
            log_cycle_result(&result);
            if on_tick(ticks, &result).is_break() {
                return ticks;
            }
        }
    }
}

/// Aggregate every feed in `pool` until the process is killed.
pub async fn start(
    pool: DbPool,
    fetch: &FetchConfig,
    interval: Duration,
) -> Result<(), FetchError> {
    let fetcher = FeedFetcher::new(fetch)?;
    let aggregator = Aggregator::new(SqliteStore::new(pool), fetcher);
    let scheduler = Scheduler::new(interval);

    tracing::info!(
        interval_ms = interval.as_millis() as u64,
        timeout_secs = fetch.timeout.as_secs(),
        user_agent = %fetch.user_agent,
        "Collecting feeds"
    );
    scheduler.run(|| aggregator.run_cycle()).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::{FeedSource, RawFeedDocument};
    use crate::tasks::aggregator::{CycleError, CycleReport};
    use crate::tasks::types::parse_interval;
    use crate::test_helpers::create_test_db;
    use std::time::Instant;

    struct UnreachableSource;

    impl FeedSource for UnreachableSource {
        async fn fetch(&self, url: &str) -> Result<RawFeedDocument, FetchError> {
            panic!("no feed should be fetched, got {url}");
        }
    }

    #[tokio::test]
    async fn test_empty_store_keeps_ticking() {
        let (_dir, pool) = create_test_db();
        let aggregator = Aggregator::new(SqliteStore::new(pool), UnreachableSource);
        let scheduler = Scheduler::new(parse_interval("10ms").unwrap());

        let mut no_feeds = 0;
        let ticks = scheduler
            .run_until(
                || aggregator.run_cycle(),
                |tick, result| {
                    if matches!(result, Err(CycleError::NoFeedsAvailable)) {
                        no_feeds += 1;
                    }
                    if tick == 10 {
                        ControlFlow::Break(())
                    } else {
                        ControlFlow::Continue(())
                    }
                },
            )
            .await;

        assert_eq!(ticks, 10);
        assert_eq!(no_feeds, 10);
    }

    #[tokio::test]
    async fn test_first_tick_is_immediate() {
        let scheduler = Scheduler::new(Duration::from_secs(3600));
        let started = Instant::now();
        let ticks = scheduler
            .run_until(
                || async { Ok(CycleReport::default()) },
                |_, _| ControlFlow::Break(()),
            )
            .await;
        assert_eq!(ticks, 1);
        assert!(started.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_slow_cycles_do_not_overlap() {
        let scheduler = Scheduler::new(Duration::from_millis(5));
        let started = Instant::now();
        let ticks = scheduler
            .run_until(
                || async {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Err(CycleError::NoFeedsAvailable)
                },
                |tick, _| {
                    if tick == 3 {
                        ControlFlow::Break(())
                    } else {
                        ControlFlow::Continue(())
                    }
                },
            )
            .await;
        assert_eq!(ticks, 3);
        assert!(started.elapsed() >= Duration::from_millis(60));
    }
}
