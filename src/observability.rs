use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::tasks::aggregator::{CycleError, CycleResult};

/// Initialize structured logging. `RUST_LOG` wins over `LOG_LEVEL`;
/// `LOG_FORMAT=json` switches to JSON lines. `log` records from the model
/// helpers are captured by the same subscriber.
pub fn init_logging() {
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

    if log_format == "json" {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(false)
                    .with_span_list(false),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init();
    }

    info!(
        service = "rssagg",
        version = env!("CARGO_PKG_VERSION"),
        log_level = %log_level,
        log_format = %log_format,
        "Logging initialized"
    );
}

/// One line per cycle. An empty feed table is routine, so it stays at info.
pub fn log_cycle_result(result: &CycleResult) {
    match result {
        Ok(report) => info!(
            feed_id = report.feed_id,
            feed_url = %report.feed_url,
            channel = %report.channel_title,
            items = report.items_seen,
            inserted = report.inserted,
            duplicates = report.duplicates,
            skipped = report.skipped.len(),
            "Feed processed"
        ),
        Err(CycleError::NoFeedsAvailable) => info!("No feeds to fetch"),
        Err(CycleError::Fetch {
            feed_id,
            feed_url,
            source,
        }) => warn!(feed_id, feed_url = %feed_url, error = %source, "Feed fetch failed"),
        Err(e @ CycleError::Claim(_)) => warn!(error = %e, "Cycle failed"),
    }
}
