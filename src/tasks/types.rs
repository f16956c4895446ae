use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;

static INTERVAL_REGEX: OnceLock<Regex> = OnceLock::new();
static COMPONENT_REGEX: OnceLock<Regex> = OnceLock::new();

const NUMBER: &str = r"(\d+(?:\.\d*)?|\.\d+)";
// Longer units first so "ms" is not read as "m" followed by garbage.
const UNIT: &str = r"(ns|us|µs|μs|ms|s|m|h)";

#[derive(Debug, Error, PartialEq)]
pub enum IntervalError {
    #[error("interval must not be empty")]
    Empty,
    #[error("invalid interval {0:?}: expected a duration such as \"30s\", \"1m\" or \"1h30m\"")]
    Invalid(String),
    #[error("interval must be greater than zero")]
    Zero,
    #[error("interval {0:?} is too large")]
    Overflow(String),
}

/// Parse a polling interval written as a sequence of `<number><unit>`
/// components, e.g. `"10ms"`, `"1.5s"` or `"1h30m"`.
pub fn parse_interval(input: &str) -> Result<Duration, IntervalError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(IntervalError::Empty);
    }

    let whole = INTERVAL_REGEX
        .get_or_init(|| Regex::new(&format!("^(?:{NUMBER}{UNIT})+$")).unwrap());
    if !whole.is_match(input) {
        return Err(IntervalError::Invalid(input.to_string()));
    }

    let component =
        COMPONENT_REGEX.get_or_init(|| Regex::new(&format!("{NUMBER}{UNIT}")).unwrap());
    let mut nanos: f64 = 0.0;
    for caps in component.captures_iter(input) {
        let value: f64 = caps[1]
            .parse()
            .map_err(|_| IntervalError::Invalid(input.to_string()))?;
        nanos += value * unit_nanos(&caps[2]);
    }

    let nanos = nanos.round();
    if nanos >= u64::MAX as f64 {
        return Err(IntervalError::Overflow(input.to_string()));
    }
    if nanos < 1.0 {
        return Err(IntervalError::Zero);
    }
    Ok(Duration::from_nanos(nanos as u64))
}

fn unit_nanos(unit: &str) -> f64 {
    match unit {
        "ns" => 1.0,
        "us" | "µs" | "μs" => 1e3,
        "ms" => 1e6,
        "s" => 1e9,
        "m" => 60.0 * 1e9,
        _ => 3600.0 * 1e9,
    }
}
