use std::{env, time::Duration};

use thiserror::Error;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_USER_AGENT: &str = concat!("rssagg/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{var} must be a positive number of seconds, got {value:?}")]
    InvalidTimeout { var: &'static str, value: String },
    #[error("{var} must not be empty")]
    Empty { var: &'static str },
    #[error("could not determine current directory: {0}")]
    CurrentDir(String),
}

/// HTTP settings for the feed fetcher.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_FETCH_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database_url: String,
    pub fetch: FetchConfig,
}

impl AppConfig {
    /// Read `RSSAGG_*` variables from the process environment. Call
    /// `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = match lookup("RSSAGG_DATABASE_URL") {
            Some(url) if url.trim().is_empty() => {
                return Err(ConfigError::Empty {
                    var: "RSSAGG_DATABASE_URL",
                })
            }
            Some(url) => {
                log::info!("Using database from RSSAGG_DATABASE_URL: {}", url);
                url
            }
            None => {
                let mut path =
                    env::current_dir().map_err(|e| ConfigError::CurrentDir(e.to_string()))?;
                path.push("rssagg.db");
                let res = path.to_string_lossy().into_owned();
                log::info!("Using default database path: {}", res);
                res
            }
        };

        let timeout = match lookup("RSSAGG_FETCH_TIMEOUT_SECS") {
            Some(value) => match value.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => {
                    log::info!("Using fetch timeout from RSSAGG_FETCH_TIMEOUT_SECS: {}s", secs);
                    Duration::from_secs(secs)
                }
                _ => {
                    return Err(ConfigError::InvalidTimeout {
                        var: "RSSAGG_FETCH_TIMEOUT_SECS",
                        value,
                    })
                }
            },
            None => DEFAULT_FETCH_TIMEOUT,
        };

        let user_agent = match lookup("RSSAGG_USER_AGENT") {
            Some(agent) if agent.trim().is_empty() => {
                return Err(ConfigError::Empty {
                    var: "RSSAGG_USER_AGENT",
                })
            }
            Some(agent) => agent,
            None => DEFAULT_USER_AGENT.to_string(),
        };

        Ok(AppConfig {
            database_url,
            fetch: FetchConfig {
                timeout,
                user_agent,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[])).unwrap();
        assert!(config.database_url.ends_with("rssagg.db"));
        assert_eq!(config.fetch, FetchConfig::default());
        assert_eq!(config.fetch.timeout, Duration::from_secs(5));
        assert!(config.fetch.user_agent.starts_with("rssagg/"));
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("RSSAGG_DATABASE_URL", "/tmp/feeds.db"),
            ("RSSAGG_FETCH_TIMEOUT_SECS", "12"),
            ("RSSAGG_USER_AGENT", "gator"),
        ]))
        .unwrap();
        assert_eq!(config.database_url, "/tmp/feeds.db");
        assert_eq!(config.fetch.timeout, Duration::from_secs(12));
        assert_eq!(config.fetch.user_agent, "gator");
    }

    #[test]
    fn test_rejects_bad_timeout() {
        for value in ["0", "-1", "soon"] {
            let err = AppConfig::from_lookup(lookup_from(&[("RSSAGG_FETCH_TIMEOUT_SECS", value)]))
                .unwrap_err();
            assert_eq!(
                err,
                ConfigError::InvalidTimeout {
                    var: "RSSAGG_FETCH_TIMEOUT_SECS",
                    value: value.to_string()
                }
            );
        }
    }

    #[test]
    fn test_rejects_empty_values() {
        let err = AppConfig::from_lookup(lookup_from(&[("RSSAGG_DATABASE_URL", " ")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Empty {
                var: "RSSAGG_DATABASE_URL"
            }
        );
    }
}
