//! Runtime configuration read from environment variables.
//!
//! `main` loads an optional `.env` file with `dotenvy` before calling
//! [`Config::from_env`].
//!
//! | Variable | Default |
//! |---|---|
//! | `PORT` | 3000 |
//! | `NOTAM_DATA_FILE` | `data/notams.json` |
//! | `NOTAM_SOURCE_URL` | unset, sample data is generated |
//! | `NOTAM_MANUAL_FILE` | unset |
//! | `NOTAM_FETCH_TIMEOUT_SECS` | 30 |
//! | `NOTAM_CACHE_TTL_SECS` | 900 |
//! | `NOTAM_REFRESH_INTERVAL_SECS` | 21600 (6 h) |
//! | `NOTAM_CLEANUP_INTERVAL_SECS` | 86400 (24 h) |
//! | `CACHE_SWEEP_INTERVAL_SECS` | 7200 (2 h) |
//! | `NOTAM_SCHEDULER_ENABLED` | true |
//! | `STATIC_DIR` | unset |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub port: u16,
    pub data_file: PathBuf,
    pub source_url: Option<String>,
    pub manual_file: Option<PathBuf>,
    pub fetch_timeout: Duration,
    pub cache_ttl: Duration,
    pub refresh_interval: Duration,
    pub cleanup_interval: Duration,
    pub cache_sweep_interval: Duration,
    pub scheduler_enabled: bool,
    /// Built web client to serve for non-API paths.
    pub static_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            data_file: PathBuf::from("data/notams.json"),
            source_url: None,
            manual_file: None,
            fetch_timeout: Duration::from_secs(30),
            cache_ttl: Duration::from_secs(900),
            refresh_interval: Duration::from_secs(6 * 60 * 60),
            cleanup_interval: Duration::from_secs(24 * 60 * 60),
            cache_sweep_interval: Duration::from_secs(2 * 60 * 60),
            scheduler_enabled: true,
            static_dir: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup. Unset or
    /// blank variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Ok(Self {
            port: parse(&var, "PORT")?.unwrap_or(defaults.port),
            data_file: var("NOTAM_DATA_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_file),
            source_url: var("NOTAM_SOURCE_URL"),
            manual_file: var("NOTAM_MANUAL_FILE").map(PathBuf::from),
            fetch_timeout: secs(&var, "NOTAM_FETCH_TIMEOUT_SECS")?
                .unwrap_or(defaults.fetch_timeout),
            cache_ttl: secs(&var, "NOTAM_CACHE_TTL_SECS")?.unwrap_or(defaults.cache_ttl),
            refresh_interval: nonzero_secs(&var, "NOTAM_REFRESH_INTERVAL_SECS")?
                .unwrap_or(defaults.refresh_interval),
            cleanup_interval: nonzero_secs(&var, "NOTAM_CLEANUP_INTERVAL_SECS")?
                .unwrap_or(defaults.cleanup_interval),
            cache_sweep_interval: nonzero_secs(&var, "CACHE_SWEEP_INTERVAL_SECS")?
                .unwrap_or(defaults.cache_sweep_interval),
            scheduler_enabled: match var("NOTAM_SCHEDULER_ENABLED") {
                Some(v) => parse_bool("NOTAM_SCHEDULER_ENABLED", &v)?,
                None => defaults.scheduler_enabled,
            },
            static_dir: var("STATIC_DIR").map(PathBuf::from),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

fn parse<T, F>(var: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    var(key)
        .map(|v| {
            v.trim()
                .parse()
                .map_err(|e| Error::Config(format!("{key}={v:?}: {e}")))
        })
        .transpose()
}

fn secs<F>(var: &F, key: &str) -> Result<Option<Duration>>
where
    F: Fn(&str) -> Option<String>,
{
    Ok(parse::<u64, _>(var, key)?.map(Duration::from_secs))
}

/// Longest accepted job interval.
pub const MAX_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Intervals feed `tokio::time::interval`, which rejects zero and overflows
/// the clock on absurd periods.
fn nonzero_secs<F>(var: &F, key: &str) -> Result<Option<Duration>>
where
    F: Fn(&str) -> Option<String>,
{
    match secs(var, key)? {
        Some(d) if d.is_zero() => Err(Error::Config(format!("{key} must be greater than 0"))),
        Some(d) if d > MAX_INTERVAL => Err(Error::Config(format!(
            "{key} must be at most {} seconds",
            MAX_INTERVAL.as_secs()
        ))),
        other => Ok(other),
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Config(format!("{key}={other:?} is not a boolean"))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = from_pairs(&[]).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.addr().port(), 3000);
        assert_eq!(config.cache_ttl, Duration::from_secs(900));
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("PORT", "8080"),
            ("NOTAM_DATA_FILE", "/var/lib/notams.json"),
            ("NOTAM_SOURCE_URL", "https://example.test/notams"),
            ("NOTAM_REFRESH_INTERVAL_SECS", "60"),
            ("NOTAM_SCHEDULER_ENABLED", "false"),
            ("STATIC_DIR", "client/build"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.data_file, PathBuf::from("/var/lib/notams.json"));
        assert_eq!(
            config.source_url.as_deref(),
            Some("https://example.test/notams")
        );
        assert_eq!(config.refresh_interval, Duration::from_secs(60));
        assert!(!config.scheduler_enabled);
        assert_eq!(config.static_dir, Some(PathBuf::from("client/build")));
    }

    #[test]
    fn test_blank_values_keep_defaults() {
        let config = from_pairs(&[("PORT", " "), ("NOTAM_SOURCE_URL", "")]).unwrap();
        assert_eq!(config.port, 3000);
        assert!(config.source_url.is_none());
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            from_pairs(&[("PORT", "eighty")]),
            Err(Error::Config(_))
        ));
        assert!(from_pairs(&[("NOTAM_CLEANUP_INTERVAL_SECS", "0")]).is_err());
        assert!(from_pairs(&[("NOTAM_SCHEDULER_ENABLED", "maybe")]).is_err());
    }

    #[test]
    fn test_intervals_are_capped_at_one_year() {
        let year = MAX_INTERVAL.as_secs().to_string();
        let config = from_pairs(&[("NOTAM_REFRESH_INTERVAL_SECS", year.as_str())]).unwrap();
        assert_eq!(config.refresh_interval, MAX_INTERVAL);

        for key in [
            "NOTAM_REFRESH_INTERVAL_SECS",
            "NOTAM_CLEANUP_INTERVAL_SECS",
            "CACHE_SWEEP_INTERVAL_SECS",
        ] {
            assert!(matches!(
                from_pairs(&[(key, "18446744073709551615")]),
                Err(Error::Config(_))
            ));
        }
    }
}
