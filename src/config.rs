use anyhow::{bail, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Default per-test timeout for TCP and HTTP probes.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default freshness window for cached socket lists.
pub const DEFAULT_CACHE_TTL_HOURS: u64 = 24;

/// Custom request header sent with the remote socket-list fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Parse the `Name: value` command-line form.
    pub fn parse(s: &str) -> Result<Self> {
        let Some((name, value)) = s.split_once(':') else {
            bail!("invalid header {s:?}: expected `Name: value`");
        };
        let name = name.trim();
        if name.is_empty() {
            bail!("invalid header {s:?}: empty name");
        }
        Ok(Self::new(name, value.trim()))
    }
}

/// Where and for how long remote socket lists are cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub enabled: bool,
    pub dir: PathBuf,
    pub ttl: Duration,
}

impl CacheConfig {
    pub fn from_hours(enabled: bool, dir: impl Into<PathBuf>, ttl_hours: u64) -> Self {
        Self {
            enabled,
            dir: dir.into(),
            ttl: Duration::from_secs(ttl_hours.saturating_mul(3600)),
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn default_dir() -> PathBuf {
        std::env::temp_dir().join("sockcheck-cache")
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::from_hours(true, Self::default_dir(), DEFAULT_CACHE_TTL_HOURS)
    }
}

/// Everything one run needs. Built once by the caller and passed down explicitly.
#[derive(Debug, Clone)]
pub struct Config {
    /// File path or `http(s)://` URL of the socket list.
    pub source: String,
    pub header: Option<Header>,
    pub verbose: bool,
    pub timeout: Duration,
    pub cache: CacheConfig,
}

impl Config {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            header: None,
            verbose: false,
            timeout: DEFAULT_TIMEOUT,
            cache: CacheConfig::default(),
        }
    }
}
