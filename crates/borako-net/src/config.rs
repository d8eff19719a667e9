//! Environment configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// How long a vanished peer keeps its seat
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(2);

/// Time allowed for a single connection attempt to the host
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Extra connection attempts after the first one fails
pub const DEFAULT_CONNECT_RETRIES: u32 = 2;

/// Listen address of a hosting peer
pub const DEFAULT_HOST_ADDR: &str = "0.0.0.0:9000";

/// Listen address of a joining peer; any free port
pub const DEFAULT_JOIN_ADDR: &str = "0.0.0.0:0";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(None),
    }
}

/// Replication timing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    pub grace_period: Duration,
    pub connect_timeout: Duration,
    pub connect_retries: u32,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            grace_period: DEFAULT_GRACE_PERIOD,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            connect_retries: DEFAULT_CONNECT_RETRIES,
        }
    }
}

impl CoordinatorConfig {
    /// Defaults overridden by `BORAKO_GRACE_PERIOD_MS`,
    /// `BORAKO_CONNECT_TIMEOUT_MS` and `BORAKO_CONNECT_RETRIES`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(ms) = parse_var::<u64>(&lookup, "BORAKO_GRACE_PERIOD_MS")? {
            config.grace_period = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "BORAKO_CONNECT_TIMEOUT_MS")? {
            config.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(retries) = parse_var(&lookup, "BORAKO_CONNECT_RETRIES")? {
            config.connect_retries = retries;
        }
        Ok(config)
    }
}

/// Settings of the `borako-peer` binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerConfig {
    pub listen_addr: SocketAddr,
    /// Display name of the local player
    pub name: String,
    /// URL of a host to join instead of hosting
    pub join: Option<String>,
    pub team_a_name: Option<String>,
    pub team_b_name: Option<String>,
    /// File the session is saved to on exit and resumed from on start
    pub session_path: Option<PathBuf>,
}

impl PeerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let join = non_empty("BORAKO_JOIN");
        let default_addr = if join.is_some() {
            DEFAULT_JOIN_ADDR
        } else {
            DEFAULT_HOST_ADDR
        };
        let listen_addr = match parse_var(&lookup, "BORAKO_ADDR")? {
            Some(addr) => addr,
            None => default_addr.parse().map_err(|_| ConfigError::Invalid {
                key: "BORAKO_ADDR",
                value: default_addr.to_string(),
            })?,
        };

        Ok(Self {
            listen_addr,
            name: non_empty("BORAKO_NAME").unwrap_or_else(|| "Host".to_string()),
            join,
            team_a_name: non_empty("BORAKO_TEAM_A"),
            team_b_name: non_empty("BORAKO_TEAM_B"),
            session_path: non_empty("BORAKO_SESSION").map(PathBuf::from),
        })
    }
}
