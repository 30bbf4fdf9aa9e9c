//! Configuration management for the BGP listener.
//!
//! Settings are loaded once at startup from a JSON file, then individual
//! values can be overridden with environment variables. The resulting
//! configuration is validated before the listener starts and never changes
//! afterwards.
//!
//! Environment variables (all optional):
//!
//! - `BGP_LISTENER_MONITORED_ASNS`: comma-separated ASNs, e.g. `64500,64501`
//! - `BGP_LISTENER_MONITORED_PREFIXES`: comma-separated prefixes
//! - `BGP_LISTENER_RIS_COLLECTORS`: comma-separated collector names
//! - `BGP_LISTENER_STREAM_URL`: RIS Live WebSocket URL
//! - `BGP_LISTENER_RECONNECT_DELAY_SECS`
//! - `BGP_LISTENER_MAX_RECONNECT_ATTEMPTS`: `0` means unlimited
//! - `BGP_LISTENER_NOTIFICATION_RETRY_ATTEMPTS`
//! - `BGP_LISTENER_NOTIFICATION_RETRY_DELAY_SECS`
//! - `BGP_LISTENER_NOTIFICATION_TIMEOUT_SECS`
//! - `BGP_LISTENER_STATS_INTERVAL_SECS`

use crate::notifier::RetryPolicy;
use crate::stream::{ReconnectPolicy, DEFAULT_RIS_LIVE_URL};
use crate::watchlist::Watchlist;
use crate::ListenerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

const DEFAULT_RECONNECT_DELAY_SECS: u64 = 5;
const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 0;
const DEFAULT_NOTIFICATION_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_NOTIFICATION_RETRY_DELAY_SECS: u64 = 2;
const DEFAULT_NOTIFICATION_TIMEOUT_SECS: u64 = 10;
const DEFAULT_STATS_INTERVAL_SECS: u64 = 60;

const ENV_PREFIX: &str = "BGP_LISTENER_";

/// Complete listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerConfig {
    /// ASNs to watch for anywhere on the AS path
    #[serde(default)]
    pub monitored_asns: Vec<u32>,

    /// prefixes to watch, covering all more specific announcements
    #[serde(default)]
    pub monitored_prefixes: Vec<String>,

    /// RIS collectors to subscribe to, e.g. `rrc21`
    #[serde(default = "default_ris_collectors")]
    pub ris_collectors: Vec<String>,

    /// RIS Live WebSocket URL
    #[serde(default = "default_stream_url")]
    pub stream_url: String,

    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,

    /// 0 means reconnect forever
    #[serde(default)]
    pub max_reconnect_attempts: u32,

    #[serde(default = "default_notification_retry_attempts")]
    pub notification_retry_attempts: u32,

    #[serde(default = "default_notification_retry_delay_secs")]
    pub notification_retry_delay_secs: u64,

    #[serde(default = "default_notification_timeout_secs")]
    pub notification_timeout_secs: u64,

    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,
}

fn default_ris_collectors() -> Vec<String> {
    vec!["rrc21".to_string()]
}

fn default_stream_url() -> String {
    DEFAULT_RIS_LIVE_URL.to_string()
}

fn default_reconnect_delay_secs() -> u64 {
    DEFAULT_RECONNECT_DELAY_SECS
}

fn default_notification_retry_attempts() -> u32 {
    DEFAULT_NOTIFICATION_RETRY_ATTEMPTS
}

fn default_notification_retry_delay_secs() -> u64 {
    DEFAULT_NOTIFICATION_RETRY_DELAY_SECS
}

fn default_notification_timeout_secs() -> u64 {
    DEFAULT_NOTIFICATION_TIMEOUT_SECS
}

fn default_stats_interval_secs() -> u64 {
    DEFAULT_STATS_INTERVAL_SECS
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            monitored_asns: vec![],
            monitored_prefixes: vec![],
            ris_collectors: default_ris_collectors(),
            stream_url: default_stream_url(),
            reconnect_delay_secs: DEFAULT_RECONNECT_DELAY_SECS,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            notification_retry_attempts: DEFAULT_NOTIFICATION_RETRY_ATTEMPTS,
            notification_retry_delay_secs: DEFAULT_NOTIFICATION_RETRY_DELAY_SECS,
            notification_timeout_secs: DEFAULT_NOTIFICATION_TIMEOUT_SECS,
            stats_interval_secs: DEFAULT_STATS_INTERVAL_SECS,
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    dotenvy::var(format!("{}{}", ENV_PREFIX, name))
        .ok()
        .filter(|v| !v.trim().is_empty())
}

fn parse_env<T: FromStr>(name: &str) -> Result<Option<T>, ListenerError>
where
    T::Err: fmt::Display,
{
    match env_var(name) {
        None => Ok(None),
        Some(v) => v.trim().parse::<T>().map(Some).map_err(|e| {
            ListenerError::ConfigError(format!("invalid {}{}={}: {}", ENV_PREFIX, name, v, e))
        }),
    }
}

fn parse_env_list<T: FromStr>(name: &str) -> Result<Option<Vec<T>>, ListenerError>
where
    T::Err: fmt::Display,
{
    match env_var(name) {
        None => Ok(None),
        Some(v) => v
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<T>().map_err(|e| {
                    ListenerError::ConfigError(format!(
                        "invalid entry {} in {}{}: {}",
                        s, ENV_PREFIX, name, e
                    ))
                })
            })
            .collect::<Result<Vec<T>, _>>()
            .map(Some),
    }
}

impl ListenerConfig {
    /// Load configuration from a JSON file. Missing fields take their
    /// defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ListenerError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ListenerError::ConfigError(format!(
                "unable to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        serde_json::from_str(content.as_str()).map_err(|e| {
            ListenerError::ConfigError(format!(
                "unable to parse config file {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Load from an optional file, apply environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ListenerError> {
        dotenvy::dotenv().ok();
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Override settings with `BGP_LISTENER_*` environment variables.
    pub fn apply_env(&mut self) -> Result<(), ListenerError> {
        if let Some(v) = parse_env_list("MONITORED_ASNS")? {
            self.monitored_asns = v;
        }
        if let Some(v) = parse_env_list("MONITORED_PREFIXES")? {
            self.monitored_prefixes = v;
        }
        if let Some(v) = parse_env_list("RIS_COLLECTORS")? {
            self.ris_collectors = v;
        }
        if let Some(v) = env_var("STREAM_URL") {
            self.stream_url = v;
        }
        if let Some(v) = parse_env("RECONNECT_DELAY_SECS")? {
            self.reconnect_delay_secs = v;
        }
        if let Some(v) = parse_env("MAX_RECONNECT_ATTEMPTS")? {
            self.max_reconnect_attempts = v;
        }
        if let Some(v) = parse_env("NOTIFICATION_RETRY_ATTEMPTS")? {
            self.notification_retry_attempts = v;
        }
        if let Some(v) = parse_env("NOTIFICATION_RETRY_DELAY_SECS")? {
            self.notification_retry_delay_secs = v;
        }
        if let Some(v) = parse_env("NOTIFICATION_TIMEOUT_SECS")? {
            self.notification_timeout_secs = v;
        }
        if let Some(v) = parse_env("STATS_INTERVAL_SECS")? {
            self.stats_interval_secs = v;
        }
        Ok(())
    }

    /// Check the settings the listener cannot run without.
    pub fn validate(&self) -> Result<(), ListenerError> {
        if self.ris_collectors.iter().all(|c| c.trim().is_empty()) {
            return Err(ListenerError::ConfigError(
                "at least one RIS collector must be configured".to_string(),
            ));
        }
        if self.stream_url.trim().is_empty() {
            return Err(ListenerError::ConfigError(
                "stream_url must not be empty".to_string(),
            ));
        }
        if self.notification_retry_attempts == 0 {
            return Err(ListenerError::ConfigError(
                "notification_retry_attempts must be at least 1".to_string(),
            ));
        }
        if self.notification_timeout_secs == 0 {
            return Err(ListenerError::ConfigError(
                "notification_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.stats_interval_secs == 0 {
            return Err(ListenerError::ConfigError(
                "stats_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.monitored_asns.is_empty() && self.monitored_prefixes.is_empty() {
            warn!("no ASNs or prefixes configured, no notifications will be sent");
        }
        Ok(())
    }

    /// Build the watchlist. Invalid prefixes are logged and skipped.
    pub fn watchlist(&self) -> Watchlist {
        Watchlist::from_strings(
            self.monitored_asns.iter().copied(),
            self.monitored_prefixes.as_slice(),
        )
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            delay: Duration::from_secs(self.reconnect_delay_secs),
            max_attempts: self.max_reconnect_attempts,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.notification_retry_attempts,
            delay: Duration::from_secs(self.notification_retry_delay_secs),
            timeout: Duration::from_secs(self.notification_timeout_secs),
        }
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }

    /// Display configuration summary for logging.
    ///
    /// Returns a vector of log lines suitable for info-level logging. The
    /// watchlist is the one built from this configuration at startup.
    pub fn display_summary(&self, watchlist: &Watchlist) -> Vec<String> {
        let mut lines = Vec::new();

        lines.push("=== BGP Listener Configuration ===".to_string());
        lines.push(format!("Stream: {}", self.stream_url));
        lines.push(format!("RIS collectors: {}", self.ris_collectors.join(", ")));
        lines.push(format!("Watchlist: {}", watchlist));

        match self.max_reconnect_attempts {
            0 => lines.push(format!(
                "Reconnect: every {}s, unlimited attempts",
                self.reconnect_delay_secs
            )),
            n => lines.push(format!(
                "Reconnect: every {}s, at most {} attempts",
                self.reconnect_delay_secs, n
            )),
        }

        lines.push(format!(
            "Notifications: {} attempts, {}s apart, {}s timeout",
            self.notification_retry_attempts,
            self.notification_retry_delay_secs,
            self.notification_timeout_secs
        ));
        lines.push(format!("Statistics: every {}s", self.stats_interval_secs));
        lines.push("==================================".to_string());

        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ListenerConfig::default();
        assert_eq!(config.ris_collectors, vec!["rrc21".to_string()]);
        assert_eq!(config.reconnect_delay_secs, 5);
        assert_eq!(config.max_reconnect_attempts, 0);
        assert_eq!(config.notification_retry_attempts, 3);
        assert_eq!(config.notification_retry_delay_secs, 2);
        assert_eq!(config.notification_timeout_secs, 10);
        assert_eq!(config.stats_interval(), Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "monitored_asns": [64500],
                "monitored_prefixes": ["10.0.0.0/16", "2001:db8::/32"],
                "ris_collectors": ["rrc00", "rrc21"],
                "max_reconnect_attempts": 10
            }}"#
        )
        .unwrap();

        let config = ListenerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.monitored_asns, vec![64500]);
        assert_eq!(config.ris_collectors.len(), 2);
        assert_eq!(config.max_reconnect_attempts, 10);
        assert_eq!(config.reconnect_delay_secs, 5);
        assert_eq!(config.stream_url, DEFAULT_RIS_LIVE_URL);

        let watchlist = config.watchlist();
        assert_eq!(watchlist.prefixes().len(), 2);
        assert_eq!(config.reconnect_policy().max_attempts, 10);
        assert_eq!(config.retry_policy().delay, Duration::from_secs(2));
    }

    #[test]
    fn test_from_file_errors() {
        assert!(matches!(
            ListenerConfig::from_file("/nonexistent/bgp-listener.json"),
            Err(ListenerError::ConfigError(_))
        ));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "monitored_asns: [1]").unwrap();
        assert!(matches!(
            ListenerConfig::from_file(file.path()),
            Err(ListenerError::ConfigError(_))
        ));
    }

    #[test]
    fn test_parse_env_list() {
        std::env::set_var("BGP_LISTENER_TEST_ASN_LIST", "64500, 64501,,");
        let asns = parse_env_list::<u32>("TEST_ASN_LIST").unwrap();
        assert_eq!(asns, Some(vec![64500, 64501]));

        std::env::set_var("BGP_LISTENER_TEST_BAD_ASN_LIST", "64500,AS1");
        assert!(parse_env_list::<u32>("TEST_BAD_ASN_LIST").is_err());

        assert_eq!(parse_env::<u64>("TEST_UNSET_VALUE").unwrap(), None);
    }

    #[test]
    fn test_validate() {
        let config = ListenerConfig {
            ris_collectors: vec![],
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ListenerConfig {
            notification_retry_attempts: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ListenerConfig {
            stats_interval_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_display_summary() {
        let config = ListenerConfig {
            monitored_asns: vec![64500],
            max_reconnect_attempts: 4,
            ..Default::default()
        };
        let lines = config.display_summary(&config.watchlist());
        assert!(lines.contains(&"RIS collectors: rrc21".to_string()));
        assert!(lines.contains(&"Watchlist: asns=[64500], prefixes=[]".to_string()));
        assert!(lines.contains(&"Reconnect: every 5s, at most 4 attempts".to_string()));
    }

    #[test]
    fn test_display_summary_uses_given_watchlist() {
        let config = ListenerConfig {
            monitored_asns: vec![64500],
            monitored_prefixes: vec!["not-a-prefix".to_string(), "10.0.0.1/16".to_string()],
            ..Default::default()
        };
        let watchlist = Watchlist::new([64501], ["192.0.2.0/24".parse().unwrap()]);
        let lines = config.display_summary(&watchlist);
        assert!(lines.contains(&"Watchlist: asns=[64501], prefixes=[192.0.2.0/24]".to_string()));
        assert!(!lines.iter().any(|l| l.contains("not-a-prefix")));
    }
}
