//! Configuration data structures for Keel.
//!
//! These types map directly to TOML (also JSON / YAML) configuration files. They are
//! intentionally serde‑friendly and include defaults so that minimal configs remain concise.
//! The records here are considered part of the public API for embedding.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Default function for origin weight
fn default_weight() -> f64 {
    1.0
}

/// Default function for origin enablement
fn default_enabled() -> bool {
    true
}

/// Default function for the per-attempt timeout (milliseconds)
fn default_timeout_millis() -> u64 {
    10_000
}

fn default_listen_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_health_path() -> String {
    "/health".to_string()
}

fn default_stats_path() -> String {
    "/_lb/stats".to_string()
}

/// Configuration for a single origin server.
///
/// Only `url` is required; every other field has a default so a minimal
/// entry is just `url = "https://server1.example.com"`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct OriginConfig {
    /// Absolute base URL of the origin (http or https, non-empty host)
    pub url: String,
    /// Relative selection probability within the origin's pool
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Whether the origin belongs to the backup pool instead of the primary pool
    #[serde(default)]
    pub backup: bool,
    /// Disabled origins are excluded from every pool
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Per-attempt deadline in milliseconds (validated to be at least 1000)
    #[serde(default = "default_timeout_millis")]
    pub timeout_millis: u64,
    /// Headers injected into requests forwarded to this origin, overriding
    /// same-named inbound and globally injected headers
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl OriginConfig {
    /// Create an origin configuration with defaults for everything but the URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            weight: default_weight(),
            backup: false,
            enabled: default_enabled(),
            timeout_millis: default_timeout_millis(),
            headers: HashMap::new(),
        }
    }

    /// Builder-style setter for the backup flag, mainly for tests and embedding.
    pub fn with_backup(mut self, backup: bool) -> Self {
        self.backup = backup;
        self
    }

    /// Builder-style setter for the weight.
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Builder-style setter for enablement.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Top-level proxy configuration.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ProxyConfig {
    /// The address the proxy listens on, e.g. "127.0.0.1:8080"
    pub listen_addr: String,
    /// The configured origin servers
    pub origins: Vec<OriginConfig>,
    /// Headers injected into every forwarded request, before per-origin headers
    pub inject_headers: HashMap<String, String>,
    /// Path served by the read-only health endpoint
    pub health_path: String,
    /// Path served by the read-only stats endpoint
    pub stats_path: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            origins: Vec::new(),
            inject_headers: HashMap::new(),
            health_path: default_health_path(),
            stats_path: default_stats_path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_config_defaults() {
        let config = OriginConfig::new("https://server1.example.com");
        assert_eq!(config.weight, 1.0);
        assert!(!config.backup);
        assert!(config.enabled);
        assert_eq!(config.timeout_millis, 10_000);
        assert!(config.headers.is_empty());
    }

    #[test]
    fn test_origin_config_deserializes_with_defaults() {
        let config: OriginConfig =
            serde_json::from_str(r#"{"url": "https://server1.example.com"}"#).unwrap();
        assert_eq!(config, OriginConfig::new("https://server1.example.com"));
    }

    #[test]
    fn test_proxy_config_defaults() {
        let config = ProxyConfig::default();
        assert_eq!(config.listen_addr, "127.0.0.1:8080");
        assert_eq!(config.health_path, "/health");
        assert_eq!(config.stats_path, "/_lb/stats");
        assert!(config.origins.is_empty());
        assert!(config.inject_headers.is_empty());
    }
}
