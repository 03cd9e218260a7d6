use std::{collections::HashMap, fmt, str::FromStr, time::Duration};

use thiserror::Error;
use url::Url;

use crate::config::OriginConfig;

/// Errors related to origin descriptor construction
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum OriginError {
    /// Error when URL is not parseable
    #[error("Invalid origin URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    /// Error when URL scheme is not http or https
    #[error("Unsupported origin URL scheme '{scheme}' in '{url}'")]
    UnsupportedScheme { url: String, scheme: String },

    /// Error when URL has no host component
    #[error("Origin URL '{0}' has no host")]
    MissingHost(String),
}

/// Result type for origin operations
pub type OriginResult<T> = Result<T, OriginError>;

/// A validated origin descriptor: one configured backend the proxy may
/// forward requests to.
///
/// Construction validates the URL (http/https scheme, non-empty host) and
/// snapshots the selection/timeout settings. Instances are immutable; the
/// engine never mutates origin configuration after startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Origin {
    url: Url,
    weight: f64,
    backup: bool,
    enabled: bool,
    timeout: Duration,
    inject_headers: HashMap<String, String>,
}

impl Origin {
    /// Build a validated origin from its configuration record.
    ///
    /// # Errors
    /// Returns an error when the URL does not parse, uses a scheme other
    /// than http/https, or lacks a host. Callers treat a failing entry as
    /// excluded from routing, not as fatal.
    pub fn from_config(config: &OriginConfig) -> OriginResult<Self> {
        let url = Url::parse(&config.url).map_err(|e| OriginError::InvalidUrl {
            url: config.url.clone(),
            message: e.to_string(),
        })?;

        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(OriginError::UnsupportedScheme {
                    url: config.url.clone(),
                    scheme: other.to_string(),
                });
            }
        }

        if url.host_str().is_none_or(str::is_empty) {
            return Err(OriginError::MissingHost(config.url.clone()));
        }

        Ok(Self {
            url,
            weight: config.weight,
            backup: config.backup,
            enabled: config.enabled,
            timeout: Duration::from_millis(config.timeout_millis),
            inject_headers: config.headers.clone(),
        })
    }

    /// The validated base URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The origin's host, lowercased by URL parsing.
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or("")
    }

    /// The configured weight as-is (may be non-positive in a hand-built
    /// descriptor; use [`Origin::effective_weight`] for selection math).
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// The weight used for selection. Non-positive and non-finite weights
    /// normalize to 1.0 so the selection walk never divides by zero or
    /// runs a negative total.
    pub fn effective_weight(&self) -> f64 {
        if self.weight.is_finite() && self.weight > 0.0 {
            self.weight
        } else {
            1.0
        }
    }

    /// Whether this origin belongs to the backup pool.
    pub fn is_backup(&self) -> bool {
        self.backup
    }

    /// Whether this origin participates in routing at all.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Per-attempt deadline for requests forwarded to this origin.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Headers injected into forwarded requests, overriding same-named
    /// inbound and globally injected headers.
    pub fn inject_headers(&self) -> &HashMap<String, String> {
        &self.inject_headers
    }

    /// Absolute target URL for a forwarding attempt: the origin base URL
    /// (trailing slash trimmed) concatenated with the inbound path+query.
    /// Fragments never reach this point; hyper strips them from the URI.
    pub fn target_for(&self, path_and_query: &str) -> String {
        format!(
            "{}{}",
            self.url.as_str().trim_end_matches('/'),
            path_and_query
        )
    }
}

impl FromStr for Origin {
    type Err = OriginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Origin::from_config(&OriginConfig::new(s))
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}
