use std::{collections::HashMap, net::SocketAddr};

use http::{HeaderName, HeaderValue};

use crate::{
    config::models::{OriginConfig, ProxyConfig},
    core::origin::Origin,
};

/// Validation result type alias
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validation error types
#[derive(Debug, thiserror::Error, Clone)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Invalid listen address '{address}': {reason}")]
    InvalidListenAddress { address: String, reason: String },

    #[error("No enabled origins: every configured origin has enabled = false")]
    NoEnabledOrigins,

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },
}

/// Proxy configuration validator.
///
/// Collects every problem in one pass instead of stopping at the first,
/// so a config file can be fixed in one edit-validate cycle. The engine
/// only ever sees configurations that passed this validator, but still
/// defends against non-positive weights on its own.
pub struct ProxyConfigValidator;

impl ProxyConfigValidator {
    /// Validate the entire proxy configuration
    pub fn validate(config: &ProxyConfig) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = Self::validate_listen_address(&config.listen_addr) {
            errors.push(e);
        }

        if config.origins.is_empty() {
            errors.push(ValidationError::MissingField {
                field: "origins".to_string(),
            });
        } else {
            for (index, origin) in config.origins.iter().enumerate() {
                if let Err(mut origin_errors) = Self::validate_single_origin(index, origin) {
                    errors.append(&mut origin_errors);
                }
            }

            if !config.origins.iter().any(|o| o.enabled) {
                errors.push(ValidationError::NoEnabledOrigins);
            }
        }

        Self::validate_header_map("inject_headers", &config.inject_headers, &mut errors);

        for (field, path) in [
            ("health_path", &config.health_path),
            ("stats_path", &config.stats_path),
        ] {
            if !path.starts_with('/') {
                errors.push(ValidationError::InvalidField {
                    field: field.to_string(),
                    message: "Paths must start with '/'".to_string(),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::ValidationFailed {
                message: Self::format_multiple_errors(errors),
            })
        }
    }

    /// Validate listen address format
    fn validate_listen_address(address: &str) -> ValidationResult<()> {
        if address.parse::<SocketAddr>().is_err() {
            return Err(ValidationError::InvalidListenAddress {
                address: address.to_string(),
                reason: "Must be in format 'IP:PORT' (e.g., '127.0.0.1:8080' or '0.0.0.0:8080')"
                    .to_string(),
            });
        }
        Ok(())
    }

    /// Validate a single origin entry
    fn validate_single_origin(
        index: usize,
        origin: &OriginConfig,
    ) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        let field = |name: &str| format!("origins[{index}].{name}");

        if origin.url.is_empty() {
            errors.push(ValidationError::MissingField { field: field("url") });
        } else if let Err(e) = Origin::from_config(origin) {
            errors.push(ValidationError::InvalidField {
                field: field("url"),
                message: e.to_string(),
            });
        }

        if !(origin.weight.is_finite() && origin.weight > 0.0) {
            errors.push(ValidationError::InvalidField {
                field: field("weight"),
                message: format!("Weight must be a positive number, got {}", origin.weight),
            });
        }

        if origin.timeout_millis < 1000 {
            errors.push(ValidationError::InvalidField {
                field: field("timeout_millis"),
                message: format!(
                    "Per-attempt timeout must be at least 1000ms, got {}",
                    origin.timeout_millis
                ),
            });
        }

        Self::validate_header_map(&field("headers"), &origin.headers, &mut errors);

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    /// Check that every entry of an injected-header map is representable
    /// as an HTTP header
    fn validate_header_map(
        field: &str,
        headers: &HashMap<String, String>,
        errors: &mut Vec<ValidationError>,
    ) {
        for (name, value) in headers {
            if HeaderName::from_bytes(name.as_bytes()).is_err() {
                errors.push(ValidationError::InvalidField {
                    field: field.to_string(),
                    message: format!("'{name}' is not a valid header name"),
                });
            }
            if HeaderValue::from_str(value).is_err() {
                errors.push(ValidationError::InvalidField {
                    field: field.to_string(),
                    message: format!("Value of '{name}' is not a valid header value"),
                });
            }
        }
    }

    /// Format multiple validation errors into a single message
    fn format_multiple_errors(errors: Vec<ValidationError>) -> String {
        let messages: Vec<String> = errors.iter().map(|e| format!("  - {e}")).collect();
        format!(
            "Found {} validation error(s):\n{}",
            errors.len(),
            messages.join("\n")
        )
    }
}
