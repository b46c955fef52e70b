//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate endpoint URLs parse and use http(s)
//! - Validate value ranges (timeouts > 0, cold TTL >= online TTL)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: WalletConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use crate::config::schema::WalletConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &WalletConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_url(&mut errors, "upstream.mainnet.base_url", &config.upstream.mainnet.base_url);
    check_url(&mut errors, "upstream.testnet.base_url", &config.upstream.testnet.base_url);
    check_url(&mut errors, "fees.mainnet_url", &config.fees.mainnet_url);
    check_url(&mut errors, "fees.testnet_url", &config.fees.testnet_url);

    if config.upstream.request_timeout_secs == 0 {
        errors.push(ValidationError::new("upstream.request_timeout_secs", "must be greater than 0"));
    }
    if config.upstream.probe_timeout_secs == 0 {
        errors.push(ValidationError::new("upstream.probe_timeout_secs", "must be greater than 0"));
    }
    if config.fees.request_timeout_secs == 0 {
        errors.push(ValidationError::new("fees.request_timeout_secs", "must be greater than 0"));
    }
    if config.cache.cold_ttl_secs < config.cache.ttl_secs {
        errors.push(ValidationError::new(
            "cache.cold_ttl_secs",
            format!(
                "cold TTL ({}) must not be shorter than the online TTL ({})",
                config.cache.cold_ttl_secs, config.cache.ttl_secs
            ),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_url(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    match url::Url::parse(value) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(ValidationError::new(
            field,
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new(field, format!("invalid URL '{}': {}", value, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&WalletConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = WalletConfig::default();
        config.upstream.testnet.base_url = "not a url".to_string();
        config.fees.mainnet_url = "ftp://mempool.space".to_string();
        config.upstream.request_timeout_secs = 0;
        config.cache.cold_ttl_secs = 10;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "upstream.testnet.base_url",
                "fees.mainnet_url",
                "upstream.request_timeout_secs",
                "cache.cold_ttl_secs",
            ]
        );
    }
}
