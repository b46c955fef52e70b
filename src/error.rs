//! Caller-facing error taxonomy.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors surfaced at the service boundary.
///
/// Upstream and cache faults are normally absorbed into degraded results;
/// their variants exist for the few call sites that report them explicitly.
#[derive(Debug, Error)]
pub enum WalletError {
    /// Malformed caller input (empty lists, non-positive values, bad hex).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Key could not be loaded in any supported form.
    #[error("Invalid key material: {0}")]
    InvalidKeyMaterial(String),

    /// Script format not derivable even after fallback.
    #[error("Unsupported address format: {0}")]
    UnsupportedFormat(String),

    /// Transport or timeout talking to an external source.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Cache file could not be read or written.
    #[error("Cache I/O error: {0}")]
    CacheIo(String),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for wallet operations.
pub type WalletResult<T> = Result<T, WalletError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = WalletError::InvalidRequest("outputs cannot be empty".to_string());
        assert_eq!(err.to_string(), "Invalid request: outputs cannot be empty");

        let err = WalletError::UnsupportedFormat("p2pkh".to_string());
        assert!(err.to_string().contains("p2pkh"));
    }
}
