//! Configuration loading from disk and environment.

use std::fs;
use std::path::{Path, PathBuf};

use crate::chain::types::Network;
use crate::config::schema::WalletConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable prefix for overrides (e.g. `WALLET_OFFLINE_MODE`).
pub const ENV_PREFIX: &str = "WALLET_";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Env { var: String, value: String },
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Env { var, value } => {
                write!(f, "Invalid value '{}' for environment variable {}", value, var)
            }
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<WalletConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: WalletConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Load the optional config file, apply `WALLET_*` overrides, then validate.
///
/// Without a file the defaults are used.
pub fn load_with_env(path: Option<&Path>) -> Result<WalletConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
            toml::from_str(&content).map_err(ConfigError::Parse)?
        }
        None => WalletConfig::default(),
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply overrides from a variable lookup.
///
/// Takes the lookup as a closure so tests need not touch the process environment.
pub fn apply_env_overrides<F>(config: &mut WalletConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |suffix: &str| {
        let var = format!("{}{}", ENV_PREFIX, suffix);
        lookup(&var).map(|value| (var, value))
    };

    if let Some((var, value)) = get("NETWORK") {
        config.network = value
            .parse::<Network>()
            .map_err(|_| ConfigError::Env { var, value })?;
    }
    if let Some((var, value)) = get("OFFLINE_MODE") {
        config.offline_mode = parse_bool(&value).ok_or(ConfigError::Env { var, value })?;
    }
    if let Some((_, value)) = get("CACHE_DIR") {
        config.cache.dir = Some(PathBuf::from(value));
    }
    if let Some((var, value)) = get("CACHE_TIMEOUT") {
        config.cache.ttl_secs = value.parse().map_err(|_| ConfigError::Env { var, value })?;
    }
    if let Some((var, value)) = get("CACHE_TIMEOUT_COLD") {
        config.cache.cold_ttl_secs = value.parse().map_err(|_| ConfigError::Env { var, value })?;
    }
    if let Some((_, value)) = get("BLOCKCHAIN_API_URL") {
        config.upstream.mainnet.base_url = value.trim_end_matches('/').to_string();
    }
    if let Some((_, value)) = get("LOG_LEVEL") {
        config.observability.log_level = value;
    }

    Ok(())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let mut config = WalletConfig::default();
        apply_env_overrides(
            &mut config,
            lookup(&[
                ("WALLET_NETWORK", "mainnet"),
                ("WALLET_OFFLINE_MODE", "true"),
                ("WALLET_CACHE_DIR", "/var/cache/wallet"),
                ("WALLET_CACHE_TIMEOUT", "60"),
            ]),
        )
        .unwrap();

        assert_eq!(config.network, Network::Main);
        assert!(config.offline_mode);
        assert_eq!(config.cache.dir, Some(PathBuf::from("/var/cache/wallet")));
        assert_eq!(config.cache.ttl_secs, 60);
    }

    #[test]
    fn test_bad_env_value() {
        let mut config = WalletConfig::default();
        let err = apply_env_overrides(&mut config, lookup(&[("WALLET_OFFLINE_MODE", "maybe")]))
            .unwrap_err();
        assert!(err.to_string().contains("WALLET_OFFLINE_MODE"));
    }

    #[test]
    fn test_load_config_rejects_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[upstream]\nrequest_timeout_secs = 0").unwrap();

        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "network = \"testnet\"\n[validation]\nsynthetic_input_leniency = true").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.network, Network::Test);
        assert!(config.validation.synthetic_input_leniency);
    }
}
