//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: ProxyConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_minimal_config() {
        let dir = std::env::temp_dir();
        let path = dir.join("caching_proxy_test_minimal.toml");
        std::fs::write(
            &path,
            r#"
[listener]
bind_address = "127.0.0.1:9100"

[cache]
max_item_size = 4096
max_total_size = 65536

[pool]
workers = 4
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:9100");
        assert_eq!(config.cache.max_item_size, 4096);
        assert_eq!(config.pool.workers, 4);
        // untouched sections keep their defaults
        assert!(config.cache.enabled);
        assert_eq!(config.timeouts.connect_secs, 10);

        std::fs::remove_file(&path).unwrap_or_default();
    }

    #[test]
    fn test_load_invalid_limits() {
        let dir = std::env::temp_dir();
        let path = dir.join("caching_proxy_test_invalid.toml");
        std::fs::write(
            &path,
            r#"
[cache]
max_item_size = 100000
max_total_size = 10
"#,
        )
        .unwrap();

        match load_config(&path) {
            Err(ConfigError::Validation(errors)) => assert!(!errors.is_empty()),
            other => panic!("expected validation failure, got {other:?}"),
        }

        std::fs::remove_file(&path).unwrap_or_default();
    }
}
