//! Configuration validation logic.

use std::net::SocketAddr;

use crate::config::schema::ProxyConfig;

/// Error type for configuration validation failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError(pub String);

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Validation error: {}", self.0)
    }
}

/// Validate a ProxyConfig for semantic correctness.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    // 1. The bind address must parse as a socket address
    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError(format!(
            "listener.bind_address '{}' is not a valid socket address",
            config.listener.bind_address
        )));
    }

    // 2. Cache limits: no item may be allowed to exceed the total budget
    if config.cache.enabled {
        if config.cache.max_item_size == 0 || config.cache.max_total_size == 0 {
            errors.push(ValidationError(
                "cache limits must be > 0 when the cache is enabled".to_string(),
            ));
        }
        if config.cache.max_item_size > config.cache.max_total_size {
            errors.push(ValidationError(format!(
                "cache.max_item_size ({}) must not exceed cache.max_total_size ({})",
                config.cache.max_item_size, config.cache.max_total_size
            )));
        }
    }

    // 3. The pool needs at least one worker to serve anything
    if config.pool.workers == 0 {
        errors.push(ValidationError("pool.workers must be > 0".to_string()));
    }

    // 4. Timeout sanity (basic check)
    if config.timeouts.connect_secs == 0 {
        tracing::warn!("timeouts.connect_secs is 0, origin connects will time out immediately");
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
