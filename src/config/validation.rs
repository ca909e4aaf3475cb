//! Configuration validation.
//!
//! # Responsibilities
//! - Parse the inline `host:port/weight, ...` backend list
//! - Normalize backend addresses (default `http://` scheme)
//! - Validate value ranges (weights >= 1, intervals > 0)
//!
//! Nothing here constructs a server; a [`BackendSpec`] only exists once its
//! entry has passed every check.

use std::net::SocketAddr;
use std::num::NonZeroU32;

use url::Url;

use crate::config::loader::ConfigError;
use crate::config::schema::{BackendConfig, ProxyConfig};

/// A validated backend: normalized address and positive weight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSpec {
    pub address: Url,
    pub weight: NonZeroU32,
}

/// Parse the inline backend list format: `host:port/weight, host:port/weight`.
///
/// Blank entries are skipped. Each entry needs exactly one `/` separating the
/// address from an integer weight.
pub fn parse_backend_list(input: &str) -> Result<Vec<BackendConfig>, ConfigError> {
    let mut backends = Vec::new();
    for part in input.trim().split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        // An explicit scheme may carry its own "//", so count separators after it.
        let (scheme, rest) = match part.split_once("://") {
            Some((scheme, rest)) => (Some(scheme), rest),
            None => (None, part),
        };
        let pieces: Vec<&str> = rest.split('/').collect();
        let [host, weight] = pieces.as_slice() else {
            return Err(invalid(part, "expected format host:port/weight"));
        };
        let host = host.trim();
        if host.is_empty() {
            return Err(invalid(part, "expected format host:port/weight"));
        }
        let address = match scheme {
            Some(scheme) => format!("{}://{}", scheme, host),
            None => host.to_string(),
        };

        let weight: u32 = weight
            .trim()
            .parse()
            .map_err(|_| invalid(part, "weight must be an integer >= 1"))?;

        backends.push(BackendConfig {
            address,
            weight,
        });
    }

    if backends.is_empty() {
        return Err(ConfigError::NoBackends);
    }
    Ok(backends)
}

/// Validate and normalize every backend entry.
pub fn validate_backends(backends: &[BackendConfig]) -> Result<Vec<BackendSpec>, ConfigError> {
    if backends.is_empty() {
        return Err(ConfigError::NoBackends);
    }
    backends.iter().map(validate_backend).collect()
}

fn validate_backend(backend: &BackendConfig) -> Result<BackendSpec, ConfigError> {
    let entry = format!("{}/{}", backend.address, backend.weight);

    let weight = NonZeroU32::new(backend.weight)
        .ok_or_else(|| invalid(&entry, "weight must be an integer >= 1"))?;

    let raw = backend.address.trim();
    let raw = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{}", raw)
    };

    let address = Url::parse(&raw).map_err(|e| invalid(&entry, &e.to_string()))?;
    if address.scheme() != "http" {
        return Err(invalid(
            &entry,
            &format!("unsupported scheme '{}', only http is supported", address.scheme()),
        ));
    }
    if address.host_str().map_or(true, str::is_empty) {
        return Err(invalid(&entry, "missing host"));
    }
    if address.path() != "/" || address.query().is_some() {
        return Err(invalid(&entry, "address must not contain a path or query"));
    }

    Ok(BackendSpec { address, weight })
}

/// Semantic checks over a full configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), ConfigError> {
    validate_backends(&config.backends)?;

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        return Err(ConfigError::Invalid(format!(
            "listener.bind_address '{}' is not a socket address",
            config.listener.bind_address
        )));
    }
    if config.health_check.interval_secs == 0 {
        return Err(ConfigError::Invalid("health_check.interval_secs must be > 0".into()));
    }
    if config.health_check.timeout_secs == 0 {
        return Err(ConfigError::Invalid("health_check.timeout_secs must be > 0".into()));
    }
    if !config.health_check.path.starts_with('/') {
        return Err(ConfigError::Invalid("health_check.path must start with '/'".into()));
    }
    if config.timeouts.request_secs == 0 {
        return Err(ConfigError::Invalid("timeouts.request_secs must be > 0".into()));
    }
    Ok(())
}

fn invalid(entry: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidBackend {
        entry: entry.to_string(),
        reason: reason.to_string(),
    }
}
