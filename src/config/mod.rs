//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) or inline "host:port/weight, ..." list
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, address normalization)
//!     → BackendSpec list (validated, immutable)
//!     → ServerPool built once at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the backend pool is fixed for the process
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    BackendConfig, HealthCheckConfig, ListenerConfig, ObservabilityConfig, ProxyConfig,
    TimeoutConfig,
};
pub use validation::{parse_backend_list, validate_backends, validate_config, BackendSpec};
