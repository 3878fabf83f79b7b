//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, CERTDASH_ENV override)
//!     → validation.rs (semantic checks)
//!     → DashboardConfig (validated, immutable)
//!     → registry / session / query built from it at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the registry never changes at runtime
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    BackendConfig, ChainConfig, ConnectorConfig, ConnectorKind, DashboardConfig, Environment,
    ObservabilityConfig, QueryConfig, RetryConfig, SessionConfig, TransportConfig, WalletConfig,
};
