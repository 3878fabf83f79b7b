//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the dashboard
//! core. All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Environment variable that overrides [`DashboardConfig::environment`].
pub const ENVIRONMENT_ENV_VAR: &str = "CERTDASH_ENV";

/// Environment variable consulted when a relay connector has no project id.
pub const PROJECT_ID_ENV_VAR: &str = "CERTDASH_PROJECT_ID";

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DashboardConfig {
    /// Development or production; selects retry ceilings.
    pub environment: Environment,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,

    /// Networks and wallet connectors.
    pub wallet: WalletConfig,

    /// Wallet session settings.
    pub session: SessionConfig,

    /// Query cache and retry settings.
    pub query: QueryConfig,

    /// Backend / indexer HTTP settings.
    pub backend: BackendConfig,
}

/// Build environment of the running dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    /// Parse the values accepted by `CERTDASH_ENV`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "dev" | "development" => Some(Environment::Development),
            "prod" | "production" => Some(Environment::Production),
            _ => None,
        }
    }

    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Networks, their transports, and the wallet connectors on offer.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Declared networks.
    pub chains: Vec<ChainConfig>,

    /// RPC transports, one entry per declared chain.
    pub transports: Vec<TransportConfig>,

    /// Wallet connectors.
    pub connectors: Vec<ConnectorConfig>,
}

/// A declared network.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChainConfig {
    /// EIP-155 chain id.
    pub chain_id: u64,

    /// Human readable name.
    pub name: String,
}

/// RPC endpoints for one chain.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransportConfig {
    /// Chain this transport serves.
    pub chain_id: u64,

    /// JSON-RPC URLs, primary first.
    pub urls: Vec<String>,
}

/// Wallet connector kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectorKind {
    /// Generic in-page injected provider.
    Injected,
    /// A named browser extension (e.g. MetaMask).
    DedicatedExtension,
    /// Remote wallet reached through a relay.
    RelayBased,
    /// Multisig contract account (Safe).
    MultisigContract,
}

impl std::fmt::Display for ConnectorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectorKind::Injected => "injected",
            ConnectorKind::DedicatedExtension => "dedicated-extension",
            ConnectorKind::RelayBased => "relay-based",
            ConnectorKind::MultisigContract => "multisig-contract",
        };
        f.write_str(s)
    }
}

/// A wallet connector entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConnectorConfig {
    /// Unique connector identifier.
    pub id: String,

    /// Connector kind.
    pub kind: ConnectorKind,

    /// Ordering priority (higher = offered first).
    #[serde(default)]
    pub priority: i32,

    /// Provider endpoint. Connectors with the same target share one provider.
    pub target: String,

    /// Relay project identifier (relay-based only).
    #[serde(default)]
    pub project_id: Option<String>,

    /// Safe contract address (multisig-contract only).
    #[serde(default)]
    pub safe_address: Option<String>,
}

/// Wallet session settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Authorization handshake timeout applied by the RPC providers, in seconds.
    pub handshake_timeout_secs: u64,

    /// Interval at which RPC providers poll for account/chain changes.
    pub watch_interval_ms: u64,

    /// Resolve ENS display names for connected accounts.
    pub resolve_display_names: bool,

    /// Chain used for ENS reverse lookups.
    pub ens_chain_id: u64,

    /// TTL for resolved display names, in seconds.
    pub display_name_ttl_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_secs: 60,
            watch_interval_ms: 4000,
            resolve_display_names: true,
            ens_chain_id: 1,
            display_name_ttl_secs: 600,
        }
    }
}

/// Query cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Default freshness window in milliseconds.
    pub stale_time_ms: u64,

    /// Maximum number of cache entries before LRU eviction.
    pub max_entries: usize,

    /// Retry configuration.
    pub retry: RetryConfig,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            stale_time_ms: 10_000,
            max_entries: 512,
            retry: RetryConfig::default(),
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Extra read attempts in production.
    pub read_max_retries: u32,

    /// Extra mutation attempts in production. Writes run once unless raised.
    pub mutation_max_retries: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            read_max_retries: 4,
            mutation_max_retries: 0,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter (trace, debug, info, warn, error or a full EnvFilter string).
    pub log_level: String,

    /// Emit JSON log lines.
    pub json_logs: bool,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Backend / indexer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the backend API.
    pub base_url: String,

    /// Bearer token sent with every request.
    pub auth_token: Option<String>,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api/v1".to_string(),
            auth_token: None,
            request_timeout_secs: 15,
        }
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            chains: vec![
                ChainConfig { chain_id: 1, name: "Ethereum".to_string() },
                ChainConfig { chain_id: 11_155_111, name: "Sepolia".to_string() },
                ChainConfig { chain_id: 137, name: "Polygon".to_string() },
            ],
            transports: vec![
                TransportConfig {
                    chain_id: 1,
                    urls: vec!["https://eth.merkle.io".to_string()],
                },
                TransportConfig {
                    chain_id: 11_155_111,
                    urls: vec!["https://sepolia.drpc.org".to_string()],
                },
                TransportConfig {
                    chain_id: 137,
                    urls: vec!["https://polygon-rpc.com".to_string()],
                },
            ],
            connectors: vec![ConnectorConfig {
                id: "metaMask".to_string(),
                kind: ConnectorKind::DedicatedExtension,
                priority: 10,
                target: "http://localhost:8545".to_string(),
                project_id: None,
                safe_address: None,
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DashboardConfig::default();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.query.stale_time_ms, 10_000);
        assert_eq!(config.wallet.chains.len(), 3);
        assert_eq!(config.wallet.transports.len(), 3);
    }

    #[test]
    fn test_parse_toml() {
        let raw = r#"
            environment = "production"

            [[wallet.chains]]
            chain_id = 31337
            name = "Anvil"

            [[wallet.transports]]
            chain_id = 31337
            urls = ["http://localhost:8545"]

            [[wallet.connectors]]
            id = "injected"
            kind = "injected"
            target = "http://localhost:8545"

            [[wallet.connectors]]
            id = "metaMask"
            kind = "dedicated-extension"
            priority = 5
            target = "http://localhost:8545/"

            [query.retry]
            read_max_retries = 2
        "#;
        let config: DashboardConfig = toml::from_str(raw).unwrap();
        assert!(config.environment.is_production());
        assert_eq!(config.wallet.chains[0].chain_id, 31337);
        assert_eq!(config.wallet.connectors.len(), 2);
        assert_eq!(config.wallet.connectors[1].kind, ConnectorKind::DedicatedExtension);
        assert_eq!(config.query.retry.read_max_retries, 2);
        assert_eq!(config.query.retry.mutation_max_retries, 0);
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!(Environment::parse("PROD"), Some(Environment::Production));
        assert_eq!(Environment::parse("dev"), Some(Environment::Development));
        assert_eq!(Environment::parse("staging"), None);
    }
}
