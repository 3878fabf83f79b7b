//! Chain/connector registry.
//!
//! # Data Flow
//! ```text
//! WalletConfig (validated)
//!     → chain.rs (ChainDescriptor per chain id, parsed RPC URLs)
//!     → connector.rs (ConnectorDescriptor, provider identity key)
//!     → Registry (immutable, shared via Arc)
//! ```
//!
//! # Design Decisions
//! - Validated once at startup; a bad registry aborts initialization
//! - Redundant connectors are resolved through a provider key, not by id

pub mod chain;
pub mod connector;

use std::collections::HashMap;
use std::sync::Arc;

use url::Url;

use crate::config::validation::{validate_wallet, ValidationError};
use crate::config::{ConfigError, WalletConfig};

pub use chain::ChainDescriptor;
pub use connector::{ConnectorDescriptor, ProviderKey};

/// Immutable registry of networks and wallet connectors.
#[derive(Debug, Clone)]
pub struct Registry {
    chains: HashMap<u64, ChainDescriptor>,
    /// Ordered by priority, highest first.
    connectors: Vec<ConnectorDescriptor>,
}

impl Registry {
    /// Build the registry, failing fast on any configuration problem.
    pub fn from_config(config: &WalletConfig) -> Result<Self, ConfigError> {
        validate_wallet(config)?;

        let mut chains = HashMap::with_capacity(config.chains.len());
        for chain in &config.chains {
            let rpc_urls = config
                .transports
                .iter()
                .filter(|t| t.chain_id == chain.chain_id)
                .flat_map(|t| t.urls.iter())
                .map(|raw| parse_url(raw))
                .collect::<Result<Vec<Url>, ConfigError>>()?;
            chains.insert(
                chain.chain_id,
                ChainDescriptor::new(chain.chain_id, chain.name.clone(), rpc_urls),
            );
        }

        let mut connectors = config
            .connectors
            .iter()
            .map(ConnectorDescriptor::from_config)
            .collect::<Result<Vec<_>, ConfigError>>()?;
        // Stable sort keeps declaration order among equal priorities.
        connectors.sort_by(|a, b| b.priority.cmp(&a.priority));

        tracing::info!(
            chains = chains.len(),
            connectors = connectors.len(),
            "Registry loaded"
        );

        Ok(Self { chains, connectors })
    }

    /// Wrap in an `Arc` for sharing.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Connectors in priority order.
    pub fn connectors(&self) -> &[ConnectorDescriptor] {
        &self.connectors
    }

    /// Look up a connector by id.
    pub fn connector(&self, id: &str) -> Option<&ConnectorDescriptor> {
        self.connectors.iter().find(|c| c.id == id)
    }

    /// Provider identity behind a connector id.
    pub fn provider_key(&self, connector_id: &str) -> Option<&ProviderKey> {
        self.connector(connector_id).map(|c| &c.provider_key)
    }

    /// Look up a chain.
    pub fn chain(&self, chain_id: u64) -> Option<&ChainDescriptor> {
        self.chains.get(&chain_id)
    }

    pub fn is_supported(&self, chain_id: u64) -> bool {
        self.chains.contains_key(&chain_id)
    }

    /// All chains, sorted by id.
    pub fn chains(&self) -> Vec<&ChainDescriptor> {
        let mut chains: Vec<_> = self.chains.values().collect();
        chains.sort_by_key(|c| c.chain_id);
        chains
    }

    /// Distinct provider keys, in connector priority order.
    pub fn provider_keys(&self) -> Vec<&ProviderKey> {
        let mut keys: Vec<&ProviderKey> = Vec::new();
        for connector in &self.connectors {
            if !keys.contains(&&connector.provider_key) {
                keys.push(&connector.provider_key);
            }
        }
        keys
    }
}

pub(crate) fn parse_url(raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| {
        ConfigError::Validation(vec![ValidationError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        }])
    })
}
