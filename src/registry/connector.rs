//! Connector descriptors and provider identity.

use alloy::primitives::Address;
use url::Url;

use crate::config::schema::PROJECT_ID_ENV_VAR;
use crate::config::validation::ValidationError;
use crate::config::{ConfigError, ConnectorConfig, ConnectorKind};
use crate::registry::parse_url;

/// Identity of the underlying provider a connector resolves to.
///
/// Two connectors with equal keys drive the same wallet and must never open
/// parallel authorization handshakes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderKey(String);

impl ProviderKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProviderKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

/// An immutable wallet connector description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorDescriptor {
    pub id: String,
    pub kind: ConnectorKind,
    pub priority: i32,
    /// Provider endpoint (relay project id already applied).
    pub endpoint: Url,
    /// Safe account for multisig connectors.
    pub safe_address: Option<Address>,
    pub provider_key: ProviderKey,
}

impl ConnectorDescriptor {
    /// Build a descriptor and compute its provider key.
    pub fn from_config(config: &ConnectorConfig) -> Result<Self, ConfigError> {
        let mut endpoint = parse_url(&config.target)?;

        if config.kind == ConnectorKind::RelayBased {
            let project_id = config
                .project_id
                .clone()
                .filter(|p| !p.is_empty())
                .or_else(|| std::env::var(PROJECT_ID_ENV_VAR).ok().filter(|p| !p.is_empty()))
                .ok_or_else(|| {
                    ConfigError::Validation(vec![ValidationError::MissingProjectId(config.id.clone())])
                })?;
            endpoint.query_pairs_mut().append_pair("projectId", &project_id);
        }

        let safe_address = match (config.kind, config.safe_address.as_deref()) {
            (ConnectorKind::MultisigContract, Some(raw)) => {
                Some(raw.parse::<Address>().map_err(|e| {
                    ConfigError::Validation(vec![ValidationError::InvalidSafeAddress {
                        id: config.id.clone(),
                        reason: e.to_string(),
                    }])
                })?)
            }
            (ConnectorKind::MultisigContract, None) => {
                return Err(ConfigError::Validation(vec![ValidationError::InvalidSafeAddress {
                    id: config.id.clone(),
                    reason: "missing".to_string(),
                }]));
            }
            _ => None,
        };

        let provider_key = provider_key_for(&endpoint, safe_address);

        Ok(Self {
            id: config.id.clone(),
            kind: config.kind,
            priority: config.priority,
            endpoint,
            safe_address,
            provider_key,
        })
    }
}

/// Normalized endpoint, plus the Safe account when there is one.
fn provider_key_for(endpoint: &Url, safe_address: Option<Address>) -> ProviderKey {
    let mut normalized = endpoint.clone();
    normalized.set_fragment(None);
    match safe_address {
        Some(safe) => ProviderKey(format!("{}#safe={:#x}", normalized, safe)),
        None => ProviderKey(normalized.to_string()),
    }
}
