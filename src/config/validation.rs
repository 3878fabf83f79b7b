//! Configuration validation.
//!
//! Serde handles syntax; this module checks semantics: chain ids are unique,
//! every declared chain has a transport, URLs parse, connector ids are unique
//! and kind-specific fields are present. All problems are reported together.

use std::collections::HashSet;

use alloy::primitives::Address;
use thiserror::Error;
use url::Url;

use crate::config::schema::{ConnectorKind, DashboardConfig, WalletConfig, PROJECT_ID_ENV_VAR};

/// A single semantic configuration problem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no chains declared")]
    NoChains,

    #[error("no wallet connectors declared")]
    NoConnectors,

    #[error("chain id {0} is declared more than once")]
    DuplicateChainId(u64),

    #[error("chain {0} has no RPC transport")]
    MissingTransport(u64),

    #[error("transport references undeclared chain {0}")]
    UnknownTransportChain(u64),

    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("connector id '{0}' is declared more than once")]
    DuplicateConnectorId(String),

    #[error("relay connector '{0}' needs a project_id (or {env})", env = PROJECT_ID_ENV_VAR)]
    MissingProjectId(String),

    #[error("multisig connector '{id}' has an invalid safe_address: {reason}")]
    InvalidSafeAddress { id: String, reason: String },

    #[error("{field} must be greater than zero")]
    ZeroValue { field: &'static str },
}

/// Validate the full configuration.
pub fn validate_config(config: &DashboardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(mut wallet_errors) = validate_wallet(&config.wallet) {
        errors.append(&mut wallet_errors);
    }

    if config.session.handshake_timeout_secs == 0 {
        errors.push(ValidationError::ZeroValue { field: "session.handshake_timeout_secs" });
    }
    if config.session.watch_interval_ms == 0 {
        errors.push(ValidationError::ZeroValue { field: "session.watch_interval_ms" });
    }
    if config.query.max_entries == 0 {
        errors.push(ValidationError::ZeroValue { field: "query.max_entries" });
    }
    if let Err(reason) = Url::parse(&config.backend.base_url) {
        errors.push(ValidationError::InvalidUrl {
            url: config.backend.base_url.clone(),
            reason: reason.to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate chains, transports and connectors.
pub fn validate_wallet(wallet: &WalletConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if wallet.chains.is_empty() {
        errors.push(ValidationError::NoChains);
    }
    if wallet.connectors.is_empty() {
        errors.push(ValidationError::NoConnectors);
    }

    let mut chain_ids = HashSet::new();
    for chain in &wallet.chains {
        if !chain_ids.insert(chain.chain_id) {
            errors.push(ValidationError::DuplicateChainId(chain.chain_id));
        }
    }

    let mut served = HashSet::new();
    for transport in &wallet.transports {
        if !chain_ids.contains(&transport.chain_id) {
            errors.push(ValidationError::UnknownTransportChain(transport.chain_id));
        }
        for raw in &transport.urls {
            if let Err(e) = Url::parse(raw) {
                errors.push(ValidationError::InvalidUrl { url: raw.clone(), reason: e.to_string() });
            }
        }
        if !transport.urls.is_empty() {
            served.insert(transport.chain_id);
        }
    }

    let mut missing: Vec<u64> = chain_ids.difference(&served).copied().collect();
    missing.sort_unstable();
    errors.extend(missing.into_iter().map(ValidationError::MissingTransport));

    let mut connector_ids = HashSet::new();
    for connector in &wallet.connectors {
        if !connector_ids.insert(connector.id.as_str()) {
            errors.push(ValidationError::DuplicateConnectorId(connector.id.clone()));
        }
        if let Err(e) = Url::parse(&connector.target) {
            errors.push(ValidationError::InvalidUrl {
                url: connector.target.clone(),
                reason: e.to_string(),
            });
        }
        match connector.kind {
            ConnectorKind::RelayBased => {
                let has_id = connector.project_id.as_deref().is_some_and(|p| !p.is_empty())
                    || std::env::var(PROJECT_ID_ENV_VAR).is_ok_and(|p| !p.is_empty());
                if !has_id {
                    errors.push(ValidationError::MissingProjectId(connector.id.clone()));
                }
            }
            ConnectorKind::MultisigContract => match connector.safe_address.as_deref() {
                None => errors.push(ValidationError::InvalidSafeAddress {
                    id: connector.id.clone(),
                    reason: "missing".to_string(),
                }),
                Some(raw) => {
                    if let Err(e) = raw.parse::<Address>() {
                        errors.push(ValidationError::InvalidSafeAddress {
                            id: connector.id.clone(),
                            reason: e.to_string(),
                        });
                    }
                }
            },
            ConnectorKind::Injected | ConnectorKind::DedicatedExtension => {}
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
