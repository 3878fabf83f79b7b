//! Wallet connectivity subsystem.
//!
//! # Data Flow
//! ```text
//! Registry (connectors, provider keys)
//!     → build_providers (one provider per key; watchers for RPC wallets)
//!     → session.rs (actor: intents → WalletSession snapshots)
//!         ← provider events (accounts/chain/disconnect)
//!         ← ens.rs (display names, best effort)
//! ```
//!
//! # Design Decisions
//! - Redundant connectors share one provider instance through the provider key
//! - Providers are trait objects so tests can script wallet behavior

pub mod ens;
pub mod provider;
pub mod rpc;
pub mod safe;
pub mod session;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use crate::config::{ConnectorKind, SessionConfig};
use crate::lifecycle::Shutdown;
use crate::registry::Registry;

pub use ens::{EnsNameResolver, NameResolver};
pub use provider::{ProviderSet, WalletProvider};
pub use rpc::RpcWalletProvider;
pub use safe::SafeWalletProvider;
pub use session::SessionManager;
pub use types::{ProviderEvent, SessionError, SessionStatus, WalletSession};

/// Instantiate one provider per distinct provider key.
///
/// The highest-priority connector for a key decides how the provider is built.
/// RPC wallets get a change watcher that stops on `shutdown`.
pub fn build_providers(registry: &Registry, config: &SessionConfig, shutdown: &Shutdown) -> ProviderSet {
    let handshake_timeout = Duration::from_secs(config.handshake_timeout_secs);
    let watch_interval = Duration::from_millis(config.watch_interval_ms);
    let mut providers = ProviderSet::new();

    for connector in registry.connectors() {
        if providers.contains_key(&connector.provider_key) {
            continue;
        }

        let provider: Arc<dyn WalletProvider> = match (connector.kind, connector.safe_address) {
            (ConnectorKind::MultisigContract, Some(safe)) => Arc::new(SafeWalletProvider::new(
                connector.endpoint.clone(),
                safe,
                handshake_timeout,
            )),
            (ConnectorKind::MultisigContract, None) => {
                tracing::warn!(connector = %connector.id, "Multisig connector without Safe address skipped");
                continue;
            }
            _ => {
                let rpc = Arc::new(RpcWalletProvider::new(connector.endpoint.clone(), handshake_timeout));
                rpc.spawn_watcher(watch_interval, shutdown.subscribe());
                rpc
            }
        };

        tracing::debug!(
            connector = %connector.id,
            kind = %connector.kind,
            provider = %connector.provider_key,
            "Wallet provider ready"
        );
        providers.insert(connector.provider_key.clone(), provider);
    }

    providers
}

/// Display-name resolver for the configured ENS chain, if enabled and registered.
pub fn build_resolver(registry: &Registry, config: &SessionConfig) -> Option<Arc<dyn NameResolver>> {
    if !config.resolve_display_names {
        return None;
    }
    let Some(rpc_url) = registry.chain(config.ens_chain_id).and_then(|c| c.primary_rpc()) else {
        tracing::warn!(chain_id = config.ens_chain_id, "Display names disabled: ENS chain not registered");
        return None;
    };
    let ttl = Duration::from_secs(config.display_name_ttl_secs);
    Some(Arc::new(EnsNameResolver::new(rpc_url.clone(), ttl)))
}
