//! ENS reverse resolution for display names.
//!
//! Looks up `<addr>.addr.reverse` through the ENS registry, then checks that
//! the returned name resolves forward to the same address before trusting it.
//! Results (including "no name") are cached per address for a TTL.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{address, keccak256, Address, B256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::sol;
use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use tokio::time::{timeout, Instant};
use url::Url;

/// ENS registry, same address on mainnet and the public testnets.
pub const ENS_REGISTRY: Address = address!("00000000000C2E074eC69A0dFb2997BA6C7d2e1e");

sol! {
    #[sol(rpc)]
    interface IEnsRegistry {
        function resolver(bytes32 node) external view returns (address);
    }

    #[sol(rpc)]
    interface IEnsResolver {
        function name(bytes32 node) external view returns (string);
        function addr(bytes32 node) external view returns (address);
    }
}

/// Failure to resolve a display name. Never surfaced to the session.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    #[error("name lookup failed: {0}")]
    Lookup(String),

    #[error("name lookup timed out")]
    Timeout,
}

/// Reverse lookup from address to a human-readable name.
#[async_trait]
pub trait NameResolver: Send + Sync {
    async fn lookup_address(&self, address: Address) -> Result<Option<String>, ResolveError>;
}

/// ENS namehash (EIP-137).
pub fn namehash(name: &str) -> B256 {
    let mut node = B256::ZERO;
    if name.is_empty() {
        return node;
    }
    for label in name.rsplit('.') {
        let label_hash = keccak256(label.as_bytes());
        let mut buf = [0u8; 64];
        buf[..32].copy_from_slice(node.as_slice());
        buf[32..].copy_from_slice(label_hash.as_slice());
        node = keccak256(buf);
    }
    node
}

/// Reverse-record name for an address.
pub fn reverse_name(address: Address) -> String {
    format!("{:x}.addr.reverse", address)
}

#[derive(Clone)]
struct CachedName {
    name: Option<String>,
    inserted_at: Instant,
}

/// ENS resolver over an alloy provider with a TTL cache.
pub struct EnsNameResolver {
    provider: DynProvider,
    registry: Address,
    cache: Arc<DashMap<Address, CachedName>>,
    ttl: Duration,
    request_timeout: Duration,
}

impl EnsNameResolver {
    pub fn new(rpc_url: Url, ttl: Duration) -> Self {
        let provider = ProviderBuilder::new().connect_http(rpc_url).erased();
        Self {
            provider,
            registry: ENS_REGISTRY,
            cache: Arc::new(DashMap::new()),
            ttl,
            request_timeout: Duration::from_secs(10),
        }
    }

    /// Use a non-default registry (local deployments).
    pub fn with_registry(mut self, registry: Address) -> Self {
        self.registry = registry;
        self
    }

    fn cached(&self, address: &Address) -> Option<Option<String>> {
        let entry = self.cache.get(address)?;
        if entry.inserted_at.elapsed() > self.ttl {
            drop(entry);
            self.cache.remove(address);
            return None;
        }
        Some(entry.name.clone())
    }

    async fn resolve_uncached(&self, address: Address) -> Result<Option<String>, ResolveError> {
        let node = namehash(&reverse_name(address));
        let registry = IEnsRegistry::new(self.registry, self.provider.clone());
        let resolver_addr = registry.resolver(node).call().await.map_err(lookup_error)?;
        if resolver_addr == Address::ZERO {
            return Ok(None);
        }

        let resolver = IEnsResolver::new(resolver_addr, self.provider.clone());
        let name = resolver.name(node).call().await.map_err(lookup_error)?;
        if name.is_empty() {
            return Ok(None);
        }

        // Forward check: anyone can set a reverse record claiming any name.
        let forward_node = namehash(&name);
        let forward_resolver_addr = registry.resolver(forward_node).call().await.map_err(lookup_error)?;
        if forward_resolver_addr == Address::ZERO {
            return Ok(None);
        }
        let forward = IEnsResolver::new(forward_resolver_addr, self.provider.clone())
            .addr(forward_node)
            .call()
            .await
            .map_err(lookup_error)?;

        Ok((forward == address).then_some(name))
    }
}

#[async_trait]
impl NameResolver for EnsNameResolver {
    async fn lookup_address(&self, address: Address) -> Result<Option<String>, ResolveError> {
        if let Some(hit) = self.cached(&address) {
            tracing::trace!(%address, "Display name cache hit");
            return Ok(hit);
        }

        let name = timeout(self.request_timeout, self.resolve_uncached(address))
            .await
            .map_err(|_| ResolveError::Timeout)??;

        self.cache.insert(
            address,
            CachedName {
                name: name.clone(),
                inserted_at: Instant::now(),
            },
        );
        Ok(name)
    }
}

fn lookup_error(e: alloy::contract::Error) -> ResolveError {
    ResolveError::Lookup(e.to_string())
}
