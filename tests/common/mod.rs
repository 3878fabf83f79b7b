//! Shared fixtures for integration tests: a scriptable wallet and a small registry.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::primitives::Address;
use async_trait::async_trait;
use tokio::sync::{broadcast, watch};

use certdash::config::{ChainConfig, ConnectorConfig, ConnectorKind, TransportConfig, WalletConfig};
use certdash::registry::Registry;
use certdash::wallet::{ProviderEvent, ProviderSet, SessionError, WalletProvider};

pub const MAINNET: u64 = 1;
pub const POLYGON: u64 = 137;
/// Known to the wallet, absent from the registry.
pub const UNREGISTERED: u64 = 10;

pub fn alice() -> Address {
    Address::repeat_byte(0xa1)
}

pub fn bob() -> Address {
    Address::repeat_byte(0xb0)
}

/// Two connectors on one local wallet (`metaMask`, `injected`) and a relay
/// wallet (`walletConnect`) on a different provider.
pub fn wallet_config() -> WalletConfig {
    let connector = |id: &str, kind, priority, target: &str| ConnectorConfig {
        id: id.to_string(),
        kind,
        priority,
        target: target.to_string(),
        project_id: (kind == ConnectorKind::RelayBased).then(|| "test-project".to_string()),
        safe_address: None,
    };
    WalletConfig {
        chains: vec![
            ChainConfig { chain_id: MAINNET, name: "Ethereum".into() },
            ChainConfig { chain_id: POLYGON, name: "Polygon".into() },
        ],
        transports: vec![
            TransportConfig { chain_id: MAINNET, urls: vec!["http://127.0.0.1:1/mainnet".into()] },
            TransportConfig { chain_id: POLYGON, urls: vec!["http://127.0.0.1:1/polygon".into()] },
        ],
        connectors: vec![
            connector("metaMask", ConnectorKind::DedicatedExtension, 10, "http://localhost:8545"),
            connector("injected", ConnectorKind::Injected, 0, "http://localhost:8545/"),
            connector("walletConnect", ConnectorKind::RelayBased, 5, "https://relay.example/"),
        ],
    }
}

pub fn registry() -> Arc<Registry> {
    Registry::from_config(&wallet_config()).unwrap().shared()
}

/// Provider set with `local` behind metaMask/injected and `relay` behind walletConnect.
pub fn providers(registry: &Registry, local: Arc<MockWallet>, relay: Arc<MockWallet>) -> ProviderSet {
    let mut set = ProviderSet::new();
    set.insert(registry.provider_key("metaMask").unwrap().clone(), local as Arc<dyn WalletProvider>);
    set.insert(registry.provider_key("walletConnect").unwrap().clone(), relay as Arc<dyn WalletProvider>);
    set
}

/// Scriptable wallet.
///
/// Counts handshakes; a gated wallet holds every handshake until
/// [`MockWallet::open_gate`].
pub struct MockWallet {
    accounts: Mutex<Vec<Address>>,
    chain: AtomicU64,
    switchable: HashSet<u64>,
    reject: AtomicBool,
    unreachable: AtomicBool,
    handshakes: AtomicUsize,
    disconnects: AtomicUsize,
    gate: watch::Sender<bool>,
    events: broadcast::Sender<ProviderEvent>,
    handshake_timeout: Duration,
}

impl MockWallet {
    pub fn new(account: Address, chain_id: u64) -> Self {
        let (gate, _) = watch::channel(true);
        let (events, _) = broadcast::channel(16);
        Self {
            accounts: Mutex::new(vec![account]),
            chain: AtomicU64::new(chain_id),
            switchable: [MAINNET, POLYGON, UNREGISTERED].into_iter().collect(),
            reject: AtomicBool::new(false),
            unreachable: AtomicBool::new(false),
            handshakes: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            gate,
            events,
            handshake_timeout: Duration::from_secs(60),
        }
    }

    pub fn gated(self) -> Self {
        self.gate.send_replace(false);
        self
    }

    pub fn rejecting(self) -> Self {
        self.reject.store(true, Ordering::SeqCst);
        self
    }

    /// Fails the reachability check, as a wallet whose endpoint is down.
    pub fn unreachable(self) -> Self {
        self.unreachable.store(true, Ordering::SeqCst);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn open_gate(&self) {
        self.gate.send_replace(true);
    }

    pub fn set_rejecting(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    pub fn handshakes(&self) -> usize {
        self.handshakes.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    /// Push a provider notification, as the wallet would.
    pub fn emit(&self, event: ProviderEvent) {
        if let ProviderEvent::ChainChanged(chain_id) = &event {
            self.chain.store(*chain_id, Ordering::SeqCst);
        }
        if let ProviderEvent::AccountsChanged(accounts) = &event {
            *self.accounts.lock().unwrap() = accounts.clone();
        }
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl WalletProvider for MockWallet {
    async fn check_reachable(&self) -> Result<(), SessionError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(SessionError::ProviderUnavailable("connection refused".into()));
        }
        Ok(())
    }

    async fn request_accounts(&self) -> Result<Vec<Address>, SessionError> {
        self.handshakes.fetch_add(1, Ordering::SeqCst);
        let mut gate = self.gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;
        if self.reject.load(Ordering::SeqCst) {
            return Err(SessionError::UserRejected);
        }
        Ok(self.accounts.lock().unwrap().clone())
    }

    async fn chain_id(&self) -> Result<u64, SessionError> {
        Ok(self.chain.load(Ordering::SeqCst))
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), SessionError> {
        if !self.switchable.contains(&chain_id) {
            return Err(SessionError::UnsupportedChain(chain_id));
        }
        self.chain.store(chain_id, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), SessionError> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn events(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }

    fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }
}
