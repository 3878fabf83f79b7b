//! Wallet session manager.
//!
//! # States
//! - Disconnected: no wallet attached
//! - Connecting: authorization handshake in flight
//! - Connected: account and chain known
//! - Error: last connect attempt failed (`last_error` set)
//!
//! # State Transitions
//! ```text
//! Disconnected/Error → Connecting: connect(connector)
//! Connecting → Connected:          handshake authorized (account + chain in one step)
//! Connecting → Error:              provider missing, user rejected, handshake timeout
//! Connected → Disconnected:        disconnect(), revoked accounts, provider disconnect
//! Connected → Connected:           switch_chain(), provider chain/account change
//! ```
//!
//! # Design Decisions
//! - One actor task owns the session; every transition is an intent on a FIFO queue
//! - Provider notifications are forwarded into the same queue
//! - Intents arriving during a handshake are deferred until it settles, except
//!   connects for the same provider, which attach to the handshake
//! - Snapshots are published through a `watch` channel

use std::collections::VecDeque;
use std::sync::Arc;

use alloy::primitives::Address;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::timeout;

use crate::observability::metrics;
use crate::registry::{ProviderKey, Registry};
use crate::wallet::ens::NameResolver;
use crate::wallet::provider::{ProviderSet, WalletProvider};
use crate::wallet::types::{Authorization, ProviderEvent, SessionError, WalletSession};

type SessionReply = oneshot::Sender<Result<WalletSession, SessionError>>;

enum Intent {
    Connect {
        connector_id: String,
        reply: SessionReply,
    },
    Disconnect {
        reply: oneshot::Sender<WalletSession>,
    },
    SwitchChain {
        chain_id: u64,
        reply: SessionReply,
    },
    Provider {
        key: ProviderKey,
        event: ProviderEvent,
    },
    DisplayName {
        account: Address,
        name: String,
    },
}

/// Handle to the session actor. Cheap to clone; every clone talks to the
/// same session.
#[derive(Clone)]
pub struct SessionManager {
    intents: mpsc::UnboundedSender<Intent>,
    state: watch::Receiver<WalletSession>,
}

impl SessionManager {
    /// Start the session actor and one event forwarder per provider.
    ///
    /// Everything stops when `shutdown` fires.
    pub fn spawn(
        registry: Arc<Registry>,
        providers: ProviderSet,
        resolver: Option<Arc<dyn NameResolver>>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        let (intents_tx, intents_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(WalletSession::disconnected());

        for (key, provider) in &providers {
            spawn_event_forwarder(key.clone(), provider.as_ref(), intents_tx.clone(), shutdown.resubscribe());
        }

        let actor = SessionActor {
            registry,
            providers,
            resolver,
            intents_tx: intents_tx.clone(),
            rx: intents_rx,
            deferred: VecDeque::new(),
            state: state_tx,
            active_key: None,
        };
        tokio::spawn(actor.run(shutdown));

        Self {
            intents: intents_tx,
            state: state_rx,
        }
    }

    /// Connect through `connector_id`.
    ///
    /// Resolves against an existing or in-flight session when the connector
    /// shares its provider with the active one.
    pub async fn connect(&self, connector_id: &str) -> Result<WalletSession, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Intent::Connect {
            connector_id: connector_id.to_string(),
            reply,
        })?;
        rx.await.map_err(|_| SessionError::ManagerStopped)?
    }

    /// Drop the session. Applied after any in-flight handshake settles.
    pub async fn disconnect(&self) -> Result<WalletSession, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Intent::Disconnect { reply })?;
        rx.await.map_err(|_| SessionError::ManagerStopped)
    }

    /// Move the connected wallet to `chain_id`.
    pub async fn switch_chain(&self, chain_id: u64) -> Result<WalletSession, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Intent::SwitchChain { chain_id, reply })?;
        rx.await.map_err(|_| SessionError::ManagerStopped)?
    }

    /// Current snapshot.
    pub fn session(&self) -> WalletSession {
        self.state.borrow().clone()
    }

    /// Follow every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<WalletSession> {
        self.state.clone()
    }

    fn send(&self, intent: Intent) -> Result<(), SessionError> {
        self.intents.send(intent).map_err(|_| SessionError::ManagerStopped)
    }
}

fn spawn_event_forwarder(
    key: ProviderKey,
    provider: &dyn WalletProvider,
    intents: mpsc::UnboundedSender<Intent>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut events = provider.events();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                received = events.recv() => match received {
                    Ok(event) => {
                        if intents.send(Intent::Provider { key: key.clone(), event }).is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(provider = %key, skipped, "Provider events lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = shutdown.recv() => break,
            }
        }
    });
}

struct SessionActor {
    registry: Arc<Registry>,
    providers: ProviderSet,
    resolver: Option<Arc<dyn NameResolver>>,
    intents_tx: mpsc::UnboundedSender<Intent>,
    rx: mpsc::UnboundedReceiver<Intent>,
    /// Intents that arrived while a handshake was in flight, in arrival order.
    deferred: VecDeque<Intent>,
    state: watch::Sender<WalletSession>,
    /// Provider behind the Connecting/Connected session.
    active_key: Option<ProviderKey>,
}

impl SessionActor {
    async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::debug!(providers = self.providers.len(), "Session manager started");
        loop {
            let intent = match self.deferred.pop_front() {
                Some(intent) => intent,
                None => tokio::select! {
                    received = self.rx.recv() => match received {
                        Some(intent) => intent,
                        None => break,
                    },
                    _ = shutdown.recv() => break,
                },
            };
            self.handle(intent).await;
        }
        tracing::debug!("Session manager stopped");
    }

    async fn handle(&mut self, intent: Intent) {
        match intent {
            Intent::Connect { connector_id, reply } => self.connect(connector_id, reply).await,
            Intent::Disconnect { reply } => {
                let session = self.disconnect("requested").await;
                let _ = reply.send(session);
            }
            Intent::SwitchChain { chain_id, reply } => {
                let result = self.switch_chain(chain_id).await;
                let _ = reply.send(result);
            }
            Intent::Provider { key, event } => self.on_provider_event(key, event),
            Intent::DisplayName { account, name } => {
                let current = self.snapshot();
                if current.is_connected() && current.account == Some(account) {
                    let mut next = current;
                    next.display_name = Some(name);
                    self.publish(next, "display_name");
                }
            }
        }
    }

    async fn connect(&mut self, connector_id: String, reply: SessionReply) {
        let Some(key) = self.registry.provider_key(&connector_id).cloned() else {
            tracing::warn!(connector = %connector_id, "Connect requested for unknown connector");
            let _ = reply.send(Err(SessionError::UnknownConnector(connector_id)));
            return;
        };

        let current = self.snapshot();
        if current.is_connected() && self.active_key.as_ref() == Some(&key) {
            tracing::debug!(connector = %connector_id, provider = %key, "Provider already connected");
            let _ = reply.send(Ok(current));
            return;
        }

        let Some(provider) = self.providers.get(&key).cloned() else {
            let error = SessionError::ProviderUnavailable(format!("no provider for connector '{}'", connector_id));
            self.settle(&connector_id, Err(error), vec![reply]);
            return;
        };

        let limit = provider.handshake_timeout();
        let reachable = match timeout(limit, provider.check_reachable()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(SessionError::ProviderUnavailable(reason))) => Err(reason),
            Ok(Err(other)) => Err(other.to_string()),
            Err(_) => Err(format!("no answer within {}s", limit.as_secs())),
        };
        if let Err(reason) = reachable {
            tracing::warn!(connector = %connector_id, provider = %key, reason = %reason, "Wallet provider unreachable");
            self.settle(&connector_id, Err(SessionError::ProviderUnavailable(reason)), vec![reply]);
            return;
        }

        if current.is_connected() {
            tracing::info!(connector = %connector_id, "Switching wallet provider");
            self.disconnect("provider switch").await;
        }

        self.active_key = Some(key.clone());
        self.publish(WalletSession::connecting(&connector_id), "connecting");
        tracing::info!(connector = %connector_id, provider = %key, "Wallet handshake started");

        let handshake = timeout(limit, authorize(provider));
        tokio::pin!(handshake);

        let mut waiters = vec![reply];
        let outcome = loop {
            tokio::select! {
                settled = &mut handshake => break settled,
                Some(intent) = self.rx.recv() => match intent {
                    Intent::Connect { connector_id: other, reply }
                        if self.registry.provider_key(&other) == Some(&key) =>
                    {
                        tracing::debug!(connector = %other, "Attaching to in-flight handshake");
                        waiters.push(reply);
                    }
                    other => self.deferred.push_back(other),
                },
            }
        };

        let result = match outcome {
            Ok(authorized) => authorized,
            Err(_) => Err(SessionError::HandshakeTimeout(limit.as_secs())),
        };
        self.settle(&connector_id, result, waiters);
    }

    fn settle(
        &mut self,
        connector_id: &str,
        result: Result<Authorization, SessionError>,
        waiters: Vec<SessionReply>,
    ) {
        let outcome = match result {
            Ok(auth) => {
                let session = WalletSession::connected(connector_id, auth.account, auth.chain_id);
                tracing::info!(
                    connector = %connector_id,
                    account = %auth.account,
                    chain_id = auth.chain_id,
                    "Wallet connected"
                );
                self.publish(session.clone(), "connected");
                self.spawn_display_name(auth.account);
                Ok(session)
            }
            Err(error) => {
                tracing::warn!(connector = %connector_id, error = %error, "Wallet connection failed");
                self.active_key = None;
                self.publish(WalletSession::failed(connector_id, error.clone()), "error");
                Err(error)
            }
        };

        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
    }

    async fn disconnect(&mut self, reason: &'static str) -> WalletSession {
        let was_connected = self.snapshot().is_connected();
        if let Some(key) = self.active_key.take() {
            if let (true, Some(provider)) = (was_connected, self.providers.get(&key)) {
                let limit = provider.handshake_timeout();
                match timeout(limit, provider.disconnect()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::debug!(provider = %key, error = %e, "Provider disconnect failed"),
                    Err(_) => tracing::debug!(provider = %key, "Provider disconnect timed out"),
                }
            }
        }

        let session = WalletSession::disconnected();
        tracing::info!(reason, "Wallet disconnected");
        self.publish(session.clone(), "disconnected");
        session
    }

    async fn switch_chain(&mut self, chain_id: u64) -> Result<WalletSession, SessionError> {
        if !self.registry.is_supported(chain_id) {
            tracing::warn!(chain_id, "Switch to unregistered chain refused");
            return Err(self.record_error(SessionError::UnsupportedChain(chain_id)));
        }

        let current = self.snapshot();
        let provider = match (&self.active_key, current.is_connected()) {
            (Some(key), true) => self.providers.get(key).cloned(),
            _ => None,
        };
        let Some(provider) = provider else {
            return Err(self.record_error(SessionError::NotConnected));
        };
        if current.chain_id == Some(chain_id) {
            return Ok(current);
        }

        let limit = provider.handshake_timeout();
        let switched = match timeout(limit, provider.switch_chain(chain_id)).await {
            Ok(result) => result,
            Err(_) => Err(SessionError::HandshakeTimeout(limit.as_secs())),
        };
        if let Err(error) = switched {
            tracing::warn!(chain_id, error = %error, "Chain switch failed");
            return Err(self.record_error(error));
        }

        let mut next = current;
        next.chain_id = Some(chain_id);
        next.last_error = None;
        tracing::info!(chain_id, "Chain switched");
        self.publish(next.clone(), "chain_switched");
        Ok(next)
    }

    fn on_provider_event(&mut self, key: ProviderKey, event: ProviderEvent) {
        let current = self.snapshot();
        if self.active_key.as_ref() != Some(&key) || !current.is_connected() {
            tracing::trace!(provider = %key, ?event, "Ignoring event from inactive provider");
            return;
        }

        match event {
            ProviderEvent::AccountsChanged(accounts) => match accounts.first().copied() {
                None => {
                    tracing::info!(provider = %key, "Wallet authorization revoked");
                    self.active_key = None;
                    self.publish(WalletSession::disconnected(), "disconnected");
                }
                Some(account) if current.account != Some(account) => {
                    tracing::info!(%account, "Wallet account changed");
                    let mut next = current;
                    next.account = Some(account);
                    next.display_name = None;
                    self.publish(next, "account_changed");
                    self.spawn_display_name(account);
                }
                Some(_) => {}
            },
            ProviderEvent::ChainChanged(chain_id) => {
                if current.chain_id != Some(chain_id) {
                    if !self.registry.is_supported(chain_id) {
                        tracing::warn!(chain_id, "Wallet moved to an unregistered chain");
                    }
                    let mut next = current;
                    next.chain_id = Some(chain_id);
                    self.publish(next, "chain_switched");
                }
            }
            ProviderEvent::Disconnected => {
                tracing::info!(provider = %key, "Provider ended the session");
                self.active_key = None;
                self.publish(WalletSession::disconnected(), "disconnected");
            }
        }
    }

    /// Best-effort; failures leave `display_name` empty and `last_error` untouched.
    fn spawn_display_name(&self, account: Address) {
        let Some(resolver) = self.resolver.clone() else {
            return;
        };
        let intents = self.intents_tx.clone();
        tokio::spawn(async move {
            match resolver.lookup_address(account).await {
                Ok(Some(name)) => {
                    let _ = intents.send(Intent::DisplayName { account, name });
                }
                Ok(None) => tracing::debug!(%account, "No display name for account"),
                Err(e) => tracing::debug!(%account, error = %e, "Display name lookup failed"),
            }
        });
    }

    fn record_error(&mut self, error: SessionError) -> SessionError {
        let mut next = self.snapshot();
        next.last_error = Some(error.clone());
        self.publish(next, "error_recorded");
        error
    }

    fn snapshot(&self) -> WalletSession {
        self.state.borrow().clone()
    }

    fn publish(&self, session: WalletSession, transition: &'static str) {
        debug_assert!(session.is_consistent(), "inconsistent session: {:?}", session);
        metrics::record_session_transition(transition, session.status.as_str());
        self.state.send_replace(session);
    }
}

async fn authorize(provider: Arc<dyn WalletProvider>) -> Result<Authorization, SessionError> {
    let accounts = provider.request_accounts().await?;
    let account = accounts
        .first()
        .copied()
        .ok_or_else(|| SessionError::ProviderUnavailable("wallet returned no accounts".to_string()))?;
    let chain_id = provider.chain_id().await?;
    Ok(Authorization { account, chain_id })
}
