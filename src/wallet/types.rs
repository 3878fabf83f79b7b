//! Session state and error definitions.

use alloy::primitives::Address;
use serde::Serialize;
use thiserror::Error;

/// Connection status of the wallet session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Disconnected => "disconnected",
            SessionStatus::Connecting => "connecting",
            SessionStatus::Connected => "connected",
            SessionStatus::Error => "error",
        }
    }
}

/// Errors surfaced by the session manager.
///
/// Cloneable because one handshake outcome may be delivered to several
/// coalesced `connect` callers.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail")]
pub enum SessionError {
    /// The wallet provider is missing or unreachable.
    #[error("wallet provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The user declined the wallet prompt.
    #[error("request rejected by user")]
    UserRejected,

    /// The chain is not declared in the registry (or refused by the wallet).
    #[error("unsupported chain {0}")]
    UnsupportedChain(u64),

    /// No connector with this id is registered.
    #[error("unknown connector '{0}'")]
    UnknownConnector(String),

    /// The provider did not answer the authorization handshake in time.
    #[error("wallet handshake timed out after {0} seconds")]
    HandshakeTimeout(u64),

    /// The operation requires a connected session.
    #[error("no wallet connected")]
    NotConnected,

    /// The session manager task is gone.
    #[error("session manager stopped")]
    ManagerStopped,
}

/// Snapshot of the wallet session.
///
/// `account` and `chain_id` are `Some` exactly when `status` is `Connected`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletSession {
    pub status: SessionStatus,
    pub active_connector: Option<String>,
    pub account: Option<Address>,
    pub chain_id: Option<u64>,
    /// Resolved lazily; `None` means "show the raw address".
    pub display_name: Option<String>,
    pub last_error: Option<SessionError>,
}

impl Default for WalletSession {
    fn default() -> Self {
        Self::disconnected()
    }
}

impl WalletSession {
    pub fn disconnected() -> Self {
        Self {
            status: SessionStatus::Disconnected,
            active_connector: None,
            account: None,
            chain_id: None,
            display_name: None,
            last_error: None,
        }
    }

    pub(crate) fn connecting(connector_id: &str) -> Self {
        Self {
            status: SessionStatus::Connecting,
            active_connector: Some(connector_id.to_string()),
            ..Self::disconnected()
        }
    }

    pub(crate) fn connected(connector_id: &str, account: Address, chain_id: u64) -> Self {
        Self {
            status: SessionStatus::Connected,
            active_connector: Some(connector_id.to_string()),
            account: Some(account),
            chain_id: Some(chain_id),
            display_name: None,
            last_error: None,
        }
    }

    pub(crate) fn failed(connector_id: &str, error: SessionError) -> Self {
        Self {
            status: SessionStatus::Error,
            active_connector: Some(connector_id.to_string()),
            last_error: Some(error),
            ..Self::disconnected()
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status == SessionStatus::Connected
    }

    /// Whether the account/chain invariant holds.
    pub fn is_consistent(&self) -> bool {
        let connected = self.is_connected();
        let display_ok = connected || self.display_name.is_none();
        connected == self.account.is_some() && connected == self.chain_id.is_some() && display_ok
    }

    /// Display name if resolved, otherwise the checksummed address.
    pub fn label(&self) -> Option<String> {
        match (&self.display_name, self.account) {
            (Some(name), _) => Some(name.clone()),
            (None, Some(account)) => Some(account.to_checksum(None)),
            (None, None) => None,
        }
    }
}

/// Notifications pushed by a wallet provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// New account list; empty means the authorization was revoked.
    AccountsChanged(Vec<Address>),
    /// The wallet moved to another chain.
    ChainChanged(u64),
    /// The provider ended the session.
    Disconnected,
}

/// Outcome of a successful authorization handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Authorization {
    pub account: Address,
    pub chain_id: u64,
}
