//! Wallet provider boundary.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::registry::ProviderKey;
use crate::wallet::types::{ProviderEvent, SessionError};

/// A wallet that can authorize accounts and report chain state.
///
/// Implementations translate their transport (in-page injection, relay
/// session, contract account) into these calls.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Cheap check that the wallet answers at all. Never prompts.
    async fn check_reachable(&self) -> Result<(), SessionError> {
        Ok(())
    }

    /// Ask the wallet for account access. May prompt the user.
    async fn request_accounts(&self) -> Result<Vec<Address>, SessionError>;

    /// Currently selected chain.
    async fn chain_id(&self) -> Result<u64, SessionError>;

    /// Ask the wallet to move to `chain_id`.
    async fn switch_chain(&self, chain_id: u64) -> Result<(), SessionError>;

    /// End the session on the wallet side, where supported.
    async fn disconnect(&self) -> Result<(), SessionError> {
        Ok(())
    }

    /// Subscribe to account/chain/disconnect notifications.
    fn events(&self) -> broadcast::Receiver<ProviderEvent>;

    /// How long an authorization handshake may stay unanswered.
    fn handshake_timeout(&self) -> Duration;
}

/// Providers indexed by identity, shared by redundant connectors.
pub type ProviderSet = HashMap<ProviderKey, Arc<dyn WalletProvider>>;
