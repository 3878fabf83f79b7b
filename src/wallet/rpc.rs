//! EIP-1193 wallet provider over JSON-RPC.
//!
//! # Responsibilities
//! - Authorize accounts with `eth_requestAccounts`
//! - Read and switch the selected chain
//! - Poll for account/chain changes and publish them as provider events
//!
//! HTTP transports cannot push notifications, so the watcher polls
//! `eth_accounts` / `eth_chainId` and diffs against the last observation.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::transports::TransportError;
use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time;
use url::Url;

use crate::wallet::provider::WalletProvider;
use crate::wallet::types::{ProviderEvent, SessionError};

/// EIP-1193 "user rejected request".
pub const USER_REJECTED_CODE: i64 = 4001;
/// EIP-1193 "unauthorized".
pub const UNAUTHORIZED_CODE: i64 = 4100;
/// EIP-1193 "disconnected".
pub const DISCONNECTED_CODE: i64 = 4900;
/// EIP-3326 "unrecognized chain id".
pub const UNRECOGNIZED_CHAIN_CODE: i64 = 4902;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct SwitchChainParams {
    chain_id: String,
}

/// Wallet reached through a JSON-RPC endpoint that exposes wallet methods.
pub struct RpcWalletProvider {
    endpoint: Url,
    provider: DynProvider,
    events: broadcast::Sender<ProviderEvent>,
    handshake_timeout: Duration,
}

impl RpcWalletProvider {
    pub fn new(endpoint: Url, handshake_timeout: Duration) -> Self {
        let provider = ProviderBuilder::new().connect_http(endpoint.clone()).erased();
        let (events, _) = broadcast::channel(16);
        Self {
            endpoint,
            provider,
            events,
            handshake_timeout,
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Poll the wallet every `interval` until `shutdown` fires.
    pub fn spawn_watcher(
        self: &Arc<Self>,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
            let mut last_accounts: Option<Vec<Address>> = None;
            let mut last_chain: Option<u64> = None;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        this.poll(&mut last_accounts, &mut last_chain).await;
                    }
                    _ = shutdown.recv() => {
                        tracing::debug!(endpoint = %this.endpoint, "Wallet watcher stopping");
                        break;
                    }
                }
            }
        })
    }

    async fn poll(&self, last_accounts: &mut Option<Vec<Address>>, last_chain: &mut Option<u64>) {
        if self.events.receiver_count() == 0 {
            return;
        }

        match self.provider.get_accounts().await {
            Ok(accounts) => {
                if last_accounts.as_ref().is_some_and(|prev| *prev != accounts) {
                    let _ = self.events.send(ProviderEvent::AccountsChanged(accounts.clone()));
                }
                *last_accounts = Some(accounts);
            }
            Err(e) => {
                tracing::debug!(endpoint = %self.endpoint, error = %e, "Account poll failed");
                if last_accounts.is_some() && is_disconnect(&e) {
                    let _ = self.events.send(ProviderEvent::Disconnected);
                    *last_accounts = None;
                }
            }
        }

        match self.provider.get_chain_id().await {
            Ok(chain_id) => {
                if last_chain.is_some_and(|prev| prev != chain_id) {
                    let _ = self.events.send(ProviderEvent::ChainChanged(chain_id));
                }
                *last_chain = Some(chain_id);
            }
            Err(e) => tracing::debug!(endpoint = %self.endpoint, error = %e, "Chain poll failed"),
        }
    }
}

#[async_trait]
impl WalletProvider for RpcWalletProvider {
    async fn check_reachable(&self) -> Result<(), SessionError> {
        self.chain_id().await.map(|_| ())
    }

    async fn request_accounts(&self) -> Result<Vec<Address>, SessionError> {
        self.provider
            .raw_request::<_, Vec<Address>>("eth_requestAccounts".into(), ())
            .await
            .map_err(map_rpc_error)
    }

    async fn chain_id(&self) -> Result<u64, SessionError> {
        self.provider.get_chain_id().await.map_err(map_rpc_error)
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), SessionError> {
        let params = [SwitchChainParams { chain_id: format!("{:#x}", chain_id) }];
        self.provider
            .raw_request::<_, serde_json::Value>("wallet_switchEthereumChain".into(), params)
            .await
            .map(|_| ())
            .map_err(|e| match e.as_error_resp().map(|p| p.code) {
                Some(UNRECOGNIZED_CHAIN_CODE) => SessionError::UnsupportedChain(chain_id),
                _ => map_rpc_error(e),
            })
    }

    async fn disconnect(&self) -> Result<(), SessionError> {
        let params = [serde_json::json!({ "eth_accounts": {} })];
        if let Err(e) = self
            .provider
            .raw_request::<_, serde_json::Value>("wallet_revokePermissions".into(), params)
            .await
        {
            // Not every wallet implements EIP-2255; the local session is cleared regardless.
            tracing::debug!(endpoint = %self.endpoint, error = %e, "Permission revoke not supported");
        }
        Ok(())
    }

    fn events(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }

    fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }
}

impl std::fmt::Debug for RpcWalletProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcWalletProvider")
            .field("endpoint", &self.endpoint.as_str())
            .field("handshake_timeout", &self.handshake_timeout)
            .finish()
    }
}

fn is_disconnect(err: &TransportError) -> bool {
    match err.as_error_resp() {
        Some(payload) => payload.code == DISCONNECTED_CODE,
        None => true,
    }
}

/// Map a JSON-RPC failure onto the session error taxonomy.
pub(crate) fn map_rpc_error(err: TransportError) -> SessionError {
    match err.as_error_resp() {
        Some(payload) if payload.code == USER_REJECTED_CODE => SessionError::UserRejected,
        Some(payload) if payload.code == UNAUTHORIZED_CODE => SessionError::UserRejected,
        Some(payload) => SessionError::ProviderUnavailable(format!(
            "wallet error {}: {}",
            payload.code, payload.message
        )),
        None => SessionError::ProviderUnavailable(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn rpc_result(result: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({ "jsonrpc": "2.0", "id": 0, "result": result }))
    }

    fn rpc_error(code: i64, message: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 0,
            "error": { "code": code, "message": message }
        }))
    }

    async fn provider_for(server: &MockServer) -> RpcWalletProvider {
        RpcWalletProvider::new(server.uri().parse().unwrap(), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_request_accounts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": "eth_requestAccounts" })))
            .respond_with(rpc_result(json!(["0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"])))
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let accounts = provider.request_accounts().await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(
            accounts[0].to_string().to_lowercase(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[tokio::test]
    async fn test_user_rejection_maps_to_user_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(rpc_error(USER_REJECTED_CODE, "User rejected the request."))
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        assert_eq!(provider.request_accounts().await.unwrap_err(), SessionError::UserRejected);
    }

    #[tokio::test]
    async fn test_switch_to_unrecognized_chain() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": "wallet_switchEthereumChain" })))
            .respond_with(rpc_error(UNRECOGNIZED_CHAIN_CODE, "Unrecognized chain ID"))
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        assert_eq!(
            provider.switch_chain(10).await.unwrap_err(),
            SessionError::UnsupportedChain(10)
        );
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_unavailable() {
        let provider = RpcWalletProvider::new("http://127.0.0.1:1".parse().unwrap(), Duration::from_secs(1));
        let err = provider.request_accounts().await.unwrap_err();
        assert!(matches!(err, SessionError::ProviderUnavailable(_)));
        let err = provider.check_reachable().await.unwrap_err();
        assert!(matches!(err, SessionError::ProviderUnavailable(_)));
    }
}
