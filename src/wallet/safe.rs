//! Multisig (Safe) contract account connector.
//!
//! A Safe is a contract account: there is nothing to prompt, the account is
//! the contract itself. It is available only if code is deployed at the Safe
//! address on the endpoint's chain, and it cannot follow the user to another
//! chain.

use std::time::Duration;

use alloy::primitives::Address;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use async_trait::async_trait;
use tokio::sync::broadcast;
use url::Url;

use crate::wallet::provider::WalletProvider;
use crate::wallet::rpc::map_rpc_error;
use crate::wallet::types::{ProviderEvent, SessionError};

pub struct SafeWalletProvider {
    safe: Address,
    provider: DynProvider,
    events: broadcast::Sender<ProviderEvent>,
    handshake_timeout: Duration,
}

impl SafeWalletProvider {
    pub fn new(endpoint: Url, safe: Address, handshake_timeout: Duration) -> Self {
        let provider = ProviderBuilder::new().connect_http(endpoint).erased();
        let (events, _) = broadcast::channel(4);
        Self {
            safe,
            provider,
            events,
            handshake_timeout,
        }
    }

    pub fn safe_address(&self) -> Address {
        self.safe
    }
}

#[async_trait]
impl WalletProvider for SafeWalletProvider {
    async fn check_reachable(&self) -> Result<(), SessionError> {
        self.chain_id().await.map(|_| ())
    }

    async fn request_accounts(&self) -> Result<Vec<Address>, SessionError> {
        let code = self.provider.get_code_at(self.safe).await.map_err(map_rpc_error)?;
        if code.is_empty() {
            return Err(SessionError::ProviderUnavailable(format!(
                "no Safe contract deployed at {}",
                self.safe
            )));
        }
        Ok(vec![self.safe])
    }

    async fn chain_id(&self) -> Result<u64, SessionError> {
        self.provider.get_chain_id().await.map_err(map_rpc_error)
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), SessionError> {
        if self.chain_id().await? == chain_id {
            Ok(())
        } else {
            Err(SessionError::UnsupportedChain(chain_id))
        }
    }

    fn events(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }

    fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn safe() -> Address {
        Address::repeat_byte(0x5a)
    }

    async fn server_with_code(code: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": "eth_getCode" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 0, "result": code
            })))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_deployed_safe_is_the_account() {
        let server = server_with_code("0x6080604052").await;
        let provider = SafeWalletProvider::new(server.uri().parse().unwrap(), safe(), Duration::from_secs(5));
        assert_eq!(provider.request_accounts().await.unwrap(), vec![safe()]);
    }

    #[tokio::test]
    async fn test_missing_contract_is_unavailable() {
        let server = server_with_code("0x").await;
        let provider = SafeWalletProvider::new(server.uri().parse().unwrap(), safe(), Duration::from_secs(5));
        assert!(matches!(
            provider.request_accounts().await,
            Err(SessionError::ProviderUnavailable(_))
        ));
    }
}
