use async_trait::async_trait;
use gm_chain_client::{ChainError, WalletProvider};
use serde_json::Value;
use std::cell::Cell;
use tracing::debug;

use crate::rpc::{RpcRequest, RpcResponse};

pub const DEFAULT_RPC_URL: &str = "http://localhost:8545";

/// JSON-RPC over HTTP against a node with unlocked accounts (anvil, a dev
/// geth). Such nodes have no permission prompt, so `eth_requestAccounts`
/// is answered with the node's `eth_accounts`.
///
/// The endpoint comes from the caller, usually `PortalConfig::rpc_url`.
pub struct HttpProvider {
    endpoint: String,
    http: reqwest::Client,
    next_id: Cell<u64>,
}

impl Default for HttpProvider {
    fn default() -> Self {
        Self::new(None)
    }
}

impl HttpProvider {
    pub fn new(endpoint: Option<String>) -> Self {
        let endpoint = endpoint.unwrap_or_else(|| DEFAULT_RPC_URL.to_string());
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            next_id: Cell::new(1),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait(?Send)]
impl WalletProvider for HttpProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        let method = match method {
            "eth_requestAccounts" => "eth_accounts",
            other => other,
        };
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        debug!(id, method, "json-rpc request");

        let response = self
            .http
            .post(&self.endpoint)
            .json(&RpcRequest::new(id, method, params))
            .send()
            .await
            .map_err(|err| ChainError::Transport(format!("{method} transport: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ChainError::Transport(format!("{method} HTTP {status}: {text}")));
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|err| ChainError::Decode(format!("{method} response: {err}")))?;
        body.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_the_local_node() {
        assert_eq!(HttpProvider::new(None).endpoint(), DEFAULT_RPC_URL);
        assert_eq!(HttpProvider::default().endpoint(), DEFAULT_RPC_URL);
    }

    #[test]
    fn uses_the_given_endpoint_verbatim_minus_trailing_slash() {
        let provider = HttpProvider::new(Some("https://rpc.example.org/v1/".to_owned()));
        assert_eq!(provider.endpoint(), "https://rpc.example.org/v1");
    }
}
