//! Seams between the portal and the chain: the EIP-1193 wallet provider,
//! the greeting contract gateway, and the event subscription plumbing.

use async_trait::async_trait;
use gm_api_types::{GreetingDecodeError, GreetingRecord, TxHash, WalletAddress};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::rc::Rc;
use std::time::Duration;
use thiserror::Error;

mod hub;
#[cfg(any(test, feature = "testing"))]
pub mod mock;

pub use hub::{EventHub, GreetingCallback, Subscription};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("no wallet provider found")]
    NoProviderFound,
    #[error("request rejected by the user")]
    UserRejected,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("transaction ran out of gas: {0}")]
    OutOfGas(String),
    #[error("chain execution failed: {0}")]
    Execution(String),
    #[error("malformed chain data: {0}")]
    Decode(String),
}

impl From<GreetingDecodeError> for ChainError {
    fn from(err: GreetingDecodeError) -> Self {
        ChainError::Decode(err.to_string())
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::Decode(err.to_string())
    }
}

/// An EIP-1193 provider: a single `request({ method, params })` entry point.
///
/// Futures are not `Send`; everything runs on one cooperative thread.
#[async_trait(?Send)]
pub trait WalletProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ChainError>;
}

#[async_trait(?Send)]
impl<P: WalletProvider + ?Sized> WalletProvider for Rc<P> {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        (**self).request(method, params).await
    }
}

/// Suspension between polls. The browser and native hosts bring their own.
#[async_trait(?Send)]
pub trait Timer {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub gas_used: u64,
}

/// Typed access to the greeting contract.
#[async_trait(?Send)]
pub trait GreetingGateway {
    /// Every greeting stored by the contract, in contract order.
    async fn fetch_all_greetings(&self) -> Result<Vec<GreetingRecord>, ChainError>;

    /// Sends the write call. Resolves once the provider has accepted the
    /// transaction, not when it is mined.
    async fn submit_greeting(&self, signer: &WalletAddress, message: &str) -> Result<TxHash, ChainError>;

    async fn await_mined(&self, tx_hash: &TxHash) -> Result<TxReceipt, ChainError>;

    fn subscribe_new_greetings(&self, callback: GreetingCallback) -> Subscription;

    /// Runs one polling step of the event subscription and returns how many
    /// events were dispatched.
    async fn poll_new_greetings(&self) -> Result<usize, ChainError>;

    fn has_subscribers(&self) -> bool;
}

#[async_trait(?Send)]
impl<G: GreetingGateway + ?Sized> GreetingGateway for Rc<G> {
    async fn fetch_all_greetings(&self) -> Result<Vec<GreetingRecord>, ChainError> {
        (**self).fetch_all_greetings().await
    }

    async fn submit_greeting(&self, signer: &WalletAddress, message: &str) -> Result<TxHash, ChainError> {
        (**self).submit_greeting(signer, message).await
    }

    async fn await_mined(&self, tx_hash: &TxHash) -> Result<TxReceipt, ChainError> {
        (**self).await_mined(tx_hash).await
    }

    fn subscribe_new_greetings(&self, callback: GreetingCallback) -> Subscription {
        (**self).subscribe_new_greetings(callback)
    }

    async fn poll_new_greetings(&self) -> Result<usize, ChainError> {
        (**self).poll_new_greetings().await
    }

    fn has_subscribers(&self) -> bool {
        (**self).has_subscribers()
    }
}
