//! EVM binding of the greeting gateway.
//!
//! Speaks JSON-RPC through any [`WalletProvider`](gm_chain_client::WalletProvider):
//! the injected browser wallet, or [`HttpProvider`] against a node.

pub mod abi;
mod contract;
#[cfg(not(target_arch = "wasm32"))]
mod http;
pub mod rpc;

pub use contract::GmPortalContract;
pub use gm_api_types::{DEFAULT_GAS_LIMIT, GM_PORTAL_ADDRESS};
#[cfg(not(target_arch = "wasm32"))]
pub use http::{DEFAULT_RPC_URL, HttpProvider};
