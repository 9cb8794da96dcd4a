//! EIP-1193 provider injected by the wallet extension as `window.ethereum`.

use async_trait::async_trait;
use gm_chain_client::{ChainError, WalletProvider};
use gm_chain_evm::rpc::RpcErrorObject;
use js_sys::{Function, Promise, Reflect};
use serde::Serialize;
use serde_json::Value;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

#[derive(Serialize)]
struct RequestArguments<'a> {
    method: &'a str,
    params: &'a Value,
}

pub struct InjectedProvider {
    ethereum: JsValue,
    request: Function,
}

impl InjectedProvider {
    /// `None` when no wallet extension injected a provider into the page.
    pub fn detect() -> Option<Self> {
        let window = web_sys::window()?;
        let ethereum = Reflect::get(&window, &JsValue::from_str("ethereum")).ok()?;
        if ethereum.is_undefined() || ethereum.is_null() {
            tracing::info!("make sure you have MetaMask!");
            return None;
        }
        let request = Reflect::get(&ethereum, &JsValue::from_str("request"))
            .ok()?
            .dyn_into::<Function>()
            .ok()?;
        tracing::info!("we have the ethereum object");
        Some(Self { ethereum, request })
    }
}

#[async_trait(?Send)]
impl WalletProvider for InjectedProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        let serializer = serde_wasm_bindgen::Serializer::json_compatible();
        let arguments = RequestArguments {
            method,
            params: &params,
        }
        .serialize(&serializer)
        .map_err(|err| ChainError::Transport(format!("encode {method} arguments: {err}")))?;

        let promise: Promise = self
            .request
            .call1(&self.ethereum, &arguments)
            .map_err(provider_error)?
            .dyn_into()
            .map_err(|_| ChainError::Transport(format!("{method} did not return a promise")))?;
        let value = JsFuture::from(promise).await.map_err(provider_error)?;

        if value.is_undefined() {
            return Ok(Value::Null);
        }
        serde_wasm_bindgen::from_value(value)
            .map_err(|err| ChainError::Decode(format!("{method} result: {err}")))
    }
}

/// Rejections carry an EIP-1193 `{ code, message }` object when the wallet
/// behaves; anything else is a transport failure.
fn provider_error(err: JsValue) -> ChainError {
    match serde_wasm_bindgen::from_value::<RpcErrorObject>(err.clone()) {
        Ok(object) => object.into_chain_error(),
        Err(_) => ChainError::Transport(err.as_string().unwrap_or_else(|| format!("{err:?}"))),
    }
}
