//! JSON-RPC plumbing shared by every provider: quantities, hex data and
//! the mapping from provider error objects onto [`ChainError`].

use alloy_primitives::hex;
use gm_chain_client::ChainError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// EIP-1193 "User Rejected Request".
pub const USER_REJECTED: i64 = 4001;
/// EIP-1193 "Unauthorized".
pub const UNAUTHORIZED: i64 = 4100;
/// Geth-style "execution reverted" with revert data.
pub const EXECUTION_REVERTED: i64 = 3;

/// Error object carried by a JSON-RPC response or a rejected EIP-1193 promise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl RpcErrorObject {
    pub fn into_chain_error(self) -> ChainError {
        classify_rpc_error(self.code, &self.message)
    }
}

pub fn classify_rpc_error(code: i64, message: &str) -> ChainError {
    let lowered = message.to_ascii_lowercase();
    if code == USER_REJECTED || code == UNAUTHORIZED {
        return ChainError::UserRejected;
    }
    if lowered.contains("out of gas") || lowered.contains("intrinsic gas too low") {
        return ChainError::OutOfGas(message.to_owned());
    }
    if code == EXECUTION_REVERTED || lowered.contains("execution reverted") {
        return ChainError::Execution(message.to_owned());
    }
    ChainError::Transport(format!("rpc error {code}: {message}"))
}

#[derive(Debug, Serialize)]
pub struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: Value,
}

impl<'a> RpcRequest<'a> {
    pub fn new(id: u64, method: &'a str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcErrorObject>,
}

impl RpcResponse {
    pub fn into_result(self) -> Result<Value, ChainError> {
        if let Some(error) = self.error {
            return Err(error.into_chain_error());
        }
        Ok(self.result.unwrap_or(Value::Null))
    }
}

pub fn quantity(value: u64) -> String {
    format!("{value:#x}")
}

pub fn parse_quantity(value: &str) -> Result<u64, ChainError> {
    let digits = value
        .strip_prefix("0x")
        .ok_or_else(|| ChainError::Decode(format!("quantity without 0x prefix: {value:?}")))?;
    if digits.is_empty() {
        return Err(ChainError::Decode("empty quantity".to_owned()));
    }
    u64::from_str_radix(digits, 16)
        .map_err(|err| ChainError::Decode(format!("bad quantity {value:?}: {err}")))
}

pub fn expect_quantity(value: &Value) -> Result<u64, ChainError> {
    let text = value
        .as_str()
        .ok_or_else(|| ChainError::Decode(format!("expected hex quantity, got {value}")))?;
    parse_quantity(text)
}

pub fn encode_data(bytes: &[u8]) -> String {
    hex::encode_prefixed(bytes)
}

pub fn decode_data(value: &Value) -> Result<Vec<u8>, ChainError> {
    let text = value
        .as_str()
        .ok_or_else(|| ChainError::Decode(format!("expected hex data, got {value}")))?;
    hex::decode(text).map_err(|err| ChainError::Decode(format!("bad hex data: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn quantities_are_minimal_hex() {
        assert_eq!(quantity(0), "0x0");
        assert_eq!(quantity(300_000), "0x493e0");
        assert_eq!(parse_quantity("0x493e0").unwrap(), 300_000);
        assert!(parse_quantity("493e0").is_err());
        assert!(parse_quantity("0x").is_err());
    }

    #[test]
    fn maps_provider_error_codes() {
        assert_eq!(
            classify_rpc_error(4001, "User denied transaction signature."),
            ChainError::UserRejected
        );
        assert!(matches!(
            classify_rpc_error(-32000, "intrinsic gas too low"),
            ChainError::OutOfGas(_)
        ));
        assert!(matches!(
            classify_rpc_error(3, "execution reverted: wait 15m"),
            ChainError::Execution(_)
        ));
        assert!(matches!(
            classify_rpc_error(-32603, "Internal JSON-RPC error."),
            ChainError::Transport(_)
        ));
    }

    #[test]
    fn response_error_wins_over_result() {
        let response: RpcResponse = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": 4001, "message": "rejected" }
        }))
        .unwrap();
        assert_eq!(response.into_result().unwrap_err(), ChainError::UserRejected);

        let response: RpcResponse =
            serde_json::from_value(json!({ "jsonrpc": "2.0", "id": 2, "result": "0x1" })).unwrap();
        assert_eq!(response.into_result().unwrap(), json!("0x1"));
    }

    #[test]
    fn data_round_trips_through_hex() {
        let encoded = encode_data(&[0xde, 0xad]);
        assert_eq!(encoded, "0xdead");
        assert_eq!(decode_data(&json!(encoded)).unwrap(), vec![0xde, 0xad]);
        assert!(decode_data(&json!(12)).is_err());
    }
}
