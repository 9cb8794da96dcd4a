use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Deployed GM portal contract.
pub const GM_PORTAL_ADDRESS: &str = "0x386b272665F76f307fDb45fF0214E642f520A42c";
/// Gas ceiling attached to every `gm` call.
pub const DEFAULT_GAS_LIMIT: u64 = 300_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct WalletAddress(pub String);

impl WalletAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle of a transaction accepted into the provider's pending pool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TxHash(pub String);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GreetingDecodeError {
    #[error("timestamp is not a whole number of seconds: {0:?}")]
    InvalidTimestamp(String),
    #[error("timestamp {0}s does not fit in milliseconds")]
    TimestampOverflow(String),
}

/// A greeting exactly as the contract reports it, either from the bulk
/// read or from a `NewGm` event. The timestamp is a decimal seconds value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawGreeting {
    pub sender: String,
    pub timestamp: String,
    pub message: String,
}

impl RawGreeting {
    pub fn new(
        sender: impl Into<String>,
        timestamp: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            timestamp: timestamp.into(),
            message: message.into(),
        }
    }

    pub fn into_record(self) -> Result<GreetingRecord, GreetingDecodeError> {
        let digits = self.timestamp.trim();
        let seconds: u64 = digits.parse().map_err(|_| {
            if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
                GreetingDecodeError::TimestampOverflow(digits.to_owned())
            } else {
                GreetingDecodeError::InvalidTimestamp(self.timestamp.clone())
            }
        })?;
        let timestamp_epoch_ms = seconds_to_epoch_ms(seconds)
            .ok_or_else(|| GreetingDecodeError::TimestampOverflow(digits.to_owned()))?;

        Ok(GreetingRecord {
            sender: WalletAddress(self.sender),
            timestamp_epoch_ms,
            message: self.message,
        })
    }
}

/// Chain timestamps are whole seconds; the feed keeps milliseconds.
pub fn seconds_to_epoch_ms(seconds: u64) -> Option<u64> {
    seconds.checked_mul(1000)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GreetingRecord {
    pub sender: WalletAddress,
    pub timestamp_epoch_ms: u64,
    pub message: String,
}

impl GreetingRecord {
    pub fn timestamp(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(self.timestamp_epoch_ms)
    }

    pub fn key(&self) -> GreetingKey {
        GreetingKey {
            sender: self.sender.0.to_ascii_lowercase(),
            timestamp_epoch_ms: self.timestamp_epoch_ms,
            message: self.message.clone(),
        }
    }
}

/// Identity of an on-chain greeting. Addresses compare case-insensitively
/// since providers disagree on checksum casing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GreetingKey {
    pub sender: String,
    pub timestamp_epoch_ms: u64,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Emoji {
    #[default]
    None,
    Smile,
    Neutral,
    Tired,
}

impl Emoji {
    /// Choices offered by the picker, in display order.
    pub const PALETTE: [Emoji; 3] = [Emoji::Smile, Emoji::Neutral, Emoji::Tired];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emoji::None => "",
            Emoji::Smile => "\u{1F60A}",
            Emoji::Neutral => "\u{1F610}",
            Emoji::Tired => "\u{1F62B}",
        }
    }
}

pub fn compose_message(emoji: Emoji) -> String {
    format!("gm {}", emoji.as_str())
}
