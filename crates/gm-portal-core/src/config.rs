use gm_api_types::{DEFAULT_GAS_LIMIT, GM_PORTAL_ADDRESS};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::feed::FeedPolicy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalConfig {
    pub contract_address: String,
    pub gas_limit: u64,
    pub event_poll_interval: Duration,
    pub receipt_poll_interval: Duration,
    pub feed_policy: FeedPolicy,
    /// Only used by hosts that reach the chain over HTTP.
    pub rpc_url: Option<String>,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            contract_address: GM_PORTAL_ADDRESS.to_owned(),
            gas_limit: DEFAULT_GAS_LIMIT,
            event_poll_interval: Duration::from_secs(4),
            receipt_poll_interval: Duration::from_secs(1),
            feed_policy: FeedPolicy::AppendOnly,
            rpc_url: None,
        }
    }
}

impl PortalConfig {
    /// Reads `GM_PORTAL_*` overrides from the environment. Unparsable values
    /// are logged and replaced by the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let dedupe = parse_or(&lookup, "GM_PORTAL_DEDUPE", false);

        Self {
            contract_address: lookup("GM_PORTAL_CONTRACT")
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
                .unwrap_or(defaults.contract_address),
            gas_limit: parse_or(&lookup, "GM_PORTAL_GAS_LIMIT", defaults.gas_limit),
            event_poll_interval: Duration::from_millis(parse_or(
                &lookup,
                "GM_PORTAL_EVENT_POLL_MS",
                defaults.event_poll_interval.as_millis() as u64,
            )),
            receipt_poll_interval: Duration::from_millis(parse_or(
                &lookup,
                "GM_PORTAL_RECEIPT_POLL_MS",
                defaults.receipt_poll_interval.as_millis() as u64,
            )),
            feed_policy: if dedupe {
                FeedPolicy::Deduplicate
            } else {
                FeedPolicy::AppendOnly
            },
            rpc_url: lookup("GM_PORTAL_RPC_URL").filter(|value| !value.trim().is_empty()),
        }
    }
}

fn parse_or<F, V>(lookup: &F, key: &str, default: V) -> V
where
    F: Fn(&str) -> Option<String>,
    V: FromStr,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            warn!("ignoring unparsable {key}={raw:?}");
            default
        }
    }
}
