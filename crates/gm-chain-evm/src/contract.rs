use alloy_primitives::{Address, B256};
use alloy_sol_types::{SolCall, SolEvent};
use async_trait::async_trait;
use gm_api_types::{DEFAULT_GAS_LIMIT, GreetingRecord, RawGreeting, TxHash, WalletAddress};
use gm_chain_client::{
    ChainError, EventHub, GreetingCallback, GreetingGateway, Subscription, Timer, TxReceipt,
    WalletProvider,
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::cell::Cell;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::abi::IGmPortal;
use crate::rpc::{decode_data, encode_data, expect_quantity, parse_quantity, quantity};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    block_number: Option<String>,
    gas_used: String,
}

#[derive(Debug, Deserialize)]
struct RpcLog {
    topics: Vec<String>,
    data: String,
    #[serde(default)]
    removed: bool,
}

/// Contract gateway for the GM portal, talking JSON-RPC through a wallet
/// provider.
pub struct GmPortalContract<P, T> {
    provider: P,
    timer: T,
    address: Address,
    gas_limit: u64,
    receipt_poll_interval: Duration,
    hub: EventHub,
    // Next block to scan for `NewGm`; unset until a fetch or a poll with
    // subscribers pins it.
    cursor: Cell<Option<u64>>,
}

impl<P, T> GmPortalContract<P, T>
where
    P: WalletProvider,
    T: Timer,
{
    pub fn new(provider: Option<P>, timer: T, address: &str) -> Result<Self, ChainError> {
        let Some(provider) = provider else {
            return Err(ChainError::NoProviderFound);
        };
        let address = Address::from_str(address)
            .map_err(|err| ChainError::Decode(format!("contract address {address:?}: {err}")))?;

        Ok(Self {
            provider,
            timer,
            address,
            gas_limit: DEFAULT_GAS_LIMIT,
            receipt_poll_interval: Duration::from_secs(1),
            hub: EventHub::new(),
            cursor: Cell::new(None),
        })
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    pub fn with_receipt_poll_interval(mut self, interval: Duration) -> Self {
        self.receipt_poll_interval = interval;
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        let value = self.provider.request("eth_blockNumber", json!([])).await?;
        expect_quantity(&value)
    }

    fn decode_log(&self, log: RpcLog) -> Result<RawGreeting, ChainError> {
        let topics = log
            .topics
            .iter()
            .map(|topic| {
                B256::from_str(topic)
                    .map_err(|err| ChainError::Decode(format!("log topic {topic:?}: {err}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let data = decode_data(&Value::String(log.data))?;
        let event = IGmPortal::NewGm::decode_raw_log(topics, &data, true)
            .map_err(|err| ChainError::Decode(format!("NewGm log: {err}")))?;

        Ok(RawGreeting::new(
            event.from.to_checksum(None),
            event.timestamp.to_string(),
            event.message,
        ))
    }
}

#[async_trait(?Send)]
impl<P, T> GreetingGateway for GmPortalContract<P, T>
where
    P: WalletProvider,
    T: Timer,
{
    async fn fetch_all_greetings(&self) -> Result<Vec<GreetingRecord>, ChainError> {
        let block = self.block_number().await?;
        let call = IGmPortal::getAllGmsCall {};
        let params = json!([
            { "to": self.address.to_checksum(None), "data": encode_data(&call.abi_encode()) },
            quantity(block)
        ]);
        let output = self.provider.request("eth_call", params).await?;
        let output = decode_data(&output)?;

        let gms = IGmPortal::getAllGmsCall::abi_decode_returns(&output, true)
            .map_err(|err| ChainError::Decode(format!("getAllGms output: {err}")))?
            ._0;
        debug!(count = gms.len(), block, "fetched greetings");
        // Anything mined after the read block arrives through polling.
        self.cursor.set(Some(block + 1));

        let records = gms
            .into_iter()
            .filter_map(|gm| {
                let sender = gm.gmer.to_checksum(None);
                match RawGreeting::new(sender.clone(), gm.timestamp.to_string(), gm.message).into_record() {
                    Ok(record) => Some(record),
                    Err(err) => {
                        warn!(%sender, "skipping greeting: {err}");
                        None
                    }
                }
            })
            .collect();
        Ok(records)
    }

    async fn submit_greeting(&self, signer: &WalletAddress, message: &str) -> Result<TxHash, ChainError> {
        let call = IGmPortal::gmCall {
            message: message.to_owned(),
        };
        let params = json!([{
            "from": signer.as_str(),
            "to": self.address.to_checksum(None),
            "data": encode_data(&call.abi_encode()),
            "gas": quantity(self.gas_limit),
        }]);

        let value = self.provider.request("eth_sendTransaction", params).await?;
        let hash = value
            .as_str()
            .ok_or_else(|| ChainError::Decode(format!("transaction hash, got {value}")))?;
        info!(tx_hash = hash, "greeting submitted");
        Ok(TxHash(hash.to_owned()))
    }

    async fn await_mined(&self, tx_hash: &TxHash) -> Result<TxReceipt, ChainError> {
        loop {
            let value = match self
                .provider
                .request("eth_getTransactionReceipt", json!([tx_hash.0]))
                .await
            {
                Ok(value) => value,
                // Still pending as far as we know; only a receipt settles it.
                Err(ChainError::Transport(err)) => {
                    warn!(%tx_hash, "receipt lookup failed, retrying: {err}");
                    self.timer.sleep(self.receipt_poll_interval).await;
                    continue;
                }
                Err(err) => return Err(err),
            };
            if value.is_null() {
                self.timer.sleep(self.receipt_poll_interval).await;
                continue;
            }

            let receipt: RpcReceipt = serde_json::from_value(value)?;
            let gas_used = parse_quantity(&receipt.gas_used)?;
            let block_number = receipt
                .block_number
                .as_deref()
                .map(parse_quantity)
                .transpose()?
                .unwrap_or_default();
            // Pre-Byzantium receipts carry no status; treat them as success.
            let succeeded = match receipt.status.as_deref() {
                Some(status) => parse_quantity(status)? == 1,
                None => true,
            };

            if succeeded {
                info!(tx_hash = %tx_hash, block_number, "greeting mined");
                return Ok(TxReceipt {
                    tx_hash: tx_hash.clone(),
                    block_number,
                    gas_used,
                });
            }
            if gas_used >= self.gas_limit {
                return Err(ChainError::OutOfGas(format!(
                    "{tx_hash} used its whole gas limit of {}",
                    self.gas_limit
                )));
            }
            return Err(ChainError::Execution(format!("{tx_hash} reverted")));
        }
    }

    fn subscribe_new_greetings(&self, callback: GreetingCallback) -> Subscription {
        self.hub.subscribe(callback)
    }

    async fn poll_new_greetings(&self) -> Result<usize, ChainError> {
        if self.hub.listener_count() == 0 {
            self.cursor.set(None);
            return Ok(0);
        }

        let latest = self.block_number().await?;
        let Some(from_block) = self.cursor.get() else {
            self.cursor.set(Some(latest + 1));
            debug!(from_block = latest + 1, "NewGm cursor pinned");
            return Ok(0);
        };
        if latest < from_block {
            return Ok(0);
        }

        let filter = json!([{
            "address": self.address.to_checksum(None),
            "topics": [encode_data(IGmPortal::NewGm::SIGNATURE_HASH.as_slice())],
            "fromBlock": quantity(from_block),
            "toBlock": quantity(latest),
        }]);
        let logs: Vec<RpcLog> = serde_json::from_value(self.provider.request("eth_getLogs", filter).await?)?;
        self.cursor.set(Some(latest + 1));

        let mut dispatched = 0;
        for log in logs {
            if log.removed {
                continue;
            }
            match self.decode_log(log) {
                Ok(event) => {
                    self.hub.emit(&event);
                    dispatched += 1;
                }
                Err(err) => warn!("skipping undecodable NewGm log: {err}"),
            }
        }
        Ok(dispatched)
    }

    fn has_subscribers(&self) -> bool {
        self.hub.listener_count() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;
    use gm_api_types::GM_PORTAL_ADDRESS;
    use gm_chain_client::mock::MockWalletProvider;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct CountingTimer {
        sleeps: Cell<usize>,
    }

    #[async_trait(?Send)]
    impl Timer for CountingTimer {
        async fn sleep(&self, _duration: Duration) {
            self.sleeps.set(self.sleeps.get() + 1);
        }
    }

    const ALICE: &str = "0x00000000000000000000000000000000000000A1";
    const BOB: &str = "0x00000000000000000000000000000000000000b2";

    fn contract(provider: Rc<MockWalletProvider>) -> GmPortalContract<Rc<MockWalletProvider>, CountingTimer> {
        GmPortalContract::new(Some(provider), CountingTimer::default(), GM_PORTAL_ADDRESS).unwrap()
    }

    fn gm(sender: &str, seconds: u64, message: &str) -> IGmPortal::Gm {
        IGmPortal::Gm {
            gmer: Address::from_str(sender).unwrap(),
            message: message.to_owned(),
            timestamp: U256::from(seconds),
        }
    }

    fn new_gm_log(sender: &str, seconds: u64, message: &str) -> Value {
        let event = IGmPortal::NewGm {
            from: Address::from_str(sender).unwrap(),
            timestamp: U256::from(seconds),
            message: message.to_owned(),
        };
        let log = event.encode_log_data();
        json!({
            "topics": log.topics().iter().map(|t| encode_data(t.as_slice())).collect::<Vec<_>>(),
            "data": encode_data(&log.data),
            "removed": false,
        })
    }

    #[test]
    fn construction_requires_a_provider() {
        let err = GmPortalContract::<Rc<MockWalletProvider>, _>::new(
            None,
            CountingTimer::default(),
            GM_PORTAL_ADDRESS,
        )
        .err();
        assert_eq!(err, Some(ChainError::NoProviderFound));
    }

    #[test]
    fn construction_rejects_bad_addresses() {
        let provider = Rc::new(MockWalletProvider::new());
        let err = GmPortalContract::new(Some(provider), CountingTimer::default(), "0x1234").err();
        assert!(matches!(err, Some(ChainError::Decode(_))));
    }

    #[tokio::test]
    async fn fetch_decodes_contract_order() -> anyhow::Result<()> {
        let provider = Rc::new(MockWalletProvider::new());
        let output = IGmPortal::getAllGmsCall::abi_encode_returns(&(vec![
            gm(ALICE, 1_000, "hi"),
            gm(BOB, 2_000, "yo"),
        ],));
        provider.respond("eth_blockNumber", Ok(json!("0x10")));
        provider.respond("eth_call", Ok(json!(encode_data(&output))));

        let records = contract(provider.clone()).fetch_all_greetings().await?;

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].message, "hi");
        assert_eq!(records[0].timestamp_epoch_ms, 1_000_000);
        assert_eq!(records[1].message, "yo");
        assert_eq!(records[1].timestamp_epoch_ms, 2_000_000);
        assert!(records[1].sender.as_str().eq_ignore_ascii_case(BOB));

        let (_, params) = provider
            .calls()
            .into_iter()
            .find(|(method, _)| method == "eth_call")
            .unwrap();
        assert_eq!(
            params[0]["data"],
            json!(encode_data(&IGmPortal::getAllGmsCall::SELECTOR))
        );
        assert_eq!(params[1], json!("0x10"));
        Ok(())
    }

    #[tokio::test]
    async fn fetch_skips_greetings_with_unrepresentable_timestamps() -> anyhow::Result<()> {
        let provider = Rc::new(MockWalletProvider::new());
        let mut oversized = gm(BOB, 0, "yo");
        oversized.timestamp = U256::MAX;
        let output = IGmPortal::getAllGmsCall::abi_encode_returns(&(vec![
            gm(ALICE, 1_000, "hi"),
            oversized,
            gm(BOB, 3_000, "sup"),
        ],));
        provider.respond("eth_blockNumber", Ok(json!("0x1")));
        provider.respond("eth_call", Ok(json!(encode_data(&output))));

        let records = contract(provider).fetch_all_greetings().await?;

        let messages: Vec<_> = records.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, vec!["hi", "sup"]);
        assert_eq!(records[0].timestamp_epoch_ms, 1_000_000);
        Ok(())
    }

    #[tokio::test]
    async fn first_poll_after_fetch_resumes_from_the_read_block() -> anyhow::Result<()> {
        let provider = Rc::new(MockWalletProvider::new());
        let output = IGmPortal::getAllGmsCall::abi_encode_returns(&(vec![gm(ALICE, 1_000, "hi")],));
        provider.respond_once("eth_blockNumber", Ok(json!("0x10")));
        provider.respond_once("eth_blockNumber", Ok(json!("0x12")));
        provider.respond("eth_call", Ok(json!(encode_data(&output))));
        provider.respond("eth_getLogs", Ok(json!([new_gm_log(BOB, 1_001, "in between")])));
        let gateway = contract(provider.clone());

        gateway.fetch_all_greetings().await?;
        let count = Rc::new(Cell::new(0));
        let counter = count.clone();
        let _subscription =
            gateway.subscribe_new_greetings(Box::new(move |_| counter.set(counter.get() + 1)));

        assert_eq!(gateway.poll_new_greetings().await?, 1);
        assert_eq!(count.get(), 1);
        let (_, filter) = provider
            .calls()
            .into_iter()
            .find(|(method, _)| method == "eth_getLogs")
            .unwrap();
        assert_eq!(filter[0]["fromBlock"], json!("0x11"));
        assert_eq!(filter[0]["toBlock"], json!("0x12"));
        Ok(())
    }

    #[tokio::test]
    async fn fetch_surfaces_transport_errors() {
        let provider = Rc::new(MockWalletProvider::new());
        provider.respond("eth_blockNumber", Ok(json!("0x1")));
        provider.respond("eth_call", Err(ChainError::Transport("offline".to_owned())));

        let err = contract(provider).fetch_all_greetings().await.unwrap_err();
        assert_eq!(err, ChainError::Transport("offline".to_owned()));
    }

    #[tokio::test]
    async fn submit_sends_gm_with_gas_ceiling() -> anyhow::Result<()> {
        let provider = Rc::new(MockWalletProvider::new());
        provider.respond("eth_sendTransaction", Ok(json!("0xfeed")));

        let tx = contract(provider.clone())
            .submit_greeting(&WalletAddress(ALICE.to_owned()), "gm \u{1F60A}")
            .await?;
        assert_eq!(tx, TxHash("0xfeed".to_owned()));

        let (_, params) = &provider.calls()[0];
        assert_eq!(params[0]["from"], json!(ALICE));
        assert_eq!(params[0]["gas"], json!("0x493e0"));
        let data = decode_data(&params[0]["data"])?;
        let call = IGmPortal::gmCall::abi_decode(&data, true)?;
        assert_eq!(call.message, "gm \u{1F60A}");
        Ok(())
    }

    #[tokio::test]
    async fn submit_propagates_user_rejection() {
        let provider = Rc::new(MockWalletProvider::new());
        provider.respond("eth_sendTransaction", Err(ChainError::UserRejected));

        let err = contract(provider)
            .submit_greeting(&WalletAddress(ALICE.to_owned()), "gm ")
            .await
            .unwrap_err();
        assert_eq!(err, ChainError::UserRejected);
    }

    #[tokio::test]
    async fn await_mined_polls_until_receipt() -> anyhow::Result<()> {
        let provider = Rc::new(MockWalletProvider::new());
        provider.respond_once("eth_getTransactionReceipt", Ok(Value::Null));
        provider.respond_once("eth_getTransactionReceipt", Ok(Value::Null));
        provider.respond(
            "eth_getTransactionReceipt",
            Ok(json!({ "status": "0x1", "blockNumber": "0x10", "gasUsed": "0x5208" })),
        );
        let gateway = contract(provider.clone());

        let receipt = gateway.await_mined(&TxHash("0xfeed".to_owned())).await?;

        assert_eq!(receipt.block_number, 16);
        assert_eq!(receipt.gas_used, 21_000);
        assert_eq!(gateway.timer.sleeps.get(), 2);
        assert_eq!(provider.call_count("eth_getTransactionReceipt"), 3);
        Ok(())
    }

    #[tokio::test]
    async fn await_mined_retries_through_transport_errors() -> anyhow::Result<()> {
        let provider = Rc::new(MockWalletProvider::new());
        provider.respond_once("eth_getTransactionReceipt", Ok(Value::Null));
        provider.respond_once(
            "eth_getTransactionReceipt",
            Err(ChainError::Transport("timeout".to_owned())),
        );
        provider.respond(
            "eth_getTransactionReceipt",
            Ok(json!({ "status": "0x1", "blockNumber": "0x10", "gasUsed": "0x5208" })),
        );
        let gateway = contract(provider.clone());

        let receipt = gateway.await_mined(&TxHash("0xfeed".to_owned())).await?;

        assert_eq!(receipt.block_number, 16);
        assert_eq!(gateway.timer.sleeps.get(), 2);
        assert_eq!(provider.call_count("eth_getTransactionReceipt"), 3);
        Ok(())
    }

    #[tokio::test]
    async fn await_mined_stops_on_non_transport_errors() {
        let provider = Rc::new(MockWalletProvider::new());
        provider.respond("eth_getTransactionReceipt", Err(ChainError::UserRejected));

        let err = contract(provider)
            .await_mined(&TxHash("0xfeed".to_owned()))
            .await
            .unwrap_err();
        assert_eq!(err, ChainError::UserRejected);
    }

    #[tokio::test]
    async fn await_mined_classifies_failed_receipts() {
        let provider = Rc::new(MockWalletProvider::new());
        provider.respond_once(
            "eth_getTransactionReceipt",
            Ok(json!({ "status": "0x0", "blockNumber": "0x10", "gasUsed": "0x493e0" })),
        );
        provider.respond_once(
            "eth_getTransactionReceipt",
            Ok(json!({ "status": "0x0", "blockNumber": "0x11", "gasUsed": "0x6000" })),
        );
        let gateway = contract(provider);
        let tx = TxHash("0xfeed".to_owned());

        assert!(matches!(gateway.await_mined(&tx).await, Err(ChainError::OutOfGas(_))));
        assert!(matches!(gateway.await_mined(&tx).await, Err(ChainError::Execution(_))));
    }

    #[tokio::test]
    async fn poll_is_idle_without_subscribers() -> anyhow::Result<()> {
        let provider = Rc::new(MockWalletProvider::new());
        let gateway = contract(provider.clone());

        assert_eq!(gateway.poll_new_greetings().await?, 0);
        assert!(provider.calls().is_empty());
        assert!(!gateway.has_subscribers());
        Ok(())
    }

    #[tokio::test]
    async fn poll_dispatches_new_logs_after_pinning_cursor() -> anyhow::Result<()> {
        let provider = Rc::new(MockWalletProvider::new());
        provider.respond_once("eth_blockNumber", Ok(json!("0x10")));
        provider.respond_once("eth_blockNumber", Ok(json!("0x12")));
        provider.respond(
            "eth_getLogs",
            Ok(json!([new_gm_log(ALICE, 1_700_000_000, "gm"), new_gm_log(BOB, 1_700_000_001, "gm!")])),
        );
        let gateway = contract(provider.clone());

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let subscription = gateway.subscribe_new_greetings(Box::new(move |event| {
            sink.borrow_mut().push(event.clone());
        }));

        assert_eq!(gateway.poll_new_greetings().await?, 0);
        assert_eq!(gateway.poll_new_greetings().await?, 2);

        let seen = seen.borrow().clone();
        assert_eq!(seen[0].timestamp, "1700000000");
        assert_eq!(seen[1].message, "gm!");

        let (_, filter) = provider
            .calls()
            .into_iter()
            .find(|(method, _)| method == "eth_getLogs")
            .unwrap();
        assert_eq!(filter[0]["fromBlock"], json!("0x11"));
        assert_eq!(filter[0]["toBlock"], json!("0x12"));
        assert_eq!(
            filter[0]["topics"][0],
            json!(encode_data(IGmPortal::NewGm::SIGNATURE_HASH.as_slice()))
        );

        subscription.close();
        assert!(!gateway.has_subscribers());
        Ok(())
    }

    #[tokio::test]
    async fn poll_skips_undecodable_and_removed_logs() -> anyhow::Result<()> {
        let provider = Rc::new(MockWalletProvider::new());
        provider.respond_once("eth_blockNumber", Ok(json!("0x1")));
        provider.respond_once("eth_blockNumber", Ok(json!("0x2")));
        let mut removed = new_gm_log(ALICE, 5, "reorged");
        removed["removed"] = json!(true);
        provider.respond(
            "eth_getLogs",
            Ok(json!([
                { "topics": ["0x00"], "data": "0x" },
                removed,
                new_gm_log(BOB, 6, "kept"),
            ])),
        );
        let gateway = contract(provider);
        let count = Rc::new(Cell::new(0));
        let counter = count.clone();
        let _subscription =
            gateway.subscribe_new_greetings(Box::new(move |_| counter.set(counter.get() + 1)));

        gateway.poll_new_greetings().await?;
        assert_eq!(gateway.poll_new_greetings().await?, 1);
        assert_eq!(count.get(), 1);
        Ok(())
    }
}
