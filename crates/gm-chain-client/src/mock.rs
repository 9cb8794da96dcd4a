//! Scripted in-memory doubles for the provider and gateway seams.

use crate::{
    ChainError, EventHub, GreetingCallback, GreetingGateway, Subscription, TxReceipt,
    WalletProvider,
};
use async_trait::async_trait;
use futures::channel::oneshot;
use gm_api_types::{GreetingRecord, RawGreeting, TxHash, WalletAddress};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};

/// EIP-1193 provider answering from a script of canned responses.
///
/// One-shot responses are consumed first, then the standing response for
/// the method. Unscripted methods fail with a transport error.
#[derive(Default)]
pub struct MockWalletProvider {
    once: RefCell<HashMap<String, VecDeque<Result<Value, ChainError>>>>,
    standing: RefCell<HashMap<String, Result<Value, ChainError>>>,
    calls: RefCell<Vec<(String, Value)>>,
}

impl MockWalletProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider whose `eth_accounts` already lists `accounts`.
    pub fn with_accounts(accounts: &[&str]) -> Self {
        let provider = Self::new();
        provider.respond("eth_accounts", Ok(Value::from(accounts.to_vec())));
        provider
    }

    pub fn respond(&self, method: &str, result: Result<Value, ChainError>) {
        self.standing.borrow_mut().insert(method.to_owned(), result);
    }

    pub fn respond_once(&self, method: &str, result: Result<Value, ChainError>) {
        self.once
            .borrow_mut()
            .entry(method.to_owned())
            .or_default()
            .push_back(result);
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.calls.borrow().iter().filter(|(m, _)| m == method).count()
    }
}

#[async_trait(?Send)]
impl WalletProvider for MockWalletProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        self.calls.borrow_mut().push((method.to_owned(), params));

        if let Some(result) = self
            .once
            .borrow_mut()
            .get_mut(method)
            .and_then(VecDeque::pop_front)
        {
            return result;
        }

        self.standing
            .borrow()
            .get(method)
            .cloned()
            .unwrap_or_else(|| Err(ChainError::Transport(format!("unscripted method {method}"))))
    }
}

/// Gateway double holding the contract's greetings in memory.
#[derive(Default)]
pub struct MockGreetingGateway {
    greetings: RefCell<Vec<RawGreeting>>,
    fetch_error: RefCell<Option<ChainError>>,
    fetch_calls: Cell<usize>,
    submit_results: RefCell<VecDeque<Result<TxHash, ChainError>>>,
    mined_results: RefCell<VecDeque<Result<TxReceipt, ChainError>>>,
    mined_gate: RefCell<Option<oneshot::Receiver<()>>>,
    submitted: RefCell<Vec<(WalletAddress, String)>>,
    pending_events: RefCell<VecDeque<RawGreeting>>,
    hub: EventHub,
}

impl MockGreetingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_greetings(greetings: Vec<RawGreeting>) -> Self {
        let gateway = Self::new();
        *gateway.greetings.borrow_mut() = greetings;
        gateway
    }

    pub fn fail_fetch(&self, err: ChainError) {
        *self.fetch_error.borrow_mut() = Some(err);
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.get()
    }

    pub fn push_submit_result(&self, result: Result<TxHash, ChainError>) {
        self.submit_results.borrow_mut().push_back(result);
    }

    pub fn push_mined_result(&self, result: Result<TxReceipt, ChainError>) {
        self.mined_results.borrow_mut().push_back(result);
    }

    /// Makes the next `await_mined` suspend until the returned sender fires.
    pub fn hold_mining(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.mined_gate.borrow_mut() = Some(rx);
        tx
    }

    pub fn submitted(&self) -> Vec<(WalletAddress, String)> {
        self.submitted.borrow().clone()
    }

    /// Dispatches a synthetic `NewGm` event immediately.
    pub fn emit(&self, event: RawGreeting) -> usize {
        self.hub.emit(&event)
    }

    /// Queues an event for the next `poll_new_greetings`.
    pub fn queue_event(&self, event: RawGreeting) {
        self.pending_events.borrow_mut().push_back(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.hub.listener_count()
    }
}

#[async_trait(?Send)]
impl GreetingGateway for MockGreetingGateway {
    async fn fetch_all_greetings(&self) -> Result<Vec<GreetingRecord>, ChainError> {
        self.fetch_calls.set(self.fetch_calls.get() + 1);
        if let Some(err) = self.fetch_error.borrow().clone() {
            return Err(err);
        }

        let raw = self.greetings.borrow().clone();
        raw.into_iter()
            .map(|greeting| greeting.into_record().map_err(ChainError::from))
            .collect()
    }

    async fn submit_greeting(&self, signer: &WalletAddress, message: &str) -> Result<TxHash, ChainError> {
        self.submitted
            .borrow_mut()
            .push((signer.clone(), message.to_owned()));
        self.submit_results
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok(TxHash(format!("0x{:064x}", self.submitted.borrow().len()))))
    }

    async fn await_mined(&self, tx_hash: &TxHash) -> Result<TxReceipt, ChainError> {
        let gate = self.mined_gate.borrow_mut().take();
        if let Some(gate) = gate {
            gate.await
                .map_err(|_| ChainError::Transport("mining gate dropped".to_owned()))?;
        }

        self.mined_results.borrow_mut().pop_front().unwrap_or_else(|| {
            Ok(TxReceipt {
                tx_hash: tx_hash.clone(),
                block_number: 1,
                gas_used: 21_000,
            })
        })
    }

    fn subscribe_new_greetings(&self, callback: GreetingCallback) -> Subscription {
        self.hub.subscribe(callback)
    }

    async fn poll_new_greetings(&self) -> Result<usize, ChainError> {
        let events: Vec<RawGreeting> = self.pending_events.borrow_mut().drain(..).collect();
        let mut dispatched = 0;
        for event in &events {
            self.hub.emit(event);
            dispatched += 1;
        }
        Ok(dispatched)
    }

    fn has_subscribers(&self) -> bool {
        self.hub.listener_count() > 0
    }
}
