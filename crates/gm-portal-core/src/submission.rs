use gm_api_types::{Emoji, TxHash, WalletAddress, compose_message};
use gm_chain_client::{ChainError, GreetingGateway, TxReceipt};
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    #[default]
    Idle,
    Mining,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    #[error("a greeting is already being mined")]
    Busy,
    #[error("connect a wallet before saying gm")]
    NotConnected,
    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Idle/Mining machine around a single `gm` write.
///
/// There is no timeout: a transaction that never confirms keeps the flow in
/// `Mining`.
#[derive(Default)]
pub struct SubmissionFlow {
    state: Cell<SubmissionState>,
    emoji: Cell<Emoji>,
    pending: RefCell<Option<TxHash>>,
    on_change: RefCell<Option<Rc<dyn Fn(SubmissionState)>>>,
}

impl SubmissionFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SubmissionState {
        self.state.get()
    }

    pub fn is_mining(&self) -> bool {
        self.state.get() == SubmissionState::Mining
    }

    pub fn pending_tx(&self) -> Option<TxHash> {
        self.pending.borrow().clone()
    }

    pub fn emoji(&self) -> Emoji {
        self.emoji.get()
    }

    pub fn select_emoji(&self, emoji: Emoji) {
        self.emoji.set(emoji);
    }

    pub fn compose_message(&self) -> String {
        compose_message(self.emoji.get())
    }

    pub fn on_change<F>(&self, listener: F)
    where
        F: Fn(SubmissionState) + 'static,
    {
        *self.on_change.borrow_mut() = Some(Rc::new(listener));
    }

    fn transition(&self, state: SubmissionState) {
        self.state.set(state);
        let listener = self.on_change.borrow().clone();
        if let Some(listener) = listener {
            listener(state);
        }
    }

    /// Sends `message` and waits for it to be mined.
    ///
    /// A write rejected before acceptance leaves the flow `Idle`. Once
    /// accepted the flow is `Mining` until the receipt resolves either way.
    pub async fn submit<G>(
        &self,
        gateway: &G,
        signer: &WalletAddress,
        message: &str,
    ) -> Result<TxReceipt, SubmissionError>
    where
        G: GreetingGateway + ?Sized,
    {
        if self.is_mining() {
            return Err(SubmissionError::Busy);
        }

        let tx_hash = gateway.submit_greeting(signer, message).await?;
        *self.pending.borrow_mut() = Some(tx_hash.clone());
        info!(%tx_hash, "mining...");
        self.transition(SubmissionState::Mining);

        let mined = gateway.await_mined(&tx_hash).await;

        self.pending.borrow_mut().take();
        self.transition(SubmissionState::Idle);
        let receipt = mined?;
        info!(%tx_hash, "mined");
        Ok(receipt)
    }
}
