//! The explicit context object every host drives: it owns the account,
//! the feed, the submission flow and the event subscription.

use gm_api_types::{Emoji, GreetingRecord, RawGreeting, WalletAddress};
use gm_chain_client::{ChainError, GreetingGateway, Subscription, Timer, TxReceipt, WalletProvider};
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::{debug, info, warn};

use crate::bridge::{AuthorizationStatus, WalletBridge};
use crate::config::PortalConfig;
use crate::feed::GreetingFeed;
use crate::hooks::{ErrorHook, PortalOperation, UpdateHook};
use crate::submission::{SubmissionError, SubmissionFlow};

pub const CONNECT_PROMPT: &str =
    "Connect your wallet and press the gm button for a chance to win some ETH!";
pub const CONNECTED_PROMPT: &str = "Wallet connected! Say GM!";
pub const MINING_PROMPT: &str = "Mining...";

/// Everything the view renders, copied out of the portal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortalSnapshot {
    pub provider_present: bool,
    pub account: Option<WalletAddress>,
    pub greetings: Vec<GreetingRecord>,
    pub mining: bool,
    pub emoji: Emoji,
}

impl PortalSnapshot {
    pub fn status_line(&self) -> &'static str {
        if self.mining {
            MINING_PROMPT
        } else if self.account.is_some() {
            CONNECTED_PROMPT
        } else {
            CONNECT_PROMPT
        }
    }

    pub fn show_submit_controls(&self) -> bool {
        !self.mining
    }

    pub fn show_connect_button(&self) -> bool {
        self.account.is_none()
    }

    pub fn gm_button_label(&self) -> String {
        format!("GM {}", self.emoji.as_str())
    }

    /// Only known once greetings have been loaded.
    pub fn total_greetings(&self) -> Option<usize> {
        (!self.greetings.is_empty()).then_some(self.greetings.len())
    }
}

pub struct Portal<P, G> {
    config: PortalConfig,
    bridge: WalletBridge<P>,
    gateway: Option<Rc<G>>,
    account: RefCell<Option<WalletAddress>>,
    feed: Rc<RefCell<GreetingFeed>>,
    submission: SubmissionFlow,
    subscription: RefCell<Option<Subscription>>,
    synced: Cell<bool>,
    torn_down: Cell<bool>,
    pumping: Cell<bool>,
    errors: ErrorHook,
    updates: UpdateHook,
}

impl<P, G> Portal<P, G>
where
    P: WalletProvider,
    G: GreetingGateway + 'static,
{
    /// `gateway` is `None` when no wallet provider was found; the portal then
    /// stays disconnected and read-only.
    pub fn new(config: PortalConfig, provider: Option<P>, gateway: Option<G>) -> Self {
        let feed = GreetingFeed::new(config.feed_policy);
        let updates = UpdateHook::default();
        let submission = SubmissionFlow::new();
        {
            let updates = updates.clone();
            submission.on_change(move |_| updates.notify());
        }

        Self {
            config,
            bridge: WalletBridge::new(provider),
            gateway: gateway.map(Rc::new),
            account: RefCell::new(None),
            feed: Rc::new(RefCell::new(feed)),
            submission,
            subscription: RefCell::new(None),
            synced: Cell::new(false),
            torn_down: Cell::new(false),
            pumping: Cell::new(false),
            errors: ErrorHook::default(),
            updates,
        }
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    pub fn errors(&self) -> &ErrorHook {
        &self.errors
    }

    pub fn updates(&self) -> &UpdateHook {
        &self.updates
    }

    pub fn account(&self) -> Option<WalletAddress> {
        self.account.borrow().clone()
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.borrow().is_some()
    }

    pub fn select_emoji(&self, emoji: Emoji) {
        self.submission.select_emoji(emoji);
        self.updates.notify();
    }

    pub fn snapshot(&self) -> PortalSnapshot {
        PortalSnapshot {
            provider_present: self.bridge.has_provider(),
            account: self.account(),
            greetings: self.feed.borrow().records().to_vec(),
            mining: self.submission.is_mining(),
            emoji: self.submission.emoji(),
        }
    }

    fn set_account(&self, account: WalletAddress) {
        *self.account.borrow_mut() = Some(account);
        self.updates.notify();
    }

    /// Page-load sequence: silent authorization check, then fetch and
    /// subscribe if an account is already authorized.
    pub async fn mount(&self) -> AuthorizationStatus {
        let status = match self.bridge.detect_and_check_authorization().await {
            Ok(status) => status,
            Err(err) => {
                self.errors.report(PortalOperation::CheckAuthorization, err);
                AuthorizationStatus::NoneAuthorized
            }
        };

        if let AuthorizationStatus::Authorized(account) = &status {
            self.set_account(account.clone());
            self.sync().await;
        }
        status
    }

    /// User-initiated connect. On failure the account stays absent and
    /// nothing is fetched.
    pub async fn connect(&self) -> Result<WalletAddress, ChainError> {
        match self.bridge.request_authorization().await {
            Ok(account) => {
                self.set_account(account.clone());
                self.sync().await;
                Ok(account)
            }
            Err(err) => {
                self.errors.report(PortalOperation::Connect, err.clone());
                Err(err)
            }
        }
    }

    /// Full fetch into the feed, then the `NewGm` subscription. Runs at most
    /// once per portal.
    pub async fn sync(&self) {
        let Some(gateway) = self.gateway.clone() else {
            debug!("no gateway, skipping sync");
            return;
        };
        if self.synced.replace(true) {
            return;
        }

        let records = match gateway.fetch_all_greetings().await {
            Ok(records) => records,
            Err(err) => {
                self.errors.report(PortalOperation::FetchGreetings, err);
                Vec::new()
            }
        };
        info!(count = records.len(), "feed seeded");
        self.feed.borrow_mut().seed(records);
        self.updates.notify();

        if self.torn_down.get() {
            return;
        }

        let feed = self.feed.clone();
        let updates = self.updates.clone();
        let errors = self.errors.clone();
        let subscription = gateway.subscribe_new_greetings(Box::new(move |event: &RawGreeting| {
            debug!(sender = %event.sender, timestamp = %event.timestamp, "NewGm");
            match event.clone().into_record() {
                Ok(record) => {
                    let appended = feed.borrow_mut().append(record);
                    if appended {
                        updates.notify();
                    }
                }
                Err(err) => errors.report(PortalOperation::DecodeEvent, err.into()),
            }
        }));
        *self.subscription.borrow_mut() = Some(subscription);
    }

    /// Says gm with the selected emoji from the connected account.
    pub async fn submit(&self) -> Result<TxReceipt, SubmissionError> {
        let result = self.try_submit().await;
        if let Err(err) = &result {
            match err {
                SubmissionError::Chain(chain) => {
                    self.errors.report(PortalOperation::Submit, chain.clone())
                }
                other => warn!("submit refused: {other}"),
            }
        }
        result
    }

    async fn try_submit(&self) -> Result<TxReceipt, SubmissionError> {
        let gateway = self
            .gateway
            .clone()
            .ok_or(SubmissionError::Chain(ChainError::NoProviderFound))?;
        let account = self.account().ok_or(SubmissionError::NotConnected)?;
        let message = self.submission.compose_message();

        self.submission.submit(gateway.as_ref(), &account, &message).await
    }

    /// Drives the event subscription until every subscription is closed.
    /// A second concurrent call returns immediately.
    pub async fn pump_events<T: Timer>(&self, timer: &T) {
        let Some(gateway) = self.gateway.clone() else {
            return;
        };
        if self.pumping.replace(true) {
            return;
        }

        while gateway.has_subscribers() {
            if let Err(err) = gateway.poll_new_greetings().await {
                self.errors.report(PortalOperation::PollEvents, err);
            }
            if !gateway.has_subscribers() {
                break;
            }
            timer.sleep(self.config.event_poll_interval).await;
        }

        self.pumping.set(false);
        debug!("event pump stopped");
    }

    /// Closes the event subscription. Safe to call more than once.
    pub fn teardown(&self) {
        self.torn_down.set(true);
        let subscription = self.subscription.borrow_mut().take();
        if let Some(subscription) = subscription {
            subscription.close();
            info!("portal torn down");
        }
    }
}
