use gm_api_types::RawGreeting;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use tracing::debug;

pub type GreetingCallback = Box<dyn FnMut(&RawGreeting)>;

#[derive(Default)]
struct HubInner {
    next_id: u64,
    live: usize,
    listeners: Vec<(u64, GreetingCallback)>,
    // Ids closed while their callback was checked out by `emit`.
    closed: Vec<u64>,
    depth: usize,
}

/// Fan-out point for `NewGm` events.
///
/// Callbacks may subscribe or close subscriptions while an event is being
/// dispatched; a subscription closed mid-dispatch is skipped for the rest of
/// that dispatch.
#[derive(Clone, Default)]
pub struct EventHub {
    inner: Rc<RefCell<HubInner>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, callback: GreetingCallback) -> Subscription {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.live += 1;
        inner.listeners.push((id, callback));
        debug!(subscription = id, "greeting subscription opened");

        Subscription {
            hub: Rc::downgrade(&self.inner),
            id,
            open: true,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.borrow().live
    }

    /// Delivers `event` to every open subscription, in subscription order.
    pub fn emit(&self, event: &RawGreeting) -> usize {
        let mut active = {
            let mut inner = self.inner.borrow_mut();
            inner.depth += 1;
            std::mem::take(&mut inner.listeners)
        };

        let mut delivered = 0;
        for (id, callback) in active.iter_mut() {
            if self.inner.borrow().closed.contains(id) {
                continue;
            }
            callback(event);
            delivered += 1;
        }

        let mut inner = self.inner.borrow_mut();
        inner.depth -= 1;
        active.retain(|(id, _)| !inner.closed.contains(id));
        if inner.depth == 0 {
            inner.closed.clear();
        }
        let added = std::mem::take(&mut inner.listeners);
        active.extend(added);
        inner.listeners = active;

        delivered
    }
}

/// Owned registration on an [`EventHub`]. Closing (or dropping) it
/// guarantees the callback is never invoked again.
pub struct Subscription {
    hub: Weak<RefCell<HubInner>>,
    id: u64,
    open: bool,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;

        let Some(hub) = self.hub.upgrade() else {
            return;
        };
        let mut inner = hub.borrow_mut();
        inner.live = inner.live.saturating_sub(1);
        let before = inner.listeners.len();
        let id = self.id;
        inner.listeners.retain(|(listener, _)| *listener != id);
        if inner.listeners.len() == before {
            inner.closed.push(id);
        }
        debug!(subscription = id, "greeting subscription closed");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}
