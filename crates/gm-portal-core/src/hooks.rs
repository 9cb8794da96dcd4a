use gm_chain_client::ChainError;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortalOperation {
    CheckAuthorization,
    Connect,
    FetchGreetings,
    Submit,
    PollEvents,
    DecodeEvent,
}

impl fmt::Display for PortalOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PortalOperation::CheckAuthorization => "check_authorization",
            PortalOperation::Connect => "connect",
            PortalOperation::FetchGreetings => "fetch_greetings",
            PortalOperation::Submit => "submit",
            PortalOperation::PollEvents => "poll_events",
            PortalOperation::DecodeEvent => "decode_event",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation} failed: {error}")]
pub struct PortalError {
    pub operation: PortalOperation,
    pub error: ChainError,
}

type ErrorObserver = Rc<dyn Fn(&PortalError)>;

/// Where caught failures go. Every failure is logged; observers are an
/// opt-in for hosts that want to surface them.
#[derive(Clone, Default)]
pub struct ErrorHook {
    observers: Rc<RefCell<Vec<ErrorObserver>>>,
}

impl ErrorHook {
    pub fn observe<F>(&self, observer: F)
    where
        F: Fn(&PortalError) + 'static,
    {
        self.observers.borrow_mut().push(Rc::new(observer));
    }

    pub fn report(&self, operation: PortalOperation, error: ChainError) {
        let error = PortalError { operation, error };
        warn!(%operation, "{error}");

        let observers = self.observers.borrow().clone();
        for observer in observers {
            observer(&error);
        }
    }
}

/// Fired whenever the emitted UI state may have changed.
#[derive(Clone, Default)]
pub struct UpdateHook {
    listeners: Rc<RefCell<Vec<Rc<dyn Fn()>>>>,
}

impl UpdateHook {
    pub fn observe<F>(&self, listener: F)
    where
        F: Fn() + 'static,
    {
        self.listeners.borrow_mut().push(Rc::new(listener));
    }

    pub fn notify(&self) {
        let listeners = self.listeners.borrow().clone();
        for listener in listeners {
            listener();
        }
    }
}
