//! The page's portal.
//!
//! Uses `RefCell`-wrapped `thread_local!` storage (WASM is single-threaded).
//! Event handlers fetch the portal from here instead of capturing it.

use gm_chain_evm::GmPortalContract;
use gm_portal_core::Portal;
use std::cell::RefCell;
use std::rc::Rc;

use crate::injected::InjectedProvider;
use crate::timer::GlooTimer;

pub type SharedProvider = Rc<InjectedProvider>;
pub type WebPortal = Portal<SharedProvider, GmPortalContract<SharedProvider, GlooTimer>>;

thread_local! {
    static PORTAL: RefCell<Option<Rc<WebPortal>>> = const { RefCell::new(None) };
}

pub fn install(portal: Rc<WebPortal>) {
    PORTAL.with(|slot| *slot.borrow_mut() = Some(portal));
}

/// `None` before `start` has run, or after the page was hidden.
pub fn portal() -> Option<Rc<WebPortal>> {
    PORTAL.with(|slot| slot.borrow().clone())
}

pub fn take() -> Option<Rc<WebPortal>> {
    PORTAL.with(|slot| slot.borrow_mut().take())
}
