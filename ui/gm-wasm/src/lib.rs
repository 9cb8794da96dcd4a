//! GM Portal WASM front-end.
//!
//! Binds the page, builds a [`Portal`](gm_portal_core::Portal) over the
//! injected wallet and re-renders whenever the portal reports a change.

pub mod dom;
pub mod events;
pub mod injected;
pub mod log;
pub mod state;
pub mod timer;
pub mod view;

use gm_chain_evm::GmPortalContract;
use gm_portal_core::{Portal, PortalConfig};
use std::rc::Rc;
use wasm_bindgen::prelude::*;

use crate::injected::InjectedProvider;
use crate::timer::GlooTimer;

/// WASM entry point, called automatically when the module is instantiated.
#[wasm_bindgen(start)]
pub async fn start() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    log::init();

    init().await
}

async fn init() -> Result<(), JsValue> {
    let els = dom::Elements::bind()?;
    let config = PortalConfig::default();

    let provider = InjectedProvider::detect().map(Rc::new);
    let gateway = match GmPortalContract::new(provider.clone(), GlooTimer, &config.contract_address) {
        Ok(contract) => Some(
            contract
                .with_gas_limit(config.gas_limit)
                .with_receipt_poll_interval(config.receipt_poll_interval),
        ),
        Err(err) => {
            tracing::info!("portal is read-only: {err}");
            None
        }
    };

    let portal = Rc::new(Portal::new(config, provider, gateway));
    {
        let els = els.clone();
        let render_target = Rc::downgrade(&portal);
        portal.updates().observe(move || {
            if let Some(portal) = render_target.upgrade() {
                if let Err(err) = view::render(&els, &portal.snapshot()) {
                    tracing::warn!("render failed: {err:?}");
                }
            }
        });
    }
    state::install(portal.clone());

    events::bind_events(&els)?;
    view::render(&els, &portal.snapshot())?;

    portal.mount().await;
    events::start_event_pump();
    Ok(())
}
