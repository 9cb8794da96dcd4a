//! Event binding.
//!
//! Handlers look the portal up in [`state`] and spawn their async work via
//! `wasm_bindgen_futures::spawn_local`.

use gm_api_types::Emoji;
use tracing::{debug, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

use crate::dom::{self, Elements};
use crate::state;
use crate::timer::GlooTimer;

/// Helper: attach a click handler and leak the closure for the page's lifetime.
macro_rules! on_click {
    ($el:expr, $cb:expr) => {{
        let cb = Closure::wrap(Box::new($cb) as Box<dyn FnMut(web_sys::MouseEvent)>);
        $el.add_event_listener_with_callback("click", cb.as_ref().unchecked_ref())?;
        cb.forget();
    }};
}

/// Bind all UI event listeners. Call once after init.
pub fn bind_events(els: &Elements) -> Result<(), JsValue> {
    on_click!(els.connect_btn, move |_: web_sys::MouseEvent| {
        wasm_bindgen_futures::spawn_local(on_connect());
    });

    on_click!(els.gm_btn, move |_: web_sys::MouseEvent| {
        wasm_bindgen_futures::spawn_local(on_say_gm());
    });

    for (btn, emoji) in els.emoji_btns.iter().zip(Emoji::PALETTE) {
        on_click!(btn, move |_: web_sys::MouseEvent| {
            if let Some(portal) = state::portal() {
                portal.select_emoji(emoji);
            }
        });
    }

    let on_hide = Closure::wrap(Box::new(move |event: web_sys::PageTransitionEvent| {
        if !releases_portal(event.persisted()) {
            debug!("page kept in the back/forward cache");
            return;
        }
        if let Some(portal) = state::take() {
            portal.teardown();
        }
    }) as Box<dyn FnMut(_)>);
    dom::window()?.add_event_listener_with_callback("pagehide", on_hide.as_ref().unchecked_ref())?;
    on_hide.forget();

    Ok(())
}

/// A `pagehide` into the back/forward cache keeps the page alive for a
/// later restore, so the portal must survive it.
fn releases_portal(persisted: bool) -> bool {
    !persisted
}

/// Keeps the `NewGm` subscription fed. A no-op while nothing is subscribed
/// or when a pump is already running.
pub fn start_event_pump() {
    let Some(portal) = state::portal() else {
        return;
    };
    wasm_bindgen_futures::spawn_local(async move {
        portal.pump_events(&GlooTimer).await;
    });
}

async fn on_connect() {
    let Some(portal) = state::portal() else {
        return;
    };
    if !portal.snapshot().provider_present {
        if let Ok(window) = dom::window() {
            let _ = window.alert_with_message("Get MetaMask!");
        }
        return;
    }

    if portal.connect().await.is_ok() {
        start_event_pump();
    }
}

async fn on_say_gm() {
    let Some(portal) = state::portal() else {
        return;
    };
    match portal.submit().await {
        Ok(receipt) => debug!(block = receipt.block_number, "gm mined"),
        Err(err) => warn!("gm not sent: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_a_final_pagehide_releases_the_portal() {
        assert!(releases_portal(false));
        assert!(!releases_portal(true));
    }
}
