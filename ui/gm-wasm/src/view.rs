//! Renders a [`PortalSnapshot`] into the bound elements.

use gm_api_types::{Emoji, GreetingRecord};
use gm_portal_core::PortalSnapshot;
use wasm_bindgen::prelude::*;

use crate::dom::{self, Elements};

pub fn render(els: &Elements, snapshot: &PortalSnapshot) -> Result<(), JsValue> {
    dom::set_text(&els.status, snapshot.status_line());
    dom::set_hidden(&els.connect_btn, !snapshot.show_connect_button());

    let controls = snapshot.show_submit_controls();
    dom::set_hidden(&els.gm_btn, !controls);
    dom::set_hidden(&els.emoji_picker, !controls);
    dom::set_text(&els.gm_btn, &snapshot.gm_button_label());
    for (btn, emoji) in els.emoji_btns.iter().zip(Emoji::PALETTE) {
        dom::toggle_class(btn, "selected", emoji == snapshot.emoji);
    }

    match snapshot.total_greetings() {
        Some(total) => {
            dom::set_text(&els.total, &format!("Total gms: {total}"));
            dom::set_hidden(&els.total, false);
        }
        None => dom::set_hidden(&els.total, true),
    }

    render_feed(els, &snapshot.greetings)
}

fn render_feed(els: &Elements, greetings: &[GreetingRecord]) -> Result<(), JsValue> {
    els.feed.set_inner_html("");
    for greeting in greetings {
        let card = card(greeting)?;
        els.feed.append_child(&card)?;
    }
    Ok(())
}

fn card(greeting: &GreetingRecord) -> Result<web_sys::Element, JsValue> {
    let card = dom::create_element("div")?;
    card.set_class_name("gm-card");

    let time = js_sys::Date::new(&JsValue::from_f64(greeting.timestamp_epoch_ms as f64));
    let time: String = time.to_string().into();
    for line in [
        format!("Address: {}", greeting.sender),
        format!("Time: {time}"),
        format!("Message: {}", greeting.message),
    ] {
        let row = dom::create_element("div")?;
        dom::set_text(&row, &line);
        card.append_child(&row)?;
    }
    Ok(card)
}
