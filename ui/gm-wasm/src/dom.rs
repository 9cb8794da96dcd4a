//! DOM element bindings.
//!
//! All fields are resolved once at startup. Ids match `index.html`.

use gm_api_types::Emoji;
use wasm_bindgen::prelude::*;
use web_sys::{Document, Element, HtmlElement};

pub fn document() -> Result<Document, JsValue> {
    web_sys::window()
        .and_then(|window| window.document())
        .ok_or_else(|| JsValue::from_str("no document"))
}

pub fn window() -> Result<web_sys::Window, JsValue> {
    web_sys::window().ok_or_else(|| JsValue::from_str("no window"))
}

pub fn create_element(tag: &str) -> Result<Element, JsValue> {
    document()?.create_element(tag)
}

pub fn set_text(el: &Element, text: &str) {
    el.set_text_content(Some(text));
}

pub fn set_hidden(el: &Element, hidden: bool) {
    let _ = el.class_list().toggle_with_force("hidden", hidden);
}

pub fn toggle_class(el: &Element, cls: &str, force: bool) {
    let _ = el.class_list().toggle_with_force(cls, force);
}

/// All DOM element references used by the portal page.
/// Clone-friendly (all inner types are reference-counted via JS GC).
#[derive(Clone)]
pub struct Elements {
    pub status: Element,
    pub connect_btn: HtmlElement,
    pub gm_btn: HtmlElement,
    pub emoji_picker: Element,
    /// One button per [`Emoji::PALETTE`] entry, same order.
    pub emoji_btns: Vec<HtmlElement>,
    pub total: Element,
    pub feed: Element,
}

fn by_id(doc: &Document, id: &str) -> Result<Element, JsValue> {
    doc.get_element_by_id(id)
        .ok_or_else(|| JsValue::from_str(&format!("missing element #{id}")))
}

fn by_id_typed<T: JsCast>(doc: &Document, id: &str) -> Result<T, JsValue> {
    by_id(doc, id)?
        .dyn_into::<T>()
        .map_err(|_| JsValue::from_str(&format!("unexpected element type for #{id}")))
}

impl Elements {
    pub fn bind() -> Result<Self, JsValue> {
        let doc = document()?;
        let emoji_picker = by_id(&doc, "emojiPicker")?;

        let mut emoji_btns = Vec::with_capacity(Emoji::PALETTE.len());
        for emoji in Emoji::PALETTE {
            let btn: HtmlElement = doc.create_element("button")?.dyn_into()?;
            btn.set_class_name("emoji");
            btn.set_text_content(Some(emoji.as_str()));
            emoji_picker.append_child(&btn)?;
            emoji_btns.push(btn);
        }

        Ok(Self {
            status: by_id(&doc, "status")?,
            connect_btn: by_id_typed(&doc, "connectWallet")?,
            gm_btn: by_id_typed(&doc, "gmButton")?,
            emoji_picker,
            emoji_btns,
            total: by_id(&doc, "totalGms")?,
            feed: by_id(&doc, "feed")?,
        })
    }
}
