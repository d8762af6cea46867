//! Browser host: Blob, object URL and a hidden anchor on `document.body`.

use anyhow::Context;
use blobdrop_core::{Host, HostError, HostStep};
use tracing::warn;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Blob, BlobPropertyBag, Document, HtmlAnchorElement, HtmlElement, Url};

/// The page's document, body and URL registry.
pub struct WebHost {
    document: Document,
    body: HtmlElement,
}

impl WebHost {
    /// Bind to the global window. Fails outside a page with a body (workers, early scripts).
    pub fn from_window() -> anyhow::Result<Self> {
        let window = web_sys::window().context("no global window")?;
        let document = window.document().context("window has no document")?;
        let body = document.body().context("document has no body")?;
        Ok(Self { document, body })
    }
}

/// Best-effort text of a thrown JS value.
fn js_message(value: &JsValue) -> String {
    if let Some(s) = value.as_string() {
        return s;
    }
    if let Some(err) = value.dyn_ref::<js_sys::Error>() {
        return String::from(err.message());
    }
    format!("{value:?}")
}

fn failed(step: HostStep) -> impl FnOnce(JsValue) -> HostError {
    move |e| HostError::new(step, js_message(&e))
}

impl Host for WebHost {
    type Blob = Blob;
    type Anchor = HtmlAnchorElement;

    fn create_blob(&self, bytes: Vec<u8>, content_type: &str) -> Result<Blob, HostError> {
        // Uint8Array::from copies into JS memory; nothing aliases wasm memory afterwards.
        let parts = js_sys::Array::of1(&js_sys::Uint8Array::from(bytes.as_slice()));
        let options = BlobPropertyBag::new();
        options.set_type(content_type);
        Blob::new_with_u8_array_sequence_and_options(&parts, &options)
            .map_err(failed(HostStep::CreateBlob))
    }

    fn create_object_url(&self, blob: &Blob) -> Result<String, HostError> {
        Url::create_object_url_with_blob(blob).map_err(failed(HostStep::CreateObjectUrl))
    }

    fn revoke_object_url(&self, url: &str) {
        if let Err(e) = Url::revoke_object_url(url) {
            warn!(url, error = %js_message(&e), "revoke failed");
        }
    }

    fn create_anchor(&self, href: &str, download_name: &str) -> Result<HtmlAnchorElement, HostError> {
        let anchor = self
            .document
            .create_element("a")
            .map_err(failed(HostStep::CreateAnchor))?
            .dyn_into::<HtmlAnchorElement>()
            .map_err(|_| HostError::new(HostStep::CreateAnchor, "element is not an anchor"))?;
        anchor.set_href(href);
        anchor.set_download(download_name);
        anchor.set_hidden(true);
        Ok(anchor)
    }

    fn attach(&self, anchor: &HtmlAnchorElement) -> Result<(), HostError> {
        self.body
            .append_child(anchor)
            .map(|_| ())
            .map_err(failed(HostStep::Attach))
    }

    fn activate(&self, anchor: &HtmlAnchorElement) -> Result<(), HostError> {
        anchor.click();
        Ok(())
    }

    fn detach(&self, anchor: &HtmlAnchorElement) {
        if let Err(e) = self.body.remove_child(anchor) {
            warn!(error = %js_message(&e), "detach failed");
        }
    }
}
