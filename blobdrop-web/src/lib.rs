//! Blobdrop for the browser: installs a `WebHost`-backed bridge behind `downloadFile` /
//! `_downloadFile`.

mod host;
mod log;

use std::cell::RefCell;
use std::rc::Rc;

use blobdrop_core::{BridgeConfig, DeliveryBridge, Modulation};
use tracing::{info, warn};
use wasm_bindgen::prelude::*;

pub use host::WebHost;

thread_local! {
    static BRIDGE: RefCell<Option<Rc<DeliveryBridge<WebHost>>>> = RefCell::new(None);
}

/// Parse config (TOML, optional), start console logging, and route the exported download
/// symbols to this page's document.
#[wasm_bindgen(js_name = installBlobdrop)]
pub fn install(config_toml: Option<String>) -> Result<(), JsValue> {
    install_with(config_toml.as_deref()).map_err(to_js)
}

#[wasm_bindgen(js_name = uninstallBlobdrop)]
pub fn uninstall() {
    BRIDGE.with(|b| b.borrow_mut().take());
    blobdrop_core::uninstall_sink();
}

/// Render `message` with `modulation` (`ask`, `fsk` or `psk`) and save it as `waveform.32fl`.
/// Returns the number of samples written.
#[wasm_bindgen(js_name = exportWaveform)]
pub fn export_waveform(message: &str, modulation: &str) -> Result<usize, JsValue> {
    let modulation: Modulation = modulation.parse().map_err(to_js)?;
    let bridge = BRIDGE
        .with(|b| b.borrow().clone())
        .ok_or_else(|| JsValue::from_str("blobdrop is not installed"))?;
    let params = bridge.config().waveform.clone();
    blobdrop_core::export_waveform(bridge.as_ref(), message.as_bytes(), modulation, &params)
        .map_err(to_js)
}

fn install_with(config_toml: Option<&str>) -> anyhow::Result<()> {
    let config = match config_toml {
        Some(s) => BridgeConfig::from_toml_str(s)?,
        None => BridgeConfig::default(),
    };
    if let Err(e) = log::init(&config.log_filter) {
        warn!("logging not reconfigured: {e:#}");
    }
    let host = WebHost::from_window()?;
    info!(log_filter = %config.log_filter, "installing browser delivery host");
    let bridge = Rc::new(DeliveryBridge::with_config(host, config));
    BRIDGE.with(|b| b.borrow_mut().replace(bridge.clone()));
    blobdrop_core::install_sink(bridge);
    Ok(())
}

fn to_js(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&format!("{e:#}"))
}
