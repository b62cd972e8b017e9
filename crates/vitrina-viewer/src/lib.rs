//! Vitrina Viewer - Browser entry point
//!
//! Mounts a viewer into a host page element:
//!
//! ```js
//! const handle = await mount(document.getElementById("jar"), "/models/jar.glb");
//! // later, when the element goes away
//! handle?.dispose();
//! ```

pub mod input;

#[cfg(target_arch = "wasm32")]
mod fetch;
#[cfg(target_arch = "wasm32")]
mod host;

#[cfg(target_arch = "wasm32")]
pub use web::*;

#[cfg(target_arch = "wasm32")]
mod web {
    use std::cell::RefCell;
    use std::rc::Rc;

    use tracing::{info, warn};
    use wasm_bindgen::prelude::*;
    use web_sys::HtmlElement;

    use vitrina_core::{Viewer, ViewerConfig};

    use crate::host::{ViewerSlot, WebHost};

    /// WASM entry point
    #[wasm_bindgen(start)]
    pub fn main() {
        // Set up panic hook for better error messages
        console_error_panic_hook::set_once();

        // Keep wgpu's per-frame chatter out of the console
        tracing_wasm::set_as_global_default_with_config(
            tracing_wasm::WASMLayerConfigBuilder::new()
                .set_max_level(tracing::Level::INFO)
                .build(),
        );
    }

    /// Mount a viewer into `container` and start loading `asset_url`
    ///
    /// `options` is an optional JSON viewer config. Resolves to `undefined`
    /// when the container is detached or has no area.
    #[wasm_bindgen]
    pub async fn mount(
        container: HtmlElement,
        asset_url: String,
        options: Option<String>,
    ) -> Result<Option<ViewerHandle>, JsValue> {
        let config = match options.as_deref().map(str::trim) {
            Some(json) if !json.is_empty() => {
                ViewerConfig::from_json_str(json).map_err(|e| JsValue::from_str(&e.to_string()))?
            }
            _ => ViewerConfig::default(),
        };
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("No window"))?;

        let slot: ViewerSlot = Rc::new(RefCell::new(None));
        let host = WebHost::new(window, container, Rc::downgrade(&slot));
        match Viewer::mount(host, &asset_url, config).await {
            Ok(viewer) => {
                *slot.borrow_mut() = Some(viewer);
                Ok(Some(ViewerHandle { slot }))
            }
            Err(e) if e.is_precondition() => {
                warn!("Not mounting viewer: {}", e);
                Ok(None)
            }
            Err(e) => Err(JsValue::from_str(&e.to_string())),
        }
    }

    /// Handle returned by [`mount`]; dropping it on the JS side (`free()`) also disposes
    #[wasm_bindgen]
    pub struct ViewerHandle {
        slot: ViewerSlot,
    }

    #[wasm_bindgen]
    impl ViewerHandle {
        /// Tear the viewer down; false if it already was
        pub fn dispose(&self) -> bool {
            let viewer = match self.slot.try_borrow_mut() {
                Ok(mut slot) => slot.take(),
                Err(_) => {
                    warn!("dispose called while the viewer is busy");
                    return false;
                }
            };
            match viewer {
                Some(mut viewer) => {
                    let disposed = viewer.dispose();
                    info!("Viewer handle disposed");
                    disposed
                }
                None => false,
            }
        }

        /// Replace the displayed asset
        pub fn load(&self, url: String) -> bool {
            match self.slot.try_borrow_mut() {
                Ok(mut slot) => slot.as_mut().is_some_and(|viewer| viewer.load(&url)),
                Err(_) => false,
            }
        }

        #[wasm_bindgen(js_name = isLive)]
        pub fn is_live(&self) -> bool {
            self.slot
                .try_borrow()
                .map(|slot| slot.as_ref().is_some_and(|viewer| viewer.is_live()))
                .unwrap_or(false)
        }

        /// Current load phase as `{ state, url, loaded, total, reason }`
        #[wasm_bindgen(js_name = loadStatus)]
        pub fn load_status(&self) -> JsValue {
            let Ok(slot) = self.slot.try_borrow() else {
                return JsValue::UNDEFINED;
            };
            let Some(viewer) = slot.as_ref() else {
                return JsValue::UNDEFINED;
            };
            serde_json::to_string(viewer.load_phase())
                .ok()
                .and_then(|json| js_sys::JSON::parse(&json).ok())
                .unwrap_or(JsValue::UNDEFINED)
        }
    }
}
