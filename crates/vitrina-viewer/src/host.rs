//! Browser host: DOM container, animation frames, and event listeners

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use tracing::{debug, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{AddEventListenerOptions, Event, EventTarget, HtmlCanvasElement, HtmlElement, PointerEvent, WheelEvent, Window};

use vitrina_core::{
    DrawingSurface, FrameHandle, Host, ListenerId, LoadSink, RendererConfig, SceneState, Viewer, ViewerError,
    ViewportSize,
};
use vitrina_scene::GpuSurface;

use crate::input::{translate_pointer, translate_wheel, DomPointer, PointerPhase, POINTER_EVENTS};

/// Where the mounted viewer lives; callbacks only hold a weak reference
pub type ViewerSlot = Rc<RefCell<Option<Viewer<WebHost>>>>;
type WeakSlot = Weak<RefCell<Option<Viewer<WebHost>>>>;

/// Run `f` against the viewer if it is still mounted and not already borrowed
fn with_viewer(slot: &WeakSlot, f: impl FnOnce(&mut Viewer<WebHost>)) {
    let Some(slot) = slot.upgrade() else {
        return;
    };
    let Ok(mut guard) = slot.try_borrow_mut() else {
        debug!("Viewer busy, dropping callback");
        return;
    };
    if let Some(viewer) = guard.as_mut() {
        f(viewer);
    }
}

/// Canvas plus the GPU surface drawing into it
pub struct WebSurface {
    canvas: HtmlCanvasElement,
    gpu: GpuSurface,
}

impl DrawingSurface for WebSurface {
    fn raster_size(&self) -> ViewportSize {
        self.gpu.raster_size()
    }

    fn set_raster_size(&mut self, size: ViewportSize) {
        self.canvas.set_width(size.width);
        self.canvas.set_height(size.height);
        self.gpu.set_raster_size(size);
    }

    fn render(&mut self, scene: &SceneState) -> Result<(), ViewerError> {
        self.gpu.render(scene)
    }

    fn release(&mut self) {
        self.gpu.release();
    }
}

struct Binding {
    target: EventTarget,
    event: &'static str,
    callback: Closure<dyn FnMut(Event)>,
}

impl Binding {
    fn remove(self) {
        if let Err(e) = self
            .target
            .remove_event_listener_with_callback(self.event, self.callback.as_ref().unchecked_ref())
        {
            warn!("Failed to remove {} listener: {:?}", self.event, e);
        }
    }
}

pub struct WebHost {
    window: Window,
    container: HtmlElement,
    slot: WeakSlot,
    listeners: HashMap<ListenerId, Vec<Binding>>,
    next_listener: u64,
    frame_callback: Option<Closure<dyn FnMut(f64)>>,
}

impl WebHost {
    pub fn new(window: Window, container: HtmlElement, slot: WeakSlot) -> Self {
        Self {
            window,
            container,
            slot,
            listeners: HashMap::new(),
            next_listener: 0,
            frame_callback: None,
        }
    }

    fn bind(
        &self,
        target: &EventTarget,
        event: &'static str,
        passive: bool,
        callback: impl FnMut(Event) + 'static,
    ) -> Result<Binding, ViewerError> {
        let callback = Closure::<dyn FnMut(Event)>::new(callback);
        let options = AddEventListenerOptions::new();
        options.set_passive(passive);
        target
            .add_event_listener_with_callback_and_add_event_listener_options(
                event,
                callback.as_ref().unchecked_ref(),
                &options,
            )
            .map_err(|e| ViewerError::Listener {
                kind: event,
                reason: format!("{:?}", e),
            })?;
        Ok(Binding {
            target: target.clone(),
            event,
            callback,
        })
    }

    fn register(&mut self, bindings: Vec<Binding>) -> ListenerId {
        self.next_listener += 1;
        let id = ListenerId(self.next_listener);
        self.listeners.insert(id, bindings);
        id
    }

    fn unregister(&mut self, id: ListenerId) {
        match self.listeners.remove(&id) {
            Some(bindings) => bindings.into_iter().for_each(Binding::remove),
            None => warn!("Unknown listener {:?}", id),
        }
    }

    fn bind_input(&self, canvas: &HtmlCanvasElement) -> Result<Vec<Binding>, ViewerError> {
        let target: &EventTarget = canvas.as_ref();
        let mut bindings = Vec::new();

        for event in POINTER_EVENTS {
            let slot = self.slot.clone();
            let canvas = canvas.clone();
            let binding = self.bind(target, event, true, move |event: Event| {
                let Some(event) = event.dyn_ref::<PointerEvent>() else {
                    return;
                };
                let Some(phase) = PointerPhase::from_event_type(&event.type_()) else {
                    return;
                };
                if phase == PointerPhase::Down {
                    // Keep receiving moves when the drag leaves the canvas
                    let _ = canvas.set_pointer_capture(event.pointer_id());
                }
                let pointer_type = event.pointer_type();
                let pointer = DomPointer {
                    phase,
                    pointer_id: event.pointer_id(),
                    pointer_type: &pointer_type,
                    button: event.button(),
                    offset_x: event.offset_x() as f64,
                    offset_y: event.offset_y() as f64,
                    modifier: event.ctrl_key() || event.meta_key() || event.shift_key(),
                };
                if let Some(input) = translate_pointer(&pointer) {
                    with_viewer(&slot, |viewer| {
                        viewer.handle_input(input);
                    });
                }
            });
            // Undo earlier bindings if one fails
            match binding {
                Ok(binding) => bindings.push(binding),
                Err(e) => {
                    bindings.into_iter().for_each(Binding::remove);
                    return Err(e);
                }
            }
        }

        let slot = self.slot.clone();
        let wheel_canvas = canvas.clone();
        let wheel = self.bind(target, "wheel", false, move |event: Event| {
            let Some(event) = event.dyn_ref::<WheelEvent>() else {
                return;
            };
            event.prevent_default();
            // Page-mode deltas scale with the canvas height at the time of the event
            let page_height = wheel_canvas.client_height() as f32;
            if let Some(input) = translate_wheel(event.delta_y(), event.delta_mode(), page_height) {
                with_viewer(&slot, |viewer| {
                    viewer.handle_input(input);
                });
            }
        });
        let menu = wheel.and_then(|wheel| {
            bindings.push(wheel);
            // Right-drag pans instead of opening the menu
            self.bind(target, "contextmenu", false, |event: Event| event.prevent_default())
        });
        match menu {
            Ok(menu) => bindings.push(menu),
            Err(e) => {
                bindings.into_iter().for_each(Binding::remove);
                return Err(e);
            }
        }
        Ok(bindings)
    }
}

impl Host for WebHost {
    type Surface = WebSurface;

    fn is_attached(&self) -> bool {
        self.container.is_connected()
    }

    fn viewport_size(&self) -> ViewportSize {
        ViewportSize::from_client(self.container.client_width() as f64, self.container.client_height() as f64)
    }

    async fn create_surface(&mut self, size: ViewportSize, config: &RendererConfig) -> Result<WebSurface, ViewerError> {
        let document = self
            .window
            .document()
            .ok_or_else(|| ViewerError::Surface("no document".to_string()))?;
        let canvas: HtmlCanvasElement = document
            .create_element("canvas")
            .map_err(|e| ViewerError::Surface(format!("{:?}", e)))?
            .dyn_into()
            .map_err(|_| ViewerError::Surface("canvas cast failed".to_string()))?;
        canvas.set_width(size.width);
        canvas.set_height(size.height);
        let style = canvas.style();
        for (property, value) in [("display", "block"), ("width", "100%"), ("height", "100%"), ("touch-action", "none")] {
            let _ = style.set_property(property, value);
        }

        let gpu = GpuSurface::new(wgpu::SurfaceTarget::Canvas(canvas.clone()), size, config).await?;
        Ok(WebSurface { canvas, gpu })
    }

    fn attach_surface(&mut self, surface: &WebSurface) -> Result<(), ViewerError> {
        self.container
            .append_child(&surface.canvas)
            .map(|_| ())
            .map_err(|e| ViewerError::Surface(format!("Failed to attach canvas: {:?}", e)))
    }

    fn detach_surface(&mut self, surface: &WebSurface) {
        surface.canvas.remove();
    }

    fn listen_resize(&mut self) -> Result<ListenerId, ViewerError> {
        let slot = self.slot.clone();
        let binding = self.bind(self.window.as_ref(), "resize", true, move |_| {
            with_viewer(&slot, |viewer| {
                viewer.handle_resize();
            });
        })?;
        Ok(self.register(vec![binding]))
    }

    fn unlisten_resize(&mut self, id: ListenerId) {
        self.unregister(id);
    }

    fn listen_input(&mut self, surface: &WebSurface) -> Result<ListenerId, ViewerError> {
        let bindings = self.bind_input(&surface.canvas)?;
        Ok(self.register(bindings))
    }

    fn unlisten_input(&mut self, id: ListenerId) {
        self.unregister(id);
    }

    fn request_frame(&mut self) -> FrameHandle {
        let slot = self.slot.clone();
        let callback = self.frame_callback.get_or_insert_with(|| {
            Closure::<dyn FnMut(f64)>::new(move |_timestamp: f64| {
                with_viewer(&slot, |viewer| {
                    viewer.tick();
                });
            })
        });
        match self.window.request_animation_frame(callback.as_ref().unchecked_ref()) {
            Ok(id) => FrameHandle(id),
            Err(e) => {
                warn!("requestAnimationFrame failed: {:?}", e);
                FrameHandle(0)
            }
        }
    }

    fn cancel_frame(&mut self, frame: FrameHandle) {
        if let Err(e) = self.window.cancel_animation_frame(frame.0) {
            warn!("cancelAnimationFrame failed: {:?}", e);
        }
    }

    fn fetch_asset(&mut self, url: &str, sink: LoadSink) {
        wasm_bindgen_futures::spawn_local(crate::fetch::fetch_into(url.to_string(), sink));
    }
}
