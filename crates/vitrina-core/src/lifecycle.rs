//! Viewer lifecycle: mount, per-frame tick, and ordered teardown
//!
//! The [`Host`] trait is the seam to the embedding environment (the browser in
//! `vitrina-viewer`, a scripted mock in tests). A [`Viewer`] owns every
//! resource it acquires through the host in a [`ResourceSet`] and gives each
//! one back exactly once, in a fixed order:
//!
//! 1. resize listener
//! 2. pending frame
//! 3. drawing surface detached from the viewport
//! 4. input listeners
//! 5. GPU resources of the drawing surface
//!
//! The same order is used by [`Viewer::dispose`], by `Drop`, and when a mount
//! fails part-way through.

use tracing::{debug, info, warn};

use crate::config::{RendererConfig, ViewerConfig};
use crate::controls::{OrbitControls, PointerInput};
use crate::error::ViewerError;
use crate::loader::{AssetLoader, LoadObserver, LoadPhase, LoadResult, LoadSink, TracingObserver};
use crate::render_loop::{FrameHandle, Liveness, RenderLoop};
use crate::resize::ResizeAdapter;
use crate::scene::SceneState;
use crate::viewport::ViewportSize;

/// Host-issued id of a registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Something a scene can be drawn onto
pub trait DrawingSurface {
    fn raster_size(&self) -> ViewportSize;
    fn set_raster_size(&mut self, size: ViewportSize);
    fn render(&mut self, scene: &SceneState) -> Result<(), ViewerError>;
    /// Free GPU-backed resources; the surface is not rendered to afterwards
    fn release(&mut self);
}

/// The embedding environment a viewer is mounted into
#[allow(async_fn_in_trait)]
pub trait Host {
    type Surface: DrawingSurface;

    /// Whether the mounting region is part of a displayed document
    fn is_attached(&self) -> bool;
    fn viewport_size(&self) -> ViewportSize;

    async fn create_surface(
        &mut self,
        size: ViewportSize,
        config: &RendererConfig,
    ) -> Result<Self::Surface, ViewerError>;
    fn attach_surface(&mut self, surface: &Self::Surface) -> Result<(), ViewerError>;
    fn detach_surface(&mut self, surface: &Self::Surface);

    fn listen_resize(&mut self) -> Result<ListenerId, ViewerError>;
    fn unlisten_resize(&mut self, id: ListenerId);
    /// Route pointer and wheel events on the surface to the viewer
    fn listen_input(&mut self, surface: &Self::Surface) -> Result<ListenerId, ViewerError>;
    fn unlisten_input(&mut self, id: ListenerId);

    fn request_frame(&mut self) -> FrameHandle;
    fn cancel_frame(&mut self, frame: FrameHandle);

    /// Start fetching `url` in the background, reporting through `sink`
    fn fetch_asset(&mut self, url: &str, sink: LoadSink);
}

/// Everything a mounted viewer must give back to its host
#[derive(Debug)]
pub struct ResourceSet<S> {
    resize_listener: Option<ListenerId>,
    render_loop: RenderLoop,
    attached: bool,
    input_listener: Option<ListenerId>,
    surface: Option<S>,
}

impl<S: DrawingSurface> ResourceSet<S> {
    pub fn new(render_loop: RenderLoop) -> Self {
        Self {
            resize_listener: None,
            render_loop,
            attached: false,
            input_listener: None,
            surface: None,
        }
    }

    pub fn surface(&self) -> Option<&S> {
        self.surface.as_ref()
    }

    pub fn render_loop(&self) -> &RenderLoop {
        &self.render_loop
    }

    /// True once nothing is left to give back
    pub fn is_released(&self) -> bool {
        self.resize_listener.is_none()
            && self.render_loop.pending().is_none()
            && !self.attached
            && self.input_listener.is_none()
            && self.surface.is_none()
    }

    /// Give every held resource back to the host, in teardown order
    pub fn release<H: Host<Surface = S>>(&mut self, host: &mut H) {
        if let Some(id) = self.resize_listener.take() {
            host.unlisten_resize(id);
        }
        if let Some(frame) = self.render_loop.stop() {
            host.cancel_frame(frame);
        }
        if std::mem::take(&mut self.attached) {
            if let Some(surface) = &self.surface {
                host.detach_surface(surface);
            }
        }
        if let Some(id) = self.input_listener.take() {
            host.unlisten_input(id);
        }
        if let Some(mut surface) = self.surface.take() {
            surface.release();
        }
    }
}

/// A mounted single-asset viewer
pub struct Viewer<H: Host> {
    host: H,
    scene: SceneState,
    controls: OrbitControls,
    loader: AssetLoader,
    resize: ResizeAdapter,
    resources: ResourceSet<H::Surface>,
    liveness: Liveness,
    observer: Box<dyn LoadObserver>,
}

impl<H: Host> Viewer<H> {
    /// Mount a viewer into `host` and start loading `asset_url`
    ///
    /// Fails without touching the host when the viewport is detached or has
    /// no area. A failure after that releases whatever was acquired.
    pub async fn mount(mut host: H, asset_url: &str, config: ViewerConfig) -> Result<Self, ViewerError> {
        config.validate()?;
        if !host.is_attached() {
            return Err(ViewerError::ViewportDetached);
        }
        let size = host.viewport_size();
        if !size.has_area() {
            return Err(ViewerError::EmptyViewport {
                width: size.width,
                height: size.height,
            });
        }

        let liveness = Liveness::new();
        let mut resources = ResourceSet::new(RenderLoop::new(liveness.clone()));
        let mut loader = AssetLoader::new(liveness.clone(), config.model.clone());

        if let Err(e) = Self::acquire(&mut host, &mut resources, &mut loader, size, &config, asset_url).await {
            warn!("Mount failed, releasing partial setup: {}", e);
            liveness.kill();
            loader.cancel();
            resources.release(&mut host);
            return Err(e);
        }

        info!("Viewer mounted at {} loading {}", size, asset_url);
        Ok(Self {
            host,
            scene: SceneState::new(&config, size.aspect()),
            controls: OrbitControls::new(&config.controls),
            loader,
            resize: ResizeAdapter::new(size),
            resources,
            liveness,
            observer: Box::new(TracingObserver),
        })
    }

    async fn acquire(
        host: &mut H,
        resources: &mut ResourceSet<H::Surface>,
        loader: &mut AssetLoader,
        size: ViewportSize,
        config: &ViewerConfig,
        asset_url: &str,
    ) -> Result<(), ViewerError> {
        let surface = host.create_surface(size, &config.renderer).await?;
        let surface = resources.surface.insert(surface);
        host.attach_surface(surface)?;
        resources.attached = true;
        resources.input_listener = Some(host.listen_input(surface)?);

        let frame = host.request_frame();
        resources.render_loop.schedule(frame);

        let sink = loader.begin(asset_url);
        host.fetch_asset(asset_url, sink);

        resources.resize_listener = Some(host.listen_resize()?);
        Ok(())
    }

    /// Replace the default tracing observer
    pub fn set_observer(&mut self, observer: Box<dyn LoadObserver>) {
        self.observer = observer;
    }

    /// Run one frame: reschedule, apply load results, advance controls, draw
    ///
    /// Returns false without doing anything once disposed or when no frame
    /// was pending.
    pub fn tick(&mut self) -> bool {
        if !self.liveness.is_live() || !self.resources.render_loop.begin_tick() {
            return false;
        }
        let next = self.host.request_frame();
        self.resources.render_loop.schedule(next);

        self.apply_load_results();
        self.controls.update(&mut self.scene.camera, self.resize.current());

        if let Some(surface) = self.resources.surface.as_mut() {
            if let Err(e) = surface.render(&self.scene) {
                warn!("Frame {} not rendered: {}", self.resources.render_loop.frame_count(), e);
            }
        }
        self.resources.render_loop.finish_tick();
        true
    }

    fn apply_load_results(&mut self) {
        let url = match self.loader.phase() {
            LoadPhase::Loading { url, .. } => url.clone(),
            _ => return,
        };
        for result in self.loader.drain() {
            match result {
                LoadResult::Progress { loaded, total } => self.observer.on_progress(&url, loaded, total),
                LoadResult::Success(model) => {
                    self.observer.on_loaded(&url, &model);
                    if self.scene.model.replace(model).is_some() {
                        debug!("Replaced previous model with {}", url);
                    }
                }
                LoadResult::Failure(e) => self.observer.on_error(&url, &e),
            }
        }
    }

    /// React to a viewport size change reported by the host
    pub fn handle_resize(&mut self) -> bool {
        if !self.liveness.is_live() {
            return false;
        }
        let size = self.host.viewport_size();
        match self.resources.surface.as_mut() {
            Some(surface) => self.resize.apply(size, &mut self.scene.camera, surface),
            None => false,
        }
    }

    pub fn handle_input(&mut self, input: PointerInput) -> bool {
        self.liveness.is_live() && self.controls.handle_input(input)
    }

    /// Load another asset, superseding any load in flight
    pub fn load(&mut self, url: &str) -> bool {
        if !self.liveness.is_live() {
            return false;
        }
        info!("Loading {}", url);
        let sink = self.loader.begin(url);
        self.host.fetch_asset(url, sink);
        true
    }

    /// Tear the view down; returns false if it already was
    pub fn dispose(&mut self) -> bool {
        if !self.liveness.kill() {
            return false;
        }
        self.loader.cancel();
        self.controls.dispose();
        self.resources.release(&mut self.host);
        self.scene.model.clear();
        info!(
            "Viewer disposed after {} frames",
            self.resources.render_loop.frame_count()
        );
        true
    }

    pub fn is_live(&self) -> bool {
        self.liveness.is_live()
    }

    pub fn liveness(&self) -> &Liveness {
        &self.liveness
    }

    pub fn scene(&self) -> &SceneState {
        &self.scene
    }

    pub fn controls(&self) -> &OrbitControls {
        &self.controls
    }

    pub fn surface(&self) -> Option<&H::Surface> {
        self.resources.surface()
    }

    pub fn resources(&self) -> &ResourceSet<H::Surface> {
        &self.resources
    }

    pub fn load_phase(&self) -> &LoadPhase {
        self.loader.phase()
    }

    pub fn frame_count(&self) -> u64 {
        self.resources.render_loop.frame_count()
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }
}

impl<H: Host> Drop for Viewer<H> {
    fn drop(&mut self) {
        self.dispose();
    }
}
