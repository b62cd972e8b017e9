//! Vitrina Core - Scene lifecycle for a single-asset 3D viewer
//!
//! This crate holds everything that does not touch the GPU or the DOM:
//! - Viewer configuration with defaults, read from TOML or JSON
//! - Camera, lights, and the single-model scene state
//! - Orbit controls with damping and distance clamping
//! - glTF parsing and the cancellable asset loader
//! - The render loop, resize adapter, and ordered teardown
//!
//! Rendering and browser integration plug in through the
//! [`lifecycle::Host`] and [`lifecycle::DrawingSurface`] traits.

pub mod asset;
pub mod camera;
pub mod config;
pub mod controls;
pub mod error;
pub mod lifecycle;
pub mod loader;
pub mod render_loop;
pub mod resize;
pub mod scene;
pub mod viewport;

pub use asset::{Aabb, DrawItem, Material, Mesh, ModelNode, ModelRoot, Primitive};
pub use camera::PerspectiveCamera;
pub use config::{CameraConfig, ControlsConfig, LightConfig, ModelConfig, RendererConfig, Rgb, ViewerConfig};
pub use controls::{OrbitControls, PointerButton, PointerInput, PointerKind};
pub use error::{ConfigError, LoadError, ViewerError};
pub use lifecycle::{DrawingSurface, Host, ListenerId, ResourceSet, Viewer};
pub use loader::{AssetLoader, LoadObserver, LoadPhase, LoadResult, LoadSink, TracingObserver};
pub use render_loop::{FrameHandle, Liveness, RenderLoop};
pub use resize::ResizeAdapter;
pub use scene::{Light, ModelSlot, SceneState};
pub use viewport::ViewportSize;
