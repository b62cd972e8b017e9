//! Vitrina Scene - GPU drawing surface
//!
//! Implements [`vitrina_core::DrawingSurface`] on top of wgpu. Runs on WebGPU
//! or WebGL2 in the browser and on any native backend wgpu supports.

pub mod mesh;
pub mod surface;
pub mod uniforms;

pub use mesh::{GpuModel, Vertex};
pub use surface::{GpuError, GpuSurface};
pub use uniforms::{unshaded_lights, DrawUniforms, FrameUniforms, MAX_DIRECTIONAL_LIGHTS};
