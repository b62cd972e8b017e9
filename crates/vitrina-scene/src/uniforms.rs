//! GPU-side uniform layouts
//!
//! Field order and padding mirror the structs in `shader.wgsl`.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use vitrina_core::SceneState;

/// Directional lights beyond this count are not shaded
pub const MAX_DIRECTIONAL_LIGHTS: usize = 4;

/// Per-frame camera and lighting
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FrameUniforms {
    pub view_proj: [[f32; 4]; 4],
    /// Linear ambient radiance in xyz
    pub ambient: [f32; 4],
    /// Unit vectors towards each light in xyz
    pub light_dirs: [[f32; 4]; MAX_DIRECTIONAL_LIGHTS],
    pub light_colors: [[f32; 4]; MAX_DIRECTIONAL_LIGHTS],
    /// x = number of lights in use
    pub light_count: [u32; 4],
}

impl FrameUniforms {
    pub fn from_scene(scene: &SceneState) -> Self {
        let mut uniforms = Self::zeroed();
        uniforms.view_proj = scene.camera.view_projection().to_cols_array_2d();
        uniforms.ambient = scene.ambient().extend(0.0).to_array();

        let mut count = 0;
        for (direction, radiance) in scene.directional().take(MAX_DIRECTIONAL_LIGHTS) {
            uniforms.light_dirs[count] = direction.extend(0.0).to_array();
            uniforms.light_colors[count] = radiance.extend(0.0).to_array();
            count += 1;
        }
        uniforms.light_count[0] = count as u32;
        uniforms
    }
}

/// Directional lights in `scene` that [`FrameUniforms`] has no room for
pub fn unshaded_lights(scene: &SceneState) -> usize {
    scene.directional().count().saturating_sub(MAX_DIRECTIONAL_LIGHTS)
}

/// Per-draw transform and material
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct DrawUniforms {
    pub model: [[f32; 4]; 4],
    /// Inverse transpose of `model`, for normals
    pub normal: [[f32; 4]; 4],
    pub base_color: [f32; 4],
}

impl DrawUniforms {
    pub fn new(world: Mat4, base_color: [f32; 4]) -> Self {
        let normal = if world.determinant().abs() > f32::EPSILON {
            world.inverse().transpose()
        } else {
            Mat4::IDENTITY
        };
        Self {
            model: world.to_cols_array_2d(),
            normal: normal.to_cols_array_2d(),
            base_color,
        }
    }
}
