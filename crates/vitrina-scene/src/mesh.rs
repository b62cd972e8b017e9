//! Model geometry uploaded to the GPU

use bytemuck::{Pod, Zeroable};
use tracing::debug;
use wgpu::util::DeviceExt;

use vitrina_core::{ModelRoot, Primitive};

use crate::uniforms::DrawUniforms;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl Vertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Interleave a primitive's attributes
pub fn interleave(primitive: &Primitive) -> Vec<Vertex> {
    primitive
        .positions
        .iter()
        .zip(&primitive.normals)
        .map(|(&position, &normal)| Vertex { position, normal })
        .collect()
}

struct GpuDraw {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_count: u32,
    uniforms: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

/// GPU buffers for one model root
pub struct GpuModel {
    draws: Vec<GpuDraw>,
}

impl GpuModel {
    /// Upload every draw item of `model`; `generation` ties the buffers to a model slot state
    pub fn upload(
        device: &wgpu::Device,
        draw_layout: &wgpu::BindGroupLayout,
        model: &ModelRoot,
        generation: u64,
    ) -> Self {
        let mut draws = Vec::new();
        for item in model.draws() {
            if item.primitive.indices.is_empty() {
                continue;
            }
            let vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Model Vertices"),
                contents: bytemuck::cast_slice(&interleave(item.primitive)),
                usage: wgpu::BufferUsages::VERTEX,
            });
            let indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Model Indices"),
                contents: bytemuck::cast_slice(&item.primitive.indices),
                usage: wgpu::BufferUsages::INDEX,
            });
            let uniforms = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Draw Uniforms"),
                contents: bytemuck::cast_slice(&[DrawUniforms::new(item.world, item.base_color)]),
                usage: wgpu::BufferUsages::UNIFORM,
            });
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Draw Bind Group"),
                layout: draw_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniforms.as_entire_binding(),
                }],
            });
            draws.push(GpuDraw {
                vertices,
                indices,
                index_count: item.primitive.indices.len() as u32,
                uniforms,
                bind_group,
            });
        }
        debug!("Uploaded {} draws for model generation {}", draws.len(), generation);
        Self { draws }
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        for draw in &self.draws {
            pass.set_bind_group(1, &draw.bind_group, &[]);
            pass.set_vertex_buffer(0, draw.vertices.slice(..));
            pass.set_index_buffer(draw.indices.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..draw.index_count, 0, 0..1);
        }
    }

    /// Free the buffers now instead of whenever the handles drop
    pub fn destroy(self) {
        for draw in self.draws {
            draw.vertices.destroy();
            draw.indices.destroy();
            draw.uniforms.destroy();
        }
    }
}
