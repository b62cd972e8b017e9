//! wgpu implementation of the core drawing surface

use thiserror::Error;
use tracing::{debug, info, trace, warn};

use vitrina_core::{DrawingSurface, RendererConfig, Rgb, SceneState, ViewerError, ViewportSize};

use crate::mesh::{GpuModel, Vertex};
use crate::uniforms::{unshaded_lights, FrameUniforms, MAX_DIRECTIONAL_LIGHTS};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;
const MSAA_SAMPLES: u32 = 4;
const SHADER: &str = include_str!("shader.wgsl");

#[derive(Error, Debug)]
pub enum GpuError {
    #[error("Failed to create surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),
    #[error("No compatible graphics adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),
    #[error("Failed to create device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    #[error("Surface reports no supported formats")]
    NoSurfaceFormat,
}

impl From<GpuError> for ViewerError {
    fn from(e: GpuError) -> Self {
        ViewerError::Surface(e.to_string())
    }
}

/// Prefer an sRGB format when `srgb_output` is set, a linear one otherwise
pub fn pick_format(formats: &[wgpu::TextureFormat], srgb_output: bool) -> Option<wgpu::TextureFormat> {
    formats
        .iter()
        .copied()
        .find(|f| f.is_srgb() == srgb_output)
        .or_else(|| formats.first().copied())
}

/// Clear color for the background; sRGB targets expect linear values
pub fn clear_color(background: Rgb, srgb_output: bool) -> wgpu::Color {
    let [r, g, b] = if srgb_output {
        background.to_linear()
    } else {
        [background.r, background.g, background.b]
    };
    wgpu::Color {
        r: r as f64,
        g: g as f64,
        b: b as f64,
        a: 1.0,
    }
}

fn clamp_extent(size: ViewportSize, max: u32) -> (u32, u32) {
    (size.width.clamp(1, max), size.height.clamp(1, max))
}

struct RenderTargets {
    depth: wgpu::Texture,
    depth_view: wgpu::TextureView,
    msaa: Option<(wgpu::Texture, wgpu::TextureView)>,
}

impl RenderTargets {
    fn new(device: &wgpu::Device, config: &wgpu::SurfaceConfiguration, sample_count: u32) -> Self {
        let size = wgpu::Extent3d {
            width: config.width,
            height: config.height,
            depth_or_array_layers: 1,
        };
        let target = |label, format| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size,
                mip_level_count: 1,
                sample_count,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            })
        };

        let depth = target("Depth Target", DEPTH_FORMAT);
        let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());
        let msaa = (sample_count > 1).then(|| {
            let texture = target("MSAA Target", config.format);
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            (texture, view)
        });
        Self { depth, depth_view, msaa }
    }

    fn destroy(self) {
        self.depth.destroy();
        if let Some((texture, _)) = self.msaa {
            texture.destroy();
        }
    }
}

/// Forward renderer drawing a [`SceneState`] into a window or canvas surface
pub struct GpuSurface {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    pipeline: wgpu::RenderPipeline,
    frame_uniforms: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    draw_layout: wgpu::BindGroupLayout,
    targets: Option<RenderTargets>,
    sample_count: u32,
    clear: wgpu::Color,
    model: Option<GpuModel>,
    uploaded_generation: u64,
    raster: ViewportSize,
    /// Set once the light budget has been checked against a scene
    lights_checked: bool,
}

impl GpuSurface {
    pub async fn new(
        target: impl Into<wgpu::SurfaceTarget<'static>>,
        size: ViewportSize,
        renderer: &RendererConfig,
    ) -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance.create_surface(target)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;
        let info = adapter.get_info();
        info!("Using adapter: {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Vitrina Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits()),
                memory_hints: wgpu::MemoryHints::default(),
                trace: Default::default(),
            })
            .await?;

        let caps = surface.get_capabilities(&adapter);
        let format = pick_format(&caps.formats, renderer.srgb_output).ok_or(GpuError::NoSurfaceFormat)?;
        let sample_count = if renderer.antialias
            && adapter
                .get_texture_format_features(format)
                .flags
                .sample_count_supported(MSAA_SAMPLES)
        {
            MSAA_SAMPLES
        } else {
            1
        };

        let (width, height) = clamp_extent(size, device.limits().max_texture_dimension_2d);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width,
            height,
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: caps.alpha_modes.first().copied().unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        debug!("Surface configured {}x{} {:?}, {}x MSAA", width, height, format, sample_count);

        let frame_layout = uniform_layout(&device, "Frame Bind Group Layout");
        let draw_layout = uniform_layout(&device, "Draw Bind Group Layout");

        let frame_uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Uniforms"),
            size: std::mem::size_of::<FrameUniforms>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Frame Bind Group"),
            layout: &frame_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_uniforms.as_entire_binding(),
            }],
        });

        let pipeline = create_pipeline(&device, &[&frame_layout, &draw_layout], format, sample_count);
        let targets = RenderTargets::new(&device, &config, sample_count);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            pipeline,
            frame_uniforms,
            frame_bind_group,
            draw_layout,
            targets: Some(targets),
            sample_count,
            clear: clear_color(renderer.background, renderer.srgb_output),
            model: None,
            uploaded_generation: 0,
            raster: size,
            lights_checked: false,
        })
    }

    /// Rebuild model buffers when the scene's model slot changed
    fn sync_model(&mut self, scene: &SceneState) {
        let generation = scene.model.generation();
        if generation == self.uploaded_generation {
            return;
        }
        if let Some(previous) = self.model.take() {
            previous.destroy();
        }
        self.model = scene
            .model
            .get()
            .map(|model| GpuModel::upload(&self.device, &self.draw_layout, model, generation));
        self.uploaded_generation = generation;
    }

    fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
        if let Some(targets) = self.targets.take() {
            targets.destroy();
        }
        self.targets = Some(RenderTargets::new(&self.device, &self.config, self.sample_count));
    }
}

impl DrawingSurface for GpuSurface {
    fn raster_size(&self) -> ViewportSize {
        self.raster
    }

    fn set_raster_size(&mut self, size: ViewportSize) {
        if self.targets.is_none() || !size.has_area() {
            return;
        }
        let (width, height) = clamp_extent(size, self.device.limits().max_texture_dimension_2d);
        self.config.width = width;
        self.config.height = height;
        self.raster = size;
        self.reconfigure();
    }

    fn render(&mut self, scene: &SceneState) -> Result<(), ViewerError> {
        if self.targets.is_none() {
            return Err(ViewerError::Surface("surface already released".to_string()));
        }
        self.sync_model(scene);
        if !self.lights_checked {
            self.lights_checked = true;
            let skipped = unshaded_lights(scene);
            if skipped > 0 {
                warn!("Only {} directional lights are shaded, ignoring {}", MAX_DIRECTIONAL_LIGHTS, skipped);
            }
        }

        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                debug!("Surface lost or outdated, reconfiguring");
                self.reconfigure();
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                trace!("Surface timed out, skipping frame");
                return Ok(());
            }
            Err(e) => return Err(ViewerError::Surface(e.to_string())),
        };
        let Some(targets) = &self.targets else {
            return Ok(());
        };

        self.queue.write_buffer(
            &self.frame_uniforms,
            0,
            bytemuck::cast_slice(&[FrameUniforms::from_scene(scene)]),
        );

        let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let (color_view, resolve_target) = match &targets.msaa {
            Some((_, msaa_view)) => (msaa_view, Some(&view)),
            None => (&view, None),
        };

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Frame Encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: color_view,
                    resolve_target,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &targets.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.frame_bind_group, &[]);
            if let Some(model) = &self.model {
                model.draw(&mut pass);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }

    fn release(&mut self) {
        let Some(targets) = self.targets.take() else {
            return;
        };
        targets.destroy();
        if let Some(model) = self.model.take() {
            model.destroy();
        }
        self.frame_uniforms.destroy();
        debug!("GPU resources released");
    }
}

fn uniform_layout(device: &wgpu::Device, label: &str) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    })
}

fn create_pipeline(
    device: &wgpu::Device,
    layouts: &[&wgpu::BindGroupLayout],
    format: wgpu::TextureFormat,
    sample_count: u32,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Scene Shader"),
        source: wgpu::ShaderSource::Wgsl(SHADER.into()),
    });
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Scene Pipeline Layout"),
        bind_group_layouts: layouts,
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Scene Pipeline"),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[Vertex::layout()],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            front_face: wgpu::FrontFace::Ccw,
            // glTF materials are often double-sided
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: sample_count,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
        cache: None,
    })
}
