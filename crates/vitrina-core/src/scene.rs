//! Scene state: camera, lights, and the single model slot

use std::sync::Arc;

use glam::Vec3;

use crate::asset::ModelRoot;
use crate::camera::PerspectiveCamera;
use crate::config::{LightConfig, Rgb, ViewerConfig};

/// A light as seen by the renderer
#[derive(Debug, Clone, PartialEq)]
pub enum Light {
    Ambient { color: Rgb, intensity: f32 },
    /// Shines from `position` towards the origin
    Directional { color: Rgb, intensity: f32, position: Vec3 },
}

impl Light {
    pub fn from_config(config: &LightConfig) -> Self {
        match *config {
            LightConfig::Ambient { color, intensity } => Light::Ambient { color, intensity },
            LightConfig::Directional { color, intensity, position } => Light::Directional {
                color,
                intensity,
                position: Vec3::from_array(position),
            },
        }
    }

    /// Linear color scaled by intensity
    pub fn radiance(&self) -> Vec3 {
        let (color, intensity) = match self {
            Light::Ambient { color, intensity } | Light::Directional { color, intensity, .. } => (*color, *intensity),
        };
        Vec3::from_array(color.to_linear()) * intensity
    }

    /// Unit vector pointing from the lit surface towards the light
    pub fn direction_to_light(&self) -> Option<Vec3> {
        match self {
            Light::Ambient { .. } => None,
            Light::Directional { position, .. } => position.try_normalize(),
        }
    }
}

/// Holds at most one model root
///
/// Replacing the model is a single `Arc` swap, so a render never observes a
/// partially linked model. The generation counter lets renderers notice a swap
/// and rebuild their GPU buffers.
#[derive(Debug, Default)]
pub struct ModelSlot {
    current: Option<Arc<ModelRoot>>,
    generation: u64,
}

impl ModelSlot {
    /// Insert a model, returning the one it replaces
    pub fn replace(&mut self, model: Arc<ModelRoot>) -> Option<Arc<ModelRoot>> {
        self.generation += 1;
        self.current.replace(model)
    }

    pub fn clear(&mut self) -> Option<Arc<ModelRoot>> {
        let previous = self.current.take();
        if previous.is_some() {
            self.generation += 1;
        }
        previous
    }

    pub fn get(&self) -> Option<&Arc<ModelRoot>> {
        self.current.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Everything a frame is drawn from
#[derive(Debug)]
pub struct SceneState {
    pub camera: PerspectiveCamera,
    pub lights: Vec<Light>,
    pub background: Rgb,
    pub model: ModelSlot,
}

impl SceneState {
    /// Camera and lights from config; the model slot starts empty
    pub fn new(config: &ViewerConfig, aspect: f32) -> Self {
        let mut camera = PerspectiveCamera::new(&config.camera, aspect);
        camera.look_at(Vec3::from_array(config.controls.target));
        Self {
            camera,
            lights: config.lights.iter().map(Light::from_config).collect(),
            background: config.renderer.background,
            model: ModelSlot::default(),
        }
    }

    /// Sum of ambient light radiance
    pub fn ambient(&self) -> Vec3 {
        self.lights
            .iter()
            .filter(|l| matches!(l, Light::Ambient { .. }))
            .map(Light::radiance)
            .sum()
    }

    /// Directional lights as (direction to light, radiance)
    pub fn directional(&self) -> impl Iterator<Item = (Vec3, Vec3)> + '_ {
        self.lights
            .iter()
            .filter_map(|l| l.direction_to_light().map(|d| (d, l.radiance())))
    }
}
