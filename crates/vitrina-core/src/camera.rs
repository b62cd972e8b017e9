//! Perspective camera

use glam::{Mat4, Vec3};

use crate::config::CameraConfig;

/// The scene's single perspective camera
///
/// The projection matrix is cached; call [`PerspectiveCamera::update_projection_matrix`]
/// after changing field of view, aspect ratio, or clip planes.
#[derive(Debug, Clone, PartialEq)]
pub struct PerspectiveCamera {
    fov_degrees: f32,
    aspect: f32,
    near: f32,
    far: f32,
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    projection: Mat4,
}

impl PerspectiveCamera {
    pub fn new(config: &CameraConfig, aspect: f32) -> Self {
        let mut camera = Self {
            fov_degrees: config.fov_degrees,
            aspect,
            near: config.near,
            far: config.far,
            position: Vec3::from_array(config.position),
            target: Vec3::ZERO,
            up: Vec3::Y,
            projection: Mat4::IDENTITY,
        };
        camera.update_projection_matrix();
        camera
    }

    pub fn fov_degrees(&self) -> f32 {
        self.fov_degrees
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn near(&self) -> f32 {
        self.near
    }

    pub fn far(&self) -> f32 {
        self.far
    }

    /// Set the aspect ratio without touching the cached projection
    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    /// Recompute the projection from fov, aspect, and clip planes (depth range 0..1)
    pub fn update_projection_matrix(&mut self) {
        self.projection = Mat4::perspective_rh(self.fov_degrees.to_radians(), self.aspect, self.near, self.far);
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view()
    }

    pub fn look_at(&mut self, target: Vec3) {
        self.target = target;
    }

    pub fn distance_to_target(&self) -> f32 {
        self.position.distance(self.target)
    }
}
