//! Orbit camera controls
//!
//! Pointer input is buffered by [`OrbitControls::handle_input`] and consumed on
//! the next [`OrbitControls::update`], which the render loop calls once per
//! tick. The camera orbits `target` in spherical coordinates around +Y:
//! - primary drag (one finger on touch) orbits
//! - secondary drag, or primary drag with a modifier, pans
//! - middle drag and the wheel dolly; two fingers pinch-dolly and pan
//!
//! With damping enabled, every input adds to a velocity that decays by
//! `damping_factor` each tick. Camera-to-target distance is clamped to
//! `[min_distance, max_distance]` on every update.

use std::collections::VecDeque;
use std::f32::consts::{PI, TAU};

use glam::{Vec2, Vec3};
use tracing::trace;

use crate::camera::PerspectiveCamera;
use crate::config::ControlsConfig;
use crate::viewport::ViewportSize;

const EPS: f32 = 1e-6;
/// Per-notch zoom factor before `zoom_speed` is applied
const ZOOM_BASE: f32 = 0.95;
/// Upper bound on buffered events between ticks
const MAX_PENDING: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Mouse,
    Touch,
    Pen,
}

/// Input events in surface-local CSS pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerInput {
    Down {
        id: i32,
        kind: PointerKind,
        button: PointerButton,
        x: f32,
        y: f32,
        /// Ctrl, meta, or shift held
        modifier: bool,
    },
    Move { id: i32, x: f32, y: f32 },
    Up { id: i32 },
    Cancel { id: i32 },
    /// Positive `delta_y` scrolls away from the user (zoom out)
    Wheel { delta_y: f32 },
}

impl PointerInput {
    /// Moves and wheel steps; everything else changes gesture state
    fn is_motion(&self) -> bool {
        matches!(self, PointerInput::Move { .. } | PointerInput::Wheel { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gesture {
    None,
    Rotate,
    Pan,
    Dolly,
    TouchRotate,
    TouchDollyPan,
}

#[derive(Debug, Clone, Copy)]
struct ActivePointer {
    id: i32,
    position: Vec2,
}

/// Damped orbit/pan/zoom controller bound to one camera
#[derive(Debug)]
pub struct OrbitControls {
    config: ControlsConfig,
    target: Vec3,
    /// Pending (theta, phi) rotation
    rotate_delta: Vec2,
    pan_offset: Vec3,
    scale: f32,
    pending: VecDeque<PointerInput>,
    pointers: Vec<ActivePointer>,
    gesture: Gesture,
    pinch_distance: f32,
    disposed: bool,
}

impl OrbitControls {
    pub fn new(config: &ControlsConfig) -> Self {
        Self {
            config: config.clone(),
            target: Vec3::from_array(config.target),
            rotate_delta: Vec2::ZERO,
            pan_offset: Vec3::ZERO,
            scale: 1.0,
            pending: VecDeque::new(),
            pointers: Vec::new(),
            gesture: Gesture::None,
            pinch_distance: 0.0,
            disposed: false,
        }
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn config(&self) -> &ControlsConfig {
        &self.config
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Whether a drag or pinch is in progress
    pub fn is_interacting(&self) -> bool {
        self.gesture != Gesture::None
    }

    /// Buffer an input event; returns false once disposed
    pub fn handle_input(&mut self, input: PointerInput) -> bool {
        if self.disposed {
            return false;
        }
        // A move only needs the latest position of its pointer
        if let Some(last) = self.pending.back_mut() {
            if let (PointerInput::Move { id, .. }, PointerInput::Move { id: previous, .. }) = (input, *last) {
                if id == previous {
                    *last = input;
                    return true;
                }
            }
        }
        if self.pending.len() >= MAX_PENDING {
            // Presses and releases must survive so gestures can end
            match self.pending.iter().position(PointerInput::is_motion) {
                Some(index) => {
                    self.pending.remove(index);
                }
                None if input.is_motion() => {
                    trace!("Input buffer full, dropping {:?}", input);
                    return true;
                }
                None => {
                    self.pending.pop_front();
                }
            }
        }
        self.pending.push_back(input);
        true
    }

    /// Stop accepting input and drop any residual motion
    pub fn dispose(&mut self) {
        self.disposed = true;
        self.pending.clear();
        self.pointers.clear();
        self.gesture = Gesture::None;
        self.rotate_delta = Vec2::ZERO;
        self.pan_offset = Vec3::ZERO;
        self.scale = 1.0;
    }

    /// Apply buffered input and one damping step; returns true if the camera moved
    pub fn update(&mut self, camera: &mut PerspectiveCamera, viewport: ViewportSize) -> bool {
        let height = viewport.height.max(1) as f32;
        while let Some(input) = self.pending.pop_front() {
            self.apply_input(input, camera, height);
        }

        let offset = camera.position - self.target;
        let radius = offset.length();
        let (mut theta, mut phi) = if radius > EPS {
            (offset.x.atan2(offset.z), (offset.y / radius).clamp(-1.0, 1.0).acos())
        } else {
            (0.0, PI / 2.0)
        };

        let damping = self.config.damping_factor;
        if self.config.enable_damping {
            theta += self.rotate_delta.x * damping;
            phi += self.rotate_delta.y * damping;
            self.target += self.pan_offset * damping;
        } else {
            theta += self.rotate_delta.x;
            phi += self.rotate_delta.y;
            self.target += self.pan_offset;
        }

        phi = phi
            .clamp(self.config.min_polar_angle, self.config.max_polar_angle)
            .clamp(EPS, PI - EPS);
        let radius = (radius * self.scale).clamp(self.config.min_distance, self.config.max_distance);

        let sin_phi = phi.sin();
        let new_offset = Vec3::new(radius * sin_phi * theta.sin(), radius * phi.cos(), radius * sin_phi * theta.cos());
        let previous = camera.position;
        camera.position = self.target + new_offset;
        camera.look_at(self.target);

        if self.config.enable_damping {
            self.rotate_delta *= 1.0 - damping;
            self.pan_offset *= 1.0 - damping;
        } else {
            self.rotate_delta = Vec2::ZERO;
            self.pan_offset = Vec3::ZERO;
        }
        self.scale = 1.0;

        previous.distance_squared(camera.position) > EPS
    }

    fn apply_input(&mut self, input: PointerInput, camera: &PerspectiveCamera, height: f32) {
        match input {
            PointerInput::Down { id, kind, button, x, y, modifier } => {
                let position = Vec2::new(x, y);
                if kind == PointerKind::Touch {
                    self.touch_down(id, position);
                } else {
                    self.pointers.clear();
                    self.pointers.push(ActivePointer { id, position });
                    self.gesture = match (button, modifier) {
                        (PointerButton::Primary, false) if self.config.enable_rotate => Gesture::Rotate,
                        (PointerButton::Primary, true) | (PointerButton::Secondary, _) if self.config.enable_pan => {
                            Gesture::Pan
                        }
                        (PointerButton::Middle, _) if self.config.enable_zoom => Gesture::Dolly,
                        _ => Gesture::None,
                    };
                }
            }
            PointerInput::Move { id, x, y } => self.pointer_move(id, Vec2::new(x, y), camera, height),
            PointerInput::Up { id } | PointerInput::Cancel { id } => self.pointer_up(id),
            PointerInput::Wheel { delta_y } => {
                if !self.config.enable_zoom {
                    return;
                }
                if delta_y < 0.0 {
                    self.scale *= self.zoom_scale();
                } else if delta_y > 0.0 {
                    self.scale /= self.zoom_scale();
                }
            }
        }
    }

    fn touch_down(&mut self, id: i32, position: Vec2) {
        if self.pointers.iter().any(|p| p.id == id) || self.pointers.len() >= 2 {
            return;
        }
        self.pointers.push(ActivePointer { id, position });
        self.gesture = match self.pointers.len() {
            1 if self.config.enable_rotate => Gesture::TouchRotate,
            2 if self.config.enable_zoom || self.config.enable_pan => {
                self.pinch_distance = self.pointers[0].position.distance(self.pointers[1].position);
                Gesture::TouchDollyPan
            }
            _ => Gesture::None,
        };
    }

    fn pointer_move(&mut self, id: i32, position: Vec2, camera: &PerspectiveCamera, height: f32) {
        let Some(index) = self.pointers.iter().position(|p| p.id == id) else {
            return;
        };
        let previous_center = self.pointer_center();
        let delta = position - self.pointers[index].position;
        self.pointers[index].position = position;

        match self.gesture {
            Gesture::Rotate | Gesture::TouchRotate => self.rotate(delta, height),
            Gesture::Pan => self.pan(delta, camera, height),
            Gesture::Dolly => {
                if delta.y > 0.0 {
                    self.scale /= self.zoom_scale();
                } else if delta.y < 0.0 {
                    self.scale *= self.zoom_scale();
                }
            }
            Gesture::TouchDollyPan => {
                let distance = self.pointers[0].position.distance(self.pointers[1].position);
                if self.config.enable_zoom && self.pinch_distance > EPS && distance > EPS {
                    self.scale /= (distance / self.pinch_distance).powf(self.config.zoom_speed);
                }
                self.pinch_distance = distance;
                if self.config.enable_pan {
                    self.pan(self.pointer_center() - previous_center, camera, height);
                }
            }
            Gesture::None => {}
        }
    }

    fn pointer_up(&mut self, id: i32) {
        self.pointers.retain(|p| p.id != id);
        self.gesture = match (self.gesture, self.pointers.len()) {
            (Gesture::TouchDollyPan, 1) if self.config.enable_rotate => Gesture::TouchRotate,
            _ => {
                self.pointers.clear();
                Gesture::None
            }
        };
        trace!("Pointer {} released, gesture now {:?}", id, self.gesture);
    }

    fn pointer_center(&self) -> Vec2 {
        if self.pointers.is_empty() {
            return Vec2::ZERO;
        }
        self.pointers.iter().map(|p| p.position).sum::<Vec2>() / self.pointers.len() as f32
    }

    fn zoom_scale(&self) -> f32 {
        ZOOM_BASE.powf(self.config.zoom_speed)
    }

    fn rotate(&mut self, delta: Vec2, height: f32) {
        let speed = self.config.rotate_speed;
        self.rotate_delta.x -= TAU * delta.x / height * speed;
        self.rotate_delta.y -= TAU * delta.y / height * speed;
    }

    fn pan(&mut self, delta: Vec2, camera: &PerspectiveCamera, height: f32) {
        let delta = delta * self.config.pan_speed;
        let offset = camera.position - self.target;
        // Distance covered by half the viewport height at the target
        let target_distance = offset.length() * (camera.fov_degrees().to_radians() / 2.0).tan();

        let forward = (self.target - camera.position).try_normalize().unwrap_or(Vec3::NEG_Z);
        let right = forward.cross(camera.up).try_normalize().unwrap_or(Vec3::X);
        let up = if self.config.screen_space_panning {
            right.cross(forward)
        } else {
            // Stay in the plane orthogonal to the world up axis
            camera.up.cross(right)
        };

        self.pan_offset -= right * (2.0 * delta.x * target_distance / height);
        self.pan_offset += up * (2.0 * delta.y * target_distance / height);
    }
}
