//! Keeps the raster size and camera projection matched to the viewport

use tracing::debug;

use crate::camera::PerspectiveCamera;
use crate::lifecycle::DrawingSurface;
use crate::viewport::ViewportSize;

#[derive(Debug, Clone)]
pub struct ResizeAdapter {
    current: ViewportSize,
}

impl ResizeAdapter {
    pub fn new(initial: ViewportSize) -> Self {
        Self { current: initial }
    }

    /// Last size applied
    pub fn current(&self) -> ViewportSize {
        self.current
    }

    /// Resize the raster and reproject the camera
    ///
    /// Returns false, touching nothing, when the size is unchanged or has no
    /// area. Field of view and clip planes are left as they are.
    pub fn apply<S: DrawingSurface>(
        &mut self,
        size: ViewportSize,
        camera: &mut PerspectiveCamera,
        surface: &mut S,
    ) -> bool {
        if !size.has_area() {
            debug!("Ignoring resize to empty viewport {}", size);
            return false;
        }
        if size == self.current && surface.raster_size() == size {
            return false;
        }
        debug!("Viewport resized {} -> {}", self.current, size);
        surface.set_raster_size(size);
        camera.set_aspect(size.aspect());
        camera.update_projection_matrix();
        self.current = size;
        true
    }
}
