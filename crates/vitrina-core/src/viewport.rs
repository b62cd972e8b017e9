//! Viewport dimensions

use serde::{Deserialize, Serialize};

/// Pixel dimensions of the mounting region (and of the raster matched to it)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewportSize {
    pub width: u32,
    pub height: u32,
}

impl ViewportSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Build from CSS client dimensions, which the DOM reports as floats
    pub fn from_client(width: f64, height: f64) -> Self {
        Self {
            width: width.max(0.0).round() as u32,
            height: height.max(0.0).round() as u32,
        }
    }

    /// Both dimensions are non-zero
    pub fn has_area(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Width divided by height; 1.0 for a degenerate size
    pub fn aspect(&self) -> f32 {
        if self.has_area() {
            self.width as f32 / self.height as f32
        } else {
            1.0
        }
    }
}

impl std::fmt::Display for ViewportSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aspect() {
        assert_eq!(ViewportSize::new(800, 600).aspect(), 800.0 / 600.0);
        assert_eq!(ViewportSize::new(0, 600).aspect(), 1.0);
    }

    #[test]
    fn test_from_client_rounds() {
        assert_eq!(ViewportSize::from_client(799.6, 600.2), ViewportSize::new(800, 600));
        assert!(!ViewportSize::from_client(-3.0, 10.0).has_area());
    }
}
