//! Viewer configuration loading and validation
//!
//! Every section falls back to the storefront jar viewer defaults, so an empty
//! document (or no document at all) yields a working setup.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerConfig {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default = "default_lights")]
    pub lights: Vec<LightConfig>,
    #[serde(default)]
    pub controls: ControlsConfig,
    #[serde(default)]
    pub renderer: RendererConfig,
    #[serde(default)]
    pub model: ModelConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            lights: default_lights(),
            controls: ControlsConfig::default(),
            renderer: RendererConfig::default(),
            model: ModelConfig::default(),
        }
    }
}

impl ViewerConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ViewerConfig = toml::from_str(content)?;
        config.validate()?;
        debug!("Loaded viewer config from TOML");
        Ok(config)
    }

    /// Parse and validate a JSON document (the wasm `options` argument)
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: ViewerConfig = serde_json::from_str(content)?;
        config.validate()?;
        debug!("Loaded viewer config from JSON");
        Ok(config)
    }

    /// Check cross-field constraints serde cannot express
    ///
    /// Every comparison is written so that NaN fails it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let cam = &self.camera;
        if !(cam.fov_degrees > 0.0 && cam.fov_degrees < 180.0) {
            return Err(invalid("camera.fov_degrees", format!("{} is outside (0, 180)", cam.fov_degrees)));
        }
        if !(cam.near > 0.0 && cam.near < cam.far && cam.far.is_finite()) {
            return Err(invalid("camera.near", format!("near {} must be positive and below far {}", cam.near, cam.far)));
        }
        finite("camera.position", &cam.position)?;

        let ctl = &self.controls;
        if !(ctl.min_distance >= 0.0 && ctl.min_distance <= ctl.max_distance && ctl.max_distance.is_finite()) {
            return Err(invalid(
                "controls.min_distance",
                format!("range [{}, {}] is empty", ctl.min_distance, ctl.max_distance),
            ));
        }
        if !(ctl.damping_factor > 0.0 && ctl.damping_factor <= 1.0) {
            return Err(invalid("controls.damping_factor", format!("{} is outside (0, 1]", ctl.damping_factor)));
        }
        let polar = 0.0..=std::f32::consts::PI;
        if !(polar.contains(&ctl.min_polar_angle)
            && polar.contains(&ctl.max_polar_angle)
            && ctl.min_polar_angle <= ctl.max_polar_angle)
        {
            return Err(invalid(
                "controls.min_polar_angle",
                format!("range [{}, {}] is not within [0, pi]", ctl.min_polar_angle, ctl.max_polar_angle),
            ));
        }
        finite("controls.target", &ctl.target)?;
        finite("controls.rotate_speed", &[ctl.rotate_speed])?;
        finite("controls.zoom_speed", &[ctl.zoom_speed])?;
        finite("controls.pan_speed", &[ctl.pan_speed])?;

        for light in &self.lights {
            if !(light.intensity() >= 0.0 && light.intensity().is_finite()) {
                return Err(invalid("lights.intensity", format!("{} is not a finite non-negative value", light.intensity())));
            }
            if let LightConfig::Directional { position, .. } = light {
                finite("lights.position", position)?;
            }
        }

        if !(self.model.scale > 0.0 && self.model.scale.is_finite()) {
            return Err(invalid("model.scale", format!("{} must be positive", self.model.scale)));
        }
        finite("model.offset", &self.model.offset)?;
        Ok(())
    }
}

fn finite(field: &'static str, values: &[f32]) -> Result<(), ConfigError> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(invalid(field, format!("{:?} is not finite", values)))
    }
}

fn invalid(field: &'static str, reason: String) -> ConfigError {
    ConfigError::Invalid { field, reason }
}

/// Perspective camera setup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Vertical field of view in degrees
    #[serde(default = "default_fov")]
    pub fov_degrees: f32,
    #[serde(default = "default_near")]
    pub near: f32,
    #[serde(default = "default_far")]
    pub far: f32,
    /// Initial eye position
    #[serde(default = "default_camera_position")]
    pub position: [f32; 3],
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_degrees: default_fov(),
            near: default_near(),
            far: default_far(),
            position: default_camera_position(),
        }
    }
}

fn default_fov() -> f32 {
    50.0
}

fn default_near() -> f32 {
    0.1
}

fn default_far() -> f32 {
    1000.0
}

fn default_camera_position() -> [f32; 3] {
    [0.0, 3.0, 50.0]
}

/// A light source in the scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LightConfig {
    /// Uniform light from every direction
    Ambient {
        #[serde(default = "default_light_color")]
        color: Rgb,
        #[serde(default = "default_intensity")]
        intensity: f32,
    },
    /// Parallel light shining from `position` towards the origin
    Directional {
        #[serde(default = "default_light_color")]
        color: Rgb,
        #[serde(default = "default_intensity")]
        intensity: f32,
        position: [f32; 3],
    },
}

impl LightConfig {
    pub fn intensity(&self) -> f32 {
        match self {
            LightConfig::Ambient { intensity, .. } | LightConfig::Directional { intensity, .. } => *intensity,
        }
    }
}

fn default_lights() -> Vec<LightConfig> {
    vec![
        LightConfig::Ambient {
            color: Rgb::WHITE,
            intensity: 0.5,
        },
        LightConfig::Directional {
            color: Rgb::WHITE,
            intensity: 0.8,
            position: [5.0, 10.0, 7.5],
        },
    ]
}

fn default_light_color() -> Rgb {
    Rgb::WHITE
}

fn default_intensity() -> f32 {
    1.0
}

/// Orbit controller tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    pub enable_damping: bool,
    /// Fraction of the remaining velocity applied per tick
    pub damping_factor: f32,
    /// Pan in screen space instead of the plane orthogonal to the up axis
    pub screen_space_panning: bool,
    pub min_distance: f32,
    pub max_distance: f32,
    /// Polar angle limits in radians, measured from +Y
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,
    /// Look-at point
    pub target: [f32; 3],
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
    pub enable_rotate: bool,
    pub enable_zoom: bool,
    pub enable_pan: bool,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            enable_damping: true,
            damping_factor: 0.05,
            screen_space_panning: false,
            min_distance: 2.0,
            max_distance: 50.0,
            min_polar_angle: 0.0,
            max_polar_angle: std::f32::consts::PI,
            target: [0.0, 1.0, 0.0],
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            pan_speed: 1.0,
            enable_rotate: true,
            enable_zoom: true,
            enable_pan: true,
        }
    }
}

/// Drawing surface options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RendererConfig {
    #[serde(default = "default_background")]
    pub background: Rgb,
    /// Multisample the color target
    #[serde(default = "default_true")]
    pub antialias: bool,
    /// Prefer an sRGB swap chain format
    #[serde(default = "default_true")]
    pub srgb_output: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            background: default_background(),
            antialias: true,
            srgb_output: true,
        }
    }
}

fn default_background() -> Rgb {
    Rgb::from_hex(0xdddddd)
}

fn default_true() -> bool {
    true
}

/// Placement applied to the loaded model root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub offset: [f32; 3],
    pub scale: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            offset: [0.0, 0.0, 0.0],
            scale: 1.0,
        }
    }
}

/// An sRGB color with components in `[0, 1]`
///
/// Deserializes from an integer (`0xdddddd`), a CSS hex string (`"#ddd"`,
/// `"#dddddd"`), or a float triple.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ColorValue", into = "ColorValue")]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ColorValue {
    Hex(u32),
    Css(String),
    Components([f32; 3]),
}

impl TryFrom<ColorValue> for Rgb {
    type Error = String;

    fn try_from(value: ColorValue) -> Result<Self, Self::Error> {
        match value {
            ColorValue::Hex(hex) if hex <= 0xffffff => Ok(Rgb::from_hex(hex)),
            ColorValue::Hex(hex) => Err(format!("color 0x{hex:x} exceeds 0xffffff")),
            ColorValue::Css(text) => Rgb::parse_css(&text),
            ColorValue::Components([r, g, b]) => Ok(Rgb { r, g, b }),
        }
    }
}

impl From<Rgb> for ColorValue {
    fn from(color: Rgb) -> Self {
        ColorValue::Components([color.r, color.g, color.b])
    }
}

impl Rgb {
    pub const WHITE: Rgb = Rgb { r: 1.0, g: 1.0, b: 1.0 };

    pub fn from_hex(hex: u32) -> Self {
        Self {
            r: ((hex >> 16) & 0xff) as f32 / 255.0,
            g: ((hex >> 8) & 0xff) as f32 / 255.0,
            b: (hex & 0xff) as f32 / 255.0,
        }
    }

    /// Parse `#rgb` or `#rrggbb`
    pub fn parse_css(text: &str) -> Result<Self, String> {
        let digits = text.trim().trim_start_matches('#');
        let expanded = match digits.len() {
            3 => digits.chars().flat_map(|c| [c, c]).collect::<String>(),
            6 => digits.to_string(),
            _ => return Err(format!("unrecognized color '{text}'")),
        };
        u32::from_str_radix(&expanded, 16)
            .map(Rgb::from_hex)
            .map_err(|_| format!("unrecognized color '{text}'"))
    }

    /// Convert to linear-light components for shading
    pub fn to_linear(self) -> [f32; 3] {
        [srgb_to_linear(self.r), srgb_to_linear(self.g), srgb_to_linear(self.b)]
    }
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}
