use burn::config::ConfigError;
use burn::prelude::Config;
use serde_json::Value;
use std::path::Path;

#[derive(Config, Debug)]
pub struct RenderConfig {
    /// Width and height of a square tile in pixels.
    #[config(default = 16)]
    pub tile_size: u32,

    /// Splats closer than this (in view space z) are culled.
    #[config(default = 0.2)]
    pub near_z: f32,

    /// Compositing stops once the transmittance of a pixel would fall below this.
    #[config(default = 1e-6)]
    pub min_transmittance: f32,

    /// View space x/z and y/z are clamped to this multiple of tan(fov / 2)
    /// before building the projection jacobian.
    #[config(default = 1.3)]
    pub clamp_margin: f32,

    /// Lower bound on the 2D covariance determinant before inversion.
    #[config(default = 1e-3)]
    pub det_floor: f32,

    /// Lower bound on the radicand of the largest eigenvalue.
    #[config(default = 0.1)]
    pub eigen_floor: f32,

    /// Number of standard deviations covered by a splat's radius.
    #[config(default = 3.0)]
    pub sigma: f32,

    /// Splats with a view depth below this are skipped instead of projected.
    #[config(default = 1e-6)]
    pub depth_epsilon: f32,

    /// Add the contribution of the splat that saturates a pixel before stopping.
    #[config(default = true)]
    pub composite_terminal_splat: bool,

    /// Color shown through whatever transmittance remains after compositing.
    #[config(default = "[0.0, 0.0, 0.0]")]
    pub background: [f32; 3],
}

impl RenderConfig {
    /// Loads a JSON config in which every key is optional. Keys that are left out
    /// keep their default value.
    pub fn load_overrides(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_e| ConfigError::FileNotFound(path.display().to_string()))?;
        Self::from_json_overrides(&content)
    }

    pub fn from_json_overrides(content: &str) -> Result<Self, ConfigError> {
        let invalid = |e: serde_json::Error| ConfigError::InvalidFormat(e.to_string());

        let Value::Object(overrides) = serde_json::from_str(content).map_err(invalid)? else {
            return Err(ConfigError::InvalidFormat(String::from(
                "Render config must be a JSON object",
            )));
        };

        let mut merged = serde_json::to_value(Self::new()).map_err(invalid)?;
        if let Value::Object(fields) = &mut merged {
            fields.extend(overrides);
        }
        serde_json::from_value(merged).map_err(invalid)
    }
}
