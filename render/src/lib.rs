pub mod camera;
pub mod config;
pub mod error;
pub mod gaussian_splats;
pub mod image;
pub mod preprocess;
pub mod render;
pub mod render_aux;
pub mod scene;
pub mod shade;
pub mod tiles;

pub use camera::{CameraModel, Intrinsics, Pose};
pub use config::RenderConfig;
pub use error::RenderError;
pub use gaussian_splats::Splats;
pub use image::RenderImage;
pub use render::render_splats;
pub use scene::SplatScene;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderStats {
    pub num_visible: u32,
    pub num_intersections: u32,
    pub num_culled: u32,
    pub num_skipped: u32,
}
