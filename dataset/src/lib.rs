mod config;
mod error;
mod filesystem;
mod formats;

use glam::Vec3;
use render::{CameraModel, SplatScene, Splats};
use std::collections::HashMap;

pub use config::LoadConfig;
pub use error::{DatasetError, FormatError};
pub use formats::load_dataset;

/// A loaded reconstruction: the sparse point cloud and one camera per registered image.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub positions: Vec<Vec3>,
    pub colors: Vec<Vec3>,
    pub views: HashMap<i32, CameraModel>,
}

impl Dataset {
    /// Splats initialized from the point cloud.
    pub fn splats(&self) -> error::Result<Splats> {
        Ok(Splats::from_points(&self.positions, &self.colors)?)
    }

    pub fn into_scene(self) -> error::Result<SplatScene> {
        let splats = self.splats()?;
        Ok(SplatScene::new(splats, self.views))
    }
}
