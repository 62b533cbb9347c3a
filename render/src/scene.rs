use crate::RenderStats;
use crate::camera::CameraModel;
use crate::config::RenderConfig;
use crate::error::{RenderError, Result};
use crate::gaussian_splats::Splats;
use crate::image::RenderImage;
use crate::render::render_splats;
use std::collections::HashMap;

/// Splats together with the cameras they can be viewed from, keyed by image id.
#[derive(Debug, Clone, Default)]
pub struct SplatScene {
    splats: Splats,
    views: HashMap<i32, CameraModel>,
}

impl SplatScene {
    pub fn new(splats: Splats, views: HashMap<i32, CameraModel>) -> Self {
        Self { splats, views }
    }

    pub fn splats(&self) -> &Splats {
        &self.splats
    }

    pub fn splats_mut(&mut self) -> &mut Splats {
        &mut self.splats
    }

    pub fn view(&self, id: i32) -> Result<&CameraModel> {
        self.views.get(&id).ok_or(RenderError::UnknownView(id))
    }

    /// Registered view ids in ascending order.
    pub fn view_ids(&self) -> Vec<i32> {
        let mut ids: Vec<_> = self.views.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn num_views(&self) -> usize {
        self.views.len()
    }

    pub fn render_view(&self, id: i32, config: &RenderConfig) -> Result<(RenderImage, RenderStats)> {
        let camera = self.view(id)?;
        let (img, aux) = render_splats(&self.splats, camera, config)?;
        Ok((img, aux.stats()))
    }
}
