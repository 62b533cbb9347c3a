use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Point3D {
    pub xyz: glam::Vec3,
    pub rgb: [u8; 3],
    pub error: f64,
    pub image_ids: Vec<i32>,
    pub point2d_idxs: Vec<i32>,
}

impl Point3D {
    /// Number of images this point was triangulated from.
    pub fn track_length(&self) -> usize {
        self.image_ids.len()
    }

    pub fn color(&self) -> glam::Vec3 {
        glam::Vec3::from(self.rgb.map(|c| c as f32 / 255.0))
    }
}
