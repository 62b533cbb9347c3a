use serde::Serialize;

/// A registered image: the world to camera pose and its 2D keypoints.
#[derive(Debug, Clone, Serialize)]
pub struct Image {
    pub tvec: glam::Vec3,
    pub quat: glam::Quat,
    pub camera_id: i32,
    pub name: String,
    pub xys: Vec<glam::Vec2>,
    pub point3d_ids: Vec<i64>,
}

impl Image {
    pub fn pose(&self) -> render::Pose {
        render::Pose::new(self.quat, self.tvec)
    }
}
