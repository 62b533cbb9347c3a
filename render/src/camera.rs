use glam::{Mat3, Mat4, Quat, Vec2, Vec3, Vec4, vec3};

pub const Z_NEAR: f32 = 0.001;
pub const Z_FAR: f32 = 100.0;

/// Pinhole intrinsics of the camera that took an image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intrinsics {
    pub focal_x: f32,
    pub focal_y: f32,
    pub principal_x: f32,
    pub principal_y: f32,
    pub width: u32,
    pub height: u32,
}

/// World to camera transform of a single image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub rotation: Quat,
    pub translation: Vec3,
}

impl Pose {
    pub fn new(rotation: Quat, translation: Vec3) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Builds a pose from a scalar-first `(w, x, y, z)` quaternion.
    pub fn from_wxyz(quat: [f32; 4], translation: [f32; 3]) -> Self {
        let [w, x, y, z] = quat;
        Self::new(Quat::from_xyzw(x, y, z, w), Vec3::from(translation))
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::new(Quat::IDENTITY, Vec3::ZERO)
    }
}

/// A camera with every matrix needed to project splats into its image.
///
/// All transforms that act on points are stored for the row-vector convention,
/// that is a point is transformed as `p · M` (see [`row_mul`]), and compositions
/// multiply left to right in that order.
#[derive(Debug, Clone)]
pub struct CameraModel {
    name: String,
    intrinsics: Intrinsics,
    pose: Pose,
    intrinsic_matrix: [Vec4; 3],
    extrinsic_matrix: Mat4,
    fov_x: f32,
    fov_y: f32,
    projection_matrix: Mat4,
    world_view_transform: Mat4,
    full_proj_transform: Mat4,
    camera_center: Vec3,
}

impl CameraModel {
    pub fn new(name: impl Into<String>, intrinsics: Intrinsics, pose: Pose) -> Self {
        let intrinsic_matrix = intrinsic_matrix(&intrinsics);
        let rotation = build_rotation(pose.rotation);
        let extrinsic_matrix = extrinsic_matrix(rotation, pose.translation);

        let fov_x = focal_to_fov(intrinsics.focal_x, intrinsics.width);
        let fov_y = focal_to_fov(intrinsics.focal_y, intrinsics.height);

        let projection_matrix = projection_matrix(Z_NEAR, Z_FAR, fov_x, fov_y).transpose();
        let world_view_transform = extrinsic_matrix.transpose();
        let full_proj_transform = world_view_transform * projection_matrix;

        let view_to_world = world_view_transform.inverse();
        let camera_center = vec3(
            view_to_world.x_axis.w,
            view_to_world.y_axis.w,
            view_to_world.z_axis.w,
        );

        Self {
            name: name.into(),
            intrinsics,
            pose,
            intrinsic_matrix,
            extrinsic_matrix,
            fov_x,
            fov_y,
            projection_matrix,
            world_view_transform,
            full_proj_transform,
            camera_center,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn intrinsics(&self) -> &Intrinsics {
        &self.intrinsics
    }

    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    pub fn width(&self) -> u32 {
        self.intrinsics.width
    }

    pub fn height(&self) -> u32 {
        self.intrinsics.height
    }

    pub fn focal(&self) -> Vec2 {
        Vec2::new(self.intrinsics.focal_x, self.intrinsics.focal_y)
    }

    /// Rows of the 3x4 intrinsic matrix.
    pub fn intrinsic_matrix(&self) -> [Vec4; 3] {
        self.intrinsic_matrix
    }

    /// 4x4 homogeneous `[R | t]`, column-vector form.
    pub fn extrinsic_matrix(&self) -> Mat4 {
        self.extrinsic_matrix
    }

    pub fn fov(&self) -> Vec2 {
        Vec2::new(self.fov_x, self.fov_y)
    }

    pub fn tan_half_fov(&self) -> Vec2 {
        Vec2::new((self.fov_x * 0.5).tan(), (self.fov_y * 0.5).tan())
    }

    pub fn near(&self) -> f32 {
        Z_NEAR
    }

    pub fn far(&self) -> f32 {
        Z_FAR
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection_matrix
    }

    pub fn world_view_transform(&self) -> Mat4 {
        self.world_view_transform
    }

    pub fn full_proj_transform(&self) -> Mat4 {
        self.full_proj_transform
    }

    pub fn camera_center(&self) -> Vec3 {
        self.camera_center
    }

    /// Rows of the 3x4 pinhole camera matrix `K · [R | t]`.
    pub fn camera_matrix(&self) -> [Vec4; 3] {
        let e = self.extrinsic_matrix;
        let rows = [e.row(0), e.row(1), e.row(2), e.row(3)];
        self.intrinsic_matrix.map(|k| {
            rows.iter()
                .zip(k.to_array())
                .fold(Vec4::ZERO, |acc, (row, weight)| acc + *row * weight)
        })
    }

    /// Projects a world point straight to pixel coordinates with the pinhole matrix.
    ///
    /// Returns `None` for points on or behind the camera plane.
    pub fn project_pixel(&self, point: Vec3) -> Option<Vec2> {
        let p = point.extend(1.0);
        let [u, v, w] = self.camera_matrix().map(|row| row.dot(p));
        (w > 0.0).then(|| Vec2::new(u / w, v / w))
    }

    /// World point to view space.
    pub fn world_to_view(&self, point: Vec3) -> Vec3 {
        row_mul(point.extend(1.0), &self.world_view_transform).truncate()
    }

    /// World point to homogeneous clip space.
    pub fn world_to_clip(&self, point: Vec3) -> Vec4 {
        row_mul(point.extend(1.0), &self.full_proj_transform)
    }
}

/// Multiplies a row vector by a matrix, `v · M`.
#[inline]
pub fn row_mul(v: Vec4, m: &Mat4) -> Vec4 {
    Vec4::new(
        v.dot(m.x_axis),
        v.dot(m.y_axis),
        v.dot(m.z_axis),
        v.dot(m.w_axis),
    )
}

/// Rotation matrix of a quaternion. The quaternion doesn't need to be normalized;
/// a zero quaternion gives the identity.
pub fn build_rotation(quat: Quat) -> Mat3 {
    let len_sq = quat.length_squared();
    if len_sq <= f32::EPSILON || !len_sq.is_finite() {
        return Mat3::IDENTITY;
    }
    Mat3::from_quat(quat / len_sq.sqrt())
}

// Converts field of view to focal length
pub fn fov_to_focal(fov_rad: f32, pixels: u32) -> f32 {
    0.5 * (pixels as f32) / (fov_rad * 0.5).tan()
}

// Converts focal length to field of view
pub fn focal_to_fov(focal: f32, pixels: u32) -> f32 {
    2.0 * f32::atan((pixels as f32) / (2.0 * focal))
}

fn intrinsic_matrix(intrinsics: &Intrinsics) -> [Vec4; 3] {
    [
        Vec4::new(intrinsics.focal_x, 0.0, intrinsics.principal_x, 0.0),
        Vec4::new(0.0, intrinsics.focal_y, intrinsics.principal_y, 0.0),
        Vec4::new(0.0, 0.0, 1.0, 0.0),
    ]
}

fn extrinsic_matrix(rotation: Mat3, translation: Vec3) -> Mat4 {
    Mat4::from_cols(
        rotation.x_axis.extend(0.0),
        rotation.y_axis.extend(0.0),
        rotation.z_axis.extend(0.0),
        translation.extend(1.0),
    )
}

// Column-vector form. Depth maps to [0, 1] between the near and far plane.
fn projection_matrix(z_near: f32, z_far: f32, fov_x: f32, fov_y: f32) -> Mat4 {
    let top = (fov_y * 0.5).tan() * z_near;
    let bottom = -top;
    let right = (fov_x * 0.5).tan() * z_near;
    let left = -right;
    let z_sign = 1.0;

    mat4_from_rows([
        [
            2.0 * z_near / (right - left),
            0.0,
            (right + left) / (right - left),
            0.0,
        ],
        [
            0.0,
            2.0 * z_near / (top - bottom),
            (top + bottom) / (top - bottom),
            0.0,
        ],
        [
            0.0,
            0.0,
            z_sign * z_far / (z_far - z_near),
            -(z_far * z_near) / (z_far - z_near),
        ],
        [0.0, 0.0, z_sign, 0.0],
    ])
}

fn mat4_from_rows(rows: [[f32; 4]; 4]) -> Mat4 {
    Mat4::from_cols_array_2d(&rows).transpose()
}
