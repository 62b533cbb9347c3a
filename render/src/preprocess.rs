use crate::camera::CameraModel;
use crate::config::RenderConfig;
use crate::gaussian_splats::Splats;
use glam::{IVec2, Mat2, Mat3, UVec2, Vec2, Vec3};
use rayon::prelude::*;

/// Inclusive pixel rectangle covered by a splat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBounds {
    pub min: IVec2,
    pub max: IVec2,
}

impl PixelBounds {
    pub fn from_center_radius(center: Vec2, radius: f32) -> Self {
        let min = (center - radius).floor();
        let max = (center + radius).ceil();
        Self {
            min: IVec2::new(min.x as i32, min.y as i32),
            max: IVec2::new(max.x as i32, max.y as i32),
        }
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.min.x as f32
            && point.x <= self.max.x as f32
            && point.y >= self.min.y as f32
            && point.y <= self.max.y as f32
    }

    pub fn overlaps(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
    }
}

/// All the per view data the rasterizer needs, one entry per visible splat.
///
/// Entries are sorted front to back by view depth. Every array has the same length.
#[derive(Debug, Clone, Default)]
pub struct PreprocessedScene {
    pub means: Vec<Vec2>,
    pub cov2d: Vec<Mat2>,
    pub inv_cov2d: Vec<Mat2>,
    pub radii: Vec<u32>,
    pub bounds: Vec<PixelBounds>,
    pub depths: Vec<f32>,
    pub colors: Vec<Vec3>,
    pub opacities: Vec<f32>,
    pub global_from_compact_gid: Vec<u32>,

    /// Splats closer to the camera than `near_z`.
    pub num_culled: u32,
    /// Splats dropped because their projection degenerated.
    pub num_skipped: u32,
}

impl PreprocessedScene {
    pub fn num_visible(&self) -> usize {
        self.means.len()
    }

    pub fn is_empty(&self) -> bool {
        self.means.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
struct ProjectedSplat {
    mean: Vec2,
    cov2d: Mat2,
    inv_cov2d: Mat2,
    radius: u32,
    bounds: PixelBounds,
    depth: f32,
}

enum Projection {
    Visible(ProjectedSplat),
    Culled,
    Skipped,
}

/// Maps normalized device coordinates in [-1, 1] to pixel space.
pub fn ndc_to_pixel(ndc: Vec2, img_size: UVec2) -> Vec2 {
    (ndc + 1.0) * (img_size.as_vec2() - 1.0) * 0.5
}

/// Screen space covariance of a splat using the local affine approximation of
/// the perspective projection.
///
/// `view_pos` is the splat center in view space and `view_rotation` the
/// rotation part of the world to view transform, in column-vector form.
pub fn covariance_2d(
    view_pos: Vec3,
    cov3d: Mat3,
    view_rotation: Mat3,
    focal: Vec2,
    tan_half_fov: Vec2,
    clamp_margin: f32,
) -> Mat2 {
    let z = view_pos.z;
    let lim = tan_half_fov * clamp_margin;
    let tx = z * (view_pos.x / z).clamp(-lim.x, lim.x);
    let ty = z * (view_pos.y / z).clamp(-lim.y, lim.y);

    let rz = 1.0 / z;
    let rz2 = rz * rz;

    // Third row is zero, only the 2x2 block is needed.
    let jacobian = Mat3::from_cols(
        Vec3::new(focal.x * rz, 0.0, 0.0),
        Vec3::new(0.0, focal.y * rz, 0.0),
        Vec3::new(-focal.x * tx * rz2, -focal.y * ty * rz2, 0.0),
    );

    let t = jacobian * view_rotation;
    let cov = t * cov3d * t.transpose();
    Mat2::from_cols(cov.x_axis.truncate(), cov.y_axis.truncate())
}

/// Analytic inverse of a 2x2 covariance with the determinant floored at `det_floor`.
pub fn invert_covariance(cov: Mat2, det_floor: f32) -> Mat2 {
    let det = cov.determinant().max(det_floor);
    Mat2::from_cols(
        Vec2::new(cov.y_axis.y, -cov.x_axis.y) / det,
        Vec2::new(-cov.y_axis.x, cov.x_axis.x) / det,
    )
}

/// Pixel radius covering `sigma` standard deviations along the major axis.
pub fn compute_radius(cov: Mat2, eigen_floor: f32, sigma: f32) -> u32 {
    let a = cov.x_axis.x;
    let b = cov.x_axis.y;
    let d = cov.y_axis.y;

    let mid = 0.5 * (a + d);
    let det = a * d - b * b;
    let lambda_max = mid + (mid * mid - det).max(eigen_floor).sqrt();
    (sigma * lambda_max.max(0.0).sqrt()).ceil() as u32
}

fn project_splat(
    splats: &Splats,
    index: usize,
    camera: &CameraModel,
    view_rotation: Mat3,
    config: &RenderConfig,
) -> Projection {
    let mean = splats.means()[index];
    let view_pos = camera.world_to_view(mean);
    let depth = view_pos.z;

    if depth.is_nan() {
        return Projection::Skipped;
    }
    if depth < config.near_z {
        return Projection::Culled;
    }
    if depth < config.depth_epsilon || !view_pos.is_finite() {
        return Projection::Skipped;
    }

    let clip = camera.world_to_clip(mean);
    let ndc = clip.truncate().truncate() / clip.w;
    let img_size = UVec2::new(camera.width(), camera.height());
    let pixel = ndc_to_pixel(ndc, img_size);

    let cov2d = covariance_2d(
        view_pos,
        splats.covariance_3d(index),
        view_rotation,
        camera.focal(),
        camera.tan_half_fov(),
        config.clamp_margin,
    );
    let inv_cov2d = invert_covariance(cov2d, config.det_floor);

    if !pixel.is_finite() || !cov2d.is_finite() || !inv_cov2d.is_finite() {
        return Projection::Skipped;
    }

    let radius = compute_radius(cov2d, config.eigen_floor, config.sigma);
    let bounds = PixelBounds::from_center_radius(pixel, radius as f32);

    Projection::Visible(ProjectedSplat {
        mean: pixel,
        cov2d,
        inv_cov2d,
        radius,
        bounds,
        depth,
    })
}

/// Culls, projects and depth sorts the splats for one camera.
///
/// The sort is stable, so splats at equal depth keep their scene order.
pub fn preprocess(splats: &Splats, camera: &CameraModel, config: &RenderConfig) -> PreprocessedScene {
    let _span = tracing::trace_span!("Preprocess").entered();

    // The stored world-view transform is in row form, so its rotation block is
    // already the transpose of the camera rotation.
    let view_rotation = Mat3::from_mat4(camera.world_view_transform()).transpose();

    let projections: Vec<_> = (0..splats.num_splats())
        .into_par_iter()
        .map(|i| project_splat(splats, i, camera, view_rotation, config))
        .collect();

    let mut num_culled = 0;
    let mut num_skipped = 0;
    let mut visible = Vec::with_capacity(projections.len());

    for (gid, projection) in projections.into_iter().enumerate() {
        match projection {
            Projection::Visible(p) => visible.push((gid as u32, p)),
            Projection::Culled => num_culled += 1,
            Projection::Skipped => num_skipped += 1,
        }
    }

    visible.sort_by(|(_, a), (_, b)| a.depth.total_cmp(&b.depth));

    let num_visible = visible.len();
    let mut scene = PreprocessedScene {
        means: Vec::with_capacity(num_visible),
        cov2d: Vec::with_capacity(num_visible),
        inv_cov2d: Vec::with_capacity(num_visible),
        radii: Vec::with_capacity(num_visible),
        bounds: Vec::with_capacity(num_visible),
        depths: Vec::with_capacity(num_visible),
        colors: Vec::with_capacity(num_visible),
        opacities: Vec::with_capacity(num_visible),
        global_from_compact_gid: Vec::with_capacity(num_visible),
        num_culled,
        num_skipped,
    };

    for (gid, p) in visible {
        let idx = gid as usize;
        scene.means.push(p.mean);
        scene.cov2d.push(p.cov2d);
        scene.inv_cov2d.push(p.inv_cov2d);
        scene.radii.push(p.radius);
        scene.bounds.push(p.bounds);
        scene.depths.push(p.depth);
        scene.colors.push(splats.colors()[idx]);
        scene.opacities.push(splats.opacity(idx));
        scene.global_from_compact_gid.push(gid);
    }

    if num_skipped > 0 {
        tracing::debug!("Skipped {num_skipped} splats with degenerate projections");
    }

    scene
}
