use crate::camera::build_rotation;
use crate::error::{RenderError, Result};
use ball_tree::BallTree;
use glam::{Mat3, Quat, Vec3};

/// Scale given to splats created straight from reconstruction points.
pub const DEFAULT_SCALE: f32 = 0.001;
/// Opacity given to splats created straight from reconstruction points.
pub const DEFAULT_OPACITY: f32 = 0.9999;
/// Scales are never allowed below this.
pub const MIN_SCALE: f32 = 1e-5;

/// Raw opacities are clamped to +-this, where the sigmoid is already 0 or 1 in f32.
pub const MAX_LOGIT: f32 = 104.0;

const NUM_SCALE_NEIGHBORS: usize = 3;

/// The set of gaussians making up a scene.
///
/// Parameters are stored as parallel arrays, one entry per splat. Opacities are
/// kept as raw logits and go through a sigmoid wherever they're consumed.
#[derive(Debug, Clone, Default)]
pub struct Splats {
    means: Vec<Vec3>,
    rotations: Vec<Quat>,
    scales: Vec<Vec3>,
    colors: Vec<Vec3>,
    raw_opacities: Vec<f32>,
}

pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

pub fn inverse_sigmoid(x: f32) -> f32 {
    (x / (1.0 - x)).ln()
}

/// Covariance `(R·S)(R·S)ᵀ` of a gaussian with the given axis scales and rotation.
pub fn covariance_3d(scale: Vec3, rotation: Quat) -> Mat3 {
    let r = build_rotation(rotation);

    // S is diagonal, so R*S is just scaling the columns of R
    let rs = Mat3::from_cols(r.x_axis * scale.x, r.y_axis * scale.y, r.z_axis * scale.z);
    rs * rs.transpose()
}

impl Splats {
    /// Creates splats from reconstruction points with default shape and opacity.
    pub fn from_points(positions: &[Vec3], colors: &[Vec3]) -> Result<Self> {
        Self::from_raw(positions, None, None, Some(colors), None)
    }

    pub fn from_raw(
        means: &[Vec3],
        rotations: Option<&[Quat]>,
        scales: Option<&[Vec3]>,
        colors: Option<&[Vec3]>,
        raw_opacities: Option<&[f32]>,
    ) -> Result<Self> {
        let n_splats = means.len();

        check_len("rotations", rotations.map(<[_]>::len), n_splats)?;
        check_len("scales", scales.map(<[_]>::len), n_splats)?;
        check_len("colors", colors.map(<[_]>::len), n_splats)?;
        check_len("raw_opacities", raw_opacities.map(<[_]>::len), n_splats)?;

        let rotations = match rotations {
            Some(rotations) => rotations.to_vec(),
            None => vec![Quat::IDENTITY; n_splats],
        };

        let scales = match scales {
            Some(scales) => scales.iter().map(|s| clamp_scale(*s)).collect(),
            None => vec![Vec3::splat(DEFAULT_SCALE); n_splats],
        };

        let colors = match colors {
            Some(colors) => colors.iter().map(|c| clamp_color(*c)).collect(),
            None => vec![Vec3::splat(0.5); n_splats],
        };

        let raw_opacities = match raw_opacities {
            Some(raw_opacities) => raw_opacities.iter().map(|o| clamp_logit(*o)).collect(),
            None => vec![inverse_sigmoid(DEFAULT_OPACITY); n_splats],
        };

        Ok(Self {
            means: means.to_vec(),
            rotations,
            scales,
            colors,
            raw_opacities,
        })
    }

    pub fn num_splats(&self) -> usize {
        self.means.len()
    }

    pub fn is_empty(&self) -> bool {
        self.means.is_empty()
    }

    pub fn means(&self) -> &[Vec3] {
        &self.means
    }

    pub fn rotations(&self) -> &[Quat] {
        &self.rotations
    }

    pub fn scales(&self) -> &[Vec3] {
        &self.scales
    }

    pub fn colors(&self) -> &[Vec3] {
        &self.colors
    }

    pub fn raw_opacities(&self) -> &[f32] {
        &self.raw_opacities
    }

    pub fn opacity(&self, index: usize) -> f32 {
        sigmoid(self.raw_opacities[index])
    }

    pub fn opacities(&self) -> Vec<f32> {
        self.raw_opacities.iter().map(|&o| sigmoid(o)).collect()
    }

    /// Axis aligned min/max corners of the splat centers.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = *self.means.first()?;
        Some(
            self.means
                .iter()
                .fold((first, first), |(min, max), p| (min.min(*p), max.max(*p))),
        )
    }

    pub fn covariance_3d(&self, index: usize) -> Mat3 {
        covariance_3d(self.scales[index], self.rotations[index])
    }

    /// Covariance of every splat. Not cached, as scales and rotations could change
    /// between renders.
    pub fn covariances_3d(&self) -> Vec<Mat3> {
        self.scales
            .iter()
            .zip(&self.rotations)
            .map(|(scale, rotation)| covariance_3d(*scale, *rotation))
            .collect()
    }

    /// Replaces every scale with the mean distance to the splat's three nearest
    /// neighbours, which adapts the initial splat size to the point density.
    ///
    /// This is opt-in and not part of normal construction.
    pub fn init_scales_from_neighbors(&mut self) {
        if self.means.len() < 2 {
            return;
        }

        let tree_pos: Vec<[f64; 3]> = self
            .means
            .iter()
            .map(|v| [v.x as f64, v.y as f64, v.z as f64])
            .collect();

        let empty = vec![(); tree_pos.len()];
        let tree = BallTree::new(tree_pos.clone(), empty);

        self.scales = tree_pos
            .iter()
            .map(|p| {
                // The closest hit is the point itself.
                let (sum, count) = tree
                    .query()
                    .nn(p)
                    .skip(1)
                    .take(NUM_SCALE_NEIGHBORS)
                    .fold((0.0, 0usize), |(sum, count), x| (sum + x.1, count + 1));
                sum / count.max(1) as f64
            })
            .map(|d| Vec3::splat((d as f32).max(MIN_SCALE)))
            .collect();
    }
}

fn check_len(name: &'static str, len: Option<usize>, expected: usize) -> Result<()> {
    match len {
        Some(actual) if actual != expected => Err(RenderError::DimMismatch {
            name,
            actual,
            expected,
        }),
        _ => Ok(()),
    }
}

fn clamp_scale(scale: Vec3) -> Vec3 {
    let scale = Vec3::select(scale.is_nan_mask(), Vec3::splat(MIN_SCALE), scale);
    scale.max(Vec3::splat(MIN_SCALE))
}

fn clamp_color(color: Vec3) -> Vec3 {
    let color = Vec3::select(color.is_nan_mask(), Vec3::ZERO, color);
    color.clamp(Vec3::ZERO, Vec3::ONE)
}

// A NaN logit makes the splat fully transparent, infinities saturate.
fn clamp_logit(raw_opacity: f32) -> f32 {
    if raw_opacity.is_nan() {
        -MAX_LOGIT
    } else {
        raw_opacity.clamp(-MAX_LOGIT, MAX_LOGIT)
    }
}
