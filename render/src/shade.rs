use crate::config::RenderConfig;
use crate::preprocess::PreprocessedScene;
use glam::{Mat2, Vec2, Vec3};

/// Unnormalized gaussian falloff `exp(-0.5 dᵀ Σ⁻¹ d)` at a pixel.
#[inline]
pub fn gaussian_weight(mean: Vec2, inv_cov: Mat2, pixel: Vec2) -> f32 {
    let d = mean - pixel;
    (-0.5 * d.dot(inv_cov * d)).exp()
}

/// Composites the given splats front to back at one pixel.
///
/// `splat_ids` index into `scene` and must be in depth order. Returns the
/// accumulated color and the transmittance left for the background.
pub fn shade_pixel(
    pixel: Vec2,
    splat_ids: &[u32],
    scene: &PreprocessedScene,
    config: &RenderConfig,
) -> (Vec3, f32) {
    let mut color = Vec3::ZERO;
    let mut trans = 1.0;

    for &id in splat_ids {
        let id = id as usize;
        let weight = gaussian_weight(scene.means[id], scene.inv_cov2d[id], pixel);
        let alpha = weight * scene.opacities[id];
        let next_trans = trans * (1.0 - alpha);

        if next_trans < config.min_transmittance {
            if config.composite_terminal_splat {
                color += trans * alpha * scene.colors[id];
                trans = next_trans;
            }
            break;
        }

        color += trans * alpha * scene.colors[id];
        trans = next_trans;
    }

    (color, trans)
}
