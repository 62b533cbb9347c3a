use crate::camera::CameraModel;
use crate::config::RenderConfig;
use crate::error::Result;
use crate::gaussian_splats::Splats;
use crate::image::RenderImage;
use crate::preprocess::{PreprocessedScene, preprocess};
use crate::render_aux::RenderAux;
use crate::shade::shade_pixel;
use crate::tiles::{TileBins, TileGrid, bin_splats};
use glam::{Vec2, Vec3, uvec2};
use rayon::prelude::*;

/// Renders the splats as seen by the camera.
///
/// All splats are projected and depth sorted before any tile is shaded. Tiles are
/// then shaded in parallel, one row of tiles per task.
pub fn render_splats(
    splats: &Splats,
    camera: &CameraModel,
    config: &RenderConfig,
) -> Result<(RenderImage, RenderAux)> {
    let img_size = uvec2(camera.width(), camera.height());
    let grid = TileGrid::new(img_size, config.tile_size)?;

    let scene = preprocess(splats, camera, config);
    let bins = bin_splats(&scene, &grid);
    let img = rasterize(&scene, &bins, &grid, config);

    tracing::debug!(
        "Rendered {} with {} visible splats, {} intersections",
        camera.name(),
        scene.num_visible(),
        bins.num_intersections()
    );

    Ok((img, RenderAux { scene, bins, grid }))
}

/// Shades every tile that has splats binned to it. Other pixels keep the background.
pub fn rasterize(
    scene: &PreprocessedScene,
    bins: &TileBins,
    grid: &TileGrid,
    config: &RenderConfig,
) -> RenderImage {
    let _span = tracing::trace_span!("Rasterize").entered();

    let img_size = grid.img_size();
    let background = Vec3::from(config.background);
    let mut img = RenderImage::new(img_size.x, img_size.y, background);

    let width = img_size.x as usize;
    let tile_size = grid.tile_size();
    let band_len = width * tile_size as usize;

    img.pixels_mut()
        .par_chunks_mut(band_len)
        .enumerate()
        .for_each(|(ty, band)| {
            let band_y = ty as u32 * tile_size;

            for tx in 0..grid.tile_bounds().x {
                let tile = uvec2(tx, ty as u32);
                let ids = bins.tile_splats(grid.tile_id(tile));
                if ids.is_empty() {
                    continue;
                }

                let extent = grid.tile_extent(tile);
                for y in extent.min.y..=extent.max.y {
                    let row = (y as u32 - band_y) as usize * width;
                    for x in extent.min.x..=extent.max.x {
                        let pixel = Vec2::new(x as f32, y as f32);
                        let (color, trans) = shade_pixel(pixel, ids, scene, config);
                        band[row + x as usize] = color + trans * background;
                    }
                }
            }
        });

    img
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{Intrinsics, Pose};
    use crate::error::RenderError;
    use glam::{Quat, vec3};
    use rand::{Rng, SeedableRng, rngs::StdRng};

    fn test_camera(width: u32, height: u32) -> CameraModel {
        let intrinsics = Intrinsics {
            focal_x: 40.0,
            focal_y: 40.0,
            principal_x: width as f32 / 2.0,
            principal_y: height as f32 / 2.0,
            width,
            height,
        };
        CameraModel::new("test", intrinsics, Pose::default())
    }

    // World position at depth `z` that projects to the given pixel.
    fn point_at_pixel(camera: &CameraModel, pixel: Vec2, z: f32) -> Vec3 {
        let size = Vec2::new(camera.width() as f32, camera.height() as f32);
        let ndc = pixel * 2.0 / (size - 1.0) - 1.0;
        let view = ndc * camera.tan_half_fov() * z;
        vec3(view.x, view.y, z)
    }

    fn single_splat(mean: Vec3, scale: f32, color: Vec3, raw_opacity: f32) -> Splats {
        Splats::from_raw(
            &[mean],
            None,
            Some(&[Vec3::splat(scale)]),
            Some(&[color]),
            Some(&[raw_opacity]),
        )
        .unwrap()
    }

    #[test]
    fn test_single_red_splat() {
        let camera = test_camera(32, 32);
        let splats = single_splat(vec3(0.0, 0.0, 2.0), 0.1, Vec3::X, 10.0);
        let (img, aux) = render_splats(&splats, &camera, &RenderConfig::new()).unwrap();
        aux.debug_assert_valid();

        let center = img.get_pixel(15, 15);
        assert!(center.x > 0.9, "{center}");
        assert_eq!(center.y, 0.0);
        assert_eq!(center.z, 0.0);

        let near = img.get_pixel(17, 15);
        let far = img.get_pixel(20, 15);
        assert!(center.x > near.x && near.x > far.x);
        assert!(img.get_pixel(0, 31).x < 1e-6);

        let stats = aux.stats();
        assert_eq!(stats.num_visible, 1);
        assert_eq!(stats.num_intersections, 4);
    }

    #[test]
    fn test_nearer_splat_occludes() {
        let camera = test_camera(32, 32);
        // The far red splat comes first in the scene, depth decides the order.
        let splats = Splats::from_raw(
            &[vec3(0.0, 0.0, 4.0), vec3(0.0, 0.0, 2.0)],
            None,
            Some(&[Vec3::splat(0.3), Vec3::splat(0.2)]),
            Some(&[Vec3::X, Vec3::Y]),
            Some(&[10.0, 10.0]),
        )
        .unwrap();
        let (img, aux) = render_splats(&splats, &camera, &RenderConfig::new()).unwrap();

        assert_eq!(aux.scene.global_from_compact_gid, vec![1, 0]);
        let center = img.get_pixel(15, 15);
        assert!(center.y > 0.9, "{center}");
        assert!(center.x < 0.1, "{center}");
    }

    #[test]
    fn test_opaque_nearer_splat_hides_farther() {
        // Odd size puts the optical axis on pixel (16, 16).
        let camera = test_camera(33, 33);
        let splats = Splats::from_raw(
            &[vec3(0.0, 0.0, 5.0), vec3(0.0, 0.0, 2.0)],
            None,
            Some(&[Vec3::splat(0.3), Vec3::splat(0.3)]),
            Some(&[Vec3::X, Vec3::Y]),
            Some(&[20.0, 20.0]),
        )
        .unwrap();
        let (img, _) = render_splats(&splats, &camera, &RenderConfig::new()).unwrap();

        let center = img.get_pixel(16, 16);
        assert!((center - Vec3::Y).abs().max_element() < 1e-5, "{center}");
    }

    #[test]
    fn test_untouched_tiles_keep_background() {
        let camera = test_camera(64, 64);
        let mean = point_at_pixel(&camera, Vec2::new(6.0, 6.0), 2.0);
        let splats = single_splat(mean, 0.05, Vec3::X, 10.0);
        let config = RenderConfig::new().with_background([0.0, 0.0, 1.0]);
        let (img, aux) = render_splats(&splats, &camera, &config).unwrap();

        let depth = aux.calc_tile_depth();
        assert_eq!(depth[0], 1);
        assert!(depth[1..].iter().all(|&d| d == 0));

        for y in 16..64 {
            for x in 0..64 {
                assert_eq!(img.get_pixel(x, y), Vec3::Z);
            }
        }
        let hit = img.get_pixel(6, 6);
        assert!(hit.x > 0.9 && hit.z < 0.1, "{hit}");
    }

    #[test]
    fn test_partial_trailing_tile() {
        let camera = test_camera(20, 20);
        let mean = point_at_pixel(&camera, Vec2::new(18.0, 18.0), 2.0);
        let splats = single_splat(mean, 0.05, Vec3::X, 10.0);
        let (img, aux) = render_splats(&splats, &camera, &RenderConfig::new()).unwrap();

        assert_eq!(aux.grid.tile_bounds(), uvec2(2, 2));
        assert!(img.get_pixel(18, 18).x > 0.5);
        assert_eq!(img.get_pixel(2, 2), Vec3::ZERO);
    }

    #[test]
    fn test_render_deterministic() {
        let mut rng = StdRng::seed_from_u64(9);
        let count = 400;
        let means: Vec<_> = (0..count)
            .map(|_| {
                vec3(
                    rng.random_range(-1.5..1.5),
                    rng.random_range(-1.5..1.5),
                    rng.random_range(0.5..5.0),
                )
            })
            .collect();
        let rotations: Vec<_> = (0..count)
            .map(|_| Quat::from_rotation_y(rng.random_range(0.0..3.0)))
            .collect();
        let scales: Vec<_> = (0..count)
            .map(|_| vec3(rng.random_range(0.01..0.2), rng.random_range(0.01..0.2), 0.05))
            .collect();
        let colors: Vec<_> = (0..count)
            .map(|_| vec3(rng.random(), rng.random(), rng.random()))
            .collect();
        let splats = Splats::from_raw(&means, Some(&rotations), Some(&scales), Some(&colors), None).unwrap();

        let camera = test_camera(50, 40);
        let config = RenderConfig::new();
        let (a, aux) = render_splats(&splats, &camera, &config).unwrap();
        let (b, _) = render_splats(&splats, &camera, &config).unwrap();
        aux.debug_assert_valid();

        let bits = |img: &RenderImage| -> Vec<u32> { img.to_rgb32f().iter().map(|c| c.to_bits()).collect() };
        assert_eq!(bits(&a), bits(&b));
        assert!(a.pixels().iter().all(|p| p.is_finite() && p.max_element() <= 1.0 + 1e-5));
    }

    #[test]
    fn test_empty_scene_renders_background() {
        let camera = test_camera(24, 18);
        let config = RenderConfig::new().with_background([0.2, 0.3, 0.4]);
        let (img, aux) = render_splats(&Splats::default(), &camera, &config).unwrap();
        assert_eq!(aux.num_visible(), 0);
        assert!(img.pixels().iter().all(|p| *p == vec3(0.2, 0.3, 0.4)));
    }

    #[test]
    fn test_invalid_sizes() {
        let camera = test_camera(0, 10);
        let result = render_splats(&Splats::default(), &camera, &RenderConfig::new());
        assert!(matches!(result, Err(RenderError::InvalidImageSize { .. })));

        let camera = test_camera(10, 10);
        let config = RenderConfig::new().with_tile_size(0);
        let result = render_splats(&Splats::default(), &camera, &config);
        assert!(matches!(result, Err(RenderError::InvalidTileSize)));
    }
}
