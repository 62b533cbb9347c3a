use crate::error::{RenderError, Result};
use crate::preprocess::{PixelBounds, PreprocessedScene};
use glam::{IVec2, UVec2, uvec2};

pub fn calc_tile_bounds(img_size: UVec2, tile_size: u32) -> UVec2 {
    uvec2(img_size.x.div_ceil(tile_size), img_size.y.div_ceil(tile_size))
}

/// Partition of an image into square tiles.
///
/// Tiles on the right and bottom edge are clipped to the image when the image size
/// isn't a multiple of the tile size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    img_size: UVec2,
    tile_size: u32,
    tile_bounds: UVec2,
}

impl TileGrid {
    pub fn new(img_size: UVec2, tile_size: u32) -> Result<Self> {
        if img_size.x == 0 || img_size.y == 0 {
            return Err(RenderError::InvalidImageSize {
                width: img_size.x,
                height: img_size.y,
            });
        }
        if tile_size == 0 {
            return Err(RenderError::InvalidTileSize);
        }

        Ok(Self {
            img_size,
            tile_size,
            tile_bounds: calc_tile_bounds(img_size, tile_size),
        })
    }

    pub fn img_size(&self) -> UVec2 {
        self.img_size
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// Number of tiles along x and y.
    pub fn tile_bounds(&self) -> UVec2 {
        self.tile_bounds
    }

    pub fn num_tiles(&self) -> usize {
        (self.tile_bounds.x * self.tile_bounds.y) as usize
    }

    pub fn tile_id(&self, tile: UVec2) -> usize {
        (tile.y * self.tile_bounds.x + tile.x) as usize
    }

    pub fn tile_coords(&self, tile_id: usize) -> UVec2 {
        let id = tile_id as u32;
        uvec2(id % self.tile_bounds.x, id / self.tile_bounds.x)
    }

    /// Inclusive pixel extent of a tile, clipped to the image.
    pub fn tile_extent(&self, tile: UVec2) -> PixelBounds {
        let min = tile * self.tile_size;
        let max = ((tile + 1) * self.tile_size).min(self.img_size) - 1;
        PixelBounds {
            min: min.as_ivec2(),
            max: max.as_ivec2(),
        }
    }

    /// Inclusive range of tiles whose extent overlaps the given pixel bounds.
    pub fn tile_range(&self, bounds: &PixelBounds) -> Option<(UVec2, UVec2)> {
        let img_max = self.img_size.as_ivec2() - 1;
        if bounds.max.x < 0 || bounds.max.y < 0 || bounds.min.x > img_max.x || bounds.min.y > img_max.y {
            return None;
        }

        let min = bounds.min.clamp(IVec2::ZERO, img_max).as_uvec2();
        let max = bounds.max.clamp(IVec2::ZERO, img_max).as_uvec2();
        Some((min / self.tile_size, max / self.tile_size))
    }
}

/// Splats binned per tile in compressed row layout.
///
/// The splats of tile `t` are `compact_gid_from_isect[tile_offsets[t]..tile_offsets[t + 1]]`,
/// indices into the depth sorted [`PreprocessedScene`], in ascending depth order.
#[derive(Debug, Clone, Default)]
pub struct TileBins {
    pub tile_offsets: Vec<u32>,
    pub compact_gid_from_isect: Vec<u32>,
}

impl TileBins {
    pub fn tile_splats(&self, tile_id: usize) -> &[u32] {
        let start = self.tile_offsets[tile_id] as usize;
        let end = self.tile_offsets[tile_id + 1] as usize;
        &self.compact_gid_from_isect[start..end]
    }

    pub fn num_intersections(&self) -> u32 {
        self.compact_gid_from_isect.len() as u32
    }

    pub fn num_tiles(&self) -> usize {
        self.tile_offsets.len().saturating_sub(1)
    }
}

/// Assigns every visible splat to the tiles its bounding box overlaps.
///
/// Splats are visited in depth order, so each tile list stays depth sorted
/// without sorting per tile.
pub fn bin_splats(scene: &PreprocessedScene, grid: &TileGrid) -> TileBins {
    let _span = tracing::trace_span!("TileBinning").entered();

    let num_tiles = grid.num_tiles();
    let ranges: Vec<_> = scene.bounds.iter().map(|b| grid.tile_range(b)).collect();

    let mut tile_counts = vec![0u32; num_tiles];
    for (min, max) in ranges.iter().flatten() {
        for ty in min.y..=max.y {
            for tx in min.x..=max.x {
                tile_counts[grid.tile_id(uvec2(tx, ty))] += 1;
            }
        }
    }

    // Exclusive scan of the counts.
    let mut tile_offsets = Vec::with_capacity(num_tiles + 1);
    tile_offsets.push(0);
    for count in &tile_counts {
        let last = tile_offsets[tile_offsets.len() - 1];
        tile_offsets.push(last + count);
    }

    let num_intersections = tile_offsets[num_tiles] as usize;
    let mut compact_gid_from_isect = vec![0u32; num_intersections];
    let mut write_pos: Vec<u32> = tile_offsets[..num_tiles].to_vec();

    for (compact_gid, range) in ranges.iter().enumerate() {
        let Some((min, max)) = range else {
            continue;
        };
        for ty in min.y..=max.y {
            for tx in min.x..=max.x {
                let tile_id = grid.tile_id(uvec2(tx, ty));
                compact_gid_from_isect[write_pos[tile_id] as usize] = compact_gid as u32;
                write_pos[tile_id] += 1;
            }
        }
    }

    TileBins {
        tile_offsets,
        compact_gid_from_isect,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec2, ivec2};
    use rand::{Rng, SeedableRng, rngs::StdRng};

    fn scene_with_bounds(bounds: Vec<PixelBounds>) -> PreprocessedScene {
        PreprocessedScene {
            means: bounds.iter().map(|b| (b.min + b.max).as_vec2() * 0.5).collect(),
            bounds,
            ..Default::default()
        }
    }

    #[test]
    fn test_grid_covers_partial_tiles() {
        let grid = TileGrid::new(uvec2(20, 33), 16).unwrap();
        assert_eq!(grid.tile_bounds(), uvec2(2, 3));
        assert_eq!(grid.num_tiles(), 6);

        let last = grid.tile_extent(uvec2(1, 2));
        assert_eq!(last.min, ivec2(16, 32));
        assert_eq!(last.max, ivec2(19, 32));
    }

    #[test]
    fn test_grid_rejects_empty() {
        assert!(matches!(
            TileGrid::new(uvec2(0, 10), 16),
            Err(RenderError::InvalidImageSize { width: 0, height: 10 })
        ));
        assert!(matches!(
            TileGrid::new(uvec2(10, 10), 0),
            Err(RenderError::InvalidTileSize)
        ));
    }

    #[test]
    fn test_tile_range_offscreen() {
        let grid = TileGrid::new(uvec2(32, 32), 16).unwrap();
        let left = PixelBounds {
            min: ivec2(-10, 4),
            max: ivec2(-1, 8),
        };
        assert_eq!(grid.tile_range(&left), None);

        let edge = PixelBounds {
            min: ivec2(-10, 15),
            max: ivec2(0, 16),
        };
        assert_eq!(grid.tile_range(&edge), Some((uvec2(0, 0), uvec2(0, 1))));
    }

    #[test]
    fn test_tile_id_roundtrip() {
        let grid = TileGrid::new(uvec2(50, 20), 8).unwrap();
        for id in 0..grid.num_tiles() {
            assert_eq!(grid.tile_id(grid.tile_coords(id)), id);
        }
    }

    #[test]
    fn test_binning_matches_brute_force() {
        let mut rng = StdRng::seed_from_u64(42);
        let grid = TileGrid::new(uvec2(70, 45), 16).unwrap();

        let bounds: Vec<_> = (0..300)
            .map(|_| {
                let center = Vec2::new(rng.random_range(-20.0..90.0), rng.random_range(-20.0..65.0));
                let radius = rng.random_range(0.0..25.0f32);
                PixelBounds::from_center_radius(center, radius.ceil())
            })
            .collect();
        let scene = scene_with_bounds(bounds);
        let bins = bin_splats(&scene, &grid);

        assert_eq!(bins.num_tiles(), grid.num_tiles());
        for tile_id in 0..grid.num_tiles() {
            let extent = grid.tile_extent(grid.tile_coords(tile_id));
            let expected: Vec<u32> = scene
                .bounds
                .iter()
                .enumerate()
                .filter(|(_, b)| b.overlaps(&extent))
                .map(|(i, _)| i as u32)
                .collect();
            assert_eq!(bins.tile_splats(tile_id), expected.as_slice(), "tile {tile_id}");
        }
    }

    #[test]
    fn test_bins_keep_depth_order() {
        let b = PixelBounds {
            min: ivec2(0, 0),
            max: ivec2(40, 40),
        };
        let scene = scene_with_bounds(vec![b; 5]);
        let grid = TileGrid::new(uvec2(32, 32), 16).unwrap();
        let bins = bin_splats(&scene, &grid);

        assert_eq!(bins.num_intersections(), 20);
        for tile_id in 0..grid.num_tiles() {
            assert_eq!(bins.tile_splats(tile_id), &[0, 1, 2, 3, 4]);
        }
    }

    #[test]
    fn test_empty_scene_bins() {
        let grid = TileGrid::new(uvec2(32, 16), 16).unwrap();
        let bins = bin_splats(&PreprocessedScene::default(), &grid);
        assert_eq!(bins.tile_offsets, vec![0, 0, 0]);
        assert_eq!(bins.num_intersections(), 0);
    }
}
