use crate::RenderStats;
use crate::preprocess::PreprocessedScene;
use crate::tiles::{TileBins, TileGrid};

/// Intermediate results of a render, kept around for stats and debugging.
#[derive(Debug, Clone)]
pub struct RenderAux {
    pub scene: PreprocessedScene,
    pub bins: TileBins,
    pub grid: TileGrid,
}

impl RenderAux {
    /// Number of splats binned to each tile, row-major over the tile grid.
    pub fn calc_tile_depth(&self) -> Vec<u32> {
        self.bins
            .tile_offsets
            .windows(2)
            .map(|w| w[1] - w[0])
            .collect()
    }

    pub fn num_intersections(&self) -> u32 {
        self.bins.num_intersections()
    }

    pub fn num_visible(&self) -> u32 {
        self.scene.num_visible() as u32
    }

    pub fn stats(&self) -> RenderStats {
        RenderStats {
            num_visible: self.num_visible(),
            num_intersections: self.num_intersections(),
            num_culled: self.scene.num_culled,
            num_skipped: self.scene.num_skipped,
        }
    }

    pub fn debug_assert_valid(&self) {
        let num_visible = self.scene.num_visible();

        assert_eq!(self.scene.cov2d.len(), num_visible);
        assert_eq!(self.scene.inv_cov2d.len(), num_visible);
        assert_eq!(self.scene.bounds.len(), num_visible);
        assert_eq!(self.scene.depths.len(), num_visible);
        assert_eq!(self.scene.colors.len(), num_visible);
        assert_eq!(self.scene.opacities.len(), num_visible);
        assert_eq!(self.scene.global_from_compact_gid.len(), num_visible);

        assert!(
            self.scene.depths.windows(2).all(|w| w[0] <= w[1]),
            "Splats are not sorted by depth"
        );

        assert_eq!(self.bins.num_tiles(), self.grid.num_tiles());
        assert!(
            self.bins.tile_offsets.windows(2).all(|w| w[0] <= w[1]),
            "Tile offsets must be increasing"
        );

        for tile_id in 0..self.grid.num_tiles() {
            let ids = self.bins.tile_splats(tile_id);
            assert!(
                ids.windows(2).all(|w| w[0] < w[1]),
                "Tile {tile_id} is not in depth order"
            );
            assert!(
                ids.iter().all(|&id| (id as usize) < num_visible),
                "Tile {tile_id} references a splat out of range"
            );
        }
    }
}
