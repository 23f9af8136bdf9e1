//! Tile binning.
//!
//! The framebuffer is partitioned into a fixed grid of square tiles. The
//! geometry frontend appends one record per (triangle, covered tile); the
//! backend replays each tile's records in insertion order, which preserves
//! submission order within the tile. Records hold arena offsets, not
//! pointers.

use crate::raster::Rect;
use glint_render::PipelineHandle;

pub const DEFAULT_TILE_SIZE: u32 = 64;

/// One binned triangle reference.
#[derive(Copy, Clone, Debug)]
pub struct BinRecord {
    pub pipeline: PipelineHandle,
    /// Arena offset of the `TriangleData`.
    pub triangle: u32,
    /// Arena offset of the draw's `DrawSnapshot`.
    pub snapshot: u32,
}

#[derive(Default)]
struct Tile {
    records: Vec<BinRecord>,
}

pub struct TileGrid {
    tile_size: u32,
    fb_width: u32,
    fb_height: u32,
    grid_width: u32,
    grid_height: u32,
    tiles: Vec<Tile>,
}

impl TileGrid {
    pub fn new(tile_size: u32) -> TileGrid {
        TileGrid {
            tile_size: tile_size.max(8),
            fb_width: 0,
            fb_height: 0,
            grid_width: 0,
            grid_height: 0,
            tiles: Vec::new(),
        }
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn tile_count(&self) -> usize {
        (self.grid_width * self.grid_height) as usize
    }

    /// Rebuilds the grid for the framebuffer extents and empties all bins.
    /// Record storage is kept to avoid per-frame allocation churn.
    pub fn begin_frame(&mut self, fb_width: u32, fb_height: u32) {
        self.fb_width = fb_width;
        self.fb_height = fb_height;
        self.grid_width = (fb_width + self.tile_size - 1) / self.tile_size;
        self.grid_height = (fb_height + self.tile_size - 1) / self.tile_size;
        let count = (self.grid_width * self.grid_height) as usize;
        if self.tiles.len() < count {
            self.tiles.resize_with(count, Tile::default);
        }
        for tile in self.tiles.iter_mut() {
            tile.records.clear();
        }
    }

    /// Appends a record to every tile the screen-space AABB overlaps.
    pub fn bin_triangle(&mut self, min_x: f32, min_y: f32, max_x: f32, max_y: f32, record: BinRecord) {
        if self.grid_width == 0 || self.grid_height == 0 {
            return;
        }
        let ts = self.tile_size as f32;
        let tx0 = ((min_x / ts).floor().max(0.0)) as u32;
        let ty0 = ((min_y / ts).floor().max(0.0)) as u32;
        let tx1 = ((max_x / ts).floor()) as i64;
        let ty1 = ((max_y / ts).floor()) as i64;
        if tx1 < 0 || ty1 < 0 {
            return;
        }
        let tx1 = (tx1 as u32).min(self.grid_width - 1);
        let ty1 = (ty1 as u32).min(self.grid_height - 1);
        if tx0 > tx1 || ty0 > ty1 {
            return;
        }
        for ty in ty0..=ty1 {
            for tx in tx0..=tx1 {
                self.tiles[(ty * self.grid_width + tx) as usize]
                    .records
                    .push(record);
            }
        }
    }

    /// Screen rectangle of a tile, clamped to the framebuffer.
    pub fn tile_rect(&self, index: usize) -> Rect {
        let tx = index as u32 % self.grid_width;
        let ty = index as u32 / self.grid_width;
        let x = tx * self.tile_size;
        let y = ty * self.tile_size;
        Rect {
            x: x as i32,
            y: y as i32,
            w: (self.fb_width - x).min(self.tile_size) as i32,
            h: (self.fb_height - y).min(self.tile_size) as i32,
        }
    }

    pub fn records(&self, index: usize) -> &[BinRecord] {
        &self.tiles[index].records
    }

    /// Indices of tiles that received at least one record.
    pub fn occupied_tiles(&self) -> Vec<usize> {
        (0..self.tile_count())
            .filter(|&i| !self.tiles[i].records.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glint_render::handle::RawHandle;

    fn record() -> BinRecord {
        BinRecord {
            pipeline: PipelineHandle(RawHandle::new(1, 0)),
            triangle: 0,
            snapshot: 0,
        }
    }

    #[test]
    fn grid_dimensions_round_up() {
        let mut grid = TileGrid::new(64);
        grid.begin_frame(130, 64);
        assert_eq!(grid.tile_count(), 3);
        assert_eq!(grid.tile_rect(2), Rect { x: 128, y: 0, w: 2, h: 64 });
    }

    #[test]
    fn triangle_lands_in_covered_tiles_only() {
        let mut grid = TileGrid::new(64);
        grid.begin_frame(128, 128);
        grid.bin_triangle(10.0, 10.0, 70.0, 20.0, record());
        assert_eq!(grid.records(0).len(), 1);
        assert_eq!(grid.records(1).len(), 1);
        assert_eq!(grid.records(2).len(), 0);
        assert_eq!(grid.records(3).len(), 0);
    }

    #[test]
    fn off_screen_boxes_are_ignored() {
        let mut grid = TileGrid::new(64);
        grid.begin_frame(128, 128);
        grid.bin_triangle(-50.0, -50.0, -10.0, -10.0, record());
        grid.bin_triangle(300.0, 0.0, 400.0, 10.0, record());
        assert!(grid.occupied_tiles().is_empty());
        // straddling the left edge still bins into tile 0
        grid.bin_triangle(-50.0, 0.0, 5.0, 5.0, record());
        assert_eq!(grid.occupied_tiles(), vec![0]);
    }

    #[test]
    fn records_keep_insertion_order() {
        let mut grid = TileGrid::new(64);
        grid.begin_frame(64, 64);
        for i in 0..4 {
            let mut r = record();
            r.triangle = i;
            grid.bin_triangle(0.0, 0.0, 10.0, 10.0, r);
        }
        let order: Vec<u32> = grid.records(0).iter().map(|r| r.triangle).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
    }
}
