//! Tile grid computation.

use std::fmt;

/// Default square tile size when the server declares none.
pub const DEFAULT_TILE_SIZE: u32 = 512;

/// A rectangle of the image in absolute pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl TileRegion {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl fmt::Display for TileRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{},{})", self.x, self.y, self.width, self.height)
    }
}

/// Non-overlapping partition of an image into tile regions.
///
/// Regions are ordered row by row, left to right. The last column and row
/// are clipped to the image boundary, so every pixel belongs to exactly one
/// region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileGrid {
    width: u32,
    height: u32,
    tile_size: u32,
    cols: u32,
    rows: u32,
}

impl TileGrid {
    /// Grid for a `width` x `height` image with square tiles of `tile_size`.
    ///
    /// A tile size of 0 is treated as 1.
    pub fn new(width: u32, height: u32, tile_size: u32) -> Self {
        let tile_size = tile_size.max(1);
        Self {
            width,
            height,
            tile_size,
            cols: width.div_ceil(tile_size),
            rows: height.div_ceil(tile_size),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Total number of regions.
    pub fn len(&self) -> usize {
        self.cols as usize * self.rows as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Region at column `col`, row `row`, or `None` outside the grid.
    pub fn region(&self, col: u32, row: u32) -> Option<TileRegion> {
        if col >= self.cols || row >= self.rows {
            return None;
        }
        let x = col * self.tile_size;
        let y = row * self.tile_size;
        Some(TileRegion {
            x,
            y,
            width: self.tile_size.min(self.width - x),
            height: self.tile_size.min(self.height - y),
        })
    }

    /// All regions, rows first then columns.
    pub fn regions(&self) -> impl Iterator<Item = TileRegion> + '_ {
        (0..self.rows).flat_map(move |row| {
            (0..self.cols).filter_map(move |col| self.region(col, row))
        })
    }
}
