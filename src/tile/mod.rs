//! Tile stitching.
//!
//! When a server will not hand over the full-resolution image in one request,
//! the image is rebuilt from tiles:
//!
//! - [`TileGrid`]: partitions `width x height` into row-major [`TileRegion`]s,
//!   clipping the last row and column at the image edge
//! - [`TileStitcher`]: fetches each region with its ordered request variants
//!   and composites it into an owned canvas
//! - [`JpegCodec`]: decodes tiles, forces exact tile dimensions, and encodes
//!   the canvas at a fixed quality
//!
//! # Example
//!
//! ```
//! use iiif_fetch::tile::{TileGrid, TileRegion};
//!
//! let grid = TileGrid::new(1000, 700, 512);
//! assert_eq!((grid.cols(), grid.rows()), (2, 2));
//! assert_eq!(grid.regions().last(), Some(TileRegion::new(512, 512, 488, 188)));
//! ```

mod encoder;
mod grid;
mod stitcher;

pub use encoder::{JpegCodec, STITCH_JPEG_QUALITY};
pub use grid::{TileGrid, TileRegion, DEFAULT_TILE_SIZE};
pub use stitcher::{canvas_bytes, tile_variants, TileStitcher, MAX_CANVAS_BYTES};
