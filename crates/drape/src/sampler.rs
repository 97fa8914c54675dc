use geo::Rect;
use raster_tile::AnyRasterTile;

use crate::Coverage;

/// The result of sampling a tile at a world position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub value: f64,
    pub transparent: bool,
}

impl Sample {
    fn transparent(coverage: &Coverage) -> Self {
        Sample {
            value: coverage.no_data.unwrap_or(f64::NAN),
            transparent: true,
        }
    }
}

/// Samples the pixel of the tile that covers the world position (x, y)
/// Positions on the right or bottom edge of the tile footprint map onto the last column or row,
/// any other position that falls outside the pixel grid is transparent.
/// Masked pixels, nan pixels and pixels equal to the coverage nodata value are transparent.
pub fn sample_world_point(tile: &AnyRasterTile, tile_bbox: &Rect, x: f64, y: f64, coverage: &Coverage) -> Sample {
    if !tile_bbox.contains(x, y) || tile.width() == 0 || tile.height() == 0 {
        return Sample::transparent(coverage);
    }

    let row = ((tile_bbox.max_y() - y) / coverage.vert_res).floor();
    let col = ((x - tile_bbox.min_x()) / coverage.horz_res).floor();
    if !row.is_finite() || !col.is_finite() {
        return Sample::transparent(coverage);
    }

    let Some(row) = grid_index(row, tile.height(), y == tile_bbox.min_y()) else {
        return Sample::transparent(coverage);
    };
    let Some(col) = grid_index(col, tile.width(), x == tile_bbox.max_x()) else {
        return Sample::transparent(coverage);
    };

    let pixel = tile.fetch_pixel(row, col);
    if !pixel.opaque || pixel.value.is_nan() || coverage.is_no_data(pixel.value) {
        return Sample::transparent(coverage);
    }

    Sample {
        value: pixel.value,
        transparent: false,
    }
}

/// Pixel index for a floored grid offset, `on_far_edge` allows the index one past the grid
fn grid_index(offset: f64, len: usize, on_far_edge: bool) -> Option<usize> {
    if offset < 0.0 {
        return None;
    }

    let index = offset as usize;
    if index < len {
        Some(index)
    } else if index == len && on_far_edge {
        Some(len - 1)
    } else {
        None
    }
}
