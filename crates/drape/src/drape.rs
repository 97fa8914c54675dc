use geo::{Geometry, Ordinate, Rect, wkb};
use raster_tile::AnyRasterTile;

use crate::{Coverage, CoverageStore, DrapeContext, Error, GeometryStore, Result, sampler::sample_world_point};

/// Statistics of draping a single coverage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrapeStats {
    pub coverage: String,
    pub tiles_processed: usize,
    pub tiles_skipped: usize,
    pub features_updated: usize,
    pub vertices_draped: usize,
}

/// Assigns sampled tile values to the vertices of the geometry that are inside the tile
/// Only vertices whose `ordinate` still equals `no_data` are considered, the first opaque sample claims the vertex.
/// Returns the number of vertices that were modified.
pub fn drape_with_tile(
    geom: &mut Geometry,
    tile: &AnyRasterTile,
    footprint: &Rect,
    coverage: &Coverage,
    ordinate: Ordinate,
    no_data: f64,
) -> usize {
    let is_no_data = |value: f64| value == no_data || (value.is_nan() && no_data.is_nan());
    let mut draped = 0;

    for line in geom.shape_mut().coordinate_sequences_mut() {
        if !line.bbox().is_some_and(|bbox| bbox.intersects(footprint)) {
            continue;
        }

        for i in 0..line.len() {
            let (x, y) = line.xy(i);
            if !footprint.contains(x, y) || !line.ordinate(i, ordinate).is_some_and(is_no_data) {
                continue;
            }

            let sample = sample_world_point(tile, footprint, x, y, coverage);
            if !sample.transparent && line.set_ordinate(i, ordinate, sample.value) {
                draped += 1;
            }
        }
    }

    for point in geom.shape_mut().points_mut() {
        if !footprint.contains(point.x(), point.y()) || !point.ordinate(ordinate).is_some_and(is_no_data) {
            continue;
        }

        let sample = sample_world_point(tile, footprint, point.x(), point.y(), coverage);
        if !sample.transparent {
            *point = point.with_ordinate(ordinate, sample.value);
            draped += 1;
        }
    }

    draped
}

/// Drapes the target column of the context on every level 0 tile of the coverage
pub fn drape_coverage<S>(store: &mut S, ctx: &DrapeContext, coverage: &Coverage) -> Result<DrapeStats>
where
    S: GeometryStore + CoverageStore + ?Sized,
{
    let mut stats = DrapeStats {
        coverage: coverage.name.clone(),
        ..Default::default()
    };

    let table = ctx.table.as_str();
    let column = ctx.target.column.as_str();

    for tile_id in store.tile_ids(&coverage.name, 0)? {
        let Some(record) = store.read_tile(&coverage.name, tile_id)? else {
            continue;
        };

        let (Some(footprint), Some(payload)) = (record.footprint, record.payload) else {
            log::debug!("Skipping tile {tile_id} of coverage {}: no footprint or pixel data", coverage.name);
            stats.tiles_skipped += 1;
            continue;
        };

        let tile = AnyRasterTile::from_bytes(&payload)
            .map_err(|e| Error::Decode(format!("Invalid tile {tile_id} in coverage '{}': {e}", coverage.name)))?;

        for row in store.row_ids(table, column, Some(&footprint))? {
            let Some(blob) = store.read_geometry(table, column, row)? else {
                continue;
            };

            let mut geom = match wkb::decode(&blob) {
                Ok(geom) => geom,
                Err(e) => {
                    log::debug!("Skipping row {row} of {table}.{column}: {e}");
                    continue;
                }
            };

            if !geom.bbox().is_some_and(|bbox| bbox.intersects(&footprint)) {
                continue;
            }

            let draped = drape_with_tile(&mut geom, &tile, &footprint, coverage, ctx.ordinate, ctx.no_data);
            if draped > 0 {
                store.write_geometry(table, column, row, &geom)?;
                stats.features_updated += 1;
                stats.vertices_draped += draped;
            }
        }

        stats.tiles_processed += 1;
    }

    Ok(stats)
}
