//! Store on top of an SQLite database.
//!
//! Feature tables keep their geometries as extended WKB blobs, the geometry columns are
//! registered in `geometry_columns` and spatial indexes are `rtree` virtual tables named
//! `idx_<table>_<column>`. Raster coverages are registered in `raster_coverages`, the tiles of a
//! coverage are stored in `<coverage>_tiles`.

use std::path::Path;

use geo::{Dimensions, Geometry, GeometryType, Rect, wkb};
use raster_tile::SampleType;
use sqlite::{AccessMode, Connection, quote_identifier};

use crate::{Coverage, CoverageStore, Error, GeometryColumn, GeometryStore, Result, RowId, TileId, TileRecord};

const METADATA_TABLES: &str = "
CREATE TABLE IF NOT EXISTS geometry_columns (
    f_table_name TEXT NOT NULL,
    f_geometry_column TEXT NOT NULL,
    geometry_type INTEGER NOT NULL,
    coord_dimension INTEGER NOT NULL,
    srid INTEGER NOT NULL,
    spatial_index_enabled INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (f_table_name, f_geometry_column)
);
CREATE TABLE IF NOT EXISTS raster_coverages (
    coverage_name TEXT NOT NULL PRIMARY KEY,
    sample_type TEXT NOT NULL,
    srid INTEGER NOT NULL,
    horz_resolution REAL NOT NULL,
    vert_resolution REAL NOT NULL,
    strict_resolution INTEGER NOT NULL DEFAULT 1,
    nodata_pixel REAL
);
";

/// Geometry type code with the ISO dimension offset (1000 z, 2000 m, 3000 zm)
pub fn iso_geometry_type_code(geometry_type: GeometryType, dims: Dimensions) -> i64 {
    let offset = match dims {
        Dimensions::Xy => 0,
        Dimensions::Xyz => 1000,
        Dimensions::Xym => 2000,
        Dimensions::Xyzm => 3000,
    };

    offset + geometry_type.code() as i64
}

pub fn geometry_type_from_iso_code(code: i64) -> Result<(GeometryType, Dimensions)> {
    let dims = match code / 1000 {
        0 => Dimensions::Xy,
        1 => Dimensions::Xyz,
        2 => Dimensions::Xym,
        3 => Dimensions::Xyzm,
        _ => return Err(Error::InvalidArgument(format!("Invalid geometry type code: {code}"))),
    };

    let geometry_type = u32::try_from(code % 1000)
        .ok()
        .and_then(GeometryType::from_code)
        .ok_or_else(|| Error::InvalidArgument(format!("Invalid geometry type code: {code}")))?;

    Ok((geometry_type, dims))
}

fn coord_dimension(dims: Dimensions) -> i64 {
    dims.stride() as i64
}

fn spatial_index_name(table: &str, column: &str) -> String {
    format!("idx_{table}_{column}")
}

fn tiles_table_name(coverage: &str) -> String {
    format!("{coverage}_tiles")
}

pub struct SqliteStore {
    conn: Connection,
    saved_pragmas: Vec<(&'static str, String)>,
}

impl SqliteStore {
    /// Opens (or creates) the database and makes sure the metadata tables exist
    pub fn open(path: &Path) -> Result<Self> {
        Self::from_connection(Connection::new(path, AccessMode::Create)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_sql_statements(METADATA_TABLES)?;
        Ok(SqliteStore {
            conn,
            saved_pragmas: Vec::new(),
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Creates an empty feature table, geometry columns are added with `create_geometry_column`
    pub fn create_feature_table(&self, table: &str) -> Result<()> {
        self.conn.execute(&format!(
            "CREATE TABLE {} (id INTEGER PRIMARY KEY AUTOINCREMENT)",
            quote_identifier(table)
        ))
    }

    /// Inserts a new feature row with the geometry stored in the column, returns the rowid
    pub fn insert_geometry(&self, table: &str, column: &str, geom: &Geometry) -> Result<RowId> {
        self.insert_blob(table, column, Some(&wkb::encode(geom)?))
    }

    pub fn insert_blob(&self, table: &str, column: &str, blob: Option<&[u8]>) -> Result<RowId> {
        let stmt = self.conn.prepare_statement(&format!(
            "INSERT INTO {} ({}) VALUES (?1)",
            quote_identifier(table),
            quote_identifier(column)
        ))?;
        stmt.bind_optional_blob(1, blob)?;
        stmt.execute()?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn geometry(&self, table: &str, column: &str, row: RowId) -> Result<Option<Geometry>> {
        self.read_geometry(table, column, row)?
            .map(|blob| wkb::decode(&blob))
            .transpose()
    }

    /// Registers a coverage and creates its (empty) tiles table
    pub fn register_coverage(&self, coverage: &Coverage) -> Result<()> {
        let stmt = self.conn.prepare_statement(
            "INSERT INTO raster_coverages (coverage_name, sample_type, srid, horz_resolution, vert_resolution, strict_resolution, nodata_pixel)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        stmt.bind_text(1, &coverage.name)?;
        stmt.bind_text(2, coverage.sample_type.to_str())?;
        stmt.bind(3, coverage.srid)?;
        stmt.bind_double(4, coverage.horz_res)?;
        stmt.bind_double(5, coverage.vert_res)?;
        stmt.bind(6, coverage.strict_resolution as i32)?;
        stmt.bind_optional_double(7, coverage.no_data)?;
        stmt.execute()?;

        self.conn.execute(&format!(
            "CREATE TABLE {} (
                tile_id INTEGER PRIMARY KEY AUTOINCREMENT,
                pyramid_level INTEGER NOT NULL DEFAULT 0,
                minx REAL, miny REAL, maxx REAL, maxy REAL,
                tile_data BLOB
            )",
            quote_identifier(&tiles_table_name(&coverage.name))
        ))?;

        log::debug!("Registered coverage {} ({}, srid {})", coverage.name, coverage.sample_type, coverage.srid);
        Ok(())
    }

    pub fn insert_tile(&self, coverage: &str, pyramid_level: i32, footprint: Option<&Rect>, payload: Option<&[u8]>) -> Result<TileId> {
        let stmt = self.conn.prepare_statement(&format!(
            "INSERT INTO {} (pyramid_level, minx, miny, maxx, maxy, tile_data) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            quote_identifier(&tiles_table_name(coverage))
        ))?;
        stmt.bind(1, pyramid_level)?;
        stmt.bind_optional_double(2, footprint.map(Rect::min_x))?;
        stmt.bind_optional_double(3, footprint.map(Rect::min_y))?;
        stmt.bind_optional_double(4, footprint.map(Rect::max_x))?;
        stmt.bind_optional_double(5, footprint.map(Rect::max_y))?;
        stmt.bind_optional_blob(6, payload)?;
        stmt.execute()?;
        Ok(self.conn.last_insert_rowid())
    }

    fn spatial_index_enabled(&self, table: &str, column: &str) -> Result<bool> {
        Ok(self
            .geometry_column(table, column)?
            .is_some_and(|col| col.spatial_index))
    }

    fn update_spatial_index(&self, table: &str, column: &str, row: RowId, bbox: Option<Rect>) -> Result<()> {
        let index = quote_identifier(&spatial_index_name(table, column));
        match bbox {
            Some(bbox) => {
                let stmt = self.conn.prepare_statement(&format!(
                    "INSERT OR REPLACE INTO {index} (pkid, xmin, xmax, ymin, ymax) VALUES (?1, ?2, ?3, ?4, ?5)"
                ))?;
                stmt.bind_int64(1, row)?;
                stmt.bind_double(2, bbox.min_x())?;
                stmt.bind_double(3, bbox.max_x())?;
                stmt.bind_double(4, bbox.min_y())?;
                stmt.bind_double(5, bbox.max_y())?;
                stmt.execute()
            }
            None => {
                let stmt = self.conn.prepare_statement(&format!("DELETE FROM {index} WHERE pkid = ?1"))?;
                stmt.bind_int64(1, row)?;
                stmt.execute()
            }
        }
    }
}

impl GeometryStore for SqliteStore {
    fn table_exists(&self, table: &str) -> Result<bool> {
        self.conn.table_exists(table)
    }

    fn column_exists(&self, table: &str, column: &str) -> Result<bool> {
        self.conn.column_exists(table, column)
    }

    fn geometry_column(&self, table: &str, column: &str) -> Result<Option<GeometryColumn>> {
        let mut stmt = self.conn.prepare_statement(
            "SELECT f_table_name, f_geometry_column, geometry_type, srid, spatial_index_enabled FROM geometry_columns
             WHERE lower(f_table_name) = lower(?1) AND lower(f_geometry_column) = lower(?2)",
        )?;
        stmt.bind_text(1, table)?;
        stmt.bind_text(2, column)?;

        let Some(row) = stmt.next_row()? else {
            return Ok(None);
        };

        let (geometry_type, dims) = geometry_type_from_iso_code(row.column_int64(2))?;
        Ok(Some(GeometryColumn {
            table: row.column_string(0).unwrap_or(table).to_string(),
            column: row.column_string(1).unwrap_or(column).to_string(),
            geometry_type,
            dims,
            srid: row.column_int(3),
            spatial_index: row.column_bool(4),
        }))
    }

    fn create_geometry_column(&mut self, column: &GeometryColumn) -> Result<()> {
        self.conn.execute(&format!(
            "ALTER TABLE {} ADD COLUMN {} BLOB",
            quote_identifier(&column.table),
            quote_identifier(&column.column)
        ))?;

        let stmt = self.conn.prepare_statement(
            "INSERT INTO geometry_columns (f_table_name, f_geometry_column, geometry_type, coord_dimension, srid, spatial_index_enabled)
             VALUES (?1, ?2, ?3, ?4, ?5, 0)",
        )?;
        stmt.bind_text(1, &column.table)?;
        stmt.bind_text(2, &column.column)?;
        stmt.bind_int64(3, iso_geometry_type_code(column.geometry_type, column.dims))?;
        stmt.bind_int64(4, coord_dimension(column.dims))?;
        stmt.bind(5, column.srid)?;
        stmt.execute()
    }

    fn create_spatial_index(&mut self, table: &str, column: &str) -> Result<()> {
        self.conn.execute(&format!(
            "CREATE VIRTUAL TABLE {} USING rtree(pkid, xmin, xmax, ymin, ymax)",
            quote_identifier(&spatial_index_name(table, column))
        ))?;

        let mut indexed = 0;
        for row in self.row_ids(table, column, None)? {
            let Some(blob) = self.read_geometry(table, column, row)? else {
                continue;
            };

            match wkb::decode(&blob) {
                Ok(geom) => {
                    if let Some(bbox) = geom.bbox() {
                        self.update_spatial_index(table, column, row, Some(bbox))?;
                        indexed += 1;
                    }
                }
                Err(e) => log::debug!("Row {row} of {table}.{column} not indexed: {e}"),
            }
        }

        let stmt = self.conn.prepare_statement(
            "UPDATE geometry_columns SET spatial_index_enabled = 1 WHERE lower(f_table_name) = lower(?1) AND lower(f_geometry_column) = lower(?2)",
        )?;
        stmt.bind_text(1, table)?;
        stmt.bind_text(2, column)?;
        stmt.execute()?;

        log::debug!("Spatial index on {table}.{column} created ({indexed} entries)");
        Ok(())
    }

    fn row_ids(&self, table: &str, column: &str, filter: Option<&Rect>) -> Result<Vec<RowId>> {
        let mut stmt = match filter {
            Some(rect) if self.spatial_index_enabled(table, column)? => {
                let stmt = self.conn.prepare_statement(&format!(
                    "SELECT pkid FROM {} WHERE xmax >= ?1 AND xmin <= ?2 AND ymax >= ?3 AND ymin <= ?4 ORDER BY pkid",
                    quote_identifier(&spatial_index_name(table, column))
                ))?;
                stmt.bind_double(1, rect.min_x())?;
                stmt.bind_double(2, rect.max_x())?;
                stmt.bind_double(3, rect.min_y())?;
                stmt.bind_double(4, rect.max_y())?;
                stmt
            }
            _ => self.conn.prepare_statement(&format!(
                "SELECT rowid FROM {} WHERE {} IS NOT NULL ORDER BY rowid",
                quote_identifier(table),
                quote_identifier(column)
            ))?,
        };

        stmt.map_rows(|row| row.column_int64(0))
    }

    fn read_geometry(&self, table: &str, column: &str, row: RowId) -> Result<Option<Vec<u8>>> {
        let mut stmt = self.conn.prepare_statement(&format!(
            "SELECT {} FROM {} WHERE rowid = ?1",
            quote_identifier(column),
            quote_identifier(table)
        ))?;
        stmt.bind_int64(1, row)?;

        Ok(stmt.next_row()?.and_then(|r| r.column_blob(0).map(<[u8]>::to_vec)))
    }

    fn write_geometry(&mut self, table: &str, column: &str, row: RowId, geometry: &Geometry) -> Result<()> {
        let stmt = self.conn.prepare_statement(&format!(
            "UPDATE {} SET {} = ?1 WHERE rowid = ?2",
            quote_identifier(table),
            quote_identifier(column)
        ))?;
        stmt.bind_blob(1, &wkb::encode(geometry)?)?;
        stmt.bind_int64(2, row)?;
        stmt.execute()?;

        if self.conn.changes() == 0 {
            return Err(Error::DatabaseError(format!("no row with id {row} in {table}")));
        }

        if self.spatial_index_enabled(table, column)? {
            self.update_spatial_index(table, column, row, geometry.bbox())?;
        }

        Ok(())
    }

    fn begin_transaction(&mut self) -> Result<()> {
        self.conn.begin_transaction()
    }

    fn commit(&mut self) -> Result<()> {
        self.conn.commit()
    }

    fn rollback(&mut self) -> Result<()> {
        self.conn.rollback()
    }

    fn enter_bulk_mode(&mut self) -> Result<()> {
        for (name, value) in [("synchronous", "OFF"), ("journal_mode", "MEMORY")] {
            if let Some(previous) = self.conn.pragma(name)? {
                self.saved_pragmas.push((name, previous));
            }
            self.conn.set_pragma(name, value)?;
        }

        Ok(())
    }

    fn leave_bulk_mode(&mut self) -> Result<()> {
        let mut result = Ok(());
        while let Some((name, value)) = self.saved_pragmas.pop() {
            if let Err(e) = self.conn.set_pragma(name, &value) {
                log::warn!("Failed to restore PRAGMA {name}={value}: {e}");
                result = Err(e);
            }
        }

        result
    }
}

impl CoverageStore for SqliteStore {
    fn coverage(&self, name: &str) -> Result<Option<Coverage>> {
        let mut stmt = self.conn.prepare_statement(
            "SELECT coverage_name, sample_type, srid, horz_resolution, vert_resolution, strict_resolution, nodata_pixel
             FROM raster_coverages WHERE lower(coverage_name) = lower(?1)",
        )?;
        stmt.bind_text(1, name)?;

        let Some(row) = stmt.next_row()? else {
            return Ok(None);
        };

        let sample_type: SampleType = row.column_string(1).unwrap_or_default().parse()?;
        Ok(Some(Coverage {
            name: row.column_string(0).unwrap_or(name).to_string(),
            sample_type,
            srid: row.column_int(2),
            horz_res: row.column_double(3),
            vert_res: row.column_double(4),
            strict_resolution: row.column_bool(5),
            no_data: row.column_optional_double(6),
        }))
    }

    fn tile_ids(&self, coverage: &str, pyramid_level: i32) -> Result<Vec<TileId>> {
        let mut stmt = self.conn.prepare_statement(&format!(
            "SELECT tile_id FROM {} WHERE pyramid_level = ?1 ORDER BY tile_id",
            quote_identifier(&tiles_table_name(coverage))
        ))?;
        stmt.bind(1, pyramid_level)?;

        stmt.map_rows(|row| row.column_int64(0))
    }

    fn read_tile(&self, coverage: &str, id: TileId) -> Result<Option<TileRecord>> {
        let mut stmt = self.conn.prepare_statement(&format!(
            "SELECT minx, miny, maxx, maxy, tile_data FROM {} WHERE tile_id = ?1",
            quote_identifier(&tiles_table_name(coverage))
        ))?;
        stmt.bind_int64(1, id)?;

        Ok(stmt.next_row()?.map(|row| {
            let bounds = (
                row.column_optional_double(0),
                row.column_optional_double(1),
                row.column_optional_double(2),
                row.column_optional_double(3),
            );

            let footprint = match bounds {
                (Some(min_x), Some(min_y), Some(max_x), Some(max_y)) => Some(Rect::from_bounds(min_x, min_y, max_x, max_y)),
                _ => None,
            };

            TileRecord {
                id,
                footprint,
                payload: row.column_blob(4).map(<[u8]>::to_vec),
            }
        }))
    }
}
