//! The storage seams of the draping pipeline.
//!
//! The pipeline reads and writes geometries as extended WKB blobs through a [`GeometryStore`]
//! and reads raster tiles through a [`CoverageStore`].

use geo::{Dimensions, Geometry, GeometryType, Rect};

use crate::{Coverage, Result};

pub type RowId = i64;
pub type TileId = i64;

/// Description of a registered geometry column
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryColumn {
    pub table: String,
    pub column: String,
    pub geometry_type: GeometryType,
    pub dims: Dimensions,
    pub srid: i32,
    pub spatial_index: bool,
}

/// A tile as stored in a coverage, footprint and payload can be missing in damaged coverages
#[derive(Debug, Clone, PartialEq)]
pub struct TileRecord {
    pub id: TileId,
    pub footprint: Option<Rect>,
    pub payload: Option<Vec<u8>>,
}

pub trait GeometryStore {
    fn table_exists(&self, table: &str) -> Result<bool>;

    /// Whether the table has a column with this name, geometry or not
    fn column_exists(&self, table: &str, column: &str) -> Result<bool>;

    fn geometry_column(&self, table: &str, column: &str) -> Result<Option<GeometryColumn>>;

    /// Registers and creates a new, empty geometry column
    fn create_geometry_column(&mut self, column: &GeometryColumn) -> Result<()>;

    fn create_spatial_index(&mut self, table: &str, column: &str) -> Result<()>;

    /// Ids of the rows that have a geometry in the column
    /// When a filter is given, rows whose geometry bbox does not intersect it may be omitted.
    fn row_ids(&self, table: &str, column: &str, filter: Option<&Rect>) -> Result<Vec<RowId>>;

    /// The raw extended WKB value, `None` for a null geometry
    fn read_geometry(&self, table: &str, column: &str, row: RowId) -> Result<Option<Vec<u8>>>;

    fn write_geometry(&mut self, table: &str, column: &str, row: RowId, geometry: &Geometry) -> Result<()>;

    fn begin_transaction(&mut self) -> Result<()>;
    fn commit(&mut self) -> Result<()>;
    fn rollback(&mut self) -> Result<()>;

    /// Trades durability for write speed until `leave_bulk_mode` is called
    /// On failure `leave_bulk_mode` still undoes the settings that were already applied.
    fn enter_bulk_mode(&mut self) -> Result<()>;
    fn leave_bulk_mode(&mut self) -> Result<()>;
}

pub trait CoverageStore {
    fn coverage(&self, name: &str) -> Result<Option<Coverage>>;

    fn tile_ids(&self, coverage: &str, pyramid_level: i32) -> Result<Vec<TileId>>;

    fn read_tile(&self, coverage: &str, id: TileId) -> Result<Option<TileRecord>>;
}
