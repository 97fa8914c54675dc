use std::collections::{BTreeMap, BTreeSet};

use geo::{Geometry, Rect, wkb};

use crate::{Coverage, CoverageStore, Error, GeometryColumn, GeometryStore, Result, RowId, TileId, TileRecord};

#[derive(Debug, Clone, Default)]
struct MemoryTable {
    columns: BTreeMap<String, GeometryColumn>,
    attributes: BTreeSet<String>,
    rows: BTreeMap<RowId, BTreeMap<String, Vec<u8>>>,
}

#[derive(Debug, Clone)]
struct MemoryTile {
    pyramid_level: i32,
    record: TileRecord,
}

#[derive(Debug, Clone)]
struct MemoryCoverage {
    coverage: Coverage,
    tiles: Vec<MemoryTile>,
}

/// Store that keeps the feature tables and coverages in memory
/// Rolling back a transaction restores the tables as they were at `begin_transaction`.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: BTreeMap<String, MemoryTable>,
    coverages: BTreeMap<String, MemoryCoverage>,
    snapshot: Option<BTreeMap<String, MemoryTable>>,
    bulk_mode: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&mut self, name: &str) {
        self.tables.entry(name.to_string()).or_default();
    }

    /// Registers a geometry column, the table is created when needed
    pub fn add_geometry_column(&mut self, column: GeometryColumn) {
        self.tables
            .entry(column.table.clone())
            .or_default()
            .columns
            .insert(column.column.clone(), column);
    }

    /// Adds a plain, non geometry column to an existing table
    pub fn add_column(&mut self, table: &str, column: &str) -> Result<()> {
        self.table_mut(table)?.attributes.insert(column.to_string());
        Ok(())
    }

    /// Inserts a new row with the geometry stored in the column, returns the id of the row
    pub fn insert_geometry(&mut self, table: &str, column: &str, geom: &Geometry) -> Result<RowId> {
        self.insert_blob(table, column, Some(wkb::encode(geom)?))
    }

    /// Inserts a new row with a raw value for the column (`None` for a null geometry)
    pub fn insert_blob(&mut self, table: &str, column: &str, blob: Option<Vec<u8>>) -> Result<RowId> {
        let tbl = self.table_mut(table)?;
        let id = tbl.rows.keys().next_back().map_or(1, |last| last + 1);
        let mut values = BTreeMap::new();
        if let Some(blob) = blob {
            values.insert(column.to_string(), blob);
        }
        tbl.rows.insert(id, values);
        Ok(id)
    }

    /// Decoded value of the column, `None` for a null geometry
    pub fn geometry(&self, table: &str, column: &str, row: RowId) -> Result<Option<Geometry>> {
        self.read_geometry(table, column, row)?
            .map(|blob| wkb::decode(&blob))
            .transpose()
    }

    pub fn add_coverage(&mut self, coverage: Coverage) {
        self.coverages.insert(
            coverage.name.clone(),
            MemoryCoverage {
                coverage,
                tiles: Vec::new(),
            },
        );
    }

    pub fn add_tile(&mut self, coverage: &str, pyramid_level: i32, footprint: Option<Rect>, payload: Option<Vec<u8>>) -> Result<TileId> {
        let cov = self
            .coverages
            .get_mut(coverage)
            .ok_or_else(|| Error::InvalidArgument(format!("Unknown coverage: {coverage}")))?;

        let id = cov.tiles.len() as TileId + 1;
        cov.tiles.push(MemoryTile {
            pyramid_level,
            record: TileRecord { id, footprint, payload },
        });
        Ok(id)
    }

    pub fn in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }

    pub fn in_bulk_mode(&self) -> bool {
        self.bulk_mode
    }

    fn table(&self, table: &str) -> Result<&MemoryTable> {
        self.tables
            .get(table)
            .ok_or_else(|| Error::DatabaseError(format!("no such table: {table}")))
    }

    fn table_mut(&mut self, table: &str) -> Result<&mut MemoryTable> {
        self.tables
            .get_mut(table)
            .ok_or_else(|| Error::DatabaseError(format!("no such table: {table}")))
    }

    fn coverage_entry(&self, coverage: &str) -> Result<&MemoryCoverage> {
        self.coverages
            .get(coverage)
            .ok_or_else(|| Error::DatabaseError(format!("no such coverage: {coverage}")))
    }
}

impl GeometryStore for MemoryStore {
    fn table_exists(&self, table: &str) -> Result<bool> {
        Ok(self.tables.contains_key(table))
    }

    fn column_exists(&self, table: &str, column: &str) -> Result<bool> {
        let tbl = self.table(table)?;
        Ok(tbl.columns.contains_key(column) || tbl.attributes.contains(column))
    }

    fn geometry_column(&self, table: &str, column: &str) -> Result<Option<GeometryColumn>> {
        Ok(self.tables.get(table).and_then(|t| t.columns.get(column)).cloned())
    }

    fn create_geometry_column(&mut self, column: &GeometryColumn) -> Result<()> {
        let tbl = self.table_mut(&column.table)?;
        if tbl.columns.contains_key(&column.column) || tbl.attributes.contains(&column.column) {
            return Err(Error::DatabaseError(format!("duplicate column name: {}", column.column)));
        }

        tbl.columns.insert(column.column.clone(), GeometryColumn {
            spatial_index: false,
            ..column.clone()
        });
        Ok(())
    }

    fn create_spatial_index(&mut self, table: &str, column: &str) -> Result<()> {
        let col = self
            .table_mut(table)?
            .columns
            .get_mut(column)
            .ok_or_else(|| Error::DatabaseError(format!("no such column: {column}")))?;
        col.spatial_index = true;
        Ok(())
    }

    fn row_ids(&self, table: &str, column: &str, filter: Option<&Rect>) -> Result<Vec<RowId>> {
        let tbl = self.table(table)?;
        Ok(tbl
            .rows
            .iter()
            .filter_map(|(id, values)| {
                let blob = values.get(column)?;
                match filter {
                    // rows that cannot be decoded are passed on, the caller decides what to do with them
                    Some(rect) => match wkb::decode(blob) {
                        Ok(geom) => geom.bbox().is_some_and(|bbox| bbox.intersects(rect)).then_some(*id),
                        Err(_) => Some(*id),
                    },
                    None => Some(*id),
                }
            })
            .collect())
    }

    fn read_geometry(&self, table: &str, column: &str, row: RowId) -> Result<Option<Vec<u8>>> {
        Ok(self.table(table)?.rows.get(&row).and_then(|values| values.get(column)).cloned())
    }

    fn write_geometry(&mut self, table: &str, column: &str, row: RowId, geometry: &Geometry) -> Result<()> {
        let tbl = self.table_mut(table)?;
        if !tbl.columns.contains_key(column) {
            return Err(Error::DatabaseError(format!("no such column: {column}")));
        }

        let values = tbl
            .rows
            .get_mut(&row)
            .ok_or_else(|| Error::DatabaseError(format!("no row with id {row} in {table}")))?;
        values.insert(column.to_string(), wkb::encode(geometry)?);
        Ok(())
    }

    fn begin_transaction(&mut self) -> Result<()> {
        if self.snapshot.is_some() {
            return Err(Error::DatabaseError("cannot start a transaction within a transaction".into()));
        }

        self.snapshot = Some(self.tables.clone());
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        match self.snapshot.take() {
            Some(_) => Ok(()),
            None => Err(Error::DatabaseError("cannot commit - no transaction is active".into())),
        }
    }

    fn rollback(&mut self) -> Result<()> {
        match self.snapshot.take() {
            Some(tables) => {
                self.tables = tables;
                Ok(())
            }
            None => Err(Error::DatabaseError("cannot rollback - no transaction is active".into())),
        }
    }

    fn enter_bulk_mode(&mut self) -> Result<()> {
        self.bulk_mode = true;
        Ok(())
    }

    fn leave_bulk_mode(&mut self) -> Result<()> {
        self.bulk_mode = false;
        Ok(())
    }
}

impl CoverageStore for MemoryStore {
    fn coverage(&self, name: &str) -> Result<Option<Coverage>> {
        Ok(self.coverages.get(name).map(|c| c.coverage.clone()))
    }

    fn tile_ids(&self, coverage: &str, pyramid_level: i32) -> Result<Vec<TileId>> {
        Ok(self
            .coverage_entry(coverage)?
            .tiles
            .iter()
            .filter(|t| t.pyramid_level == pyramid_level)
            .map(|t| t.record.id)
            .collect())
    }

    fn read_tile(&self, coverage: &str, id: TileId) -> Result<Option<TileRecord>> {
        Ok(self
            .coverage_entry(coverage)?
            .tiles
            .iter()
            .find(|t| t.record.id == id)
            .map(|t| t.record.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Coordinate, Dimensions, GeometryType};

    fn column(name: &str) -> GeometryColumn {
        GeometryColumn {
            table: "roads".into(),
            column: name.into(),
            geometry_type: GeometryType::Point,
            dims: Dimensions::Xy,
            srid: 4326,
            spatial_index: false,
        }
    }

    fn point(x: f64, y: f64) -> Geometry {
        let mut geom = Geometry::new(4326, Dimensions::Xy, GeometryType::Point);
        geom.add_point(Coordinate::xy(x, y)).unwrap();
        geom
    }

    #[test]
    fn rollback_restores_the_tables() {
        let mut store = MemoryStore::new();
        store.add_geometry_column(column("geom"));
        let row = store.insert_geometry("roads", "geom", &point(1.0, 2.0)).unwrap();

        store.begin_transaction().unwrap();
        store.create_geometry_column(&column("geom2")).unwrap();
        store.write_geometry("roads", "geom2", row, &point(3.0, 4.0)).unwrap();
        assert!(store.geometry_column("roads", "geom2").unwrap().is_some());
        store.rollback().unwrap();

        assert!(!store.in_transaction());
        assert!(store.geometry_column("roads", "geom2").unwrap().is_none());
        assert_eq!(store.read_geometry("roads", "geom2", row).unwrap(), None);
        assert_eq!(store.geometry("roads", "geom", row).unwrap(), Some(point(1.0, 2.0)));
    }

    #[test]
    fn row_filter() {
        let mut store = MemoryStore::new();
        store.add_geometry_column(column("geom"));
        let inside = store.insert_geometry("roads", "geom", &point(1.0, 1.0)).unwrap();
        let outside = store.insert_geometry("roads", "geom", &point(10.0, 10.0)).unwrap();
        let null = store.insert_blob("roads", "geom", None).unwrap();
        let garbage = store.insert_blob("roads", "geom", Some(vec![1, 2, 3])).unwrap();

        assert_eq!(store.row_ids("roads", "geom", None).unwrap(), vec![inside, outside, garbage]);

        let rect = Rect::from_bounds(0.0, 0.0, 2.0, 2.0);
        assert_eq!(store.row_ids("roads", "geom", Some(&rect)).unwrap(), vec![inside, garbage]);
        assert!(store.read_geometry("roads", "geom", null).unwrap().is_none());
    }

    #[test]
    fn tiles_per_level() {
        let mut store = MemoryStore::new();
        store.add_coverage(Coverage::new("dem", raster_tile::SampleType::Float32, 4326, 1.0));
        let level0 = store.add_tile("dem", 0, Some(Rect::from_bounds(0.0, 0.0, 1.0, 1.0)), Some(vec![1])).unwrap();
        store.add_tile("dem", 1, None, None).unwrap();

        assert_eq!(store.tile_ids("dem", 0).unwrap(), vec![level0]);
        assert_eq!(store.read_tile("dem", level0).unwrap().unwrap().payload, Some(vec![1]));
        assert!(store.tile_ids("missing", 0).is_err());
        assert!(store.add_tile("missing", 0, None, None).is_err());
    }
}
