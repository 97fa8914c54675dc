use std::fmt;

use geo::{Dimensions, Ordinate, wkb};

use crate::densify::densify_geometry;
use crate::drape::{DrapeStats, drape_coverage};
use crate::simplify::simplify_geometry;
use crate::{
    Coverage, CoverageSource, CoverageStore, DistancePrimitive, DrapeContext, DrapeOptions, Error, GeometryColumn, GeometryStore,
    PlanarDistance, Result,
};

/// Outcome of a successful draping run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrapeReport {
    /// Rows whose densified geometry was written to the new column
    pub rows_copied: usize,
    /// Rows of the source column that could not be decoded
    pub rows_skipped: usize,
    pub coverages: Vec<DrapeStats>,
    pub rows_simplified: usize,
    pub vertices_removed: usize,
}

impl fmt::Display for DrapeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} rows copied", self.rows_copied)?;
        if self.rows_skipped > 0 {
            write!(f, " ({} skipped)", self.rows_skipped)?;
        }

        for stats in &self.coverages {
            write!(
                f,
                ", coverage '{}': {} tiles, {} features updated, {} vertices draped",
                stats.coverage, stats.tiles_processed, stats.features_updated, stats.vertices_draped
            )?;
        }

        write!(f, ", {} rows simplified ({} vertices removed)", self.rows_simplified, self.vertices_removed)
    }
}

/// Success flag with a human readable message, for callers that only report the outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrapeStatus {
    pub success: bool,
    pub message: String,
}

impl From<Result<DrapeReport>> for DrapeStatus {
    fn from(result: Result<DrapeReport>) -> Self {
        match result {
            Ok(report) => DrapeStatus {
                success: true,
                message: report.to_string(),
            },
            Err(err) => DrapeStatus {
                success: false,
                message: err.to_string(),
            },
        }
    }
}

/// Dimensions of the draped column for geometries with the `source` dimensions
pub fn target_dimensions(source: Dimensions, update_m: bool) -> Dimensions {
    match (source, update_m) {
        (Dimensions::Xyz, false) => Dimensions::Xyz,
        (Dimensions::Xyz, true) => Dimensions::Xyzm,
        (Dimensions::Xym, false) => Dimensions::Xyzm,
        (Dimensions::Xym, true) => Dimensions::Xym,
        (Dimensions::Xyzm, _) => Dimensions::Xyzm,
        (Dimensions::Xy, false) => Dimensions::Xyz,
        (Dimensions::Xy, true) => Dimensions::Xym,
    }
}

/// Drapes the geometries of `options.old_geom_column` on the coverage(s) and stores the result in
/// the new column `options.new_geom_column`
pub fn drape_geometries<S>(store: &mut S, options: &DrapeOptions) -> Result<DrapeReport>
where
    S: GeometryStore + CoverageStore + ?Sized,
{
    drape_geometries_with(store, options, &PlanarDistance)
}

/// Same as [`drape_geometries`] with a custom distance measure for the profile simplification
pub fn drape_geometries_with<S>(store: &mut S, options: &DrapeOptions, distance: &dyn DistancePrimitive) -> Result<DrapeReport>
where
    S: GeometryStore + CoverageStore + ?Sized,
{
    options.validate()?;
    let coverages = resolve_coverages(store, &options.coverage)?;
    let ctx = create_context(store, options, coverages, distance)?;

    log::info!(
        "Draping {}.{} into {} ({}) using {}",
        ctx.table,
        ctx.source.column,
        ctx.target.column,
        ctx.target.dims,
        options.coverage.names().join(", ")
    );

    if let Err(e) = store.enter_bulk_mode() {
        // undo the settings that were applied before the failure
        if let Err(restore_err) = store.leave_bulk_mode() {
            log::warn!("Failed to leave bulk mode: {restore_err}");
        }
        return Err(e);
    }

    let result = run_in_transaction(store, &ctx);
    match (result, store.leave_bulk_mode()) {
        (Ok(report), Ok(())) => Ok(report),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(restore_err)) => {
            log::warn!("Failed to leave bulk mode: {restore_err}");
            Err(e)
        }
    }
}

fn resolve_coverages<S>(store: &S, source: &CoverageSource) -> Result<Vec<Coverage>>
where
    S: CoverageStore + ?Sized,
{
    let mut coverages: Vec<Coverage> = Vec::new();
    for name in source.names() {
        let coverage = store
            .coverage(name)?
            .ok_or_else(|| Error::Validation(format!("unknown raster coverage '{name}'")))?;

        if !coverage.strict_resolution {
            return Err(Error::Validation(format!(
                "raster coverage '{name}' does not have a strict resolution"
            )));
        }

        if !(coverage.horz_res > 0.0 && coverage.vert_res > 0.0) {
            return Err(Error::Validation(format!("raster coverage '{name}' has an invalid resolution")));
        }

        if let Some(first) = coverages.first() {
            if first.srid != coverage.srid {
                return Err(Error::Validation(format!(
                    "the coverages in the list have different srids ('{}': {}, '{name}': {})",
                    first.name, first.srid, coverage.srid
                )));
            }
        }

        coverages.push(coverage);
    }

    Ok(coverages)
}

fn create_context<'a, S>(
    store: &S,
    options: &DrapeOptions,
    coverages: Vec<Coverage>,
    distance: &'a dyn DistancePrimitive,
) -> Result<DrapeContext<'a>>
where
    S: GeometryStore + ?Sized,
{
    let table = options.spatial_table.as_str();
    if !store.table_exists(table)? {
        return Err(Error::Validation(format!("table '{table}' does not exist")));
    }

    let source = store.geometry_column(table, &options.old_geom_column)?.ok_or_else(|| {
        Error::Validation(format!(
            "table '{table}' has no geometry column '{}'",
            options.old_geom_column
        ))
    })?;

    let new_column = options.new_geom_column.as_str();
    if store.geometry_column(table, new_column)?.is_some() || store.column_exists(table, new_column)? {
        return Err(Error::Configuration(format!("column '{new_column}' already exists in table '{table}'")));
    }

    let coverage_srid = coverages.first().map(|c| c.srid).unwrap_or(source.srid);
    if source.srid != coverage_srid {
        return Err(Error::Validation(format!(
            "srid mismatch between the geometries ({}) and the raster coverage ({coverage_srid})",
            source.srid
        )));
    }

    let target = GeometryColumn {
        table: source.table.clone(),
        column: options.new_geom_column.clone(),
        geometry_type: source.geometry_type,
        dims: target_dimensions(source.dims, options.update_m),
        srid: source.srid,
        spatial_index: false,
    };

    Ok(DrapeContext {
        table: source.table.clone(),
        source,
        target,
        ordinate: if options.update_m { Ordinate::M } else { Ordinate::Z },
        no_data: options.no_data_value,
        densify_dist: options.densify_dist,
        simplify_dist: options.simplify_dist,
        coverages,
        distance,
    })
}

fn run_in_transaction<S>(store: &mut S, ctx: &DrapeContext) -> Result<DrapeReport>
where
    S: GeometryStore + CoverageStore + ?Sized,
{
    store.begin_transaction()?;
    match run_stages(store, ctx) {
        Ok(report) => {
            store.commit()?;
            Ok(report)
        }
        Err(e) => {
            if let Err(rollback_err) = store.rollback() {
                log::warn!("Rollback failed: {rollback_err}");
            }
            Err(e)
        }
    }
}

fn run_stages<S>(store: &mut S, ctx: &DrapeContext) -> Result<DrapeReport>
where
    S: GeometryStore + CoverageStore + ?Sized,
{
    let mut report = DrapeReport::default();

    store.create_geometry_column(&ctx.target)?;
    (report.rows_copied, report.rows_skipped) = copy_densified(store, ctx)?;
    store.create_spatial_index(&ctx.table, &ctx.target.column)?;

    for coverage in &ctx.coverages {
        log::info!("Draping on coverage '{}'", coverage.name);
        let stats = drape_coverage(store, ctx, coverage)?;
        log::info!(
            "Coverage '{}': {} tiles processed, {} features updated, {} vertices draped",
            stats.coverage,
            stats.tiles_processed,
            stats.features_updated,
            stats.vertices_draped
        );
        report.coverages.push(stats);
    }

    if ctx.simplify_dist > 0.0 {
        (report.rows_simplified, report.vertices_removed) = simplify_draped(store, ctx)?;
    }

    Ok(report)
}

/// Writes the densified source geometries, converted to the target dimensions, to the target column
fn copy_densified<S>(store: &mut S, ctx: &DrapeContext) -> Result<(usize, usize)>
where
    S: GeometryStore + ?Sized,
{
    log::info!("Densifying {}.{} (distance {})", ctx.table, ctx.source.column, ctx.densify_dist);

    let (mut copied, mut skipped) = (0, 0);
    for row in store.row_ids(&ctx.table, &ctx.source.column, None)? {
        let Some(blob) = store.read_geometry(&ctx.table, &ctx.source.column, row)? else {
            continue;
        };

        let geom = match wkb::decode(&blob) {
            Ok(geom) => geom,
            Err(e) => {
                log::debug!("Skipping row {row} of {}.{}: {e}", ctx.table, ctx.source.column);
                skipped += 1;
                continue;
            }
        };

        let mut target = geom.with_dimensions(ctx.target_dims(), ctx.no_data);
        target.set_srid(ctx.target.srid);
        let target = densify_geometry(&target, ctx.densify_dist, ctx.ordinate, ctx.no_data);

        store.write_geometry(&ctx.table, &ctx.target.column, row, &target)?;
        copied += 1;
    }

    log::info!("{copied} rows copied, {skipped} rows skipped");
    Ok((copied, skipped))
}

/// Simplifies the draped geometries, returns the number of modified rows and removed vertices
fn simplify_draped<S>(store: &mut S, ctx: &DrapeContext) -> Result<(usize, usize)>
where
    S: GeometryStore + ?Sized,
{
    log::info!("Simplifying {}.{} (distance {})", ctx.table, ctx.target.column, ctx.simplify_dist);

    let params = ctx.simplify_params();
    let (mut rows, mut removed) = (0, 0);
    for row in store.row_ids(&ctx.table, &ctx.target.column, None)? {
        let (Some(pristine), Some(draped)) = (
            store.read_geometry(&ctx.table, &ctx.source.column, row)?,
            store.read_geometry(&ctx.table, &ctx.target.column, row)?,
        ) else {
            continue;
        };

        let (pristine, draped) = match (wkb::decode(&pristine), wkb::decode(&draped)) {
            (Ok(pristine), Ok(draped)) => (pristine, draped),
            (Err(e), _) | (_, Err(e)) => {
                log::debug!("Skipping simplification of row {row}: {e}");
                continue;
            }
        };

        let simplified = simplify_geometry(&pristine, &draped, &params).map_err(|e| match e {
            Error::Consistency(msg) => Error::Consistency(format!("{msg} (row {row} of {})", ctx.table)),
            e => e,
        })?;

        let vertices_removed = draped.vertex_count() - simplified.vertex_count();
        if vertices_removed > 0 {
            store.write_geometry(&ctx.table, &ctx.target.column, row, &simplified)?;
            rows += 1;
            removed += vertices_removed;
        }
    }

    log::info!("{rows} rows simplified, {removed} vertices removed");
    Ok((rows, removed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryStore, RowId, TileId, TileRecord};
    use geo::{Coordinate, Geometry, GeometryType, Rect};
    use raster_tile::{AnyRasterTile, CompressionAlgorithm, RasterTile, SampleType};

    const NODATA: f64 = -9999.0;

    fn column(name: &str, dims: Dimensions, srid: i32) -> GeometryColumn {
        GeometryColumn {
            table: "roads".into(),
            column: name.into(),
            geometry_type: GeometryType::LineString,
            dims,
            srid,
            spatial_index: false,
        }
    }

    fn line(dims: Dimensions, coords: &[Coordinate]) -> Geometry {
        let mut geom = Geometry::new(31370, dims, GeometryType::LineString);
        let line = geom.add_linestring(coords.len()).unwrap();
        for (i, c) in coords.iter().enumerate() {
            line.set(i, *c);
        }
        geom
    }

    fn constant_tile(value: f32) -> Vec<u8> {
        AnyRasterTile::from(RasterTile::filled(100, 100, value))
            .encode(CompressionAlgorithm::Lz4Block)
            .unwrap()
    }

    /// Store with a single linestring (0,0) -> (100,0) and a coverage with one constant tile
    fn scenario(dims: Dimensions) -> (MemoryStore, i64) {
        let mut store = MemoryStore::new();
        store.add_geometry_column(column("geom", dims, 31370));
        let coords = [Coordinate::xyz(0.0, 0.0, NODATA), Coordinate::xyz(100.0, 0.0, NODATA)].map(|c| c.to_dimensions(dims, NODATA));
        let row = store.insert_geometry("roads", "geom", &line(dims, &coords)).unwrap();

        store.add_coverage(Coverage::new("dem", SampleType::Float32, 31370, 1.0));
        store
            .add_tile("dem", 0, Some(Rect::from_bounds(0.0, 0.0, 100.0, 100.0)), Some(constant_tile(42.0)))
            .unwrap();
        (store, row)
    }

    fn options() -> DrapeOptions {
        DrapeOptions::new(CoverageSource::Single("dem".into()), "roads", "geom", "geom3d")
    }

    #[test]
    fn target_dimension_rules() {
        assert_eq!(target_dimensions(Dimensions::Xyz, false), Dimensions::Xyz);
        assert_eq!(target_dimensions(Dimensions::Xyz, true), Dimensions::Xyzm);
        assert_eq!(target_dimensions(Dimensions::Xym, false), Dimensions::Xyzm);
        assert_eq!(target_dimensions(Dimensions::Xym, true), Dimensions::Xym);
        assert_eq!(target_dimensions(Dimensions::Xyzm, false), Dimensions::Xyzm);
        assert_eq!(target_dimensions(Dimensions::Xyzm, true), Dimensions::Xyzm);
        assert_eq!(target_dimensions(Dimensions::Xy, false), Dimensions::Xyz);
        assert_eq!(target_dimensions(Dimensions::Xy, true), Dimensions::Xym);
    }

    #[test_log::test]
    fn densify_drape_simplify() {
        let (mut store, row) = scenario(Dimensions::Xyz);
        let report = drape_geometries(&mut store, &options().with_densify_distance(10.0).with_simplify_distance(0.01)).unwrap();

        assert_eq!(report.rows_copied, 1);
        assert_eq!(report.coverages[0].vertices_draped, 11);
        assert_eq!(report.rows_simplified, 1);
        assert_eq!(report.vertices_removed, 9);

        let draped = store.geometry("roads", "geom3d", row).unwrap().unwrap();
        assert_eq!(
            draped,
            line(Dimensions::Xyz, &[Coordinate::xyz(0.0, 0.0, 42.0), Coordinate::xyz(100.0, 0.0, 42.0)])
        );
        assert!(!store.in_transaction());
        assert!(!store.in_bulk_mode());
    }

    #[test_log::test]
    fn xy_source_gets_measures() {
        let (mut store, row) = scenario(Dimensions::Xy);
        drape_geometries(&mut store, &options().with_update_m(true).with_densify_distance(50.0)).unwrap();

        let col = store.geometry_column("roads", "geom3d").unwrap().unwrap();
        assert_eq!(col.dims, Dimensions::Xym);
        assert!(col.spatial_index);

        let draped = store.geometry("roads", "geom3d", row).unwrap().unwrap();
        let mut vertices = Vec::new();
        draped.shape().for_each_coordinate(&mut |c| vertices.push(c));
        assert_eq!(
            vertices,
            vec![Coordinate::xym(0.0, 0.0, 42.0), Coordinate::xym(50.0, 0.0, 42.0), Coordinate::xym(100.0, 0.0, 42.0)]
        );
    }

    #[test_log::test]
    fn without_simplification_the_drape_output_is_kept() {
        let (mut store, row) = scenario(Dimensions::Xyz);
        let report = drape_geometries(&mut store, &options().with_densify_distance(10.0)).unwrap();
        assert_eq!(report.rows_simplified, 0);
        assert_eq!(store.geometry("roads", "geom3d", row).unwrap().unwrap().vertex_count(), 11);
    }

    #[test_log::test]
    fn malformed_tile_rolls_back() {
        let (mut store, _) = scenario(Dimensions::Xyz);
        store
            .add_tile("dem", 0, Some(Rect::from_bounds(100.0, 0.0, 200.0, 100.0)), Some(vec![0xAB; 40]))
            .unwrap();

        let err = drape_geometries(&mut store, &options()).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
        assert!(err.to_string().contains("coverage 'dem'"), "{err}");

        assert!(store.geometry_column("roads", "geom3d").unwrap().is_none());
        assert!(!store.in_transaction());
        assert!(!store.in_bulk_mode());
    }

    #[test_log::test]
    fn malformed_rows_are_skipped() {
        let (mut store, row) = scenario(Dimensions::Xyz);
        let garbage = store.insert_blob("roads", "geom", Some(vec![1, 1, 0, 0])).unwrap();

        let report = drape_geometries(&mut store, &options()).unwrap();
        assert_eq!(report.rows_copied, 1);
        assert_eq!(report.rows_skipped, 1);
        assert!(store.read_geometry("roads", "geom3d", garbage).unwrap().is_none());
        assert!(store.read_geometry("roads", "geom3d", row).unwrap().is_some());
    }

    #[test]
    fn validation_failures_leave_the_store_untouched() {
        let (mut store, _) = scenario(Dimensions::Xyz);

        let unknown = DrapeOptions::new(CoverageSource::Single("nope".into()), "roads", "geom", "geom3d");
        assert!(matches!(drape_geometries(&mut store, &unknown), Err(Error::Validation(_))));

        let no_table = DrapeOptions::new(CoverageSource::Single("dem".into()), "rivers", "geom", "geom3d");
        assert!(matches!(drape_geometries(&mut store, &no_table), Err(Error::Validation(_))));

        let no_column = DrapeOptions::new(CoverageSource::Single("dem".into()), "roads", "shape", "geom3d");
        assert!(matches!(drape_geometries(&mut store, &no_column), Err(Error::Validation(_))));

        store.add_geometry_column(column("existing", Dimensions::Xyz, 31370));
        let exists = DrapeOptions::new(CoverageSource::Single("dem".into()), "roads", "geom", "existing");
        assert!(matches!(drape_geometries(&mut store, &exists), Err(Error::Configuration(_))));

        store.add_column("roads", "name").unwrap();
        let attribute = DrapeOptions::new(CoverageSource::Single("dem".into()), "roads", "geom", "name");
        assert!(matches!(drape_geometries(&mut store, &attribute), Err(Error::Configuration(_))));

        store.add_coverage(Coverage::new("loose", SampleType::Float32, 31370, 1.0).with_strict_resolution(false));
        let loose = DrapeOptions::new(CoverageSource::Single("loose".into()), "roads", "geom", "geom3d");
        assert!(matches!(drape_geometries(&mut store, &loose), Err(Error::Validation(_))));

        store.add_coverage(Coverage::new("wgs84", SampleType::Float32, 4326, 1.0));
        let srid = DrapeOptions::new(CoverageSource::Single("wgs84".into()), "roads", "geom", "geom3d");
        assert!(matches!(drape_geometries(&mut store, &srid), Err(Error::Validation(_))));

        let mixed = DrapeOptions::new(CoverageSource::List(vec!["dem".into(), "wgs84".into()]), "roads", "geom", "geom3d");
        assert!(matches!(drape_geometries(&mut store, &mixed), Err(Error::Validation(_))));

        assert!(store.geometry_column("roads", "geom3d").unwrap().is_none());
        assert!(!store.in_bulk_mode());
    }

    #[test_log::test]
    fn coverage_list_in_declared_order() {
        let (mut store, row) = scenario(Dimensions::Xyz);
        store.add_coverage(Coverage::new("fill", SampleType::Float32, 31370, 1.0));
        store
            .add_tile("fill", 0, Some(Rect::from_bounds(-100.0, -50.0, 300.0, 50.0)), Some({
                AnyRasterTile::from(RasterTile::filled(400, 100, 7.0f32))
                    .encode(CompressionAlgorithm::Lz4Block)
                    .unwrap()
            }))
            .unwrap();

        // extend the line beyond the first coverage
        let geom = line(Dimensions::Xyz, &[Coordinate::xyz(0.0, 0.0, NODATA), Coordinate::xyz(200.0, 0.0, NODATA)]);
        store.write_geometry("roads", "geom", row, &geom).unwrap();

        let list = DrapeOptions::new(CoverageSource::List(vec!["dem".into(), "fill".into()]), "roads", "geom", "geom3d")
            .with_densify_distance(50.0);
        let report = drape_geometries(&mut store, &list).unwrap();
        assert_eq!(report.coverages.len(), 2);
        assert_eq!(report.coverages[0].vertices_draped, 3);
        assert_eq!(report.coverages[1].vertices_draped, 2);

        let mut z = Vec::new();
        store
            .geometry("roads", "geom3d", row)
            .unwrap()
            .unwrap()
            .shape()
            .for_each_coordinate(&mut |c| z.push(c.z().unwrap()));
        assert_eq!(z, vec![42.0, 42.0, 42.0, 7.0, 7.0]);
    }

    /// Applies the bulk settings and then fails, like a store that rejects its second pragma
    struct FailingBulkStore(MemoryStore);

    impl GeometryStore for FailingBulkStore {
        fn table_exists(&self, table: &str) -> Result<bool> {
            self.0.table_exists(table)
        }

        fn column_exists(&self, table: &str, column: &str) -> Result<bool> {
            self.0.column_exists(table, column)
        }

        fn geometry_column(&self, table: &str, column: &str) -> Result<Option<GeometryColumn>> {
            self.0.geometry_column(table, column)
        }

        fn create_geometry_column(&mut self, column: &GeometryColumn) -> Result<()> {
            self.0.create_geometry_column(column)
        }

        fn create_spatial_index(&mut self, table: &str, column: &str) -> Result<()> {
            self.0.create_spatial_index(table, column)
        }

        fn row_ids(&self, table: &str, column: &str, filter: Option<&Rect>) -> Result<Vec<RowId>> {
            self.0.row_ids(table, column, filter)
        }

        fn read_geometry(&self, table: &str, column: &str, row: RowId) -> Result<Option<Vec<u8>>> {
            self.0.read_geometry(table, column, row)
        }

        fn write_geometry(&mut self, table: &str, column: &str, row: RowId, geometry: &Geometry) -> Result<()> {
            self.0.write_geometry(table, column, row, geometry)
        }

        fn begin_transaction(&mut self) -> Result<()> {
            self.0.begin_transaction()
        }

        fn commit(&mut self) -> Result<()> {
            self.0.commit()
        }

        fn rollback(&mut self) -> Result<()> {
            self.0.rollback()
        }

        fn enter_bulk_mode(&mut self) -> Result<()> {
            self.0.enter_bulk_mode()?;
            Err(Error::DatabaseError("cannot change journal mode".into()))
        }

        fn leave_bulk_mode(&mut self) -> Result<()> {
            self.0.leave_bulk_mode()
        }
    }

    impl CoverageStore for FailingBulkStore {
        fn coverage(&self, name: &str) -> Result<Option<Coverage>> {
            self.0.coverage(name)
        }

        fn tile_ids(&self, coverage: &str, pyramid_level: i32) -> Result<Vec<TileId>> {
            self.0.tile_ids(coverage, pyramid_level)
        }

        fn read_tile(&self, coverage: &str, id: TileId) -> Result<Option<TileRecord>> {
            self.0.read_tile(coverage, id)
        }
    }

    #[test_log::test]
    fn failing_bulk_mode_is_undone() {
        let (store, _) = scenario(Dimensions::Xy);
        let mut store = FailingBulkStore(store);

        let result = drape_geometries(&mut store, &options());
        assert!(matches!(result, Err(Error::DatabaseError(_))));
        assert!(!store.0.in_bulk_mode());
        assert!(!store.0.in_transaction());
        assert!(store.0.geometry_column("roads", "geom3d").unwrap().is_none());
    }

    #[test]
    fn status_from_result() {
        let ok = DrapeStatus::from(Ok(DrapeReport::default()));
        assert!(ok.success);
        assert!(ok.message.contains("0 rows copied"));

        let failed = DrapeStatus::from(Err(Error::Validation("unknown raster coverage 'x'".into())));
        assert!(!failed.success);
        assert_eq!(failed.message, "Validation error: unknown raster coverage 'x'");
    }
}
