use std::path::PathBuf;

use clap::Parser;
use comfy_table::Table;
use drape::{CoverageSource, DrapeOptions, DrapeReport, SqliteStore};
use env_logger::{Env, TimestampPrecision};

pub type Result<T> = anyhow::Result<T>;

#[derive(Parser, Debug)]
#[clap(name = "demdrape", about = "Drape vector geometries on a tiled elevation raster")]
pub struct Opt {
    #[arg(long = "db", short = 'd', env = "DEMDRAPE_DB")]
    pub db: PathBuf,

    #[arg(long = "table", short = 't')]
    pub table: String,

    #[arg(long = "old")]
    pub old_geom_column: String,

    #[arg(long = "new")]
    pub new_geom_column: String,

    #[arg(long = "coverage", conflicts_with = "coverage_list", required_unless_present = "coverage_list")]
    pub coverage: Option<String>,

    #[arg(long = "coverage-list", value_delimiter = ',')]
    pub coverage_list: Option<Vec<String>>,

    #[arg(long = "nodata", default_value_t = drape::DEFAULT_NO_DATA_VALUE, allow_negative_numbers = true)]
    pub no_data: f64,

    #[arg(long = "densify", default_value_t = 0.0)]
    pub densify_dist: f64,

    #[arg(long = "simplify", default_value_t = 0.0)]
    pub simplify_dist: f64,

    #[arg(long = "update-m")]
    pub update_m: bool,
}

impl Opt {
    fn drape_options(&self) -> inf::Result<DrapeOptions> {
        Ok(DrapeOptions::from_sources(
            self.coverage.clone(),
            self.coverage_list.clone(),
            &self.table,
            &self.old_geom_column,
            &self.new_geom_column,
        )?
        .with_no_data_value(self.no_data)
        .with_densify_distance(self.densify_dist)
        .with_simplify_distance(self.simplify_dist)
        .with_update_m(self.update_m))
    }
}

fn print_report(report: &DrapeReport) {
    let mut table = Table::new();
    table
        .set_header(vec!["Stage", "Result"])
        .add_row(vec!["Rows copied".to_string(), report.rows_copied.to_string()])
        .add_row(vec!["Rows skipped".to_string(), report.rows_skipped.to_string()]);

    for stats in &report.coverages {
        table.add_row(vec![
            format!("Coverage {}", stats.coverage),
            format!(
                "{} tiles, {} features updated, {} vertices draped",
                stats.tiles_processed, stats.features_updated, stats.vertices_draped
            ),
        ]);
    }

    table
        .add_row(vec!["Rows simplified".to_string(), report.rows_simplified.to_string()])
        .add_row(vec!["Vertices removed".to_string(), report.vertices_removed.to_string()]);

    println!("{table}");
}

fn main() -> Result<()> {
    let opt = Opt::parse();

    env_logger::Builder::from_env(Env::default().default_filter_or("warn"))
        .format_timestamp(Some(TimestampPrecision::Millis))
        .init();

    let options = opt.drape_options()?;
    let coverage_desc = match &options.coverage {
        CoverageSource::Single(name) => name.clone(),
        CoverageSource::List(names) => names.join(","),
    };
    log::info!("Draping {} on {coverage_desc}", opt.db.display());

    let mut store = SqliteStore::open(&opt.db)?;
    let report = drape::drape_geometries(&mut store, &options)?;
    print_report(&report);

    Ok(())
}
