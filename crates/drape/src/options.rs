use crate::{Error, Result};

pub const DEFAULT_NO_DATA_VALUE: f64 = -9999.0;

/// The raster coverage(s) used as draping surface
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CoverageSource {
    Single(String),
    /// Coverages are draped in the listed order, earlier coverages take precedence
    List(Vec<String>),
}

impl CoverageSource {
    pub fn names(&self) -> Vec<&str> {
        match self {
            CoverageSource::Single(name) => vec![name.as_str()],
            CoverageSource::List(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

/// Configuration of a draping run
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DrapeOptions {
    pub coverage: CoverageSource,
    pub spatial_table: String,
    pub old_geom_column: String,
    pub new_geom_column: String,
    /// Sentinel stored in ordinates that have no sampled value
    #[cfg_attr(feature = "serde", serde(default = "default_no_data_value"))]
    pub no_data_value: f64,
    /// Maximum vertex spacing after densification, 0 disables densification
    #[cfg_attr(feature = "serde", serde(default))]
    pub densify_dist: f64,
    /// Douglas-Peucker tolerance on the elevation profile, <= 0 disables simplification
    #[cfg_attr(feature = "serde", serde(default))]
    pub simplify_dist: f64,
    /// Drape the m ordinate instead of z
    #[cfg_attr(feature = "serde", serde(default))]
    pub update_m: bool,
}

#[cfg(feature = "serde")]
fn default_no_data_value() -> f64 {
    DEFAULT_NO_DATA_VALUE
}

impl DrapeOptions {
    pub fn new(
        coverage: CoverageSource,
        spatial_table: impl Into<String>,
        old_geom_column: impl Into<String>,
        new_geom_column: impl Into<String>,
    ) -> Self {
        DrapeOptions {
            coverage,
            spatial_table: spatial_table.into(),
            old_geom_column: old_geom_column.into(),
            new_geom_column: new_geom_column.into(),
            no_data_value: DEFAULT_NO_DATA_VALUE,
            densify_dist: 0.0,
            simplify_dist: 0.0,
            update_m: false,
        }
    }

    /// Builds the options from the two mutually exclusive coverage arguments
    pub fn from_sources(
        raster_coverage: Option<String>,
        coverage_list: Option<Vec<String>>,
        spatial_table: impl Into<String>,
        old_geom_column: impl Into<String>,
        new_geom_column: impl Into<String>,
    ) -> Result<Self> {
        let coverage = match (raster_coverage, coverage_list) {
            (Some(name), None) => CoverageSource::Single(name),
            (None, Some(names)) => CoverageSource::List(names),
            (Some(_), Some(_)) => {
                return Err(Error::Configuration(
                    "a raster coverage and a coverage list cannot both be specified".into(),
                ));
            }
            (None, None) => {
                return Err(Error::Configuration(
                    "either a raster coverage or a coverage list must be specified".into(),
                ));
            }
        };

        Ok(DrapeOptions::new(coverage, spatial_table, old_geom_column, new_geom_column))
    }

    pub fn with_no_data_value(mut self, value: f64) -> Self {
        self.no_data_value = value;
        self
    }

    pub fn with_densify_distance(mut self, dist: f64) -> Self {
        self.densify_dist = dist;
        self
    }

    pub fn with_simplify_distance(mut self, dist: f64) -> Self {
        self.simplify_dist = dist;
        self
    }

    pub fn with_update_m(mut self, update_m: bool) -> Self {
        self.update_m = update_m;
        self
    }

    /// Checks the options that can be verified without looking at the store
    pub fn validate(&self) -> Result<()> {
        for (what, value) in [
            ("spatial table", &self.spatial_table),
            ("old geometry column", &self.old_geom_column),
            ("new geometry column", &self.new_geom_column),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Configuration(format!("the {what} name cannot be empty")));
            }
        }

        if self.old_geom_column.eq_ignore_ascii_case(&self.new_geom_column) {
            return Err(Error::Configuration(format!(
                "the old and new geometry columns cannot be the same ({})",
                self.old_geom_column
            )));
        }

        if !self.densify_dist.is_finite() || !self.simplify_dist.is_finite() {
            return Err(Error::Configuration("densify and simplify distances must be finite".into()));
        }

        match &self.coverage {
            CoverageSource::Single(name) if name.trim().is_empty() => {
                Err(Error::Configuration("the raster coverage name cannot be empty".into()))
            }
            CoverageSource::List(names) if names.is_empty() => Err(Error::Validation("the coverage list is empty".into())),
            CoverageSource::List(names) if names.iter().any(|n| n.trim().is_empty()) => {
                Err(Error::Validation("the coverage list contains an empty name".into()))
            }
            _ => Ok(()),
        }
    }
}
