//! Drape vector geometries on tiled elevation rasters.
//!
//! Facade over the workspace crates, see the [`drape`] crate for the pipeline itself.

pub use drape;
pub use geo;
pub use inf;
pub use raster_tile;
#[cfg(feature = "sqlite")]
pub use sqlite;

pub use drape::{CoverageSource, DrapeOptions, DrapeReport, DrapeStatus, drape_geometries};
pub use inf::{Error, Result};
