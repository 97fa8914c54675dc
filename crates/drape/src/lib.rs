//! Drapes vector geometries on tiled elevation (or measure) rasters.
//!
//! A run consists of three stages that operate on a feature table:
//! - densification: the source geometries are copied into a new geometry column with extra
//!   vertices so that no segment exceeds the densify distance
//! - draping: every vertex without a value receives the value of the raster pixel below it
//! - simplification: the vertices that were added by densification and do not contribute to
//!   the elevation profile are removed again
//!
//! The stages are orchestrated by [`drape_geometries`] on top of a [`GeometryStore`] and
//! [`CoverageStore`] implementation such as [`SqliteStore`] or [`MemoryStore`].

#![warn(clippy::unwrap_used)]

pub type Error = inf::Error;
pub type Result<T = ()> = inf::Result<T>;

mod context;
mod coverage;
pub mod densify;
mod distance;
pub mod drape;
mod memorystore;
mod options;
mod pipeline;
pub mod sampler;
pub mod simplify;
mod sqlitestore;
mod store;

#[doc(inline)]
pub use context::DrapeContext;
#[doc(inline)]
pub use coverage::Coverage;
#[doc(inline)]
pub use distance::{DistancePrimitive, PlanarDistance, ProfileCoord};
#[doc(inline)]
pub use drape::DrapeStats;
#[doc(inline)]
pub use memorystore::MemoryStore;
#[doc(inline)]
pub use options::{CoverageSource, DEFAULT_NO_DATA_VALUE, DrapeOptions};
#[doc(inline)]
pub use pipeline::{DrapeReport, DrapeStatus, drape_geometries, drape_geometries_with, target_dimensions};
#[doc(inline)]
pub use simplify::SimplifyParams;
#[doc(inline)]
pub use sqlitestore::{SqliteStore, geometry_type_from_iso_code, iso_geometry_type_code};
#[doc(inline)]
pub use store::{CoverageStore, GeometryColumn, GeometryStore, RowId, TileId, TileRecord};
