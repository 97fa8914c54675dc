//! Vector geometry model with xy, xyz, xym and xyzm vertices.

#![warn(clippy::unwrap_used)]

pub type Error = inf::Error;
pub type Result<T = ()> = inf::Result<T>;

mod coordinate;
mod dimensions;
mod geometry;
mod geometrytype;
mod linestring;
mod pointlist;
pub mod rect;
pub mod wkb;

#[doc(inline)]
pub use coordinate::Coordinate;
#[doc(inline)]
pub use dimensions::{Dimensions, Ordinate};
#[doc(inline)]
pub use geometry::{Geometry, Polygon, Shape};
#[doc(inline)]
pub use geometrytype::GeometryType;
#[doc(inline)]
pub use linestring::LineString;
#[doc(inline)]
pub use pointlist::PointList;
#[doc(inline)]
pub use rect::Rect;
