//! Raster tiles over the eight supported sample types and their binary payload format.

mod datatype;
mod lz4;
mod rastertile;
mod tileheader;

pub use datatype::SampleType;
pub use datatype::TileDataType;
pub use rastertile::AnyRasterTile;
pub use rastertile::Pixel;
pub use rastertile::RasterTile;
pub use tileheader::CompressionAlgorithm;
pub use tileheader::RASTER_TILE_SIGNATURE;
pub use tileheader::TileHeader;

pub type Error = inf::Error;
pub type Result<T = ()> = inf::Result<T>;
