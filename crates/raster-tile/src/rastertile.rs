use bytemuck::bytes_of;

use crate::datatype::TileDataType;
use crate::{CompressionAlgorithm, Error, Result, SampleType, TileHeader, lz4};

/// The value of a single pixel, transparent pixels should not be used
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pixel {
    pub value: f64,
    pub opaque: bool,
}

impl Pixel {
    pub const TRANSPARENT: Pixel = Pixel {
        value: f64::NAN,
        opaque: false,
    };
}

/// Struct containing the tile dimensions, the row major pixel data and the optional validity mask
#[derive(Debug, Clone, PartialEq)]
pub struct RasterTile<T> {
    pub width: usize,
    pub height: usize,
    pub data: Vec<T>,
    /// One byte per pixel, 0 marks an invalid (transparent) pixel
    pub mask: Option<Vec<u8>>,
}

/// Type erased `RasterTile`
#[derive(Debug, Clone, PartialEq)]
pub enum AnyRasterTile {
    I8(RasterTile<i8>),
    U8(RasterTile<u8>),
    I16(RasterTile<i16>),
    U16(RasterTile<u16>),
    I32(RasterTile<i32>),
    U32(RasterTile<u32>),
    F32(RasterTile<f32>),
    F64(RasterTile<f64>),
}

macro_rules! dispatch {
    ( $tile:expr, $inner:ident => $body:expr ) => {
        match $tile {
            AnyRasterTile::I8($inner) => $body,
            AnyRasterTile::U8($inner) => $body,
            AnyRasterTile::I16($inner) => $body,
            AnyRasterTile::U16($inner) => $body,
            AnyRasterTile::I32($inner) => $body,
            AnyRasterTile::U32($inner) => $body,
            AnyRasterTile::F32($inner) => $body,
            AnyRasterTile::F64($inner) => $body,
        }
    };
}

impl AnyRasterTile {
    /// Decode a tile payload: a `TileHeader` followed by the compressed pixels and the optional compressed mask
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let header = TileHeader::from_bytes(data)?;
        if data.len() != header.payload_size() {
            return Err(Error::Decode(format!(
                "Tile data size mismatch: header describes {} bytes, payload has {}",
                header.payload_size(),
                data.len()
            )));
        }

        let payload = &data[TileHeader::SIZE..];
        Ok(match header.sample_type()? {
            SampleType::Int8 => AnyRasterTile::I8(RasterTile::from_header_and_data(&header, payload)?),
            SampleType::Uint8 => AnyRasterTile::U8(RasterTile::from_header_and_data(&header, payload)?),
            SampleType::Int16 => AnyRasterTile::I16(RasterTile::from_header_and_data(&header, payload)?),
            SampleType::Uint16 => AnyRasterTile::U16(RasterTile::from_header_and_data(&header, payload)?),
            SampleType::Int32 => AnyRasterTile::I32(RasterTile::from_header_and_data(&header, payload)?),
            SampleType::Uint32 => AnyRasterTile::U32(RasterTile::from_header_and_data(&header, payload)?),
            SampleType::Float32 => AnyRasterTile::F32(RasterTile::from_header_and_data(&header, payload)?),
            SampleType::Float64 => AnyRasterTile::F64(RasterTile::from_header_and_data(&header, payload)?),
        })
    }

    pub fn encode(&self, algorithm: CompressionAlgorithm) -> Result<Vec<u8>> {
        dispatch!(self, tile => tile.encode(algorithm))
    }

    pub fn width(&self) -> usize {
        dispatch!(self, tile => tile.width)
    }

    pub fn height(&self) -> usize {
        dispatch!(self, tile => tile.height)
    }

    pub fn has_mask(&self) -> bool {
        dispatch!(self, tile => tile.mask.is_some())
    }

    pub fn sample_type(&self) -> SampleType {
        match self {
            AnyRasterTile::I8(_) => SampleType::Int8,
            AnyRasterTile::U8(_) => SampleType::Uint8,
            AnyRasterTile::I16(_) => SampleType::Int16,
            AnyRasterTile::U16(_) => SampleType::Uint16,
            AnyRasterTile::I32(_) => SampleType::Int32,
            AnyRasterTile::U32(_) => SampleType::Uint32,
            AnyRasterTile::F32(_) => SampleType::Float32,
            AnyRasterTile::F64(_) => SampleType::Float64,
        }
    }

    /// Fetches the pixel at the given cell, out of range cells are transparent
    pub fn fetch_pixel(&self, row: usize, col: usize) -> Pixel {
        dispatch!(self, tile => tile.fetch_pixel(row, col))
    }
}

impl<T: TileDataType> RasterTile<T> {
    pub fn new(width: usize, height: usize, data: Vec<T>) -> Result<Self> {
        if data.len() != width * height {
            return Err(Error::InvalidArgument(format!(
                "Tile data length {} does not match the tile size {width}x{height}",
                data.len()
            )));
        }

        Ok(RasterTile {
            width,
            height,
            data,
            mask: None,
        })
    }

    pub fn filled(width: usize, height: usize, value: T) -> Self {
        RasterTile {
            width,
            height,
            data: vec![value; width * height],
            mask: None,
        }
    }

    pub fn with_mask(mut self, mask: Vec<u8>) -> Result<Self> {
        if mask.len() != self.width * self.height {
            return Err(Error::InvalidArgument(format!(
                "Tile mask length {} does not match the tile size {}x{}",
                mask.len(),
                self.width,
                self.height
            )));
        }

        self.mask = Some(mask);
        Ok(self)
    }

    pub fn fetch_pixel(&self, row: usize, col: usize) -> Pixel {
        if row >= self.height || col >= self.width {
            return Pixel::TRANSPARENT;
        }

        let index = row * self.width + col;
        if let Some(mask) = &self.mask {
            if mask[index] == 0 {
                return Pixel::TRANSPARENT;
            }
        }

        Pixel {
            value: self.data[index].into(),
            opaque: true,
        }
    }

    // Create a raster tile from the header data structure and the raw compressed data
    pub fn from_header_and_data(header: &TileHeader, data: &[u8]) -> Result<Self> {
        if header.sample_type()? != T::TYPE {
            return Err(Error::Decode(format!(
                "Tile sample type mismatch: expected {}, got {}",
                T::TYPE,
                header.sample_type()?
            )));
        }

        let (data_size, mask_size) = (header.data_size as usize, header.mask_size as usize);
        if data.len() != data_size + mask_size {
            return Err(Error::Decode("Tile data size mismatch".into()));
        }

        let pixel_count = header.pixel_count();
        let pixels = match header.compression()? {
            CompressionAlgorithm::Lz4Block => lz4::decompress_tile_data::<T>(pixel_count, &data[..data_size])?,
        };

        let mask = if mask_size > 0 {
            Some(lz4::decompress_tile_data::<u8>(pixel_count, &data[data_size..])?)
        } else {
            None
        };

        Ok(Self {
            width: header.tile_width as usize,
            height: header.tile_height as usize,
            data: pixels,
            mask,
        })
    }

    /// Create a raster tile from an encoded payload of the matching sample type
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let header = TileHeader::from_bytes(data)?;
        if data.len() != header.payload_size() {
            return Err(Error::Decode("Tile data size mismatch".into()));
        }

        Self::from_header_and_data(&header, &data[TileHeader::SIZE..])
    }

    // Encode this tile, the output will be a byte vector containing the `TileHeader` followed by the compressed tile data
    pub fn encode(&self, algorithm: CompressionAlgorithm) -> Result<Vec<u8>> {
        if self.width > u16::MAX as usize || self.height > u16::MAX as usize {
            return Err(Error::InvalidArgument(format!(
                "Tile size {}x{} exceeds the maximum tile size",
                self.width, self.height
            )));
        }

        let (compressed_data, compressed_mask) = match algorithm {
            CompressionAlgorithm::Lz4Block => (
                lz4::compress_tile_data(&self.data),
                self.mask.as_deref().map(lz4::compress_tile_data).unwrap_or_default(),
            ),
        };

        let header = TileHeader::new(
            T::TYPE,
            algorithm,
            self.width as u16,
            self.height as u16,
            compressed_data.len() as u32,
            compressed_mask.len() as u32,
        );

        let mut data = Vec::with_capacity(header.payload_size());
        data.extend_from_slice(bytes_of(&header));
        data.extend_from_slice(&compressed_data);
        data.extend_from_slice(&compressed_mask);

        Ok(data)
    }
}

macro_rules! impl_tile_conversions {
    ( $tile_type:path, $tile_type_enum:ident ) => {
        impl From<RasterTile<$tile_type>> for AnyRasterTile {
            fn from(tile: RasterTile<$tile_type>) -> Self {
                AnyRasterTile::$tile_type_enum(tile)
            }
        }

        impl TryFrom<AnyRasterTile> for RasterTile<$tile_type> {
            type Error = Error;

            fn try_from(value: AnyRasterTile) -> Result<Self> {
                match value {
                    AnyRasterTile::$tile_type_enum(tile) => Ok(tile),
                    other => Err(Error::InvalidArgument(format!(
                        "Expected {} tile, got {}",
                        stringify!($tile_type),
                        other.sample_type()
                    ))),
                }
            }
        }
    };
}

impl_tile_conversions!(i8, I8);
impl_tile_conversions!(u8, U8);
impl_tile_conversions!(i16, I16);
impl_tile_conversions!(u16, U16);
impl_tile_conversions!(i32, I32);
impl_tile_conversions!(u32, U32);
impl_tile_conversions!(f32, F32);
impl_tile_conversions!(f64, F64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_u32() {
        const TILE_WIDTH: usize = 256;
        const TILE_HEIGHT: usize = 256;

        let tile = RasterTile::new(TILE_WIDTH, TILE_HEIGHT, (0..(TILE_WIDTH * TILE_HEIGHT) as u32).collect()).unwrap();
        let encoded = tile.encode(CompressionAlgorithm::Lz4Block).unwrap();

        let decoded = AnyRasterTile::from_bytes(&encoded).unwrap();
        assert!(matches!(decoded, AnyRasterTile::U32(_)));

        let decoded_tile: RasterTile<u32> = decoded.try_into().expect("Expected U32 tile");
        assert_eq!(tile, decoded_tile);
    }

    #[test]
    fn encode_decode_with_mask() {
        let mask = (0..100).map(|i| (i % 3 != 0) as u8).collect::<Vec<u8>>();
        let tile = RasterTile::new(10, 10, (0..100).map(|v| v as f32 * 0.5).collect())
            .unwrap()
            .with_mask(mask)
            .unwrap();

        let encoded = tile.encode(CompressionAlgorithm::Lz4Block).unwrap();
        let decoded = AnyRasterTile::from_bytes(&encoded).unwrap();
        assert!(decoded.has_mask());
        assert_eq!(decoded, AnyRasterTile::F32(tile));
    }

    #[test]
    fn fetch_pixel_per_sample_type() {
        let tiles: Vec<AnyRasterTile> = vec![
            RasterTile::<i8>::filled(2, 2, -5).into(),
            RasterTile::<u8>::filled(2, 2, 200).into(),
            RasterTile::<i16>::filled(2, 2, -3000).into(),
            RasterTile::<u16>::filled(2, 2, 60000).into(),
            RasterTile::<i32>::filled(2, 2, -100000).into(),
            RasterTile::<u32>::filled(2, 2, 4000000000).into(),
            RasterTile::<f32>::filled(2, 2, 12.5).into(),
            RasterTile::<f64>::filled(2, 2, -0.125).into(),
        ];
        let expected = [-5.0, 200.0, -3000.0, 60000.0, -100000.0, 4000000000.0, 12.5, -0.125];

        for (tile, expected) in tiles.iter().zip(expected) {
            let pixel = tile.fetch_pixel(1, 1);
            assert!(pixel.opaque, "{}", tile.sample_type());
            assert_eq!(pixel.value, expected, "{}", tile.sample_type());

            let encoded = tile.encode(CompressionAlgorithm::Lz4Block).unwrap();
            assert_eq!(&AnyRasterTile::from_bytes(&encoded).unwrap(), tile);
        }
    }

    #[test]
    fn masked_and_out_of_range_pixels_are_transparent() {
        let tile = AnyRasterTile::from(RasterTile::new(2, 2, vec![1u8, 2, 3, 4]).unwrap().with_mask(vec![1, 0, 1, 1]).unwrap());

        assert!(tile.fetch_pixel(0, 0).opaque);
        assert!(!tile.fetch_pixel(0, 1).opaque);
        assert_eq!(tile.fetch_pixel(1, 0).value, 3.0);
        assert!(!tile.fetch_pixel(2, 0).opaque);
        assert!(!tile.fetch_pixel(0, 2).opaque);
    }

    #[test]
    fn malformed_payloads() {
        let tile = RasterTile::<i16>::filled(16, 16, 7);
        let encoded = tile.encode(CompressionAlgorithm::Lz4Block).unwrap();

        assert!(AnyRasterTile::from_bytes(&encoded[..encoded.len() - 1]).is_err());
        assert!(AnyRasterTile::from_bytes(&encoded[..4]).is_err());
        assert!(AnyRasterTile::from_bytes(&[]).is_err());

        let mut corrupt = encoded.clone();
        for byte in corrupt[TileHeader::SIZE..].iter_mut() {
            *byte = 0xFF;
        }
        assert!(AnyRasterTile::from_bytes(&corrupt).is_err());

        assert!(RasterTile::<u8>::from_bytes(&encoded).is_err(), "sample type mismatch");
        assert!(RasterTile::<u8>::new(2, 2, vec![1, 2, 3]).is_err());
    }
}
