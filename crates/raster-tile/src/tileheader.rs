use bytemuck::{Pod, Zeroable};

use crate::{Error, Result, SampleType};

pub const RASTER_TILE_SIGNATURE: u32 = u32::from_le_bytes([b'D', b'E', b'M', b'T']);
const VERSION: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompressionAlgorithm {
    Lz4Block = 0,
}

impl CompressionAlgorithm {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(CompressionAlgorithm::Lz4Block),
            _ => None,
        }
    }
}

/// Binary header of an encoded tile payload, followed by the compressed pixels and the compressed mask
/// The header is stored in the byte order of the host (little endian on all supported platforms).
/// The decompressed pixel data is always `tile_width` * `tile_height` * sizeof(`sample_type`) bytes long,
/// the decompressed mask (if present) holds one byte per pixel, 0 marks a transparent pixel.
#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C, packed)]
pub struct TileHeader {
    /// signature to recognize the format (always ['D', 'E', 'M', 'T'])
    pub signature: u32,
    /// The version of the format (currently 1)
    pub version: u16,
    /// `SampleType` as u8
    pub sample_type: u8,
    /// `CompressionAlgorithm` as u8
    pub compression: u8,
    pub tile_width: u16,
    pub tile_height: u16,
    /// Size in bytes of the compressed pixel data that follows the header
    pub data_size: u32,
    /// Size in bytes of the compressed mask that follows the pixel data, 0 when the tile has no mask
    pub mask_size: u32,
}

impl TileHeader {
    pub const SIZE: usize = std::mem::size_of::<TileHeader>();

    pub fn new(
        sample_type: SampleType,
        compression: CompressionAlgorithm,
        tile_width: u16,
        tile_height: u16,
        data_size: u32,
        mask_size: u32,
    ) -> Self {
        Self {
            signature: RASTER_TILE_SIGNATURE,
            version: VERSION,
            sample_type: sample_type as u8,
            compression: compression as u8,
            tile_width,
            tile_height,
            data_size,
            mask_size,
        }
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::Decode(format!("Tile data is too short ({} bytes)", data.len())));
        }

        let header: TileHeader = bytemuck::pod_read_unaligned(&data[..Self::SIZE]);
        let (signature, version) = (header.signature, header.version);
        if signature != RASTER_TILE_SIGNATURE {
            return Err(Error::Decode("Invalid tile signature".into()));
        }

        if version != VERSION {
            return Err(Error::Decode(format!("Unsupported tile version: {version}")));
        }

        header.sample_type()?;
        header.compression()?;

        Ok(header)
    }

    pub fn sample_type(&self) -> Result<SampleType> {
        let value = self.sample_type;
        SampleType::from_u8(value).ok_or_else(|| Error::Decode(format!("Invalid tile sample type: {value}")))
    }

    pub fn compression(&self) -> Result<CompressionAlgorithm> {
        let value = self.compression;
        CompressionAlgorithm::from_u8(value).ok_or_else(|| Error::Decode(format!("Invalid compression algorithm: {value}")))
    }

    pub fn pixel_count(&self) -> usize {
        let (width, height) = (self.tile_width, self.tile_height);
        width as usize * height as usize
    }

    /// Total payload size described by this header
    pub fn payload_size(&self) -> usize {
        let (data_size, mask_size) = (self.data_size, self.mask_size);
        Self::SIZE + data_size as usize + mask_size as usize
    }
}
