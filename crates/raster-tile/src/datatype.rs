use bytemuck::Pod;

/// Numeric type of the samples stored in a raster tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum SampleType {
    Int8 = 0,
    Uint8 = 1,
    Int16 = 2,
    Uint16 = 3,
    Int32 = 4,
    Uint32 = 5,
    Float32 = 6,
    Float64 = 7,
}

impl SampleType {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => SampleType::Int8,
            1 => SampleType::Uint8,
            2 => SampleType::Int16,
            3 => SampleType::Uint16,
            4 => SampleType::Int32,
            5 => SampleType::Uint32,
            6 => SampleType::Float32,
            7 => SampleType::Float64,
            _ => return None,
        })
    }

    pub fn to_str(&self) -> &'static str {
        match self {
            Self::Int8 => "INT8",
            Self::Uint8 => "UINT8",
            Self::Int16 => "INT16",
            Self::Uint16 => "UINT16",
            Self::Int32 => "INT32",
            Self::Uint32 => "UINT32",
            Self::Float32 => "FLOAT",
            Self::Float64 => "DOUBLE",
        }
    }

    pub fn size_in_bytes(&self) -> usize {
        match self {
            Self::Int8 | Self::Uint8 => 1,
            Self::Int16 | Self::Uint16 => 2,
            Self::Int32 | Self::Uint32 | Self::Float32 => 4,
            Self::Float64 => 8,
        }
    }
}

impl std::fmt::Display for SampleType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

impl std::str::FromStr for SampleType {
    type Err = inf::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_uppercase().as_str() {
            "INT8" => SampleType::Int8,
            "UINT8" => SampleType::Uint8,
            "INT16" => SampleType::Int16,
            "UINT16" => SampleType::Uint16,
            "INT32" => SampleType::Int32,
            "UINT32" => SampleType::Uint32,
            "FLOAT" | "FLOAT32" => SampleType::Float32,
            "DOUBLE" | "FLOAT64" => SampleType::Float64,
            _ => return Err(inf::Error::InvalidArgument(format!("Unknown sample type: {s}"))),
        })
    }
}

/// Rust types that can be stored as tile samples
pub trait TileDataType: Pod + Into<f64> {
    const TYPE: SampleType;
}

impl TileDataType for i8 {
    const TYPE: SampleType = SampleType::Int8;
}

impl TileDataType for u8 {
    const TYPE: SampleType = SampleType::Uint8;
}

impl TileDataType for i16 {
    const TYPE: SampleType = SampleType::Int16;
}

impl TileDataType for u16 {
    const TYPE: SampleType = SampleType::Uint16;
}

impl TileDataType for i32 {
    const TYPE: SampleType = SampleType::Int32;
}

impl TileDataType for u32 {
    const TYPE: SampleType = SampleType::Uint32;
}

impl TileDataType for f32 {
    const TYPE: SampleType = SampleType::Float32;
}

impl TileDataType for f64 {
    const TYPE: SampleType = SampleType::Float64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_sample_type() {
        assert_eq!("uint16".parse::<SampleType>().unwrap(), SampleType::Uint16);
        assert_eq!("FLOAT".parse::<SampleType>().unwrap(), SampleType::Float32);
        assert_eq!(SampleType::Float64.to_str().parse::<SampleType>().unwrap(), SampleType::Float64);
        assert!("INT64".parse::<SampleType>().is_err());
    }

    #[test]
    fn u8_roundtrip() {
        for value in 0..8u8 {
            assert_eq!(SampleType::from_u8(value).unwrap() as u8, value);
        }
        assert!(SampleType::from_u8(8).is_none());
    }
}
