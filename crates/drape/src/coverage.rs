use raster_tile::SampleType;

/// Metadata of a tiled raster coverage
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Coverage {
    pub name: String,
    pub sample_type: SampleType,
    pub srid: i32,
    pub horz_res: f64,
    pub vert_res: f64,
    /// All the tiles share the same pixel size
    pub strict_resolution: bool,
    /// Pixels with this value are treated as transparent
    pub no_data: Option<f64>,
}

impl Coverage {
    pub fn new(name: impl Into<String>, sample_type: SampleType, srid: i32, resolution: f64) -> Self {
        Coverage {
            name: name.into(),
            sample_type,
            srid,
            horz_res: resolution,
            vert_res: resolution,
            strict_resolution: true,
            no_data: None,
        }
    }

    pub fn with_resolution(mut self, horz_res: f64, vert_res: f64) -> Self {
        self.horz_res = horz_res;
        self.vert_res = vert_res;
        self
    }

    pub fn with_no_data(mut self, no_data: Option<f64>) -> Self {
        self.no_data = no_data;
        self
    }

    pub fn with_strict_resolution(mut self, strict: bool) -> Self {
        self.strict_resolution = strict;
        self
    }

    pub fn is_no_data(&self, value: f64) -> bool {
        match self.no_data {
            Some(nodata) if nodata.is_nan() => value.is_nan(),
            Some(nodata) => value == nodata,
            None => false,
        }
    }
}
