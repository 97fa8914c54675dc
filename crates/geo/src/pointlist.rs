use crate::{Coordinate, Dimensions, LineString};

/// Append only vertex buffer for sequences whose final length is unknown up front
/// Once complete it is turned into a fixed size `LineString` without copying.
#[derive(Debug, Clone)]
pub struct PointList {
    dims: Dimensions,
    coords: Vec<f64>,
}

impl PointList {
    pub fn new(dims: Dimensions) -> Self {
        PointList { dims, coords: Vec::new() }
    }

    pub fn with_capacity(dims: Dimensions, capacity: usize) -> Self {
        PointList {
            dims,
            coords: Vec::with_capacity(capacity * dims.stride()),
        }
    }

    pub fn dims(&self) -> Dimensions {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.coords.len() / self.dims.stride()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    pub fn push(&mut self, coord: Coordinate) {
        debug_assert_eq!(coord.dimensions(), self.dims, "Vertex dimensions mismatch");
        coord.to_dimensions(self.dims, 0.0).extend_into(&mut self.coords);
    }

    pub fn into_linestring(self) -> LineString {
        LineString::from_raw(self.dims, self.coords)
    }
}

impl Extend<Coordinate> for PointList {
    fn extend<I: IntoIterator<Item = Coordinate>>(&mut self, iter: I) {
        for coord in iter {
            self.push(coord);
        }
    }
}
