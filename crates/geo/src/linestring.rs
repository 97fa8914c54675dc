use crate::{Coordinate, Dimensions, Ordinate, Rect};

/// A sequence of vertices stored as a flat ordinate buffer
/// The layout per vertex is x, y followed by z and/or m depending on the dimensions.
/// Used for linestrings and polygon rings alike.
#[derive(Debug, Clone, PartialEq)]
pub struct LineString {
    dims: Dimensions,
    coords: Vec<f64>,
}

impl LineString {
    pub fn new(dims: Dimensions) -> Self {
        LineString { dims, coords: Vec::new() }
    }

    /// Creates a linestring with `len` vertex slots, all ordinates initialized to zero
    pub fn with_len(dims: Dimensions, len: usize) -> Self {
        LineString {
            dims,
            coords: vec![0.0; len * dims.stride()],
        }
    }

    pub fn from_coordinates(dims: Dimensions, coords: impl IntoIterator<Item = Coordinate>) -> Self {
        let mut line = LineString::new(dims);
        for coord in coords {
            line.push(coord);
        }
        line
    }

    pub(crate) fn from_raw(dims: Dimensions, coords: Vec<f64>) -> Self {
        debug_assert!(coords.len() % dims.stride() == 0);
        LineString { dims, coords }
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

    fn slot(&self, index: usize) -> &[f64] {
        let stride = self.dims.stride();
        &self.coords[index * stride..(index + 1) * stride]
    }

    /// Panics when the index is out of range
    pub fn get(&self, index: usize) -> Coordinate {
        Coordinate::from_slice(self.dims, self.slot(index))
    }

    /// Stores the vertex, converting it to the dimensions of the linestring when needed
    /// Panics when the index is out of range
    pub fn set(&mut self, index: usize, coord: Coordinate) {
        debug_assert_eq!(coord.dimensions(), self.dims, "Vertex dimensions mismatch");
        let stride = self.dims.stride();
        coord
            .to_dimensions(self.dims, 0.0)
            .write_to(&mut self.coords[index * stride..(index + 1) * stride]);
    }

    pub fn xy(&self, index: usize) -> (f64, f64) {
        let slot = self.slot(index);
        (slot[0], slot[1])
    }

    pub fn xyz(&self, index: usize) -> Option<(f64, f64, f64)> {
        match self.get(index) {
            Coordinate::Xyz { x, y, z } => Some((x, y, z)),
            _ => None,
        }
    }

    pub fn xym(&self, index: usize) -> Option<(f64, f64, f64)> {
        match self.get(index) {
            Coordinate::Xym { x, y, m } => Some((x, y, m)),
            _ => None,
        }
    }

    pub fn xyzm(&self, index: usize) -> Option<(f64, f64, f64, f64)> {
        match self.get(index) {
            Coordinate::Xyzm { x, y, z, m } => Some((x, y, z, m)),
            _ => None,
        }
    }

    pub fn set_xy(&mut self, index: usize, x: f64, y: f64) {
        let stride = self.dims.stride();
        self.coords[index * stride] = x;
        self.coords[index * stride + 1] = y;
    }

    /// Overwrites the vertex, the linestring must be xyz
    pub fn set_xyz(&mut self, index: usize, x: f64, y: f64, z: f64) {
        debug_assert_eq!(self.dims, Dimensions::Xyz);
        self.set(index, Coordinate::xyz(x, y, z));
    }

    /// Overwrites the vertex, the linestring must be xym
    pub fn set_xym(&mut self, index: usize, x: f64, y: f64, m: f64) {
        debug_assert_eq!(self.dims, Dimensions::Xym);
        self.set(index, Coordinate::xym(x, y, m));
    }

    pub fn set_xyzm(&mut self, index: usize, x: f64, y: f64, z: f64, m: f64) {
        debug_assert_eq!(self.dims, Dimensions::Xyzm);
        self.set(index, Coordinate::xyzm(x, y, z, m));
    }

    fn ordinate_offset(&self, ordinate: Ordinate) -> Option<usize> {
        match (self.dims, ordinate) {
            (Dimensions::Xyz | Dimensions::Xyzm, Ordinate::Z) => Some(2),
            (Dimensions::Xym, Ordinate::M) => Some(2),
            (Dimensions::Xyzm, Ordinate::M) => Some(3),
            _ => None,
        }
    }

    pub fn ordinate(&self, index: usize, ordinate: Ordinate) -> Option<f64> {
        self.ordinate_offset(ordinate)
            .map(|offset| self.coords[index * self.dims.stride() + offset])
    }

    /// Overwrites a single ordinate, returns false when the linestring has no such ordinate
    pub fn set_ordinate(&mut self, index: usize, ordinate: Ordinate, value: f64) -> bool {
        match self.ordinate_offset(ordinate) {
            Some(offset) => {
                let stride = self.dims.stride();
                self.coords[index * stride + offset] = value;
                true
            }
            None => false,
        }
    }

    pub fn coordinates(&self) -> impl ExactSizeIterator<Item = Coordinate> + '_ {
        self.coords
            .chunks_exact(self.dims.stride())
            .map(|slot| Coordinate::from_slice(self.dims, slot))
    }

    pub fn first(&self) -> Option<Coordinate> {
        if self.is_empty() { None } else { Some(self.get(0)) }
    }

    pub fn last(&self) -> Option<Coordinate> {
        if self.is_empty() { None } else { Some(self.get(self.len() - 1)) }
    }

    pub fn is_closed(&self) -> bool {
        match (self.first(), self.last()) {
            (Some(first), Some(last)) => self.len() > 1 && first.same_position(&last),
            _ => false,
        }
    }

    pub fn bbox(&self) -> Option<Rect> {
        Rect::bounding(self.coordinates())
    }

    /// Converts the vertices to other dimensions, new ordinates are set to `fill`
    pub fn to_dimensions(&self, dims: Dimensions, fill: f64) -> LineString {
        if dims == self.dims {
            return self.clone();
        }

        let mut coords = Vec::with_capacity(self.len() * dims.stride());
        for coord in self.coordinates() {
            coord.to_dimensions(dims, fill).extend_into(&mut coords);
        }
        LineString::from_raw(dims, coords)
    }
}
