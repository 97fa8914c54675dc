use crate::{Dimensions, Ordinate};

/// A single vertex, the variant determines which ordinates are present
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Coordinate {
    Xy { x: f64, y: f64 },
    Xyz { x: f64, y: f64, z: f64 },
    Xym { x: f64, y: f64, m: f64 },
    Xyzm { x: f64, y: f64, z: f64, m: f64 },
}

impl Coordinate {
    pub const fn xy(x: f64, y: f64) -> Self {
        Coordinate::Xy { x, y }
    }

    pub const fn xyz(x: f64, y: f64, z: f64) -> Self {
        Coordinate::Xyz { x, y, z }
    }

    pub const fn xym(x: f64, y: f64, m: f64) -> Self {
        Coordinate::Xym { x, y, m }
    }

    pub const fn xyzm(x: f64, y: f64, z: f64, m: f64) -> Self {
        Coordinate::Xyzm { x, y, z, m }
    }

    /// Builds a coordinate from a flat ordinate slice laid out as x, y, [z], [m]
    pub(crate) fn from_slice(dims: Dimensions, values: &[f64]) -> Self {
        match dims {
            Dimensions::Xy => Coordinate::xy(values[0], values[1]),
            Dimensions::Xyz => Coordinate::xyz(values[0], values[1], values[2]),
            Dimensions::Xym => Coordinate::xym(values[0], values[1], values[2]),
            Dimensions::Xyzm => Coordinate::xyzm(values[0], values[1], values[2], values[3]),
        }
    }

    pub(crate) fn write_to(&self, out: &mut [f64]) {
        match *self {
            Coordinate::Xy { x, y } => out[..2].copy_from_slice(&[x, y]),
            Coordinate::Xyz { x, y, z } => out[..3].copy_from_slice(&[x, y, z]),
            Coordinate::Xym { x, y, m } => out[..3].copy_from_slice(&[x, y, m]),
            Coordinate::Xyzm { x, y, z, m } => out[..4].copy_from_slice(&[x, y, z, m]),
        }
    }

    pub(crate) fn extend_into(&self, out: &mut Vec<f64>) {
        match *self {
            Coordinate::Xy { x, y } => out.extend_from_slice(&[x, y]),
            Coordinate::Xyz { x, y, z } => out.extend_from_slice(&[x, y, z]),
            Coordinate::Xym { x, y, m } => out.extend_from_slice(&[x, y, m]),
            Coordinate::Xyzm { x, y, z, m } => out.extend_from_slice(&[x, y, z, m]),
        }
    }

    pub const fn dimensions(&self) -> Dimensions {
        match self {
            Coordinate::Xy { .. } => Dimensions::Xy,
            Coordinate::Xyz { .. } => Dimensions::Xyz,
            Coordinate::Xym { .. } => Dimensions::Xym,
            Coordinate::Xyzm { .. } => Dimensions::Xyzm,
        }
    }

    pub const fn x(&self) -> f64 {
        match *self {
            Coordinate::Xy { x, .. } | Coordinate::Xyz { x, .. } | Coordinate::Xym { x, .. } | Coordinate::Xyzm { x, .. } => x,
        }
    }

    pub const fn y(&self) -> f64 {
        match *self {
            Coordinate::Xy { y, .. } | Coordinate::Xyz { y, .. } | Coordinate::Xym { y, .. } | Coordinate::Xyzm { y, .. } => y,
        }
    }

    pub const fn z(&self) -> Option<f64> {
        match *self {
            Coordinate::Xyz { z, .. } | Coordinate::Xyzm { z, .. } => Some(z),
            Coordinate::Xy { .. } | Coordinate::Xym { .. } => None,
        }
    }

    pub const fn m(&self) -> Option<f64> {
        match *self {
            Coordinate::Xym { m, .. } | Coordinate::Xyzm { m, .. } => Some(m),
            Coordinate::Xy { .. } | Coordinate::Xyz { .. } => None,
        }
    }

    pub const fn ordinate(&self, ordinate: Ordinate) -> Option<f64> {
        match ordinate {
            Ordinate::Z => self.z(),
            Ordinate::M => self.m(),
        }
    }

    /// Returns a copy with the ordinate replaced, coordinates lacking the ordinate are returned unchanged
    pub fn with_ordinate(self, ordinate: Ordinate, value: f64) -> Self {
        match (self, ordinate) {
            (Coordinate::Xyz { x, y, .. }, Ordinate::Z) => Coordinate::xyz(x, y, value),
            (Coordinate::Xyzm { x, y, m, .. }, Ordinate::Z) => Coordinate::xyzm(x, y, value, m),
            (Coordinate::Xym { x, y, .. }, Ordinate::M) => Coordinate::xym(x, y, value),
            (Coordinate::Xyzm { x, y, z, .. }, Ordinate::M) => Coordinate::xyzm(x, y, z, value),
            (coord, _) => coord,
        }
    }

    /// Converts to another dimensionality, ordinates that did not exist before are set to `fill`
    pub fn to_dimensions(self, dims: Dimensions, fill: f64) -> Self {
        let (x, y) = (self.x(), self.y());
        let z = self.z().unwrap_or(fill);
        let m = self.m().unwrap_or(fill);
        match dims {
            Dimensions::Xy => Coordinate::xy(x, y),
            Dimensions::Xyz => Coordinate::xyz(x, y, z),
            Dimensions::Xym => Coordinate::xym(x, y, m),
            Dimensions::Xyzm => Coordinate::xyzm(x, y, z, m),
        }
    }

    /// Planar distance, ignoring z and m
    pub fn distance_2d(&self, other: &Coordinate) -> f64 {
        (other.x() - self.x()).hypot(other.y() - self.y())
    }

    /// Exact comparison of the planar position
    pub fn same_position(&self, other: &Coordinate) -> bool {
        self.x() == other.x() && self.y() == other.y()
    }
}

impl approx::AbsDiffEq for Coordinate {
    type Epsilon = f64;

    fn default_epsilon() -> Self::Epsilon {
        f64::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: Self::Epsilon) -> bool {
        fn opt_eq(a: Option<f64>, b: Option<f64>, epsilon: f64) -> bool {
            match (a, b) {
                (Some(a), Some(b)) => a.abs_diff_eq(&b, epsilon),
                (None, None) => true,
                _ => false,
            }
        }

        self.dimensions() == other.dimensions()
            && self.x().abs_diff_eq(&other.x(), epsilon)
            && self.y().abs_diff_eq(&other.y(), epsilon)
            && opt_eq(self.z(), other.z(), epsilon)
            && opt_eq(self.m(), other.m(), epsilon)
    }
}
