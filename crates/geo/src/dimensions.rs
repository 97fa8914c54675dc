/// The coordinate dimensionality of a geometry, uniform across the whole geometry tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Dimensions {
    #[default]
    Xy,
    Xyz,
    Xym,
    Xyzm,
}

/// The optional ordinates a vertex can carry on top of x and y
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Ordinate {
    Z,
    M,
}

impl Dimensions {
    pub const fn from_flags(has_z: bool, has_m: bool) -> Self {
        match (has_z, has_m) {
            (false, false) => Dimensions::Xy,
            (true, false) => Dimensions::Xyz,
            (false, true) => Dimensions::Xym,
            (true, true) => Dimensions::Xyzm,
        }
    }

    pub const fn has_z(self) -> bool {
        matches!(self, Dimensions::Xyz | Dimensions::Xyzm)
    }

    pub const fn has_m(self) -> bool {
        matches!(self, Dimensions::Xym | Dimensions::Xyzm)
    }

    pub const fn has(self, ordinate: Ordinate) -> bool {
        match ordinate {
            Ordinate::Z => self.has_z(),
            Ordinate::M => self.has_m(),
        }
    }

    /// Number of f64 values stored per vertex
    pub const fn stride(self) -> usize {
        match self {
            Dimensions::Xy => 2,
            Dimensions::Xyz | Dimensions::Xym => 3,
            Dimensions::Xyzm => 4,
        }
    }

    /// The dimensionality obtained by adding the ordinate (no-op when already present)
    pub const fn with(self, ordinate: Ordinate) -> Self {
        match ordinate {
            Ordinate::Z => Dimensions::from_flags(true, self.has_m()),
            Ordinate::M => Dimensions::from_flags(self.has_z(), true),
        }
    }

    pub const fn to_str(self) -> &'static str {
        match self {
            Dimensions::Xy => "XY",
            Dimensions::Xyz => "XYZ",
            Dimensions::Xym => "XYM",
            Dimensions::Xyzm => "XYZM",
        }
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.to_str())
    }
}
