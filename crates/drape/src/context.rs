use geo::{Dimensions, Ordinate};

use crate::{Coverage, DistancePrimitive, GeometryColumn, SimplifyParams};

/// Resolved, validated state shared by all the stages of a draping run
pub struct DrapeContext<'a> {
    pub table: String,
    pub source: GeometryColumn,
    pub target: GeometryColumn,
    /// The ordinate that receives the sampled values
    pub ordinate: Ordinate,
    pub no_data: f64,
    pub densify_dist: f64,
    pub simplify_dist: f64,
    /// Coverages in draping order
    pub coverages: Vec<Coverage>,
    pub distance: &'a dyn DistancePrimitive,
}

impl DrapeContext<'_> {
    pub fn is_no_data(&self, value: f64) -> bool {
        value == self.no_data || (value.is_nan() && self.no_data.is_nan())
    }

    pub fn target_dims(&self) -> Dimensions {
        self.target.dims
    }

    pub fn simplify_params(&self) -> SimplifyParams<'_> {
        SimplifyParams {
            ordinate: self.ordinate,
            no_data: self.no_data,
            tolerance: self.simplify_dist,
            distance: self.distance,
        }
    }
}
