/// A vertex of an elevation profile: distance along the line versus the draped ordinate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfileCoord {
    pub distance: f64,
    pub value: f64,
}

impl ProfileCoord {
    pub const fn new(distance: f64, value: f64) -> Self {
        ProfileCoord { distance, value }
    }
}

/// Distance measure used by the profile simplification
pub trait DistancePrimitive {
    fn distance(&self, segment: &[ProfileCoord; 2], point: ProfileCoord) -> f64;
}

/// Euclidean distance from the point to the closest point of the segment
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanarDistance;

impl DistancePrimitive for PlanarDistance {
    fn distance(&self, segment: &[ProfileCoord; 2], point: ProfileCoord) -> f64 {
        let [start, end] = segment;
        let dx = end.distance - start.distance;
        let dy = end.value - start.value;
        let len_sq = dx * dx + dy * dy;

        if len_sq == 0.0 {
            return (point.distance - start.distance).hypot(point.value - start.value);
        }

        let t = (((point.distance - start.distance) * dx + (point.value - start.value) * dy) / len_sq).clamp(0.0, 1.0);
        let (px, py) = (start.distance + t * dx, start.value + t * dy);
        (point.distance - px).hypot(point.value - py)
    }
}
