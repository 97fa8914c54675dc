//! Axis aligned bounding boxes used for geometry extents and tile footprints.

use approx::{AbsDiffEq, RelativeEq};

use crate::Coordinate;

pub type Point = geo_types::Point<f64>;

/// Rectangle stored as its north west and south east corner
/// All the spatial predicates are inclusive: touching rectangles intersect
/// and degenerate (zero width or height) rectangles are valid extents.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rect {
    top_left: Point,
    bottom_right: Point,
}

impl Rect {
    pub fn from_points(p1: Point, p2: Point) -> Self {
        let top_left = Point::new(p1.x().min(p2.x()), p1.y().max(p2.y()));
        let bottom_right = Point::new(p1.x().max(p2.x()), p1.y().min(p2.y()));

        Rect { top_left, bottom_right }
    }

    pub fn from_nw_se(nw: Point, se: Point) -> Self {
        Rect {
            top_left: nw,
            bottom_right: se,
        }
    }

    pub fn from_bounds(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Rect::from_points(Point::new(min_x, min_y), Point::new(max_x, max_y))
    }

    /// The smallest rectangle containing all the coordinates, `None` for an empty input
    pub fn bounding(coords: impl IntoIterator<Item = Coordinate>) -> Option<Rect> {
        let mut result: Option<Rect> = None;
        for coord in coords {
            if let Some(rect) = result.as_mut() {
                rect.expand_to(coord.x(), coord.y());
            } else {
                result = Some(Rect::from_bounds(coord.x(), coord.y(), coord.x(), coord.y()));
            }
        }
        result
    }

    pub fn min_x(&self) -> f64 {
        self.top_left.x()
    }

    pub fn max_x(&self) -> f64 {
        self.bottom_right.x()
    }

    pub fn min_y(&self) -> f64 {
        self.bottom_right.y()
    }

    pub fn max_y(&self) -> f64 {
        self.top_left.y()
    }

    pub fn width(&self) -> f64 {
        self.max_x() - self.min_x()
    }

    pub fn height(&self) -> f64 {
        self.max_y() - self.min_y()
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0.0 || self.height() == 0.0
    }

    pub fn top_left(&self) -> Point {
        self.top_left
    }

    pub fn bottom_right(&self) -> Point {
        self.bottom_right
    }

    pub fn expand_to(&mut self, x: f64, y: f64) {
        self.top_left = Point::new(self.min_x().min(x), self.max_y().max(y));
        self.bottom_right = Point::new(self.max_x().max(x), self.min_y().min(y));
    }

    pub fn union(&self, other: &Rect) -> Rect {
        let mut result = *self;
        result.expand_to(other.min_x(), other.min_y());
        result.expand_to(other.max_x(), other.max_y());
        result
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.min_x() <= other.max_x()
            && self.max_x() >= other.min_x()
            && self.min_y() <= other.max_y()
            && self.max_y() >= other.min_y()
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x() && x <= self.max_x() && y >= self.min_y() && y <= self.max_y()
    }
}

impl AbsDiffEq for Rect {
    type Epsilon = f64;

    fn default_epsilon() -> Self::Epsilon {
        f64::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: Self::Epsilon) -> bool {
        self.top_left.abs_diff_eq(&other.top_left, epsilon) && self.bottom_right.abs_diff_eq(&other.bottom_right, epsilon)
    }
}

impl RelativeEq for Rect {
    fn default_max_relative() -> Self::Epsilon {
        f64::default_max_relative()
    }

    fn relative_eq(&self, other: &Self, epsilon: Self::Epsilon, max_relative: Self::Epsilon) -> bool {
        self.top_left.relative_eq(&other.top_left, epsilon, max_relative)
            && self.bottom_right.relative_eq(&other.bottom_right, epsilon, max_relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corners_are_normalized() {
        let r = Rect::from_points(Point::new(10.0, 0.0), Point::new(0.0, 10.0));
        assert_eq!(r.top_left(), Point::new(0.0, 10.0));
        assert_eq!(r.bottom_right(), Point::new(10.0, 0.0));
        assert_eq!(r.width(), 10.0);
        assert_eq!(r.height(), 10.0);
    }

    #[test]
    fn adjacent_rectangles_intersect() {
        let r1 = Rect::from_bounds(0.0, 0.0, 10.0, 10.0);
        let r2 = Rect::from_bounds(10.0, 0.0, 20.0, 10.0);
        assert!(r1.intersects(&r2));

        let r3 = Rect::from_bounds(10.5, 0.0, 20.0, 10.0);
        assert!(!r1.intersects(&r3));
    }

    #[test]
    fn degenerate_rectangle_intersection() {
        // bbox of a horizontal line
        let line = Rect::from_bounds(0.0, 0.0, 100.0, 0.0);
        assert!(line.is_empty());

        let tile = Rect::from_bounds(0.0, 0.0, 100.0, 100.0);
        assert!(line.intersects(&tile));
        assert!(tile.intersects(&line));

        let other_tile = Rect::from_bounds(0.0, 0.5, 100.0, 100.0);
        assert!(!line.intersects(&other_tile));
    }

    #[test]
    fn contains_is_inclusive() {
        let r = Rect::from_bounds(0.0, 0.0, 100.0, 100.0);
        assert!(r.contains(0.0, 0.0));
        assert!(r.contains(100.0, 100.0));
        assert!(r.contains(50.0, 25.0));
        assert!(!r.contains(100.1, 50.0));
        assert!(!r.contains(50.0, -0.1));
    }

    #[test]
    fn bounding_rect() {
        let coords = [Coordinate::xy(3.0, -1.0), Coordinate::xyz(-2.0, 4.0, 9.0), Coordinate::xy(1.0, 1.0)];
        let bbox = Rect::bounding(coords).unwrap();
        approx::assert_relative_eq!(bbox, Rect::from_bounds(-2.0, -1.0, 3.0, 4.0));
        assert!(Rect::bounding(std::iter::empty()).is_none());
    }

    #[test]
    fn union() {
        let r1 = Rect::from_bounds(0.0, 0.0, 1.0, 1.0);
        let r2 = Rect::from_bounds(5.0, -3.0, 6.0, 0.5);
        assert_eq!(r1.union(&r2), Rect::from_bounds(0.0, -3.0, 6.0, 1.0));
    }
}
