//! Douglas-Peucker simplification of draped geometries on their elevation profile.
//!
//! The profile of a line is the draped ordinate plotted against the cumulative planar distance
//! along the line. Vertices that exist in the undensified source geometry are never removed,
//! only the vertices that were introduced by densification are candidates for removal.

use geo::{Geometry, LineString, Ordinate, Polygon, Shape};

use crate::{DistancePrimitive, Error, ProfileCoord, Result};

/// Parameters of the profile simplification
#[derive(Clone, Copy)]
pub struct SimplifyParams<'a> {
    pub ordinate: Ordinate,
    pub no_data: f64,
    pub tolerance: f64,
    pub distance: &'a dyn DistancePrimitive,
}

impl SimplifyParams<'_> {
    fn is_no_data(&self, value: f64) -> bool {
        value == self.no_data || (value.is_nan() && self.no_data.is_nan())
    }
}

#[derive(Debug, Clone, Copy)]
struct ProfilePoint {
    x: f64,
    y: f64,
    coord: ProfileCoord,
    no_data: bool,
    confirmed: bool,
}

fn mismatch(detail: impl std::fmt::Display) -> Error {
    Error::Consistency(format!("mismatching geometry: {detail}"))
}

fn build_profile(draped: &LineString, params: &SimplifyParams) -> Vec<ProfilePoint> {
    let mut profile = Vec::with_capacity(draped.len());
    let mut distance = 0.0;

    for (i, coord) in draped.coordinates().enumerate() {
        if i > 0 {
            distance += draped.get(i - 1).distance_2d(&coord);
        }

        let value = coord.ordinate(params.ordinate).unwrap_or(params.no_data);
        profile.push(ProfilePoint {
            x: coord.x(),
            y: coord.y(),
            coord: ProfileCoord::new(distance, value),
            no_data: params.is_no_data(value),
            confirmed: false,
        });
    }

    profile
}

/// Marks the profile points that correspond with the pristine vertices, matching in order
fn confirm_pristine_vertices(pristine: &LineString, profile: &mut [ProfilePoint]) -> Result<()> {
    let mut index = 0;
    for (vertex_nr, vertex) in pristine.coordinates().enumerate() {
        let (x, y) = (vertex.x(), vertex.y());
        match profile[index..].iter().position(|p| p.x == x && p.y == y) {
            Some(offset) => {
                index += offset;
                profile[index].confirmed = true;
                index += 1;
            }
            None => {
                return Err(mismatch(format_args!(
                    "vertex {vertex_nr} ({x}, {y}) of the source geometry is not present in the draped geometry"
                )));
            }
        }
    }

    Ok(())
}

/// First and last index in `start..=end` of a point with a value
fn valid_bounds(profile: &[ProfilePoint], start: usize, end: usize) -> Option<(usize, usize)> {
    let first = (start..=end).find(|&i| !profile[i].no_data)?;
    let last = (first..=end).rev().find(|&i| !profile[i].no_data)?;
    Some((first, last))
}

/// Runs the Douglas-Peucker step between two confirmed points using an explicit worklist
fn simplify_interval(profile: &mut [ProfilePoint], first: usize, last: usize, params: &SimplifyParams) {
    let mut worklist = vec![(first, last)];

    while let Some((start, end)) = worklist.pop() {
        if end <= start + 1 {
            continue;
        }

        if profile[start].no_data || profile[end].no_data {
            // the chord runs between the outermost points of the interval that carry a value
            if let Some((first_valid, last_valid)) = valid_bounds(profile, start, end) {
                profile[first_valid].confirmed = true;
                profile[last_valid].confirmed = true;
                worklist.push((first_valid, last_valid));
            }
            continue;
        }

        let chord = [profile[start].coord, profile[end].coord];
        let farthest = profile[start + 1..end]
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.no_data)
            .map(|(i, p)| (start + 1 + i, params.distance.distance(&chord, p.coord)))
            .fold(None, |max: Option<(usize, f64)>, (i, d)| match max {
                Some((_, max_d)) if max_d >= d => max,
                _ => Some((i, d)),
            });

        if let Some((index, dist)) = farthest {
            if dist > params.tolerance {
                profile[index].confirmed = true;
                worklist.push((index, end));
                worklist.push((start, index));
            }
        }
    }
}

/// Simplifies the draped linestring, keeping every vertex of the pristine linestring
pub fn simplify_linestring(pristine: &LineString, draped: &LineString, params: &SimplifyParams) -> Result<LineString> {
    let mut profile = build_profile(draped, params);
    confirm_pristine_vertices(pristine, &mut profile)?;

    let confirmed: Vec<usize> = profile
        .iter()
        .enumerate()
        .filter_map(|(i, p)| p.confirmed.then_some(i))
        .collect();

    for pair in confirmed.windows(2) {
        simplify_interval(&mut profile, pair[0], pair[1], params);
    }

    Ok(LineString::from_coordinates(
        draped.dims(),
        profile
            .iter()
            .enumerate()
            .filter(|(_, p)| p.confirmed)
            .map(|(i, _)| draped.get(i)),
    ))
}

fn simplify_polygon(pristine: &Polygon, draped: &Polygon, params: &SimplifyParams) -> Result<Polygon> {
    if pristine.ring_count() != draped.ring_count() {
        return Err(mismatch(format_args!(
            "polygon ring count differs ({} <> {})",
            pristine.ring_count(),
            draped.ring_count()
        )));
    }

    let exterior = simplify_linestring(pristine.exterior(), draped.exterior(), params)?;
    let interiors = pristine
        .interiors()
        .iter()
        .zip(draped.interiors())
        .map(|(p, d)| simplify_linestring(p, d, params))
        .collect::<Result<Vec<_>>>()?;

    Ok(Polygon::with_interiors(exterior, interiors))
}

fn check_count(what: &str, pristine: usize, draped: usize) -> Result<()> {
    if pristine != draped {
        return Err(mismatch(format_args!("{what} count differs ({pristine} <> {draped})")));
    }

    Ok(())
}

fn simplify_shape(pristine: &Shape, draped: &Shape, params: &SimplifyParams) -> Result<Shape> {
    Ok(match (pristine, draped) {
        (Shape::Point(p), Shape::Point(d)) => {
            check_count("point", p.iter().count(), d.iter().count())?;
            draped.clone()
        }
        (Shape::MultiPoint(p), Shape::MultiPoint(d)) => {
            check_count("point", p.len(), d.len())?;
            draped.clone()
        }
        (Shape::LineString(p), Shape::LineString(d)) => Shape::LineString(simplify_linestring(p, d, params)?),
        (Shape::MultiLineString(p), Shape::MultiLineString(d)) => {
            check_count("linestring", p.len(), d.len())?;
            Shape::MultiLineString(
                p.iter()
                    .zip(d)
                    .map(|(p, d)| simplify_linestring(p, d, params))
                    .collect::<Result<_>>()?,
            )
        }
        (Shape::Polygon(p), Shape::Polygon(d)) => Shape::Polygon(simplify_polygon(p, d, params)?),
        (Shape::MultiPolygon(p), Shape::MultiPolygon(d)) => {
            check_count("polygon", p.len(), d.len())?;
            Shape::MultiPolygon(p.iter().zip(d).map(|(p, d)| simplify_polygon(p, d, params)).collect::<Result<_>>()?)
        }
        (Shape::GeometryCollection(p), Shape::GeometryCollection(d)) => {
            check_count("geometry", p.len(), d.len())?;
            Shape::GeometryCollection(p.iter().zip(d).map(|(p, d)| simplify_shape(p, d, params)).collect::<Result<_>>()?)
        }
        (p, d) => {
            return Err(mismatch(format_args!(
                "geometry type differs ({} <> {})",
                p.geometry_type(),
                d.geometry_type()
            )));
        }
    })
}

/// Simplifies every linestring and ring of the draped geometry on its elevation profile
/// `pristine` is the geometry before densification, all its vertices are kept.
pub fn simplify_geometry(pristine: &Geometry, draped: &Geometry, params: &SimplifyParams) -> Result<Geometry> {
    let shape = simplify_shape(pristine.shape(), draped.shape(), params)?;
    Geometry::from_shape(draped.srid(), draped.dims(), shape)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PlanarDistance;
    use crate::densify::densify_linestring;
    use geo::{Coordinate, Dimensions, GeometryType};

    const NODATA: f64 = -9999.0;

    fn params(tolerance: f64) -> SimplifyParams<'static> {
        SimplifyParams {
            ordinate: Ordinate::Z,
            no_data: NODATA,
            tolerance,
            distance: &PlanarDistance,
        }
    }

    fn xyz_line(coords: &[(f64, f64, f64)]) -> LineString {
        LineString::from_coordinates(Dimensions::Xyz, coords.iter().map(|&(x, y, z)| Coordinate::xyz(x, y, z)))
    }

    /// Densifies the pristine line and drapes it on the height function
    fn draped(pristine: &LineString, densify: f64, height: impl Fn(f64, f64) -> f64) -> LineString {
        let mut dense = densify_linestring(pristine, densify, Ordinate::Z, NODATA);
        for i in 0..dense.len() {
            let (x, y) = dense.xy(i);
            dense.set_ordinate(i, Ordinate::Z, height(x, y));
        }
        dense
    }

    #[test]
    fn flat_profile_reduces_to_pristine_vertices() {
        let pristine = xyz_line(&[(0.0, 0.0, NODATA), (100.0, 0.0, NODATA)]);
        let dense = draped(&pristine, 10.0, |_, _| 42.0);
        assert_eq!(dense.len(), 11);

        let simplified = simplify_linestring(&pristine, &dense, &params(0.01)).unwrap();
        assert_eq!(simplified, xyz_line(&[(0.0, 0.0, 42.0), (100.0, 0.0, 42.0)]));
    }

    #[test]
    fn peaks_are_kept() {
        let pristine = xyz_line(&[(0.0, 0.0, NODATA), (100.0, 0.0, NODATA)]);
        let dense = draped(&pristine, 10.0, |x, _| if x == 50.0 { 20.0 } else { 0.0 });

        let simplified = simplify_linestring(&pristine, &dense, &params(1.0)).unwrap();
        let xs: Vec<f64> = simplified.coordinates().map(|c| c.x()).collect();
        assert_eq!(xs, vec![0.0, 40.0, 50.0, 60.0, 100.0]);
    }

    #[test]
    fn pristine_vertices_survive_in_order_and_removed_vertices_are_within_tolerance() {
        let pristine = xyz_line(&[(0.0, 0.0, NODATA), (37.0, 12.0, NODATA), (80.0, -5.0, NODATA), (120.0, 30.0, NODATA)]);
        let dense = draped(&pristine, 1.5, |x, y| (x / 7.0).sin() * 3.0 + y * 0.1);
        let tolerance = 0.5;

        let simplified = simplify_linestring(&pristine, &dense, &params(tolerance)).unwrap();
        assert!(simplified.len() < dense.len());

        let mut pristine_iter = pristine.coordinates().peekable();
        for c in simplified.coordinates() {
            if pristine_iter.peek().is_some_and(|p| p.same_position(&c)) {
                pristine_iter.next();
            }
        }
        assert!(pristine_iter.next().is_none(), "every pristine vertex must survive");

        // every removed vertex lies within the tolerance of the chord between its kept neighbours
        let dense_profile = build_profile(&dense, &params(tolerance));
        let kept: Vec<usize> = simplified
            .coordinates()
            .map(|c| dense_profile.iter().position(|p| p.x == c.x() && p.y == c.y()).unwrap())
            .collect();
        for pair in kept.windows(2) {
            let chord = [dense_profile[pair[0]].coord, dense_profile[pair[1]].coord];
            for removed in &dense_profile[pair[0] + 1..pair[1]] {
                assert!(PlanarDistance.distance(&chord, removed.coord) <= tolerance);
            }
        }
    }

    #[test]
    fn unmatched_pristine_vertex_is_an_error() {
        let pristine = xyz_line(&[(0.0, 0.0, 0.0), (5.0, 5.0, 0.0)]);
        let other = xyz_line(&[(0.0, 0.0, 0.0), (5.0, 6.0, 0.0)]);

        let err = simplify_linestring(&pristine, &other, &params(1.0)).unwrap_err();
        assert!(matches!(err, Error::Consistency(_)));
        assert!(err.to_string().contains("mismatching geometry"));
    }

    #[test]
    fn nodata_vertices() {
        let pristine = xyz_line(&[(0.0, 0.0, NODATA), (10.0, 0.0, NODATA)]);
        // first vertex outside the raster, interior partially draped
        let dense = xyz_line(&[(0.0, 0.0, NODATA), (2.0, 0.0, 5.0), (4.0, 0.0, NODATA), (6.0, 0.0, 5.0), (10.0, 0.0, 5.0)]);

        let simplified = simplify_linestring(&pristine, &dense, &params(1.0)).unwrap();
        assert_eq!(simplified, xyz_line(&[(0.0, 0.0, NODATA), (2.0, 0.0, 5.0), (10.0, 0.0, 5.0)]));
    }

    #[test]
    fn line_starting_outside_the_raster() {
        let pristine = xyz_line(&[(0.0, 0.0, NODATA), (100.0, 0.0, NODATA)]);
        let dense = draped(&pristine, 10.0, |x, _| if x == 0.0 { NODATA } else { 42.0 });
        assert_eq!(dense.len(), 11);

        let simplified = simplify_linestring(&pristine, &dense, &params(0.01)).unwrap();
        assert_eq!(simplified, xyz_line(&[(0.0, 0.0, NODATA), (10.0, 0.0, 42.0), (100.0, 0.0, 42.0)]));

        let peak = draped(&pristine, 10.0, |x, _| {
            if x == 0.0 || x == 100.0 {
                NODATA
            } else if x == 50.0 {
                60.0
            } else {
                42.0
            }
        });
        let simplified = simplify_linestring(&pristine, &peak, &params(1.0)).unwrap();
        let xs: Vec<f64> = simplified.coordinates().map(|c| c.x()).collect();
        assert_eq!(xs, vec![0.0, 10.0, 40.0, 50.0, 60.0, 90.0, 100.0]);
    }

    #[test]
    fn interval_without_values() {
        let pristine = xyz_line(&[(0.0, 0.0, NODATA), (30.0, 0.0, NODATA)]);
        let dense = draped(&pristine, 10.0, |_, _| NODATA);

        let simplified = simplify_linestring(&pristine, &dense, &params(0.01)).unwrap();
        assert_eq!(simplified, pristine);
    }

    #[test]
    fn structure_mismatches() {
        let mut line = Geometry::new(0, Dimensions::Xyz, GeometryType::LineString);
        line.add_linestring(2).unwrap().set_xyz(1, 1.0, 1.0, 0.0);

        let mut point = Geometry::new(0, Dimensions::Xyz, GeometryType::Point);
        point.add_point(Coordinate::xyz(0.0, 0.0, 0.0)).unwrap();
        assert!(matches!(simplify_geometry(&line, &point, &params(1.0)), Err(Error::Consistency(_))));

        let mut multi = Geometry::new(0, Dimensions::Xyz, GeometryType::MultiLineString);
        multi.add_linestring(2).unwrap();
        let mut multi2 = multi.clone();
        multi2.add_linestring(2).unwrap();
        assert!(matches!(simplify_geometry(&multi, &multi2, &params(1.0)), Err(Error::Consistency(_))));

        let mut polygon = Geometry::new(0, Dimensions::Xyz, GeometryType::Polygon);
        polygon.add_polygon(4).unwrap();
        let mut polygon2 = polygon.clone();
        if let Shape::Polygon(p) = polygon2.shape_mut() {
            p.add_interior(4);
        }
        assert!(matches!(simplify_geometry(&polygon, &polygon2, &params(1.0)), Err(Error::Consistency(_))));
    }

    #[test]
    fn closed_ring_keeps_closure() {
        let pristine = xyz_line(&[(0.0, 0.0, NODATA), (10.0, 0.0, NODATA), (10.0, 10.0, NODATA), (0.0, 0.0, NODATA)]);
        let dense = draped(&pristine, 1.0, |_, _| 3.0);

        let mut geom = Geometry::new(31370, Dimensions::Xyz, GeometryType::Polygon);
        *geom.add_polygon(0).unwrap().exterior_mut() = pristine.clone();
        let mut draped_geom = Geometry::new(31370, Dimensions::Xyz, GeometryType::Polygon);
        *draped_geom.add_polygon(0).unwrap().exterior_mut() = dense;

        let simplified = simplify_geometry(&geom, &draped_geom, &params(0.1)).unwrap();
        let ring = simplified.shape().coordinate_sequences()[0].clone();
        assert_eq!(ring.len(), 4);
        assert!(ring.is_closed());
        assert_eq!(simplified.srid(), 31370);
    }
}
