use geo::{Coordinate, Geometry, LineString, Ordinate, PointList};

/// Inserts evenly spaced vertices in every segment that is longer than `densify_dist`
/// The inserted vertices get the `no_data` value for the `target` ordinate, the other ordinates are interpolated.
/// The original vertices are copied unchanged. A `densify_dist` <= 0 returns a copy of the input.
pub fn densify_linestring(line: &LineString, densify_dist: f64, target: Ordinate, no_data: f64) -> LineString {
    if densify_dist <= 0.0 || line.len() < 2 {
        return line.clone();
    }

    let mut points = PointList::with_capacity(line.dims(), line.len());
    let mut vertices = line.coordinates();
    let Some(mut prev) = vertices.next() else {
        return line.clone();
    };

    points.push(prev);
    for current in vertices {
        let length = prev.distance_2d(&current);
        if length > densify_dist {
            let segments = (length / densify_dist).ceil() as usize;
            for i in 1..segments {
                let t = i as f64 / segments as f64;
                points.push(interpolate(prev, current, t).with_ordinate(target, no_data));
            }
        }

        points.push(current);
        prev = current;
    }

    points.into_linestring()
}

/// Densifies every linestring and polygon ring of the geometry, points are kept as is
pub fn densify_geometry(geom: &Geometry, densify_dist: f64, target: Ordinate, no_data: f64) -> Geometry {
    if densify_dist <= 0.0 {
        return geom.clone();
    }

    geom.map_sequences(|line| densify_linestring(line, densify_dist, target, no_data))
}

fn lerp(start: f64, end: f64, t: f64) -> f64 {
    start + (end - start) * t
}

fn interpolate(start: Coordinate, end: Coordinate, t: f64) -> Coordinate {
    match (start, end) {
        (Coordinate::Xy { x: x1, y: y1 }, Coordinate::Xy { x: x2, y: y2 }) => Coordinate::xy(lerp(x1, x2, t), lerp(y1, y2, t)),
        (Coordinate::Xyz { x: x1, y: y1, z: z1 }, Coordinate::Xyz { x: x2, y: y2, z: z2 }) => {
            Coordinate::xyz(lerp(x1, x2, t), lerp(y1, y2, t), lerp(z1, z2, t))
        }
        (Coordinate::Xym { x: x1, y: y1, m: m1 }, Coordinate::Xym { x: x2, y: y2, m: m2 }) => {
            Coordinate::xym(lerp(x1, x2, t), lerp(y1, y2, t), lerp(m1, m2, t))
        }
        (
            Coordinate::Xyzm {
                x: x1,
                y: y1,
                z: z1,
                m: m1,
            },
            Coordinate::Xyzm {
                x: x2,
                y: y2,
                z: z2,
                m: m2,
            },
        ) => Coordinate::xyzm(lerp(x1, x2, t), lerp(y1, y2, t), lerp(z1, z2, t), lerp(m1, m2, t)),
        (start, end) => interpolate(start, end.to_dimensions(start.dimensions(), 0.0), t),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::{Dimensions, GeometryType};

    const NODATA: f64 = -9999.0;

    #[test]
    fn inserted_vertex_count() {
        let line = LineString::from_coordinates(Dimensions::Xyz, [Coordinate::xyz(0.0, 0.0, NODATA), Coordinate::xyz(100.0, 0.0, NODATA)]);

        let dense = densify_linestring(&line, 10.0, Ordinate::Z, NODATA);
        assert_eq!(dense.len(), 11);
        for i in 0..dense.len() {
            assert_relative_eq!(dense.xy(i).0, i as f64 * 10.0, epsilon = 1e-9);
        }

        let dense = densify_linestring(&line, 30.0, Ordinate::Z, NODATA);
        assert_eq!(dense.len(), 5, "ceil(100 / 30) - 1 = 3 inserted vertices");
    }

    #[test]
    fn endpoints_are_bit_identical() {
        let start = Coordinate::xyzm(0.1, 0.2, 5.5, 1.0);
        let end = Coordinate::xyzm(33.3, -17.7, 8.25, 2.0);
        let line = LineString::from_coordinates(Dimensions::Xyzm, [start, end]);

        let dense = densify_linestring(&line, 1.0, Ordinate::Z, NODATA);
        assert_eq!(dense.first().unwrap(), start);
        assert_eq!(dense.last().unwrap(), end);
        assert_eq!(dense.len(), (start.distance_2d(&end) / 1.0).ceil() as usize + 1);
    }

    #[test]
    fn only_the_target_ordinate_is_nodata() {
        let line = LineString::from_coordinates(Dimensions::Xyzm, [Coordinate::xyzm(0.0, 0.0, 1.0, 10.0), Coordinate::xyzm(4.0, 0.0, 3.0, 20.0)]);

        let dense = densify_linestring(&line, 2.0, Ordinate::M, NODATA);
        assert_eq!(dense.len(), 3);
        assert_eq!(dense.get(1), Coordinate::xyzm(2.0, 0.0, 2.0, NODATA));

        let dense = densify_linestring(&line, 2.0, Ordinate::Z, NODATA);
        assert_eq!(dense.get(1), Coordinate::xyzm(2.0, 0.0, NODATA, 15.0));
    }

    #[test]
    fn short_segments_and_disabled() {
        let line = LineString::from_coordinates(Dimensions::Xym, [Coordinate::xym(0.0, 0.0, 1.0), Coordinate::xym(3.0, 4.0, 2.0)]);

        assert_eq!(densify_linestring(&line, 5.0, Ordinate::M, NODATA), line);
        assert_eq!(densify_linestring(&line, 0.0, Ordinate::M, NODATA), line);
        assert_eq!(densify_linestring(&line, -1.0, Ordinate::M, NODATA), line);
    }

    #[test]
    fn geometry_rings_are_densified_points_are_kept() {
        let mut geom = Geometry::new(4326, Dimensions::Xyz, GeometryType::GeometryCollection);
        geom.add_point(Coordinate::xyz(50.0, 50.0, 1.0)).unwrap();
        {
            let polygon = geom.add_polygon(5).unwrap();
            let ring = polygon.exterior_mut();
            for (i, (x, y)) in [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (0.0, 0.0)].into_iter().enumerate() {
                ring.set_xyz(i, x, y, 7.0);
            }
        }

        let dense = densify_geometry(&geom, 5.0, Ordinate::Z, NODATA);
        assert_eq!(dense.vertex_count(), 1 + 9);
        assert_eq!(dense.srid(), 4326);

        let mut first = None;
        dense.shape().for_each_coordinate(&mut |c| {
            first.get_or_insert(c);
        });
        assert_eq!(first, Some(Coordinate::xyz(50.0, 50.0, 1.0)));

        let ring = dense.shape().coordinate_sequences()[0].clone();
        assert!(ring.is_closed());
        assert_eq!(ring.get(1), Coordinate::xyz(5.0, 0.0, NODATA));
        assert_eq!(ring.get(2), Coordinate::xyz(10.0, 0.0, 7.0));
    }
}
