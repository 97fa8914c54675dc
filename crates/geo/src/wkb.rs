//! Extended WKB geometry codec on top of the geozero wkb reader and writer
//!
//! Geometries are written as little endian extended WKB: the type code carries the
//! z (`0x80000000`), m (`0x40000000`) and srid (`0x20000000`) flags and the srid follows
//! the type code of the outer geometry. Reading also accepts big endian input and the
//! ISO type codes (1000 / 2000 / 3000 offsets for z / m / zm).

use geozero::error::GeozeroError;
use geozero::wkb::{process_ewkb_geom, process_wkb_geom};
use geozero::{CoordDimensions, GeomProcessor, GeozeroGeometry, ToWkb};

use crate::{Coordinate, Dimensions, Error, Geometry, GeometryType, LineString, PointList, Polygon, Result, Shape};

const WKB_Z: u32 = 0x8000_0000;
const WKB_M: u32 = 0x4000_0000;
const WKB_SRID: u32 = 0x2000_0000;
const WKB_TYPE_MASK: u32 = 0x0FFF_FFFF;

/// Collections nested deeper than this are rejected as malformed
const MAX_NESTING: usize = 32;

type GeozeroResult<T = ()> = geozero::error::Result<T>;

pub fn encode(geom: &Geometry) -> Result<Vec<u8>> {
    geom.to_ewkb(coord_dimensions(geom.dims()), Some(geom.srid()))
        .map_err(|err| Error::Runtime(format!("Failed to encode geometry: {err}")))
}

pub fn decode(data: &[u8]) -> Result<Geometry> {
    let header = read_header(data)?;

    let mut builder = ShapeBuilder::new(header.dims, data.len());
    let mut reader = data;
    let processed = if header.iso {
        process_wkb_geom(&mut reader, &mut builder)
    } else {
        process_ewkb_geom(&mut reader, &mut builder)
    };
    processed.map_err(|err| Error::Decode(format!("Invalid geometry blob: {err}")))?;

    if !reader.is_empty() {
        return Err(Error::Decode(format!(
            "Trailing data after geometry: {} unused bytes",
            reader.len()
        )));
    }

    let shape = builder.finish()?;
    Geometry::from_shape(header.srid.unwrap_or(0), header.dims, shape)
        .map_err(|err| Error::Decode(format!("Inconsistent geometry: {err}")))
}

fn coord_dimensions(dims: Dimensions) -> CoordDimensions {
    CoordDimensions {
        z: dims.has_z(),
        m: dims.has_m(),
        t: false,
        tm: false,
    }
}

/// The outer geometry header: dimensions and srid of the whole tree and the type code flavour
struct Header {
    dims: Dimensions,
    srid: Option<i32>,
    iso: bool,
}

fn truncated() -> Error {
    Error::Decode("Unexpected end of geometry blob in the header".into())
}

fn read_header(data: &[u8]) -> Result<Header> {
    let Some((&byte_order, rest)) = data.split_first() else {
        return Err(Error::Decode("Empty geometry blob".into()));
    };

    let read_u32 = |bytes: Option<&[u8]>| -> Result<u32> {
        let bytes: [u8; 4] = bytes
            .and_then(|b| b.get(..4))
            .and_then(|b| b.try_into().ok())
            .ok_or_else(truncated)?;
        Ok(match byte_order {
            1 => u32::from_le_bytes(bytes),
            _ => u32::from_be_bytes(bytes),
        })
    };

    if byte_order > 1 {
        return Err(Error::Decode(format!("Invalid byte order marker: {byte_order}")));
    }

    let code = read_u32(Some(rest))?;
    let base = code & WKB_TYPE_MASK;
    let (has_z, has_m, iso) = match base / 1000 {
        0 => (code & WKB_Z != 0, code & WKB_M != 0, false),
        1 => (true, false, true),
        2 => (false, true, true),
        3 => (true, true, true),
        _ => return Err(Error::Decode(format!("Invalid geometry type code: {code:#x}"))),
    };

    if (iso && base != code) || !matches!(GeometryType::from_code(base % 1000), Some(t) if t != GeometryType::Geometry) {
        return Err(Error::Decode(format!("Invalid geometry type code: {code:#x}")));
    }

    let srid = if !iso && code & WKB_SRID != 0 {
        Some(read_u32(rest.get(4..))? as i32)
    } else {
        None
    };

    Ok(Header {
        dims: Dimensions::from_flags(has_z, has_m),
        srid,
        iso,
    })
}

impl GeozeroGeometry for Geometry {
    fn process_geom<P: GeomProcessor>(&self, processor: &mut P) -> GeozeroResult {
        process_shape(self.shape(), self.dims(), true, 0, processor)
    }
}

fn process_coordinate<P: GeomProcessor>(coord: Coordinate, idx: usize, processor: &mut P) -> GeozeroResult {
    if processor.multi_dim() {
        processor.coordinate(coord.x(), coord.y(), coord.z(), coord.m(), None, None, idx)
    } else {
        processor.xy(coord.x(), coord.y(), idx)
    }
}

fn process_sequence<P: GeomProcessor>(line: &LineString, tagged: bool, idx: usize, processor: &mut P) -> GeozeroResult {
    processor.linestring_begin(tagged, line.len(), idx)?;
    for (i, coord) in line.coordinates().enumerate() {
        process_coordinate(coord, i, processor)?;
    }
    processor.linestring_end(tagged, idx)
}

fn process_polygon<P: GeomProcessor>(polygon: &Polygon, tagged: bool, idx: usize, processor: &mut P) -> GeozeroResult {
    let empty = polygon.exterior().is_empty() && polygon.interiors().is_empty();
    processor.polygon_begin(tagged, if empty { 0 } else { polygon.ring_count() }, idx)?;
    if !empty {
        for (i, ring) in polygon.rings().enumerate() {
            process_sequence(ring, false, i, processor)?;
        }
    }
    processor.polygon_end(tagged, idx)
}

fn process_shape<P: GeomProcessor>(shape: &Shape, dims: Dimensions, tagged: bool, idx: usize, processor: &mut P) -> GeozeroResult {
    match shape {
        Shape::Point(point) => {
            // the empty point is written as a point with nan ordinates
            let coord = point.unwrap_or_else(|| Coordinate::xy(f64::NAN, f64::NAN).to_dimensions(dims, f64::NAN));
            processor.point_begin(idx)?;
            process_coordinate(coord, 0, processor)?;
            processor.point_end(idx)
        }
        Shape::MultiPoint(points) => {
            processor.multipoint_begin(points.len(), idx)?;
            for (i, coord) in points.iter().enumerate() {
                process_coordinate(*coord, i, processor)?;
            }
            processor.multipoint_end(idx)
        }
        Shape::LineString(line) => process_sequence(line, tagged, idx, processor),
        Shape::MultiLineString(lines) => {
            processor.multilinestring_begin(lines.len(), idx)?;
            for (i, line) in lines.iter().enumerate() {
                process_sequence(line, false, i, processor)?;
            }
            processor.multilinestring_end(idx)
        }
        Shape::Polygon(polygon) => process_polygon(polygon, tagged, idx, processor),
        Shape::MultiPolygon(polygons) => {
            processor.multipolygon_begin(polygons.len(), idx)?;
            for (i, polygon) in polygons.iter().enumerate() {
                process_polygon(polygon, false, i, processor)?;
            }
            processor.multipolygon_end(idx)
        }
        Shape::GeometryCollection(shapes) => {
            processor.geometrycollection_begin(shapes.len(), idx)?;
            for (i, shape) in shapes.iter().enumerate() {
                process_shape(shape, dims, true, i, processor)?;
            }
            processor.geometrycollection_end(idx)
        }
    }
}

/// A geometry under construction, the declared member count is kept to detect skipped members
enum Part {
    Point(Option<Coordinate>),
    MultiPoint(Vec<Coordinate>, usize),
    LineString(PointList),
    MultiLineString(Vec<LineString>, usize),
    Polygon(Vec<LineString>, usize),
    MultiPolygon(Vec<Polygon>, usize),
    Collection(Vec<Shape>, usize),
}

fn invalid(msg: impl Into<String>) -> GeozeroError {
    GeozeroError::Geometry(msg.into())
}

fn point_shape(coord: Option<Coordinate>) -> Shape {
    Shape::Point(coord.filter(|c| !(c.x().is_nan() && c.y().is_nan())))
}

fn check_member_count(what: &str, found: usize, declared: usize) -> GeozeroResult {
    if found != declared {
        return Err(invalid(format!("{what} declares {declared} members but contains {found} supported members")));
    }
    Ok(())
}

/// Builds the `Shape` tree from the reader events
struct ShapeBuilder {
    dims: Dimensions,
    /// Upper bound for pre-allocations, the declared counts are not trusted
    max_elements: usize,
    parts: Vec<Part>,
    shape: Option<Shape>,
}

impl ShapeBuilder {
    fn new(dims: Dimensions, blob_size: usize) -> Self {
        ShapeBuilder {
            dims,
            max_elements: blob_size / 8,
            parts: Vec::new(),
            shape: None,
        }
    }

    fn capacity(&self, declared: usize) -> usize {
        declared.min(self.max_elements)
    }

    fn finish(self) -> Result<Shape> {
        if !self.parts.is_empty() {
            return Err(Error::Decode("Incomplete geometry in blob".into()));
        }

        self.shape.ok_or_else(|| Error::Decode("No geometry in blob".into()))
    }

    fn make_coordinate(&self, x: f64, y: f64, z: Option<f64>, m: Option<f64>) -> GeozeroResult<Coordinate> {
        let coord = match (z, m) {
            (None, None) => Coordinate::xy(x, y),
            (Some(z), None) => Coordinate::xyz(x, y, z),
            (None, Some(m)) => Coordinate::xym(x, y, m),
            (Some(z), Some(m)) => Coordinate::xyzm(x, y, z, m),
        };

        if coord.dimensions() != self.dims {
            return Err(invalid(format!(
                "Mixed dimensions in geometry: {} member in a {} geometry",
                coord.dimensions(),
                self.dims
            )));
        }

        Ok(coord)
    }

    fn add_coordinate(&mut self, coord: Coordinate) -> GeozeroResult {
        match self.parts.last_mut() {
            Some(Part::Point(point)) => *point = Some(coord),
            Some(Part::MultiPoint(points, _)) => points.push(coord),
            Some(Part::LineString(line)) => line.push(coord),
            Some(Part::Collection(..)) | None => return self.add_shape(point_shape(Some(coord))),
            Some(_) => return Err(invalid("Unexpected coordinate outside of a linestring")),
        }
        Ok(())
    }

    fn add_shape(&mut self, shape: Shape) -> GeozeroResult {
        match (self.parts.last_mut(), shape) {
            (Some(Part::Collection(shapes, _)), shape) => shapes.push(shape),
            (Some(Part::MultiPoint(points, _)), Shape::Point(Some(coord))) => points.push(coord),
            (Some(Part::MultiLineString(lines, _)), Shape::LineString(line)) => lines.push(line),
            (Some(Part::Polygon(rings, _)), Shape::LineString(ring)) => rings.push(ring),
            (Some(Part::MultiPolygon(polygons, _)), Shape::Polygon(polygon)) => polygons.push(polygon),
            (None, shape) if self.shape.is_none() => self.shape = Some(shape),
            (_, shape) => return Err(invalid(format!("Unexpected {} member", shape.geometry_type()))),
        }
        Ok(())
    }

    fn close(&mut self) -> GeozeroResult<Part> {
        self.parts.pop().ok_or_else(|| invalid("Unbalanced geometry"))
    }
}

impl GeomProcessor for ShapeBuilder {
    fn dimensions(&self) -> CoordDimensions {
        coord_dimensions(Dimensions::Xyzm)
    }

    fn xy(&mut self, x: f64, y: f64, _idx: usize) -> GeozeroResult {
        let coord = self.make_coordinate(x, y, None, None)?;
        self.add_coordinate(coord)
    }

    fn coordinate(
        &mut self,
        x: f64,
        y: f64,
        z: Option<f64>,
        m: Option<f64>,
        _t: Option<f64>,
        _tm: Option<u64>,
        _idx: usize,
    ) -> GeozeroResult {
        let coord = self.make_coordinate(x, y, z, m)?;
        self.add_coordinate(coord)
    }

    fn empty_point(&mut self, _idx: usize) -> GeozeroResult {
        match self.parts.last() {
            Some(Part::Point(_)) => Ok(()),
            _ => self.add_shape(Shape::Point(None)),
        }
    }

    fn point_begin(&mut self, _idx: usize) -> GeozeroResult {
        self.parts.push(Part::Point(None));
        Ok(())
    }

    fn point_end(&mut self, _idx: usize) -> GeozeroResult {
        match self.close()? {
            Part::Point(point) => self.add_shape(point_shape(point)),
            _ => Err(invalid("Unbalanced point")),
        }
    }

    fn multipoint_begin(&mut self, size: usize, _idx: usize) -> GeozeroResult {
        self.parts.push(Part::MultiPoint(Vec::with_capacity(self.capacity(size)), size));
        Ok(())
    }

    fn multipoint_end(&mut self, _idx: usize) -> GeozeroResult {
        match self.close()? {
            Part::MultiPoint(points, size) => {
                check_member_count("MultiPoint", points.len(), size)?;
                self.add_shape(Shape::MultiPoint(points))
            }
            _ => Err(invalid("Unbalanced multipoint")),
        }
    }

    fn linestring_begin(&mut self, _tagged: bool, size: usize, _idx: usize) -> GeozeroResult {
        self.parts
            .push(Part::LineString(PointList::with_capacity(self.dims, self.capacity(size))));
        Ok(())
    }

    fn linestring_end(&mut self, _tagged: bool, _idx: usize) -> GeozeroResult {
        match self.close()? {
            Part::LineString(points) => self.add_shape(Shape::LineString(points.into_linestring())),
            _ => Err(invalid("Unbalanced linestring")),
        }
    }

    fn multilinestring_begin(&mut self, size: usize, _idx: usize) -> GeozeroResult {
        self.parts
            .push(Part::MultiLineString(Vec::with_capacity(self.capacity(size)), size));
        Ok(())
    }

    fn multilinestring_end(&mut self, _idx: usize) -> GeozeroResult {
        match self.close()? {
            Part::MultiLineString(lines, size) => {
                check_member_count("MultiLineString", lines.len(), size)?;
                self.add_shape(Shape::MultiLineString(lines))
            }
            _ => Err(invalid("Unbalanced multilinestring")),
        }
    }

    fn polygon_begin(&mut self, _tagged: bool, size: usize, _idx: usize) -> GeozeroResult {
        self.parts.push(Part::Polygon(Vec::with_capacity(self.capacity(size)), size));
        Ok(())
    }

    fn polygon_end(&mut self, _tagged: bool, _idx: usize) -> GeozeroResult {
        match self.close()? {
            Part::Polygon(rings, size) => {
                check_member_count("Polygon", rings.len(), size)?;
                let mut rings = rings.into_iter();
                let polygon = match rings.next() {
                    Some(exterior) => Polygon::with_interiors(exterior, rings.collect()),
                    None => Polygon::new(LineString::new(self.dims)),
                };
                self.add_shape(Shape::Polygon(polygon))
            }
            _ => Err(invalid("Unbalanced polygon")),
        }
    }

    fn multipolygon_begin(&mut self, size: usize, _idx: usize) -> GeozeroResult {
        self.parts
            .push(Part::MultiPolygon(Vec::with_capacity(self.capacity(size)), size));
        Ok(())
    }

    fn multipolygon_end(&mut self, _idx: usize) -> GeozeroResult {
        match self.close()? {
            Part::MultiPolygon(polygons, size) => {
                check_member_count("MultiPolygon", polygons.len(), size)?;
                self.add_shape(Shape::MultiPolygon(polygons))
            }
            _ => Err(invalid("Unbalanced multipolygon")),
        }
    }

    fn geometrycollection_begin(&mut self, size: usize, _idx: usize) -> GeozeroResult {
        let depth = self.parts.iter().filter(|p| matches!(p, Part::Collection(..))).count();
        if depth >= MAX_NESTING {
            return Err(invalid("Geometry collections are nested too deeply"));
        }

        self.parts.push(Part::Collection(Vec::with_capacity(self.capacity(size)), size));
        Ok(())
    }

    fn geometrycollection_end(&mut self, _idx: usize) -> GeozeroResult {
        match self.close()? {
            Part::Collection(shapes, size) => {
                check_member_count("GeometryCollection", shapes.len(), size)?;
                self.add_shape(Shape::GeometryCollection(shapes))
            }
            _ => Err(invalid("Unbalanced geometry collection")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_DIMS: [Dimensions; 4] = [Dimensions::Xy, Dimensions::Xyz, Dimensions::Xym, Dimensions::Xyzm];

    fn coord(dims: Dimensions, x: f64, y: f64) -> Coordinate {
        Coordinate::xyzm(x, y, x + y, x * y).to_dimensions(dims, 0.0)
    }

    fn line(dims: Dimensions, offset: f64, len: usize) -> LineString {
        LineString::from_coordinates(dims, (0..len).map(|i| coord(dims, offset + i as f64, offset - i as f64)))
    }

    fn sample_shapes(dims: Dimensions) -> Vec<Shape> {
        let polygon = Polygon::with_interiors(line(dims, 0.0, 5), vec![line(dims, 1.0, 4), line(dims, 2.0, 4)]);
        vec![
            Shape::Point(Some(coord(dims, 1.5, -2.5))),
            Shape::Point(None),
            Shape::MultiPoint(vec![coord(dims, 1.0, 2.0), coord(dims, 3.0, 4.0)]),
            Shape::LineString(line(dims, 10.0, 7)),
            Shape::MultiLineString(vec![line(dims, 0.0, 2), line(dims, 5.0, 3)]),
            Shape::Polygon(polygon.clone()),
            Shape::Polygon(Polygon::new(LineString::new(dims))),
            Shape::MultiPolygon(vec![polygon.clone(), Polygon::new(line(dims, 7.0, 4))]),
            Shape::GeometryCollection(vec![
                Shape::Point(Some(coord(dims, 0.0, 0.0))),
                Shape::LineString(line(dims, 3.0, 3)),
                Shape::GeometryCollection(vec![Shape::Polygon(polygon)]),
            ]),
            Shape::GeometryCollection(Vec::new()),
        ]
    }

    #[test]
    fn encode_decode_all_types_and_dimensions() {
        for dims in ALL_DIMS {
            for shape in sample_shapes(dims) {
                let geom = Geometry::from_shape(3812, dims, shape).unwrap();
                let decoded = decode(&encode(&geom).unwrap()).unwrap();
                assert_eq!(decoded, geom, "{dims} {}", geom.geometry_type());
            }
        }
    }

    #[test]
    fn encoded_header_carries_flags_and_srid() {
        let geom = Geometry::from_shape(31370, Dimensions::Xyz, Shape::LineString(line(Dimensions::Xyz, 0.0, 2))).unwrap();
        let blob = encode(&geom).unwrap();

        assert_eq!(blob[0], 1, "little endian");
        assert_eq!(u32::from_le_bytes([blob[1], blob[2], blob[3], blob[4]]), 2 | WKB_Z | WKB_SRID);
        assert_eq!(i32::from_le_bytes([blob[5], blob[6], blob[7], blob[8]]), 31370);
        assert_eq!(u32::from_le_bytes([blob[9], blob[10], blob[11], blob[12]]), 2);
        assert_eq!(blob.len(), 13 + 2 * 3 * 8);
    }

    #[test]
    fn decode_big_endian_iso_point() {
        // POINT Z (1 2 3), ISO type code 1001, big endian
        let mut blob = vec![0];
        blob.extend_from_slice(&1001u32.to_be_bytes());
        for v in [1.0f64, 2.0, 3.0] {
            blob.extend_from_slice(&v.to_be_bytes());
        }

        let geom = decode(&blob).unwrap();
        assert_eq!(geom.dims(), Dimensions::Xyz);
        assert_eq!(geom.srid(), 0);
        assert_eq!(geom.shape(), &Shape::Point(Some(Coordinate::xyz(1.0, 2.0, 3.0))));
    }

    #[test]
    fn truncated_blob_is_a_decode_error() {
        let geom = Geometry::from_shape(0, Dimensions::Xyz, Shape::LineString(line(Dimensions::Xyz, 0.0, 3))).unwrap();
        let blob = encode(&geom).unwrap();
        for len in [0, 1, 5, 9, blob.len() - 1] {
            let err = decode(&blob[..len]).unwrap_err();
            assert!(err.is_decode_error(), "len {len}: {err}");
        }
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let geom = Geometry::from_shape(0, Dimensions::Xy, Shape::Point(Some(Coordinate::xy(1.0, 1.0)))).unwrap();
        let mut blob = encode(&geom).unwrap();
        blob.push(0);
        assert!(decode(&blob).unwrap_err().is_decode_error());
    }

    #[test]
    fn invalid_headers() {
        assert!(decode(&[7, 1, 0, 0, 0]).unwrap_err().is_decode_error(), "byte order");
        assert!(decode(&[1, 0, 0, 0, 0]).unwrap_err().is_decode_error(), "abstract geometry");
        assert!(decode(&[1, 0x11, 0, 0, 0]).unwrap_err().is_decode_error(), "triangle");
    }

    #[test]
    fn huge_count_is_rejected() {
        let mut blob = vec![1];
        blob.extend_from_slice(&2u32.to_le_bytes());
        blob.extend_from_slice(&u32::MAX.to_le_bytes());
        assert!(decode(&blob).unwrap_err().is_decode_error());
    }

    #[test]
    fn mixed_member_dimensions_are_rejected() {
        let mut blob = vec![1];
        blob.extend_from_slice(&(4u32 | WKB_Z).to_le_bytes());
        blob.extend_from_slice(&1u32.to_le_bytes());
        blob.push(1);
        blob.extend_from_slice(&1u32.to_le_bytes());
        blob.extend_from_slice(&1.0f64.to_le_bytes());
        blob.extend_from_slice(&1.0f64.to_le_bytes());
        assert!(decode(&blob).unwrap_err().is_decode_error());
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let mut blob = Vec::new();
        for _ in 0..=MAX_NESTING {
            blob.push(1);
            blob.extend_from_slice(&7u32.to_le_bytes());
            blob.extend_from_slice(&1u32.to_le_bytes());
        }
        blob.push(1);
        blob.extend_from_slice(&7u32.to_le_bytes());
        blob.extend_from_slice(&0u32.to_le_bytes());

        assert!(decode(&blob).unwrap_err().is_decode_error());
    }
}
