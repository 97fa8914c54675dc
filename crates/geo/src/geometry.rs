use crate::{Coordinate, Dimensions, Error, GeometryType, LineString, Rect, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    exterior: LineString,
    interiors: Vec<LineString>,
}

impl Polygon {
    pub fn new(exterior: LineString) -> Self {
        Polygon {
            exterior,
            interiors: Vec::new(),
        }
    }

    pub fn with_interiors(exterior: LineString, interiors: Vec<LineString>) -> Self {
        Polygon { exterior, interiors }
    }

    pub fn dims(&self) -> Dimensions {
        self.exterior.dims()
    }

    pub fn exterior(&self) -> &LineString {
        &self.exterior
    }

    pub fn exterior_mut(&mut self) -> &mut LineString {
        &mut self.exterior
    }

    pub fn interiors(&self) -> &[LineString] {
        &self.interiors
    }

    /// Appends an interior ring with `len` pre-sized vertex slots
    pub fn add_interior(&mut self, len: usize) -> &mut LineString {
        self.interiors.push(LineString::with_len(self.exterior.dims(), len));
        let last = self.interiors.len() - 1;
        &mut self.interiors[last]
    }

    pub fn ring_count(&self) -> usize {
        1 + self.interiors.len()
    }

    /// The exterior ring followed by the interior rings
    pub fn rings(&self) -> impl Iterator<Item = &LineString> {
        std::iter::once(&self.exterior).chain(self.interiors.iter())
    }

    pub fn rings_mut(&mut self) -> impl Iterator<Item = &mut LineString> {
        std::iter::once(&mut self.exterior).chain(self.interiors.iter_mut())
    }

    pub fn bbox(&self) -> Option<Rect> {
        self.exterior.bbox()
    }

    fn map_rings(&self, f: &mut impl FnMut(&LineString) -> LineString) -> Polygon {
        Polygon {
            exterior: f(&self.exterior),
            interiors: self.interiors.iter().map(|ring| f(ring)).collect(),
        }
    }
}

/// The geometry tree, one variant per geometry type
/// `Point(None)` is the empty point.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Point(Option<Coordinate>),
    MultiPoint(Vec<Coordinate>),
    LineString(LineString),
    MultiLineString(Vec<LineString>),
    Polygon(Polygon),
    MultiPolygon(Vec<Polygon>),
    GeometryCollection(Vec<Shape>),
}

impl Shape {
    pub fn empty(geom_type: GeometryType, dims: Dimensions) -> Shape {
        match geom_type {
            GeometryType::Point => Shape::Point(None),
            GeometryType::LineString => Shape::LineString(LineString::new(dims)),
            GeometryType::Polygon => Shape::Polygon(Polygon::new(LineString::new(dims))),
            GeometryType::MultiPoint => Shape::MultiPoint(Vec::new()),
            GeometryType::MultiLineString => Shape::MultiLineString(Vec::new()),
            GeometryType::MultiPolygon => Shape::MultiPolygon(Vec::new()),
            GeometryType::Geometry | GeometryType::GeometryCollection => Shape::GeometryCollection(Vec::new()),
        }
    }

    pub fn geometry_type(&self) -> GeometryType {
        match self {
            Shape::Point(_) => GeometryType::Point,
            Shape::MultiPoint(_) => GeometryType::MultiPoint,
            Shape::LineString(_) => GeometryType::LineString,
            Shape::MultiLineString(_) => GeometryType::MultiLineString,
            Shape::Polygon(_) => GeometryType::Polygon,
            Shape::MultiPolygon(_) => GeometryType::MultiPolygon,
            Shape::GeometryCollection(_) => GeometryType::GeometryCollection,
        }
    }

    /// Visits every vertex of the shape (points, linestring vertices and ring vertices)
    pub fn for_each_coordinate(&self, f: &mut impl FnMut(Coordinate)) {
        match self {
            Shape::Point(point) => point.iter().for_each(|c| f(*c)),
            Shape::MultiPoint(points) => points.iter().for_each(|c| f(*c)),
            Shape::GeometryCollection(shapes) => {
                for shape in shapes {
                    shape.for_each_coordinate(&mut *f);
                }
            }
            shape => {
                for line in shape.coordinate_sequences() {
                    line.coordinates().for_each(|c| f(c));
                }
            }
        }
    }

    /// All the linestrings and polygon rings, depth first in storage order
    pub fn coordinate_sequences(&self) -> Vec<&LineString> {
        let mut result = Vec::new();
        self.collect_sequences(&mut result);
        result
    }

    fn collect_sequences<'a>(&'a self, out: &mut Vec<&'a LineString>) {
        match self {
            Shape::Point(_) | Shape::MultiPoint(_) => {}
            Shape::LineString(line) => out.push(line),
            Shape::MultiLineString(lines) => out.extend(lines.iter()),
            Shape::Polygon(polygon) => out.extend(polygon.rings()),
            Shape::MultiPolygon(polygons) => out.extend(polygons.iter().flat_map(|p| p.rings())),
            Shape::GeometryCollection(shapes) => shapes.iter().for_each(|s| s.collect_sequences(out)),
        }
    }

    pub fn coordinate_sequences_mut(&mut self) -> Vec<&mut LineString> {
        let mut result = Vec::new();
        self.collect_sequences_mut(&mut result);
        result
    }

    fn collect_sequences_mut<'a>(&'a mut self, out: &mut Vec<&'a mut LineString>) {
        match self {
            Shape::Point(_) | Shape::MultiPoint(_) => {}
            Shape::LineString(line) => out.push(line),
            Shape::MultiLineString(lines) => out.extend(lines.iter_mut()),
            Shape::Polygon(polygon) => out.extend(polygon.rings_mut()),
            Shape::MultiPolygon(polygons) => out.extend(polygons.iter_mut().flat_map(|p| p.rings_mut())),
            Shape::GeometryCollection(shapes) => shapes.iter_mut().for_each(|s| s.collect_sequences_mut(out)),
        }
    }

    /// All the point vertices (not the vertices of linestrings or rings)
    pub fn points_mut(&mut self) -> Vec<&mut Coordinate> {
        let mut result = Vec::new();
        self.collect_points_mut(&mut result);
        result
    }

    fn collect_points_mut<'a>(&'a mut self, out: &mut Vec<&'a mut Coordinate>) {
        match self {
            Shape::Point(point) => out.extend(point.iter_mut()),
            Shape::MultiPoint(points) => out.extend(points.iter_mut()),
            Shape::GeometryCollection(shapes) => shapes.iter_mut().for_each(|s| s.collect_points_mut(out)),
            Shape::LineString(_) | Shape::MultiLineString(_) | Shape::Polygon(_) | Shape::MultiPolygon(_) => {}
        }
    }

    /// Builds a new shape of the same structure with every linestring and ring replaced by `f(ring)`
    /// Points are passed through `point`.
    pub fn map(&self, f: &mut impl FnMut(&LineString) -> LineString, point: &mut impl FnMut(Coordinate) -> Coordinate) -> Shape {
        match self {
            Shape::Point(p) => Shape::Point(p.map(|c| point(c))),
            Shape::MultiPoint(points) => Shape::MultiPoint(points.iter().map(|c| point(*c)).collect()),
            Shape::LineString(line) => Shape::LineString(f(line)),
            Shape::MultiLineString(lines) => Shape::MultiLineString(lines.iter().map(|l| f(l)).collect()),
            Shape::Polygon(polygon) => Shape::Polygon(polygon.map_rings(f)),
            Shape::MultiPolygon(polygons) => Shape::MultiPolygon(polygons.iter().map(|p| p.map_rings(f)).collect()),
            Shape::GeometryCollection(shapes) => {
                let mut mapped = Vec::with_capacity(shapes.len());
                for shape in shapes {
                    mapped.push(shape.map(&mut *f, &mut *point));
                }
                Shape::GeometryCollection(mapped)
            }
        }
    }

    fn all_dims(&self, dims: Dimensions) -> bool {
        let mut uniform = true;
        self.for_each_coordinate(&mut |c| uniform &= c.dimensions() == dims);
        uniform && self.coordinate_sequences().iter().all(|l| l.dims() == dims)
    }
}

/// A geometry: spatial reference id, uniform dimensions and the shape tree
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    srid: i32,
    dims: Dimensions,
    shape: Shape,
}

impl Geometry {
    /// Creates an empty geometry of the requested type
    pub fn new(srid: i32, dims: Dimensions, geom_type: GeometryType) -> Self {
        Geometry {
            srid,
            dims,
            shape: Shape::empty(geom_type, dims),
        }
    }

    /// Wraps a shape, fails when any vertex or sequence does not match `dims`
    pub fn from_shape(srid: i32, dims: Dimensions, shape: Shape) -> Result<Self> {
        if !shape.all_dims(dims) {
            return Err(Error::InvalidArgument(format!("Geometry contains vertices that are not {dims}")));
        }

        Ok(Geometry { srid, dims, shape })
    }

    pub fn srid(&self) -> i32 {
        self.srid
    }

    pub fn set_srid(&mut self, srid: i32) {
        self.srid = srid;
    }

    pub fn dims(&self) -> Dimensions {
        self.dims
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn shape_mut(&mut self) -> &mut Shape {
        &mut self.shape
    }

    pub fn geometry_type(&self) -> GeometryType {
        self.shape.geometry_type()
    }

    pub fn bbox(&self) -> Option<Rect> {
        let mut bbox: Option<Rect> = None;
        self.shape.for_each_coordinate(&mut |c| {
            if let Some(rect) = bbox.as_mut() {
                rect.expand_to(c.x(), c.y());
            } else {
                bbox = Rect::bounding([c]);
            }
        });
        bbox
    }

    pub fn is_empty(&self) -> bool {
        self.vertex_count() == 0
    }

    pub fn vertex_count(&self) -> usize {
        let mut count = 0;
        self.shape.for_each_coordinate(&mut |_| count += 1);
        count
    }

    pub fn add_point(&mut self, coord: Coordinate) -> Result<()> {
        let coord = self.checked(coord)?;
        match &mut self.shape {
            Shape::Point(point @ None) => *point = Some(coord),
            Shape::MultiPoint(points) => points.push(coord),
            Shape::GeometryCollection(shapes) => shapes.push(Shape::Point(Some(coord))),
            shape => return Err(cannot_add("point", shape.geometry_type())),
        }
        Ok(())
    }

    /// Appends a linestring with `len` pre-sized vertex slots and returns it for filling in
    pub fn add_linestring(&mut self, len: usize) -> Result<&mut LineString> {
        let accepts = match &self.shape {
            Shape::LineString(existing) => existing.is_empty(),
            Shape::MultiLineString(_) | Shape::GeometryCollection(_) => true,
            _ => false,
        };
        let geom_type = self.shape.geometry_type();
        if !accepts {
            return Err(cannot_add("linestring", geom_type));
        }

        let line = LineString::with_len(self.dims, len);
        match &mut self.shape {
            Shape::LineString(existing) => {
                *existing = line;
                Ok(existing)
            }
            Shape::MultiLineString(lines) => {
                lines.push(line);
                let last = lines.len() - 1;
                Ok(&mut lines[last])
            }
            Shape::GeometryCollection(shapes) => {
                shapes.push(Shape::LineString(line));
                match shapes.last_mut() {
                    Some(Shape::LineString(line)) => Ok(line),
                    _ => Err(cannot_add("linestring", geom_type)),
                }
            }
            _ => Err(cannot_add("linestring", geom_type)),
        }
    }

    /// Appends a polygon whose exterior ring has `len` pre-sized vertex slots
    pub fn add_polygon(&mut self, len: usize) -> Result<&mut Polygon> {
        let accepts = match &self.shape {
            Shape::Polygon(existing) => existing.exterior().is_empty() && existing.interiors().is_empty(),
            Shape::MultiPolygon(_) | Shape::GeometryCollection(_) => true,
            _ => false,
        };
        let geom_type = self.shape.geometry_type();
        if !accepts {
            return Err(cannot_add("polygon", geom_type));
        }

        let polygon = Polygon::new(LineString::with_len(self.dims, len));
        match &mut self.shape {
            Shape::Polygon(existing) => {
                *existing = polygon;
                Ok(existing)
            }
            Shape::MultiPolygon(polygons) => {
                polygons.push(polygon);
                let last = polygons.len() - 1;
                Ok(&mut polygons[last])
            }
            Shape::GeometryCollection(shapes) => {
                shapes.push(Shape::Polygon(polygon));
                match shapes.last_mut() {
                    Some(Shape::Polygon(polygon)) => Ok(polygon),
                    _ => Err(cannot_add("polygon", geom_type)),
                }
            }
            _ => Err(cannot_add("polygon", geom_type)),
        }
    }

    /// Returns a copy converted to `dims`, ordinates that are added get the `fill` value
    pub fn with_dimensions(&self, dims: Dimensions, fill: f64) -> Geometry {
        Geometry {
            srid: self.srid,
            dims,
            shape: self
                .shape
                .map(&mut |line| line.to_dimensions(dims, fill), &mut |c| c.to_dimensions(dims, fill)),
        }
    }

    /// Returns a copy with every linestring and ring replaced by `f(ring)`, points are kept
    /// `f` must preserve the dimensions of the geometry.
    pub fn map_sequences(&self, mut f: impl FnMut(&LineString) -> LineString) -> Geometry {
        Geometry {
            srid: self.srid,
            dims: self.dims,
            shape: self.shape.map(&mut f, &mut |c| c),
        }
    }

    fn checked(&self, coord: Coordinate) -> Result<Coordinate> {
        if coord.dimensions() != self.dims {
            return Err(Error::InvalidArgument(format!(
                "Cannot add a {} vertex to a {} geometry",
                coord.dimensions(),
                self.dims
            )));
        }
        Ok(coord)
    }
}

fn cannot_add(what: &str, geom_type: GeometryType) -> Error {
    Error::InvalidArgument(format!("Cannot add a {what} to a {geom_type}"))
}
