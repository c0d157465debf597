//! Host geometry and its conversion to GeoJSON
//!
//! Conversion never fails loudly: empty geometry, or geometry carrying a
//! non-finite coordinate, converts to `None`.

use serde_json::{json, Value};

/// A vertex. `z` is only emitted when present and finite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: Option<f64>,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: None }
    }

    pub fn with_z(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z: Some(z) }
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    fn xy(&self) -> Value {
        json!([self.x, self.y])
    }
}

/// A straight segment between two vertices
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start: Point,
    pub end: Point,
}

impl Segment {
    pub fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }
}

/// A path (polyline part) or ring (polygon part) as a run of segments
pub type Part = Vec<Segment>;

/// Build a part from a vertex list, one segment per consecutive pair
pub fn part_from_points(points: &[Point]) -> Part {
    points
        .windows(2)
        .map(|w| Segment::new(w[0], w[1]))
        .collect()
}

/// Axis-aligned bounding rectangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

/// Geometry as reported by the host
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Point),
    MultiPoint(Vec<Point>),
    Polyline(Vec<Part>),
    Polygon(Vec<Part>),
    Envelope(Envelope),
}

impl Geometry {
    /// Whether the geometry has nothing to draw
    pub fn is_empty(&self) -> bool {
        match self {
            Geometry::Point(p) => p.x.is_nan() && p.y.is_nan(),
            Geometry::MultiPoint(points) => points.is_empty(),
            Geometry::Polyline(parts) | Geometry::Polygon(parts) => {
                parts.iter().all(|p| p.is_empty())
            }
            Geometry::Envelope(e) => [e.x_min, e.y_min, e.x_max, e.y_max]
                .iter()
                .any(|v| v.is_nan()),
        }
    }

    /// Convert to a GeoJSON geometry object
    pub fn to_geojson(&self) -> Option<Value> {
        to_geojson(Some(self))
    }
}

/// Convert an optional host geometry to a GeoJSON value.
///
/// Multi-ring polygons are emitted as a `MultiPolygon` with one polygon
/// per ring; rings are not grouped into outer/hole pairs.
pub fn to_geojson(geometry: Option<&Geometry>) -> Option<Value> {
    let geometry = geometry?;
    if geometry.is_empty() {
        return None;
    }

    match geometry {
        Geometry::Point(p) => {
            if !p.is_finite() {
                return None;
            }
            let coordinates = match p.z.filter(|z| z.is_finite()) {
                Some(z) => json!([p.x, p.y, z]),
                None => p.xy(),
            };
            Some(json!({ "type": "Point", "coordinates": coordinates }))
        }
        Geometry::MultiPoint(points) => {
            let coords = points
                .iter()
                .map(|p| p.is_finite().then(|| p.xy()))
                .collect::<Option<Vec<_>>>()?;
            Some(json!({ "type": "MultiPoint", "coordinates": coords }))
        }
        Geometry::Polyline(parts) => {
            let mut paths = flatten_parts(parts)?;
            if paths.len() == 1 {
                let path = paths.pop()?;
                Some(json!({ "type": "LineString", "coordinates": path }))
            } else {
                Some(json!({ "type": "MultiLineString", "coordinates": paths }))
            }
        }
        Geometry::Polygon(parts) => {
            let rings = flatten_parts(parts)?;
            if rings.len() == 1 {
                Some(json!({ "type": "Polygon", "coordinates": rings }))
            } else {
                let polygons: Vec<Value> = rings.into_iter().map(|ring| json!([ring])).collect();
                Some(json!({ "type": "MultiPolygon", "coordinates": polygons }))
            }
        }
        Geometry::Envelope(e) => {
            let values = [e.x_min, e.y_min, e.x_max, e.y_max];
            if values.iter().any(|v| !v.is_finite()) {
                return None;
            }
            let ring = json!([
                [e.x_min, e.y_min],
                [e.x_max, e.y_min],
                [e.x_max, e.y_max],
                [e.x_min, e.y_max],
                [e.x_min, e.y_min]
            ]);
            Some(json!({ "type": "Polygon", "coordinates": [ring] }))
        }
    }
}

/// Segment start points followed by the last segment's end point
fn flatten_part(part: &Part) -> Option<Vec<Value>> {
    let mut coords = Vec::with_capacity(part.len() + 1);
    for segment in part {
        if !segment.start.is_finite() {
            return None;
        }
        coords.push(segment.start.xy());
    }
    if let Some(last) = part.last() {
        if !last.end.is_finite() {
            return None;
        }
        coords.push(last.end.xy());
    }
    Some(coords)
}

/// Empty parts are skipped so they never count towards single/multi
fn flatten_parts(parts: &[Part]) -> Option<Vec<Vec<Value>>> {
    parts
        .iter()
        .filter(|part| !part.is_empty())
        .map(flatten_part)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn square(x: f64, y: f64, size: f64) -> Part {
        part_from_points(&[
            Point::new(x, y),
            Point::new(x + size, y),
            Point::new(x + size, y + size),
            Point::new(x, y + size),
            Point::new(x, y),
        ])
    }

    #[test]
    fn test_none_and_empty() {
        assert_eq!(to_geojson(None), None);
        assert_eq!(Geometry::MultiPoint(vec![]).to_geojson(), None);
        assert_eq!(Geometry::Polyline(vec![]).to_geojson(), None);
        assert_eq!(Geometry::Polygon(vec![vec![]]).to_geojson(), None);
        assert_eq!(Geometry::Point(Point::new(f64::NAN, f64::NAN)).to_geojson(), None);
    }

    #[test]
    fn test_empty_parts_are_skipped() {
        let line = part_from_points(&[Point::new(0.0, 0.0), Point::new(1.0, 1.0)]);
        let g = Geometry::Polyline(vec![vec![], line]);
        assert_eq!(
            g.to_geojson().unwrap(),
            json!({"type": "LineString", "coordinates": [[0.0, 0.0], [1.0, 1.0]]})
        );

        let g = Geometry::Polygon(vec![square(0.0, 0.0, 1.0), vec![]]);
        let value = g.to_geojson().unwrap();
        assert_eq!(value["type"], "Polygon");
        assert_eq!(value["coordinates"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_point_2d_and_3d() {
        let p = Geometry::Point(Point::new(1.0, 2.0)).to_geojson().unwrap();
        assert_eq!(p, json!({"type": "Point", "coordinates": [1.0, 2.0]}));

        let p = Geometry::Point(Point::with_z(1.0, 2.0, 3.0)).to_geojson().unwrap();
        assert_eq!(p["coordinates"], json!([1.0, 2.0, 3.0]));

        let p = Geometry::Point(Point::with_z(1.0, 2.0, f64::NAN)).to_geojson().unwrap();
        assert_eq!(p["coordinates"], json!([1.0, 2.0]));
    }

    #[test]
    fn test_multipoint_drops_z() {
        let g = Geometry::MultiPoint(vec![Point::with_z(0.0, 0.0, 9.0), Point::new(1.0, 1.0)]);
        assert_eq!(
            g.to_geojson().unwrap(),
            json!({"type": "MultiPoint", "coordinates": [[0.0, 0.0], [1.0, 1.0]]})
        );
    }

    #[test]
    fn test_single_part_polyline() {
        let part = part_from_points(&[Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(2.0, 1.0)]);
        let g = Geometry::Polyline(vec![part]).to_geojson().unwrap();
        assert_eq!(g["type"], "LineString");
        assert_eq!(g["coordinates"], json!([[0.0, 0.0], [1.0, 0.0], [2.0, 1.0]]));
    }

    #[test]
    fn test_multi_part_polyline() {
        let a = part_from_points(&[Point::new(0.0, 0.0), Point::new(1.0, 0.0)]);
        let b = part_from_points(&[Point::new(5.0, 5.0), Point::new(6.0, 6.0)]);
        let g = Geometry::Polyline(vec![a, b]).to_geojson().unwrap();
        assert_eq!(g["type"], "MultiLineString");
        assert_eq!(
            g["coordinates"],
            json!([[[0.0, 0.0], [1.0, 0.0]], [[5.0, 5.0], [6.0, 6.0]]])
        );
    }

    #[test]
    fn test_single_ring_polygon_is_closed() {
        let g = Geometry::Polygon(vec![square(0.0, 0.0, 1.0)]).to_geojson().unwrap();
        assert_eq!(g["type"], "Polygon");
        let rings = g["coordinates"].as_array().unwrap();
        assert_eq!(rings.len(), 1);
        let ring = rings[0].as_array().unwrap();
        assert_eq!(ring.len(), 5);
        assert_eq!(ring.first(), ring.last());
    }

    #[test]
    fn test_multi_ring_polygon_emits_one_polygon_per_ring() {
        let outer = square(0.0, 0.0, 10.0);
        let hole = square(2.0, 2.0, 1.0);
        let g = Geometry::Polygon(vec![outer, hole]).to_geojson().unwrap();
        assert_eq!(g["type"], "MultiPolygon");
        let polygons = g["coordinates"].as_array().unwrap();
        assert_eq!(polygons.len(), 2);
        for polygon in polygons {
            assert_eq!(polygon.as_array().unwrap().len(), 1);
        }
        assert_eq!(polygons[1][0][0], json!([2.0, 2.0]));
    }

    #[test]
    fn test_envelope_as_closed_ring() {
        let g = Geometry::Envelope(Envelope { x_min: 0.0, y_min: 1.0, x_max: 2.0, y_max: 3.0 })
            .to_geojson()
            .unwrap();
        assert_eq!(
            g,
            json!({
                "type": "Polygon",
                "coordinates": [[[0.0, 1.0], [2.0, 1.0], [2.0, 3.0], [0.0, 3.0], [0.0, 1.0]]]
            })
        );
    }

    #[test]
    fn test_non_finite_coordinate_yields_none() {
        let part = part_from_points(&[Point::new(0.0, 0.0), Point::new(f64::INFINITY, 1.0)]);
        assert_eq!(Geometry::Polyline(vec![part]).to_geojson(), None);
    }

    fn arb_point() -> impl Strategy<Value = Point> {
        (any::<f64>(), any::<f64>(), proptest::option::of(any::<f64>()))
            .prop_map(|(x, y, z)| Point { x, y, z })
    }

    fn arb_part() -> impl Strategy<Value = Part> {
        proptest::collection::vec(arb_point(), 0..6).prop_map(|pts| part_from_points(&pts))
    }

    fn arb_geometry() -> impl Strategy<Value = Geometry> {
        prop_oneof![
            arb_point().prop_map(Geometry::Point),
            proptest::collection::vec(arb_point(), 0..6).prop_map(Geometry::MultiPoint),
            proptest::collection::vec(arb_part(), 0..4).prop_map(Geometry::Polyline),
            proptest::collection::vec(arb_part(), 0..4).prop_map(Geometry::Polygon),
            (any::<f64>(), any::<f64>(), any::<f64>(), any::<f64>()).prop_map(|(a, b, c, d)| {
                Geometry::Envelope(Envelope { x_min: a, y_min: b, x_max: c, y_max: d })
            }),
        ]
    }

    proptest! {
        #[test]
        fn prop_conversion_never_panics(g in arb_geometry()) {
            if let Some(value) = g.to_geojson() {
                prop_assert!(value["type"].is_string());
            }
        }
    }
}
