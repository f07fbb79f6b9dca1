//! Source features read from OSM and classified features handed to tile writers

use std::collections::BTreeMap;

use geo::{Centroid, Geometry, InteriorPoint, IsConvex, LineString, Point, Polygon};

use crate::tags::Tags;

/// OSM element kind a source feature was built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Node,
    Way,
}

/// One OSM node or way with its tags and WGS84 geometry (x = lon, y = lat)
#[derive(Debug, Clone)]
pub struct SourceFeature {
    pub id: i64,
    pub kind: ElementKind,
    pub tags: Tags,
    pub geometry: Geometry<f64>,
}

impl SourceFeature {
    pub fn node(id: i64, tags: Tags, lon: f64, lat: f64) -> Self {
        Self {
            id,
            kind: ElementKind::Node,
            tags,
            geometry: Geometry::Point(Point::new(lon, lat)),
        }
    }

    pub fn way(id: i64, tags: Tags, coords: Vec<(f64, f64)>) -> Self {
        Self {
            id,
            kind: ElementKind::Way,
            tags,
            geometry: Geometry::LineString(LineString::from(coords)),
        }
    }

    /// True for lines with at least two coordinates. A closed way only
    /// counts when it is not tagged `area=yes`.
    pub fn can_be_line(&self) -> bool {
        match &self.geometry {
            Geometry::LineString(ls) if ls.0.len() >= 2 => {
                !ls.is_closed() || !self.tags.has_tag("area", "yes")
            }
            _ => false,
        }
    }

    /// True for closed lines with at least four coordinates, unless tagged
    /// `area=no`
    pub fn can_be_polygon(&self) -> bool {
        match &self.geometry {
            Geometry::LineString(ls) if ls.0.len() >= 4 && ls.is_closed() => {
                !self.tags.has_tag("area", "no")
            }
            _ => false,
        }
    }

    /// Representative point for POI output.
    ///
    /// Points map to themselves. Polygons use the centroid when the ring is
    /// convex and an interior point otherwise, so the label never lands
    /// outside the shape. Open lines use their centroid.
    pub fn centroid_if_convex(&self) -> Option<Point<f64>> {
        match &self.geometry {
            Geometry::Point(p) => Some(*p),
            Geometry::LineString(ls) if self.can_be_polygon() => {
                let polygon = Polygon::new(ls.clone(), vec![]);
                if ls.is_convex() {
                    polygon.centroid()
                } else {
                    polygon.interior_point()
                }
            }
            Geometry::LineString(ls) if self.can_be_line() => ls.centroid(),
            _ => None,
        }
    }
}

/// Ordered attribute set. An absent value is never stored.
pub type Attrs = BTreeMap<String, String>;

/// Named, attributed output geometry plus rendering hints
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedFeature {
    pub layer: String,
    pub geometry: Geometry<f64>,
    pub attrs: Attrs,
    pub min_zoom: u8,
    /// Features smaller than this many pixels may be dropped by the writer.
    /// Zero defers all size filtering to post-processing.
    pub min_pixel_size: f64,
}

/// Pixel size below which tile writers drop features unless told otherwise
pub const DEFAULT_MIN_PIXEL_SIZE: f64 = 1.0;

impl ClassifiedFeature {
    pub fn new(layer: &str, geometry: Geometry<f64>) -> Self {
        Self {
            layer: layer.to_string(),
            geometry,
            attrs: Attrs::new(),
            min_zoom: 0,
            min_pixel_size: DEFAULT_MIN_PIXEL_SIZE,
        }
    }

    /// Set an attribute; `None` leaves the attribute absent
    pub fn with_attr(mut self, key: &str, value: Option<&str>) -> Self {
        if let Some(value) = value {
            self.attrs.insert(key.to_string(), value.to_string());
        }
        self
    }

    pub fn with_min_zoom(mut self, min_zoom: u8) -> Self {
        self.min_zoom = min_zoom;
        self
    }

    pub fn with_min_pixel_size(mut self, min_pixel_size: f64) -> Self {
        self.min_pixel_size = min_pixel_size;
        self
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    /// Same layer, attributes and hints with a different geometry
    pub fn with_geometry(&self, geometry: Geometry<f64>) -> Self {
        Self {
            layer: self.layer.clone(),
            geometry,
            attrs: self.attrs.clone(),
            min_zoom: self.min_zoom,
            min_pixel_size: self.min_pixel_size,
        }
    }

    pub fn is_line(&self) -> bool {
        matches!(
            self.geometry,
            Geometry::LineString(_) | Geometry::MultiLineString(_)
        )
    }
}
