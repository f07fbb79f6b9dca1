//! Tile writers
//!
//! The pipeline hands each finished tile to a [`TileSink`]. The bundled
//! writer dumps one JSON record per feature per line.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use cyclemap_common::{Error, GeometryError, Result};
use geo::{Coord, Geometry, LineString};
use serde::Serialize;

use crate::feature::{Attrs, ClassifiedFeature};
use crate::tile::TileCoord;

/// Receives rendered tiles in (zoom, x, y) order
pub trait TileSink {
    fn write_tile(&mut self, tile: TileCoord, features: &[ClassifiedFeature]) -> Result<()>;

    /// Called once after the last tile
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "type", content = "coordinates")]
enum GeometryRecord {
    Point([f64; 2]),
    MultiPoint(Vec<[f64; 2]>),
    LineString(Vec<[f64; 2]>),
    MultiLineString(Vec<Vec<[f64; 2]>>),
}

impl TryFrom<&Geometry<f64>> for GeometryRecord {
    type Error = GeometryError;

    fn try_from(geometry: &Geometry<f64>) -> std::result::Result<Self, GeometryError> {
        fn pair(c: &Coord<f64>) -> [f64; 2] {
            [c.x, c.y]
        }
        fn path(ls: &LineString<f64>) -> Vec<[f64; 2]> {
            ls.coords().map(pair).collect()
        }

        Ok(match geometry {
            Geometry::Point(p) => GeometryRecord::Point(pair(&p.0)),
            Geometry::MultiPoint(mp) => GeometryRecord::MultiPoint(mp.iter().map(|p| pair(&p.0)).collect()),
            Geometry::LineString(ls) => GeometryRecord::LineString(path(ls)),
            Geometry::MultiLineString(mls) => {
                GeometryRecord::MultiLineString(mls.iter().map(path).collect())
            }
            Geometry::Polygon(_) => return Err(GeometryError::UnsupportedGeometry("Polygon")),
            Geometry::MultiPolygon(_) => {
                return Err(GeometryError::UnsupportedGeometry("MultiPolygon"))
            }
            Geometry::GeometryCollection(_) => {
                return Err(GeometryError::UnsupportedGeometry("GeometryCollection"))
            }
            Geometry::Line(_) => return Err(GeometryError::UnsupportedGeometry("Line")),
            Geometry::Rect(_) => return Err(GeometryError::UnsupportedGeometry("Rect")),
            Geometry::Triangle(_) => return Err(GeometryError::UnsupportedGeometry("Triangle")),
        })
    }
}

#[derive(Debug, Serialize)]
struct FeatureRecord<'a> {
    z: u8,
    x: u32,
    y: u32,
    layer: &'a str,
    min_zoom: u8,
    properties: &'a Attrs,
    geometry: GeometryRecord,
}

/// Newline-delimited JSON tile dump, geometry in tile pixels
pub struct NdjsonTileWriter<W: Write> {
    out: W,
    records: u64,
}

impl NdjsonTileWriter<BufWriter<File>> {
    /// Create (or truncate) the output file
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> NdjsonTileWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, records: 0 }
    }

    /// Feature records written so far
    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> TileSink for NdjsonTileWriter<W> {
    fn write_tile(&mut self, tile: TileCoord, features: &[ClassifiedFeature]) -> Result<()> {
        for feature in features {
            let record = FeatureRecord {
                z: tile.z,
                x: tile.x,
                y: tile.y,
                layer: &feature.layer,
                min_zoom: feature.min_zoom,
                properties: &feature.attrs,
                geometry: GeometryRecord::try_from(&feature.geometry)?,
            };
            serde_json::to_writer(&mut self.out, &record)
                .map_err(|e| Error::Io(e.into()))?;
            self.out.write_all(b"\n")?;
            self.records += 1;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// Keeps every tile in memory, mostly for tests and small extracts
#[derive(Debug, Default)]
pub struct MemoryTileSink {
    pub tiles: BTreeMap<TileCoord, Vec<ClassifiedFeature>>,
}

impl MemoryTileSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn features(&self, tile: &TileCoord, layer: &str) -> Vec<&ClassifiedFeature> {
        self.tiles
            .get(tile)
            .map(|features| features.iter().filter(|f| f.layer == layer).collect())
            .unwrap_or_default()
    }
}

impl TileSink for MemoryTileSink {
    fn write_tile(&mut self, tile: TileCoord, features: &[ClassifiedFeature]) -> Result<()> {
        self.tiles.entry(tile).or_default().extend_from_slice(features);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{MultiLineString, Point, Polygon};

    #[test]
    fn test_ndjson_records() {
        let tile = TileCoord::new(14, 9058, 5772).unwrap();
        let line = ClassifiedFeature::new(
            "cycling",
            Geometry::MultiLineString(MultiLineString::new(vec![LineString::from(vec![
                (0.0, 1.0),
                (2.5, 3.0),
            ])])),
        )
        .with_attr("class", Some("cycleway"));
        let poi = ClassifiedFeature::new("cycling_poi", Geometry::Point(Point::new(10.0, 20.0)))
            .with_min_zoom(14)
            .with_attr("class", Some("drinking_water"));

        let mut writer = NdjsonTileWriter::new(Vec::new());
        writer.write_tile(tile, &[line, poi]).unwrap();
        writer.finish().unwrap();
        assert_eq!(writer.records(), 2);

        let text = String::from_utf8(writer.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["z"], 14);
        assert_eq!(first["x"], 9058);
        assert_eq!(first["layer"], "cycling");
        assert_eq!(first["properties"]["class"], "cycleway");
        assert_eq!(first["geometry"]["type"], "MultiLineString");
        assert_eq!(first["geometry"]["coordinates"][0][1][0], 2.5);

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["min_zoom"], 14);
        assert_eq!(second["geometry"]["type"], "Point");
        assert_eq!(second["geometry"]["coordinates"][1], 20.0);
    }

    #[test]
    fn test_polygon_is_unsupported() {
        let polygon = Polygon::new(LineString::from(vec![(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)]), vec![]);
        let feature = ClassifiedFeature::new("cycling", Geometry::Polygon(polygon));

        let mut writer = NdjsonTileWriter::new(Vec::new());
        let err = writer
            .write_tile(TileCoord::new(0, 0, 0).unwrap(), &[feature])
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Geometry(GeometryError::UnsupportedGeometry("Polygon"))
        ));
    }

    #[test]
    fn test_memory_sink_filters_by_layer() {
        let tile = TileCoord::new(0, 0, 0).unwrap();
        let mut sink = MemoryTileSink::new();
        sink.write_tile(
            tile,
            &[
                ClassifiedFeature::new("cycling", Geometry::Point(Point::new(0.0, 0.0))),
                ClassifiedFeature::new("cycling_poi", Geometry::Point(Point::new(1.0, 1.0))),
            ],
        )
        .unwrap();

        assert_eq!(sink.features(&tile, "cycling_poi").len(), 1);
        assert!(sink.features(&TileCoord::new(1, 0, 0).unwrap(), "cycling").is_empty());
    }
}
