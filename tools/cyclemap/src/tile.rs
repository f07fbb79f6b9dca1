//! Web Mercator tile addressing and projection into tile-pixel space

use std::f64::consts::PI;
use std::ops::RangeInclusive;

use cyclemap_common::GeometryError;
use geo::{BoundingRect, Coord, Geometry, MapCoords};

use crate::merge::TILE_EXTENT;

/// Latitude limit of the square Web Mercator world
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Deepest zoom a tile address may use
const MAX_TILE_ZOOM: u8 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    /// Tile address, rejected unless `x, y < 2^z`
    pub fn new(z: u8, x: u32, y: u32) -> Result<Self, GeometryError> {
        if z > MAX_TILE_ZOOM || x >= tiles_at(z) || y >= tiles_at(z) {
            return Err(GeometryError::InvalidTile { z, x, y });
        }
        Ok(Self { z, x, y })
    }

    /// Project a WGS84 geometry (x = lon, y = lat) into this tile's pixels.
    /// The tile's top-left corner is the origin; coordinates outside the
    /// tile fall outside `0..TILE_EXTENT`.
    pub fn project(&self, geometry: &Geometry<f64>) -> Result<Geometry<f64>, GeometryError> {
        let origin_x = f64::from(self.x) * TILE_EXTENT;
        let origin_y = f64::from(self.y) * TILE_EXTENT;
        let z = self.z;
        geometry.try_map_coords(|c: Coord<f64>| -> Result<Coord<f64>, GeometryError> {
            let (px, py) = world_pixel(c.x, c.y, z)?;
            Ok(Coord {
                x: px - origin_x,
                y: py - origin_y,
            })
        })
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

fn tiles_at(z: u8) -> u32 {
    1u32 << z.min(MAX_TILE_ZOOM)
}

/// Global pixel position of a WGS84 coordinate at zoom `z`.
/// Latitudes beyond [`MAX_LATITUDE`] are clamped.
pub fn world_pixel(lon: f64, lat: f64, z: u8) -> Result<(f64, f64), GeometryError> {
    let (lon, lat) = GeometryError::check_finite(lon, lat)?;
    let world = f64::from(tiles_at(z)) * TILE_EXTENT;
    let lat_rad = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();

    let x = (lon + 180.0) / 360.0 * world;
    let y = (1.0 - lat_rad.tan().asinh() / PI) / 2.0 * world;
    Ok((x, y))
}

/// Tiles at zoom `z` whose box, expanded by `buffer` pixels, touches the
/// bounding box of `geometry`
pub fn tiles_covering(
    geometry: &Geometry<f64>,
    z: u8,
    buffer: f64,
) -> Result<Vec<TileCoord>, GeometryError> {
    let Some(rect) = geometry.bounding_rect() else {
        return Ok(Vec::new());
    };
    // Northern edge has the smaller pixel y
    let (min_px, min_py) = world_pixel(rect.min().x, rect.max().y, z)?;
    let (max_px, max_py) = world_pixel(rect.max().x, rect.min().y, z)?;

    let last = f64::from(tiles_at(z) - 1);
    let tile_index = |px: f64| (px / TILE_EXTENT).floor().clamp(0.0, last) as u32;

    let (x0, x1) = (tile_index(min_px - buffer), tile_index(max_px + buffer));
    let (y0, y1) = (tile_index(min_py - buffer), tile_index(max_py + buffer));

    let mut tiles = Vec::with_capacity(tile_count(x0..=x1, y0..=y1));
    for x in x0..=x1 {
        for y in y0..=y1 {
            tiles.push(TileCoord { z, x, y });
        }
    }
    Ok(tiles)
}

/// Number of tiles in a column/row range, saturating instead of overflowing
fn tile_count(xs: RangeInclusive<u32>, ys: RangeInclusive<u32>) -> usize {
    let span = |r: RangeInclusive<u32>| {
        (*r.end() as usize)
            .saturating_sub(*r.start() as usize)
            .saturating_add(1)
    };
    span(xs).saturating_mul(span(ys))
}
