//! Line merging for tile post-processing
//!
//! Works on geometries already projected into tile-pixel space, where a
//! tile spans `0..TILE_EXTENT` on both axes. Features sharing a layer and
//! attribute set are concatenated end to end, pruned by length,
//! simplified and clipped to the buffered tile box.
//!
//! Merging follows the usual line-merger rule: two lines are joined only
//! at a node where exactly two line ends meet. Junctions of three or more
//! lines stay split.

use cyclemap_common::GeometryError;
use geo::{Coord, Geometry, LineString, MultiLineString, Simplify};
use rustc_hash::FxHashMap;

use crate::feature::{Attrs, ClassifiedFeature};

/// Width and height of a tile in rendering pixels
pub const TILE_EXTENT: f64 = 256.0;

/// Parameters for [`merge_line_strings`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergeParams {
    /// Merged lines shorter than this many pixels are dropped
    pub min_length: f64,
    /// Simplification tolerance in pixels; `None` disables simplification
    pub tolerance: Option<f64>,
    /// Clip this many pixels outside the tile box; `None` disables clipping
    pub buffer: Option<f64>,
    /// Re-run simplification on merged output even for single-feature groups
    pub resimplify: bool,
}

impl MergeParams {
    /// True when a lone feature would come out of the merge unchanged
    fn is_passthrough(&self) -> bool {
        self.min_length == 0.0 && self.buffer.is_none() && !self.resimplify
    }
}

/// Merge, prune, simplify and clip line features.
///
/// Non-line features are returned unchanged ahead of the merged lines.
/// Each (layer, attributes) group yields at most one feature with a
/// `MultiLineString` geometry, in first-seen group order.
pub fn merge_line_strings(
    features: Vec<ClassifiedFeature>,
    params: &MergeParams,
) -> Result<Vec<ClassifiedFeature>, GeometryError> {
    let mut result = Vec::new();
    let mut groups: Vec<Vec<ClassifiedFeature>> = Vec::new();
    let mut group_index: FxHashMap<(String, Attrs), usize> = FxHashMap::default();

    for feature in features {
        if !feature.is_line() {
            result.push(feature);
            continue;
        }
        let key = (feature.layer.clone(), feature.attrs.clone());
        match group_index.get(&key) {
            Some(&i) => groups[i].push(feature),
            None => {
                group_index.insert(key, groups.len());
                groups.push(vec![feature]);
            }
        }
    }

    for mut group in groups {
        if group.len() == 1 && params.is_passthrough() {
            result.extend(group.pop());
            continue;
        }

        let mut parts = Vec::new();
        for feature in &group {
            collect_lines(&feature.geometry, &mut parts)?;
        }

        let mut output = Vec::new();
        for line in merge_lines(parts) {
            if line_length(&line) < params.min_length {
                continue;
            }
            let line = match params.tolerance {
                Some(tolerance) if line.0.len() > 2 => line.simplify(&tolerance),
                _ => line,
            };
            match params.buffer {
                Some(buffer) => clip_to_tile(&line, buffer, &mut output),
                None => output.push(line),
            }
        }

        if !output.is_empty() {
            result.push(group[0].with_geometry(Geometry::MultiLineString(MultiLineString::new(output))));
        }
    }

    Ok(result)
}

/// Sum of segment lengths in the geometry's own units
pub fn line_length(line: &LineString<f64>) -> f64 {
    line.lines().map(|l| l.dx().hypot(l.dy())).sum()
}

fn validate_line(line: &LineString<f64>) -> Result<(), GeometryError> {
    if line.0.len() < 2 {
        return Err(GeometryError::TooFewPoints { points: line.0.len() });
    }
    for c in &line.0 {
        GeometryError::check_finite(c.x, c.y)?;
    }
    Ok(())
}

fn collect_lines(
    geometry: &Geometry<f64>,
    out: &mut Vec<LineString<f64>>,
) -> Result<(), GeometryError> {
    match geometry {
        Geometry::LineString(line) => {
            validate_line(line)?;
            out.push(line.clone());
        }
        Geometry::MultiLineString(lines) => {
            for line in &lines.0 {
                validate_line(line)?;
                out.push(line.clone());
            }
        }
        _ => return Err(GeometryError::UnsupportedGeometry("non-line geometry in line merge")),
    }
    Ok(())
}

type NodeKey = (u64, u64);

// Adding 0.0 folds -0.0 into 0.0 so both hash the same.
fn node_key(c: Coord<f64>) -> NodeKey {
    ((c.x + 0.0).to_bits(), (c.y + 0.0).to_bits())
}

fn first(line: &LineString<f64>) -> Coord<f64> {
    line.0[0]
}

fn last(line: &LineString<f64>) -> Coord<f64> {
    line.0[line.0.len() - 1]
}

/// Join lines end to end through degree-2 nodes
fn merge_lines(lines: Vec<LineString<f64>>) -> Vec<LineString<f64>> {
    let mut ends: FxHashMap<NodeKey, Vec<usize>> = FxHashMap::default();
    for (i, line) in lines.iter().enumerate() {
        ends.entry(node_key(first(line))).or_default().push(i);
        ends.entry(node_key(last(line))).or_default().push(i);
    }
    let degree = |c: Coord<f64>| ends.get(&node_key(c)).map_or(0, Vec::len);

    let mut used = vec![false; lines.len()];
    let mut merged = Vec::new();

    // Open chains start at a line end that is not a pass-through node
    for i in 0..lines.len() {
        if used[i] {
            continue;
        }
        let start_reversed = if degree(first(&lines[i])) != 2 {
            Some(false)
        } else if degree(last(&lines[i])) != 2 {
            Some(true)
        } else {
            None
        };
        if let Some(reversed) = start_reversed {
            merged.push(walk_chain(i, reversed, &lines, &ends, &mut used));
        }
    }

    // Whatever is left forms closed chains
    for i in 0..lines.len() {
        if !used[i] {
            merged.push(walk_chain(i, false, &lines, &ends, &mut used));
        }
    }

    merged
}

fn walk_chain(
    start: usize,
    reversed: bool,
    lines: &[LineString<f64>],
    ends: &FxHashMap<NodeKey, Vec<usize>>,
    used: &mut [bool],
) -> LineString<f64> {
    used[start] = true;
    let mut coords: Vec<Coord<f64>> = lines[start].0.clone();
    if reversed {
        coords.reverse();
    }

    loop {
        let tail = coords[coords.len() - 1];
        let key = node_key(tail);
        let Some(at_node) = ends.get(&key) else {
            break;
        };
        if at_node.len() != 2 {
            break;
        }
        let Some(next) = at_node.iter().copied().find(|&j| !used[j]) else {
            break;
        };
        used[next] = true;

        let line = &lines[next];
        if node_key(first(line)) == key {
            coords.extend(line.0.iter().skip(1));
        } else {
            coords.extend(line.0.iter().rev().skip(1));
        }
    }

    LineString::new(coords)
}

/// Clip `line` to the tile box grown by `buffer` pixels on each side.
/// A line leaving and re-entering the box produces several parts.
fn clip_to_tile(line: &LineString<f64>, buffer: f64, out: &mut Vec<LineString<f64>>) {
    let min = -buffer;
    let max = TILE_EXTENT + buffer;
    let mut current: Vec<Coord<f64>> = Vec::new();

    fn flush(current: &mut Vec<Coord<f64>>, out: &mut Vec<LineString<f64>>) {
        if current.len() >= 2 {
            out.push(LineString::new(std::mem::take(current)));
        } else {
            current.clear();
        }
    }

    for segment in line.lines() {
        let (p0, p1) = (segment.start, segment.end);
        let Some((t0, t1)) = clip_segment(p0, p1, min, max) else {
            flush(&mut current, out);
            continue;
        };
        let entry = if t0 == 0.0 { p0 } else { lerp(p0, p1, t0) };
        let exit = if t1 == 1.0 { p1 } else { lerp(p0, p1, t1) };

        if t0 > 0.0 {
            flush(&mut current, out);
        }
        if current.last() != Some(&entry) {
            current.push(entry);
        }
        if current.last() != Some(&exit) {
            current.push(exit);
        }
        if t1 < 1.0 {
            flush(&mut current, out);
        }
    }
    flush(&mut current, out);
}

fn lerp(p0: Coord<f64>, p1: Coord<f64>, t: f64) -> Coord<f64> {
    Coord {
        x: p0.x + t * (p1.x - p0.x),
        y: p0.y + t * (p1.y - p0.y),
    }
}

/// Liang–Barsky: parametric range of the segment inside `[min, max]²`
fn clip_segment(p0: Coord<f64>, p1: Coord<f64>, min: f64, max: f64) -> Option<(f64, f64)> {
    let dx = p1.x - p0.x;
    let dy = p1.y - p0.y;
    let mut t0 = 0.0_f64;
    let mut t1 = 1.0_f64;

    for (p, q) in [
        (-dx, p0.x - min),
        (dx, max - p0.x),
        (-dy, p0.y - min),
        (dy, max - p0.y),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }

    Some((t0, t1))
}
