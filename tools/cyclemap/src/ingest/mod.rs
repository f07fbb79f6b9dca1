//! PBF ingestion
//!
//! Three sequential passes over the input: relations first, so the route
//! index is frozen before any feature exists, then nodes, then ways.

use std::path::Path;

use cyclemap_common::{Error, Result};
use log::{debug, info};
use osmpbf::{Element, ElementReader, RelMemberType};
use rustc_hash::FxHashMap;

use crate::feature::SourceFeature;
use crate::layers::RelationPreprocessor;
use crate::relations::{Member, MemberKind, OsmRelation, RouteRelationIndex, RouteRelationIndexBuilder};
use crate::tags::Tags;

/// Counters reported after ingestion
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestStats {
    pub relations_read: u64,
    pub route_relations: u64,
    pub nodes_read: u64,
    pub point_features: u64,
    pub ways_read: u64,
    pub line_features: u64,
    /// Way node references with no coordinates in the input
    pub missing_node_refs: u64,
}

/// Everything classification needs from one PBF file
#[derive(Debug)]
pub struct SourceData {
    pub relations: RouteRelationIndex,
    pub features: Vec<SourceFeature>,
    pub stats: IngestStats,
}

/// Run all passes over `path`
pub fn read_source<P: RelationPreprocessor + ?Sized>(
    path: &Path,
    preprocessor: &P,
) -> Result<SourceData> {
    let mut stats = IngestStats::default();

    info!("Pass 1/3: reading relations from {}", path.display());
    let relations = read_route_relations_with_stats(path, preprocessor, &mut stats)?;
    info!(
        "  {} of {} relations are bicycle routes",
        stats.route_relations, stats.relations_read
    );

    info!("Pass 2/3: reading nodes");
    let (coords, mut features) = read_nodes(path, &mut stats)?;
    info!(
        "  {} nodes, {} tagged",
        stats.nodes_read, stats.point_features
    );

    info!("Pass 3/3: reading ways");
    features.extend(read_ways(path, &coords, &relations, &mut stats)?);
    info!(
        "  {} ways, {} kept as line features",
        stats.ways_read, stats.line_features
    );
    if stats.missing_node_refs > 0 {
        debug!("  {} way node references had no coordinates", stats.missing_node_refs);
    }

    Ok(SourceData {
        relations,
        features,
        stats,
    })
}

/// Relation pass only: build the frozen route relation index
pub fn read_route_relations<P: RelationPreprocessor + ?Sized>(
    path: &Path,
    preprocessor: &P,
) -> Result<RouteRelationIndex> {
    read_route_relations_with_stats(path, preprocessor, &mut IngestStats::default())
}

fn open(path: &Path) -> Result<ElementReader<std::io::BufReader<std::fs::File>>> {
    ElementReader::from_path(path)
        .map_err(|e| Error::Pbf(format!("failed to open {}: {e}", path.display())))
}

fn read_route_relations_with_stats<P: RelationPreprocessor + ?Sized>(
    path: &Path,
    preprocessor: &P,
    stats: &mut IngestStats,
) -> Result<RouteRelationIndex> {
    let mut builder = RouteRelationIndexBuilder::new();

    open(path)?
        .for_each(|element| {
            if let Element::Relation(relation) = element {
                stats.relations_read += 1;
                let osm_relation = OsmRelation {
                    id: relation.id(),
                    members: relation
                        .members()
                        .map(|member| Member {
                            role: member.role().unwrap_or("").to_string(),
                            kind: member_kind(member.member_type),
                            ref_id: member.member_id,
                        })
                        .collect(),
                    tags: relation.tags().collect(),
                };
                if builder.add(preprocessor, &osm_relation) {
                    stats.route_relations += 1;
                }
            }
        })
        .map_err(|e| Error::Pbf(format!("failed to read relations: {e}")))?;

    Ok(builder.build())
}

fn member_kind(member_type: RelMemberType) -> MemberKind {
    match member_type {
        RelMemberType::Node => MemberKind::Node,
        RelMemberType::Way => MemberKind::Way,
        RelMemberType::Relation => MemberKind::Relation,
    }
}

type NodeCoords = FxHashMap<i64, (f64, f64)>;

/// Node pass: every coordinate, plus tagged nodes as point features
fn read_nodes(path: &Path, stats: &mut IngestStats) -> Result<(NodeCoords, Vec<SourceFeature>)> {
    let mut coords = NodeCoords::default();
    let mut points = Vec::new();

    let mut add_node = |id: i64, lon: f64, lat: f64, tags: Tags| {
        stats.nodes_read += 1;
        coords.insert(id, (lon, lat));
        if !tags.is_empty() {
            stats.point_features += 1;
            points.push(SourceFeature::node(id, tags, lon, lat));
        }
    };

    open(path)?
        .for_each(|element| match element {
            Element::Node(node) => add_node(node.id(), node.lon(), node.lat(), node.tags().collect()),
            Element::DenseNode(node) => {
                add_node(node.id(), node.lon(), node.lat(), node.tags().collect())
            }
            _ => {}
        })
        .map_err(|e| Error::Pbf(format!("failed to read nodes: {e}")))?;

    Ok((coords, points))
}

/// Way pass: ways with tags or route membership become line features
fn read_ways(
    path: &Path,
    coords: &NodeCoords,
    relations: &RouteRelationIndex,
    stats: &mut IngestStats,
) -> Result<Vec<SourceFeature>> {
    let mut lines = Vec::new();

    open(path)?
        .for_each(|element| {
            if let Element::Way(way) = element {
                stats.ways_read += 1;
                let tags: Tags = way.tags().collect();
                if tags.is_empty() && relations.memberships(way.id()).is_empty() {
                    return;
                }
                let (points, missing) = resolve_refs(way.refs(), coords);
                stats.missing_node_refs += missing;
                if points.len() < 2 {
                    return;
                }
                stats.line_features += 1;
                lines.push(SourceFeature::way(way.id(), tags, points));
            }
        })
        .map_err(|e| Error::Pbf(format!("failed to read ways: {e}")))?;

    Ok(lines)
}

/// Look up way node coordinates, skipping unknown ids.
/// Returns the resolved points and the number of skipped references.
fn resolve_refs(refs: impl Iterator<Item = i64>, coords: &NodeCoords) -> (Vec<(f64, f64)>, u64) {
    let mut missing = 0;
    let points = refs
        .filter_map(|id| {
            let point = coords.get(&id).copied();
            if point.is_none() {
                missing += 1;
            }
            point
        })
        .collect();
    (points, missing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relations::RouteRelationExtractor;

    #[test]
    fn test_resolve_refs_skips_missing_nodes() {
        let mut coords = NodeCoords::default();
        coords.insert(1, (19.0, 47.0));
        coords.insert(3, (19.1, 47.1));

        let (points, missing) = resolve_refs([1, 2, 3].into_iter(), &coords);
        assert_eq!(points, vec![(19.0, 47.0), (19.1, 47.1)]);
        assert_eq!(missing, 1);
    }

    #[test]
    fn test_member_kind() {
        assert_eq!(member_kind(RelMemberType::Node), MemberKind::Node);
        assert_eq!(member_kind(RelMemberType::Way), MemberKind::Way);
        assert_eq!(member_kind(RelMemberType::Relation), MemberKind::Relation);
    }

    #[test]
    fn test_missing_file_is_pbf_error() {
        let err = read_route_relations(Path::new("/nonexistent/input.osm.pbf"), &RouteRelationExtractor)
            .unwrap_err();
        assert!(matches!(err, Error::Pbf(_)));
    }
}
