//! Bicycle route relations
//!
//! Relations are read once, before any feature is classified. Only
//! `type=route` + `route=bicycle` relations are kept, and only the three
//! fields in [`RelationInfo`], since this index lives in RAM for the
//! whole run.

use std::collections::HashMap;

use crate::layers::RelationPreprocessor;
use crate::tags::Tags;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Node,
    Way,
    Relation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub role: String,
    pub kind: MemberKind,
    pub ref_id: i64,
}

/// A relation as handed over by the ingestion pipeline
#[derive(Debug, Clone)]
pub struct OsmRelation {
    pub id: i64,
    pub members: Vec<Member>,
    pub tags: Tags,
}

/// Minimal metadata kept for a bicycle route relation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationInfo {
    pub id: i64,
    pub name: Option<String>,
    pub r#ref: Option<String>,
}

/// Extracts [`RelationInfo`] from bicycle route relations
#[derive(Debug, Clone, Copy, Default)]
pub struct RouteRelationExtractor;

impl RouteRelationExtractor {
    /// `Some` iff the relation carries `type=route` and `route=bicycle`
    pub fn extract(relation: &OsmRelation) -> Option<RelationInfo> {
        if !relation.tags.has_tag("type", "route") || !relation.tags.has_tag("route", "bicycle") {
            return None;
        }
        Some(RelationInfo {
            id: relation.id,
            name: relation.tags.get("name").map(str::to_string),
            r#ref: relation.tags.get("ref").map(str::to_string),
        })
    }
}

impl RelationPreprocessor for RouteRelationExtractor {
    fn preprocess_relation(&self, relation: &OsmRelation) -> Option<RelationInfo> {
        Self::extract(relation)
    }
}

/// Mutable side of the index, filled during the relation pass
#[derive(Debug, Default)]
pub struct RouteRelationIndexBuilder {
    relations: HashMap<i64, RelationInfo>,
    way_memberships: HashMap<i64, Vec<i64>>,
}

impl RouteRelationIndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `preprocessor` on one relation and record it with its way members
    /// when it qualifies. Returns whether the relation was kept.
    pub fn add<P: RelationPreprocessor + ?Sized>(
        &mut self,
        preprocessor: &P,
        relation: &OsmRelation,
    ) -> bool {
        let Some(info) = preprocessor.preprocess_relation(relation) else {
            return false;
        };
        for member in &relation.members {
            if member.kind != MemberKind::Way {
                continue;
            }
            let rels = self.way_memberships.entry(member.ref_id).or_default();
            if !rels.contains(&info.id) {
                rels.push(info.id);
            }
        }
        self.relations.insert(info.id, info);
        true
    }

    /// Freeze into a read-only index. Classification only ever sees this.
    pub fn build(self) -> RouteRelationIndex {
        RouteRelationIndex {
            relations: self.relations,
            way_memberships: self.way_memberships,
        }
    }
}

/// Read-only relation index, safe to share across classification workers
#[derive(Debug, Default)]
pub struct RouteRelationIndex {
    relations: HashMap<i64, RelationInfo>,
    way_memberships: HashMap<i64, Vec<i64>>,
}

impl RouteRelationIndex {
    pub fn get(&self, relation_id: i64) -> Option<&RelationInfo> {
        self.relations.get(&relation_id)
    }

    /// Route relations the given way is a member of (possibly empty)
    pub fn memberships(&self, way_id: i64) -> Vec<&RelationInfo> {
        self.way_memberships
            .get(&way_id)
            .map(|ids| ids.iter().filter_map(|id| self.relations.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    /// Relations sorted by id, for listing
    pub fn sorted(&self) -> Vec<&RelationInfo> {
        let mut rels: Vec<_> = self.relations.values().collect();
        rels.sort_by_key(|r| r.id);
        rels
    }
}
