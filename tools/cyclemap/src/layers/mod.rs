//! Layer interfaces between the tile pipeline and layer implementations
//!
//! Relation preprocessing, feature processing and post-processing are
//! separate traits. A layer implements only the ones it needs and the
//! pipeline composes them.

pub mod cycling;
pub mod cycling_poi;

pub use cycling::{CyclingInfraLayer, CyclingMergePostProcessor, LineRule, LINE_RULES};
pub use cycling_poi::CyclingPoiLayer;

use cyclemap_common::GeometryError;

use crate::feature::{ClassifiedFeature, SourceFeature};
use crate::relations::{OsmRelation, RelationInfo};

/// Highest zoom level tiles are generated for
pub const MAX_ZOOM: u8 = 14;

/// Turns a relation into the metadata kept for member features
pub trait RelationPreprocessor: Send + Sync {
    fn preprocess_relation(&self, relation: &OsmRelation) -> Option<RelationInfo>;
}

/// Classifies one source feature.
///
/// `memberships` holds the route relations the feature belongs to, already
/// resolved by the caller. Must be pure: no shared mutable state.
pub trait FeatureProcessor: Send + Sync {
    fn layer_name(&self) -> &'static str;

    fn process_feature(
        &self,
        feature: &SourceFeature,
        memberships: &[&RelationInfo],
    ) -> Vec<ClassifiedFeature>;
}

/// Rewrites all features of one layer in one tile at one zoom level
pub trait FeaturePostProcessor: Send + Sync {
    fn layer_name(&self) -> &'static str;

    fn post_process(
        &self,
        zoom: u8,
        features: Vec<ClassifiedFeature>,
    ) -> Result<Vec<ClassifiedFeature>, GeometryError>;
}
