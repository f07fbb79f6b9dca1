//! Cycling infrastructure layer - tag semantics for cycle lines
//!
//! Every line gets at most one class. Rules are tried in the order of
//! [`LINE_RULES`] and the first match wins, so a way tagged both as a
//! dedicated track and as a shared lane on another side is a `cycleway`.

use cyclemap_common::GeometryError;

use crate::feature::{ClassifiedFeature, SourceFeature};
use crate::layers::{FeaturePostProcessor, FeatureProcessor, MAX_ZOOM};
use crate::merge::{merge_line_strings, MergeParams};
use crate::relations::RelationInfo;
use crate::tags::Tags;

pub const LAYER_NAME: &str = "cycling";

const CYCLEWAY_KEYS: [&str; 4] = ["cycleway", "cycleway:left", "cycleway:right", "cycleway:both"];
const CYCLEWAY_SIDE_KEYS: [&str; 3] = ["cycleway:left", "cycleway:right", "cycleway:both"];

/// One entry of the ordered line classification table
pub struct LineRule {
    pub name: &'static str,
    /// Tag test; the flag is true when the way belongs to a bicycle route
    pub matches: fn(&Tags, bool) -> bool,
    pub class: &'static str,
    pub subclass: Option<&'static str>,
    /// Copy the way's `highway` value onto the output
    pub carries_highway: bool,
}

impl LineRule {
    fn apply(&self, feature: &SourceFeature) -> ClassifiedFeature {
        let tags = &feature.tags;
        let highway = if self.carries_highway { tags.get("highway") } else { None };

        ClassifiedFeature::new(LAYER_NAME, feature.geometry.clone())
            .with_attr("class", Some(self.class))
            .with_attr("subclass", self.subclass)
            .with_attr("lit", tags.get("lit"))
            .with_attr("surface", tags.get_or("cycleway:surface", "surface"))
            .with_attr("smoothness", tags.get("smoothness"))
            .with_attr("highway", highway)
            // merged in post-processing before any size filtering
            .with_min_pixel_size(0.0)
    }
}

fn is_dedicated(tags: &Tags, _on_route: bool) -> bool {
    tags.has_tag("highway", "cycleway")
        || (tags.has_tag("bicycle", "designated") && !tags.has_tag("highway", "rest_area"))
        || tags.any_key_has(&CYCLEWAY_KEYS, "track")
}

fn is_lane(tags: &Tags, _on_route: bool) -> bool {
    tags.any_key_has(&CYCLEWAY_KEYS, "lane")
}

fn is_shared(tags: &Tags, _on_route: bool) -> bool {
    tags.has_any("cycleway", &["share_busway", "shared_lane", "opposite_lane"])
        || CYCLEWAY_SIDE_KEYS
            .iter()
            .any(|key| tags.has_any(key, &["share_busway", "shared_lane"]))
}

fn is_contraflow(tags: &Tags, _on_route: bool) -> bool {
    tags.has_tag("cycleway", "opposite") || tags.has_tag("oneway:bicycle", "no")
}

fn is_on_route(_tags: &Tags, on_route: bool) -> bool {
    on_route
}

/// Line rules, highest priority first
pub static LINE_RULES: &[LineRule] = &[
    LineRule {
        name: "dedicated",
        matches: is_dedicated,
        class: "cycleway",
        subclass: None,
        carries_highway: false,
    },
    LineRule {
        name: "lane",
        matches: is_lane,
        class: "cycle_lane",
        subclass: None,
        carries_highway: true,
    },
    LineRule {
        name: "shared",
        matches: is_shared,
        class: "cycle_shared",
        subclass: None,
        carries_highway: true,
    },
    LineRule {
        name: "contraflow",
        matches: is_contraflow,
        class: "cycle_no_infra",
        subclass: Some("two_way_for_bicycle"),
        carries_highway: false,
    },
    LineRule {
        name: "route",
        matches: is_on_route,
        class: "cycle_no_infra",
        subclass: Some("cycle_route"),
        carries_highway: true,
    },
];

/// First rule matching the tags, if any
pub fn matching_rule(tags: &Tags, on_route: bool) -> Option<&'static LineRule> {
    LINE_RULES.iter().find(|rule| (rule.matches)(tags, on_route))
}

/// Classifies ways into the `cycling` line layer
#[derive(Debug, Clone, Copy, Default)]
pub struct CyclingInfraLayer;

impl CyclingInfraLayer {
    /// Only non-emptiness of `memberships` matters, not which routes they are.
    pub fn classify_line(
        feature: &SourceFeature,
        memberships: &[&RelationInfo],
    ) -> Option<ClassifiedFeature> {
        if !feature.can_be_line() {
            return None;
        }
        matching_rule(&feature.tags, !memberships.is_empty()).map(|rule| rule.apply(feature))
    }
}

impl FeatureProcessor for CyclingInfraLayer {
    fn layer_name(&self) -> &'static str {
        LAYER_NAME
    }

    fn process_feature(
        &self,
        feature: &SourceFeature,
        memberships: &[&RelationInfo],
    ) -> Vec<ClassifiedFeature> {
        Self::classify_line(feature, memberships).into_iter().collect()
    }
}

/// Merges, prunes and simplifies `cycling` lines per tile
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CyclingMergePostProcessor {
    /// Drop merged lines shorter than this (pixels)
    pub min_length: f64,
    /// Simplification tolerance below the max zoom (pixels)
    pub tolerance: f64,
    /// Detail kept outside the tile edge (pixels)
    pub buffer: f64,
}

impl Default for CyclingMergePostProcessor {
    fn default() -> Self {
        Self {
            min_length: 0.3,
            tolerance: 0.5,
            buffer: 4.0,
        }
    }
}

impl CyclingMergePostProcessor {
    /// Full detail at the highest zoom, simplified everywhere else
    pub fn params_for_zoom(&self, zoom: u8) -> MergeParams {
        MergeParams {
            min_length: self.min_length,
            tolerance: if zoom == MAX_ZOOM { None } else { Some(self.tolerance) },
            buffer: Some(self.buffer),
            resimplify: true,
        }
    }

    pub fn merge(
        &self,
        zoom: u8,
        features: Vec<ClassifiedFeature>,
    ) -> Result<Vec<ClassifiedFeature>, GeometryError> {
        merge_line_strings(features, &self.params_for_zoom(zoom))
    }
}

impl FeaturePostProcessor for CyclingMergePostProcessor {
    fn layer_name(&self) -> &'static str {
        LAYER_NAME
    }

    fn post_process(
        &self,
        zoom: u8,
        features: Vec<ClassifiedFeature>,
    ) -> Result<Vec<ClassifiedFeature>, GeometryError> {
        self.merge(zoom, features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn way(tags: &[(&str, &str)]) -> SourceFeature {
        SourceFeature::way(
            42,
            tags.iter().copied().collect(),
            vec![(19.04, 47.49), (19.05, 47.50)],
        )
    }

    fn route() -> RelationInfo {
        RelationInfo {
            id: 7,
            name: Some("Balaton kör".to_string()),
            r#ref: None,
        }
    }

    fn classify(tags: &[(&str, &str)]) -> Option<ClassifiedFeature> {
        CyclingInfraLayer::classify_line(&way(tags), &[])
    }

    #[test]
    fn test_highway_cycleway() {
        let out = classify(&[("highway", "cycleway"), ("surface", "asphalt")]).unwrap();
        assert_eq!(out.layer, "cycling");
        assert_eq!(out.attr("class"), Some("cycleway"));
        assert_eq!(out.attr("surface"), Some("asphalt"));
        assert_eq!(out.attr("highway"), None);
        assert_eq!(out.min_pixel_size, 0.0);
        assert_eq!(out.min_zoom, 0);
    }

    #[test]
    fn test_designated_except_rest_area() {
        let path = classify(&[("highway", "path"), ("bicycle", "designated")]).unwrap();
        assert_eq!(path.attr("class"), Some("cycleway"));

        assert!(classify(&[("highway", "rest_area"), ("bicycle", "designated")]).is_none());
    }

    #[test]
    fn test_closed_area_is_not_a_line() {
        let plaza = |area: &str| {
            SourceFeature::way(
                43,
                [("highway", "pedestrian"), ("area", area), ("bicycle", "designated")]
                    .into_iter()
                    .collect(),
                vec![(19.04, 47.49), (19.05, 47.49), (19.05, 47.50), (19.04, 47.49)],
            )
        };

        assert!(CyclingInfraLayer::classify_line(&plaza("yes"), &[]).is_none());
        let ring = CyclingInfraLayer::classify_line(&plaza("no"), &[]).unwrap();
        assert_eq!(ring.attr("class"), Some("cycleway"));
    }

    #[test]
    fn test_track_on_any_side() {
        for key in CYCLEWAY_KEYS {
            let out = classify(&[("highway", "primary"), (key, "track")]).unwrap();
            assert_eq!(out.attr("class"), Some("cycleway"), "{key}=track");
        }
    }

    #[test]
    fn test_dedicated_wins_over_lane() {
        let out = classify(&[
            ("highway", "cycleway"),
            ("bicycle", "designated"),
            ("cycleway", "lane"),
        ])
        .unwrap();
        assert_eq!(out.attr("class"), Some("cycleway"));
    }

    #[test]
    fn test_lane_carries_highway() {
        let out = classify(&[("highway", "secondary"), ("cycleway:right", "lane")]).unwrap();
        assert_eq!(out.attr("class"), Some("cycle_lane"));
        assert_eq!(out.attr("highway"), Some("secondary"));
        assert_eq!(out.attr("subclass"), None);
    }

    #[test]
    fn test_shared_lane_values() {
        for (key, value) in [
            ("cycleway", "share_busway"),
            ("cycleway", "shared_lane"),
            ("cycleway", "opposite_lane"),
            ("cycleway:left", "shared_lane"),
            ("cycleway:right", "share_busway"),
            ("cycleway:both", "shared_lane"),
        ] {
            let out = classify(&[("highway", "residential"), (key, value)]).unwrap();
            assert_eq!(out.attr("class"), Some("cycle_shared"), "{key}={value}");
            assert_eq!(out.attr("highway"), Some("residential"));
        }
    }

    #[test]
    fn test_opposite_lane_only_counts_on_plain_cycleway_key() {
        assert!(classify(&[("highway", "residential"), ("cycleway:left", "opposite_lane")]).is_none());
    }

    #[test]
    fn test_contraflow() {
        let opposite = classify(&[("highway", "residential"), ("cycleway", "opposite")]).unwrap();
        assert_eq!(opposite.attr("class"), Some("cycle_no_infra"));
        assert_eq!(opposite.attr("subclass"), Some("two_way_for_bicycle"));
        assert_eq!(opposite.attr("highway"), None);

        let oneway = classify(&[("highway", "residential"), ("oneway:bicycle", "no")]).unwrap();
        assert_eq!(oneway.attr("subclass"), Some("two_way_for_bicycle"));
    }

    #[test]
    fn test_route_membership() {
        let feature = way(&[("highway", "tertiary"), ("lit", "yes")]);
        let info = route();

        let out = CyclingInfraLayer::classify_line(&feature, &[&info]).unwrap();
        assert_eq!(out.attr("class"), Some("cycle_no_infra"));
        assert_eq!(out.attr("subclass"), Some("cycle_route"));
        assert_eq!(out.attr("highway"), Some("tertiary"));
        assert_eq!(out.attr("lit"), Some("yes"));

        assert!(CyclingInfraLayer::classify_line(&feature, &[]).is_none());
    }

    #[test]
    fn test_contraflow_wins_over_route() {
        let feature = way(&[("highway", "residential"), ("oneway:bicycle", "no")]);
        let info = route();

        let out = CyclingInfraLayer::classify_line(&feature, &[&info]).unwrap();
        assert_eq!(out.attr("subclass"), Some("two_way_for_bicycle"));
    }

    #[test]
    fn test_cycleway_surface_preferred() {
        let out = classify(&[
            ("highway", "primary"),
            ("cycleway", "track"),
            ("surface", "asphalt"),
            ("cycleway:surface", "paving_stones"),
            ("smoothness", "good"),
        ])
        .unwrap();
        assert_eq!(out.attr("surface"), Some("paving_stones"));
        assert_eq!(out.attr("smoothness"), Some("good"));
    }

    #[test]
    fn test_absent_tags_stay_absent() {
        let out = classify(&[("highway", "cycleway")]).unwrap();
        assert_eq!(out.attrs.len(), 1);
        assert_eq!(out.attr("class"), Some("cycleway"));
    }

    #[test]
    fn test_non_line_features_are_skipped() {
        let node = SourceFeature::node(1, [("highway", "cycleway")].into_iter().collect(), 19.0, 47.0);
        assert!(CyclingInfraLayer::classify_line(&node, &[]).is_none());

        let stub = SourceFeature::way(2, [("highway", "cycleway")].into_iter().collect(), vec![(19.0, 47.0)]);
        assert!(CyclingInfraLayer::classify_line(&stub, &[]).is_none());
    }

    #[test]
    fn test_plain_road_produces_nothing() {
        assert!(classify(&[("highway", "residential"), ("name", "Fő utca")]).is_none());
        assert!(classify(&[]).is_none());
    }

    #[test]
    fn test_rule_order() {
        let names: Vec<_> = LINE_RULES.iter().map(|r| r.name).collect();
        assert_eq!(names, ["dedicated", "lane", "shared", "contraflow", "route"]);
    }

    #[test]
    fn test_params_for_zoom() {
        let post = CyclingMergePostProcessor::default();

        let z14 = post.params_for_zoom(14);
        assert_eq!(z14.tolerance, None);
        assert_eq!(z14.min_length, 0.3);
        assert_eq!(z14.buffer, Some(4.0));

        for zoom in 0..14 {
            assert_eq!(post.params_for_zoom(zoom).tolerance, Some(0.5));
        }
    }
}
