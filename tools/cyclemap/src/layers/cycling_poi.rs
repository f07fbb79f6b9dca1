//! Cycling points of interest: drinking water, repair stations, bike share
//!
//! Unlike the line layer the checks here are independent, so one element
//! tagged for several amenities yields one point per match.

use geo::Geometry;

use crate::feature::{ClassifiedFeature, SourceFeature};
use crate::layers::FeatureProcessor;
use crate::relations::RelationInfo;

pub const LAYER_NAME: &str = "cycling_poi";

/// Output attribute name → source tag key for repair stations
const REPAIR_STATION_ATTRS: [(&str, &str); 7] = [
    ("pump", "service:bicycle:pump"),
    ("chain_tool", "service:bicycle:chain_tool"),
    ("tools", "service:bicycle:tools"),
    ("stand", "service:bicycle:stand"),
    ("operator", "operator"),
    ("brand", "brand"),
    ("opening_hours", "opening_hours"),
];

/// Extra attributes and gates attached to a POI rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PoiExtra {
    None,
    RepairStation,
    BikeShare,
}

/// One independent point check keyed on the `amenity` tag
#[derive(Debug, Clone, Copy)]
struct PoiRule {
    amenity: &'static str,
    class: &'static str,
    min_zoom: u8,
    extra: PoiExtra,
}

const POI_RULES: [PoiRule; 3] = [
    PoiRule {
        amenity: "drinking_water",
        class: "drinking_water",
        min_zoom: 14,
        extra: PoiExtra::None,
    },
    PoiRule {
        amenity: "bicycle_repair_station",
        class: "bicycle_repair_station",
        min_zoom: 13,
        extra: PoiExtra::RepairStation,
    },
    PoiRule {
        amenity: "bicycle_rental",
        class: "bicycle_rental",
        min_zoom: 13,
        extra: PoiExtra::BikeShare,
    },
];

#[derive(Debug, Clone)]
pub struct CyclingPoiLayer {
    /// `network` values accepted for rental stations, compared ignoring case
    bike_share_networks: Vec<String>,
    /// Value written to the `network` attribute of rental outputs
    rental_network: String,
}

impl Default for CyclingPoiLayer {
    fn default() -> Self {
        Self::new(vec!["bubi".to_string()], "bubi")
    }
}

impl CyclingPoiLayer {
    pub fn new(bike_share_networks: Vec<String>, rental_network: &str) -> Self {
        Self {
            bike_share_networks,
            rental_network: rental_network.to_string(),
        }
    }

    fn is_bike_share(&self, network: Option<&str>) -> bool {
        network.is_some_and(|network| {
            self.bike_share_networks
                .iter()
                .any(|brand| brand.eq_ignore_ascii_case(network))
        })
    }

    pub fn classify_point(&self, feature: &SourceFeature) -> Vec<ClassifiedFeature> {
        self.classify_with(feature, &POI_RULES)
    }

    /// Every rule is checked; each match emits its own point.
    fn classify_with(&self, feature: &SourceFeature, rules: &[PoiRule]) -> Vec<ClassifiedFeature> {
        let tags = &feature.tags;
        let Some(point) = feature.centroid_if_convex() else {
            return Vec::new();
        };

        rules
            .iter()
            .filter(|rule| tags.has_tag("amenity", rule.amenity))
            .filter_map(|rule| {
                let poi = ClassifiedFeature::new(LAYER_NAME, Geometry::Point(point))
                    .with_min_zoom(rule.min_zoom)
                    .with_min_pixel_size(0.0)
                    .with_attr("class", Some(rule.class));
                match rule.extra {
                    PoiExtra::None => Some(poi),
                    PoiExtra::RepairStation => Some(
                        REPAIR_STATION_ATTRS
                            .iter()
                            .fold(poi, |f, (attr, key)| f.with_attr(attr, tags.get(key))),
                    ),
                    PoiExtra::BikeShare => self.is_bike_share(tags.get("network")).then(|| {
                        poi.with_attr("network", Some(self.rental_network.as_str()))
                            .with_attr("capacity", tags.get("capacity"))
                    }),
                }
            })
            .collect()
    }
}

impl FeatureProcessor for CyclingPoiLayer {
    fn layer_name(&self) -> &'static str {
        LAYER_NAME
    }

    fn process_feature(
        &self,
        feature: &SourceFeature,
        _memberships: &[&RelationInfo],
    ) -> Vec<ClassifiedFeature> {
        self.classify_point(feature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::Tags;

    fn node(tags: &[(&str, &str)]) -> SourceFeature {
        SourceFeature::node(1, tags.iter().copied().collect::<Tags>(), 19.0402, 47.4979)
    }

    #[test]
    fn test_drinking_water() {
        let out = CyclingPoiLayer::default().classify_point(&node(&[("amenity", "drinking_water")]));

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].layer, "cycling_poi");
        assert_eq!(out[0].attr("class"), Some("drinking_water"));
        assert_eq!(out[0].min_zoom, 14);
        assert_eq!(out[0].geometry, Geometry::Point(geo::Point::new(19.0402, 47.4979)));
    }

    #[test]
    fn test_repair_station_with_pump() {
        let out = CyclingPoiLayer::default().classify_point(&node(&[
            ("amenity", "bicycle_repair_station"),
            ("service:bicycle:pump", "yes"),
            ("operator", "BKK"),
        ]));

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].min_zoom, 13);
        assert_eq!(out[0].attr("pump"), Some("yes"));
        assert_eq!(out[0].attr("operator"), Some("BKK"));
        assert_eq!(out[0].attrs.len(), 3);
    }

    #[test]
    fn test_repair_station_omits_absent_pump() {
        let out = CyclingPoiLayer::default()
            .classify_point(&node(&[("amenity", "bicycle_repair_station")]));

        assert_eq!(out.len(), 1);
        assert!(!out[0].attrs.contains_key("pump"));
        assert!(!out[0].attrs.contains_key("chain_tool"));
    }

    #[test]
    fn test_rental_matches_network_ignoring_case() {
        let layer = CyclingPoiLayer::default();
        for network in ["bubi", "BuBi", "BUBI"] {
            let out = layer.classify_point(&node(&[
                ("amenity", "bicycle_rental"),
                ("network", network),
                ("capacity", "20"),
            ]));
            assert_eq!(out.len(), 1, "network={network}");
            assert_eq!(out[0].attr("network"), Some("bubi"));
            assert_eq!(out[0].attr("capacity"), Some("20"));
        }
    }

    #[test]
    fn test_rental_requires_known_network() {
        let layer = CyclingPoiLayer::default();
        assert!(layer
            .classify_point(&node(&[("amenity", "bicycle_rental"), ("network", "nextbike")]))
            .is_empty());
        assert!(layer
            .classify_point(&node(&[("amenity", "bicycle_rental")]))
            .is_empty());
    }

    #[test]
    fn test_configured_networks() {
        let layer = CyclingPoiLayer::new(vec!["MOL Bubi".to_string(), "nextbike".to_string()], "bubi");
        let out = layer.classify_point(&node(&[("amenity", "bicycle_rental"), ("network", "Nextbike")]));
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_each_matching_rule_emits_a_point() {
        // `amenity` holds one value, so the built-in rules never overlap;
        // two rules on the same value show that checks do not short-circuit
        let rules = [
            POI_RULES[0],
            PoiRule {
                amenity: "drinking_water",
                class: "water_refill",
                min_zoom: 12,
                extra: PoiExtra::None,
            },
            POI_RULES[1],
        ];
        let out = CyclingPoiLayer::default()
            .classify_with(&node(&[("amenity", "drinking_water")]), &rules);

        let emitted: Vec<_> = out.iter().map(|f| (f.attr("class"), f.min_zoom)).collect();
        assert_eq!(
            emitted,
            vec![(Some("drinking_water"), 14), (Some("water_refill"), 12)]
        );
        assert!(out.iter().all(|f| f.geometry == out[0].geometry));
    }

    #[test]
    fn test_unrelated_node() {
        assert!(CyclingPoiLayer::default()
            .classify_point(&node(&[("amenity", "bench")]))
            .is_empty());
    }

    #[test]
    fn test_convex_area_uses_centroid() {
        let tags: Tags = [("amenity", "drinking_water")].into_iter().collect();
        let area = SourceFeature::way(
            9,
            tags,
            vec![(0.0, 0.0), (2.0, 0.0), (2.0, 2.0), (0.0, 2.0), (0.0, 0.0)],
        );

        let out = CyclingPoiLayer::default().classify_point(&area);
        assert_eq!(out[0].geometry, Geometry::Point(geo::Point::new(1.0, 1.0)));
    }
}
