//! # Country default resolution
//!
//! Many roads (especially links) carry only the implicit "country default" marker.
//! The resolver walks the road graph from such a road, looking for a connected road
//! with an explicit speed which can be transferred.
//!
//! The search is tried first against the direction of travel
//! (ingoing edges at the start of the road), then with it (outgoing edges at the end of the road).
//! In each direction, it may pass through a bounded number of other implicit roads
//! of the same category, always continuing from the far end of the road it just entered.
//!
//! All lookups go against an immutable snapshot of the parsed records,
//! so the outcome for one road never depends on whether another was resolved first.

use crate::RoadCategory;
use crate::config::MaxspeedsConfig;
use crate::road_graph::{RoadGraph, Segment};
use crate::speed::{Maxspeed, MaxspeedType, SpeedInUnits};
use crate::speed_macro::SpeedCatalogue;
use std::collections::HashMap;
use tracing::trace;

/// The outcome of resolving a single road.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedSpeed {
    /// The road has no record, or its record already has an explicit forward value.
    NotNeeded,
    /// A speed was inherited from a connected road.
    Inherited {
        speed: SpeedInUnits,
        from_feature_id: u32,
    },
    /// The road's own category is unknown, so nothing can be inherited.
    UnknownCategory,
    /// No suitable road was found in either direction.
    Unresolved,
}

pub struct SpeedResolver<'a, G: RoadGraph> {
    graph: &'a G,
    maxspeeds: &'a HashMap<u32, Maxspeed>,
    catalogue: &'a SpeedCatalogue,
    max_visited_features: usize,
    link_speed_factor: f64,
}

impl<'a, G: RoadGraph> SpeedResolver<'a, G> {
    /// Creates a resolver over a snapshot of records, keyed by feature ID.
    pub fn new(
        graph: &'a G,
        maxspeeds: &'a HashMap<u32, Maxspeed>,
        catalogue: &'a SpeedCatalogue,
        config: &MaxspeedsConfig,
    ) -> Self {
        Self {
            graph,
            maxspeeds,
            catalogue,
            max_visited_features: config.max_visited_features,
            link_speed_factor: config.link_speed_factor,
        }
    }

    /// Resolves the forward speed of a road carrying the country default marker.
    pub fn resolve(&self, feature_id: u32) -> ResolvedSpeed {
        let Some(record) = self.maxspeeds.get(&feature_id) else {
            return ResolvedSpeed::NotNeeded;
        };
        if !record.is_country_default() {
            return ResolvedSpeed::NotNeeded;
        }
        let Some(category) = self.graph.category(feature_id) else {
            return ResolvedSpeed::UnknownCategory;
        };

        let first = Segment::new(feature_id, 0, true);
        let last = self.graph.opposite_end(first);

        [(first, false), (last, true)]
            .into_iter()
            .find_map(|(start, is_outgoing)| self.search(category, start, is_outgoing))
            .map_or(ResolvedSpeed::Unresolved, |(speed, from_feature_id)| {
                ResolvedSpeed::Inherited {
                    speed,
                    from_feature_id,
                }
            })
    }

    /// Walks the graph in one direction.
    ///
    /// Returns the inherited speed and the feature it came from.
    fn search(
        &self,
        category: RoadCategory,
        start: Segment,
        is_outgoing: bool,
    ) -> Option<(SpeedInUnits, u32)> {
        let mut visited: Vec<u32> = Vec::new();
        let mut current = start;

        loop {
            trace!(?current, is_outgoing, "Searching for a speed to inherit");
            if !visited.contains(&current.feature_id) {
                visited.push(current.feature_id);
            }

            let mut next = None;
            for target in self.graph.edges(current, is_outgoing) {
                let Some(record) = self.maxspeeds.get(&target.feature_id) else {
                    continue;
                };

                if record.forward_in_units().is_numeric() {
                    if let Some(speed) = self.transfer(record, target.feature_id, category) {
                        return Some((speed, target.feature_id));
                    }
                } else if record.is_country_default()
                    && visited.len() < self.max_visited_features
                    && !visited.contains(&target.feature_id)
                    && self.graph.category(target.feature_id) == Some(category)
                {
                    // The last candidate seen wins
                    next = Some(self.graph.opposite_end(target));
                }
            }

            current = next?;
        }
    }

    /// Computes the speed a road of `category` inherits from an adjacent road.
    fn transfer(
        &self,
        source: &Maxspeed,
        source_feature_id: u32,
        category: RoadCategory,
    ) -> Option<SpeedInUnits> {
        let source_category = self.graph.category(source_feature_id)?;

        if source_category == category {
            Some(source.forward_in_units())
        } else if RoadCategory::is_main_to_link(source_category, category) {
            let scaled = (f64::from(source.forward()) * self.link_speed_factor)
                .round()
                .clamp(0.0, f64::from(MaxspeedType::MAX));
            #[allow(
                clippy::cast_possible_truncation,
                clippy::cast_sign_loss,
                reason = "The value is rounded and clamped to the range of MaxspeedType"
            )]
            let scaled = scaled as MaxspeedType;
            self.catalogue
                .closest_valid(SpeedInUnits::new(scaled, source.units()))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::road_graph::{
        GeometryType, InMemoryRoadGraph, RoadDescription, RoadGraphDescription,
    };
    use crate::speed::{COMMON_MAXSPEED_VALUE, Units};
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn road(feature_id: u32, category: RoadCategory) -> RoadDescription {
        RoadDescription {
            feature_id,
            category: Some(category),
            length_m: 500.0,
            in_city: false,
            points_count: 2,
            one_way: false,
            car_road: true,
            geometry: GeometryType::Line,
        }
    }

    fn graph(roads: Vec<RoadDescription>, joints: Vec<Vec<(u32, u32)>>) -> InMemoryRoadGraph {
        InMemoryRoadGraph::new(RoadGraphDescription { roads, joints }).expect("Valid graph")
    }

    fn kmh(speed: MaxspeedType) -> Maxspeed {
        Maxspeed::new(Units::Metric, speed, None)
    }

    fn resolve(
        graph: &InMemoryRoadGraph,
        maxspeeds: &HashMap<u32, Maxspeed>,
        feature_id: u32,
    ) -> ResolvedSpeed {
        let config = MaxspeedsConfig::default();
        SpeedResolver::new(graph, maxspeeds, SpeedCatalogue::standard(), &config)
            .resolve(feature_id)
    }

    #[test]
    fn test_link_inherits_scaled_main_speed() {
        // Motorway (0) ends where the link (1) starts
        let graph = graph(
            vec![road(0, RoadCategory::Motorway), road(1, RoadCategory::MotorwayLink)],
            vec![vec![(0, 1), (1, 0)]],
        );
        let maxspeeds = HashMap::from([(0, kmh(120)), (1, kmh(COMMON_MAXSPEED_VALUE))]);

        let expected = SpeedCatalogue::standard()
            .closest_valid(SpeedInUnits::new(102, Units::Metric))
            .expect("Metric speeds are catalogued");
        assert_eq!(
            resolve(&graph, &maxspeeds, 1),
            ResolvedSpeed::Inherited {
                speed: expected,
                from_feature_id: 0
            }
        );
    }

    #[test]
    fn test_same_category_copies_speed_and_units() {
        let graph = graph(
            vec![road(0, RoadCategory::Primary), road(1, RoadCategory::Primary)],
            vec![vec![(1, 1), (0, 0)]],
        );
        let maxspeeds = HashMap::from([
            (0, Maxspeed::new(Units::Imperial, 45, None)),
            (1, kmh(COMMON_MAXSPEED_VALUE)),
        ]);

        // Only reachable through the outgoing edges at the end of road 1
        assert_eq!(
            resolve(&graph, &maxspeeds, 1),
            ResolvedSpeed::Inherited {
                speed: SpeedInUnits::new(45, Units::Imperial),
                from_feature_id: 0
            }
        );
    }

    #[test]
    fn test_unrelated_categories_do_not_transfer() {
        let graph = graph(
            vec![road(0, RoadCategory::Trunk), road(1, RoadCategory::MotorwayLink)],
            vec![vec![(0, 1), (1, 0)]],
        );
        let maxspeeds = HashMap::from([(0, kmh(100)), (1, kmh(COMMON_MAXSPEED_VALUE))]);

        assert_eq!(resolve(&graph, &maxspeeds, 1), ResolvedSpeed::Unresolved);
    }

    #[test]
    fn test_walks_through_implicit_links() {
        // Motorway (0) -> link (1) -> link (2) -> link (3)
        let graph = graph(
            vec![
                road(0, RoadCategory::Motorway),
                road(1, RoadCategory::MotorwayLink),
                road(2, RoadCategory::MotorwayLink),
                road(3, RoadCategory::MotorwayLink),
            ],
            vec![
                vec![(0, 1), (1, 0)],
                vec![(1, 1), (2, 0)],
                vec![(2, 1), (3, 0)],
            ],
        );
        let maxspeeds = HashMap::from([
            (0, kmh(100)),
            (1, kmh(COMMON_MAXSPEED_VALUE)),
            (2, kmh(COMMON_MAXSPEED_VALUE)),
            (3, kmh(COMMON_MAXSPEED_VALUE)),
        ]);

        let expected = SpeedInUnits::new(85, Units::Metric);
        for feature_id in 1..=3 {
            assert_eq!(
                resolve(&graph, &maxspeeds, feature_id),
                ResolvedSpeed::Inherited {
                    speed: expected,
                    from_feature_id: 0
                }
            );
        }
    }

    #[test]
    fn test_walk_is_bounded() {
        // Motorway (0) followed by a chain of five links
        let mut roads = vec![road(0, RoadCategory::Motorway)];
        let mut joints = vec![vec![(0, 1), (1, 0)]];
        let mut maxspeeds = HashMap::from([(0, kmh(100))]);
        for feature_id in 1..=5 {
            roads.push(road(feature_id, RoadCategory::MotorwayLink));
            maxspeeds.insert(feature_id, kmh(COMMON_MAXSPEED_VALUE));
            if feature_id < 5 {
                joints.push(vec![(feature_id, 1), (feature_id + 1, 0)]);
            }
        }
        let graph = graph(roads, joints);

        // Four roads (including itself) away from the motorway is still fine
        assert!(matches!(
            resolve(&graph, &maxspeeds, 4),
            ResolvedSpeed::Inherited { .. }
        ));
        assert_eq!(resolve(&graph, &maxspeeds, 5), ResolvedSpeed::Unresolved);
    }

    #[test]
    fn test_explicit_and_missing_records() {
        let graph = graph(vec![road(0, RoadCategory::Primary)], vec![]);
        let maxspeeds = HashMap::from([(0, kmh(50))]);

        assert_eq!(resolve(&graph, &maxspeeds, 0), ResolvedSpeed::NotNeeded);
        assert_eq!(resolve(&graph, &maxspeeds, 1), ResolvedSpeed::NotNeeded);
    }

    #[test]
    fn test_unknown_category() {
        let mut unknown = road(0, RoadCategory::Primary);
        unknown.category = None;
        let graph = graph(vec![unknown], vec![]);
        let maxspeeds = HashMap::from([(0, kmh(COMMON_MAXSPEED_VALUE))]);

        assert_eq!(resolve(&graph, &maxspeeds, 0), ResolvedSpeed::UnknownCategory);
    }

    #[test]
    fn test_first_accepted_edge_wins() {
        let maxspeeds = HashMap::from([
            (0, kmh(100)),
            (1, kmh(COMMON_MAXSPEED_VALUE)),
            (2, kmh(120)),
        ]);
        let roads = || {
            vec![
                road(0, RoadCategory::Motorway),
                road(1, RoadCategory::MotorwayLink),
                road(2, RoadCategory::Motorway),
            ]
        };

        // Both motorways end where the link starts; joint partners are enumerated in order
        let graph_0_first = graph(roads(), vec![vec![(0, 1), (2, 1), (1, 0)]]);
        assert_eq!(
            resolve(&graph_0_first, &maxspeeds, 1),
            ResolvedSpeed::Inherited {
                speed: SpeedInUnits::new(85, Units::Metric),
                from_feature_id: 0
            }
        );

        let graph_2_first = graph(roads(), vec![vec![(2, 1), (0, 1), (1, 0)]]);
        let expected = SpeedCatalogue::standard()
            .closest_valid(SpeedInUnits::new(102, Units::Metric))
            .expect("Metric speeds are catalogued");
        assert_eq!(
            resolve(&graph_2_first, &maxspeeds, 1),
            ResolvedSpeed::Inherited {
                speed: expected,
                from_feature_id: 2
            }
        );
    }

    #[test]
    fn test_last_continuation_candidate_wins() {
        // Links 2 and 3 both end where link 1 starts.
        // Only link 3 is preceded by the motorway (0).
        let maxspeeds = HashMap::from([
            (0, kmh(100)),
            (1, kmh(COMMON_MAXSPEED_VALUE)),
            (2, kmh(COMMON_MAXSPEED_VALUE)),
            (3, kmh(COMMON_MAXSPEED_VALUE)),
        ]);
        let roads = || {
            vec![
                road(0, RoadCategory::Motorway),
                road(1, RoadCategory::MotorwayLink),
                road(2, RoadCategory::MotorwayLink),
                road(3, RoadCategory::MotorwayLink),
            ]
        };

        let graph_3_last = graph(
            roads(),
            vec![vec![(2, 1), (3, 1), (1, 0)], vec![(0, 1), (3, 0)]],
        );
        assert_eq!(
            resolve(&graph_3_last, &maxspeeds, 1),
            ResolvedSpeed::Inherited {
                speed: SpeedInUnits::new(85, Units::Metric),
                from_feature_id: 0
            }
        );

        // Link 2 is a dead end, and link 1 has nothing after it
        let graph_2_last = graph(
            roads(),
            vec![vec![(3, 1), (2, 1), (1, 0)], vec![(0, 1), (3, 0)]],
        );
        assert_eq!(resolve(&graph_2_last, &maxspeeds, 1), ResolvedSpeed::Unresolved);
    }

    #[test]
    fn test_walks_along_outgoing_edges() {
        // Link (1) -> link (2) -> motorway (0), all with three points
        let roads = [
            road(0, RoadCategory::Motorway),
            road(1, RoadCategory::MotorwayLink),
            road(2, RoadCategory::MotorwayLink),
        ]
        .into_iter()
        .map(|road| RoadDescription {
            points_count: 3,
            ..road
        })
        .collect();
        let graph = graph(roads, vec![vec![(1, 2), (2, 0)], vec![(2, 2), (0, 0)]]);
        let maxspeeds = HashMap::from([
            (0, kmh(100)),
            (1, kmh(COMMON_MAXSPEED_VALUE)),
            (2, kmh(COMMON_MAXSPEED_VALUE)),
        ]);

        assert_eq!(
            resolve(&graph, &maxspeeds, 1),
            ResolvedSpeed::Inherited {
                speed: SpeedInUnits::new(85, Units::Metric),
                from_feature_id: 0
            }
        );
    }

    #[test]
    fn test_huge_visit_limit() {
        let graph = graph(vec![road(0, RoadCategory::MotorwayLink)], vec![]);
        let maxspeeds = HashMap::from([(0, kmh(COMMON_MAXSPEED_VALUE))]);
        let config = MaxspeedsConfig {
            max_visited_features: usize::MAX,
            ..MaxspeedsConfig::default()
        };

        let resolver = SpeedResolver::new(&graph, &maxspeeds, SpeedCatalogue::standard(), &config);
        assert_eq!(resolver.resolve(0), ResolvedSpeed::Unresolved);
    }

    /// Counts the edge queries made against the wrapped graph.
    struct CountingGraph {
        inner: InMemoryRoadGraph,
        queries: AtomicUsize,
    }

    impl RoadGraph for CountingGraph {
        fn category(&self, feature_id: u32) -> Option<RoadCategory> {
            self.inner.category(feature_id)
        }

        fn road_length_m(&self, feature_id: u32) -> f64 {
            self.inner.road_length_m(feature_id)
        }

        fn is_in_city(&self, feature_id: u32) -> bool {
            self.inner.is_in_city(feature_id)
        }

        fn edges(&self, segment: Segment, is_outgoing: bool) -> Vec<Segment> {
            self.queries.fetch_add(1, Ordering::Relaxed);
            self.inner.edges(segment, is_outgoing)
        }

        fn points_count(&self, feature_id: u32) -> u32 {
            self.inner.points_count(feature_id)
        }
    }

    const ROAD_COUNT: u32 = 6;

    proptest! {
        #[test]
        fn walk_terminates_on_arbitrary_graphs(
            joints in prop::collection::vec(
                prop::collection::vec((0..ROAD_COUNT, 0..2u32), 2..4),
                0..12,
            ),
            speeds in prop::collection::vec(
                prop::option::weighted(0.2, 10u16..150),
                ROAD_COUNT as usize,
            ),
        ) {
            let roads = (0..ROAD_COUNT)
                .map(|feature_id| {
                    let category = if feature_id == 0 {
                        RoadCategory::Motorway
                    } else {
                        RoadCategory::MotorwayLink
                    };
                    road(feature_id, category)
                })
                .collect();
            let graph = CountingGraph {
                inner: graph(roads, joints),
                queries: AtomicUsize::new(0),
            };
            let maxspeeds: HashMap<u32, Maxspeed> = speeds
                .into_iter()
                .zip(0..)
                .map(|(speed, feature_id)| {
                    (feature_id, kmh(speed.unwrap_or(COMMON_MAXSPEED_VALUE)))
                })
                .collect();
            let config = MaxspeedsConfig::default();
            let resolver =
                SpeedResolver::new(&graph, &maxspeeds, SpeedCatalogue::standard(), &config);

            for feature_id in 0..ROAD_COUNT {
                graph.queries.store(0, Ordering::Relaxed);
                resolver.resolve(feature_id);
                let queries = graph.queries.load(Ordering::Relaxed);
                prop_assert!(queries <= 2 * config.max_visited_features);
            }
        }
    }
}
