//! # Section building pipeline
//!
//! Wires the stages together: records are matched to road features, country defaults are resolved
//! against the road graph, every record is quantized to speed macros,
//! and the accepted records feed the per-category statistics.

use crate::config::MaxspeedsConfig;
use crate::parser::{FeatureIdToWayId, WayIdToMaxspeed};
use crate::resolver::{ResolvedSpeed, SpeedResolver};
use crate::road_graph::{RoadFeature, RoadGraph};
use crate::section::{FeatureSpeed, MaxspeedsSectionBuilder, SectionBuildError};
use crate::speed::{Maxspeed, SpeedInUnits};
use crate::speed_macro::SpeedCatalogue;
use crate::statistics::{CategoryStatistics, DefaultSpeeds};
use crate::UrbanContext;
use rayon::prelude::*;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{info, warn};

/// Something noteworthy about a single road.
///
/// Anomalies never fail the build.
/// Some cause the road to be left out of the section; the rest are informational.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Anomaly {
    #[error("No connected road with a usable speed for way {way_id}")]
    Unresolved { feature_id: u32, way_id: u64 },
    #[error("Unknown road category for way {way_id}")]
    UnknownCategory { feature_id: u32, way_id: u64 },
    #[error("Undefined forward speed macro ({speed}) for way {way_id}")]
    UndefinedForwardMacro {
        feature_id: u32,
        way_id: u64,
        speed: SpeedInUnits,
    },
    #[error("Undefined backward speed macro ({speed}) for way {way_id}")]
    UndefinedBackwardMacro {
        feature_id: u32,
        way_id: u64,
        speed: SpeedInUnits,
    },
    #[error("Implausibly high speed ({maxspeed}) for way {way_id}")]
    ImplausibleSpeed {
        feature_id: u32,
        way_id: u64,
        maxspeed: Maxspeed,
    },
    #[error("Non-linear road with a speed for way {way_id}")]
    NonLinearRoad { feature_id: u32, way_id: u64 },
}

impl Anomaly {
    pub fn feature_id(&self) -> u32 {
        match self {
            Anomaly::Unresolved { feature_id, .. }
            | Anomaly::UnknownCategory { feature_id, .. }
            | Anomaly::UndefinedForwardMacro { feature_id, .. }
            | Anomaly::UndefinedBackwardMacro { feature_id, .. }
            | Anomaly::ImplausibleSpeed { feature_id, .. }
            | Anomaly::NonLinearRoad { feature_id, .. } => *feature_id,
        }
    }
}

/// What happened during a build.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    /// All anomalies.
    ///
    /// Roads filtered out as non-linear come first, then the rest in feature order.
    pub anomalies: Vec<Anomaly>,
    /// The number of country default speeds replaced by an inherited one.
    pub inherited_count: usize,
    /// The number of features stored in the section.
    pub stored_count: usize,
    /// The default speeds stored in the section.
    pub default_speeds: DefaultSpeeds,
}

/// The outcome of processing a single feature, before anything is aggregated.
struct FeatureOutcome {
    feature_id: u32,
    way_id: u64,
    /// The final record, if the feature is stored.
    accepted: Option<(Maxspeed, FeatureSpeed)>,
    inherited_from: Option<u32>,
    anomalies: Vec<Anomaly>,
}

/// Builds a maxspeeds section from annotations and a road graph.
pub struct MaxspeedsCollector<'a, G: RoadGraph> {
    graph: &'a G,
    feature_to_way: &'a FeatureIdToWayId,
    catalogue: &'a SpeedCatalogue,
    config: &'a MaxspeedsConfig,
}

impl<'a, G: RoadGraph> MaxspeedsCollector<'a, G> {
    pub fn new(
        graph: &'a G,
        feature_to_way: &'a FeatureIdToWayId,
        catalogue: &'a SpeedCatalogue,
        config: &'a MaxspeedsConfig,
    ) -> Self {
        Self {
            graph,
            feature_to_way,
            catalogue,
            config,
        }
    }

    /// Processes all features and serializes the section.
    ///
    /// Returns `None` instead of bytes when no feature ends up with a speed.
    ///
    /// # Errors
    ///
    /// Fails if the section cannot be encoded
    /// (for example, when the feature iterator yields a feature ID twice).
    pub fn collect<I>(
        &self,
        features: I,
        maxspeeds: &WayIdToMaxspeed,
    ) -> Result<(Option<Vec<u8>>, BuildReport), SectionBuildError>
    where
        I: IntoIterator<Item = RoadFeature>,
    {
        // Every feature's record as parsed, whether or not it's a car road.
        // Resolution only ever reads from this.
        let snapshot: HashMap<u32, Maxspeed> = self
            .feature_to_way
            .iter()
            .filter_map(|(feature_id, way_id)| {
                maxspeeds
                    .get(way_id)
                    .map(|maxspeed| (*feature_id, *maxspeed))
            })
            .collect();

        let mut report = BuildReport::default();
        let mut candidates = Vec::new();
        for feature in features {
            if !feature.car_road {
                continue;
            }
            let Some(way_id) = self.feature_to_way.get(&feature.feature_id).copied() else {
                continue;
            };
            let Some(maxspeed) = snapshot.get(&feature.feature_id).copied() else {
                continue;
            };
            if !feature.is_car_line() {
                let anomaly = Anomaly::NonLinearRoad {
                    feature_id: feature.feature_id,
                    way_id,
                };
                warn!(way_id, "{anomaly}");
                report.anomalies.push(anomaly);
                continue;
            }
            candidates.push((feature.feature_id, way_id, maxspeed));
        }

        let resolver = SpeedResolver::new(self.graph, &snapshot, self.catalogue, self.config);
        let outcomes: Vec<FeatureOutcome> = candidates
            .par_iter()
            .map(|(feature_id, way_id, maxspeed)| {
                self.process_feature(&resolver, *feature_id, *way_id, *maxspeed)
            })
            .collect();

        let mut statistics = CategoryStatistics::new();
        let mut feature_speeds = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            let way_id = outcome.way_id;
            if let (Some(from_feature_id), Some((maxspeed, _))) =
                (outcome.inherited_from, &outcome.accepted)
            {
                info!(
                    way_id,
                    from_way_id = self.feature_to_way.get(&from_feature_id),
                    %maxspeed,
                    "Inherited speed"
                );
                report.inherited_count += 1;
            }

            for anomaly in outcome.anomalies {
                warn!(way_id, "{anomaly}");
                report.anomalies.push(anomaly);
            }

            let Some((maxspeed, feature_speed)) = outcome.accepted else {
                continue;
            };
            feature_speeds.push(feature_speed);

            if let Some(category) = self.graph.category(outcome.feature_id) {
                statistics.add(
                    category,
                    UrbanContext::from_in_city(self.graph.is_in_city(outcome.feature_id)),
                    self.graph.road_length_m(outcome.feature_id),
                    &maxspeed,
                );
            } else {
                let anomaly = Anomaly::UnknownCategory {
                    feature_id: outcome.feature_id,
                    way_id,
                };
                warn!(way_id, "{anomaly}");
                report.anomalies.push(anomaly);
            }
        }

        report.stored_count = feature_speeds.len();
        if feature_speeds.is_empty() {
            info!("No maxspeeds to store");
            return Ok((None, report));
        }

        if self.config.calculate_default_speeds {
            report.default_speeds = statistics.finalize(self.config, self.catalogue);
        }

        let mut builder = MaxspeedsSectionBuilder::new(report.default_speeds);
        for feature_speed in feature_speeds {
            builder.add(feature_speed);
        }
        let bytes = builder.into_bytes()?;
        info!(
            stored = report.stored_count,
            defaults = report.default_speeds.len(),
            bytes = bytes.len(),
            "Serialized maxspeeds"
        );

        Ok((Some(bytes), report))
    }

    /// Resolves and quantizes a single feature.
    fn process_feature(
        &self,
        resolver: &SpeedResolver<'_, G>,
        feature_id: u32,
        way_id: u64,
        mut maxspeed: Maxspeed,
    ) -> FeatureOutcome {
        let mut outcome = FeatureOutcome {
            feature_id,
            way_id,
            accepted: None,
            inherited_from: None,
            anomalies: Vec::new(),
        };

        match resolver.resolve(feature_id) {
            ResolvedSpeed::NotNeeded => {}
            ResolvedSpeed::Inherited {
                speed,
                from_feature_id,
            } => {
                maxspeed.set_forward(speed);
                outcome.inherited_from = Some(from_feature_id);
            }
            ResolvedSpeed::UnknownCategory => {
                outcome
                    .anomalies
                    .push(Anomaly::UnknownCategory { feature_id, way_id });
                return outcome;
            }
            ResolvedSpeed::Unresolved => {
                outcome
                    .anomalies
                    .push(Anomaly::Unresolved { feature_id, way_id });
                return outcome;
            }
        }

        let limit = self.config.implausible_speed_km_ph;
        let implausible = [Some(maxspeed.forward_in_units()), maxspeed.backward_in_units()]
            .into_iter()
            .flatten()
            .filter_map(|speed| speed.km_per_hour())
            .any(|speed| speed >= limit);
        if implausible {
            outcome.anomalies.push(Anomaly::ImplausibleSpeed {
                feature_id,
                way_id,
                maxspeed,
            });
        }

        let forward = maxspeed.forward_in_units();
        let forward_macro = self.catalogue.to_macro(forward);
        if forward_macro.is_undefined() {
            outcome.anomalies.push(Anomaly::UndefinedForwardMacro {
                feature_id,
                way_id,
                speed: forward,
            });
            return outcome;
        }

        let backward_macro = maxspeed.backward_in_units().and_then(|backward| {
            let backward_macro = self.catalogue.to_macro(backward);
            if backward_macro.is_undefined() {
                outcome.anomalies.push(Anomaly::UndefinedBackwardMacro {
                    feature_id,
                    way_id,
                    speed: backward,
                });
                None
            } else {
                Some(backward_macro)
            }
        });

        outcome.accepted = Some((
            maxspeed,
            FeatureSpeed {
                feature_id,
                forward: forward_macro,
                backward: backward_macro,
            },
        ));
        outcome
    }
}

/// Builds a maxspeeds section with the standard speed catalogue.
///
/// See [`MaxspeedsCollector::collect`].
///
/// # Errors
///
/// Fails if the section cannot be encoded.
pub fn build_maxspeeds_section<G, I>(
    graph: &G,
    features: I,
    feature_to_way: &FeatureIdToWayId,
    maxspeeds: &WayIdToMaxspeed,
    config: &MaxspeedsConfig,
) -> Result<(Option<Vec<u8>>, BuildReport), SectionBuildError>
where
    G: RoadGraph,
    I: IntoIterator<Item = RoadFeature>,
{
    MaxspeedsCollector::new(graph, feature_to_way, SpeedCatalogue::standard(), config)
        .collect(features, maxspeeds)
}
