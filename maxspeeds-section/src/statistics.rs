//! # Per-category default speeds
//!
//! While records are accepted, the total length and travel time of every
//! (category, urban context) pair is accumulated.
//! Once everything has been seen, the averages are checked against reference speeds
//! and against each other, and the survivors become the default speeds stored in the section.

use crate::config::MaxspeedsConfig;
use crate::speed::{Maxspeed, MaxspeedType, SpeedInUnits, Units};
use crate::speed_macro::{SpeedCatalogue, SpeedMacro};
use crate::{CATEGORY_COUNT, LINK_PAIRS, RoadCategory, UrbanContext};
use tracing::{debug, info, warn};

/// Accumulated length and travel time of one (category, urban context) pair.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CategoryStat {
    pub length_km: f64,
    pub time_h: f64,
    /// Only set once statistics are finalized.
    pub resolved_speed: Option<f64>,
}

/// Accumulates [`CategoryStat`]s for every (category, urban context) pair.
#[derive(Debug, Clone, Default)]
pub struct CategoryStatistics {
    stats: [[CategoryStat; CATEGORY_COUNT]; 2],
}

/// The (sparse) default speed macros per (category, urban context).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DefaultSpeeds {
    macros: [[SpeedMacro; CATEGORY_COUNT]; 2],
}

impl DefaultSpeeds {
    /// Gets the default speed macro, if there is one.
    #[inline]
    pub fn get(&self, category: RoadCategory, context: UrbanContext) -> Option<SpeedMacro> {
        let speed_macro = self.macros[context.index()][category.index()];
        (!speed_macro.is_undefined()).then_some(speed_macro)
    }

    /// Sets (or with [`SpeedMacro::UNDEFINED`], clears) a default speed macro.
    #[inline]
    pub fn set(&mut self, category: RoadCategory, context: UrbanContext, speed_macro: SpeedMacro) {
        self.macros[context.index()][category.index()] = speed_macro;
    }

    /// Iterates over all defined entries, ordered by context, then category.
    pub fn iter(&self) -> impl Iterator<Item = (UrbanContext, RoadCategory, SpeedMacro)> + '_ {
        UrbanContext::ALL.into_iter().flat_map(move |context| {
            RoadCategory::ALL.into_iter().filter_map(move |category| {
                self.get(category, context)
                    .map(|speed_macro| (context, category, speed_macro))
            })
        })
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

impl CategoryStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn stat(&self, category: RoadCategory, context: UrbanContext) -> &CategoryStat {
        &self.stats[context.index()][category.index()]
    }

    /// Adds a road to the statistics.
    ///
    /// Each numeric direction of the record contributes the road length
    /// and the time it takes to travel it.
    pub fn add(
        &mut self,
        category: RoadCategory,
        context: UrbanContext,
        length_m: f64,
        maxspeed: &Maxspeed,
    ) {
        let stat = &mut self.stats[context.index()][category.index()];
        let length_km = length_m / 1000.0;

        let directions = [Some(maxspeed.forward_in_units()), maxspeed.backward_in_units()];
        for speed_km_ph in directions.into_iter().flatten().filter_map(|s| s.km_per_hour()) {
            stat.length_km += length_km;
            stat.time_h += length_km / speed_km_ph;
        }
    }

    /// Computes the default speeds, consuming the statistics.
    pub fn finalize(
        mut self,
        config: &MaxspeedsConfig,
        catalogue: &SpeedCatalogue,
    ) -> DefaultSpeeds {
        let mut result = DefaultSpeeds::default();

        for context in UrbanContext::ALL {
            self.resolve_context(context, config);

            info!(?context, "Default speeds");
            for category in RoadCategory::ALL {
                let Some(speed) = self.stat(category, context).resolved_speed else {
                    continue;
                };
                if speed <= 0.0 {
                    continue;
                }

                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    reason = "Default speeds are stored as whole km/h, clamped to MaxspeedType"
                )]
                let truncated = speed.min(f64::from(MaxspeedType::MAX)) as MaxspeedType;
                let speed_macro =
                    catalogue.closest_valid_macro(SpeedInUnits::new(truncated, Units::Metric));
                info!(?category, speed, %speed_macro, "Default speed");
                result.set(category, context, speed_macro);
            }
        }

        result
    }

    /// Runs all the averaging and consistency steps for one context.
    fn resolve_context(&mut self, context: UrbanContext, config: &MaxspeedsConfig) {
        let reference = &config.reference_speeds;
        let stats = &mut self.stats[context.index()];

        for stat in stats.iter_mut() {
            stat.resolved_speed = None;
            if stat.length_km > config.min_default_speed_length_km {
                let speed = stat.length_km / stat.time_h;
                if speed < config.max_default_speed_km_ph {
                    stat.resolved_speed = Some(speed);
                }
            }
        }

        let ranked = reference.ranked_main_categories(context);

        // Averages too far off from the reference are not trustworthy
        for category in &ranked {
            let stat = &mut stats[category.index()];
            if let Some(speed) = stat.resolved_speed {
                let base = reference.speed(*category, context);
                let ratio = speed / base;
                if ratio > config.max_reference_ratio || ratio < config.min_reference_ratio {
                    warn!(
                        ?context,
                        ?category,
                        speed,
                        base,
                        "Default speed is too far from the reference speed"
                    );
                    stat.resolved_speed = None;
                }
            }
        }

        // Faster categories (by reference) must not end up slower than the next one present
        let mut il = 0;
        for ir in 1..ranked.len() {
            let (left, right) = (ranked[il].index(), ranked[ir].index());
            let Some(left_speed) = stats[left].resolved_speed else {
                il += 1;
                continue;
            };
            let Some(right_speed) = stats[right].resolved_speed else {
                continue;
            };

            if left_speed < right_speed {
                warn!(
                    ?context,
                    left = ?ranked[il],
                    right = ?ranked[ir],
                    left_speed,
                    right_speed,
                    "Inconsistent default speeds"
                );
                if stats[left].length_km >= stats[right].length_km {
                    stats[right].resolved_speed = Some(left_speed);
                } else {
                    stats[left].resolved_speed = Some(right_speed);
                }
            }

            il = ir;
        }

        let speed_or_reference = |category: RoadCategory| {
            stats[category.index()]
                .resolved_speed
                .unwrap_or_else(|| reference.speed(category, context))
        };
        let primary = speed_or_reference(RoadCategory::Primary);
        let secondary = speed_or_reference(RoadCategory::Secondary);
        let tertiary = speed_or_reference(RoadCategory::Tertiary);
        let residential = speed_or_reference(RoadCategory::Residential);
        let eps = config.consistency_epsilon_km_ph;
        if primary + eps < secondary || secondary + eps < tertiary || tertiary + eps < residential {
            warn!(
                ?context,
                primary,
                secondary,
                tertiary,
                residential,
                "Ignoring primary, secondary, tertiary and residential default speeds"
            );
            for category in [
                RoadCategory::Primary,
                RoadCategory::Secondary,
                RoadCategory::Tertiary,
                RoadCategory::Residential,
            ] {
                stats[category.index()].resolved_speed = None;
            }
        }

        for (main, link) in LINK_PAIRS {
            let speed = stats[main.index()]
                .resolved_speed
                .map(|speed| speed * config.link_speed_factor);
            debug!(?context, ?link, ?speed, "Link default speed");
            stats[link.index()].resolved_speed = speed;
        }
    }
}
