//! # Reference speeds
//!
//! Baseline in-city and out-of-city speeds per road category.
//! These are used to sanity check (and rank) the default speeds computed from the data,
//! and as stand-ins wherever the data doesn't yield a usable value.

use crate::{CATEGORY_COUNT, RoadCategory, UrbanContext};
use std::collections::HashMap;

/// A pair of baseline speeds, in km/h.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InOutCitySpeed {
    pub inside: f64,
    pub outside: f64,
}

impl InOutCitySpeed {
    pub const fn new(inside: f64, outside: f64) -> Self {
        Self { inside, outside }
    }

    #[inline]
    pub const fn get(&self, context: UrbanContext) -> f64 {
        match context {
            UrbanContext::Inside => self.inside,
            UrbanContext::Outside => self.outside,
        }
    }
}

/// Built-in baselines, indexed by [`RoadCategory::index`].
const BUILT_IN_SPEEDS: [InOutCitySpeed; CATEGORY_COUNT] = [
    InOutCitySpeed::new(90.0, 115.0), // Motorway
    InOutCitySpeed::new(60.0, 75.0),  // MotorwayLink
    InOutCitySpeed::new(70.0, 95.0),  // Trunk
    InOutCitySpeed::new(50.0, 65.0),  // TrunkLink
    InOutCitySpeed::new(55.0, 80.0),  // Primary
    InOutCitySpeed::new(40.0, 55.0),  // PrimaryLink
    InOutCitySpeed::new(45.0, 70.0),  // Secondary
    InOutCitySpeed::new(35.0, 45.0),  // SecondaryLink
    InOutCitySpeed::new(40.0, 60.0),  // Tertiary
    InOutCitySpeed::new(30.0, 40.0),  // TertiaryLink
    InOutCitySpeed::new(30.0, 50.0),  // Unclassified
    InOutCitySpeed::new(25.0, 35.0),  // Residential
    InOutCitySpeed::new(10.0, 10.0),  // LivingStreet
    InOutCitySpeed::new(15.0, 20.0),  // Service
    InOutCitySpeed::new(30.0, 40.0),  // Road
    InOutCitySpeed::new(15.0, 20.0),  // Track
    InOutCitySpeed::new(10.0, 10.0),  // Ferry
    InOutCitySpeed::new(25.0, 25.0),  // ShuttleTrain
    InOutCitySpeed::new(25.0, 25.0),  // RailwayMotorVehicle
    InOutCitySpeed::new(5.0, 5.0),    // Pier
];

/// An immutable table of baseline speeds for every [`RoadCategory`].
///
/// When deserialized, the input is a map from category to speeds;
/// categories missing from the map keep their built-in values.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(from = "HashMap<RoadCategory, InOutCitySpeed>")
)]
pub struct ReferenceSpeeds {
    speeds: [InOutCitySpeed; CATEGORY_COUNT],
}

impl Default for ReferenceSpeeds {
    fn default() -> Self {
        Self {
            speeds: BUILT_IN_SPEEDS,
        }
    }
}

impl From<HashMap<RoadCategory, InOutCitySpeed>> for ReferenceSpeeds {
    fn from(value: HashMap<RoadCategory, InOutCitySpeed>) -> Self {
        ReferenceSpeeds::default().with_overrides(value)
    }
}

impl ReferenceSpeeds {
    /// Replaces the baselines of some categories.
    #[must_use]
    pub fn with_overrides(
        mut self,
        overrides: impl IntoIterator<Item = (RoadCategory, InOutCitySpeed)>,
    ) -> Self {
        for (category, speed) in overrides {
            self.speeds[category.index()] = speed;
        }
        self
    }

    /// The baseline speed for a category in the given context, in km/h.
    #[inline]
    pub fn speed(&self, category: RoadCategory, context: UrbanContext) -> f64 {
        self.speeds[category.index()].get(context)
    }

    /// Ranks all non-link categories by their baseline for the given context, fastest first.
    ///
    /// Categories with equal baselines keep their declaration order.
    pub fn ranked_main_categories(&self, context: UrbanContext) -> Vec<RoadCategory> {
        let mut categories: Vec<_> = RoadCategory::ALL
            .into_iter()
            .filter(|category| !category.is_link())
            .collect();
        categories.sort_by(|l, r| {
            self.speed(*r, context)
                .total_cmp(&self.speed(*l, context))
        });
        categories
    }
}
