//! # Maxspeeds Section
//!
//! Derives, validates and compactly encodes per-road speed limits for an offline map dataset.
//!
//! The pipeline reads a maxspeed annotation table keyed by way ID,
//! infers concrete values for roads that only carry an implicit "country default" marker
//! by walking a road graph, computes per-category default speeds
//! (separately for roads inside and outside of cities),
//! and quantizes everything into a small catalogue of speed macros
//! which is what actually ends up in the binary section.

// Private modules by default
mod collector;
mod config;
mod parser;
mod reference_speeds;
mod resolver;
pub mod road_graph;
pub mod section;
mod speed;
mod speed_macro;
mod statistics;

// Pub use for re-export without too many levels of hierarchy.
pub use collector::{Anomaly, BuildReport, MaxspeedsCollector, build_maxspeeds_section};
pub use config::MaxspeedsConfig;
pub use parser::{
    AnnotationParseError, FeatureIdToWayId, FeatureMappingParseError, MalformedLine,
    WayIdToMaxspeed, parse_feature_mapping, parse_feature_mapping_from_path, parse_maxspeeds,
    parse_maxspeeds_from_path,
};
pub use reference_speeds::{InOutCitySpeed, ReferenceSpeeds};
pub use resolver::{ResolvedSpeed, SpeedResolver};
pub use speed::{
    COMMON_MAXSPEED_VALUE, INVALID_SPEED, Maxspeed, MaxspeedType, NONE_MAXSPEED, SpeedInUnits,
    Units, WALK_MAXSPEED, is_numeric,
};
pub use speed_macro::{InvalidCatalogueError, SpeedCatalogue, SpeedMacro};
pub use statistics::{CategoryStat, CategoryStatistics, DefaultSpeeds};

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// The number of [`RoadCategory`] variants.
pub const CATEGORY_COUNT: usize = 20;

/// The highway type of a road, as far as car routing is concerned.
///
/// The discriminants are persisted (5 bits) in the default speed table of a section,
/// so new variants may only be appended.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, IntoPrimitive, TryFromPrimitive,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum RoadCategory {
    Motorway,
    MotorwayLink,
    Trunk,
    TrunkLink,
    Primary,
    PrimaryLink,
    Secondary,
    SecondaryLink,
    Tertiary,
    TertiaryLink,
    Unclassified,
    Residential,
    LivingStreet,
    Service,
    Road,
    Track,
    Ferry,
    ShuttleTrain,
    RailwayMotorVehicle,
    Pier,
}

/// The five declared (main, link) pairs.
pub const LINK_PAIRS: [(RoadCategory, RoadCategory); 5] = [
    (RoadCategory::Motorway, RoadCategory::MotorwayLink),
    (RoadCategory::Trunk, RoadCategory::TrunkLink),
    (RoadCategory::Primary, RoadCategory::PrimaryLink),
    (RoadCategory::Secondary, RoadCategory::SecondaryLink),
    (RoadCategory::Tertiary, RoadCategory::TertiaryLink),
];

impl RoadCategory {
    pub const ALL: [RoadCategory; CATEGORY_COUNT] = [
        RoadCategory::Motorway,
        RoadCategory::MotorwayLink,
        RoadCategory::Trunk,
        RoadCategory::TrunkLink,
        RoadCategory::Primary,
        RoadCategory::PrimaryLink,
        RoadCategory::Secondary,
        RoadCategory::SecondaryLink,
        RoadCategory::Tertiary,
        RoadCategory::TertiaryLink,
        RoadCategory::Unclassified,
        RoadCategory::Residential,
        RoadCategory::LivingStreet,
        RoadCategory::Service,
        RoadCategory::Road,
        RoadCategory::Track,
        RoadCategory::Ferry,
        RoadCategory::ShuttleTrain,
        RoadCategory::RailwayMotorVehicle,
        RoadCategory::Pier,
    ];

    /// Position of the category in fixed-size per-category tables.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Is this a ramp/connector variant of a main road?
    #[inline]
    pub const fn is_link(self) -> bool {
        self.main_category().is_some()
    }

    /// The main road category a link belongs to (`None` for non-link categories).
    pub const fn main_category(self) -> Option<RoadCategory> {
        match self {
            RoadCategory::MotorwayLink => Some(RoadCategory::Motorway),
            RoadCategory::TrunkLink => Some(RoadCategory::Trunk),
            RoadCategory::PrimaryLink => Some(RoadCategory::Primary),
            RoadCategory::SecondaryLink => Some(RoadCategory::Secondary),
            RoadCategory::TertiaryLink => Some(RoadCategory::Tertiary),
            _ => None,
        }
    }

    /// Is `(main, link)` one of the declared main → link hierarchy pairs?
    #[inline]
    pub fn is_main_to_link(main: RoadCategory, link: RoadCategory) -> bool {
        link.main_category() == Some(main)
    }
}

/// Whether a road lies inside or outside of a populated area.
///
/// Default speeds are computed and stored separately for each context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum UrbanContext {
    Outside,
    Inside,
}

impl UrbanContext {
    pub const ALL: [UrbanContext; 2] = [UrbanContext::Outside, UrbanContext::Inside];

    #[inline]
    pub const fn from_in_city(in_city: bool) -> Self {
        if in_city {
            UrbanContext::Inside
        } else {
            UrbanContext::Outside
        }
    }

    #[inline]
    pub const fn is_in_city(self) -> bool {
        matches!(self, UrbanContext::Inside)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}
