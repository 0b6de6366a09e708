//! # Speed macros
//!
//! Only a small catalogue of canonical speeds is ever persisted.
//! Each catalogued `(value, units)` pair has a one byte code (a "macro"),
//! and arbitrary speeds are quantized to the nearest catalogued value of the same unit system.

use crate::speed::{
    COMMON_MAXSPEED_VALUE, INVALID_SPEED, MaxspeedType, NONE_MAXSPEED, SpeedInUnits, Units,
    WALK_MAXSPEED,
};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::LazyLock;
use thiserror::Error;

/// A one byte speed code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct SpeedMacro(u8);

impl SpeedMacro {
    /// No catalogue entry matches.
    pub const UNDEFINED: SpeedMacro = SpeedMacro(0);
    /// No speed restriction.
    pub const NONE: SpeedMacro = SpeedMacro(1);
    /// Walking pace.
    pub const WALK: SpeedMacro = SpeedMacro(2);

    #[inline]
    pub const fn from_raw(value: u8) -> Self {
        Self(value)
    }

    #[inline]
    pub const fn raw(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn is_undefined(self) -> bool {
        self.0 == Self::UNDEFINED.0
    }
}

impl Display for SpeedMacro {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// First macro code of the km/h block.
const METRIC_BASE_MACRO: u8 = 10;
/// First macro code of the mph block.
const IMPERIAL_BASE_MACRO: u8 = 110;

/// Catalogued km/h values, ascending.
const METRIC_SPEEDS: &[MaxspeedType] = &[
    1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 18, 20, 22, 24, 25, 28, 30, 32, 35, 36,
    39, 40, 45, 50, 55, 56, 60, 64, 65, 70, 72, 75, 80, 82, 85, 89, 90, 93, 95, 96, 100, 104, 105,
    106, 110, 112, 115, 120, 125, 127, 130, 135, 140, 141, 145, 150, 155, 160, 165, 170, 177, 180,
    185, 190, 193, 195, 200, 201, 210, 217, 220, 230, 240, 250, 260, 270, 275, 280, 285, 300, 305,
    310, 320, 350, 380,
];

/// Catalogued mph values, ascending.
const IMPERIAL_SPEEDS: &[MaxspeedType] = &[
    3, 4, 5, 6, 7, 8, 9, 10, 12, 13, 14, 15, 17, 18, 19, 20, 24, 25, 30, 35, 40, 45, 50, 55, 59,
    60, 65, 70, 75, 79, 80, 85, 90, 95, 100, 105, 110, 115, 120, 125,
];

static STANDARD_CATALOGUE: LazyLock<SpeedCatalogue> = LazyLock::new(|| {
    let block = |base: u8, units: Units, speeds: &'static [MaxspeedType]| {
        speeds.iter().zip(base..).map(move |(speed, code)| {
            (SpeedMacro::from_raw(code), SpeedInUnits::new(*speed, units))
        })
    };

    let entries = [
        (SpeedMacro::NONE, SpeedInUnits::new(NONE_MAXSPEED, Units::Metric)),
        (SpeedMacro::WALK, SpeedInUnits::new(WALK_MAXSPEED, Units::Metric)),
    ]
    .into_iter()
    .chain(block(METRIC_BASE_MACRO, Units::Metric, METRIC_SPEEDS))
    .chain(block(IMPERIAL_BASE_MACRO, Units::Imperial, IMPERIAL_SPEEDS));

    SpeedCatalogue::try_new(entries).expect("The built-in speed catalogue is valid")
});

#[derive(Debug, Error, PartialEq)]
pub enum InvalidCatalogueError {
    #[error("The undefined macro cannot be assigned a speed.")]
    UndefinedMacro,
    #[error("Macro {0} is assigned more than once.")]
    DuplicateMacro(SpeedMacro),
    #[error("Speed {0} is assigned to more than one macro.")]
    DuplicateSpeed(SpeedInUnits),
    #[error("Speed {0} cannot be catalogued.")]
    UncataloguedValue(SpeedInUnits),
}

/// An immutable catalogue of `(macro, speed)` pairs.
#[derive(Debug, Clone)]
pub struct SpeedCatalogue {
    by_macro: HashMap<SpeedMacro, SpeedInUnits>,
    by_speed: HashMap<SpeedInUnits, SpeedMacro>,
    /// Numeric km/h values, ascending.
    metric: Vec<MaxspeedType>,
    /// Numeric mph values, ascending.
    imperial: Vec<MaxspeedType>,
}

impl Default for SpeedCatalogue {
    fn default() -> Self {
        SpeedCatalogue::standard().clone()
    }
}

impl SpeedCatalogue {
    /// The built-in catalogue.
    pub fn standard() -> &'static SpeedCatalogue {
        &STANDARD_CATALOGUE
    }

    /// Builds a catalogue from explicit entries.
    ///
    /// # Errors
    ///
    /// Fails if a macro or speed appears twice, the undefined macro is used,
    /// or an entry holds [`INVALID_SPEED`] or [`COMMON_MAXSPEED_VALUE`].
    pub fn try_new(
        entries: impl IntoIterator<Item = (SpeedMacro, SpeedInUnits)>,
    ) -> Result<Self, InvalidCatalogueError> {
        let mut catalogue = SpeedCatalogue {
            by_macro: HashMap::new(),
            by_speed: HashMap::new(),
            metric: Vec::new(),
            imperial: Vec::new(),
        };

        for (speed_macro, speed) in entries {
            if speed_macro.is_undefined() {
                return Err(InvalidCatalogueError::UndefinedMacro);
            }
            if matches!(speed.speed(), INVALID_SPEED | COMMON_MAXSPEED_VALUE) {
                return Err(InvalidCatalogueError::UncataloguedValue(speed));
            }
            if catalogue.by_macro.insert(speed_macro, speed).is_some() {
                return Err(InvalidCatalogueError::DuplicateMacro(speed_macro));
            }
            if catalogue.by_speed.insert(speed, speed_macro).is_some() {
                return Err(InvalidCatalogueError::DuplicateSpeed(speed));
            }
            if speed.is_numeric() {
                match speed.units() {
                    Units::Metric => catalogue.metric.push(speed.speed()),
                    Units::Imperial => catalogue.imperial.push(speed.speed()),
                }
            }
        }

        catalogue.metric.sort_unstable();
        catalogue.imperial.sort_unstable();

        Ok(catalogue)
    }

    fn values(&self, units: Units) -> &[MaxspeedType] {
        match units {
            Units::Metric => &self.metric,
            Units::Imperial => &self.imperial,
        }
    }

    /// Gets the speed a macro stands for.
    ///
    /// Returns `None` for [`SpeedMacro::UNDEFINED`] and codes not in the catalogue.
    pub fn macro_to_speed(&self, speed_macro: SpeedMacro) -> Option<SpeedInUnits> {
        self.by_macro.get(&speed_macro).copied()
    }

    /// Finds the catalogued speed (of the same unit system) closest to the input.
    ///
    /// The raw value is treated as a plain number, and values beyond either end of the catalogue
    /// are clamped to that end. When the input is exactly halfway between two catalogued values,
    /// the larger one wins.
    /// Returns `None` only if the catalogue has no values for the unit system.
    pub fn closest_valid(&self, speed: SpeedInUnits) -> Option<SpeedInUnits> {
        let values = self.values(speed.units());
        let raw = speed.speed();

        let index = values.partition_point(|value| *value < raw);
        let closest = match (index.checked_sub(1), values.get(index)) {
            (_, Some(upper)) if *upper == raw => *upper,
            (Some(lower), Some(upper)) => {
                if raw - values[lower] < upper - raw {
                    values[lower]
                } else {
                    *upper
                }
            }
            (None, Some(upper)) => *upper,
            (Some(lower), None) => values[lower],
            (None, None) => return None,
        };

        Some(SpeedInUnits::new(closest, speed.units()))
    }

    /// Like [`SpeedCatalogue::closest_valid`], but returns the macro.
    pub fn closest_valid_macro(&self, speed: SpeedInUnits) -> SpeedMacro {
        self.closest_valid(speed)
            .map_or(SpeedMacro::UNDEFINED, |closest| self.exact_macro(closest))
    }

    /// Gets the macro of an exactly catalogued speed.
    pub fn exact_macro(&self, speed: SpeedInUnits) -> SpeedMacro {
        self.by_speed
            .get(&speed)
            .copied()
            .unwrap_or(SpeedMacro::UNDEFINED)
    }

    /// Quantizes a speed to a storable macro.
    ///
    /// Catalogued values (including "none" and "walk") map to their own macro.
    /// Other numeric values within the catalogue's range for their unit system
    /// map to the nearest catalogued value.
    /// Everything else is [`SpeedMacro::UNDEFINED`].
    pub fn to_macro(&self, speed: SpeedInUnits) -> SpeedMacro {
        let exact = self.exact_macro(speed);
        if !exact.is_undefined() || !speed.is_numeric() {
            return exact;
        }

        let values = self.values(speed.units());
        match (values.first(), values.last()) {
            (Some(first), Some(last)) if (*first..=*last).contains(&speed.speed()) => {
                self.closest_valid_macro(speed)
            }
            _ => SpeedMacro::UNDEFINED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_standard_catalogue_blocks_do_not_overlap() {
        let last_metric = usize::from(METRIC_BASE_MACRO) + METRIC_SPEEDS.len() - 1;
        assert!(last_metric < usize::from(IMPERIAL_BASE_MACRO));
        assert!(usize::from(IMPERIAL_BASE_MACRO) + IMPERIAL_SPEEDS.len() <= 256);
        assert!(METRIC_SPEEDS.is_sorted());
        assert!(IMPERIAL_SPEEDS.is_sorted());
    }

    #[test]
    fn test_special_values() {
        let catalogue = SpeedCatalogue::standard();

        assert_eq!(
            catalogue.to_macro(SpeedInUnits::new(NONE_MAXSPEED, Units::Metric)),
            SpeedMacro::NONE
        );
        assert_eq!(
            catalogue.to_macro(SpeedInUnits::new(WALK_MAXSPEED, Units::Metric)),
            SpeedMacro::WALK
        );
        assert_eq!(
            catalogue.to_macro(SpeedInUnits::new(INVALID_SPEED, Units::Metric)),
            SpeedMacro::UNDEFINED
        );
        assert_eq!(
            catalogue.to_macro(SpeedInUnits::new(COMMON_MAXSPEED_VALUE, Units::Metric)),
            SpeedMacro::UNDEFINED
        );
        assert_eq!(catalogue.macro_to_speed(SpeedMacro::UNDEFINED), None);
    }

    #[test]
    fn test_nearest_match() {
        let catalogue = SpeedCatalogue::standard();
        let closest = |speed, units| {
            catalogue
                .closest_valid(SpeedInUnits::new(speed, units))
                .map(|s| s.speed())
        };

        assert_eq!(closest(50, Units::Metric), Some(50));
        assert_eq!(closest(52, Units::Metric), Some(50));
        assert_eq!(closest(54, Units::Metric), Some(55));
        // Halfway between 100 and 104
        assert_eq!(closest(102, Units::Metric), Some(104));
        assert_eq!(closest(0, Units::Metric), Some(1));
        assert_eq!(closest(999, Units::Metric), Some(380));
        assert_eq!(closest(1, Units::Imperial), Some(3));
        assert_eq!(closest(62, Units::Imperial), Some(60));
    }

    #[test]
    fn test_out_of_range_values_are_undefined() {
        let catalogue = SpeedCatalogue::standard();

        assert_eq!(
            catalogue.to_macro(SpeedInUnits::new(0, Units::Metric)),
            SpeedMacro::UNDEFINED
        );
        assert_eq!(
            catalogue.to_macro(SpeedInUnits::new(381, Units::Metric)),
            SpeedMacro::UNDEFINED
        );
        assert_eq!(
            catalogue.to_macro(SpeedInUnits::new(2, Units::Imperial)),
            SpeedMacro::UNDEFINED
        );
        assert!(
            !catalogue
                .to_macro(SpeedInUnits::new(379, Units::Metric))
                .is_undefined()
        );
    }

    #[test]
    fn test_units_are_not_mixed() {
        let catalogue = SpeedCatalogue::standard();

        let metric = catalogue.to_macro(SpeedInUnits::new(50, Units::Metric));
        let imperial = catalogue.to_macro(SpeedInUnits::new(50, Units::Imperial));
        assert_ne!(metric, imperial);
        assert_eq!(
            catalogue.macro_to_speed(imperial),
            Some(SpeedInUnits::new(50, Units::Imperial))
        );
    }

    #[test]
    fn test_invalid_catalogues() {
        let speed = SpeedInUnits::new(50, Units::Metric);

        assert_eq!(
            SpeedCatalogue::try_new([(SpeedMacro::UNDEFINED, speed)]).err(),
            Some(InvalidCatalogueError::UndefinedMacro)
        );
        assert_eq!(
            SpeedCatalogue::try_new([
                (SpeedMacro::from_raw(10), speed),
                (SpeedMacro::from_raw(11), speed)
            ])
            .err(),
            Some(InvalidCatalogueError::DuplicateSpeed(speed))
        );
        assert_eq!(
            SpeedCatalogue::try_new([
                (SpeedMacro::from_raw(10), speed),
                (SpeedMacro::from_raw(10), SpeedInUnits::new(60, Units::Metric))
            ])
            .err(),
            Some(InvalidCatalogueError::DuplicateMacro(SpeedMacro::from_raw(10)))
        );
    }

    #[test]
    fn test_empty_catalogue_never_matches() {
        let catalogue = SpeedCatalogue::try_new([]).expect("Empty catalogues are valid");

        assert_eq!(
            catalogue.closest_valid(SpeedInUnits::new(50, Units::Metric)),
            None
        );
        assert_eq!(
            catalogue.to_macro(SpeedInUnits::new(50, Units::Metric)),
            SpeedMacro::UNDEFINED
        );
    }

    proptest! {
        #[test]
        fn catalogued_values_quantize_to_themselves(
            index in 0..METRIC_SPEEDS.len() + IMPERIAL_SPEEDS.len(),
        ) {
            let catalogue = SpeedCatalogue::standard();
            let speed = if index < METRIC_SPEEDS.len() {
                SpeedInUnits::new(METRIC_SPEEDS[index], Units::Metric)
            } else {
                SpeedInUnits::new(IMPERIAL_SPEEDS[index - METRIC_SPEEDS.len()], Units::Imperial)
            };

            prop_assert_eq!(catalogue.closest_valid(speed), Some(speed));
            let speed_macro = catalogue.to_macro(speed);
            prop_assert_eq!(catalogue.macro_to_speed(speed_macro), Some(speed));
        }

        #[test]
        fn in_range_values_always_quantize(speed in 1u16..=380) {
            let catalogue = SpeedCatalogue::standard();
            let speed = SpeedInUnits::new(speed, Units::Metric);
            let speed_macro = catalogue.to_macro(speed);

            prop_assert!(!speed_macro.is_undefined());
            prop_assert_eq!(catalogue.macro_to_speed(speed_macro), catalogue.closest_valid(speed));
        }
    }
}
