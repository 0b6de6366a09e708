use std::fmt::{Display, Formatter};

/// Raw speed value, in the units of whatever it's attached to.
pub type MaxspeedType = u16;

/// "Explicitly no value". Also the largest value the annotation parser accepts.
pub const INVALID_SPEED: MaxspeedType = MaxspeedType::MAX;
/// The road has no speed restriction at all (e.g. some motorways in Germany).
pub const NONE_MAXSPEED: MaxspeedType = MaxspeedType::MAX - 1;
/// Drivers are expected to move at walking pace.
pub const WALK_MAXSPEED: MaxspeedType = MaxspeedType::MAX - 2;
/// A legal limit applies but its value is the (unspecified) country default.
///
/// Roads carrying this value need their speed inferred from connected roads.
pub const COMMON_MAXSPEED_VALUE: MaxspeedType = 1000;

const KM_PER_MILE: f64 = 1.609_344;

/// Does the value denote an actual speed, rather than one of the sentinels?
#[inline]
pub const fn is_numeric(speed: MaxspeedType) -> bool {
    speed != INVALID_SPEED
        && speed != NONE_MAXSPEED
        && speed != WALK_MAXSPEED
        && speed != COMMON_MAXSPEED_VALUE
}

/// The unit system a speed is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Units {
    /// Kilometers per hour.
    #[default]
    Metric,
    /// Miles per hour.
    Imperial,
}

impl Units {
    /// Parses a unit token from an annotation table.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "kmh" | "Metric" => Some(Units::Metric),
            "mph" | "Imperial" => Some(Units::Imperial),
            _ => None,
        }
    }

    /// Converts a speed in these units to km/h.
    #[inline]
    pub fn to_km_per_hour(self, speed: f64) -> f64 {
        match self {
            Units::Metric => speed,
            Units::Imperial => speed * KM_PER_MILE,
        }
    }

    const fn suffix(self) -> &'static str {
        match self {
            Units::Metric => "km/h",
            Units::Imperial => "mph",
        }
    }
}

/// A speed value together with its unit system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpeedInUnits {
    speed: MaxspeedType,
    units: Units,
}

impl SpeedInUnits {
    #[inline]
    pub const fn new(speed: MaxspeedType, units: Units) -> Self {
        Self { speed, units }
    }

    /// The raw value (which may be one of the sentinels).
    #[inline]
    pub const fn speed(&self) -> MaxspeedType {
        self.speed
    }

    #[inline]
    pub const fn units(&self) -> Units {
        self.units
    }

    #[inline]
    pub const fn is_valid(&self) -> bool {
        self.speed != INVALID_SPEED
    }

    #[inline]
    pub const fn is_numeric(&self) -> bool {
        is_numeric(self.speed)
    }

    /// The speed in km/h, or `None` if the value is a sentinel.
    pub fn km_per_hour(&self) -> Option<f64> {
        self.is_numeric()
            .then(|| self.units.to_km_per_hour(f64::from(self.speed)))
    }
}

impl Display for SpeedInUnits {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.speed {
            INVALID_SPEED => write!(f, "invalid"),
            NONE_MAXSPEED => write!(f, "none"),
            WALK_MAXSPEED => write!(f, "walk"),
            COMMON_MAXSPEED_VALUE => write!(f, "country default"),
            speed => write!(f, "{speed} {}", self.units.suffix()),
        }
    }
}

/// The maxspeed annotation of a single road.
///
/// A missing backward value means the forward value applies in both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Maxspeed {
    units: Units,
    forward: MaxspeedType,
    backward: Option<MaxspeedType>,
}

impl Maxspeed {
    /// Creates a new record.
    ///
    /// An explicit [`INVALID_SPEED`] backward value is the same as no backward value.
    pub fn new(units: Units, forward: MaxspeedType, backward: Option<MaxspeedType>) -> Self {
        Self {
            units,
            forward,
            backward: backward.filter(|speed| *speed != INVALID_SPEED),
        }
    }

    #[inline]
    pub const fn units(&self) -> Units {
        self.units
    }

    #[inline]
    pub const fn forward(&self) -> MaxspeedType {
        self.forward
    }

    #[inline]
    pub const fn backward(&self) -> Option<MaxspeedType> {
        self.backward
    }

    /// Does the road carry a distinct limit for the backward direction?
    #[inline]
    pub const fn is_bidirectional(&self) -> bool {
        self.backward.is_some()
    }

    /// Does the forward value need to be inferred from the road graph?
    #[inline]
    pub const fn is_country_default(&self) -> bool {
        self.forward == COMMON_MAXSPEED_VALUE
    }

    #[inline]
    pub const fn forward_in_units(&self) -> SpeedInUnits {
        SpeedInUnits::new(self.forward, self.units)
    }

    pub fn backward_in_units(&self) -> Option<SpeedInUnits> {
        self.backward.map(|speed| SpeedInUnits::new(speed, self.units))
    }

    /// Replaces the forward value (and the unit system of the whole record).
    pub fn set_forward(&mut self, speed: SpeedInUnits) {
        self.forward = speed.speed();
        self.units = speed.units();
    }
}

impl Display for Maxspeed {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "forward: {}", self.forward_in_units())?;
        if let Some(backward) = self.backward_in_units() {
            write!(f, ", backward: {backward}")?;
        }
        Ok(())
    }
}
