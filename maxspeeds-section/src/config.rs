use crate::reference_speeds::ReferenceSpeeds;

/// Tuning knobs for building a maxspeeds section.
///
/// The defaults are what production datasets are built with.
/// When deserialized, missing fields take their default values.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MaxspeedsConfig {
    /// The maximum number of distinct roads (including the starting one)
    /// visited per direction while looking for a speed to inherit.
    pub max_visited_features: usize,
    /// Scales the speed of a main road when inherited by one of its links.
    pub link_speed_factor: f64,
    /// Categories with less total length than this (in km) get no computed default.
    pub min_default_speed_length_km: f64,
    /// Computed defaults at or above this speed (in km/h) are ignored.
    pub max_default_speed_km_ph: f64,
    /// Computed defaults below this fraction of the reference speed are ignored.
    pub min_reference_ratio: f64,
    /// Computed defaults above this multiple of the reference speed are ignored.
    pub max_reference_ratio: f64,
    /// Tolerance (in km/h) for the primary > secondary > tertiary > residential ordering.
    pub consistency_epsilon_km_ph: f64,
    /// Speeds at or above this (in km/h) are reported as implausible.
    pub implausible_speed_km_ph: f64,
    /// Whether to compute per-category default speeds at all.
    ///
    /// Some regions have data which is known to yield bad defaults.
    pub calculate_default_speeds: bool,
    pub reference_speeds: ReferenceSpeeds,
}

impl Default for MaxspeedsConfig {
    fn default() -> Self {
        Self {
            max_visited_features: 4,
            link_speed_factor: 0.85,
            min_default_speed_length_km: 5.0,
            max_default_speed_km_ph: 400.0,
            min_reference_ratio: 0.5,
            max_reference_ratio: 2.0,
            consistency_epsilon_km_ph: 1.0,
            implausible_speed_km_ph: 280.0,
            calculate_default_speeds: true,
            reference_speeds: ReferenceSpeeds::default(),
        }
    }
}
