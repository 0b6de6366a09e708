use super::header::MaxspeedsSectionHeaderBuilder;
use super::{DefaultSpeedEntry, FeatureSpeed, FeatureSpeedEntry, SectionBuildError};
use crate::speed_macro::SpeedMacro;
use crate::statistics::DefaultSpeeds;
use zerocopy::IntoBytes;

/// Collects feature speeds and default speeds, and serializes them into a section.
///
/// Features may be added in any order; they are sorted when the section is written.
pub struct MaxspeedsSectionBuilder {
    features: Vec<FeatureSpeed>,
    default_speeds: DefaultSpeeds,
}

impl MaxspeedsSectionBuilder {
    pub fn new(default_speeds: DefaultSpeeds) -> Self {
        Self {
            features: Vec::new(),
            default_speeds,
        }
    }

    /// Adds the speeds of a feature.
    ///
    /// A backward macro of [`SpeedMacro::UNDEFINED`] is the same as none.
    pub fn add(&mut self, speed: FeatureSpeed) {
        self.features.push(speed);
    }

    /// Serializes the section.
    ///
    /// # Errors
    ///
    /// Fails if a feature ID was added more than once,
    /// or if the section is too large for its 32-bit offsets.
    pub fn into_bytes(mut self) -> Result<Vec<u8>, SectionBuildError> {
        self.features.sort_unstable_by_key(|speed| speed.feature_id);
        if let Some(pair) = self
            .features
            .windows(2)
            .find(|pair| pair[0].feature_id == pair[1].feature_id)
        {
            return Err(SectionBuildError::DuplicateFeatureId(pair[0].feature_id));
        }

        let defaults = self
            .default_speeds
            .iter()
            .map(|(context, category, speed_macro)| {
                DefaultSpeedEntry::new()
                    .with_category_checked(category.into())
                    .map_err(|()| SectionBuildError::BitfieldOverflow {
                        field: "category".to_string(),
                        value: category.index(),
                    })
                    .map(|entry| {
                        entry
                            .with_in_city(context.is_in_city())
                            .with_speed_macro(speed_macro.raw())
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let features: Vec<FeatureSpeedEntry> = self
            .features
            .iter()
            .map(|speed| {
                FeatureSpeedEntry::new()
                    .with_feature_id(speed.feature_id)
                    .with_forward(speed.forward.raw())
                    .with_backward(speed.backward.map_or(0, SpeedMacro::raw))
            })
            .collect();

        let header = MaxspeedsSectionHeaderBuilder {
            feature_count: features.len(),
            bidirectional_count: features.iter().filter(|entry| entry.backward() != 0).count(),
            default_count: defaults.len(),
        }
        .build()?;

        let mut bytes = Vec::with_capacity(header.section_size() as usize);
        bytes.extend_from_slice(header.as_bytes());
        bytes.extend(defaults.iter().flat_map(|value| value.as_bytes()));
        bytes.extend(features.iter().flat_map(|value| value.as_bytes()));

        Ok(bytes)
    }
}
