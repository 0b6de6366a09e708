use super::{CONTEXT_COUNT, MAGIC, MaxspeedsSectionHeader, SECTION_VERSION};
use crate::section::{DefaultSpeedEntry, FeatureSpeedEntry, SectionBuildError};
use zerocopy::{LE, U32};

/// Derives a consistent header from the table sizes.
///
/// Offsets are not self-reported; they follow from the counts,
/// since the tables are laid out back to back right after the header.
pub(crate) struct MaxspeedsSectionHeaderBuilder {
    pub feature_count: usize,
    pub bidirectional_count: usize,
    pub default_count: usize,
}

impl MaxspeedsSectionHeaderBuilder {
    pub(crate) fn build(self) -> Result<MaxspeedsSectionHeader, SectionBuildError> {
        let defaults_offset = size_of::<MaxspeedsSectionHeader>();
        let features_offset = defaults_offset + self.default_count * size_of::<DefaultSpeedEntry>();
        let section_size = features_offset + self.feature_count * size_of::<FeatureSpeedEntry>();

        Ok(MaxspeedsSectionHeader {
            magic: MAGIC,
            version: SECTION_VERSION,
            context_count: CONTEXT_COUNT,
            _spare: [0; 2],
            feature_count: U32::<LE>::new(u32::try_from(self.feature_count)?),
            bidirectional_count: U32::<LE>::new(u32::try_from(self.bidirectional_count)?),
            default_count: U32::<LE>::new(u32::try_from(self.default_count)?),
            defaults_offset: U32::<LE>::new(u32::try_from(defaults_offset)?),
            features_offset: U32::<LE>::new(u32::try_from(features_offset)?),
            section_size: U32::<LE>::new(u32::try_from(section_size)?),
        })
    }
}
