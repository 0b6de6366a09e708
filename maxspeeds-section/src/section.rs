//! # Maxspeeds section layout
//!
//! A section is a fixed-size [`MaxspeedsSectionHeader`] followed by two tables:
//!
//! - the default speeds, one 16-bit entry per (urban context, category) pair that has one,
//!   sorted by context, then category;
//! - the per-feature speeds, one 64-bit entry per feature, sorted by feature ID.
//!
//! All integers are little-endian, and there is no padding anywhere.
//! Sections are written with [`MaxspeedsSectionBuilder`] and read back with
//! [`MaxspeedsSection`] (borrowed) or [`OwnedMaxspeedsSection`].

use crate::speed_macro::SpeedMacro;
use crate::statistics::DefaultSpeeds;
use crate::{RoadCategory, UrbanContext};
use bitfield_struct::bitfield;
use self_cell::self_cell;
use std::num::TryFromIntError;
use thiserror::Error;
use zerocopy::{FromBytes as _, LE, U16, U64};
use zerocopy_derive::{FromBytes, Immutable, IntoBytes, Unaligned};

mod builder;
mod header;

pub use builder::MaxspeedsSectionBuilder;
pub use header::{CONTEXT_COUNT, MAGIC, MaxspeedsSectionHeader, SECTION_VERSION};

#[derive(Debug, Error)]
pub enum SectionBuildError {
    #[error("Feature {0} has more than one speed entry")]
    DuplicateFeatureId(u32),
    #[error("Value {value} does not fit in the bitfield for {field}")]
    BitfieldOverflow { field: String, value: usize },
    #[error("The section is too large to be addressed: {0}")]
    TooLarge(#[from] TryFromIntError),
}

#[derive(Debug, Error)]
pub enum SectionDecodingError {
    #[error("Data cast failed (this almost always means invalid data): {0}")]
    CastError(String),
    #[error("Not a maxspeeds section (magic bytes {0:?})")]
    BadMagic([u8; 4]),
    #[error("Unsupported section version {0}")]
    UnsupportedVersion(u8),
    #[error("Unsupported number of urban contexts: {0}")]
    UnsupportedContextCount(u8),
    #[error("The header offsets are inconsistent with its counts")]
    InconsistentLayout,
    #[error("Expected a section of {expected} bytes, but got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("Invalid road category {0}")]
    InvalidCategory(u8),
    #[error("Default speed entries are not sorted by context and category")]
    UnsortedDefaults,
    #[error("Feature entries are not sorted by feature ID")]
    UnsortedFeatures,
}

#[bitfield(u16,
    repr = U16<LE>,
    from = bit_twiddling_helpers::conv_u16le::from_inner,
    into = bit_twiddling_helpers::conv_u16le::into_inner
)]
#[derive(PartialEq, Eq, FromBytes, IntoBytes, Immutable, Unaligned)]
pub(crate) struct DefaultSpeedEntry {
    #[bits(5)]
    category: u8,
    #[bits(1)]
    in_city: bool,
    #[bits(2)]
    _spare: u8,
    #[bits(8)]
    speed_macro: u8,
}

impl DefaultSpeedEntry {
    fn context(self) -> UrbanContext {
        UrbanContext::from_in_city(self.in_city())
    }

    fn sort_key(self) -> (UrbanContext, u8) {
        (self.context(), self.category())
    }
}

#[bitfield(u64,
    repr = U64<LE>,
    from = bit_twiddling_helpers::conv_u64le::from_inner,
    into = bit_twiddling_helpers::conv_u64le::into_inner
)]
#[derive(PartialEq, Eq, FromBytes, IntoBytes, Immutable, Unaligned)]
pub(crate) struct FeatureSpeedEntry {
    #[bits(32)]
    feature_id: u32,
    #[bits(8)]
    forward: u8,
    /// Zero (undefined) when the forward speed applies in both directions.
    #[bits(8)]
    backward: u8,
    #[bits(16)]
    _spare: u16,
}

/// The stored speed macros of a single feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FeatureSpeed {
    pub feature_id: u32,
    pub forward: SpeedMacro,
    /// The backward macro, if different from the forward one.
    pub backward: Option<SpeedMacro>,
}

impl From<FeatureSpeedEntry> for FeatureSpeed {
    fn from(value: FeatureSpeedEntry) -> Self {
        let backward = SpeedMacro::from_raw(value.backward());
        Self {
            feature_id: value.feature_id(),
            forward: SpeedMacro::from_raw(value.forward()),
            backward: (!backward.is_undefined()).then_some(backward),
        }
    }
}

/// A read-only view over the bytes of a maxspeeds section.
#[derive(Debug)]
pub struct MaxspeedsSection<'a> {
    header: MaxspeedsSectionHeader,
    features: &'a [FeatureSpeedEntry],
    default_speeds: DefaultSpeeds,
}

impl<'a> TryFrom<&'a [u8]> for MaxspeedsSection<'a> {
    type Error = SectionDecodingError;

    fn try_from(bytes: &'a [u8]) -> Result<Self, Self::Error> {
        const HEADER_SIZE: usize = size_of::<MaxspeedsSectionHeader>();

        let (header, _) = MaxspeedsSectionHeader::read_from_prefix(bytes)
            .map_err(|e| SectionDecodingError::CastError(e.to_string()))?;

        if header.magic() != MAGIC {
            return Err(SectionDecodingError::BadMagic(header.magic()));
        }
        if header.version() != SECTION_VERSION {
            return Err(SectionDecodingError::UnsupportedVersion(header.version()));
        }
        if header.context_count() != CONTEXT_COUNT {
            return Err(SectionDecodingError::UnsupportedContextCount(
                header.context_count(),
            ));
        }

        let feature_count = header.feature_count() as usize;
        let default_count = header.default_count() as usize;
        let defaults_offset = header.defaults_offset() as usize;
        let features_offset = header.features_offset() as usize;
        let section_size = header.section_size() as usize;
        if defaults_offset != HEADER_SIZE
            || features_offset != defaults_offset + default_count * size_of::<DefaultSpeedEntry>()
            || section_size != features_offset + feature_count * size_of::<FeatureSpeedEntry>()
        {
            return Err(SectionDecodingError::InconsistentLayout);
        }
        if bytes.len() != section_size {
            return Err(SectionDecodingError::SizeMismatch {
                expected: section_size,
                actual: bytes.len(),
            });
        }

        let (defaults, buffer) = <[DefaultSpeedEntry]>::ref_from_prefix_with_elems(
            &bytes[defaults_offset..],
            default_count,
        )
        .map_err(|e| SectionDecodingError::CastError(e.to_string()))?;
        let (features, _) = <[FeatureSpeedEntry]>::ref_from_prefix_with_elems(buffer, feature_count)
            .map_err(|e| SectionDecodingError::CastError(e.to_string()))?;

        if !defaults.is_sorted_by(|l, r| l.sort_key() < r.sort_key()) {
            return Err(SectionDecodingError::UnsortedDefaults);
        }
        if !features.is_sorted_by(|l, r| l.feature_id() < r.feature_id()) {
            return Err(SectionDecodingError::UnsortedFeatures);
        }

        let mut default_speeds = DefaultSpeeds::default();
        for entry in defaults {
            let category = RoadCategory::try_from(entry.category())
                .map_err(|_| SectionDecodingError::InvalidCategory(entry.category()))?;
            default_speeds.set(
                category,
                entry.context(),
                SpeedMacro::from_raw(entry.speed_macro()),
            );
        }

        Ok(Self {
            header,
            features,
            default_speeds,
        })
    }
}

impl MaxspeedsSection<'_> {
    #[inline]
    pub fn header(&self) -> &MaxspeedsSectionHeader {
        &self.header
    }

    /// The number of features with a stored speed.
    #[inline]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Looks up the speeds of a feature.
    pub fn get(&self, feature_id: u32) -> Option<FeatureSpeed> {
        self.features
            .binary_search_by_key(&feature_id, |entry| entry.feature_id())
            .ok()
            .map(|index| FeatureSpeed::from(self.features[index]))
    }

    /// Iterates over all feature speeds, in ascending feature ID order.
    pub fn iter(&self) -> impl Iterator<Item = FeatureSpeed> + '_ {
        self.features.iter().map(|entry| FeatureSpeed::from(*entry))
    }

    /// Gets the default speed of a category in the given context.
    #[inline]
    pub fn default_speed(
        &self,
        category: RoadCategory,
        context: UrbanContext,
    ) -> Option<SpeedMacro> {
        self.default_speeds.get(category, context)
    }

    /// Lists the categories with a default speed in the given context, in category order.
    pub fn default_speeds(&self, context: UrbanContext) -> Vec<(RoadCategory, SpeedMacro)> {
        self.default_speeds
            .iter()
            .filter(|(entry_context, _, _)| *entry_context == context)
            .map(|(_, category, speed_macro)| (category, speed_macro))
            .collect()
    }
}

self_cell! {
    /// An owned maxspeeds section.
    ///
    /// An owned section can be constructed from an owned byte array, `Vec<u8>`.
    pub struct OwnedMaxspeedsSection {
        owner: Vec<u8>,
        #[covariant]
        dependent: MaxspeedsSection,
    }
}

impl TryFrom<Vec<u8>> for OwnedMaxspeedsSection {
    type Error = SectionDecodingError;

    fn try_from(value: Vec<u8>) -> Result<Self, Self::Error> {
        OwnedMaxspeedsSection::try_new(value, |data| MaxspeedsSection::try_from(data.as_ref()))
    }
}

impl OwnedMaxspeedsSection {
    #[inline]
    pub fn header(&self) -> &MaxspeedsSectionHeader {
        self.borrow_dependent().header()
    }

    #[inline]
    pub fn get(&self, feature_id: u32) -> Option<FeatureSpeed> {
        self.borrow_dependent().get(feature_id)
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = FeatureSpeed> + '_ {
        self.borrow_dependent().iter()
    }

    #[inline]
    pub fn default_speed(
        &self,
        category: RoadCategory,
        context: UrbanContext,
    ) -> Option<SpeedMacro> {
        self.borrow_dependent().default_speed(category, context)
    }

    #[inline]
    pub fn default_speeds(&self, context: UrbanContext) -> Vec<(RoadCategory, SpeedMacro)> {
        self.borrow_dependent().default_speeds(context)
    }

    /// The raw section bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.borrow_owner()
    }
}
