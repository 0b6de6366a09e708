use zerocopy::{LE, U32};
use zerocopy_derive::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

mod builder;

pub(crate) use builder::MaxspeedsSectionHeaderBuilder;

/// Identifies a maxspeeds section.
pub const MAGIC: [u8; 4] = *b"MXSP";

/// The only layout version this crate reads and writes.
pub const SECTION_VERSION: u8 = 1;

/// Default speeds are stored for roads outside and inside of cities.
pub const CONTEXT_COUNT: u8 = 2;

/// The fixed-size header at the start of every maxspeeds section.
#[derive(
    FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned, Debug, Clone, Copy, PartialEq, Eq,
)]
#[repr(C)]
pub struct MaxspeedsSectionHeader {
    magic: [u8; 4],
    version: u8,
    context_count: u8,
    _spare: [u8; 2],
    feature_count: U32<LE>,
    bidirectional_count: U32<LE>,
    default_count: U32<LE>,
    defaults_offset: U32<LE>,
    features_offset: U32<LE>,
    section_size: U32<LE>,
}

impl MaxspeedsSectionHeader {
    #[inline]
    pub const fn magic(&self) -> [u8; 4] {
        self.magic
    }

    /// The layout version of the section.
    #[inline]
    pub const fn version(&self) -> u8 {
        self.version
    }

    /// The number of urban contexts default speeds are stored for.
    #[inline]
    pub const fn context_count(&self) -> u8 {
        self.context_count
    }

    /// The number of per-feature speed entries.
    #[inline]
    pub const fn feature_count(&self) -> u32 {
        self.feature_count.get()
    }

    /// The number of features with a distinct backward speed.
    #[inline]
    pub const fn bidirectional_count(&self) -> u32 {
        self.bidirectional_count.get()
    }

    /// The number of default speed entries (over all contexts).
    #[inline]
    pub const fn default_count(&self) -> u32 {
        self.default_count.get()
    }

    /// Offset of the default speed table, from the start of the section.
    #[inline]
    pub const fn defaults_offset(&self) -> u32 {
        self.defaults_offset.get()
    }

    /// Offset of the feature speed table, from the start of the section.
    #[inline]
    pub const fn features_offset(&self) -> u32 {
        self.features_offset.get()
    }

    /// Total size of the section, including the header.
    #[inline]
    pub const fn section_size(&self) -> u32 {
        self.section_size.get()
    }
}
