//! Helpers for converting between native integers and zerocopy endian-aware wrappers.
//!
//! `bitfield-struct` wants plain `const fn` conversions for its `from`/`into` hooks,
//! and the zerocopy wrappers only expose inherent methods,
//! so each supported width gets a tiny module with a pair of free functions.

macro_rules! le_conversions {
    ($module:ident, $native:ty, $wrapper:ident) => {
        #[doc = concat!(
            "Conversions between `",
            stringify!($native),
            "` and its little-endian wrapper."
        )]
        pub mod $module {
            use zerocopy::{$wrapper, LE};

            #[inline]
            pub const fn from_inner(n: $native) -> $wrapper<LE> {
                $wrapper::<LE>::new(n)
            }

            #[inline]
            pub const fn into_inner(v: $wrapper<LE>) -> $native {
                v.get()
            }
        }
    };
}

le_conversions!(conv_u64le, u64, U64);
le_conversions!(conv_u16le, u16, U16);

#[cfg(test)]
mod tests {
    use super::*;
    use zerocopy::IntoBytes;

    #[test]
    fn conversions_are_little_endian() {
        assert_eq!(conv_u16le::from_inner(0x0102).as_bytes(), &[0x02, 0x01]);
        assert_eq!(conv_u64le::from_inner(1).as_bytes(), &[1, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn conversions_round_trip() {
        for value in [0, 1, 42, u64::MAX] {
            assert_eq!(conv_u64le::into_inner(conv_u64le::from_inner(value)), value);
        }
        assert_eq!(conv_u16le::into_inner(conv_u16le::from_inner(u16::MAX)), u16::MAX);
    }
}
