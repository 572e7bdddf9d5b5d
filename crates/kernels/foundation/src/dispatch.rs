//! Dispatch keys: one discriminant for datatype × vector size × negation.
//!
//! Every vectorized operation switches on a single [`DispatchKey`] instead of
//! branching on datatype, size and sign separately. The key is a byte:
//!
//! ```text
//!  7   6   5   4   3   2   1   0
//! ┌───┬───┬───────────┬───┬───────┐
//! │ 0 │ 0 │ datatype  │neg│ size  │
//! └───┴───┴───────────┴───┴───────┘
//! ```
//!
//! `size` is the 2-bit tag where `0` means 4. The enum is closed: adding a
//! datatype forces every `match` over keys to be revisited.

use crate::datatype::{DataType, Shape, VectorSize};
use crate::error::FoundationError;

/// Byte encoding of a key. Used for the enum discriminants.
const fn encode_key(datatype: DataType, size: VectorSize, negated: bool) -> u8 {
    ((datatype as u8) << 3) | ((negated as u8) << 2) | size.tag()
}

macro_rules! dispatch_keys {
    ($($(#[$doc:meta])* $variant:ident => ($datatype:ident, $size:ident, $negated:literal),)*) => {
        /// Closed set of (datatype, vector size, negation) combinations.
        ///
        /// Variant names read as `<type><size>`: `F` numeric f32, `I` id i32,
        /// `B` bool32, `D` numeric f64, `L` id i64. `Neg` marks a negated operand.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u8)]
        pub enum DispatchKey {
            $($(#[$doc])* $variant = encode_key(DataType::$datatype, VectorSize::$size, $negated),)*
        }

        impl DispatchKey {
            /// Every key, in declaration order.
            pub const ALL: &'static [DispatchKey] = &[$(DispatchKey::$variant,)*];

            /// Combine datatype, size and negation into a key.
            ///
            /// Total over its domain: every input maps to exactly one key.
            #[inline]
            pub const fn combine(datatype: DataType, size: VectorSize, negated: bool) -> Self {
                match (datatype, size, negated) {
                    $((DataType::$datatype, VectorSize::$size, $negated) => DispatchKey::$variant,)*
                }
            }
        }
    };
}

dispatch_keys! {
    F1 => (Numeric, One, false),
    F2 => (Numeric, Two, false),
    F3 => (Numeric, Three, false),
    F4 => (Numeric, Four, false),
    NegF1 => (Numeric, One, true),
    NegF2 => (Numeric, Two, true),
    NegF3 => (Numeric, Three, true),
    NegF4 => (Numeric, Four, true),
    I1 => (Id, One, false),
    I2 => (Id, Two, false),
    I3 => (Id, Three, false),
    I4 => (Id, Four, false),
    NegI1 => (Id, One, true),
    NegI2 => (Id, Two, true),
    NegI3 => (Id, Three, true),
    NegI4 => (Id, Four, true),
    B1 => (Bool32, One, false),
    /// Multi-component bitmasks are encodable but never supported.
    B2 => (Bool32, Two, false),
    B3 => (Bool32, Three, false),
    B4 => (Bool32, Four, false),
    NegB1 => (Bool32, One, true),
    NegB2 => (Bool32, Two, true),
    NegB3 => (Bool32, Three, true),
    NegB4 => (Bool32, Four, true),
    D1 => (Numeric64, One, false),
    D2 => (Numeric64, Two, false),
    D3 => (Numeric64, Three, false),
    D4 => (Numeric64, Four, false),
    NegD1 => (Numeric64, One, true),
    NegD2 => (Numeric64, Two, true),
    NegD3 => (Numeric64, Three, true),
    NegD4 => (Numeric64, Four, true),
    L1 => (Id64, One, false),
    L2 => (Id64, Two, false),
    L3 => (Id64, Three, false),
    L4 => (Id64, Four, false),
    NegL1 => (Id64, One, true),
    NegL2 => (Id64, Two, true),
    NegL3 => (Id64, Three, true),
    NegL4 => (Id64, Four, true),
}

/// Free-function form of [`DispatchKey::combine`].
#[inline]
pub const fn combine(datatype: DataType, size: VectorSize, negated: bool) -> DispatchKey {
    DispatchKey::combine(datatype, size, negated)
}

impl DispatchKey {
    /// Key for a shape.
    #[inline]
    pub const fn of(shape: Shape, negated: bool) -> Self {
        Self::combine(shape.datatype, shape.size, negated)
    }

    /// Raw byte value.
    #[inline]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Decode a key byte.
    ///
    /// # Errors
    ///
    /// Returns [`FoundationError::InvalidDispatchKey`] for bytes outside the
    /// image of [`DispatchKey::combine`].
    pub fn from_byte(byte: u8) -> Result<Self, FoundationError> {
        let datatype =
            DataType::from_bits(byte >> 3).map_err(|_| FoundationError::InvalidDispatchKey(byte))?;
        Ok(Self::combine(
            datatype,
            VectorSize::from_tag(byte),
            byte & 0b100 != 0,
        ))
    }

    /// Datatype component.
    #[inline]
    pub const fn datatype(self) -> DataType {
        match (self as u8) >> 3 {
            0 => DataType::Numeric,
            1 => DataType::Id,
            2 => DataType::Bool32,
            3 => DataType::Numeric64,
            _ => DataType::Id64,
        }
    }

    /// Vector size component.
    #[inline]
    pub const fn size(self) -> VectorSize {
        VectorSize::from_tag(self as u8)
    }

    /// Negation flag.
    #[inline]
    pub const fn is_negated(self) -> bool {
        (self as u8) & 0b100 != 0
    }

    /// Shape component.
    #[inline]
    pub const fn shape(self) -> Shape {
        Shape::new(self.datatype(), self.size())
    }

    /// Same key without negation.
    #[inline]
    pub const fn positive(self) -> Self {
        Self::combine(self.datatype(), self.size(), false)
    }
}

impl std::fmt::Display for DispatchKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_negated() {
            write!(f, "-{}", self.shape())
        } else {
            write!(f, "{}", self.shape())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_combine_is_total_and_injective() {
        let mut seen = HashSet::new();
        for datatype in DataType::ALL {
            for size in VectorSize::ALL {
                for negated in [false, true] {
                    let key = combine(datatype, size, negated);
                    assert!(seen.insert(key.as_byte()), "duplicate key {key:?}");
                    assert_eq!(key.datatype(), datatype);
                    assert_eq!(key.size(), size);
                    assert_eq!(key.is_negated(), negated);
                }
            }
        }
        assert_eq!(seen.len(), DispatchKey::ALL.len());
    }

    #[test]
    fn test_from_byte_round_trip() {
        for key in DispatchKey::ALL {
            assert_eq!(DispatchKey::from_byte(key.as_byte()).unwrap(), *key);
        }
        assert!(DispatchKey::from_byte(0xFF).is_err());
    }

    #[test]
    fn test_size_four_uses_legacy_zero_tag() {
        assert_eq!(DispatchKey::F4.as_byte() & 0b11, 0);
        assert_eq!(DispatchKey::F4.size(), VectorSize::Four);
    }

    #[test]
    fn test_positive_strips_negation() {
        assert_eq!(DispatchKey::NegI3.positive(), DispatchKey::I3);
        assert_eq!(DispatchKey::D2.positive(), DispatchKey::D2);
    }
}
