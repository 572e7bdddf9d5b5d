//! Component types and branchless negation.
//!
//! A [`Lane`] is one component of a vector value. Negation is never applied
//! at fetch time; the fetched value carries a flag and each consumer calls
//! [`Lane::negate_if`], which is a select without a branch:
//!
//! - floats flip the sign bit,
//! - integers compute `(x ^ m) - m` with `m = -(flag)`,
//! - bitmasks are complemented.

use byteorder::{ByteOrder, LittleEndian};

/// One component of a [`Vector`](crate::Vector).
pub trait Lane: Copy + Default + PartialEq + std::fmt::Debug + Send + Sync + 'static {
    /// Number of 4-byte elements one component occupies.
    const ELEMENTS: usize;

    /// Value reported when an operation is unsupported for this type.
    const SENTINEL: Self;

    /// Negate when `negate` is set, without branching.
    fn negate_if(self, negate: bool) -> Self;

    /// Whether the component counts as true.
    fn is_nonzero(self) -> bool;

    /// Read from exactly `4 * ELEMENTS` little-endian bytes.
    fn read_le(bytes: &[u8]) -> Self;

    /// Write into exactly `4 * ELEMENTS` little-endian bytes.
    fn write_le(self, bytes: &mut [u8]);
}

impl Lane for f32 {
    const ELEMENTS: usize = 1;
    const SENTINEL: Self = f32::NAN;

    #[inline]
    fn negate_if(self, negate: bool) -> Self {
        f32::from_bits(self.to_bits() ^ ((negate as u32) << 31))
    }

    #[inline]
    fn is_nonzero(self) -> bool {
        self != 0.0
    }

    #[inline]
    fn read_le(bytes: &[u8]) -> Self {
        LittleEndian::read_f32(bytes)
    }

    #[inline]
    fn write_le(self, bytes: &mut [u8]) {
        LittleEndian::write_f32(bytes, self);
    }
}

impl Lane for f64 {
    const ELEMENTS: usize = 2;
    const SENTINEL: Self = f64::NAN;

    #[inline]
    fn negate_if(self, negate: bool) -> Self {
        f64::from_bits(self.to_bits() ^ ((negate as u64) << 63))
    }

    #[inline]
    fn is_nonzero(self) -> bool {
        self != 0.0
    }

    #[inline]
    fn read_le(bytes: &[u8]) -> Self {
        LittleEndian::read_f64(bytes)
    }

    #[inline]
    fn write_le(self, bytes: &mut [u8]) {
        LittleEndian::write_f64(bytes, self);
    }
}

impl Lane for i32 {
    const ELEMENTS: usize = 1;
    const SENTINEL: Self = 0;

    #[inline]
    fn negate_if(self, negate: bool) -> Self {
        let mask = (negate as i32).wrapping_neg();
        (self ^ mask).wrapping_sub(mask)
    }

    #[inline]
    fn is_nonzero(self) -> bool {
        self != 0
    }

    #[inline]
    fn read_le(bytes: &[u8]) -> Self {
        LittleEndian::read_i32(bytes)
    }

    #[inline]
    fn write_le(self, bytes: &mut [u8]) {
        LittleEndian::write_i32(bytes, self);
    }
}

impl Lane for i64 {
    const ELEMENTS: usize = 2;
    const SENTINEL: Self = 0;

    #[inline]
    fn negate_if(self, negate: bool) -> Self {
        let mask = (negate as i64).wrapping_neg();
        (self ^ mask).wrapping_sub(mask)
    }

    #[inline]
    fn is_nonzero(self) -> bool {
        self != 0
    }

    #[inline]
    fn read_le(bytes: &[u8]) -> Self {
        LittleEndian::read_i64(bytes)
    }

    #[inline]
    fn write_le(self, bytes: &mut [u8]) {
        LittleEndian::write_i64(bytes, self);
    }
}

/// Bool32 bitmask component. Negation is the bitwise complement.
impl Lane for u32 {
    const ELEMENTS: usize = 1;
    const SENTINEL: Self = 0xDEAD_BEEF;

    #[inline]
    fn negate_if(self, negate: bool) -> Self {
        self ^ (negate as u32).wrapping_neg()
    }

    #[inline]
    fn is_nonzero(self) -> bool {
        self != 0
    }

    #[inline]
    fn read_le(bytes: &[u8]) -> Self {
        LittleEndian::read_u32(bytes)
    }

    #[inline]
    fn write_le(self, bytes: &mut [u8]) {
        LittleEndian::write_u32(bytes, self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_negation_flips_sign_bit_only() {
        for x in [0.0f32, -0.0, 1.5, -7.25, f32::INFINITY, f32::MIN_POSITIVE] {
            assert_eq!(x.negate_if(true).to_bits(), (-x).to_bits());
            assert_eq!(x.negate_if(false).to_bits(), x.to_bits());
        }
        assert_eq!(2.5f64.negate_if(true), -2.5);
    }

    #[test]
    fn test_integer_negation_is_twos_complement() {
        for x in [0i32, 1, -1, 42, i32::MAX] {
            assert_eq!(x.negate_if(true), -x);
            assert_eq!(x.negate_if(false), x);
        }
        assert_eq!(i32::MIN.negate_if(true), i32::MIN.wrapping_neg());
        assert_eq!(9i64.negate_if(true), -9);
    }

    #[test]
    fn test_bitmask_negation_is_complement() {
        assert_eq!(0x0F0Fu32.negate_if(true), !0x0F0Fu32);
        assert_eq!(0x0F0Fu32.negate_if(false), 0x0F0F);
    }

    #[test]
    fn test_le_round_trip() {
        let mut buf = [0u8; 8];
        (-3.5f64).write_le(&mut buf);
        assert_eq!(f64::read_le(&buf), -3.5);
        0x1234_5678u32.write_le(&mut buf[..4]);
        assert_eq!(buf[0], 0x78);
    }
}
