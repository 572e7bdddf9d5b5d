//! Single-byte count packing.
//!
//! Variadic instructions carry their operand count and result shape in one
//! byte following the opcode.
//!
//! - **decode62**: 6-bit count, 2-bit size tag. Used by the N-ary builtins.
//! - **decode44**: 4-bit count, 4-bit shape tag (size in bits 0–1, datatype in
//!   bits 2–3). Used by `PushV`. Only Numeric, Id and Bool32 fit the tag.

use crate::datatype::{DataType, Shape, VectorSize};
use crate::error::FoundationError;

/// Largest count a decode62 byte holds.
pub const MAX_COUNT_62: usize = 0x3F;

/// Largest count a decode44 byte holds.
pub const MAX_COUNT_44: usize = 0x0F;

/// Unpacked decode62 byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packed62 {
    pub count: usize,
    pub size: VectorSize,
}

/// Unpacked decode44 byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packed44 {
    pub count: usize,
    pub shape: Shape,
}

/// Split a decode62 byte into count and vector size.
#[inline]
pub const fn decode62(byte: u8) -> Packed62 {
    Packed62 {
        count: (byte & 0x3F) as usize,
        size: VectorSize::from_tag(byte >> 6),
    }
}

/// Pack a count and vector size into a decode62 byte.
pub fn encode62(count: usize, size: VectorSize) -> Result<u8, FoundationError> {
    if count > MAX_COUNT_62 {
        return Err(FoundationError::CountOverflow {
            count,
            max: MAX_COUNT_62,
        });
    }
    Ok((size.tag() << 6) | count as u8)
}

/// Split a decode44 byte into count and shape.
///
/// # Errors
///
/// [`FoundationError::InvalidDataType`] when the datatype bits hold the
/// unused value 3.
pub fn decode44(byte: u8) -> Result<Packed44, FoundationError> {
    let tag = byte >> 4;
    let datatype = match (tag >> 2) & 0b11 {
        0 => DataType::Numeric,
        1 => DataType::Id,
        2 => DataType::Bool32,
        other => return Err(FoundationError::InvalidDataType(other)),
    };
    Ok(Packed44 {
        count: (byte & 0x0F) as usize,
        shape: Shape::new(datatype, VectorSize::from_tag(tag)),
    })
}

/// Pack a count and shape into a decode44 byte.
///
/// # Errors
///
/// [`FoundationError::CountOverflow`] past [`MAX_COUNT_44`] and
/// [`FoundationError::UnpackableShape`] for 64-bit datatypes.
pub fn encode44(count: usize, shape: Shape) -> Result<u8, FoundationError> {
    if count > MAX_COUNT_44 {
        return Err(FoundationError::CountOverflow {
            count,
            max: MAX_COUNT_44,
        });
    }
    let datatype_bits = match shape.datatype {
        DataType::Numeric => 0,
        DataType::Id => 1,
        DataType::Bool32 => 2,
        DataType::Numeric64 | DataType::Id64 => {
            return Err(FoundationError::UnpackableShape(shape))
        }
    };
    let tag = (datatype_bits << 2) | shape.size.tag();
    Ok((tag << 4) | count as u8)
}
