//! Per-element metadata byte format.
//!
//! The metadata segment holds one byte per 4-byte element of data and stack.
//! Each byte records the datatype and vector size of the value that element
//! belongs to:
//!
//! ```text
//!  7      4 3      0
//! ┌────────┬────────┐
//! │  size  │datatype│
//! └────────┴────────┘
//! ```
//!
//! Size `0` is accepted as the legacy encoding of 4.

use crate::datatype::{DataType, Shape, VectorSize};
use crate::error::FoundationError;

/// Encode a shape into a metadata byte.
#[inline]
pub const fn encode_metadata(shape: Shape) -> u8 {
    ((shape.size as u8) << 4) | (shape.datatype as u8)
}

/// Decode a metadata byte.
///
/// # Errors
///
/// Returns [`FoundationError::InvalidDataType`] if the low nibble is not a
/// datatype and [`FoundationError::InvalidVectorSize`] if the high nibble is
/// above 4.
pub fn decode_metadata(byte: u8) -> Result<Shape, FoundationError> {
    let datatype = DataType::from_bits(byte & 0x0F)?;
    let size = match byte >> 4 {
        0 | 4 => VectorSize::Four,
        1 => VectorSize::One,
        2 => VectorSize::Two,
        3 => VectorSize::Three,
        other => return Err(FoundationError::InvalidVectorSize(other as usize)),
    };
    Ok(Shape::new(datatype, size))
}

/// Write `shape` into the metadata bytes of every element the value covers,
/// starting at `element`.
///
/// Returns `false` (and writes nothing) if the range does not fit.
pub fn tag_elements(metadata: &mut [u8], element: usize, shape: Shape) -> bool {
    let end = element + shape.elements();
    match metadata.get_mut(element..end) {
        Some(bytes) => {
            bytes.fill(encode_metadata(shape));
            true
        }
        None => false,
    }
}
