//! Element datatypes and vector sizes.
//!
//! Every value the VM touches is described by a [`DataType`] and a
//! [`VectorSize`]. Together they form a [`Shape`], which decides how many
//! 4-byte data elements a value occupies and which dispatch arm handles it.

use serde::{Deserialize, Serialize};

use crate::error::FoundationError;

/// Size in bytes of one data/stack element.
pub const ELEMENT_SIZE: usize = 4;

/// Datatype of a data-segment element.
///
/// The discriminants are part of the metadata byte format and of the
/// dispatch key encoding; they must never be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum DataType {
    /// 32-bit float component.
    Numeric = 0,
    /// 32-bit signed integer component.
    Id = 1,
    /// 32-bit bitmask. Always a single component.
    Bool32 = 2,
    /// 64-bit float component (two elements per component).
    Numeric64 = 3,
    /// 64-bit signed integer component (two elements per component).
    Id64 = 4,
}

impl DataType {
    /// All datatypes in discriminant order.
    pub const ALL: [DataType; 5] = [
        DataType::Numeric,
        DataType::Id,
        DataType::Bool32,
        DataType::Numeric64,
        DataType::Id64,
    ];

    /// Decode a datatype from its 4-bit tag.
    pub fn from_bits(bits: u8) -> Result<Self, FoundationError> {
        match bits {
            0 => Ok(DataType::Numeric),
            1 => Ok(DataType::Id),
            2 => Ok(DataType::Bool32),
            3 => Ok(DataType::Numeric64),
            4 => Ok(DataType::Id64),
            other => Err(FoundationError::InvalidDataType(other)),
        }
    }

    /// Number of 4-byte elements one component of this type occupies.
    #[inline]
    pub const fn elements_per_component(self) -> usize {
        match self {
            DataType::Numeric | DataType::Id | DataType::Bool32 => 1,
            DataType::Numeric64 | DataType::Id64 => 2,
        }
    }

    /// Whether components are 64 bits wide.
    #[inline]
    pub const fn is_64bit(self) -> bool {
        matches!(self, DataType::Numeric64 | DataType::Id64)
    }

    /// Whether the type is a floating point type.
    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, DataType::Numeric | DataType::Numeric64)
    }
}

/// Number of components in a value, 1 to 4.
///
/// Packed encodings only have two bits for the size, so size 4 is written as
/// tag `0`. [`VectorSize::from_tag`] and [`VectorSize::tag`] own that quirk;
/// nothing else should special-case it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum VectorSize {
    One = 1,
    Two = 2,
    Three = 3,
    Four = 4,
}

impl VectorSize {
    /// All sizes in ascending order.
    pub const ALL: [VectorSize; 4] = [
        VectorSize::One,
        VectorSize::Two,
        VectorSize::Three,
        VectorSize::Four,
    ];

    /// Decode a 2-bit size tag. Tag `0` is the legacy encoding of size 4.
    #[inline]
    pub const fn from_tag(tag: u8) -> Self {
        match tag & 0b11 {
            1 => VectorSize::One,
            2 => VectorSize::Two,
            3 => VectorSize::Three,
            _ => VectorSize::Four,
        }
    }

    /// Encode as a 2-bit tag (4 becomes 0).
    #[inline]
    pub const fn tag(self) -> u8 {
        (self as u8) & 0b11
    }

    /// Build from a component count.
    pub fn from_count(count: usize) -> Result<Self, FoundationError> {
        match count {
            1 => Ok(VectorSize::One),
            2 => Ok(VectorSize::Two),
            3 => Ok(VectorSize::Three),
            4 => Ok(VectorSize::Four),
            other => Err(FoundationError::InvalidVectorSize(other)),
        }
    }

    /// Component count.
    #[inline]
    pub const fn get(self) -> usize {
        self as usize
    }
}

/// Datatype plus vector size of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
    pub datatype: DataType,
    pub size: VectorSize,
}

impl Shape {
    pub const fn new(datatype: DataType, size: VectorSize) -> Self {
        Self { datatype, size }
    }

    /// Single-component shape of the given type.
    pub const fn scalar(datatype: DataType) -> Self {
        Self::new(datatype, VectorSize::One)
    }

    /// Number of 4-byte elements the value occupies.
    #[inline]
    pub const fn elements(self) -> usize {
        self.size.get() * self.datatype.elements_per_component()
    }

    /// Number of bytes the value occupies.
    #[inline]
    pub const fn byte_size(self) -> usize {
        self.elements() * ELEMENT_SIZE
    }

    /// Whether the VM can represent a value of this shape.
    ///
    /// Bool32 is a single bitmask; multi-component bitmasks do not exist.
    #[inline]
    pub const fn is_representable(self) -> bool {
        !matches!(self.datatype, DataType::Bool32) || matches!(self.size, VectorSize::One)
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self.datatype {
            DataType::Numeric => "numeric",
            DataType::Id => "id",
            DataType::Bool32 => "bool32",
            DataType::Numeric64 => "numeric64",
            DataType::Id64 => "id64",
        };
        match self.size {
            VectorSize::One => write!(f, "{name}"),
            size => write!(f, "{name}{}", size.get()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_tag_legacy_four() {
        assert_eq!(VectorSize::Four.tag(), 0);
        assert_eq!(VectorSize::from_tag(0), VectorSize::Four);
        for size in VectorSize::ALL {
            assert_eq!(VectorSize::from_tag(size.tag()), size);
        }
    }

    #[test]
    fn test_datatype_bits_round_trip() {
        for dt in DataType::ALL {
            assert_eq!(DataType::from_bits(dt as u8).unwrap(), dt);
        }
        assert!(DataType::from_bits(9).is_err());
    }

    #[test]
    fn test_shape_elements() {
        assert_eq!(Shape::new(DataType::Numeric, VectorSize::Three).elements(), 3);
        assert_eq!(Shape::new(DataType::Numeric64, VectorSize::Two).elements(), 4);
        assert_eq!(Shape::new(DataType::Id64, VectorSize::Four).byte_size(), 32);
        assert!(!Shape::new(DataType::Bool32, VectorSize::Two).is_representable());
    }

    #[test]
    fn test_shape_display() {
        assert_eq!(Shape::scalar(DataType::Numeric).to_string(), "numeric");
        assert_eq!(Shape::new(DataType::Id, VectorSize::Four).to_string(), "id4");
    }
}
