//! The 12-byte package header.
//!
//! ```text
//! offset  size  field
//!      0     2  O1 (u16 LE)
//!      2     2  O2
//!      4     2  O3
//!      6     2  O4
//!      8     1  packaging mode
//!      9     1  flags
//!     10     1  allocator tag
//!     11     1  language version
//! ```

use std::io::{Read, Write};

use bitflags::bitflags;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use crate::block::AllocatorTag;
use crate::error::{PackageError, Result};
use crate::layout::{Layout, PackagingMode};

/// Encoded header size in bytes.
pub const HEADER_SIZE: usize = 12;

bitflags! {
    /// Package feature flags.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct PackageFlags: u8 {
        /// The package was built without a stack segment.
        const STACK_OMITTED = 1 << 0;
        /// The code calls external functions and needs a registry to run.
        const EXTERNAL_CALLS = 1 << 1;
    }
}

/// Bytecode language revision a package was compiled for.
///
/// Version 0 marks a header that was never written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LanguageVersion(pub u8);

impl LanguageVersion {
    pub const UNINITIALIZED: LanguageVersion = LanguageVersion(0);
    pub const CURRENT: LanguageVersion = LanguageVersion(1);

    #[inline]
    pub fn is_initialized(self) -> bool {
        self != Self::UNINITIALIZED
    }
}

impl std::fmt::Display for LanguageVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Decoded package header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageHeader {
    pub layout: Layout,
    pub flags: PackageFlags,
    pub allocator: AllocatorTag,
    pub language: LanguageVersion,
}

impl PackageHeader {
    pub fn new(layout: Layout, flags: PackageFlags, allocator: AllocatorTag) -> Self {
        Self {
            layout,
            flags,
            allocator,
            language: LanguageVersion::CURRENT,
        }
    }

    #[inline]
    pub fn mode(&self) -> PackagingMode {
        self.layout.mode()
    }

    /// Serialize to the 12-byte wire form.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        for offset in self.layout.offsets() {
            writer.write_u16::<LittleEndian>(offset)?;
        }
        writer.write_u8(self.mode() as u8)?;
        writer.write_u8(self.flags.bits())?;
        writer.write_u8(self.allocator as u8)?;
        writer.write_u8(self.language.0)?;
        Ok(())
    }

    /// Parse the 12-byte wire form.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut offsets = [0u16; 4];
        for offset in &mut offsets {
            *offset = reader.read_u16::<LittleEndian>()?;
        }
        let mode = PackagingMode::from_byte(reader.read_u8()?)?;
        let flags_byte = reader.read_u8()?;
        let flags =
            PackageFlags::from_bits(flags_byte).ok_or(PackageError::InvalidFlags(flags_byte))?;
        let allocator = AllocatorTag::from_byte(reader.read_u8()?)?;
        let language = LanguageVersion(reader.read_u8()?);
        Ok(Self {
            layout: Layout::from_offsets(mode, offsets),
            flags,
            allocator,
            language,
        })
    }

    pub fn to_bytes(&self) -> Result<[u8; HEADER_SIZE]> {
        let mut bytes = [0u8; HEADER_SIZE];
        self.write_to(&mut &mut bytes[..])?;
        Ok(bytes)
    }

    pub fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Result<Self> {
        Self::read_from(&mut &bytes[..])
    }
}
