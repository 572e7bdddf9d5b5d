//! The `.vxp` package file format.
//!
//! ```text
//! "VXPK"            4-byte magic
//! format version    u8
//! header            12 bytes (see header.rs)
//! block A length    u32 LE, then the bytes
//! block B length    u32 LE, then the bytes (length 0 when absent)
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::debug;

use crate::block::{AllocatorTag, Block};
use crate::error::{PackageError, Result};
use crate::header::PackageHeader;
use crate::layout::PackagingMode;
use crate::package::Package;

pub const MAGIC: &[u8; 4] = b"VXPK";
pub const FORMAT_VERSION: u8 = 1;

/// Serialize a package.
pub fn write_package<W: Write>(writer: &mut W, package: &Package) -> Result<()> {
    if !package.is_initialized() {
        return Err(PackageError::NotInitialized);
    }
    let code = package.code_block().ok_or(PackageError::NotAllocated)?;
    writer.write_all(MAGIC)?;
    writer.write_u8(FORMAT_VERSION)?;
    package.header().write_to(writer)?;
    write_block(writer, Some(code))?;
    write_block(writer, package.data_block())?;
    Ok(())
}

fn write_block<W: Write>(writer: &mut W, block: Option<&Block>) -> Result<()> {
    let bytes = block.map_or(&[][..], Block::as_slice);
    let len = u32::try_from(bytes.len()).map_err(|_| PackageError::LayoutOverflow {
        segment: "block",
        size: bytes.len(),
    })?;
    writer.write_u32::<LittleEndian>(len)?;
    writer.write_all(bytes)?;
    Ok(())
}

/// Deserialize a package, allocating blocks with the allocator recorded in
/// its header.
pub fn read_package<R: Read>(reader: &mut R) -> Result<Package> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(PackageError::BadMagic);
    }
    let version = reader.read_u8()?;
    if version != FORMAT_VERSION {
        return Err(PackageError::UnsupportedFormatVersion(version));
    }
    let header = PackageHeader::read_from(reader)?;
    let code = read_block(reader, header.allocator)?;
    let data = read_block(reader, header.allocator)?;
    let data = match header.mode() {
        PackagingMode::Combined if data.is_empty() => None,
        _ => Some(data),
    };
    Package::from_parts(header, code, data)
}

fn read_block<R: Read>(reader: &mut R, allocator: AllocatorTag) -> Result<Block> {
    let len = reader.read_u32::<LittleEndian>()? as usize;
    let mut block = Block::zeroed(len, allocator)?;
    reader.read_exact(block.as_mut_slice())?;
    Ok(block)
}

/// Write a package to a file.
pub fn save(path: impl AsRef<Path>, package: &Package) -> Result<()> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    write_package(&mut writer, package)?;
    writer.flush()?;
    debug!(path = %path.display(), mode = %package.mode(), "saved package");
    Ok(())
}

/// Read a package from a file.
pub fn load(path: impl AsRef<Path>) -> Result<Package> {
    let path = path.as_ref();
    let mut reader = BufReader::new(File::open(path)?);
    let package = read_package(&mut reader)?;
    debug!(path = %path.display(), mode = %package.mode(), "loaded package");
    Ok(package)
}
