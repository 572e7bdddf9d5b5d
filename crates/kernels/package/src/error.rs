//! Package layout errors.
//!
//! Every layout invariant violation surfaces as a [`PackageError`]. Offset
//! arithmetic never falls back to zero sizes or empty slices on bad input.

use thiserror::Error;
use vexel_foundation::FoundationError;

use crate::layout::{LaneSplit, PackagingMode, SegmentKind};

/// Package result type alias.
pub type Result<T> = std::result::Result<T, PackageError>;

#[derive(Debug, Error)]
pub enum PackageError {
    /// The package header was never written.
    #[error("package is not initialized")]
    NotInitialized,

    /// A block required by the packaging mode is missing or was freed.
    #[error("package block is not allocated")]
    NotAllocated,

    /// The package is still in the intermediate staging mode.
    #[error("package has not been linked (mode {0})")]
    NotLinked(PackagingMode),

    /// The operation does not support this packaging mode.
    #[error("operation not supported for packaging mode {0}")]
    UnsupportedMode(PackagingMode),

    /// Offsets decrease within a block.
    #[error("non-monotonic offsets for {mode}: {offsets:?}")]
    NonMonotonicOffsets {
        mode: PackagingMode,
        offsets: [u16; 4],
    },

    /// The metadata segment has fewer bytes than data and stack elements.
    #[error("metadata segment holds {metadata} bytes but {required} elements need tagging")]
    MetadataTooSmall { metadata: usize, required: usize },

    /// A segment does not fit a 16-bit offset.
    #[error("{segment} size {size} overflows the 16-bit layout")]
    LayoutOverflow { segment: &'static str, size: usize },

    /// Data or stack size is not a whole number of elements.
    #[error("{segment} size {size} is not a multiple of 4")]
    Misaligned { segment: &'static str, size: usize },

    /// A block's length disagrees with the header.
    #[error("block {block} is {actual} bytes, header expects {expected}")]
    BlockSizeMismatch {
        block: char,
        expected: usize,
        actual: usize,
    },

    /// Allocation of a block failed.
    #[error("failed to allocate {size} bytes aligned to {align}")]
    Allocation { size: usize, align: usize },

    /// A byte range inside a segment is out of bounds.
    #[error("{kind} access at {offset}..{end} out of bounds (segment is {len} bytes)")]
    OutOfBounds {
        kind: SegmentKind,
        offset: usize,
        end: usize,
        len: usize,
    },

    /// A lane buffer was replicated from a package with a different layout.
    #[error("lane buffer split {found:?} does not match package split {expected:?}")]
    LaneSplitMismatch {
        expected: LaneSplit,
        found: LaneSplit,
    },

    #[error("lane count must be at least 1")]
    InvalidLaneCount,

    #[error("invalid packaging mode byte: {0}")]
    InvalidMode(u8),

    #[error("invalid allocator byte: {0}")]
    InvalidAllocator(u8),

    #[error("invalid package flags: {0:#04x}")]
    InvalidFlags(u8),

    #[error("not a package file (bad magic)")]
    BadMagic,

    #[error("unsupported package file format version {0}")]
    UnsupportedFormatVersion(u8),

    #[error(transparent)]
    Foundation(#[from] FoundationError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
