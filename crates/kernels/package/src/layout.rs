//! Packaging modes and segment offset arithmetic.
//!
//! A package places four segments (code, metadata, data, stack) into one or
//! two blocks. Where each segment lives is described by four 16-bit offsets
//! whose meaning depends on the packaging mode:
//!
//! ```text
//! Combined      A: [code | metadata | data | stack]
//!                   0    O1         O2     O3      O4
//!
//! Batched       A: [code | metadata]      B: [data | stack]
//!                   0    O1         O2        0     O3      O4
//!
//! Segmented     A: [code]                 B: [metadata | data | stack]
//!                   0    O1                   0         O2     O3      O4
//!
//! Intermediate  O1 code size, O2 data size, O3 stack size, O4 variable count
//! ```
//!
//! [`Layout`] models this as a tagged union. Every offset calculation in the
//! workspace goes through this module; callers ask for a [`SegmentLocation`]
//! and never add offsets themselves.

use std::ops::Range;

use serde::{Deserialize, Serialize};
use vexel_foundation::ELEMENT_SIZE;

use crate::error::{PackageError, Result};

/// How segments are distributed over blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PackagingMode {
    /// Everything in one block. Used for single-instance execution.
    Combined = 0,
    /// Code and metadata shared, data and stack per lane.
    Batched = 1,
    /// Code shared, metadata, data and stack per lane.
    Segmented = 2,
    /// Compiler staging area before linking.
    Intermediate = 3,
}

impl PackagingMode {
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0 => Ok(PackagingMode::Combined),
            1 => Ok(PackagingMode::Batched),
            2 => Ok(PackagingMode::Segmented),
            3 => Ok(PackagingMode::Intermediate),
            other => Err(PackageError::InvalidMode(other)),
        }
    }

    /// Whether metadata lives in the per-lane region.
    #[inline]
    pub const fn metadata_per_lane(self) -> bool {
        matches!(self, PackagingMode::Segmented)
    }
}

impl std::fmt::Display for PackagingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            PackagingMode::Combined => "combined",
            PackagingMode::Batched => "batched",
            PackagingMode::Segmented => "segmented",
            PackagingMode::Intermediate => "intermediate",
        })
    }
}

/// One of the four package segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentKind {
    Code,
    Metadata,
    Data,
    Stack,
}

impl SegmentKind {
    pub const ALL: [SegmentKind; 4] = [
        SegmentKind::Code,
        SegmentKind::Metadata,
        SegmentKind::Data,
        SegmentKind::Stack,
    ];
}

impl std::fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SegmentKind::Code => "code",
            SegmentKind::Metadata => "metadata",
            SegmentKind::Data => "data",
            SegmentKind::Stack => "stack",
        })
    }
}

/// Which of the two package blocks a segment lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockId {
    /// Code block (code, and metadata unless Segmented).
    A,
    /// Data block (data and stack, and metadata when Segmented).
    B,
}

/// Byte range of a segment inside a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentLocation {
    pub block: BlockId,
    pub range: Range<usize>,
}

/// Segment sizes in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sizes {
    pub code: usize,
    pub metadata: usize,
    pub data: usize,
    pub stack: usize,
}

impl Sizes {
    /// Data elements.
    #[inline]
    pub fn data_elements(&self) -> usize {
        self.data / ELEMENT_SIZE
    }

    /// Stack capacity in elements.
    #[inline]
    pub fn stack_capacity(&self) -> usize {
        self.stack / ELEMENT_SIZE
    }

    /// Data plus stack elements, each of which needs a metadata byte.
    #[inline]
    pub fn elements(&self) -> usize {
        (self.data + self.stack) / ELEMENT_SIZE
    }
}

/// Split of one lane region into its metadata and memory (data + stack).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaneSplit {
    /// Metadata bytes within the lane (Segmented only).
    pub metadata: Option<Range<usize>>,
    /// Data followed by stack within the lane.
    pub memory: Range<usize>,
    /// Bytes of `memory` that belong to the data segment.
    pub data_len: usize,
}

/// Mode-tagged segment offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Layout {
    Combined {
        metadata_start: u16,
        data_start: u16,
        stack_start: u16,
        total_size: u16,
    },
    Batched {
        metadata_start: u16,
        code_block_size: u16,
        stack_start: u16,
        data_block_size: u16,
    },
    Segmented {
        code_size: u16,
        metadata_size: u16,
        stack_start: u16,
        data_block_size: u16,
    },
    Intermediate {
        code_size: u16,
        data_size: u16,
        stack_size: u16,
        variable_count: u16,
    },
}

impl Default for Layout {
    fn default() -> Self {
        Layout::Intermediate {
            code_size: 0,
            data_size: 0,
            stack_size: 0,
            variable_count: 0,
        }
    }
}

fn to_u16(segment: &'static str, size: usize) -> Result<u16> {
    u16::try_from(size).map_err(|_| PackageError::LayoutOverflow { segment, size })
}

impl Layout {
    /// Rebuild a layout from its mode and raw offsets.
    pub const fn from_offsets(mode: PackagingMode, [o1, o2, o3, o4]: [u16; 4]) -> Self {
        match mode {
            PackagingMode::Combined => Layout::Combined {
                metadata_start: o1,
                data_start: o2,
                stack_start: o3,
                total_size: o4,
            },
            PackagingMode::Batched => Layout::Batched {
                metadata_start: o1,
                code_block_size: o2,
                stack_start: o3,
                data_block_size: o4,
            },
            PackagingMode::Segmented => Layout::Segmented {
                code_size: o1,
                metadata_size: o2,
                stack_start: o3,
                data_block_size: o4,
            },
            PackagingMode::Intermediate => Layout::Intermediate {
                code_size: o1,
                data_size: o2,
                stack_size: o3,
                variable_count: o4,
            },
        }
    }

    /// Staging layout for the compiler.
    pub fn intermediate(code: usize, data: usize, stack: usize, variables: usize) -> Result<Self> {
        Ok(Layout::Intermediate {
            code_size: to_u16("code", code)?,
            data_size: to_u16("data", data)?,
            stack_size: to_u16("stack", stack)?,
            variable_count: to_u16("variable count", variables)?,
        })
    }

    pub const fn mode(&self) -> PackagingMode {
        match self {
            Layout::Combined { .. } => PackagingMode::Combined,
            Layout::Batched { .. } => PackagingMode::Batched,
            Layout::Segmented { .. } => PackagingMode::Segmented,
            Layout::Intermediate { .. } => PackagingMode::Intermediate,
        }
    }

    /// Raw offsets `[O1, O2, O3, O4]`.
    pub const fn offsets(&self) -> [u16; 4] {
        match *self {
            Layout::Combined {
                metadata_start,
                data_start,
                stack_start,
                total_size,
            } => [metadata_start, data_start, stack_start, total_size],
            Layout::Batched {
                metadata_start,
                code_block_size,
                stack_start,
                data_block_size,
            } => [metadata_start, code_block_size, stack_start, data_block_size],
            Layout::Segmented {
                code_size,
                metadata_size,
                stack_start,
                data_block_size,
            } => [code_size, metadata_size, stack_start, data_block_size],
            Layout::Intermediate {
                code_size,
                data_size,
                stack_size,
                variable_count,
            } => [code_size, data_size, stack_size, variable_count],
        }
    }

    #[inline]
    pub const fn o1(&self) -> u16 {
        self.offsets()[0]
    }

    #[inline]
    pub const fn o2(&self) -> u16 {
        self.offsets()[1]
    }

    #[inline]
    pub const fn o3(&self) -> u16 {
        self.offsets()[2]
    }

    #[inline]
    pub const fn o4(&self) -> u16 {
        self.offsets()[3]
    }

    /// Segment sizes implied by the offsets.
    ///
    /// # Errors
    ///
    /// [`PackageError::NotLinked`] for Intermediate layouts, whose offsets are
    /// counts rather than positions, and [`PackageError::NonMonotonicOffsets`]
    /// when offsets decrease within a block.
    pub fn derive_sizes(&self) -> Result<Sizes> {
        let [o1, o2, o3, o4] = self.offsets().map(usize::from);
        let monotonic = match self {
            Layout::Combined { .. } => o1 <= o2 && o2 <= o3 && o3 <= o4,
            Layout::Batched { .. } => o1 <= o2 && o3 <= o4,
            Layout::Segmented { .. } => o2 <= o3 && o3 <= o4,
            Layout::Intermediate { .. } => return Err(PackageError::NotLinked(self.mode())),
        };
        if !monotonic {
            return Err(PackageError::NonMonotonicOffsets {
                mode: self.mode(),
                offsets: self.offsets(),
            });
        }
        Ok(match self {
            Layout::Combined { .. } => Sizes {
                code: o1,
                metadata: o2 - o1,
                data: o3 - o2,
                stack: o4 - o3,
            },
            Layout::Batched { .. } => Sizes {
                code: o1,
                metadata: o2 - o1,
                data: o3,
                stack: o4 - o3,
            },
            Layout::Segmented { .. } => Sizes {
                code: o1,
                metadata: o2,
                data: o3 - o2,
                stack: o4 - o3,
            },
            Layout::Intermediate { .. } => return Err(PackageError::NotLinked(self.mode())),
        })
    }

    /// Inverse of [`Layout::derive_sizes`].
    pub fn encode_sizes(mode: PackagingMode, sizes: Sizes) -> Result<Self> {
        let Sizes {
            code,
            metadata,
            data,
            stack,
        } = sizes;
        let offsets = match mode {
            PackagingMode::Combined => [
                code,
                code + metadata,
                code + metadata + data,
                code + metadata + data + stack,
            ],
            PackagingMode::Batched => [code, code + metadata, data, data + stack],
            PackagingMode::Segmented => [code, metadata, metadata + data, metadata + data + stack],
            PackagingMode::Intermediate => return Err(PackageError::NotLinked(mode)),
        };
        let names = ["code", "metadata", "data", "stack"];
        let mut raw = [0u16; 4];
        for ((slot, size), name) in raw.iter_mut().zip(offsets).zip(names) {
            *slot = to_u16(name, size)?;
        }
        Ok(Self::from_offsets(mode, raw))
    }

    /// Derive sizes and check the element invariants.
    ///
    /// Data and stack must be whole elements and metadata must hold one byte
    /// per data and stack element.
    pub fn validate(&self) -> Result<Sizes> {
        let sizes = self.derive_sizes()?;
        for (segment, size) in [("data", sizes.data), ("stack", sizes.stack)] {
            if size % ELEMENT_SIZE != 0 {
                return Err(PackageError::Misaligned { segment, size });
            }
        }
        if sizes.metadata < sizes.elements() {
            return Err(PackageError::MetadataTooSmall {
                metadata: sizes.metadata,
                required: sizes.elements(),
            });
        }
        Ok(sizes)
    }

    /// Expected lengths of block A and block B (0 when absent).
    pub fn block_sizes(&self) -> Result<(usize, usize)> {
        let sizes = self.derive_sizes()?;
        let [_, o2, _, o4] = self.offsets().map(usize::from);
        Ok(match self.mode() {
            PackagingMode::Combined => (o4, 0),
            PackagingMode::Batched => (o2, o4),
            PackagingMode::Segmented => (sizes.code, o4),
            PackagingMode::Intermediate => return Err(PackageError::NotLinked(self.mode())),
        })
    }

    /// Block and byte range of a segment.
    pub fn locate(&self, kind: SegmentKind) -> Result<SegmentLocation> {
        self.derive_sizes()?;
        let [o1, o2, o3, o4] = self.offsets().map(usize::from);
        let (block, range) = match (self.mode(), kind) {
            (_, SegmentKind::Code) => (BlockId::A, 0..o1),
            (PackagingMode::Combined, SegmentKind::Metadata) => (BlockId::A, o1..o2),
            (PackagingMode::Combined, SegmentKind::Data) => (BlockId::A, o2..o3),
            (PackagingMode::Combined, SegmentKind::Stack) => (BlockId::A, o3..o4),
            (PackagingMode::Batched, SegmentKind::Metadata) => (BlockId::A, o1..o2),
            (PackagingMode::Batched, SegmentKind::Data) => (BlockId::B, 0..o3),
            (PackagingMode::Batched, SegmentKind::Stack) => (BlockId::B, o3..o4),
            (PackagingMode::Segmented, SegmentKind::Metadata) => (BlockId::B, 0..o2),
            (PackagingMode::Segmented, SegmentKind::Data) => (BlockId::B, o2..o3),
            (PackagingMode::Segmented, SegmentKind::Stack) => (BlockId::B, o3..o4),
            (PackagingMode::Intermediate, _) => return Err(PackageError::NotLinked(self.mode())),
        };
        Ok(SegmentLocation { block, range })
    }

    /// Data followed by stack, as one contiguous range.
    pub fn memory(&self) -> Result<SegmentLocation> {
        let data = self.locate(SegmentKind::Data)?;
        let stack = self.locate(SegmentKind::Stack)?;
        Ok(SegmentLocation {
            block: data.block,
            range: data.range.start..stack.range.end,
        })
    }

    /// The region each batch lane gets its own copy of.
    ///
    /// Data and stack, plus metadata for Segmented packages.
    pub fn lane_region(&self) -> Result<SegmentLocation> {
        match self.mode() {
            PackagingMode::Segmented => {
                let metadata = self.locate(SegmentKind::Metadata)?;
                let memory = self.memory()?;
                Ok(SegmentLocation {
                    block: BlockId::B,
                    range: metadata.range.start..memory.range.end,
                })
            }
            _ => self.memory(),
        }
    }

    /// Where metadata and memory sit inside one lane region.
    pub fn lane_split(&self) -> Result<LaneSplit> {
        let region = self.lane_region()?;
        let memory = self.memory()?;
        let base = region.range.start;
        let rebase = |range: Range<usize>| range.start - base..range.end - base;
        let metadata = if self.mode().metadata_per_lane() {
            Some(rebase(self.locate(SegmentKind::Metadata)?.range))
        } else {
            None
        };
        Ok(LaneSplit {
            metadata,
            memory: rebase(memory.range),
            data_len: self.derive_sizes()?.data,
        })
    }
}

/// Metadata size for a Combined package, padded so data starts 4-aligned.
pub fn padded_metadata_size(code: usize, elements: usize) -> usize {
    let end = code + elements;
    elements + (ELEMENT_SIZE - end % ELEMENT_SIZE) % ELEMENT_SIZE
}
