//! Executable packages.

use tracing::debug;
use vexel_foundation::{decode_metadata, encode_metadata, Shape, Value, ELEMENT_SIZE};

use crate::block::{AllocatorTag, Block};
use crate::error::{PackageError, Result};
use crate::header::{PackageFlags, PackageHeader};
use crate::lanes::LaneBuffer;
use crate::layout::{BlockId, Layout, PackagingMode, SegmentKind, SegmentLocation, Sizes};

/// A header plus the one or two blocks it describes.
///
/// Block A holds code (and metadata unless Segmented); block B holds the
/// per-instance regions. Combined packages have no block B.
#[derive(Debug, Default)]
pub struct Package {
    header: PackageHeader,
    code_block: Option<Block>,
    data_block: Option<Block>,
}

/// Disjoint views of a package's segments for execution.
#[derive(Debug)]
pub struct SegmentsMut<'a> {
    pub code: &'a [u8],
    pub metadata: &'a mut [u8],
    /// Data followed immediately by the stack.
    pub memory: &'a mut [u8],
    pub sizes: Sizes,
}

impl Package {
    /// Assemble a package from a header and blocks, checking the block
    /// lengths against the layout.
    pub fn from_parts(
        header: PackageHeader,
        code_block: Block,
        data_block: Option<Block>,
    ) -> Result<Self> {
        let package = Self {
            header,
            code_block: Some(code_block),
            data_block,
        };
        package.check_blocks()?;
        Ok(package)
    }

    /// Allocate zeroed blocks for a layout.
    pub fn allocate(layout: Layout, flags: PackageFlags, allocator: AllocatorTag) -> Result<Self> {
        let header = PackageHeader::new(layout, flags, allocator);
        let (a, b) = match layout.mode() {
            PackagingMode::Intermediate => {
                let [code, data, stack, _] = layout.offsets().map(usize::from);
                (code, data + stack)
            }
            _ => {
                layout.validate()?;
                layout.block_sizes()?
            }
        };
        let data_block = match layout.mode() {
            PackagingMode::Combined => None,
            _ => Some(Block::zeroed(b, allocator)?),
        };
        Ok(Self {
            header,
            code_block: Some(Block::zeroed(a, allocator)?),
            data_block,
        })
    }

    fn check_blocks(&self) -> Result<()> {
        let (a, b) = match self.mode() {
            PackagingMode::Intermediate => {
                let [code, data, stack, _] = self.header.layout.offsets().map(usize::from);
                (code, data + stack)
            }
            _ => {
                self.header.layout.validate()?;
                self.header.layout.block_sizes()?
            }
        };
        let code_len = self.code_block.as_ref().map_or(0, Block::len);
        if code_len != a {
            return Err(PackageError::BlockSizeMismatch {
                block: 'A',
                expected: a,
                actual: code_len,
            });
        }
        let data_len = self.data_block.as_ref().map_or(0, Block::len);
        if data_len != b {
            return Err(PackageError::BlockSizeMismatch {
                block: 'B',
                expected: b,
                actual: data_len,
            });
        }
        Ok(())
    }

    #[inline]
    pub fn header(&self) -> &PackageHeader {
        &self.header
    }

    #[inline]
    pub fn layout(&self) -> Layout {
        self.header.layout
    }

    #[inline]
    pub fn mode(&self) -> PackagingMode {
        self.header.mode()
    }

    #[inline]
    pub fn flags(&self) -> PackageFlags {
        self.header.flags
    }

    pub fn is_initialized(&self) -> bool {
        self.header.language.is_initialized()
    }

    /// Whether every block the mode needs is present.
    pub fn is_allocated(&self) -> bool {
        match self.mode() {
            PackagingMode::Combined => self.code_block.is_some(),
            _ => self.code_block.is_some() && self.data_block.is_some(),
        }
    }

    pub fn code_block(&self) -> Option<&Block> {
        self.code_block.as_ref()
    }

    pub fn data_block(&self) -> Option<&Block> {
        self.data_block.as_ref()
    }

    /// Sizes of the linked segments.
    pub fn sizes(&self) -> Result<Sizes> {
        self.header.layout.derive_sizes()
    }

    fn ready(&self) -> Result<()> {
        if !self.is_initialized() {
            return Err(PackageError::NotInitialized);
        }
        if !self.is_allocated() {
            return Err(PackageError::NotAllocated);
        }
        Ok(())
    }

    fn block(&self, id: BlockId) -> Result<&Block> {
        match id {
            BlockId::A => self.code_block.as_ref(),
            BlockId::B => self.data_block.as_ref(),
        }
        .ok_or(PackageError::NotAllocated)
    }

    fn block_mut(&mut self, id: BlockId) -> Result<&mut Block> {
        match id {
            BlockId::A => self.code_block.as_mut(),
            BlockId::B => self.data_block.as_mut(),
        }
        .ok_or(PackageError::NotAllocated)
    }

    fn slice_of(
        block: &Block,
        kind: SegmentKind,
        location: &SegmentLocation,
    ) -> Result<std::ops::Range<usize>> {
        let range = location.range.clone();
        if range.end > block.len() {
            return Err(PackageError::OutOfBounds {
                kind,
                offset: range.start,
                end: range.end,
                len: block.len(),
            });
        }
        Ok(range)
    }

    /// Bytes of one segment.
    pub fn segment(&self, kind: SegmentKind) -> Result<&[u8]> {
        self.ready()?;
        let location = self.header.layout.locate(kind)?;
        let block = self.block(location.block)?;
        let range = Self::slice_of(block, kind, &location)?;
        Ok(&block.as_slice()[range])
    }

    /// Mutable bytes of one segment.
    pub fn segment_mut(&mut self, kind: SegmentKind) -> Result<&mut [u8]> {
        self.ready()?;
        let location = self.header.layout.locate(kind)?;
        let block = self.block_mut(location.block)?;
        let range = Self::slice_of(block, kind, &location)?;
        Ok(&mut block.as_mut_slice()[range])
    }

    /// Split the package into code, metadata and memory views at once.
    pub fn split_mut(&mut self) -> Result<SegmentsMut<'_>> {
        self.ready()?;
        let layout = self.header.layout;
        let sizes = layout.validate()?;
        let code = layout.locate(SegmentKind::Code)?.range;
        let metadata = layout.locate(SegmentKind::Metadata)?;
        let memory = layout.memory()?;

        let Self {
            code_block,
            data_block,
            ..
        } = self;
        let block_a = code_block.as_mut().ok_or(PackageError::NotAllocated)?;

        match layout.mode() {
            PackagingMode::Combined => {
                let bytes = block_a.as_mut_slice();
                if memory.range.end > bytes.len() {
                    return Err(PackageError::NotAllocated);
                }
                let (head, memory_bytes) = bytes.split_at_mut(memory.range.start);
                let (code_bytes, metadata_bytes) = head.split_at_mut(metadata.range.start);
                Ok(SegmentsMut {
                    code: &code_bytes[code],
                    metadata: metadata_bytes,
                    memory: &mut memory_bytes[..memory.range.len()],
                    sizes,
                })
            }
            PackagingMode::Batched => {
                let block_b = data_block.as_mut().ok_or(PackageError::NotAllocated)?;
                let (code_bytes, metadata_bytes) =
                    block_a.as_mut_slice().split_at_mut(metadata.range.start);
                Ok(SegmentsMut {
                    code: &code_bytes[code],
                    metadata: &mut metadata_bytes[..metadata.range.len()],
                    memory: &mut block_b.as_mut_slice()[memory.range],
                    sizes,
                })
            }
            PackagingMode::Segmented => {
                let block_b = data_block.as_mut().ok_or(PackageError::NotAllocated)?;
                let (metadata_bytes, memory_bytes) =
                    block_b.as_mut_slice().split_at_mut(memory.range.start);
                Ok(SegmentsMut {
                    code: &block_a.as_slice()[code],
                    metadata: &mut metadata_bytes[metadata.range],
                    memory: &mut memory_bytes[..memory.range.len()],
                    sizes,
                })
            }
            PackagingMode::Intermediate => Err(PackageError::NotLinked(layout.mode())),
        }
    }

    /// Staged code and data image of an Intermediate package.
    pub fn staging(&self) -> Result<(&[u8], &[u8])> {
        if self.mode() != PackagingMode::Intermediate {
            return Err(PackageError::UnsupportedMode(self.mode()));
        }
        self.ready()?;
        Ok((self.block(BlockId::A)?.as_slice(), self.block(BlockId::B)?.as_slice()))
    }

    /// Mutable staged code and data image of an Intermediate package.
    pub fn staging_mut(&mut self) -> Result<(&mut [u8], &mut [u8])> {
        if self.mode() != PackagingMode::Intermediate {
            return Err(PackageError::UnsupportedMode(self.mode()));
        }
        self.ready()?;
        match (self.code_block.as_mut(), self.data_block.as_mut()) {
            (Some(code), Some(data)) => Ok((code.as_mut_slice(), data.as_mut_slice())),
            _ => Err(PackageError::NotAllocated),
        }
    }

    /// Deep copy of every block, preserving offsets.
    pub fn clone_with(&self, allocator: AllocatorTag) -> Result<Self> {
        self.ready()?;
        let code_block = self.block(BlockId::A)?.clone_with(allocator)?;
        let data_block = self
            .data_block
            .as_ref()
            .map(|block| block.clone_with(allocator))
            .transpose()?;
        let header = PackageHeader {
            allocator,
            ..self.header
        };
        debug!(mode = %self.mode(), ?allocator, "cloned package");
        Ok(Self {
            header,
            code_block: Some(code_block),
            data_block,
        })
    }

    /// One contiguous block holding `lanes` copies of the lane region.
    ///
    /// The first copy comes from this package; the rest are replicated from
    /// the first copy by doubling.
    pub fn replicate_for_batch(&self, lanes: usize, allocator: AllocatorTag) -> Result<LaneBuffer> {
        self.ready()?;
        if lanes == 0 {
            return Err(PackageError::InvalidLaneCount);
        }
        let layout = self.header.layout;
        let region = layout.lane_region()?;
        let block = self.block(region.block)?;
        let source = block
            .as_slice()
            .get(region.range.clone())
            .ok_or(PackageError::OutOfBounds {
                kind: SegmentKind::Data,
                offset: region.range.start,
                end: region.range.end,
                len: block.len(),
            })?;
        let buffer = LaneBuffer::replicate(source, lanes, layout.lane_split()?, allocator)?;
        debug!(
            mode = %self.mode(),
            lanes,
            lane_size = source.len(),
            "replicated package for batch execution"
        );
        Ok(buffer)
    }

    /// Release both blocks. Safe to call repeatedly and on packages that
    /// were never allocated.
    pub fn free(&mut self) {
        self.code_block = None;
        self.data_block = None;
    }

    /// Shape recorded for a data or stack element.
    pub fn metadata(&self, element: usize) -> Result<Shape> {
        let metadata = self.segment(SegmentKind::Metadata)?;
        let byte = metadata.get(element).ok_or(PackageError::OutOfBounds {
            kind: SegmentKind::Metadata,
            offset: element,
            end: element + 1,
            len: metadata.len(),
        })?;
        Ok(decode_metadata(*byte)?)
    }

    /// Overwrite the metadata byte of one element.
    pub fn set_metadata(&mut self, element: usize, shape: Shape) -> Result<()> {
        let metadata = self.segment_mut(SegmentKind::Metadata)?;
        let len = metadata.len();
        let byte = metadata.get_mut(element).ok_or(PackageError::OutOfBounds {
            kind: SegmentKind::Metadata,
            offset: element,
            end: element + 1,
            len,
        })?;
        *byte = encode_metadata(shape);
        Ok(())
    }

    /// Read a value at a byte offset into the data segment.
    pub fn read_data(&self, offset: usize, shape: Shape) -> Result<Value> {
        let data = self.segment(SegmentKind::Data)?;
        read_value(data, offset, shape)
    }

    /// Write a value at a byte offset into the data segment.
    pub fn write_data(&mut self, offset: usize, value: &Value) -> Result<()> {
        let data = self.segment_mut(SegmentKind::Data)?;
        write_value(data, offset, value)
    }
}

/// Read a value from a data region, bounds-checked.
pub fn read_value(data: &[u8], offset: usize, shape: Shape) -> Result<Value> {
    let end = offset + shape.byte_size();
    data.get(offset..end)
        .and_then(|bytes| Value::read(bytes, shape))
        .ok_or(PackageError::OutOfBounds {
            kind: SegmentKind::Data,
            offset,
            end,
            len: data.len(),
        })
}

/// Write a value into a data region, bounds-checked.
pub fn write_value(data: &mut [u8], offset: usize, value: &Value) -> Result<()> {
    let end = offset + value.elements() * ELEMENT_SIZE;
    let len = data.len();
    match data.get_mut(offset..end).map(|bytes| value.write(bytes)) {
        Some(true) => Ok(()),
        _ => Err(PackageError::OutOfBounds {
            kind: SegmentKind::Data,
            offset,
            end,
            len,
        }),
    }
}

#[cfg(test)]
mod tests;
