//! Replicated per-lane regions for batched execution.

use std::ops::Range;

use vexel_foundation::{Shape, Value};

use crate::block::{AllocatorTag, Block};
use crate::error::{PackageError, Result};
use crate::layout::{LaneSplit, SegmentKind};
use crate::package::{read_value, write_value};

/// `n` copies of a package's lane region in one contiguous block.
///
/// Each lane is `lane_size` bytes: data followed by stack, prefixed by the
/// lane's own metadata for Segmented packages.
#[derive(Debug)]
pub struct LaneBuffer {
    block: Block,
    lane_size: usize,
    lanes: usize,
    split: LaneSplit,
}

/// Mutable views into one lane.
#[derive(Debug)]
pub struct LaneMut<'a> {
    /// Present only when metadata is per lane.
    pub metadata: Option<&'a mut [u8]>,
    pub memory: &'a mut [u8],
}

impl LaneBuffer {
    /// Copy `source` into the first lane, then fill the remaining lanes by
    /// doubling copies from the front of the buffer.
    pub(crate) fn replicate(
        source: &[u8],
        lanes: usize,
        split: LaneSplit,
        allocator: AllocatorTag,
    ) -> Result<Self> {
        if lanes == 0 {
            return Err(PackageError::InvalidLaneCount);
        }
        let lane_size = source.len();
        let total = lane_size
            .checked_mul(lanes)
            .ok_or(PackageError::Allocation {
                size: usize::MAX,
                align: allocator.alignment(),
            })?;
        let mut block = Block::zeroed(total, allocator)?;
        let bytes = block.as_mut_slice();
        bytes[..lane_size].copy_from_slice(source);
        let mut filled = lane_size;
        while filled < total {
            let chunk = filled.min(total - filled);
            bytes.copy_within(0..chunk, filled);
            filled += chunk;
        }
        Ok(Self {
            block,
            lane_size,
            lanes,
            split,
        })
    }

    #[inline]
    pub fn lane_count(&self) -> usize {
        self.lanes
    }

    #[inline]
    pub fn lane_size(&self) -> usize {
        self.lane_size
    }

    /// Lane layout relative to the start of each lane.
    #[inline]
    pub fn split(&self) -> &LaneSplit {
        &self.split
    }

    /// All lanes as one byte slice.
    pub fn as_slice(&self) -> &[u8] {
        self.block.as_slice()
    }

    fn range(&self, lane: usize) -> Result<Range<usize>> {
        if lane >= self.lanes {
            return Err(PackageError::OutOfBounds {
                kind: SegmentKind::Data,
                offset: lane * self.lane_size,
                end: (lane + 1) * self.lane_size,
                len: self.block.len(),
            });
        }
        Ok(lane * self.lane_size..(lane + 1) * self.lane_size)
    }

    /// Raw bytes of one lane.
    pub fn lane(&self, lane: usize) -> Result<&[u8]> {
        let range = self.range(lane)?;
        Ok(&self.block.as_slice()[range])
    }

    /// Split one lane into metadata and memory views.
    pub fn lane_mut(&mut self, lane: usize) -> Result<LaneMut<'_>> {
        let range = self.range(lane)?;
        let split = self.split.clone();
        Ok(split_lane(&mut self.block.as_mut_slice()[range], &split))
    }

    /// Every lane at once, in order.
    pub fn lanes_mut(&mut self) -> Vec<LaneMut<'_>> {
        let split = self.split.clone();
        if self.lane_size == 0 {
            return (0..self.lanes)
                .map(|_| LaneMut {
                    metadata: split.metadata.as_ref().map(|_| Default::default()),
                    memory: Default::default(),
                })
                .collect();
        }
        self.block
            .as_mut_slice()
            .chunks_exact_mut(self.lane_size)
            .map(|lane| split_lane(lane, &split))
            .collect()
    }

    /// Read a value from one lane's data segment.
    pub fn read_data(&self, lane: usize, offset: usize, shape: Shape) -> Result<Value> {
        let bytes = self.lane(lane)?;
        let start = self.split.memory.start;
        read_value(&bytes[start..start + self.split.data_len], offset, shape)
    }

    /// Write a value into one lane's data segment.
    pub fn write_data(&mut self, lane: usize, offset: usize, value: &Value) -> Result<()> {
        let data_len = self.split.data_len;
        let view = self.lane_mut(lane)?;
        write_value(&mut view.memory[..data_len], offset, value)
    }
}

fn split_lane<'a>(lane: &'a mut [u8], split: &LaneSplit) -> LaneMut<'a> {
    match &split.metadata {
        Some(metadata) => {
            let (head, tail) = lane.split_at_mut(split.memory.start);
            LaneMut {
                metadata: Some(&mut head[metadata.clone()]),
                memory: &mut tail[..split.memory.len()],
            }
        }
        None => LaneMut {
            metadata: None,
            memory: &mut lane[split.memory.clone()],
        },
    }
}
