//! Owned, explicitly sized, aligned byte blocks.
//!
//! A [`Block`] is a fixed-length zero-initialized allocation. Package segments
//! are views into one or two blocks; the block itself knows nothing about
//! segments.

use std::alloc::{self, Layout};
use std::ptr::NonNull;

use serde::{Deserialize, Serialize};

use crate::error::{PackageError, Result};

/// Alignment for cache-line aligned blocks (64 bytes).
pub const SIMD_ALIGNMENT: usize = 64;

/// Alignment for ordinary blocks. Enough for any 8-byte element.
pub const DEFAULT_ALIGNMENT: usize = 8;

/// Which allocation strategy produced a block.
///
/// Recorded in the package header so clones and lane replicas can reuse it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum AllocatorTag {
    /// General-purpose heap block.
    #[default]
    Heap = 0,
    /// Cache-line aligned block for batched execution.
    Aligned = 1,
    /// Short-lived scratch block (lane replicas, test fixtures).
    Temporary = 2,
}

impl AllocatorTag {
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0 => Ok(AllocatorTag::Heap),
            1 => Ok(AllocatorTag::Aligned),
            2 => Ok(AllocatorTag::Temporary),
            other => Err(PackageError::InvalidAllocator(other)),
        }
    }

    /// Alignment of blocks produced by this allocator.
    #[inline]
    pub const fn alignment(self) -> usize {
        match self {
            AllocatorTag::Aligned => SIMD_ALIGNMENT,
            AllocatorTag::Heap | AllocatorTag::Temporary => DEFAULT_ALIGNMENT,
        }
    }
}

/// Fixed-size aligned byte block.
pub struct Block {
    /// Pointer to the allocation (None if the block is empty)
    ptr: Option<NonNull<u8>>,
    len: usize,
    allocator: AllocatorTag,
}

impl Block {
    /// Allocate a zero-filled block of `len` bytes.
    pub fn zeroed(len: usize, allocator: AllocatorTag) -> Result<Self> {
        if len == 0 {
            return Ok(Self {
                ptr: None,
                len: 0,
                allocator,
            });
        }
        let layout = Self::layout_for(len, allocator)?;
        // SAFETY: layout has non-zero size
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr).ok_or(PackageError::Allocation {
            size: len,
            align: allocator.alignment(),
        })?;
        Ok(Self {
            ptr: Some(ptr),
            len,
            allocator,
        })
    }

    /// Allocate a block holding a copy of `bytes`.
    pub fn from_bytes(bytes: &[u8], allocator: AllocatorTag) -> Result<Self> {
        let mut block = Self::zeroed(bytes.len(), allocator)?;
        block.as_mut_slice().copy_from_slice(bytes);
        Ok(block)
    }

    /// Deep copy into a new allocation.
    pub fn clone_with(&self, allocator: AllocatorTag) -> Result<Self> {
        Self::from_bytes(self.as_slice(), allocator)
    }

    fn layout_for(len: usize, allocator: AllocatorTag) -> Result<Layout> {
        Layout::from_size_align(len, allocator.alignment()).map_err(|_| PackageError::Allocation {
            size: len,
            align: allocator.alignment(),
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn allocator(&self) -> AllocatorTag {
        self.allocator
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        match self.ptr {
            // SAFETY: ptr owns `len` initialized bytes for the life of self
            Some(ptr) => unsafe { std::slice::from_raw_parts(ptr.as_ptr(), self.len) },
            None => &[],
        }
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        match self.ptr {
            // SAFETY: ptr owns `len` initialized bytes, &mut self is exclusive
            Some(ptr) => unsafe { std::slice::from_raw_parts_mut(ptr.as_ptr(), self.len) },
            None => &mut [],
        }
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        if let Some(ptr) = self.ptr.take() {
            if let Ok(layout) = Self::layout_for(self.len, self.allocator) {
                // SAFETY: ptr was allocated with exactly this layout
                unsafe { alloc::dealloc(ptr.as_ptr(), layout) };
            }
        }
    }
}

impl std::fmt::Debug for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Block")
            .field("len", &self.len)
            .field("allocator", &self.allocator)
            .finish()
    }
}

// SAFETY: Block is Send because:
// - It owns the memory pointed to by `ptr` (allocated via std::alloc)
// - Drop deallocates owned memory, safe from any thread
unsafe impl Send for Block {}

// SAFETY: Block is Sync because:
// - Shared references only hand out immutable slices
// - Mutation requires &mut self
unsafe impl Sync for Block {}
