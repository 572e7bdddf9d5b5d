//! Vexel Package
//!
//! Binary layout of executable Vexel packages. A package places code,
//! per-element metadata, working data and a stack into one or two aligned
//! blocks according to its [`PackagingMode`]. This crate owns all offset
//! arithmetic, block ownership, batch lane replication and the `.vxp` file
//! format.
//!
//! # Key Types
//!
//! - [`Layout`] - mode-tagged segment offsets
//! - [`Package`] - header plus blocks
//! - [`LaneBuffer`] - replicated lane regions for batched execution

pub mod block;
pub mod error;
pub mod file;
pub mod header;
pub mod lanes;
pub mod layout;
pub mod package;

pub use block::{AllocatorTag, Block, SIMD_ALIGNMENT};
pub use error::{PackageError, Result};
pub use file::{load, read_package, save, write_package};
pub use header::{LanguageVersion, PackageFlags, PackageHeader, HEADER_SIZE};
pub use lanes::{LaneBuffer, LaneMut};
pub use layout::{
    padded_metadata_size, BlockId, LaneSplit, Layout, PackagingMode, SegmentKind,
    SegmentLocation, Sizes,
};
pub use package::{read_value, write_value, Package, SegmentsMut};
