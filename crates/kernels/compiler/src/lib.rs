//! Vexel Compiler
//!
//! Back end of the Vexel toolchain. Takes assembled code segments and a
//! variable table and produces an executable [`vexel_package::Package`].
//!
//! # Pipeline
//!
//! ```text
//! Assembler → CodeSegment(s) → resolver → code bytes
//!                                            │
//! VariableDecl(s) → SymbolTable ─────────────┴→ Packager → Package
//! ```
//!
//! - [`assembler`] - builder for labelled code segments
//! - [`resolver`] - anchor collapse and jump linking
//! - [`variables`] - data layout of declared variables
//! - [`packager`] - Intermediate staging and final layout
//! - [`assembly`] - serializable input and the end-to-end compile

pub mod assembler;
pub mod assembly;
pub mod error;
pub mod node;
pub mod packager;
pub mod resolver;
pub mod variables;

pub use assembler::Assembler;
pub use assembly::{Assembly, CompileOptions, Compiled};
pub use error::{CompileError, Result};
pub use node::{CodeSegment, JumpLabel, LabelKind, Node};
pub use packager::{PackageOptions, Packager, DEFAULT_STACK_ELEMENTS};
pub use resolver::{
    collapse_anchors, link, resolve_all, resolve_segment, ResolveOptions, ResolveWarning,
    Resolved, ResolvedSegment, MAX_JUMP_DISTANCE,
};
pub use variables::{Symbol, SymbolTable, Variable, VariableDecl, VariableMapping};
