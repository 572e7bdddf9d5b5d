//! Execution errors.
//!
//! Two tiers: a [`FatalError`] stops the run, while a [`RecoverableError`]
//! is recorded, replaced by the sentinel of the expected shape and execution
//! continues. [`ExecuteError`] is what the entrypoints return.

use thiserror::Error;
use vexel_foundation::{FoundationError, Op, Shape};
use vexel_function_registry::{FunctionId, RegistryError};
use vexel_package::{PackageError, PackagingMode};

/// Error that aborts execution.
///
/// These represent malformed or hostile bytecode, exhausted resources, or
/// lanes that stopped agreeing on control flow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FatalError {
    /// Byte is neither an opcode nor a variable reference.
    #[error("invalid opcode {byte:#04x} at {position}")]
    InvalidOpcode {
        /// Code offset of the byte.
        position: usize,
        /// The offending byte.
        byte: u8,
    },

    /// Valid byte in a position where the grammar does not allow it.
    #[error("unexpected {byte:#04x} at {position}, expected {expected}")]
    UnexpectedToken {
        /// Code offset of the byte.
        position: usize,
        /// The offending byte.
        byte: u8,
        /// What the grammar wanted here.
        expected: &'static str,
    },

    /// Instruction runs past the end of the code segment.
    #[error("code truncated at {position}")]
    Truncated {
        /// Offset that could not be read.
        position: usize,
    },

    /// Immediate byte could not be decoded.
    #[error("bad immediate at {position}: {source}")]
    Encoding {
        /// Offset of the immediate.
        position: usize,
        /// Decoding failure.
        source: FoundationError,
    },

    /// Push would exceed the stack segment.
    #[error("stack overflow at {position}: {needed} elements needed, capacity {capacity}")]
    StackOverflow {
        /// Offset of the push statement.
        position: usize,
        /// Elements in use after the push.
        needed: usize,
        /// Stack capacity in elements.
        capacity: usize,
    },

    /// Pop or peek on an empty stack, or a top shape larger than the stack.
    #[error("stack underflow at {position}")]
    StackUnderflow {
        /// Offset of the pop or peek.
        position: usize,
    },

    /// Variable reference outside the data segment.
    #[error("element {element} at {position} is outside the data segment ({elements} elements)")]
    OutOfBounds {
        /// Offset of the reference.
        position: usize,
        /// Referenced element.
        element: usize,
        /// Data segment size in elements.
        elements: usize,
    },

    /// Metadata byte that does not decode to a shape.
    #[error("invalid metadata {byte:#04x} for element {element}")]
    InvalidMetadata {
        /// Element the byte describes.
        element: usize,
        /// The offending byte.
        byte: u8,
    },

    /// Elements of one slot carry different metadata.
    #[error("inconsistent metadata across the slot at element {element}")]
    InconsistentSlot {
        /// First element of the slot.
        element: usize,
    },

    /// Jump target outside the code segment.
    #[error("jump at {position} lands on {target}, code is {len} bytes")]
    InvalidJump {
        /// Offset of the distance byte.
        position: usize,
        /// Computed target; negative when a backward jump underflows.
        target: isize,
        /// Code segment length.
        len: usize,
    },

    /// Expression nesting exceeded the configured depth.
    #[error("nesting deeper than {limit} at {position}")]
    NestingTooDeep {
        /// Offset where the limit was hit.
        position: usize,
        /// Configured limit.
        limit: usize,
    },

    /// External call passes more arguments than the marshalling array holds.
    #[error("external call at {position} passes {count} arguments (limit {max})")]
    TooManyArguments {
        /// Offset of the call.
        position: usize,
        /// Declared argument count.
        count: usize,
        /// Marshalling capacity.
        max: usize,
    },

    /// Batched lanes disagreed on where to go next.
    #[error("lane {lane} diverged at {position}: expected {expected}, found {found}")]
    LaneDivergence {
        /// Statement offset.
        position: usize,
        /// First lane that disagreed with lane 0.
        lane: usize,
        /// Flow of lane 0.
        expected: String,
        /// Flow of the diverging lane.
        found: String,
    },

    /// Batched lanes wanted to write different shared metadata.
    #[error("lane {lane} disagrees on shared metadata at {position}")]
    MetadataDisagreement {
        /// Statement offset.
        position: usize,
        /// First lane that disagreed.
        lane: usize,
    },

    /// The configured statement budget ran out.
    #[error("statement limit of {limit} reached")]
    StatementLimit {
        /// Configured limit.
        limit: usize,
    },
}

/// Error recorded during execution that does not stop it.
///
/// The faulting operation yields the sentinel of its expected shape:
/// NaN for Numeric, zero for Id and `0xDEADBEEF` for Bool32.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecoverableError {
    /// No handler for this operand shape.
    #[error("{op} does not support {shape}")]
    Unsupported {
        /// Operation.
        op: Op,
        /// Operand shape.
        shape: Shape,
    },

    /// Operand vector sizes cannot be broadcast together.
    #[error("{op}: size mismatch between {left} and {right}")]
    SizeMismatch {
        /// Operation.
        op: Op,
        /// Left operand shape.
        left: Shape,
        /// Right operand shape.
        right: Shape,
    },

    /// Operand datatypes differ.
    #[error("{op}: type mismatch between {left} and {right}")]
    TypeMismatch {
        /// Operation.
        op: Op,
        /// Left operand shape.
        left: Shape,
        /// Right operand shape.
        right: Shape,
    },

    /// Integer division or remainder by zero.
    #[error("{op}: integer division by zero")]
    DivisionByZero {
        /// Operation.
        op: Op,
    },

    /// Count immediate that the operation cannot use.
    #[error("{op}: invalid operand count {count}")]
    InvalidCount {
        /// Operation.
        op: Op,
        /// Decoded count.
        count: usize,
    },

    /// Bit operation whose target is not a plain variable.
    #[error("{op}: target is not a variable")]
    IndirectTarget {
        /// Operation.
        op: Op,
    },

    /// Bit operation whose target variable spans more than one element.
    #[error("{op}: target of shape {shape} is not a single word")]
    WideTarget {
        /// Operation.
        op: Op,
        /// Shape of the target variable.
        shape: Shape,
    },

    /// Assigned value does not fit the target slot.
    #[error("cannot assign {value} to element {element} of shape {target}")]
    AssignMismatch {
        /// Target element.
        element: usize,
        /// Shape recorded for the target.
        target: Shape,
        /// Shape of the assigned value.
        value: Shape,
    },

    /// No function registry was supplied for an external call.
    #[error("no function registry for call to {0}")]
    NoRegistry(FunctionId),

    /// The registry rejected or failed the call.
    #[error(transparent)]
    External(#[from] RegistryError),
}

/// Failure reported by an execution entrypoint.
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// Package header carries no language version.
    #[error("package is not initialized")]
    NotInitialized,

    /// Package blocks are missing.
    #[error("package is not allocated")]
    NotAllocated,

    /// The entrypoint cannot run packages in this mode.
    #[error("packaging mode {0} is not supported here")]
    UnsupportedMode(PackagingMode),

    /// Package layout could not be read.
    #[error(transparent)]
    Package(#[from] PackageError),

    /// Execution aborted.
    #[error(transparent)]
    Fatal(#[from] FatalError),
}
