//! Errors raised while decoding foundation-level encodings.

use thiserror::Error;

/// Foundation result type alias.
pub type Result<T> = std::result::Result<T, FoundationError>;

/// Errors from decoding datatype tags, metadata bytes and packed counts.
///
/// These only occur on malformed input; well-formed bytecode produced by the
/// compiler never triggers them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FoundationError {
    /// A datatype tag outside the closed set.
    #[error("invalid datatype tag: {0}")]
    InvalidDataType(u8),

    /// A component count outside 1..=4.
    #[error("invalid vector size: {0}")]
    InvalidVectorSize(usize),

    /// A byte that is not an opcode.
    #[error("invalid opcode byte: {0:#04x}")]
    InvalidOpcode(u8),

    /// A dispatch key byte that no (datatype, size, negation) combination produces.
    #[error("invalid dispatch key byte: {0:#04x}")]
    InvalidDispatchKey(u8),

    /// A count does not fit the packed field it is being encoded into.
    #[error("count {count} exceeds packed field maximum {max}")]
    CountOverflow {
        /// The requested count.
        count: usize,
        /// The largest count the field holds.
        max: usize,
    },

    /// An instruction's immediate bytes run past the end of the code.
    #[error("instruction at {position} is truncated")]
    Truncated {
        /// Position of the opcode byte.
        position: usize,
    },

    /// A shape tag that cannot be packed into a decode44 byte.
    #[error("shape {0} cannot be packed into a 4-bit tag")]
    UnpackableShape(crate::Shape),
}
