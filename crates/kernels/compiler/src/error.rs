//! Compile-time errors.
//!
//! Every error here is fatal: the failing segment produces no bytecode.

use thiserror::Error;
use vexel_foundation::FoundationError;
use vexel_package::PackageError;

/// Compiler result type alias.
pub type Result<T> = std::result::Result<T, CompileError>;

#[derive(Debug, Error)]
pub enum CompileError {
    /// Two definitions share a label id.
    #[error("duplicate label definition '{label}' at nodes {first} and {second}")]
    DuplicateLabel {
        label: String,
        first: usize,
        second: usize,
    },

    /// A reference names a label nothing defines.
    #[error("reference to undefined label '{label}' at node {index}")]
    MissingLabel { label: String, index: usize },

    /// The distance does not fit the unsigned magnitude byte.
    #[error("jump to '{label}' spans {distance} bytes (limit 255)")]
    JumpTooFar { label: String, distance: isize },

    /// Distances of 0 and ±1 would land on the jump itself or its operand.
    #[error("jump to '{label}' has impossible distance {distance}")]
    ImpossibleJump { label: String, distance: isize },

    /// The jump opcode cannot travel in the required direction.
    #[error(
        "jump to '{label}' at node {index} goes {direction} but is preceded by {preceding:#04x}"
    )]
    WrongDirection {
        label: String,
        index: usize,
        direction: &'static str,
        preceding: u8,
    },

    /// A reference label sits where no offset byte belongs.
    #[error("reference '{label}' at node {index} is not on a jump offset")]
    MisplacedReference { label: String, index: usize },

    /// A variable name was declared twice.
    #[error("variable '{0}' declared twice")]
    DuplicateVariable(String),

    /// A variable name no declaration provides.
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    /// The variable lies past the last data element a code byte can address.
    #[error("variable '{name}' at element {element} is not addressable")]
    UnaddressableVariable { name: String, element: usize },

    /// The default value does not match the declared shape.
    #[error("default value for '{name}' is {found}, declared {expected}")]
    DefaultShapeMismatch {
        name: String,
        expected: String,
        found: String,
    },

    /// The declared shape cannot be represented.
    #[error("variable '{name}' has unrepresentable shape {shape}")]
    UnrepresentableShape { name: String, shape: String },

    /// A segment failed to resolve.
    #[error("segment '{segment}': {source}")]
    Segment {
        segment: String,
        #[source]
        source: Box<CompileError>,
    },

    #[error(transparent)]
    Encoding(#[from] FoundationError),

    #[error(transparent)]
    Layout(#[from] PackageError),

    #[error("assembly json: {0}")]
    Json(#[from] serde_json::Error),
}

impl CompileError {
    /// Attach the segment name to an error.
    pub fn in_segment(self, segment: impl Into<String>) -> Self {
        CompileError::Segment {
            segment: segment.into(),
            source: Box::new(self),
        }
    }
}
