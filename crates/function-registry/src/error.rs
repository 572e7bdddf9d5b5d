use thiserror::Error;
use vexel_foundation::Shape;

use crate::FunctionId;

/// Registry result type alias.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Registration and call failures.
///
/// Call failures are recoverable for the VM: it substitutes the sentinel of
/// the function's return shape and keeps running.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("function {0} is already registered")]
    Duplicate(FunctionId),

    #[error("function {id} declares {count} parameters (limit {max})")]
    TooManyParameters {
        id: FunctionId,
        count: usize,
        max: usize,
    },

    #[error("unknown function {0}")]
    Unknown(FunctionId),

    #[error("function {0} has no binding")]
    Unbound(FunctionId),

    #[error("function {id} takes {expected} arguments, got {found}")]
    Arity {
        id: FunctionId,
        expected: usize,
        found: usize,
    },

    #[error("function {id} argument {index} is {found}, expected {expected}")]
    ArgumentShape {
        id: FunctionId,
        index: usize,
        expected: Shape,
        found: Shape,
    },

    /// A native binding does not fit the declared profile.
    #[error("function {id} binding does not accept its declared profile")]
    BindingMismatch { id: FunctionId },

    /// The binding ran but produced no value.
    #[error("function {0} produced no result")]
    NoResult(FunctionId),
}

impl std::fmt::Display for FunctionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
