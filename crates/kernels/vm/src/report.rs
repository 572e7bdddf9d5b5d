//! Execution outcomes: status codes, halt reasons and reports.

use serde::{Deserialize, Serialize};

use crate::error::{ExecuteError, RecoverableError};

/// Integer status returned by the C-style entrypoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum Status {
    Success = 0,
    NotInitialized = -1,
    NotAllocated = -2,
    UnsupportedPackagingMode = -3,
    Failed = -4,
}

impl Status {
    #[inline]
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        self == Status::Success
    }

    /// Status for an entrypoint result.
    pub fn of<T>(result: &Result<T, ExecuteError>) -> Self {
        match result {
            Ok(_) => Status::Success,
            Err(error) => Status::from(error),
        }
    }
}

impl From<&ExecuteError> for Status {
    fn from(error: &ExecuteError) -> Self {
        match error {
            ExecuteError::NotInitialized => Status::NotInitialized,
            ExecuteError::NotAllocated => Status::NotAllocated,
            ExecuteError::UnsupportedMode(_) => Status::UnsupportedPackagingMode,
            ExecuteError::Package(_) | ExecuteError::Fatal(_) => Status::Failed,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Status::Success => "success",
            Status::NotInitialized => "not initialized",
            Status::NotAllocated => "not allocated",
            Status::UnsupportedPackagingMode => "unsupported packaging mode",
            Status::Failed => "failed",
        };
        write!(f, "{name} ({})", self.code())
    }
}

/// Why execution stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Halt {
    /// Ran off the end of the code.
    Completed,
    /// Hit a `Return` statement.
    Returned,
    /// Aborted on a fatal error.
    Failed,
}

/// Lifecycle of an interpreter.
///
/// ```text
/// Ready -> Running -> Halted(Completed | Returned | Failed)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionState {
    #[default]
    Ready,
    Running,
    Halted(Halt),
}

/// A recoverable error and where it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoverableEvent {
    /// Lane that raised it; 0 for single-instance runs.
    pub lane: usize,
    /// Code offset of the faulting operation.
    pub position: usize,
    pub error: RecoverableError,
}

/// Summary of a finished execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    pub halt: Halt,
    /// Statements executed (per lane for batched runs).
    pub statements: usize,
    /// Lanes executed.
    pub lanes: usize,
    /// Recoverable errors in lane order, then program order.
    pub recoverable: Vec<RecoverableEvent>,
}

impl ExecutionReport {
    pub fn recoverable_count(&self) -> usize {
        self.recoverable.len()
    }

    pub fn is_clean(&self) -> bool {
        self.recoverable.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FatalError;
    use vexel_package::PackagingMode;

    #[test]
    fn test_status_codes() {
        assert_eq!(Status::Success.code(), 0);
        assert_eq!(Status::NotInitialized.code(), -1);
        assert_eq!(Status::NotAllocated.code(), -2);
        assert_eq!(Status::UnsupportedPackagingMode.code(), -3);
        assert_eq!(Status::Failed.code(), -4);
    }

    #[test]
    fn test_status_from_errors() {
        let unsupported: Result<(), _> = Err(ExecuteError::UnsupportedMode(PackagingMode::Batched));
        assert_eq!(Status::of(&unsupported), Status::UnsupportedPackagingMode);
        let fatal: Result<(), _> = Err(ExecuteError::Fatal(FatalError::Truncated { position: 3 }));
        assert_eq!(Status::of(&fatal), Status::Failed);
        assert_eq!(Status::Failed.to_string(), "failed (-4)");
    }
}
