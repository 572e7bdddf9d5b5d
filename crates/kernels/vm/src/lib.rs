//! Vexel VM
//!
//! Interpreter for linked Vexel packages. Bytecode is executed statement by
//! statement straight from the package's code segment; there is no separate
//! decode pass.
//!
//! # Modules
//!
//! - [`interpreter`] - single-instance execution of Combined packages
//! - [`batch`] - lock-step execution over replicated lanes
//! - [`disasm`] - bytecode listings
//! - [`error`] - fatal and recoverable error taxonomy
//! - [`options`] - execution limits and batch chunking
//! - [`report`] - status codes and execution reports
//!
//! # Execution Model
//!
//! Every operand is fetched together with a pending negation flag. Handlers
//! switch on the operand's key (datatype, vector size, negation) and apply
//! the negation as they read components. Unsupported combinations never
//! abort a run: the operation yields a sentinel of its result shape and a
//! recoverable event is recorded. Malformed bytecode is fatal and stops the
//! run with an [`ExecuteError`].
//!
//! # Example
//!
//! ```ignore
//! use vexel_vm::{Interpreter, Status};
//!
//! let mut interpreter = Interpreter::new().with_registry(&registry);
//! let report = interpreter.run(&mut package, CallContext::default())?;
//! assert!(report.is_clean());
//! ```

pub mod batch;
pub mod disasm;
pub mod error;
pub mod fetch;
pub mod interpreter;
pub mod options;
pub mod report;

mod cursor;
mod handlers;
mod machine;

pub use batch::{execute_batch, BatchInterpreter};
pub use disasm::{disassemble, listing, Immediate, Instruction};
pub use error::{ExecuteError, FatalError, RecoverableError};
pub use fetch::{Fetched, Source};
pub use interpreter::{execute, Interpreter};
pub use options::{optimal_chunk_size, BatchConfig, ExecutionOptions, MAX_NESTING};
pub use report::{ExecutionReport, ExecutionState, Halt, RecoverableEvent, Status};

#[cfg(test)]
mod testing;
