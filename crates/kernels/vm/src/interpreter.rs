//! Single-instance interpreter.
//!
//! Runs a Combined package against its own data and stack. Batched and
//! Segmented packages share code across instances and go through
//! [`crate::batch`] instead.

use tracing::{debug, error, instrument, trace};
use vexel_function_registry::{CallContext, FunctionRegistry};
use vexel_package::{Package, PackagingMode};

use crate::error::{ExecuteError, FatalError};
use crate::machine::{apply_writes, run_statement, Flow, Program, Registers};
use crate::options::ExecutionOptions;
use crate::report::{ExecutionReport, ExecutionState, Halt, Status};

/// Check the preconditions every entrypoint shares.
pub(crate) fn check_ready(package: &Package) -> Result<(), ExecuteError> {
    if !package.is_initialized() {
        return Err(ExecuteError::NotInitialized);
    }
    if !package.is_allocated() {
        return Err(ExecuteError::NotAllocated);
    }
    Ok(())
}

/// Interpreter for one package instance.
///
/// Holds the function registry and options; the package is passed to each
/// [`run`](Interpreter::run) so one interpreter can drive many packages.
#[derive(Debug, Default)]
pub struct Interpreter<'r> {
    registry: Option<&'r FunctionRegistry>,
    options: ExecutionOptions,
    state: ExecutionState,
}

impl<'r> Interpreter<'r> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(mut self, registry: &'r FunctionRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_options(mut self, options: ExecutionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ExecutionOptions {
        &self.options
    }

    /// State after the most recent run.
    pub fn state(&self) -> ExecutionState {
        self.state
    }

    /// Execute `package` from its first statement until the code ends or a
    /// `Return` is reached.
    ///
    /// Recoverable errors are collected in the report; the offending
    /// operation produced a sentinel and execution carried on.
    ///
    /// # Errors
    ///
    /// - [`ExecuteError::NotInitialized`] / [`ExecuteError::NotAllocated`]
    ///   for packages that cannot run.
    /// - [`ExecuteError::UnsupportedMode`] for anything but Combined.
    /// - [`ExecuteError::Fatal`] when the bytecode itself is broken.
    #[instrument(skip_all, fields(mode = %package.mode()))]
    pub fn run(
        &mut self,
        package: &mut Package,
        context: CallContext<'_>,
    ) -> Result<ExecutionReport, ExecuteError> {
        check_ready(package)?;
        if package.mode() != PackagingMode::Combined {
            return Err(ExecuteError::UnsupportedMode(package.mode()));
        }
        let segments = package.split_mut()?;

        self.state = ExecutionState::Running;
        let program = Program {
            code: segments.code,
            registry: self.registry,
            context,
            options: &self.options,
            data_elements: segments.sizes.data_elements(),
            stack_capacity: segments.sizes.stack_capacity(),
        };
        let mut registers = Registers::for_lane(0);
        let result = execute_lane(&program, segments.metadata, segments.memory, &mut registers);

        match result {
            Ok((halt, statements)) => {
                self.state = ExecutionState::Halted(halt);
                debug!(
                    ?halt,
                    statements,
                    recoverable = registers.events.len(),
                    "execution finished"
                );
                Ok(ExecutionReport {
                    halt,
                    statements,
                    lanes: 1,
                    recoverable: registers.events,
                })
            }
            Err(fatal) => {
                self.state = ExecutionState::Halted(Halt::Failed);
                error!(error = %fatal, "execution aborted");
                Err(fatal.into())
            }
        }
    }
}

/// Statement loop for one lane with private metadata.
fn execute_lane(
    program: &Program<'_>,
    metadata: &mut [u8],
    memory: &mut [u8],
    registers: &mut Registers,
) -> Result<(Halt, usize), FatalError> {
    let mut pc = 0;
    let mut statements = 0;
    loop {
        if pc == program.code.len() {
            return Ok((Halt::Completed, statements));
        }
        if let Some(limit) = program.options.max_statements {
            if statements >= limit {
                return Err(FatalError::StatementLimit { limit });
            }
        }
        let step = run_statement(program, pc, metadata, memory, registers)?;
        apply_writes(metadata, &step.writes, pc)?;
        statements += 1;
        trace!(pc, flow = %step.flow, "statement");
        match step.flow {
            Flow::Next(next) => pc = next,
            Flow::Return => return Ok((Halt::Returned, statements)),
        }
    }
}

/// Run a Combined package and report a status code.
///
/// Recoverable errors still count as success; inspect sentinel outputs or
/// use [`Interpreter::run`] to see them.
pub fn execute(
    package: &mut Package,
    registry: Option<&FunctionRegistry>,
    context: CallContext<'_>,
) -> Status {
    let mut interpreter = Interpreter::new();
    if let Some(registry) = registry {
        interpreter = interpreter.with_registry(registry);
    }
    Status::of(&interpreter.run(package, context))
}
