//! Lock-step batched execution.
//!
//! One instruction stream runs against every lane of a [`LaneBuffer`]. The
//! program counter is shared: each statement executes on all lanes before
//! any lane moves on, and every lane must agree on where control goes next.
//! A lane that wants a different branch target is a fatal divergence, not a
//! per-lane fork.
//!
//! Metadata is either shared by all lanes (Combined and Batched packages)
//! or carried per lane (Segmented). Shared metadata is read by every lane
//! during a statement and updated once afterwards from the first lane's
//! writes, which all other lanes must reproduce when validation is on.
//!
//! # Determinism
//!
//! Lanes are split into chunks of [`BatchConfig::effective_size`] and the
//! chunks of one statement run on the rayon pool. Results are merged in
//! lane order, so the first divergent lane and the order of recoverable
//! events do not depend on thread scheduling.

use rayon::prelude::*;
use tracing::{debug, error, instrument, trace};
use vexel_function_registry::{CallContext, FunctionRegistry};
use vexel_package::{LaneBuffer, Package, PackageError, PackagingMode};

use crate::error::{ExecuteError, FatalError};
use crate::interpreter::check_ready;
use crate::machine::{apply_writes, run_statement, Flow, MetaWrite, Program, Registers};
use crate::options::{BatchConfig, ExecutionOptions};
use crate::report::{ExecutionReport, ExecutionState, Halt, Status};

/// One lane's views and registers.
struct LaneState<'b> {
    metadata: Option<&'b mut [u8]>,
    memory: &'b mut [u8],
    registers: Registers,
}

/// Control flow and metadata writes every lane so far agreed on.
struct Agreed {
    flow: Flow,
    writes: Vec<MetaWrite>,
}

/// Fold one lane's step into the agreement, failing on divergence.
fn merge(
    agreed: &mut Option<Agreed>,
    next: Agreed,
    lane: usize,
    pc: usize,
    check_writes: bool,
) -> Result<(), FatalError> {
    let Some(first) = agreed else {
        *agreed = Some(next);
        return Ok(());
    };
    if next.flow != first.flow {
        return Err(FatalError::LaneDivergence {
            position: pc,
            lane,
            expected: first.flow.to_string(),
            found: next.flow.to_string(),
        });
    }
    if check_writes && next.writes != first.writes {
        return Err(FatalError::MetadataDisagreement { position: pc, lane });
    }
    Ok(())
}

/// Run the statement at `pc` on a contiguous run of lanes.
///
/// Results are in lane order and stop at the first fatal error, so merging
/// them reproduces a sequential pass exactly.
fn step_lanes(
    program: &Program<'_>,
    pc: usize,
    shared: Option<&[u8]>,
    lanes: &mut [LaneState<'_>],
) -> Vec<Result<(usize, Agreed), FatalError>> {
    let mut results = Vec::with_capacity(lanes.len());
    for state in lanes.iter_mut() {
        let result = step_lane(program, pc, shared, state);
        let failed = result.is_err();
        results.push(result);
        if failed {
            break;
        }
    }
    results
}

fn step_lane(
    program: &Program<'_>,
    pc: usize,
    shared: Option<&[u8]>,
    state: &mut LaneState<'_>,
) -> Result<(usize, Agreed), FatalError> {
    let own = state.metadata.as_deref().unwrap_or_default();
    let metadata = shared.unwrap_or(own);
    let step = run_statement(program, pc, metadata, state.memory, &mut state.registers)?;
    if shared.is_none() {
        if let Some(own) = state.metadata.as_deref_mut() {
            apply_writes(own, &step.writes, pc)?;
        }
    }
    let agreed = Agreed {
        flow: step.flow,
        writes: step.writes,
    };
    Ok((state.registers.lane, agreed))
}

/// Batched interpreter over a replicated lane buffer.
#[derive(Debug, Default)]
pub struct BatchInterpreter<'r> {
    registry: Option<&'r FunctionRegistry>,
    options: ExecutionOptions,
    config: BatchConfig,
    state: ExecutionState,
}

impl<'r> BatchInterpreter<'r> {
    pub fn new(config: BatchConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn with_registry(mut self, registry: &'r FunctionRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_options(mut self, options: ExecutionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn state(&self) -> ExecutionState {
        self.state
    }

    /// Execute `package`'s code once per lane of `lanes`.
    ///
    /// `lanes` must come from [`Package::replicate_for_batch`] on the same
    /// package, or at least one with the same layout. Shared metadata is
    /// updated in place in `package`.
    ///
    /// # Errors
    ///
    /// As [`Interpreter::run`](crate::Interpreter::run), plus
    /// [`FatalError::LaneDivergence`] when lanes disagree on control flow
    /// and [`FatalError::MetadataDisagreement`] when they disagree on the
    /// shapes written to shared metadata. A lane buffer whose split differs
    /// from the package's fails with [`PackageError::LaneSplitMismatch`].
    #[instrument(skip_all, fields(mode = %package.mode(), lanes = lanes.lane_count()))]
    pub fn run(
        &mut self,
        package: &mut Package,
        lanes: &mut LaneBuffer,
        context: CallContext<'_>,
    ) -> Result<ExecutionReport, ExecuteError> {
        check_ready(package)?;
        if package.mode() == PackagingMode::Intermediate {
            return Err(ExecuteError::UnsupportedMode(package.mode()));
        }
        let expected = package.layout().lane_split()?;
        if *lanes.split() != expected {
            return Err(ExecuteError::Package(PackageError::LaneSplitMismatch {
                expected,
                found: lanes.split().clone(),
            }));
        }
        let segments = package.split_mut()?;
        let lane_count = lanes.lane_count();
        let per_lane = lanes.split().metadata.is_some();
        let mut shared = (!per_lane).then_some(segments.metadata);

        self.state = ExecutionState::Running;
        let program = Program {
            code: segments.code,
            registry: self.registry,
            context,
            options: &self.options,
            data_elements: segments.sizes.data_elements(),
            stack_capacity: segments.sizes.stack_capacity(),
        };
        let mut states: Vec<LaneState<'_>> = lanes
            .lanes_mut()
            .into_iter()
            .enumerate()
            .map(|(lane, views)| LaneState {
                metadata: views.metadata,
                memory: views.memory,
                registers: Registers::for_lane(lane),
            })
            .collect();

        let result = self.lock_step(&program, shared.as_deref_mut(), &mut states);
        match result {
            Ok((halt, statements)) => {
                self.state = ExecutionState::Halted(halt);
                let recoverable: Vec<_> = states
                    .into_iter()
                    .flat_map(|state| state.registers.events)
                    .collect();
                debug!(
                    ?halt,
                    statements,
                    recoverable = recoverable.len(),
                    "batch finished"
                );
                Ok(ExecutionReport {
                    halt,
                    statements,
                    lanes: lane_count,
                    recoverable,
                })
            }
            Err(fatal) => {
                self.state = ExecutionState::Halted(Halt::Failed);
                error!(error = %fatal, "batch aborted");
                Err(fatal.into())
            }
        }
    }

    fn lock_step(
        &self,
        program: &Program<'_>,
        mut shared: Option<&mut [u8]>,
        states: &mut [LaneState<'_>],
    ) -> Result<(Halt, usize), FatalError> {
        let chunk = self.config.effective_size();
        let parallel = self.config.parallel && states.len() > chunk;
        let check_writes = shared.is_some() && program.options.validate;
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

            let readable = shared.as_deref();
            let results: Vec<_> = if parallel {
                states
                    .par_chunks_mut(chunk)
                    .map(|lanes| step_lanes(program, pc, readable, lanes))
                    .collect::<Vec<_>>()
                    .into_iter()
                    .flatten()
                    .collect()
            } else {
                step_lanes(program, pc, readable, states)
            };
            let mut agreed = None;
            for result in results {
                let (lane, next) = result?;
                merge(&mut agreed, next, lane, pc, check_writes)?;
            }
            let Some(agreed) = agreed else {
                return Ok((Halt::Completed, statements));
            };
            trace!(pc, flow = %agreed.flow, "statement");

            if let Some(metadata) = shared.as_deref_mut() {
                apply_writes(metadata, &agreed.writes, pc)?;
            }
            statements += 1;
            match agreed.flow {
                Flow::Next(next) => pc = next,
                Flow::Return => return Ok((Halt::Returned, statements)),
            }
        }
    }
}

/// Run every lane and report a status code.
pub fn execute_batch(
    package: &mut Package,
    lanes: &mut LaneBuffer,
    registry: Option<&FunctionRegistry>,
    context: CallContext<'_>,
    config: BatchConfig,
) -> Status {
    let mut interpreter = BatchInterpreter::new(config);
    if let Some(registry) = registry {
        interpreter = interpreter.with_registry(registry);
    }
    Status::of(&interpreter.run(package, lanes, context))
}

#[cfg(test)]
mod tests;
