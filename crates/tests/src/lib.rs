//! Integration test harness for Vexel.
//!
//! This crate provides utilities for end-to-end testing of the full
//! pipeline: Assemble → Resolve → Package → Execute → Verify.

use vexel_compiler::{Assembler, Assembly, CompileOptions, Compiled, PackageOptions, VariableDecl};
use vexel_foundation::{DataType, Shape, Value, VectorSize};
use vexel_function_registry::{library, CallContext, FunctionRegistry};
use vexel_package::{AllocatorTag, LaneBuffer, Package, PackagingMode};
use vexel_vm::{
    BatchConfig, BatchInterpreter, ExecuteError, ExecutionOptions, ExecutionReport, Interpreter,
};

/// Scalar numeric variable declaration.
pub fn numeric(name: &str) -> VariableDecl {
    VariableDecl::new(name, DataType::Numeric, VectorSize::One)
}

/// Test harness around one compiled package and the standard library.
pub struct TestHarness {
    compiled: Compiled,
    registry: FunctionRegistry,
    options: ExecutionOptions,
}

impl TestHarness {
    /// Compile a single segment built by `body` over `variables`.
    ///
    /// # Panics
    ///
    /// Panics if assembly or compilation fails.
    pub fn build(
        variables: Vec<VariableDecl>,
        mode: PackagingMode,
        body: impl FnOnce(&mut Assembler),
    ) -> Self {
        let mut asm = Assembler::new("main");
        body(&mut asm);
        let segment = asm.finish().expect("assembly failed");
        let assembly = variables
            .into_iter()
            .fold(Assembly::new(), Assembly::variable)
            .segment(segment);
        Self::from_assembly(&assembly, mode)
    }

    /// Compile a prepared assembly.
    ///
    /// # Panics
    ///
    /// Panics if compilation fails.
    pub fn from_assembly(assembly: &Assembly, mode: PackagingMode) -> Self {
        let options = CompileOptions {
            package: PackageOptions::default().with_mode(mode),
            ..CompileOptions::default()
        };
        let compiled = assembly.compile(options).expect("compilation failed");
        Self::from_compiled(compiled)
    }

    pub fn from_compiled(compiled: Compiled) -> Self {
        Self {
            compiled,
            registry: library::standard().expect("standard library"),
            options: ExecutionOptions::default().quiet(),
        }
    }

    pub fn with_options(mut self, options: ExecutionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn compiled(&self) -> &Compiled {
        &self.compiled
    }

    pub fn package(&self) -> &Package {
        &self.compiled.package
    }

    pub fn package_mut(&mut self) -> &mut Package {
        &mut self.compiled.package
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    /// Run the package once in place.
    pub fn run(&mut self) -> Result<ExecutionReport, ExecuteError> {
        Interpreter::new()
            .with_registry(&self.registry)
            .with_options(self.options.clone())
            .run(&mut self.compiled.package, CallContext::default())
    }

    /// Byte offset and shape of a variable.
    ///
    /// # Panics
    ///
    /// Panics if the variable is not declared.
    pub fn slot(&self, name: &str) -> (usize, Shape) {
        let symbol = self
            .compiled
            .symbols
            .require(name)
            .unwrap_or_else(|_| panic!("unknown variable '{name}'"));
        (symbol.mapping.offset, symbol.variable.shape())
    }

    /// Current value of a variable in the package.
    pub fn get(&self, name: &str) -> Value {
        let (offset, shape) = self.slot(name);
        self.compiled
            .package
            .read_data(offset, shape)
            .expect("variable readable")
    }

    pub fn get_f32(&self, name: &str) -> Option<f32> {
        self.get(name).as_f32()
    }

    /// Overwrite a variable in the package.
    pub fn set(&mut self, name: &str, value: Value) {
        let (offset, _) = self.slot(name);
        self.compiled
            .package
            .write_data(offset, &value)
            .expect("variable writable");
    }

    /// Replicate the data region into `lanes` lanes, seeding each lane
    /// through `seed`.
    pub fn lanes(&self, lanes: usize, seed: impl Fn(&mut LaneSeeder<'_>)) -> LaneBuffer {
        let mut buffer = self
            .compiled
            .package
            .replicate_for_batch(lanes, AllocatorTag::Aligned)
            .expect("replication failed");
        for lane in 0..lanes {
            seed(&mut LaneSeeder {
                harness: self,
                buffer: &mut buffer,
                lane,
            });
        }
        buffer
    }

    /// Run every lane in lock step.
    pub fn run_batch(
        &mut self,
        lanes: &mut LaneBuffer,
        config: BatchConfig,
    ) -> Result<ExecutionReport, ExecuteError> {
        BatchInterpreter::new(config)
            .with_registry(&self.registry)
            .with_options(self.options.clone())
            .run(&mut self.compiled.package, lanes, CallContext::default())
    }

    /// Value of a variable in one lane.
    pub fn lane_value(&self, lanes: &LaneBuffer, lane: usize, name: &str) -> Value {
        let (offset, shape) = self.slot(name);
        lanes
            .read_data(lane, offset, shape)
            .expect("lane variable readable")
    }
}

/// Writes seed values into one lane of a [`LaneBuffer`].
pub struct LaneSeeder<'a> {
    harness: &'a TestHarness,
    buffer: &'a mut LaneBuffer,
    lane: usize,
}

impl LaneSeeder<'_> {
    pub fn lane(&self) -> usize {
        self.lane
    }

    pub fn set(&mut self, name: &str, value: Value) {
        let (offset, _) = self.harness.slot(name);
        self.buffer
            .write_data(self.lane, offset, &value)
            .expect("lane variable writable");
    }
}
