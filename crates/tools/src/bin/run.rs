//! Execute a Vexel package and print its variables.
//!
//! Usage: `run <package.vxp> [--lanes N] [--set name=value]... [--limit N]`
//!
//! Without `--lanes` the package runs once in place (Combined mode only).
//! With `--lanes` the data region is replicated and every lane runs in
//! lock step; `--set` seeds all lanes, and `--lane-input` additionally adds
//! the lane index to the named variable.

use clap::Parser;
use std::path::PathBuf;
use std::process;
use tracing::{error, info, warn};

use vexel_compiler::SymbolTable;
use vexel_compiler::Symbol;
use vexel_function_registry::{library, CallContext, FunctionRegistry};
use vexel_package::{AllocatorTag, Package};
use vexel_tools::Assignment;
use vexel_vm::{BatchConfig, BatchInterpreter, ExecutionOptions, ExecutionReport, Interpreter};

#[derive(Parser, Debug)]
#[command(name = "run")]
#[command(about = "Execute a Vexel package")]
struct Args {
    /// Path to the package
    package: PathBuf,

    /// Replicate the data region into N lanes and run them in lock step
    #[arg(long = "lanes")]
    lanes: Option<usize>,

    /// Lanes per parallel chunk (defaults to a size derived from --lanes)
    #[arg(long = "chunk")]
    chunk: Option<usize>,

    /// Seed a variable before running (repeatable)
    #[arg(long = "set", value_name = "NAME=VALUE")]
    set: Vec<Assignment>,

    /// Add the lane index to this variable in batched runs
    #[arg(long = "lane-input")]
    lane_input: Option<String>,

    /// Maximum statements executed per run
    #[arg(long = "limit")]
    limit: Option<usize>,
}

fn main() {
    vexel_tools::init_logging();

    let args = Args::parse();

    let mut package = match vexel_package::load(&args.package) {
        Ok(package) => package,
        Err(e) => {
            error!("Error loading '{}': {}", args.package.display(), e);
            process::exit(1);
        }
    };

    let symbols = match vexel_tools::load_symbols(&args.package) {
        Ok(Some(symbols)) => symbols,
        Ok(None) => {
            if !args.set.is_empty() || args.lane_input.is_some() {
                error!("--set and --lane-input need a symbol table next to the package");
                process::exit(1);
            }
            warn!("No symbol table found; printing raw slots");
            SymbolTable::new()
        }
        Err(e) => {
            error!("{e:#}");
            process::exit(1);
        }
    };

    let registry = match library::standard() {
        Ok(registry) => registry,
        Err(e) => {
            error!("Error building function library: {}", e);
            process::exit(1);
        }
    };

    let mut options = ExecutionOptions::default();
    if let Some(limit) = args.limit {
        options = options.with_statement_limit(limit);
    }
    let context = CallContext::default();

    let outcome = match args.lanes {
        None => run_single(&mut package, &symbols, &args, options, context, &registry),
        Some(lanes) => run_batch(&mut package, &symbols, &args, lanes, options, context, &registry),
    };

    if let Err(e) = outcome {
        error!("{e:#}");
        process::exit(1);
    }
}

fn log_report(report: &ExecutionReport) {
    info!(
        "Halted ({:?}) after {} statement(s) over {} lane(s)",
        report.halt, report.statements, report.lanes
    );
    for event in &report.recoverable {
        warn!(
            "lane {} at {:#06x}: {}",
            event.lane, event.position, event.error
        );
    }
}

fn resolve<'s>(symbols: &'s SymbolTable, name: &str) -> anyhow::Result<&'s Symbol> {
    Ok(symbols.require(name)?)
}

fn run_single(
    package: &mut Package,
    symbols: &SymbolTable,
    args: &Args,
    options: ExecutionOptions,
    context: CallContext,
    registry: &FunctionRegistry,
) -> anyhow::Result<()> {
    for assignment in &args.set {
        let symbol = resolve(symbols, &assignment.name)?;
        let value = vexel_tools::splat(symbol.variable.shape(), assignment.value);
        package.write_data(symbol.mapping.offset, &value)?;
    }

    let report = Interpreter::new()
        .with_registry(registry)
        .with_options(options)
        .run(package, context)?;
    log_report(&report);

    let slots = if symbols.is_empty() {
        vexel_tools::slots(package)?
    } else {
        Vec::new()
    };
    let lines = vexel_tools::describe_data(
        Some(symbols).filter(|symbols| !symbols.is_empty()),
        |offset, shape| Ok(package.read_data(offset, shape)?),
        &slots,
    )?;
    for line in lines {
        println!("{line}");
    }
    Ok(())
}

fn run_batch(
    package: &mut Package,
    symbols: &SymbolTable,
    args: &Args,
    lanes: usize,
    options: ExecutionOptions,
    context: CallContext,
    registry: &FunctionRegistry,
) -> anyhow::Result<()> {
    if symbols.is_empty() {
        anyhow::bail!("batched runs need a symbol table next to the package");
    }
    let mut buffer = package.replicate_for_batch(lanes, AllocatorTag::Aligned)?;

    for assignment in &args.set {
        let symbol = resolve(symbols, &assignment.name)?;
        let value = vexel_tools::splat(symbol.variable.shape(), assignment.value);
        for lane in 0..lanes {
            buffer.write_data(lane, symbol.mapping.offset, &value)?;
        }
    }
    if let Some(name) = &args.lane_input {
        let symbol = resolve(symbols, name)?;
        let base = args
            .set
            .iter()
            .rfind(|assignment| &assignment.name == name)
            .map_or(0.0, |assignment| assignment.value);
        for lane in 0..lanes {
            let value = vexel_tools::splat(symbol.variable.shape(), base + lane as f64);
            buffer.write_data(lane, symbol.mapping.offset, &value)?;
        }
    }

    let config = args.chunk.map_or_else(|| BatchConfig::auto(lanes), BatchConfig::new);
    let report = BatchInterpreter::new(config)
        .with_registry(registry)
        .with_options(options)
        .run(package, &mut buffer, context)?;
    log_report(&report);

    for lane in 0..lanes {
        let lines = vexel_tools::describe_data(
            Some(symbols),
            |offset, shape| Ok(buffer.read_data(lane, offset, shape)?),
            &[],
        )?;
        println!("lane {lane}: {}", lines.join(", "));
    }
    Ok(())
}
