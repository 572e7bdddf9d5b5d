//! Compile an assembly description into a Vexel package.
//!
//! Usage: `compile <assembly.json> [--output FILE] [--mode MODE] [--stack N]`
//!
//! Writes the package and a `<name>.symbols.json` symbol table next to it.

use clap::Parser;
use std::fs;
use std::path::PathBuf;
use std::process;
use tracing::{error, info, warn};

use vexel_compiler::{Assembly, CompileOptions, PackageOptions, DEFAULT_STACK_ELEMENTS};

#[derive(Parser, Debug)]
#[command(name = "compile")]
#[command(about = "Compile an assembly JSON file into a Vexel package (.vxp)")]
struct Args {
    /// Path to the assembly JSON file
    input: PathBuf,

    /// Output package path (defaults to the input with a .vxp extension)
    #[arg(long = "output", short = 'o')]
    output: Option<PathBuf>,

    /// Packaging mode: combined, batched or segmented
    #[arg(long = "mode", default_value = "combined")]
    mode: String,

    /// Stack capacity in elements
    #[arg(long = "stack", default_value_t = DEFAULT_STACK_ELEMENTS)]
    stack: usize,
}

fn main() {
    vexel_tools::init_logging();

    let args = Args::parse();

    let mode = match vexel_tools::parse_mode(&args.mode) {
        Ok(mode) => mode,
        Err(e) => {
            error!("{e}");
            process::exit(1);
        }
    };

    let json = match fs::read_to_string(&args.input) {
        Ok(json) => json,
        Err(e) => {
            error!("Error reading '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    let assembly = match Assembly::from_json(&json) {
        Ok(assembly) => assembly,
        Err(e) => {
            error!("Error parsing '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    let options = CompileOptions {
        package: PackageOptions::default()
            .with_mode(mode)
            .with_stack(args.stack),
        ..CompileOptions::default()
    };

    info!(
        "Compiling {} segment(s), {} variable(s) as {}",
        assembly.segments.len(),
        assembly.variables.len(),
        mode
    );
    let compiled = match assembly.compile(options) {
        Ok(compiled) => compiled,
        Err(e) => {
            error!("Compilation error: {}", e);
            process::exit(1);
        }
    };

    for warning in &compiled.warnings {
        warn!("{warning}");
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| args.input.with_extension("vxp"));

    if let Err(e) = vexel_package::save(&output, &compiled.package) {
        error!("Error writing '{}': {}", output.display(), e);
        process::exit(1);
    }
    let symbols = match vexel_tools::save_symbols(&output, &compiled.symbols) {
        Ok(path) => path,
        Err(e) => {
            error!("{e:#}");
            process::exit(1);
        }
    };

    info!(
        "Wrote {} ({} bytes of code) and {}",
        output.display(),
        compiled.code.len(),
        symbols.display()
    );
}
