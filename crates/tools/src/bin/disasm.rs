//! Print a bytecode listing of a Vexel package.
//!
//! Usage: `disasm <package.vxp>`

use clap::Parser;
use std::path::PathBuf;
use std::process;
use tracing::error;

use vexel_function_registry::library;
use vexel_package::SegmentKind;

#[derive(Parser, Debug)]
#[command(name = "disasm")]
#[command(about = "Disassemble the code segment of a Vexel package")]
struct Args {
    /// Path to the package
    package: PathBuf,
}

fn main() {
    vexel_tools::init_logging();

    let args = Args::parse();

    let package = match vexel_package::load(&args.package) {
        Ok(package) => package,
        Err(e) => {
            error!("Error loading '{}': {}", args.package.display(), e);
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

    let code = match package.segment(SegmentKind::Code) {
        Ok(code) => code,
        Err(e) => {
            error!("{e}");
            process::exit(1);
        }
    };

    match vexel_vm::listing(code, Some(&registry)) {
        Ok(text) => print!("{text}"),
        Err(e) => {
            error!("Malformed code: {}", e);
            process::exit(1);
        }
    }
}
