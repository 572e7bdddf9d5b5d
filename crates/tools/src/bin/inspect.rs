//! Inspect the header, layout and data of a Vexel package.
//!
//! Usage: `inspect <package.vxp> [--json]`

use clap::Parser;
use serde_json::json;
use std::path::PathBuf;
use std::process;
use tracing::error;

use vexel_package::Package;

#[derive(Parser, Debug)]
#[command(name = "inspect")]
#[command(about = "Show the header, segment layout and data slots of a Vexel package")]
struct Args {
    /// Path to the package
    package: PathBuf,

    /// Emit JSON instead of text
    #[arg(long)]
    json: bool,
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

    if let Err(e) = report(&args, &package) {
        error!("{e:#}");
        process::exit(1);
    }
}

fn report(args: &Args, package: &Package) -> anyhow::Result<()> {
    let header = package.header();
    let sizes = package.sizes()?;
    let slots = vexel_tools::slots(package)?;
    let symbols = vexel_tools::load_symbols(&args.package)?;
    let named = vexel_tools::describe_data(
        symbols.as_ref(),
        |offset, shape| Ok(package.read_data(offset, shape)?),
        &slots,
    )?;

    if args.json {
        let doc = json!({
            "language": header.language.0,
            "mode": package.mode().to_string(),
            "flags": header.flags.bits(),
            "allocator": format!("{:?}", header.allocator),
            "offsets": package.layout().offsets(),
            "sizes": sizes,
            "slots": slots
                .iter()
                .map(|slot| json!({
                    "element": slot.element,
                    "shape": slot.shape.to_string(),
                    "value": slot.value,
                }))
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!("language:   {}", header.language);
    println!("mode:       {}", package.mode());
    println!("flags:      {:?}", header.flags);
    println!("allocator:  {:?}", header.allocator);
    println!("offsets:    {:?}", package.layout().offsets());
    println!(
        "sizes:      code {} / metadata {} / data {} / stack {} bytes",
        sizes.code, sizes.metadata, sizes.data, sizes.stack
    );
    println!(
        "elements:   {} data, {} stack",
        sizes.data_elements(),
        sizes.stack_capacity()
    );
    println!();
    for line in named {
        println!("  {line}");
    }
    Ok(())
}
