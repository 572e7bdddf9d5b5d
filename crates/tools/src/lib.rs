//! Vexel Tools
//!
//! CLI tools for working with Vexel packages:
//!
//! - `compile` - assembly JSON to a `.vxp` package plus its symbol table
//! - `inspect` - header, layout and per-element metadata of a package
//! - `disasm` - bytecode listing
//! - `run` - execute a package, optionally over replicated lanes

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing_subscriber::{fmt, EnvFilter};
use vexel_compiler::SymbolTable;
use vexel_foundation::{decode_metadata, DataType, Shape, Value, Vector, ELEMENT_SIZE};
use vexel_package::{Package, PackagingMode, SegmentKind};

/// Initialize logging with a default filter.
///
/// Use `RUST_LOG` environment variable to override the default filter.
/// Default is `info` for vexel crates and `warn` for others.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("warn,vexel_tools=info,vexel_vm=info,vexel_compiler=info,vexel_package=info")
    });

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Parse a `--mode` argument. The staging layout is not accepted.
pub fn parse_mode(name: &str) -> Result<PackagingMode> {
    Ok(match name.to_ascii_lowercase().as_str() {
        "combined" => PackagingMode::Combined,
        "batched" => PackagingMode::Batched,
        "segmented" => PackagingMode::Segmented,
        other => {
            bail!("unknown packaging mode '{other}' (expected combined, batched or segmented)")
        }
    })
}

/// A `name=value` override from the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub name: String,
    pub value: f64,
}

impl std::str::FromStr for Assignment {
    type Err = anyhow::Error;

    fn from_str(text: &str) -> Result<Self> {
        let Some((name, value)) = text.split_once('=') else {
            bail!("expected name=value, got '{text}'");
        };
        let value = value
            .trim()
            .parse()
            .with_context(|| format!("invalid number in '{text}'"))?;
        Ok(Self {
            name: name.trim().to_string(),
            value,
        })
    }
}

/// `value` splatted over every component of `shape`.
pub fn splat(shape: Shape, value: f64) -> Value {
    match shape.datatype {
        DataType::Numeric => Value::Numeric(Vector::splat(value as f32, shape.size)),
        DataType::Id => Value::Id(Vector::splat(value as i32, shape.size)),
        DataType::Bool32 => Value::Bool32(value as u32),
        DataType::Numeric64 => Value::Numeric64(Vector::splat(value, shape.size)),
        DataType::Id64 => Value::Id64(Vector::splat(value as i64, shape.size)),
    }
}

/// Symbol table written next to a package: `foo.vxp` -> `foo.symbols.json`.
pub fn symbols_path(package: &Path) -> PathBuf {
    package.with_extension("symbols.json")
}

pub fn save_symbols(package: &Path, symbols: &SymbolTable) -> Result<PathBuf> {
    let path = symbols_path(package);
    let json = symbols.to_json().context("serializing symbol table")?;
    fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

/// Symbol table for `package`, if one was written alongside it.
pub fn load_symbols(package: &Path) -> Result<Option<SymbolTable>> {
    let path = symbols_path(package);
    if !path.exists() {
        return Ok(None);
    }
    let json = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    let symbols = SymbolTable::from_json(&json)
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(Some(symbols))
}

/// One data slot as recorded in a package's metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub element: usize,
    pub shape: Shape,
    pub value: Value,
}

/// Walk the data segment slot by slot using the metadata tags.
///
/// Elements whose metadata byte does not decode are skipped one at a time.
pub fn slots(package: &Package) -> Result<Vec<Slot>> {
    let metadata = package.segment(SegmentKind::Metadata)?;
    let data = package.segment(SegmentKind::Data)?;
    let elements = data.len() / ELEMENT_SIZE;
    let mut slots = Vec::new();
    let mut element = 0;
    while element < elements {
        let shape = metadata.get(element).map(|byte| decode_metadata(*byte));
        match shape {
            Some(Ok(shape)) if element + shape.elements() <= elements => {
                let value = package.read_data(element * ELEMENT_SIZE, shape)?;
                slots.push(Slot {
                    element,
                    shape,
                    value,
                });
                element += shape.elements();
            }
            _ => element += 1,
        }
    }
    Ok(slots)
}

/// `name = value` lines for every symbol, or raw slots without symbols.
pub fn describe_data(
    symbols: Option<&SymbolTable>,
    read: impl Fn(usize, Shape) -> Result<Value>,
    fallback: &[Slot],
) -> Result<Vec<String>> {
    match symbols {
        Some(symbols) => symbols
            .iter()
            .map(|symbol| {
                let value = read(symbol.mapping.offset, symbol.variable.shape())?;
                Ok(format!("{} = {}", symbol.variable.name, value))
            })
            .collect(),
        None => fallback
            .iter()
            .map(|slot| Ok(format!("[{}] {} = {}", slot.element, slot.shape, slot.value)))
            .collect(),
    }
}
