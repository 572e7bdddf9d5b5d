//! Package builders shared by unit tests.

use vexel_compiler::{Assembler, Assembly, CompileOptions, Compiled, PackageOptions, VariableDecl};
use vexel_foundation::{DataType, Value, VectorSize};
use vexel_package::{Package, PackagingMode};

pub(crate) fn numeric(name: &str) -> VariableDecl {
    VariableDecl::new(name, DataType::Numeric, VectorSize::One)
}

/// Compile one segment over `variables` into a package of `mode`.
pub(crate) fn compile(
    variables: Vec<VariableDecl>,
    mode: PackagingMode,
    body: impl FnOnce(&mut Assembler),
) -> Compiled {
    let mut asm = Assembler::new("main");
    body(&mut asm);
    let assembly = variables
        .into_iter()
        .fold(Assembly::new(), Assembly::variable)
        .segment(asm.finish().unwrap());
    let options = CompileOptions {
        package: PackageOptions::default().with_mode(mode),
        ..CompileOptions::default()
    };
    assembly.compile(options).unwrap()
}

/// Current value of a named variable.
pub(crate) fn read(compiled: &Compiled, name: &str) -> Value {
    read_from(&compiled.package, compiled, name)
}

pub(crate) fn read_from(package: &Package, compiled: &Compiled, name: &str) -> Value {
    let symbol = compiled.symbols.require(name).unwrap();
    package
        .read_data(symbol.mapping.offset, symbol.variable.shape())
        .unwrap()
}
