//! Serializable compiler input and the end-to-end compile pipeline.
//!
//! An [`Assembly`] is what a front end hands over: variable declarations and
//! labelled code segments. It round-trips through JSON so tools can store
//! and inspect it.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use vexel_foundation::{scan, Token};
use vexel_package::Package;

use crate::error::Result;
use crate::node::CodeSegment;
use crate::packager::{PackageOptions, Packager};
use crate::resolver::{resolve_all, ResolveOptions, ResolveWarning};
use crate::variables::{SymbolTable, VariableDecl};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Assembly {
    #[serde(default)]
    pub variables: Vec<VariableDecl>,
    #[serde(default)]
    pub segments: Vec<CodeSegment>,
}

/// Options for [`Assembly::compile`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileOptions {
    #[serde(default)]
    pub resolve: ResolveOptions,
    #[serde(default)]
    pub package: PackageOptions,
}

/// Output of a successful compile.
#[derive(Debug)]
pub struct Compiled {
    pub package: Package,
    pub symbols: SymbolTable,
    /// Resolved code, also stored in the package.
    pub code: Vec<u8>,
    pub warnings: Vec<ResolveWarning>,
}

impl Assembly {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn variable(mut self, decl: VariableDecl) -> Self {
        self.variables.push(decl);
        self
    }

    pub fn segment(mut self, segment: CodeSegment) -> Self {
        self.segments.push(segment);
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Declare the variables, resolve every segment and package the result.
    pub fn compile(&self, options: CompileOptions) -> Result<Compiled> {
        let mut symbols = SymbolTable::from_decls(&self.variables)?;
        let resolved = resolve_all(&self.segments, options.resolve)?;
        count_references(&resolved.code, &mut symbols)?;
        let package = Packager::new(options.package).package(&resolved.code, &symbols)?;
        debug!(
            segments = self.segments.len(),
            variables = symbols.len(),
            warnings = resolved.warnings.len(),
            "compiled assembly"
        );
        if !resolved.warnings.is_empty() {
            info!(count = resolved.warnings.len(), "assembly compiled with warnings");
        }
        Ok(Compiled {
            package,
            symbols,
            code: resolved.code,
            warnings: resolved.warnings,
        })
    }
}

fn count_references(code: &[u8], symbols: &mut SymbolTable) -> Result<()> {
    for scanned in scan(code) {
        if let Token::Variable(element) = scanned?.token {
            symbols.reference_element(usize::from(element));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vexel_foundation::{DataType, Op, Shape, Value, VectorSize};
    use vexel_package::PackagingMode;

    use crate::assembler::Assembler;
    use crate::error::CompileError;

    fn assembly() -> Assembly {
        let mut asm = Assembler::new("main");
        asm.assign(0).op(Op::Value1).op(Op::Add).op(Op::Value2).end();
        Assembly::new()
            .variable(VariableDecl::new("a", DataType::Numeric, VectorSize::One).output())
            .segment(asm.finish().unwrap())
    }

    #[test]
    fn test_compile_packages_code() {
        let compiled = assembly().compile(CompileOptions::default()).unwrap();
        assert_eq!(compiled.code, vec![0x03, 0x80, 0x29, 0x10, 0x2A, 0x02]);
        assert_eq!(compiled.package.mode(), PackagingMode::Combined);
        assert_eq!(compiled.symbols.get("a").unwrap().variable.references, 1);
        assert_eq!(
            compiled
                .package
                .read_data(0, Shape::scalar(DataType::Numeric))
                .unwrap(),
            Value::numeric(0.0)
        );
    }

    #[test]
    fn test_json_round_trip() {
        let json = assembly().to_json().unwrap();
        assert_eq!(Assembly::from_json(&json).unwrap(), assembly());
    }

    #[test]
    fn test_compile_error_names_segment() {
        let mut asm = Assembler::new("broken");
        asm.jump("nowhere").op(Op::Nop);
        let assembly = Assembly::new().segment(asm.finish().unwrap());
        let err = assembly.compile(CompileOptions::default()).unwrap_err();
        match err {
            CompileError::Segment { segment, source } => {
                assert_eq!(segment, "broken");
                assert!(matches!(*source, CompileError::MissingLabel { .. }));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_segments_concatenate_in_order() {
        let mut first = Assembler::new("first");
        first.op(Op::Nop);
        let mut second = Assembler::new("second");
        second.op(Op::Return);
        let compiled = Assembly::new()
            .segment(first.finish().unwrap())
            .segment(second.finish().unwrap())
            .compile(CompileOptions::default())
            .unwrap();
        assert_eq!(compiled.code, vec![0x00, 0x0C]);
    }
}
