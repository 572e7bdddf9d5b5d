//! Variables, data mappings and the symbol table.
//!
//! Variables are laid out in the data segment in declaration order, each
//! starting on an element boundary. A variable is addressed from code by the
//! index of its first element, so only the first 128 elements are reachable.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use vexel_foundation::{
    DataType, Shape, Value, VectorSize, ELEMENT_SIZE, MAX_VARIABLE_ELEMENT,
};

use crate::error::{CompileError, Result};

/// Declaration of a variable as the front end supplies it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDecl {
    pub name: String,
    pub datatype: DataType,
    #[serde(default = "default_size")]
    pub size: VectorSize,
    #[serde(default)]
    pub constant: bool,
    #[serde(default)]
    pub input: bool,
    #[serde(default)]
    pub output: bool,
    #[serde(default)]
    pub default: Option<Value>,
}

fn default_size() -> VectorSize {
    VectorSize::One
}

impl VariableDecl {
    pub fn new(name: impl Into<String>, datatype: DataType, size: VectorSize) -> Self {
        Self {
            name: name.into(),
            datatype,
            size,
            constant: false,
            input: false,
            output: false,
            default: None,
        }
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn constant(mut self) -> Self {
        self.constant = true;
        self
    }

    pub fn input(mut self) -> Self {
        self.input = true;
        self
    }

    pub fn output(mut self) -> Self {
        self.output = true;
        self
    }

    pub fn shape(&self) -> Shape {
        Shape::new(self.datatype, self.size)
    }
}

/// Compile-time descriptor of a declared variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub id: u32,
    pub name: String,
    /// How many times code references the variable.
    pub references: u32,
    pub datatype: DataType,
    pub size: VectorSize,
    pub constant: bool,
    pub input: bool,
    pub output: bool,
}

impl Variable {
    pub fn shape(&self) -> Shape {
        Shape::new(self.datatype, self.size)
    }
}

/// Where a variable lives in the data segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableMapping {
    /// Byte offset from the start of the data segment.
    pub offset: usize,
    pub byte_size: usize,
    pub default: Value,
}

impl VariableMapping {
    /// Index of the first element.
    #[inline]
    pub fn element(&self) -> usize {
        self.offset / ELEMENT_SIZE
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub variable: Variable,
    pub mapping: VariableMapping,
}

/// Declared variables keyed by name, in data layout order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolTable {
    symbols: IndexMap<String, Symbol>,
    data_size: usize,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from declarations in order.
    pub fn from_decls<'a>(decls: impl IntoIterator<Item = &'a VariableDecl>) -> Result<Self> {
        let mut table = Self::new();
        for decl in decls {
            table.declare(decl.clone())?;
        }
        Ok(table)
    }

    /// Declare a variable at the next free element.
    pub fn declare(&mut self, decl: VariableDecl) -> Result<&Symbol> {
        let shape = decl.shape();
        if !shape.is_representable() {
            return Err(CompileError::UnrepresentableShape {
                name: decl.name,
                shape: shape.to_string(),
            });
        }
        if self.symbols.contains_key(&decl.name) {
            return Err(CompileError::DuplicateVariable(decl.name));
        }
        let element = self.data_size / ELEMENT_SIZE;
        if element > MAX_VARIABLE_ELEMENT {
            return Err(CompileError::UnaddressableVariable {
                name: decl.name,
                element,
            });
        }
        let default = match decl.default {
            Some(value) if value.shape() != shape => {
                return Err(CompileError::DefaultShapeMismatch {
                    name: decl.name,
                    expected: shape.to_string(),
                    found: value.shape().to_string(),
                })
            }
            Some(value) => value,
            None => zero(shape),
        };
        let mapping = VariableMapping {
            offset: self.data_size,
            byte_size: shape.byte_size(),
            default,
        };
        self.data_size += shape.byte_size();
        let variable = Variable {
            id: self.symbols.len() as u32,
            name: decl.name.clone(),
            references: 0,
            datatype: decl.datatype,
            size: decl.size,
            constant: decl.constant,
            input: decl.input,
            output: decl.output,
        };
        let index = self.symbols.len();
        self.symbols.insert(decl.name, Symbol { variable, mapping });
        self.symbols
            .get_index(index)
            .map(|(_, symbol)| symbol)
            .ok_or(CompileError::UnknownVariable(String::new()))
    }

    /// Element index of `name`, counting one more reference.
    pub fn reference(&mut self, name: &str) -> Result<usize> {
        let symbol = self
            .symbols
            .get_mut(name)
            .ok_or_else(|| CompileError::UnknownVariable(name.to_string()))?;
        symbol.variable.references += 1;
        Ok(symbol.mapping.element())
    }

    /// Count a reference to the variable starting at `element`.
    ///
    /// Returns `false` when no variable starts there.
    pub fn reference_element(&mut self, element: usize) -> bool {
        match self
            .symbols
            .values_mut()
            .find(|symbol| symbol.mapping.element() == element)
        {
            Some(symbol) => {
                symbol.variable.references += 1;
                true
            }
            None => false,
        }
    }

    /// Symbol whose storage covers `element`.
    pub fn covering(&self, element: usize) -> Option<&Symbol> {
        self.iter().find(|symbol| {
            let start = symbol.mapping.element();
            (start..start + symbol.variable.shape().elements()).contains(&element)
        })
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    /// Look up a symbol, failing on unknown names.
    pub fn require(&self, name: &str) -> Result<&Symbol> {
        self.get(name)
            .ok_or_else(|| CompileError::UnknownVariable(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Total bytes of the data segment.
    pub fn data_size(&self) -> usize {
        self.data_size
    }

    /// Data segment image holding every default value.
    pub fn data_image(&self) -> Vec<u8> {
        let mut image = vec![0u8; self.data_size];
        for symbol in self.iter() {
            let mapping = &symbol.mapping;
            if let Some(bytes) = image.get_mut(mapping.offset..mapping.offset + mapping.byte_size) {
                mapping.default.write(bytes);
            }
        }
        image
    }

    /// Serialize as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

fn zero(shape: Shape) -> Value {
    match shape.datatype {
        DataType::Bool32 => Value::bool32(0),
        _ => {
            let bytes = [0u8; 32];
            Value::read(&bytes, shape).unwrap_or_default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_layout() {
        let mut table = SymbolTable::new();
        table
            .declare(VariableDecl::new("a", DataType::Numeric, VectorSize::One))
            .unwrap();
        table
            .declare(VariableDecl::new("p", DataType::Numeric64, VectorSize::Three))
            .unwrap();
        table
            .declare(VariableDecl::new("m", DataType::Bool32, VectorSize::One))
            .unwrap();
        assert_eq!(table.get("p").unwrap().mapping.offset, 4);
        assert_eq!(table.get("p").unwrap().mapping.byte_size, 24);
        assert_eq!(table.get("m").unwrap().mapping.element(), 7);
        assert_eq!(table.data_size(), 32);
        assert_eq!(table.get("m").unwrap().variable.id, 2);
    }

    #[test]
    fn test_duplicate_and_unknown() {
        let mut table = SymbolTable::new();
        table
            .declare(VariableDecl::new("a", DataType::Id, VectorSize::One))
            .unwrap();
        assert!(matches!(
            table.declare(VariableDecl::new("a", DataType::Id, VectorSize::One)),
            Err(CompileError::DuplicateVariable(_))
        ));
        assert!(matches!(table.reference("b"), Err(CompileError::UnknownVariable(_))));
    }

    #[test]
    fn test_unaddressable_variable() {
        let mut table = SymbolTable::new();
        for index in 0..32 {
            table
                .declare(VariableDecl::new(
                    format!("v{index}"),
                    DataType::Numeric,
                    VectorSize::Four,
                ))
                .unwrap();
        }
        assert!(matches!(
            table.declare(VariableDecl::new("late", DataType::Numeric, VectorSize::One)),
            Err(CompileError::UnaddressableVariable { element: 128, .. })
        ));
    }

    #[test]
    fn test_default_values_in_image() {
        let mut table = SymbolTable::new();
        table
            .declare(
                VariableDecl::new("a", DataType::Numeric, VectorSize::One)
                    .with_default(Value::numeric(2.5)),
            )
            .unwrap();
        table
            .declare(
                VariableDecl::new("b", DataType::Id, VectorSize::One).with_default(Value::id(-1)),
            )
            .unwrap();
        let image = table.data_image();
        assert_eq!(&image[..4], &2.5f32.to_le_bytes());
        assert_eq!(&image[4..], &(-1i32).to_le_bytes());
    }

    #[test]
    fn test_default_shape_checked() {
        let mut table = SymbolTable::new();
        let decl = VariableDecl::new("a", DataType::Numeric, VectorSize::Two)
            .with_default(Value::numeric(1.0));
        assert!(matches!(
            table.declare(decl),
            Err(CompileError::DefaultShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_reference_counting() {
        let mut table = SymbolTable::new();
        table
            .declare(VariableDecl::new("a", DataType::Numeric, VectorSize::One))
            .unwrap();
        table.reference("a").unwrap();
        table.reference("a").unwrap();
        assert_eq!(table.get("a").unwrap().variable.references, 2);
    }

    #[test]
    fn test_json_round_trip() {
        let mut table = SymbolTable::new();
        table
            .declare(VariableDecl::new("a", DataType::Numeric, VectorSize::Two).output())
            .unwrap();
        let json = table.to_json().unwrap();
        assert_eq!(SymbolTable::from_json(&json).unwrap(), table);
    }
}
