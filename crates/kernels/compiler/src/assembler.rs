//! Builder that emits a [`CodeSegment`].
//!
//! The assembler writes bytes in stream order. Errors (unaddressable
//! variables, counts that do not pack) are recorded and returned from
//! [`Assembler::finish`], so emission can be chained.
//!
//! ```text
//! // a = 1 + 2 * 3   (front end already ordered precedence)
//! Assembler::new("main")
//!     .assign(a).op(Op::Value1).op(Op::Add).op(Op::Begin)
//!     .op(Op::Value2).op(Op::Mul).op(Op::Value3).end().end()
//! ```

use vexel_foundation::{encode44, encode62, variable_byte, Op, Shape, VectorSize};

use crate::error::{CompileError, Result};
use crate::node::{CodeSegment, JumpLabel, Node};
use crate::variables::SymbolTable;

#[derive(Debug)]
pub struct Assembler {
    segment: CodeSegment,
    error: Option<CompileError>,
}

impl Assembler {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            segment: CodeSegment::new(name),
            error: None,
        }
    }

    fn record<T>(&mut self, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                if self.error.is_none() {
                    self.error = Some(e);
                }
                None
            }
        }
    }

    /// Append a raw byte.
    pub fn byte(&mut self, code: u8) -> &mut Self {
        self.segment.nodes.push(Node::new(code));
        self
    }

    /// Append a raw node, labels included.
    pub fn node(&mut self, node: Node) -> &mut Self {
        self.segment.nodes.push(node);
        self
    }

    pub fn op(&mut self, op: Op) -> &mut Self {
        self.byte(op.as_byte())
    }

    pub fn ops(&mut self, ops: &[Op]) -> &mut Self {
        for op in ops {
            self.op(*op);
        }
        self
    }

    /// Close the current sequence.
    pub fn end(&mut self) -> &mut Self {
        self.op(Op::End)
    }

    /// Reference the data element at `element`.
    pub fn var(&mut self, element: usize) -> &mut Self {
        if let Some(byte) = self.record(variable_byte(element).map_err(CompileError::from)) {
            self.byte(byte);
        }
        self
    }

    /// Reference a declared variable by name and count the reference.
    pub fn variable(&mut self, symbols: &mut SymbolTable, name: &str) -> &mut Self {
        if let Some(element) = self.record(symbols.reference(name)) {
            self.var(element);
        }
        self
    }

    fn inline(&mut self, op: Op, bytes: &[u8]) -> &mut Self {
        self.op(op);
        for byte in bytes {
            self.byte(*byte);
        }
        self
    }

    pub fn const_f32(&mut self, value: f32) -> &mut Self {
        self.inline(Op::ConstF32, &value.to_le_bytes())
    }

    pub fn const_i32(&mut self, value: i32) -> &mut Self {
        self.inline(Op::ConstI32, &value.to_le_bytes())
    }

    pub fn const_bool32(&mut self, value: u32) -> &mut Self {
        self.inline(Op::ConstBool32, &value.to_le_bytes())
    }

    pub fn const_f64(&mut self, value: f64) -> &mut Self {
        self.inline(Op::ConstF64, &value.to_le_bytes())
    }

    pub fn const_i64(&mut self, value: i64) -> &mut Self {
        self.inline(Op::ConstI64, &value.to_le_bytes())
    }

    /// An N-ary builtin header: opcode then its decode62 byte.
    pub fn nary(&mut self, op: Op, count: usize, size: VectorSize) -> &mut Self {
        self.op(op);
        if let Some(byte) = self.record(encode62(count, size).map_err(CompileError::from)) {
            self.byte(byte);
        }
        self
    }

    /// A `PushV` header: opcode then its decode44 byte.
    pub fn push_vector(&mut self, count: usize, shape: Shape) -> &mut Self {
        self.op(Op::PushV);
        if let Some(byte) = self.record(encode44(count, shape).map_err(CompileError::from)) {
            self.byte(byte);
        }
        self
    }

    /// A `CallExternal` header: opcode, little-endian id, argument count.
    pub fn call_external(&mut self, id: u16, argc: u8) -> &mut Self {
        let [lo, hi] = id.to_le_bytes();
        self.op(Op::CallExternal).byte(lo).byte(hi).byte(argc)
    }

    /// `Assign var` header; the value sequence follows.
    pub fn assign(&mut self, element: usize) -> &mut Self {
        self.op(Op::Assign).var(element)
    }

    /// `Push` header; the value sequence follows.
    pub fn push(&mut self) -> &mut Self {
        self.op(Op::Push)
    }

    /// Place a branch target before the next emitted statement.
    pub fn anchor(&mut self, label: impl Into<String>) -> &mut Self {
        self.node(Node::with_label(
            Op::Nop.as_byte(),
            JumpLabel::definition(label),
        ))
    }

    fn offset(&mut self, op: Op, label: impl Into<String>) -> &mut Self {
        self.op(op);
        self.node(Node::with_label(0, JumpLabel::reference(label)))
    }

    /// Unconditional forward jump.
    pub fn jump(&mut self, label: impl Into<String>) -> &mut Self {
        self.offset(Op::Jump, label)
    }

    /// Unconditional backward jump.
    pub fn jump_back(&mut self, label: impl Into<String>) -> &mut Self {
        self.offset(Op::JumpBack, label)
    }

    /// Forward jump when the following condition sequence is false.
    pub fn jz(&mut self, label: impl Into<String>) -> &mut Self {
        self.offset(Op::Jz, label)
    }

    /// Forward jump when the following condition sequence is true.
    pub fn jnz(&mut self, label: impl Into<String>) -> &mut Self {
        self.offset(Op::Jnz, label)
    }

    /// Current length in nodes.
    pub fn len(&self) -> usize {
        self.segment.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segment.is_empty()
    }

    /// Finish the segment, surfacing the first recorded error.
    pub fn finish(&mut self) -> Result<CodeSegment> {
        if let Some(error) = self.error.take() {
            return Err(error.in_segment(self.segment.name.clone()));
        }
        Ok(std::mem::take(&mut self.segment))
    }
}
