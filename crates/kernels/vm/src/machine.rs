//! Statement evaluation over one lane.
//!
//! [`run_statement`] executes exactly one statement starting at a code
//! offset and reports where control goes next. Data writes land in the
//! lane's memory immediately; metadata writes are returned as
//! [`MetaWrite`]s and applied by the caller once the statement is done, so
//! batched lanes sharing one metadata segment can be checked for agreement
//! before anything is committed.
//!
//! # Grammar
//!
//! ```text
//! statement := Nop | Return
//!            | Assign var sequence | Push sequence | PushV packed44 term*
//!            | Jump d | JumpBack d | Jz d sequence | Jnz d sequence
//!            | either-op
//! sequence  := term (infix term)* End
//! term      := Sub term | Not term | Begin sequence | var | constant
//!            | Pop | Peek | operation
//! ```

use tracing::warn;
use vexel_foundation::{
    decode44, decode62, decode_metadata, tag_elements, DataType, Encoding, Lane, Op, OpClass,
    Shape, Token, Value, ELEMENT_SIZE,
};
use vexel_function_registry::{CallContext, FunctionId, FunctionRegistry, MAX_ARGUMENTS};

use crate::cursor::Cursor;
use crate::error::{FatalError, RecoverableError};
use crate::fetch::{Fetched, Source};
use crate::handlers::{bits, convert, external, flag, infix, math, nary, splat, Outcome};
use crate::options::ExecutionOptions;
use crate::report::RecoverableEvent;

/// Read-only inputs shared by every lane of a run.
pub(crate) struct Program<'a> {
    pub code: &'a [u8],
    pub registry: Option<&'a FunctionRegistry>,
    pub context: CallContext<'a>,
    pub options: &'a ExecutionOptions,
    pub data_elements: usize,
    pub stack_capacity: usize,
}

/// Per-lane state that survives between statements.
#[derive(Debug, Clone, Default)]
pub(crate) struct Registers {
    pub lane: usize,
    /// Stack elements in use.
    pub sp: usize,
    pub events: Vec<RecoverableEvent>,
}

impl Registers {
    pub fn for_lane(lane: usize) -> Self {
        Self {
            lane,
            ..Self::default()
        }
    }
}

/// Deferred retag of the elements covered by `shape` at `element`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MetaWrite {
    pub element: usize,
    pub shape: Shape,
}

/// Commit metadata writes in order.
pub(crate) fn apply_writes(
    metadata: &mut [u8],
    writes: &[MetaWrite],
    position: usize,
) -> Result<(), FatalError> {
    for write in writes {
        if !tag_elements(metadata, write.element, write.shape) {
            return Err(FatalError::OutOfBounds {
                position,
                element: write.element + write.shape.elements() - 1,
                elements: metadata.len(),
            });
        }
    }
    Ok(())
}

/// Where control goes after a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Next(usize),
    Return,
}

impl std::fmt::Display for Flow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Flow::Next(position) => write!(f, "next {position}"),
            Flow::Return => f.write_str("return"),
        }
    }
}

/// Outcome of one statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Step {
    pub flow: Flow,
    pub writes: Vec<MetaWrite>,
}

/// Execute the statement at `pc`.
pub(crate) fn run_statement(
    program: &Program<'_>,
    pc: usize,
    metadata: &[u8],
    memory: &mut [u8],
    registers: &mut Registers,
) -> Result<Step, FatalError> {
    let mut evaluator = Evaluator {
        program,
        cursor: Cursor::new(program.code, pc),
        metadata,
        memory,
        registers,
        writes: Vec::new(),
        depth: 0,
    };
    let flow = evaluator.statement()?;
    Ok(Step {
        flow,
        writes: evaluator.writes,
    })
}

fn named(op: Op) -> Option<f32> {
    Some(match op {
        Op::Value0 => 0.0,
        Op::Value1 => 1.0,
        Op::Value2 => 2.0,
        Op::Value3 => 3.0,
        Op::Value4 => 4.0,
        Op::Value10 => 10.0,
        Op::Value100 => 100.0,
        Op::Half => 0.5,
        Op::Pi => std::f32::consts::PI,
        Op::Tau => std::f32::consts::TAU,
        Op::E => std::f32::consts::E,
        _ => return None,
    })
}

struct Evaluator<'p, 'a, 'm> {
    program: &'p Program<'a>,
    cursor: Cursor<'a>,
    metadata: &'m [u8],
    memory: &'m mut [u8],
    registers: &'m mut Registers,
    writes: Vec<MetaWrite>,
    depth: usize,
}

impl Evaluator<'_, '_, '_> {
    fn statement(&mut self) -> Result<Flow, FatalError> {
        let position = self.cursor.position();
        let byte = self.cursor.byte()?;
        let op = match Token::decode(byte) {
            Ok(Token::Op(op)) => op,
            Ok(Token::Variable(_)) => {
                return Err(FatalError::UnexpectedToken {
                    position,
                    byte,
                    expected: "statement",
                })
            }
            Err(_) => return Err(FatalError::InvalidOpcode { position, byte }),
        };

        match op {
            Op::Nop => {}
            Op::Return => return Ok(Flow::Return),
            Op::Assign => self.assign()?,
            Op::Push => {
                let value = self.sequence()?;
                self.push(value, position)?;
            }
            Op::PushV => {
                let value = self.build_vector(position)?;
                self.push(value, position)?;
            }
            Op::Jump | Op::JumpBack => {
                let at = self.cursor.position();
                let distance = self.cursor.byte()?;
                return self.jump(at, distance, op.jumps_backward());
            }
            Op::Jz | Op::Jnz => {
                let at = self.cursor.position();
                let distance = self.cursor.byte()?;
                let condition = self.sequence()?;
                if condition.is_truthy() == (op == Op::Jnz) {
                    return self.jump(at, distance, false);
                }
            }
            op if op.class() == OpClass::Either => {
                // Evaluated for its effect; the result is dropped.
                self.operation(op, position)?;
            }
            _ => {
                return Err(FatalError::UnexpectedToken {
                    position,
                    byte,
                    expected: "statement",
                })
            }
        }
        Ok(Flow::Next(self.cursor.position()))
    }

    /// Offsets count from the distance byte itself.
    fn jump(&self, at: usize, distance: u8, backward: bool) -> Result<Flow, FatalError> {
        let len = self.cursor.len();
        let target = if backward {
            at as isize - isize::from(distance)
        } else {
            at as isize + isize::from(distance)
        };
        if target < 0 || target as usize > len {
            return Err(FatalError::InvalidJump {
                position: at,
                target,
                len,
            });
        }
        Ok(Flow::Next(target as usize))
    }

    fn descend(&mut self) -> Result<(), FatalError> {
        self.depth += 1;
        if self.depth > self.program.options.max_nesting {
            return Err(FatalError::NestingTooDeep {
                position: self.cursor.position(),
                limit: self.program.options.max_nesting,
            });
        }
        Ok(())
    }

    /// `term (infix term)* End`, folded left to right.
    fn sequence(&mut self) -> Result<Value, FatalError> {
        self.descend()?;
        let result = self.sequence_body();
        self.depth -= 1;
        result
    }

    fn sequence_body(&mut self) -> Result<Value, FatalError> {
        let mut acc = self.term()?;
        loop {
            let position = self.cursor.position();
            let byte = self.cursor.byte()?;
            match Token::decode(byte) {
                Ok(Token::Op(Op::End)) => return Ok(acc.resolve()),
                Ok(Token::Op(op)) if op.class() == OpClass::Infix => {
                    let rhs = self.term()?;
                    let folded = self.recover(position, infix::apply(op, &acc, &rhs));
                    acc = Fetched::computed(folded);
                }
                Ok(_) => {
                    return Err(FatalError::UnexpectedToken {
                        position,
                        byte,
                        expected: "infix operator or end",
                    })
                }
                Err(_) => return Err(FatalError::InvalidOpcode { position, byte }),
            }
        }
    }

    fn term(&mut self) -> Result<Fetched, FatalError> {
        self.descend()?;
        let result = self.term_body();
        self.depth -= 1;
        result
    }

    fn term_body(&mut self) -> Result<Fetched, FatalError> {
        let position = self.cursor.position();
        let byte = self.cursor.byte()?;
        let op = match Token::decode(byte) {
            Ok(Token::Variable(element)) => return self.variable(usize::from(element), position),
            Ok(Token::Op(op)) => op,
            Err(_) => return Err(FatalError::InvalidOpcode { position, byte }),
        };
        if let Some(value) = named(op) {
            return Ok(Fetched::new(Value::numeric(value), Source::Constant));
        }

        let constant = |value| Ok(Fetched::new(value, Source::Constant));
        match op {
            Op::Sub => Ok(self.term()?.negate()),
            Op::Not => {
                let operand = self.term()?.resolve();
                Ok(Fetched::computed(Value::numeric(flag(!operand.is_truthy()))))
            }
            Op::Begin => Ok(Fetched::computed(self.sequence()?)),
            Op::Pop => Ok(Fetched::new(self.pop(position)?, Source::Stack)),
            Op::Peek => Ok(Fetched::new(self.top(position)?.1, Source::Stack)),
            Op::ConstF32 => constant(Value::numeric(f32::from_le_bytes(self.cursor.array()?))),
            Op::ConstI32 => constant(Value::id(i32::from_le_bytes(self.cursor.array()?))),
            Op::ConstBool32 => constant(Value::bool32(u32::from_le_bytes(self.cursor.array()?))),
            Op::ConstF64 => constant(Value::numeric64(f64::from_le_bytes(self.cursor.array()?))),
            Op::ConstI64 => constant(Value::id64(i64::from_le_bytes(self.cursor.array()?))),
            op if op.is_term() => Ok(Fetched::computed(self.operation(op, position)?)),
            _ => Err(FatalError::UnexpectedToken {
                position,
                byte,
                expected: "operand",
            }),
        }
    }

    /// Shape recorded for `element`, checked against the data segment.
    fn slot(&self, element: usize, position: usize) -> Result<Shape, FatalError> {
        let elements = self.program.data_elements;
        let out_of_bounds = |element| FatalError::OutOfBounds {
            position,
            element,
            elements,
        };
        if element >= elements {
            return Err(out_of_bounds(element));
        }
        let shape = self.shape_at(element)?;
        let end = element + shape.elements();
        if end > elements {
            return Err(out_of_bounds(end - 1));
        }
        self.check_slot(element, shape)?;
        Ok(shape)
    }

    fn shape_at(&self, element: usize) -> Result<Shape, FatalError> {
        let byte = *self
            .metadata
            .get(element)
            .ok_or(FatalError::InvalidMetadata { element, byte: 0 })?;
        decode_metadata(byte).map_err(|_| FatalError::InvalidMetadata { element, byte })
    }

    fn check_slot(&self, element: usize, shape: Shape) -> Result<(), FatalError> {
        if !self.program.options.validate {
            return Ok(());
        }
        let covered = self
            .metadata
            .get(element..element + shape.elements())
            .ok_or(FatalError::InconsistentSlot { element })?;
        if covered.iter().any(|byte| *byte != covered[0]) {
            return Err(FatalError::InconsistentSlot { element });
        }
        Ok(())
    }

    fn read(&self, element: usize, shape: Shape, position: usize) -> Result<Value, FatalError> {
        self.memory
            .get(element * ELEMENT_SIZE..)
            .and_then(|bytes| Value::read(bytes, shape))
            .ok_or(FatalError::OutOfBounds {
                position,
                element: element + shape.elements() - 1,
                elements: self.memory.len() / ELEMENT_SIZE,
            })
    }

    fn write(&mut self, element: usize, value: &Value, position: usize) -> Result<(), FatalError> {
        let elements = self.memory.len() / ELEMENT_SIZE;
        let written = self
            .memory
            .get_mut(element * ELEMENT_SIZE..)
            .is_some_and(|bytes| value.write(bytes));
        if !written {
            return Err(FatalError::OutOfBounds {
                position,
                element: element + value.elements() - 1,
                elements,
            });
        }
        Ok(())
    }

    fn variable(&mut self, element: usize, position: usize) -> Result<Fetched, FatalError> {
        let shape = self.slot(element, position)?;
        let value = self.read(element, shape, position)?;
        Ok(Fetched::new(value, Source::Variable(element)))
    }

    /// `Assign var sequence`. A value of another shape is not written;
    /// the target receives the sentinel of its own shape instead.
    fn assign(&mut self) -> Result<(), FatalError> {
        let position = self.cursor.position();
        let byte = self.cursor.byte()?;
        let Ok(Token::Variable(element)) = Token::decode(byte) else {
            return Err(FatalError::UnexpectedToken {
                position,
                byte,
                expected: "variable",
            });
        };
        let element = usize::from(element);
        let target = self.slot(element, position)?;
        let value = self.sequence()?;
        let stored = match splat(&value, target.size).filter(|v| v.shape() == target) {
            Some(stored) => stored,
            None => {
                self.record(
                    position,
                    RecoverableError::AssignMismatch {
                        element,
                        target,
                        value: value.shape(),
                    },
                );
                Value::sentinel(target)
            }
        };
        self.write(element, &stored, position)
    }

    fn push(&mut self, value: Value, position: usize) -> Result<(), FatalError> {
        let needed = self.registers.sp + value.elements();
        let capacity = self.program.stack_capacity;
        if needed > capacity {
            return Err(FatalError::StackOverflow {
                position,
                needed,
                capacity,
            });
        }
        let element = self.program.data_elements + self.registers.sp;
        self.write(element, &value, position)?;
        self.writes.push(MetaWrite {
            element,
            shape: value.shape(),
        });
        self.registers.sp = needed;
        Ok(())
    }

    /// Elements and value on top of the stack.
    fn top(&self, position: usize) -> Result<(usize, Value), FatalError> {
        let sp = self.registers.sp;
        let underflow = FatalError::StackUnderflow { position };
        if sp == 0 {
            return Err(underflow);
        }
        let base = self.program.data_elements;
        let shape = self.shape_at(base + sp - 1)?;
        let count = shape.elements();
        if count > sp {
            return Err(underflow);
        }
        let value = self.read(base + sp - count, shape, position)?;
        Ok((count, value))
    }

    fn pop(&mut self, position: usize) -> Result<Value, FatalError> {
        let (count, value) = self.top(position)?;
        self.registers.sp -= count;
        Ok(value)
    }

    /// `PushV packed44 term*`.
    fn build_vector(&mut self, position: usize) -> Result<Value, FatalError> {
        let at = self.cursor.position();
        let packed = decode44(self.cursor.byte()?)
            .map_err(|source| FatalError::Encoding { position: at, source })?;
        let mut operands = Vec::with_capacity(packed.count);
        for _ in 0..packed.count {
            operands.push(self.term()?.resolve());
        }
        Ok(self.recover(position, nary::build(packed.shape, &operands)))
    }

    /// Builtins, variadics, external calls and bit operations.
    fn operation(&mut self, op: Op, position: usize) -> Result<Value, FatalError> {
        let outcome = match op.encoding() {
            Encoding::Operands(1) => {
                let operand = self.term()?;
                match op {
                    Op::Csum | Op::Cmax | Op::Cmin => math::horizontal(op, &operand),
                    Op::ToId | Op::ToNumeric | Op::ToBool32 => convert::apply(op, &operand),
                    _ => math::unary(op, &operand),
                }
            }
            Encoding::Operands(2) => {
                let a = self.term()?;
                let b = self.term()?;
                math::binary(op, &a, &b)
            }
            Encoding::Operands(3) => {
                let a = self.term()?;
                let b = self.term()?;
                let c = self.term()?;
                math::ternary(op, &a, &b, &c)
            }
            Encoding::Packed62 => {
                let packed = decode62(self.cursor.byte()?);
                let mut operands = Vec::with_capacity(packed.count);
                for _ in 0..packed.count {
                    operands.push(self.term()?);
                }
                nary::fold(op, packed.size, &operands)
            }
            Encoding::External => self.call(position)?,
            Encoding::VariableOperands(arity) => self.bit_operation(op, arity, position)?,
            _ => {
                return Err(FatalError::UnexpectedToken {
                    position,
                    byte: op.as_byte(),
                    expected: "operation",
                })
            }
        };
        Ok(self.recover(position, outcome))
    }

    /// `CallExternal id:u16 argc term*`.
    fn call(&mut self, position: usize) -> Result<Outcome, FatalError> {
        let [lo, hi, argc] = self.cursor.array::<3>()?;
        let id = FunctionId(u16::from_le_bytes([lo, hi]));
        let count = usize::from(argc);
        if count > MAX_ARGUMENTS {
            return Err(FatalError::TooManyArguments {
                position,
                count,
                max: MAX_ARGUMENTS,
            });
        }
        let mut args = [Value::default(); MAX_ARGUMENTS];
        for slot in args.iter_mut().take(count) {
            *slot = self.term()?.resolve();
        }
        Ok(external::call(
            self.program.registry,
            &self.program.context,
            id,
            &args[..count],
        ))
    }

    /// `op target term{arity}`. The target must be a plain single-element
    /// variable; its word is read as raw bits.
    fn bit_operation(
        &mut self,
        op: Op,
        arity: u8,
        position: usize,
    ) -> Result<Outcome, FatalError> {
        let target = self.term()?;
        let arity = usize::from(arity).min(2);
        let mut operands = Vec::with_capacity(arity);
        for _ in 0..arity {
            operands.push(self.term()?);
        }
        let Some(element) = target.direct_variable() else {
            return Ok(bits::indirect(op));
        };
        let shape = self.slot(element, position)?;
        if shape.elements() != 1 {
            return Ok(bits::wide_target(op, shape));
        }
        let offset = element * ELEMENT_SIZE;
        let word = self
            .memory
            .get(offset..offset + ELEMENT_SIZE)
            .map(<u32 as Lane>::read_le)
            .ok_or(FatalError::OutOfBounds {
                position,
                element,
                elements: self.program.data_elements,
            })?;
        let result = match bits::apply(op, word, &operands) {
            Ok(result) => result,
            Err(fault) => return Ok(Err(fault)),
        };
        if let Some(store) = result.store {
            store.write_le(&mut self.memory[offset..offset + ELEMENT_SIZE]);
            self.writes.push(MetaWrite {
                element,
                shape: Shape::scalar(DataType::Bool32),
            });
        }
        Ok(Ok(result.value))
    }

    fn record(&mut self, position: usize, error: RecoverableError) {
        if self.program.options.log_recoverable {
            warn!(lane = self.registers.lane, position, %error, "recoverable error");
        }
        self.registers.events.push(RecoverableEvent {
            lane: self.registers.lane,
            position,
            error,
        });
    }

    /// Unwrap an outcome, substituting the sentinel on failure.
    fn recover(&mut self, position: usize, outcome: Outcome) -> Value {
        match outcome {
            Ok(value) => value,
            Err(fault) => {
                self.record(position, fault.error);
                Value::sentinel(fault.fallback)
            }
        }
    }
}
