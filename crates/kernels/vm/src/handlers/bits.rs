//! Bit operations on a single-element variable's 32-bit word.
//!
//! The interpreter reads the target's raw bits, calls [`apply`] and, when
//! the result carries a store, writes it back and retags the target as a
//! scalar Bool32. Multi-element targets are rejected before any read.

use vexel_foundation::{DataType, DispatchKey, Encoding, Op, Shape, Value};

use super::{resolved, Fault, Outcome};
use crate::error::RecoverableError;
use crate::fetch::Fetched;

/// Result of a bit operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct BitResult {
    pub value: Value,
    /// New target bits, for the mutating operations.
    pub store: Option<u32>,
}

/// Shape of the value `op` yields.
pub(crate) fn result_shape(op: Op) -> Shape {
    match op {
        Op::GetBit => Shape::scalar(DataType::Numeric),
        Op::CountBits | Op::Lzcnt | Op::Tzcnt => Shape::scalar(DataType::Id),
        _ => Shape::scalar(DataType::Bool32),
    }
}

/// Scalar operand as a bit index, mask or shift amount.
fn word(op: Op, operand: &Fetched) -> Result<u32, Fault> {
    let finite = |x: f64| x.is_finite().then_some(x as u32);
    let word = match operand.key() {
        DispatchKey::F1 | DispatchKey::NegF1 => {
            resolved::<f32>(operand).and_then(|v| finite(f64::from(v.get(0))))
        }
        DispatchKey::D1 | DispatchKey::NegD1 => {
            resolved::<f64>(operand).and_then(|v| finite(v.get(0)))
        }
        DispatchKey::I1 | DispatchKey::NegI1 => resolved::<i32>(operand).map(|v| v.get(0) as u32),
        DispatchKey::L1 | DispatchKey::NegL1 => resolved::<i64>(operand).map(|v| v.get(0) as u32),
        bool_keys!() => resolved::<u32>(operand).map(|v| v.get(0)),
        // vectors
        _ => None,
    };
    word.ok_or_else(|| {
        Fault::new(
            RecoverableError::Unsupported {
                op,
                shape: operand.value.shape(),
            },
            result_shape(op),
        )
    })
}

/// Apply a bit operation to `bits` with its trailing operands.
pub(crate) fn apply(op: Op, bits: u32, operands: &[Fetched]) -> Result<BitResult, Fault> {
    let arity = match op.encoding() {
        Encoding::VariableOperands(n) => n as usize,
        _ => 0,
    };
    if operands.len() != arity {
        return Err(Fault::new(
            RecoverableError::InvalidCount {
                op,
                count: operands.len(),
            },
            result_shape(op),
        ));
    }
    let store = |bits: u32| BitResult {
        value: Value::bool32(bits),
        store: Some(bits),
    };
    let read = |value: Value| BitResult { value, store: None };

    Ok(match op {
        Op::SetBit | Op::SetBits => {
            let mask = word(op, &operands[0])?;
            let mask = if op == Op::SetBit { 1u32 << (mask & 31) } else { mask };
            if operands[1].resolve().is_truthy() {
                store(bits | mask)
            } else {
                store(bits & !mask)
            }
        }
        Op::GetBit => {
            let bit = word(op, &operands[0])? & 31;
            read(Value::numeric(((bits >> bit) & 1) as f32))
        }
        Op::GetBits => read(Value::bool32(bits & word(op, &operands[0])?)),
        Op::Rol => store(bits.rotate_left(word(op, &operands[0])? & 31)),
        Op::Ror => store(bits.rotate_right(word(op, &operands[0])? & 31)),
        Op::Shl => store(bits << (word(op, &operands[0])? & 31)),
        Op::Shr => store(bits >> (word(op, &operands[0])? & 31)),
        Op::CountBits => read(Value::id(bits.count_ones() as i32)),
        Op::Lzcnt => read(Value::id(bits.leading_zeros() as i32)),
        Op::Tzcnt => read(Value::id(bits.trailing_zeros() as i32)),
        _ => {
            return Err(Fault::new(
                RecoverableError::Unsupported {
                    op,
                    shape: Shape::scalar(DataType::Bool32),
                },
                result_shape(op),
            ))
        }
    })
}

/// Sentinel outcome for a bit operation whose target is not a variable.
pub(crate) fn indirect(op: Op) -> Outcome {
    Err(Fault::new(RecoverableError::IndirectTarget { op }, result_shape(op)))
}

/// Sentinel outcome for a bit operation on a multi-element variable.
pub(crate) fn wide_target(op: Op, shape: Shape) -> Outcome {
    Err(Fault::new(RecoverableError::WideTarget { op, shape }, result_shape(op)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(values: &[Value]) -> Vec<Fetched> {
        values.iter().copied().map(Fetched::computed).collect()
    }

    #[test]
    fn test_set_and_clear_bit() {
        let set = apply(Op::SetBit, 0, &c(&[Value::numeric(3.0), Value::numeric(1.0)])).unwrap();
        assert_eq!(set.store, Some(0b1000));
        let clear = apply(Op::SetBit, 0b1010, &c(&[Value::id(1), Value::id(0)])).unwrap();
        assert_eq!(clear.store, Some(0b1000));
        let operands = c(&[Value::bool32(0xF0), Value::numeric(1.0)]);
        let masked = apply(Op::SetBits, 0, &operands).unwrap();
        assert_eq!(masked.value, Value::bool32(0xF0));
    }

    #[test]
    fn test_reads_do_not_store() {
        let bit = apply(Op::GetBit, 0b100, &c(&[Value::id(2)])).unwrap();
        assert_eq!(bit, BitResult { value: Value::numeric(1.0), store: None });
        let bits = apply(Op::GetBits, 0b1110, &c(&[Value::bool32(0b0110)])).unwrap();
        assert_eq!(bits.value, Value::bool32(0b0110));
        assert_eq!(apply(Op::CountBits, 0xFF, &[]).unwrap().value, Value::id(8));
        assert_eq!(apply(Op::Lzcnt, 1, &[]).unwrap().value, Value::id(31));
        assert_eq!(apply(Op::Tzcnt, 0, &[]).unwrap().value, Value::id(32));
    }

    #[test]
    fn test_shifts_and_rotates() {
        let shift = |op, bits, amount| apply(op, bits, &c(&[Value::id(amount)])).unwrap().store;
        assert_eq!(shift(Op::Rol, 0x8000_0001, 1), Some(0x0000_0003));
        assert_eq!(shift(Op::Ror, 1, 1), Some(0x8000_0000));
        assert_eq!(shift(Op::Shl, 1, 33), Some(2));
        assert_eq!(shift(Op::Shr, 0x10, 4), Some(1));
    }

    #[test]
    fn test_negated_operands_resolve() {
        let mask = c(&[Value::bool32(0x0F)])[0].negate();
        let bits = apply(Op::GetBits, u32::MAX, &[mask]).unwrap();
        assert_eq!(bits.value, Value::bool32(0xFFFF_FFF0));
        let shift = c(&[Value::id(-31)])[0].negate();
        assert_eq!(apply(Op::Shl, 1, &[shift]).unwrap().store, Some(0x8000_0000));
    }

    #[test]
    fn test_vector_operand_falls_back() {
        let fault = apply(Op::GetBit, 1, &c(&[Value::id_vec(&[1, 2]).unwrap()])).unwrap_err();
        assert_eq!(fault.fallback, Shape::scalar(DataType::Numeric));
        let fault = apply(Op::Shr, 1, &c(&[Value::numeric(f32::NAN)])).unwrap_err();
        assert!(matches!(fault.error, RecoverableError::Unsupported { op: Op::Shr, .. }));
        let fault = indirect(Op::SetBit).unwrap_err();
        assert_eq!(fault.error, RecoverableError::IndirectTarget { op: Op::SetBit });
    }
}
