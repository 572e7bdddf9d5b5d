//! Variadic operations and vector construction.

use vexel_foundation::{DataType, DispatchKey, Op, Shape, Value, Vector, VectorSize};

use super::{flag, numeric, splat, Fault, Outcome, Wide, WideInt};
use crate::error::RecoverableError;
use crate::fetch::Fetched;

/// Fold `operands` with a variadic op (`MaxN` through `AllN`).
///
/// Every operand is broadcast to `size` for the folding ops; `AnyN` and
/// `AllN` test vector-wide truthiness and yield a Numeric scalar.
pub(crate) fn fold(op: Op, size: VectorSize, operands: &[Fetched]) -> Outcome {
    if matches!(op, Op::AnyN | Op::AllN) {
        if operands.is_empty() {
            return Err(Fault::new(
                RecoverableError::InvalidCount { op, count: 0 },
                numeric(VectorSize::One),
            ));
        }
        let truthy = |operand: &Fetched| operand.resolve().is_truthy();
        let hit = if op == Op::AnyN {
            operands.iter().any(truthy)
        } else {
            operands.iter().all(truthy)
        };
        return Ok(Value::numeric(flag(hit)));
    }

    let Some(first) = operands.first().map(Fetched::key) else {
        return Err(Fault::new(
            RecoverableError::InvalidCount { op, count: 0 },
            numeric(size),
        ));
    };
    let datatype = match first {
        numeric_keys!() | numeric64_keys!() | id_keys!() | id64_keys!() => first.datatype(),
        bool_keys!() | wide_bool_keys!() => DataType::Numeric,
    };
    let fallback = Shape::new(datatype, size);
    let fail = |error| Fault::new(error, fallback);

    let mut widened = Vec::with_capacity(operands.len());
    for operand in operands {
        let key = operand.key();
        if key.datatype() != first.datatype() {
            return Err(fail(RecoverableError::TypeMismatch {
                op,
                left: first.shape(),
                right: key.shape(),
            }));
        }
        let value = splat(&operand.resolve(), size).ok_or(RecoverableError::SizeMismatch {
            op,
            left: fallback,
            right: key.shape(),
        });
        widened.push(value.map_err(fail)?);
    }

    match first {
        numeric_keys!() | numeric64_keys!() => {
            let vectors: Vec<Vector<f64>> =
                widened.iter().filter_map(Wide::of).map(|w| w.v).collect();
            let out = Vector::from_fn(size, |i| {
                let mut components = vectors.iter().map(|v| v.get(i));
                let seed = components.next().unwrap_or(0.0);
                components.fold(seed, |acc, x| match op {
                    Op::MaxN => acc.max(x),
                    Op::MinN => acc.min(x),
                    Op::SumN => acc + x,
                    _ => acc * x,
                })
            });
            Ok(Wide::value(out, first.datatype() == DataType::Numeric64))
        }
        id_keys!() | id64_keys!() => {
            let vectors: Vec<Vector<i64>> =
                widened.iter().filter_map(WideInt::of).map(|w| w.v).collect();
            let wide = first.datatype() == DataType::Id64;
            let out = Vector::from_fn(size, |i| {
                let mut components = vectors.iter().map(|v| v.get(i));
                let seed = components.next().unwrap_or(0);
                components.fold(seed, |acc, x| match op {
                    Op::MaxN => acc.max(x),
                    Op::MinN => acc.min(x),
                    Op::SumN if wide => acc.wrapping_add(x),
                    Op::SumN => (acc as i32).wrapping_add(x as i32) as i64,
                    _ if wide => acc.wrapping_mul(x),
                    _ => (acc as i32).wrapping_mul(x as i32) as i64,
                })
            });
            Ok(WideInt::value(out, wide))
        }
        bool_keys!() | wide_bool_keys!() => Err(Fault::unsupported(op, first.shape(), fallback)),
    }
}

/// Assemble a vector of `shape` from the components of `operands`.
///
/// Operands must carry `shape`'s datatype; their components are laid out
/// in order and must add up to exactly `shape.size` components.
pub(crate) fn build(shape: Shape, operands: &[Value]) -> Outcome {
    let op = Op::PushV;
    let fail = |error| Fault::new(error, shape);
    let components: usize = operands.iter().map(|v| v.size().get()).sum();
    if operands.is_empty() || components != shape.size.get() {
        return Err(fail(RecoverableError::InvalidCount {
            op,
            count: components,
        }));
    }
    if let Some(odd) = operands.iter().find(|v| v.datatype() != shape.datatype) {
        return Err(fail(RecoverableError::TypeMismatch {
            op,
            left: shape,
            right: odd.shape(),
        }));
    }
    match shape.datatype {
        DataType::Numeric => {
            let flat: Vec<f32> = operands
                .iter()
                .filter_map(Value::as_numeric)
                .flat_map(|v| v.as_slice().to_vec())
                .collect();
            Ok(Value::Numeric(Vector::from_fn(shape.size, |i| flat[i])))
        }
        DataType::Id => {
            let flat: Vec<i32> = operands
                .iter()
                .filter_map(Value::as_id)
                .flat_map(|v| v.as_slice().to_vec())
                .collect();
            Ok(Value::Id(Vector::from_fn(shape.size, |i| flat[i])))
        }
        DataType::Bool32 => Ok(operands[0]),
        DataType::Numeric64 | DataType::Id64 => Err(Fault::unsupported(op, shape, shape)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(values: &[f32]) -> Vec<Fetched> {
        values.iter().map(|&v| Fetched::computed(Value::numeric(v))).collect()
    }

    fn fetched(values: &[Value]) -> Vec<Fetched> {
        values.iter().copied().map(Fetched::computed).collect()
    }

    #[test]
    fn test_max_of_five() {
        let operands = numbers(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(fold(Op::MaxN, VectorSize::One, &operands).unwrap(), Value::numeric(5.0));
        assert_eq!(fold(Op::MinN, VectorSize::One, &operands).unwrap(), Value::numeric(1.0));
        assert_eq!(fold(Op::SumN, VectorSize::One, &operands).unwrap(), Value::numeric(15.0));
        assert_eq!(fold(Op::MulN, VectorSize::One, &operands).unwrap(), Value::numeric(120.0));
    }

    #[test]
    fn test_scalars_broadcast_to_declared_size() {
        let operands = fetched(&[Value::id_vec(&[1, 8]).unwrap(), Value::id(4)]);
        assert_eq!(
            fold(Op::MaxN, VectorSize::Two, &operands).unwrap(),
            Value::id_vec(&[4, 8]).unwrap()
        );
        let fault = fold(Op::SumN, VectorSize::Three, &operands).unwrap_err();
        assert!(matches!(fault.error, RecoverableError::SizeMismatch { .. }));
        assert_eq!(fault.fallback, Shape::new(DataType::Id, VectorSize::Three));
    }

    #[test]
    fn test_zero_count_is_recoverable() {
        let fault = fold(Op::SumN, VectorSize::Two, &[]).unwrap_err();
        assert_eq!(fault.error, RecoverableError::InvalidCount { op: Op::SumN, count: 0 });
        assert_eq!(fault.fallback, numeric(VectorSize::Two));
    }

    #[test]
    fn test_any_all() {
        let operands = fetched(&[Value::numeric(1.0), Value::id(0)]);
        assert_eq!(fold(Op::AnyN, VectorSize::One, &operands).unwrap(), Value::numeric(1.0));
        assert_eq!(fold(Op::AllN, VectorSize::One, &operands).unwrap(), Value::numeric(0.0));
    }

    #[test]
    fn test_negated_operands_fold_resolved() {
        let mut operands = numbers(&[1.0, 2.0, 3.0]);
        operands[2] = operands[2].negate();
        assert_eq!(fold(Op::MaxN, VectorSize::One, &operands).unwrap(), Value::numeric(2.0));
        assert_eq!(fold(Op::SumN, VectorSize::One, &operands).unwrap(), Value::numeric(0.0));
        let ids = fetched(&[Value::id(4), Value::id(5)]);
        let negated: Vec<_> = ids.iter().map(|f| f.negate()).collect();
        assert_eq!(fold(Op::MinN, VectorSize::One, &negated).unwrap(), Value::id(-5));
    }

    #[test]
    fn test_masks_and_mixed_types_fall_back() {
        let masks = fetched(&[Value::bool32(1), Value::bool32(2)]);
        let fault = fold(Op::SumN, VectorSize::One, &masks).unwrap_err();
        assert!(matches!(fault.error, RecoverableError::Unsupported { .. }));
        assert_eq!(fault.fallback, numeric(VectorSize::One));
        let mixed = fetched(&[Value::numeric(1.0), Value::numeric64(2.0)]);
        let fault = fold(Op::MaxN, VectorSize::One, &mixed).unwrap_err();
        assert!(matches!(fault.error, RecoverableError::TypeMismatch { .. }));
    }

    #[test]
    fn test_build_concatenates_components() {
        let shape = Shape::new(DataType::Numeric, VectorSize::Four);
        let parts = [Value::numeric_vec(&[1.0, 2.0, 3.0]).unwrap(), Value::numeric(4.0)];
        assert_eq!(
            build(shape, &parts).unwrap(),
            Value::numeric_vec(&[1.0, 2.0, 3.0, 4.0]).unwrap()
        );
        let fault = build(shape, &parts[..1]).unwrap_err();
        assert_eq!(fault.error, RecoverableError::InvalidCount { op: Op::PushV, count: 3 });
        assert!(build(shape, &[Value::id(1), Value::id(2), Value::id(3), Value::id(4)]).is_err());
    }
}
