//! Builtin math: unary, binary, ternary and horizontal operations.
//!
//! Float math runs in f64 and narrows back to the operand's datatype.
//! Integer variants exist only where the operation is meaningful for ids.

use vexel_foundation::{DataType, DispatchKey, Op, Shape, Value, Vector, VectorSize};

use super::{broadcast, numeric, resolved, Fault, Outcome, Wide, WideInt};
use crate::error::RecoverableError;
use crate::fetch::Fetched;

fn length(v: &Vector<f64>) -> f64 {
    v.fold(0.0, |acc, x| acc + x * x).sqrt()
}

fn float_unary(op: Op, v: &Vector<f64>) -> Vector<f64> {
    match op {
        Op::Length => Vector::scalar(length(v)),
        Op::Normalize => {
            let len = length(v);
            v.map(|x| x / len)
        }
        _ => v.map(|x| match op {
            Op::Abs => x.abs(),
            Op::Sqrt => x.sqrt(),
            Op::Rsqrt => 1.0 / x.sqrt(),
            Op::Sin => x.sin(),
            Op::Cos => x.cos(),
            Op::Tan => x.tan(),
            Op::Exp => x.exp(),
            Op::Log => x.ln(),
            Op::Floor => x.floor(),
            Op::Ceil => x.ceil(),
            Op::Frac => x - x.floor(),
            Op::Sign if x == 0.0 || x.is_nan() => x,
            Op::Sign => x.signum(),
            Op::Saturate => x.clamp(0.0, 1.0),
            _ => f64::NAN,
        }),
    }
}

/// Apply a one-operand builtin (`Abs` through `Saturate`).
///
/// `Abs` drops a pending negation instead of applying it.
pub(crate) fn unary(op: Op, operand: &Fetched) -> Outcome {
    let shape = operand.value.shape();
    let size = if op == Op::Length {
        VectorSize::One
    } else {
        shape.size
    };
    let unsupported = || Fault::unsupported(op, shape, numeric(size));
    let value = if op == Op::Abs {
        operand.value
    } else {
        operand.resolve()
    };

    match operand.key() {
        numeric_keys!() | numeric64_keys!() => {
            let wide = Wide::of(&value).ok_or_else(unsupported)?;
            Ok(Wide::value(float_unary(op, &wide.v), wide.wide))
        }
        id_keys!() | id64_keys!() => {
            let int = WideInt::of(&value).ok_or_else(unsupported)?;
            let out = match op {
                Op::Abs => int.v.map(i64::wrapping_abs),
                Op::Sign => int.v.map(i64::signum),
                _ => return Err(unsupported()),
            };
            Ok(WideInt::value(out, int.wide))
        }
        bool_keys!() | wide_bool_keys!() => Err(unsupported()),
    }
}

/// Sum, maximum or minimum across the components of one operand.
pub(crate) fn horizontal(op: Op, operand: &Fetched) -> Outcome {
    let key = operand.key();
    let fallback = Shape::scalar(key.datatype());
    let unsupported = || Fault::unsupported(op, key.shape(), fallback);
    match key {
        numeric_keys!() | numeric64_keys!() => {
            let wide = Wide::fetch(operand).ok_or_else(unsupported)?;
            let first = wide.v.get(0);
            let out = match op {
                Op::Csum => wide.v.fold(0.0, |acc, x| acc + x),
                Op::Cmax => wide.v.fold(first, f64::max),
                _ => wide.v.fold(first, f64::min),
            };
            Ok(Wide::value(Vector::scalar(out), wide.wide))
        }
        id_keys!() | id64_keys!() => {
            let int = WideInt::fetch(operand).ok_or_else(unsupported)?;
            let first = int.v.get(0);
            let out = match op {
                Op::Csum => int.v.fold(0i64, i64::wrapping_add),
                Op::Cmax => int.v.fold(first, i64::max),
                _ => int.v.fold(first, i64::min),
            };
            // Id sums wrap at 32 bits like any other Id arithmetic.
            Ok(WideInt::value(Vector::scalar(out), int.wide))
        }
        bool_keys!() | wide_bool_keys!() => Err(unsupported()),
    }
}

/// Two float operands at a common width and broadcast size.
fn float_pair(
    op: Op,
    a: &Fetched,
    b: &Fetched,
) -> Result<(Vector<f64>, Vector<f64>, bool, VectorSize), RecoverableError> {
    let (ka, kb) = (a.key(), b.key());
    let mismatch = RecoverableError::TypeMismatch {
        op,
        left: ka.shape(),
        right: kb.shape(),
    };
    let wide = match (ka, kb) {
        (numeric_keys!(), numeric_keys!()) => false,
        (numeric64_keys!(), numeric64_keys!()) => true,
        (numeric_keys!() | numeric64_keys!(), numeric_keys!() | numeric64_keys!()) => {
            return Err(mismatch)
        }
        (numeric_keys!() | numeric64_keys!(), _) => {
            return Err(RecoverableError::Unsupported {
                op,
                shape: kb.shape(),
            })
        }
        (id_keys!() | id64_keys!() | bool_keys!() | wide_bool_keys!(), _) => {
            return Err(RecoverableError::Unsupported {
                op,
                shape: ka.shape(),
            })
        }
    };
    let size = broadcast(op, ka.shape(), kb.shape())?;
    let (Some(x), Some(y)) = (Wide::fetch(a), Wide::fetch(b)) else {
        return Err(mismatch);
    };
    Ok((x.v, y.v, wide, size))
}

fn float_datatype(key: DispatchKey) -> DataType {
    match key {
        numeric64_keys!() => DataType::Numeric64,
        numeric_keys!() | id_keys!() | id64_keys!() | bool_keys!() | wide_bool_keys!() => {
            DataType::Numeric
        }
    }
}

/// Apply a two-operand builtin (`Dot` through `Max`).
pub(crate) fn binary(op: Op, a: &Fetched, b: &Fetched) -> Outcome {
    if matches!(op, Op::Min | Op::Max) {
        return extremum(op, a, b);
    }
    let (ka, kb) = (a.key(), b.key());
    let size = match op {
        Op::Dot | Op::Distance => VectorSize::One,
        Op::Cross => VectorSize::Three,
        _ => broadcast(op, ka.shape(), kb.shape()).unwrap_or(ka.size()),
    };
    let fallback = Shape::new(float_datatype(ka), size);
    let fail = |error| Fault::new(error, fallback);

    let (x, y, wide, common) = float_pair(op, a, b).map_err(fail)?;
    let out = match op {
        Op::Pow => Vector::from_fn(common, |i| x.get(i).powf(y.get(i))),
        Op::Atan2 => Vector::from_fn(common, |i| x.get(i).atan2(y.get(i))),
        Op::Dot => Vector::scalar((0..common.get()).map(|i| x.get(i) * y.get(i)).sum()),
        Op::Distance => {
            Vector::scalar(length(&Vector::from_fn(common, |i| x.get(i) - y.get(i))))
        }
        Op::Cross => {
            if ka.size() != VectorSize::Three || kb.size() != VectorSize::Three {
                return Err(fail(RecoverableError::SizeMismatch {
                    op,
                    left: ka.shape(),
                    right: kb.shape(),
                }));
            }
            let (x, y) = (x.as_slice(), y.as_slice());
            Vector::from_fn(VectorSize::Three, |i| {
                let (j, k) = ((i + 1) % 3, (i + 2) % 3);
                x[j] * y[k] - x[k] * y[j]
            })
        }
        _ => return Err(Fault::unsupported(op, ka.shape(), fallback)),
    };
    Ok(Wide::value(out, wide))
}

fn extremum(op: Op, a: &Fetched, b: &Fetched) -> Outcome {
    let (ka, kb) = (a.key(), b.key());
    let size = broadcast(op, ka.shape(), kb.shape()).unwrap_or(ka.size());
    let fallback = Shape::new(ka.datatype(), size);
    let fail = |error| Fault::new(error, fallback);
    if ka.datatype() != kb.datatype() {
        return Err(fail(RecoverableError::TypeMismatch {
            op,
            left: ka.shape(),
            right: kb.shape(),
        }));
    }
    let size = broadcast(op, ka.shape(), kb.shape()).map_err(fail)?;
    let unsupported = || Fault::unsupported(op, ka.shape(), fallback);
    let pick_max = op == Op::Max;
    match ka {
        numeric_keys!() | numeric64_keys!() => {
            let (Some(x), Some(y)) = (Wide::fetch(a), Wide::fetch(b)) else {
                return Err(unsupported());
            };
            let out = Vector::from_fn(size, |i| {
                if pick_max {
                    x.v.get(i).max(y.v.get(i))
                } else {
                    x.v.get(i).min(y.v.get(i))
                }
            });
            Ok(Wide::value(out, x.wide))
        }
        id_keys!() | id64_keys!() => {
            let (Some(x), Some(y)) = (WideInt::fetch(a), WideInt::fetch(b)) else {
                return Err(unsupported());
            };
            let out = Vector::from_fn(size, |i| {
                if pick_max {
                    x.v.get(i).max(y.v.get(i))
                } else {
                    x.v.get(i).min(y.v.get(i))
                }
            });
            Ok(WideInt::value(out, x.wide))
        }
        bool_keys!() | wide_bool_keys!() => Err(unsupported()),
    }
}

/// Component `index` of `value` as a truth flag.
fn truth(value: &Value, index: usize) -> bool {
    match value {
        Value::Numeric(v) => v.get(index) != 0.0,
        Value::Id(v) => v.get(index) != 0,
        Value::Bool32(b) => *b != 0,
        Value::Numeric64(v) => v.get(index) != 0.0,
        Value::Id64(v) => v.get(index) != 0,
    }
}

/// Apply a three-operand builtin (`Lerp`, `Clamp`, `Select`, `Fma`).
pub(crate) fn ternary(op: Op, a: &Fetched, b: &Fetched, c: &Fetched) -> Outcome {
    if op == Op::Select {
        return select(a, b, c);
    }
    let (ka, kb, kc) = (a.key(), b.key(), c.key());
    let size = common_size(op, ka.shape(), kb.shape(), kc.shape()).unwrap_or(ka.size());
    let fallback = match op {
        Op::Clamp => Shape::new(ka.datatype(), size),
        _ => Shape::new(float_datatype(ka), size),
    };
    let fail = |error| Fault::new(error, fallback);

    let integers = matches!(
        (ka, kb, kc),
        (id_keys!(), id_keys!(), id_keys!()) | (id64_keys!(), id64_keys!(), id64_keys!())
    );
    if op == Op::Clamp && integers {
        let size = common_size(op, ka.shape(), kb.shape(), kc.shape()).map_err(fail)?;
        let (Some(x), Some(lo), Some(hi)) =
            (WideInt::fetch(a), WideInt::fetch(b), WideInt::fetch(c))
        else {
            return Err(Fault::unsupported(op, ka.shape(), fallback));
        };
        let out = Vector::from_fn(size, |i| x.v.get(i).max(lo.v.get(i)).min(hi.v.get(i)));
        return Ok(WideInt::value(out, x.wide));
    }

    let (x, y, wide, _) = float_pair(op, a, b).map_err(fail)?;
    let (_, z, _, _) = float_pair(op, a, c).map_err(fail)?;
    let size = common_size(op, ka.shape(), kb.shape(), kc.shape()).map_err(fail)?;
    let out = Vector::from_fn(size, |i| {
        let (x, y, z) = (x.get(i), y.get(i), z.get(i));
        match op {
            Op::Lerp => x + (y - x) * z,
            Op::Clamp => x.max(y).min(z),
            _ => x.mul_add(y, z),
        }
    });
    Ok(Wide::value(out, wide))
}

fn common_size(op: Op, a: Shape, b: Shape, c: Shape) -> Result<VectorSize, RecoverableError> {
    let ab = broadcast(op, a, b)?;
    let bc = broadcast(op, b, c)?;
    broadcast(op, a, c)?;
    Ok(if ab == VectorSize::One { bc } else { ab })
}

/// Per component: `a` where `condition` holds, else `b`.
fn select(condition: &Fetched, a: &Fetched, b: &Fetched) -> Outcome {
    let op = Op::Select;
    let (ka, kb) = (a.key(), b.key());
    let size = broadcast(op, ka.shape(), kb.shape()).unwrap_or(ka.size());
    let fallback = Shape::new(ka.datatype(), size);
    let fail = |error| Fault::new(error, fallback);
    if ka.datatype() != kb.datatype() {
        return Err(fail(RecoverableError::TypeMismatch {
            op,
            left: ka.shape(),
            right: kb.shape(),
        }));
    }
    let size = common_size(op, condition.key().shape(), ka.shape(), kb.shape()).map_err(fail)?;
    let unsupported = || Fault::unsupported(op, ka.shape(), fallback);
    let mask = condition.resolve();
    match ka {
        numeric_keys!() | numeric64_keys!() => {
            let (Some(x), Some(y)) = (Wide::fetch(a), Wide::fetch(b)) else {
                return Err(unsupported());
            };
            let out = Vector::from_fn(size, |i| {
                if truth(&mask, i) {
                    x.v.get(i)
                } else {
                    y.v.get(i)
                }
            });
            Ok(Wide::value(out, x.wide))
        }
        id_keys!() | id64_keys!() => {
            let (Some(x), Some(y)) = (WideInt::fetch(a), WideInt::fetch(b)) else {
                return Err(unsupported());
            };
            let out = Vector::from_fn(size, |i| {
                if truth(&mask, i) {
                    x.v.get(i)
                } else {
                    y.v.get(i)
                }
            });
            Ok(WideInt::value(out, x.wide))
        }
        bool_keys!() => {
            let (Some(x), Some(y)) = (resolved::<u32>(a), resolved::<u32>(b)) else {
                return Err(unsupported());
            };
            let picked = if truth(&mask, 0) { x } else { y };
            Ok(Value::bool32(picked.get(0)))
        }
        wide_bool_keys!() => Err(unsupported()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::Source;

    fn nums(values: &[f32]) -> Value {
        Value::numeric_vec(values).unwrap()
    }

    fn fetched(value: Value) -> Fetched {
        Fetched::new(value, Source::Constant)
    }

    fn floats(values: &[f32]) -> Fetched {
        fetched(nums(values))
    }

    #[test]
    fn test_bool32_into_float_only_op_is_nan() {
        let fault = unary(Op::Sqrt, &fetched(Value::bool32(1))).unwrap_err();
        assert!(matches!(fault.error, RecoverableError::Unsupported { op: Op::Sqrt, .. }));
        assert!(Value::sentinel(fault.fallback).as_f32().unwrap().is_nan());
    }

    #[test]
    fn test_abs_drops_negation_sign_applies_it() {
        let negated = fetched(Value::numeric(3.0)).negate();
        assert_eq!(unary(Op::Abs, &negated).unwrap(), Value::numeric(3.0));
        assert_eq!(unary(Op::Sign, &negated).unwrap(), Value::numeric(-1.0));
        let id = fetched(Value::id(-4));
        assert_eq!(unary(Op::Abs, &id).unwrap(), Value::id(4));
        assert!(unary(Op::Sqrt, &id).is_err());
    }

    #[test]
    fn test_length_and_normalize() {
        let v = floats(&[3.0, 4.0]);
        assert_eq!(unary(Op::Length, &v).unwrap(), Value::numeric(5.0));
        assert_eq!(unary(Op::Normalize, &v).unwrap(), nums(&[0.6, 0.8]));
        let wide = fetched(Value::numeric64(-2.5));
        assert_eq!(unary(Op::Floor, &wide).unwrap(), Value::numeric64(-3.0));
    }

    #[test]
    fn test_binary_builtins() {
        let a = floats(&[1.0, 0.0, 0.0]);
        let b = floats(&[0.0, 1.0, 0.0]);
        assert_eq!(binary(Op::Cross, &a, &b).unwrap(), nums(&[0.0, 0.0, 1.0]));
        assert_eq!(binary(Op::Dot, &a, &b).unwrap(), Value::numeric(0.0));
        assert_eq!(
            binary(Op::Distance, &floats(&[0.0, 0.0]), &floats(&[3.0, 4.0])).unwrap(),
            Value::numeric(5.0)
        );
        let pow = binary(Op::Pow, &floats(&[2.0]), &floats(&[10.0])).unwrap();
        assert_eq!(pow, Value::numeric(1024.0));
        let ids = fetched(Value::id_vec(&[1, 9]).unwrap());
        let max = binary(Op::Max, &fetched(Value::id(3)), &ids).unwrap();
        assert_eq!(max, Value::id_vec(&[3, 9]).unwrap());
        let min = binary(Op::Min, &floats(&[3.0]), &floats(&[-1.0])).unwrap();
        assert_eq!(min, Value::numeric(-1.0));
    }

    #[test]
    fn test_binary_applies_each_negation() {
        let max = binary(Op::Max, &floats(&[3.0]), &floats(&[5.0]).negate()).unwrap();
        assert_eq!(max, Value::numeric(3.0));
        let min = binary(Op::Min, &fetched(Value::id(2)).negate(), &fetched(Value::id(1)));
        assert_eq!(min.unwrap(), Value::id(-2));
        let dot = binary(Op::Dot, &floats(&[1.0, 2.0]).negate(), &floats(&[3.0, 4.0])).unwrap();
        assert_eq!(dot, Value::numeric(-11.0));
    }

    #[test]
    fn test_binary_type_errors() {
        let fault = binary(Op::Pow, &floats(&[2.0]), &fetched(Value::id(2))).unwrap_err();
        assert!(matches!(fault.error, RecoverableError::Unsupported { .. }));
        let wide = fetched(Value::numeric64(1.0));
        let fault = binary(Op::Atan2, &floats(&[1.0]), &wide).unwrap_err();
        assert!(matches!(fault.error, RecoverableError::TypeMismatch { .. }));
        let fault = binary(Op::Max, &fetched(Value::bool32(1)), &fetched(Value::bool32(2)));
        assert_eq!(fault.unwrap_err().fallback, Shape::scalar(DataType::Bool32));
    }

    #[test]
    fn test_cross_needs_three_components() {
        let fault = binary(Op::Cross, &floats(&[1.0, 2.0]), &floats(&[3.0, 4.0])).unwrap_err();
        assert!(matches!(fault.error, RecoverableError::SizeMismatch { .. }));
        assert_eq!(fault.fallback, numeric(VectorSize::Three));
    }

    #[test]
    fn test_ternary_builtins() {
        assert_eq!(
            ternary(Op::Lerp, &floats(&[0.0]), &floats(&[10.0]), &floats(&[0.25])).unwrap(),
            Value::numeric(2.5)
        );
        let (x, lo, hi) = (Value::id(12), Value::id(0), Value::id(10));
        assert_eq!(
            ternary(Op::Clamp, &fetched(x), &fetched(lo), &fetched(hi)).unwrap(),
            Value::id(10)
        );
        assert_eq!(
            ternary(Op::Fma, &floats(&[2.0]), &floats(&[3.0]), &floats(&[1.0])).unwrap(),
            Value::numeric(7.0)
        );
        let (mask, yes, no) = (floats(&[1.0, 0.0]), floats(&[5.0, 5.0]), floats(&[7.0, 7.0]));
        assert_eq!(ternary(Op::Select, &mask, &yes, &no).unwrap(), nums(&[5.0, 7.0]));
    }

    #[test]
    fn test_ternary_negation_and_masks() {
        let clamped = ternary(
            Op::Clamp,
            &fetched(Value::id(12)).negate(),
            &fetched(Value::id(0)),
            &fetched(Value::id(10)),
        );
        assert_eq!(clamped.unwrap(), Value::id(0));
        let picked = ternary(
            Op::Select,
            &fetched(Value::numeric(0.0)),
            &fetched(Value::bool32(1)),
            &fetched(Value::bool32(0)).negate(),
        );
        assert_eq!(picked.unwrap(), Value::bool32(u32::MAX));
    }

    #[test]
    fn test_horizontal() {
        let v = floats(&[1.0, 5.0, -2.0]);
        assert_eq!(horizontal(Op::Csum, &v).unwrap(), Value::numeric(4.0));
        assert_eq!(horizontal(Op::Cmax, &v).unwrap(), Value::numeric(5.0));
        assert_eq!(horizontal(Op::Cmax, &v.negate()).unwrap(), Value::numeric(2.0));
        let ids = fetched(Value::id_vec(&[4, -7]).unwrap());
        assert_eq!(horizontal(Op::Cmin, &ids).unwrap(), Value::id(-7));
        let fault = horizontal(Op::Csum, &fetched(Value::bool32(1))).unwrap_err();
        assert_eq!(fault.fallback, Shape::scalar(DataType::Bool32));
    }
}
