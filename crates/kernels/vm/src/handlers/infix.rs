//! Infix operators of a sequence: arithmetic, logic and comparison.
//!
//! Both sides must share a datatype; sizes broadcast when one side is a
//! scalar. The left operand's key picks the lane type and each operand's
//! negation is applied as its components are read. Comparisons and logic
//! on floats produce Numeric 0/1 per component.

use std::ops::{BitAnd, BitOr, BitXor};

use vexel_foundation::{DataType, DispatchKey, Lane, Op, Shape, Value, Vector, VectorSize};

use super::{broadcast, flag, numeric, resolved, Components, Fault, Outcome, Scalar};
use crate::error::RecoverableError;
use crate::fetch::Fetched;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Arithmetic,
    Logic,
    Order,
    Equality,
}

fn kind(op: Op) -> Option<Kind> {
    Some(match op {
        Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Mod => Kind::Arithmetic,
        Op::And | Op::Or | Op::Xor => Kind::Logic,
        Op::Gt | Op::Ge | Op::Lt | Op::Le => Kind::Order,
        Op::Eq | Op::Ne => Kind::Equality,
        _ => return None,
    })
}

/// Shape whose sentinel stands in for a failed `op` on `left`.
fn fallback(kind: Kind, left: Shape) -> Shape {
    match (kind, left.datatype) {
        (Kind::Order | Kind::Equality, _) => numeric(left.size),
        (Kind::Logic, DataType::Numeric | DataType::Numeric64) => numeric(left.size),
        _ => left,
    }
}

/// Apply an infix operator.
pub(crate) fn apply(op: Op, left: &Fetched, right: &Fetched) -> Outcome {
    let (lhs, rhs) = (left.key(), right.key());
    let Some(kind) = kind(op) else {
        return Err(Fault::unsupported(op, lhs.shape(), lhs.shape()));
    };
    let fallback = fallback(kind, lhs.shape());
    let fail = |error| Fault::new(error, fallback);

    if lhs.datatype() != rhs.datatype() {
        return Err(fail(RecoverableError::TypeMismatch {
            op,
            left: lhs.shape(),
            right: rhs.shape(),
        }));
    }
    let size = broadcast(op, lhs.shape(), rhs.shape()).map_err(fail)?;

    let result = match lhs {
        numeric_keys!() => {
            float::<f32>(op, kind, left, right, size).map(|t| t.value(Value::Numeric))
        }
        numeric64_keys!() => {
            float::<f64>(op, kind, left, right, size).map(|t| t.value(Value::Numeric64))
        }
        id_keys!() => integer::<i32>(op, kind, left, right, size).map(|t| t.value(Value::Id)),
        id64_keys!() => integer::<i64>(op, kind, left, right, size).map(|t| t.value(Value::Id64)),
        bool_keys!() => mask(op, kind, left, right),
        wide_bool_keys!() => Err(RecoverableError::Unsupported {
            op,
            shape: lhs.shape(),
        }),
    };
    result.map_err(fail)
}

/// Both operands as `T`, negation applied.
fn pair<T: Components>(
    op: Op,
    left: &Fetched,
    right: &Fetched,
) -> Result<(Vector<T>, Vector<T>), RecoverableError> {
    resolved(left)
        .zip(resolved(right))
        .ok_or(RecoverableError::TypeMismatch {
            op,
            left: left.value.shape(),
            right: right.value.shape(),
        })
}

/// Result of a typed handler: same lane type, or comparison flags.
enum Typed<T> {
    Same(Vector<T>),
    Flags(Vector<f32>),
}

impl<T: Lane> Typed<T> {
    fn value(self, same: fn(Vector<T>) -> Value) -> Value {
        match self {
            Typed::Same(v) => same(v),
            Typed::Flags(v) => Value::Numeric(v),
        }
    }
}

fn arithmetic<T: Scalar>(
    op: Op,
    a: &Vector<T>,
    b: &Vector<T>,
    size: VectorSize,
) -> Result<Vector<T>, RecoverableError> {
    Vector::try_from_fn(size, |i| {
        let (x, y) = (a.get(i), b.get(i));
        let out = match op {
            Op::Add => Some(x.add(y)),
            Op::Sub => Some(x.sub(y)),
            Op::Mul => Some(x.mul(y)),
            Op::Div => x.div(y),
            _ => x.rem(y),
        };
        out.ok_or(RecoverableError::DivisionByZero { op })
    })
}

fn compare<T: Scalar>(op: Op, a: &Vector<T>, b: &Vector<T>, size: VectorSize) -> Vector<f32> {
    Vector::from_fn(size, |i| {
        let (x, y) = (a.get(i), b.get(i));
        flag(match op {
            Op::Gt => x > y,
            Op::Ge => x >= y,
            Op::Lt => x < y,
            Op::Le => x <= y,
            Op::Eq => x == y,
            _ => x != y,
        })
    })
}

fn float<T: Scalar + Components>(
    op: Op,
    kind: Kind,
    left: &Fetched,
    right: &Fetched,
    size: VectorSize,
) -> Result<Typed<T>, RecoverableError> {
    let (a, b) = &pair::<T>(op, left, right)?;
    Ok(match kind {
        Kind::Arithmetic => Typed::Same(arithmetic(op, a, b, size)?),
        Kind::Order | Kind::Equality => Typed::Flags(compare(op, a, b, size)),
        Kind::Logic => Typed::Flags(Vector::from_fn(size, |i| {
            let (x, y) = (a.get(i).is_nonzero(), b.get(i).is_nonzero());
            flag(match op {
                Op::And => x && y,
                Op::Or => x || y,
                _ => x != y,
            })
        })),
    })
}

fn integer<T>(
    op: Op,
    kind: Kind,
    left: &Fetched,
    right: &Fetched,
    size: VectorSize,
) -> Result<Typed<T>, RecoverableError>
where
    T: Scalar + Components + BitAnd<Output = T> + BitOr<Output = T> + BitXor<Output = T>,
{
    let (a, b) = &pair::<T>(op, left, right)?;
    Ok(match kind {
        Kind::Arithmetic => Typed::Same(arithmetic(op, a, b, size)?),
        Kind::Order | Kind::Equality => Typed::Flags(compare(op, a, b, size)),
        Kind::Logic => Typed::Same(Vector::from_fn(size, |i| {
            let (x, y) = (a.get(i), b.get(i));
            match op {
                Op::And => x & y,
                Op::Or => x | y,
                _ => x ^ y,
            }
        })),
    })
}

fn mask(op: Op, kind: Kind, left: &Fetched, right: &Fetched) -> Result<Value, RecoverableError> {
    let shape = Shape::scalar(DataType::Bool32);
    let (a, b) = pair::<u32>(op, left, right)?;
    let (a, b) = (a.get(0), b.get(0));
    match (kind, op) {
        (Kind::Logic, Op::And) => Ok(Value::bool32(a & b)),
        (Kind::Logic, Op::Or) => Ok(Value::bool32(a | b)),
        (Kind::Logic, _) => Ok(Value::bool32(a ^ b)),
        (Kind::Equality, Op::Eq) => Ok(Value::numeric(flag(a == b))),
        (Kind::Equality, _) => Ok(Value::numeric(flag(a != b))),
        (Kind::Arithmetic | Kind::Order, _) => Err(RecoverableError::Unsupported { op, shape }),
    }
}
