//! Operation handlers.
//!
//! Handlers are pure functions over fetched operands. Each one switches on
//! the [`DispatchKey`](vexel_foundation::DispatchKey) of its operands, with
//! explicit arms for the keys it cannot serve. A handler that cannot
//! serve its operands returns a [`Fault`] naming the recoverable error and
//! the shape whose sentinel replaces the result; the interpreter records the
//! error and carries on with the sentinel.

use vexel_foundation::{broadcast_size, DataType, Lane, Op, Shape, Value, Vector, VectorSize};

use crate::error::RecoverableError;
use crate::fetch::Fetched;

/// Every f32 dispatch key, plain and negated.
macro_rules! numeric_keys {
    () => {
        DispatchKey::F1
            | DispatchKey::F2
            | DispatchKey::F3
            | DispatchKey::F4
            | DispatchKey::NegF1
            | DispatchKey::NegF2
            | DispatchKey::NegF3
            | DispatchKey::NegF4
    };
}

macro_rules! numeric64_keys {
    () => {
        DispatchKey::D1
            | DispatchKey::D2
            | DispatchKey::D3
            | DispatchKey::D4
            | DispatchKey::NegD1
            | DispatchKey::NegD2
            | DispatchKey::NegD3
            | DispatchKey::NegD4
    };
}

macro_rules! id_keys {
    () => {
        DispatchKey::I1
            | DispatchKey::I2
            | DispatchKey::I3
            | DispatchKey::I4
            | DispatchKey::NegI1
            | DispatchKey::NegI2
            | DispatchKey::NegI3
            | DispatchKey::NegI4
    };
}

macro_rules! id64_keys {
    () => {
        DispatchKey::L1
            | DispatchKey::L2
            | DispatchKey::L3
            | DispatchKey::L4
            | DispatchKey::NegL1
            | DispatchKey::NegL2
            | DispatchKey::NegL3
            | DispatchKey::NegL4
    };
}

/// Single-component bitmask keys.
macro_rules! bool_keys {
    () => {
        DispatchKey::B1 | DispatchKey::NegB1
    };
}

/// Multi-component bitmask keys. Encodable, never produced by a value.
macro_rules! wide_bool_keys {
    () => {
        DispatchKey::B2
            | DispatchKey::B3
            | DispatchKey::B4
            | DispatchKey::NegB2
            | DispatchKey::NegB3
            | DispatchKey::NegB4
    };
}

pub(crate) mod bits;
pub(crate) mod convert;
pub(crate) mod external;
pub(crate) mod infix;
pub(crate) mod math;
pub(crate) mod nary;

/// A recoverable failure and the shape of its sentinel.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Fault {
    pub error: RecoverableError,
    pub fallback: Shape,
}

impl Fault {
    pub fn new(error: RecoverableError, fallback: Shape) -> Self {
        Self { error, fallback }
    }

    pub fn unsupported(op: Op, shape: Shape, fallback: Shape) -> Self {
        Self::new(RecoverableError::Unsupported { op, shape }, fallback)
    }
}

pub(crate) type Outcome = Result<Value, Fault>;

/// Numeric shape of `size`, the fallback of float-only operations.
#[inline]
pub(crate) fn numeric(size: VectorSize) -> Shape {
    Shape::new(DataType::Numeric, size)
}

/// Component arithmetic shared by every numeric lane type.
///
/// Integers wrap; integer division and remainder by zero yield `None`.
pub(crate) trait Scalar: Lane + PartialOrd {
    fn add(self, rhs: Self) -> Self;
    fn sub(self, rhs: Self) -> Self;
    fn mul(self, rhs: Self) -> Self;
    fn div(self, rhs: Self) -> Option<Self>;
    fn rem(self, rhs: Self) -> Option<Self>;
}

macro_rules! float_scalar {
    ($t:ty) => {
        impl Scalar for $t {
            #[inline]
            fn add(self, rhs: Self) -> Self {
                self + rhs
            }
            #[inline]
            fn sub(self, rhs: Self) -> Self {
                self - rhs
            }
            #[inline]
            fn mul(self, rhs: Self) -> Self {
                self * rhs
            }
            #[inline]
            fn div(self, rhs: Self) -> Option<Self> {
                Some(self / rhs)
            }
            #[inline]
            fn rem(self, rhs: Self) -> Option<Self> {
                Some(self % rhs)
            }
        }
    };
}

macro_rules! int_scalar {
    ($t:ty) => {
        impl Scalar for $t {
            #[inline]
            fn add(self, rhs: Self) -> Self {
                self.wrapping_add(rhs)
            }
            #[inline]
            fn sub(self, rhs: Self) -> Self {
                self.wrapping_sub(rhs)
            }
            #[inline]
            fn mul(self, rhs: Self) -> Self {
                self.wrapping_mul(rhs)
            }
            #[inline]
            fn div(self, rhs: Self) -> Option<Self> {
                (rhs != 0).then(|| self.wrapping_div(rhs))
            }
            #[inline]
            fn rem(self, rhs: Self) -> Option<Self> {
                (rhs != 0).then(|| self.wrapping_rem(rhs))
            }
        }
    };
}

float_scalar!(f32);
float_scalar!(f64);
int_scalar!(i32);
int_scalar!(i64);

/// Result size of two operand shapes, or a [`RecoverableError::SizeMismatch`].
pub(crate) fn broadcast(
    op: Op,
    left: Shape,
    right: Shape,
) -> Result<VectorSize, RecoverableError> {
    broadcast_size(left.size, right.size).ok_or(RecoverableError::SizeMismatch { op, left, right })
}

/// Lane types a dispatch key can name.
pub(crate) trait Components: Lane {
    fn components(value: &Value) -> Option<Vector<Self>>;
}

macro_rules! components {
    ($t:ty, $variant:ident) => {
        impl Components for $t {
            #[inline]
            fn components(value: &Value) -> Option<Vector<Self>> {
                match value {
                    Value::$variant(v) => Some(*v),
                    _ => None,
                }
            }
        }
    };
}

components!(f32, Numeric);
components!(i32, Id);
components!(f64, Numeric64);
components!(i64, Id64);

impl Components for u32 {
    #[inline]
    fn components(value: &Value) -> Option<Vector<Self>> {
        match value {
            Value::Bool32(bits) => Some(Vector::scalar(*bits)),
            _ => None,
        }
    }
}

/// Components of `operand` as `T`, with its pending negation applied.
///
/// `None` when the operand does not carry `T` lanes.
#[inline]
pub(crate) fn resolved<T: Components>(operand: &Fetched) -> Option<Vector<T>> {
    T::components(&operand.value).map(|v| v.negate_if(operand.negated))
}

/// Widen a scalar to `size` components of the same datatype.
///
/// Values already of `size` pass through; anything else is `None`.
pub(crate) fn splat(value: &Value, size: VectorSize) -> Option<Value> {
    if value.size() == size {
        return Some(*value);
    }
    if value.size() != VectorSize::One {
        return None;
    }
    Some(match value {
        Value::Numeric(v) => Value::Numeric(Vector::splat(v.get(0), size)),
        Value::Id(v) => Value::Id(Vector::splat(v.get(0), size)),
        Value::Numeric64(v) => Value::Numeric64(Vector::splat(v.get(0), size)),
        Value::Id64(v) => Value::Id64(Vector::splat(v.get(0), size)),
        Value::Bool32(_) => return None,
    })
}

/// Float operand widened to f64.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Wide {
    pub v: Vector<f64>,
    /// Came from a Numeric64 value.
    pub wide: bool,
}

impl Wide {
    pub fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Numeric(v) => Some(Self {
                v: v.map(f64::from),
                wide: false,
            }),
            Value::Numeric64(v) => Some(Self { v: *v, wide: true }),
            _ => None,
        }
    }

    /// Resolve a fetched operand and widen it.
    pub fn fetch(operand: &Fetched) -> Option<Self> {
        Self::of(&operand.resolve())
    }

    /// Narrow back to the datatype the operand came from.
    pub fn value(v: Vector<f64>, wide: bool) -> Value {
        if wide {
            Value::Numeric64(v)
        } else {
            Value::Numeric(v.map(|x| x as f32))
        }
    }
}

/// Integer operand widened to i64.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct WideInt {
    pub v: Vector<i64>,
    /// Came from an Id64 value.
    pub wide: bool,
}

impl WideInt {
    pub fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Id(v) => Some(Self {
                v: v.map(i64::from),
                wide: false,
            }),
            Value::Id64(v) => Some(Self { v: *v, wide: true }),
            _ => None,
        }
    }

    /// Resolve a fetched operand and widen it.
    pub fn fetch(operand: &Fetched) -> Option<Self> {
        Self::of(&operand.resolve())
    }

    /// Narrow back, wrapping to 32 bits for Id operands.
    pub fn value(v: Vector<i64>, wide: bool) -> Value {
        if wide {
            Value::Id64(v)
        } else {
            Value::Id(v.map(|x| x as i32))
        }
    }
}

/// 0.0 or 1.0.
#[inline]
pub(crate) fn flag(condition: bool) -> f32 {
    if condition {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_division_by_zero_is_none() {
        assert_eq!(Scalar::div(7i32, 0), None);
        assert_eq!(Scalar::rem(7i64, 0), None);
        assert_eq!(Scalar::div(i32::MIN, -1), Some(i32::MIN));
        assert!(Scalar::div(1.0f32, 0.0).unwrap().is_infinite());
    }

    #[test]
    fn test_splat() {
        let three = splat(&Value::id(4), VectorSize::Three).unwrap();
        assert_eq!(three, Value::id_vec(&[4, 4, 4]).unwrap());
        assert!(splat(&three, VectorSize::Two).is_none());
        assert!(splat(&Value::bool32(1), VectorSize::Two).is_none());
    }

    #[test]
    fn test_resolved_applies_negation_per_lane_type() {
        use crate::fetch::Source;

        let negated = Fetched::new(Value::id_vec(&[2, -3]).unwrap(), Source::Constant).negate();
        let flipped = Vector::from_fn(VectorSize::Two, |i| [-2, 3][i]);
        assert_eq!(resolved::<i32>(&negated), Some(flipped));
        assert_eq!(resolved::<f32>(&negated), None);

        let mask = Fetched::new(Value::bool32(0x0F), Source::Constant).negate();
        assert_eq!(resolved::<u32>(&mask), Some(Vector::scalar(!0x0Fu32)));
    }
}
