//! Datatype conversions.

use vexel_foundation::{DataType, DispatchKey, Lane, Op, Shape, Value, Vector, VectorSize};

use super::{resolved, Fault, Outcome};
use crate::fetch::Fetched;

/// Convert to Id, Numeric or Bool32 (`ToId`, `ToNumeric`, `ToBool32`).
///
/// Floats truncate toward zero when converted to Id, and 64-bit sources
/// narrow to 32 bits. A bitmask converts to a scalar of its raw bits.
/// `ToBool32` packs the truthiness of each component into bit `i`.
pub(crate) fn apply(op: Op, operand: &Fetched) -> Outcome {
    let key = operand.key();
    let converted = match op {
        Op::ToId => to_id(operand).map(Value::Id),
        Op::ToNumeric => to_numeric(operand).map(Value::Numeric),
        Op::ToBool32 => to_bool32(operand).map(Value::bool32),
        _ => None,
    };
    converted.ok_or_else(|| Fault::unsupported(op, key.shape(), result_shape(op, key.size())))
}

fn result_shape(op: Op, size: VectorSize) -> Shape {
    match op {
        Op::ToId => Shape::new(DataType::Id, size),
        Op::ToBool32 => Shape::scalar(DataType::Bool32),
        _ => Shape::new(DataType::Numeric, size),
    }
}

fn to_id(operand: &Fetched) -> Option<Vector<i32>> {
    match operand.key() {
        numeric_keys!() => resolved::<f32>(operand).map(|v| v.map(|x| x as i32)),
        numeric64_keys!() => resolved::<f64>(operand).map(|v| v.map(|x| x as i32)),
        id_keys!() => resolved::<i32>(operand),
        id64_keys!() => resolved::<i64>(operand).map(|v| v.map(|x| x as i32)),
        bool_keys!() => resolved::<u32>(operand).map(|v| v.map(|x| x as i32)),
        wide_bool_keys!() => None,
    }
}

fn to_numeric(operand: &Fetched) -> Option<Vector<f32>> {
    match operand.key() {
        numeric_keys!() => resolved::<f32>(operand),
        numeric64_keys!() => resolved::<f64>(operand).map(|v| v.map(|x| x as f32)),
        id_keys!() => resolved::<i32>(operand).map(|v| v.map(|x| x as f32)),
        id64_keys!() => resolved::<i64>(operand).map(|v| v.map(|x| x as f32)),
        bool_keys!() => resolved::<u32>(operand).map(|v| v.map(|x| x as f32)),
        wide_bool_keys!() => None,
    }
}

fn to_bool32(operand: &Fetched) -> Option<u32> {
    match operand.key() {
        numeric_keys!() => resolved::<f32>(operand).map(|v| truth_bits(&v)),
        numeric64_keys!() => resolved::<f64>(operand).map(|v| truth_bits(&v)),
        id_keys!() => resolved::<i32>(operand).map(|v| truth_bits(&v)),
        id64_keys!() => resolved::<i64>(operand).map(|v| truth_bits(&v)),
        bool_keys!() => resolved::<u32>(operand).map(|v| v.get(0)),
        wide_bool_keys!() => None,
    }
}

fn truth_bits<T: Lane>(v: &Vector<T>) -> u32 {
    pack(v.as_slice().iter().map(|x| x.is_nonzero()))
}

fn pack(flags: impl Iterator<Item = bool>) -> u32 {
    flags
        .enumerate()
        .fold(0, |bits, (i, set)| bits | (u32::from(set) << i))
}
