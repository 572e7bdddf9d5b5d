//! Stock host functions.
//!
//! Hosts that have nothing of their own to offer can start from
//! [`standard`]. Ids are stable and listed in [`ids`].

use vexel_foundation::{DataType, Shape, Value, VectorSize};

use crate::{ArgumentProfile, FunctionId, FunctionRegistry, NativeFn, Result};

pub mod ids {
    use crate::FunctionId;

    pub const HYPOT: FunctionId = FunctionId(1);
    pub const SMOOTHSTEP: FunctionId = FunctionId(2);
    pub const STEP: FunctionId = FunctionId(3);
    pub const WRAP: FunctionId = FunctionId(4);
    pub const REVERSE4: FunctionId = FunctionId(5);
    pub const ID_SUM: FunctionId = FunctionId(6);
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

fn step(edge: f32, x: f32) -> f32 {
    if x < edge {
        0.0
    } else {
        1.0
    }
}

fn wrap(x: f32) -> f32 {
    x - x.floor()
}

fn reverse4(v: [f32; 4]) -> [f32; 4] {
    [v[3], v[2], v[1], v[0]]
}

fn id_sum(args: &[Value]) -> Option<Value> {
    let [Value::Id(a), Value::Id(b)] = args else {
        return None;
    };
    a.zip_with(b, i32::wrapping_add).map(Value::Id)
}

/// Registry holding every stock function.
pub fn standard() -> Result<FunctionRegistry> {
    let mut registry = FunctionRegistry::new();
    let scalar = VectorSize::One;
    registry.register_native(
        ids::HYPOT,
        "hypot",
        ArgumentProfile::numeric(2, scalar),
        NativeFn::Binary(f32::hypot),
    )?;
    registry.register_native(
        ids::SMOOTHSTEP,
        "smoothstep",
        ArgumentProfile::numeric(3, scalar),
        NativeFn::Ternary(smoothstep),
    )?;
    registry.register_native(
        ids::STEP,
        "step",
        ArgumentProfile::numeric(2, scalar),
        NativeFn::Binary(step),
    )?;
    registry.register_native(
        ids::WRAP,
        "wrap",
        ArgumentProfile::numeric(1, scalar),
        NativeFn::Unary(wrap),
    )?;
    registry.register_native(
        ids::REVERSE4,
        "reverse4",
        ArgumentProfile::numeric(1, VectorSize::Four),
        NativeFn::Vector4(reverse4),
    )?;
    let id = Shape::scalar(DataType::Id);
    registry.register_native(
        ids::ID_SUM,
        "id_sum",
        ArgumentProfile::new(vec![id, id], id),
        NativeFn::Values(id_sum),
    )?;
    Ok(registry)
}

/// The id a stock function is registered under.
pub fn id_of(name: &str) -> Option<FunctionId> {
    standard().ok()?.find(name).map(|descriptor| descriptor.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CallContext;

    #[test]
    fn test_standard_functions() {
        let registry = standard().unwrap();
        let ctx = CallContext::default();
        let call = |id, args: &[Value]| registry.call(id, &ctx, args).unwrap();

        assert_eq!(
            call(ids::HYPOT, &[Value::numeric(3.0), Value::numeric(4.0)]),
            Value::numeric(5.0)
        );
        assert_eq!(
            call(
                ids::SMOOTHSTEP,
                &[Value::numeric(0.0), Value::numeric(1.0), Value::numeric(0.5)]
            ),
            Value::numeric(0.5)
        );
        assert_eq!(
            call(ids::STEP, &[Value::numeric(1.0), Value::numeric(0.5)]),
            Value::numeric(0.0)
        );
        assert_eq!(call(ids::WRAP, &[Value::numeric(-0.25)]), Value::numeric(0.75));
        assert_eq!(
            call(ids::REVERSE4, &[Value::numeric_vec(&[1.0, 2.0, 3.0, 4.0]).unwrap()]),
            Value::numeric_vec(&[4.0, 3.0, 2.0, 1.0]).unwrap()
        );
        assert_eq!(
            call(ids::ID_SUM, &[Value::id(i32::MAX), Value::id(1)]),
            Value::id(i32::MIN)
        );
    }

    #[test]
    fn test_id_of() {
        assert_eq!(id_of("wrap"), Some(ids::WRAP));
        assert_eq!(id_of("missing"), None);
    }
}
