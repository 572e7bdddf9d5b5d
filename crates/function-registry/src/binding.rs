//! Function bindings and argument profiles.

use std::any::Any;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use vexel_foundation::{broadcast_size, DataType, Shape, Value, Vector, VectorSize};

/// Largest argument count an external call can pass.
pub const MAX_ARGUMENTS: usize = 8;

/// Shapes a function accepts and returns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArgumentProfile {
    pub parameters: Vec<Shape>,
    pub returns: Shape,
}

impl ArgumentProfile {
    pub fn new(parameters: impl Into<Vec<Shape>>, returns: Shape) -> Self {
        Self {
            parameters: parameters.into(),
            returns,
        }
    }

    /// `arity` scalar Numeric parameters returning a Numeric of `size`.
    pub fn numeric(arity: usize, size: VectorSize) -> Self {
        let shape = Shape::new(DataType::Numeric, size);
        Self::new(vec![shape; arity], shape)
    }

    #[inline]
    pub fn arity(&self) -> usize {
        self.parameters.len()
    }
}

/// Opaque host handles passed through an execution to managed functions.
#[derive(Clone, Copy, Default)]
pub struct CallContext<'a> {
    /// Host environment the script runs in.
    pub environment: Option<&'a (dyn Any + Send + Sync)>,
    /// Object on whose behalf the script runs.
    pub caller: Option<&'a (dyn Any + Send + Sync)>,
}

impl<'a> CallContext<'a> {
    pub fn new(
        environment: Option<&'a (dyn Any + Send + Sync)>,
        caller: Option<&'a (dyn Any + Send + Sync)>,
    ) -> Self {
        Self {
            environment,
            caller,
        }
    }

    /// Environment downcast to a concrete type.
    pub fn environment<T: Any>(&self) -> Option<&'a T> {
        self.environment.and_then(|env| env.downcast_ref())
    }

    /// Caller downcast to a concrete type.
    pub fn caller<T: Any>(&self) -> Option<&'a T> {
        self.caller.and_then(|caller| caller.downcast_ref())
    }
}

impl std::fmt::Debug for CallContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallContext")
            .field("environment", &self.environment.is_some())
            .field("caller", &self.caller.is_some())
            .finish()
    }
}

/// Native function pointers, applied component-wise to Numeric arguments.
#[derive(Clone, Copy)]
pub enum NativeFn {
    Unary(fn(f32) -> f32),
    Binary(fn(f32, f32) -> f32),
    Ternary(fn(f32, f32, f32) -> f32),
    /// Whole-vector function over four components.
    Vector4(fn([f32; 4]) -> [f32; 4]),
    /// Arbitrary typed values.
    Values(fn(&[Value]) -> Option<Value>),
}

impl NativeFn {
    /// Fixed arity, or `None` for [`NativeFn::Values`].
    pub fn arity(&self) -> Option<usize> {
        match self {
            NativeFn::Unary(_) | NativeFn::Vector4(_) => Some(1),
            NativeFn::Binary(_) => Some(2),
            NativeFn::Ternary(_) => Some(3),
            NativeFn::Values(_) => None,
        }
    }

    /// Call with arguments already checked against the profile.
    pub fn invoke(&self, args: &[Value]) -> Option<Value> {
        match (self, args) {
            (NativeFn::Unary(f), [Value::Numeric(a)]) => Some(Value::Numeric(a.map(f))),
            (NativeFn::Binary(f), [Value::Numeric(a), Value::Numeric(b)]) => {
                a.zip_with(b, f).map(Value::Numeric)
            }
            (NativeFn::Ternary(f), [Value::Numeric(a), Value::Numeric(b), Value::Numeric(c)]) => {
                let size = broadcast_size(broadcast_size(a.size(), b.size())?, c.size())?;
                let mut out = [0.0f32; 4];
                for (index, slot) in out.iter_mut().enumerate().take(size.get()) {
                    *slot = f(a.get(index), b.get(index), c.get(index));
                }
                Vector::from_slice(&out[..size.get()]).ok().map(Value::Numeric)
            }
            (NativeFn::Vector4(f), [Value::Numeric(a)]) if a.size() == VectorSize::Four => {
                let mut input = [0.0f32; 4];
                input.copy_from_slice(a.as_slice());
                Vector::from_slice(&f(input)).ok().map(Value::Numeric)
            }
            (NativeFn::Values(f), args) => f(args),
            _ => None,
        }
    }
}

impl std::fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            NativeFn::Unary(_) => "Unary",
            NativeFn::Binary(_) => "Binary",
            NativeFn::Ternary(_) => "Ternary",
            NativeFn::Vector4(_) => "Vector4",
            NativeFn::Values(_) => "Values",
        };
        f.write_str(kind)
    }
}

/// Host closure with access to the call context.
pub type ManagedFn = Arc<dyn Fn(&CallContext<'_>, &[Value]) -> Option<Value> + Send + Sync>;

/// How a registered function is invoked.
#[derive(Clone)]
pub enum Binding {
    /// Function pointer; the fast path.
    Native(NativeFn),
    /// Closure fallback for functions that need host state.
    Managed(ManagedFn),
    /// Declared but not yet bound. Calls yield the sentinel.
    Unbound,
}

impl Binding {
    pub fn is_bound(&self) -> bool {
        !matches!(self, Binding::Unbound)
    }
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Binding::Native(native) => f.debug_tuple("Native").field(native).finish(),
            Binding::Managed(_) => f.write_str("Managed(..)"),
            Binding::Unbound => f.write_str("Unbound"),
        }
    }
}
