//! Host Function Registry.
//!
//! Maps the 16-bit function ids used by `CallExternal` to host callables.
//! Discovery is the host's job: it registers what the compiler assigned ids
//! to, and the VM only looks ids up.
//!
//! # Bindings
//!
//! - **Native** ([`Binding::Native`]) - plain function pointer, applied
//!   component-wise over Numeric vectors
//! - **Managed** ([`Binding::Managed`]) - closure that also sees the
//!   [`CallContext`] of the running script
//! - **Unbound** ([`Binding::Unbound`]) - declared only; calls fail
//!   recoverably
//!
//! # Example
//!
//! ```
//! use vexel_foundation::{Value, VectorSize};
//! use vexel_function_registry::{
//!     ArgumentProfile, CallContext, FunctionId, FunctionRegistry, NativeFn,
//! };
//!
//! let mut registry = FunctionRegistry::new();
//! registry
//!     .register_native(
//!         FunctionId(1),
//!         "hypot",
//!         ArgumentProfile::numeric(2, VectorSize::One),
//!         NativeFn::Binary(f32::hypot),
//!     )
//!     .unwrap();
//! let result = registry
//!     .call(FunctionId(1), &CallContext::default(), &[Value::numeric(3.0), Value::numeric(4.0)])
//!     .unwrap();
//! assert_eq!(result, Value::numeric(5.0));
//! ```

mod binding;
mod error;
pub mod library;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;
use vexel_foundation::Value;

pub use binding::{
    ArgumentProfile, Binding, CallContext, ManagedFn, NativeFn, MAX_ARGUMENTS,
};
pub use error::{RegistryError, Result};

/// Id carried by a `CallExternal` instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FunctionId(pub u16);

/// A registered function.
#[derive(Debug, Clone)]
pub struct FunctionDescriptor {
    pub id: FunctionId,
    pub name: String,
    pub profile: ArgumentProfile,
    pub binding: Binding,
}

impl FunctionDescriptor {
    /// Check call arguments against the profile.
    pub fn check(&self, args: &[Value]) -> Result<()> {
        if args.len() != self.profile.arity() {
            return Err(RegistryError::Arity {
                id: self.id,
                expected: self.profile.arity(),
                found: args.len(),
            });
        }
        for (index, (arg, expected)) in args.iter().zip(&self.profile.parameters).enumerate() {
            if arg.shape() != *expected {
                return Err(RegistryError::ArgumentShape {
                    id: self.id,
                    index,
                    expected: *expected,
                    found: arg.shape(),
                });
            }
        }
        Ok(())
    }

    /// Check and invoke.
    pub fn call(&self, context: &CallContext<'_>, args: &[Value]) -> Result<Value> {
        self.check(args)?;
        let result = match &self.binding {
            Binding::Native(native) => native.invoke(args),
            Binding::Managed(managed) => managed(context, args),
            Binding::Unbound => return Err(RegistryError::Unbound(self.id)),
        };
        match result {
            Some(value) if value.shape() == self.profile.returns => Ok(value),
            _ => Err(RegistryError::NoResult(self.id)),
        }
    }
}

/// Id-keyed table of host functions, in registration order.
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    functions: IndexMap<FunctionId, FunctionDescriptor>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function under a fresh id.
    pub fn register(
        &mut self,
        id: FunctionId,
        name: impl Into<String>,
        profile: ArgumentProfile,
        binding: Binding,
    ) -> Result<()> {
        if self.functions.contains_key(&id) {
            return Err(RegistryError::Duplicate(id));
        }
        if profile.arity() > MAX_ARGUMENTS {
            return Err(RegistryError::TooManyParameters {
                id,
                count: profile.arity(),
                max: MAX_ARGUMENTS,
            });
        }
        if let Binding::Native(native) = &binding {
            if native.arity().is_some_and(|arity| arity != profile.arity()) {
                return Err(RegistryError::BindingMismatch { id });
            }
        }
        let name = name.into();
        debug!(id = id.0, %name, bound = binding.is_bound(), "registered function");
        self.functions.insert(
            id,
            FunctionDescriptor {
                id,
                name,
                profile,
                binding,
            },
        );
        Ok(())
    }

    pub fn register_native(
        &mut self,
        id: FunctionId,
        name: impl Into<String>,
        profile: ArgumentProfile,
        native: NativeFn,
    ) -> Result<()> {
        self.register(id, name, profile, Binding::Native(native))
    }

    pub fn register_managed<F>(
        &mut self,
        id: FunctionId,
        name: impl Into<String>,
        profile: ArgumentProfile,
        managed: F,
    ) -> Result<()>
    where
        F: Fn(&CallContext<'_>, &[Value]) -> Option<Value> + Send + Sync + 'static,
    {
        self.register(id, name, profile, Binding::Managed(std::sync::Arc::new(managed)))
    }

    /// Replace the binding of a declared function.
    pub fn bind(&mut self, id: FunctionId, binding: Binding) -> Result<()> {
        let descriptor = self
            .functions
            .get_mut(&id)
            .ok_or(RegistryError::Unknown(id))?;
        descriptor.binding = binding;
        Ok(())
    }

    pub fn get(&self, id: FunctionId) -> Option<&FunctionDescriptor> {
        self.functions.get(&id)
    }

    /// Look up by name.
    pub fn find(&self, name: &str) -> Option<&FunctionDescriptor> {
        self.functions.values().find(|descriptor| descriptor.name == name)
    }

    pub fn is_known(&self, id: FunctionId) -> bool {
        self.functions.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FunctionDescriptor> {
        self.functions.values()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Call a function by id.
    pub fn call(&self, id: FunctionId, context: &CallContext<'_>, args: &[Value]) -> Result<Value> {
        self.get(id)
            .ok_or(RegistryError::Unknown(id))?
            .call(context, args)
    }
}
