//! Host function calls.

use vexel_foundation::{Shape, Value, VectorSize};
use vexel_function_registry::{CallContext, FunctionId, FunctionRegistry};

use super::{numeric, Fault, Outcome};
use crate::error::RecoverableError;

/// Shape of the sentinel a failed call yields: the declared return shape,
/// or a Numeric scalar for unknown functions.
pub(crate) fn fallback(registry: Option<&FunctionRegistry>, id: FunctionId) -> Shape {
    registry
        .and_then(|registry| registry.get(id))
        .map_or(numeric(VectorSize::One), |descriptor| descriptor.profile.returns)
}

/// Invoke function `id` with marshalled arguments.
pub(crate) fn call(
    registry: Option<&FunctionRegistry>,
    context: &CallContext<'_>,
    id: FunctionId,
    args: &[Value],
) -> Outcome {
    let fallback = fallback(registry, id);
    let Some(registry) = registry else {
        return Err(Fault::new(RecoverableError::NoRegistry(id), fallback));
    };
    registry
        .call(id, context, args)
        .map_err(|error| Fault::new(error.into(), fallback))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vexel_foundation::DataType;
    use vexel_function_registry::{library, RegistryError};

    #[test]
    fn test_call_and_failures() {
        let registry = library::standard().unwrap();
        let ctx = CallContext::default();
        let hypot = library::ids::HYPOT;
        let args = [Value::numeric(3.0), Value::numeric(4.0)];
        assert_eq!(call(Some(&registry), &ctx, hypot, &args).unwrap(), Value::numeric(5.0));

        let fault = call(Some(&registry), &ctx, library::ids::ID_SUM, &args).unwrap_err();
        assert!(matches!(
            fault.error,
            RecoverableError::External(RegistryError::ArgumentShape { index: 0, .. })
        ));
        assert_eq!(fault.fallback, Shape::scalar(DataType::Id));

        let fault = call(None, &ctx, hypot, &args).unwrap_err();
        assert_eq!(fault.error, RecoverableError::NoRegistry(hypot));

        let unknown = FunctionId(999);
        let fault = call(Some(&registry), &ctx, unknown, &[]).unwrap_err();
        assert_eq!(fault.fallback, Shape::scalar(DataType::Numeric));
    }
}
