//! Fetched operands.
//!
//! A term is fetched with its pending negation carried alongside rather
//! than applied, so handlers can pick the negated dispatch key and bit
//! operations can tell a plain variable from a computed value.

use vexel_foundation::{DispatchKey, Value};

/// Where a fetched value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Data element read through a variable reference.
    Variable(usize),
    /// Inline constant or named value.
    Constant,
    /// Popped or peeked from the stack.
    Stack,
    /// Result of an operation.
    Computed,
}

/// A value plus its pending negation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fetched {
    pub value: Value,
    pub negated: bool,
    pub source: Source,
}

impl Fetched {
    pub fn new(value: Value, source: Source) -> Self {
        Self {
            value,
            negated: false,
            source,
        }
    }

    pub fn computed(value: Value) -> Self {
        Self::new(value, Source::Computed)
    }

    /// Dispatch key including the pending negation.
    #[inline]
    pub fn key(&self) -> DispatchKey {
        self.value.key(self.negated)
    }

    /// The value with negation applied.
    #[inline]
    pub fn resolve(&self) -> Value {
        self.value.negate_if(self.negated)
    }

    /// Data element of a plain, non-negated variable reference.
    pub fn direct_variable(&self) -> Option<usize> {
        match self.source {
            Source::Variable(element) if !self.negated => Some(element),
            _ => None,
        }
    }

    /// Flip the pending negation.
    pub fn negate(mut self) -> Self {
        self.negated = !self.negated;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negation_is_deferred() {
        let fetched = Fetched::new(Value::numeric(2.0), Source::Variable(3)).negate();
        assert_eq!(fetched.value, Value::numeric(2.0));
        assert_eq!(fetched.resolve(), Value::numeric(-2.0));
        assert_eq!(fetched.key(), DispatchKey::NegF1);
        assert_eq!(fetched.direct_variable(), None);
        assert_eq!(fetched.negate().direct_variable(), Some(3));
    }

    #[test]
    fn test_double_negation_on_id() {
        let fetched = Fetched::computed(Value::id(5)).negate().negate();
        assert_eq!(fetched.resolve(), Value::id(5));
        assert_eq!(fetched.key(), DispatchKey::I1);
    }
}
