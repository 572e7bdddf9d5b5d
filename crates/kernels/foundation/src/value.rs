use serde::{Deserialize, Serialize};

use crate::datatype::{DataType, Shape, VectorSize, ELEMENT_SIZE};
use crate::dispatch::DispatchKey;
use crate::error::FoundationError;
use crate::lane::Lane;

/// Fixed-capacity vector of 1 to 4 components.
///
/// Components past `size` are kept at their default and never observed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vector<T> {
    lanes: [T; 4],
    size: VectorSize,
}

impl<T: Lane> Vector<T> {
    /// Vector with every component set to `value`.
    pub fn splat(value: T, size: VectorSize) -> Self {
        let mut lanes = [T::default(); 4];
        lanes[..size.get()].fill(value);
        Self { lanes, size }
    }

    /// Single-component vector.
    pub fn scalar(value: T) -> Self {
        Self::splat(value, VectorSize::One)
    }

    /// Build from 1 to 4 components.
    pub fn from_slice(components: &[T]) -> Result<Self, FoundationError> {
        let size = VectorSize::from_count(components.len())?;
        let mut lanes = [T::default(); 4];
        lanes[..components.len()].copy_from_slice(components);
        Ok(Self { lanes, size })
    }

    /// Build `size` components from `f(index)`.
    pub fn from_fn(size: VectorSize, f: impl FnMut(usize) -> T) -> Self {
        let mut f = f;
        let mut lanes = [T::default(); 4];
        for (index, lane) in lanes.iter_mut().enumerate().take(size.get()) {
            *lane = f(index);
        }
        Self { lanes, size }
    }

    /// Like [`Vector::from_fn`], stopping at the first error.
    pub fn try_from_fn<E>(
        size: VectorSize,
        mut f: impl FnMut(usize) -> Result<T, E>,
    ) -> Result<Self, E> {
        let mut lanes = [T::default(); 4];
        for (index, lane) in lanes.iter_mut().enumerate().take(size.get()) {
            *lane = f(index)?;
        }
        Ok(Self { lanes, size })
    }

    #[inline]
    pub fn size(&self) -> VectorSize {
        self.size
    }

    /// Active components.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.lanes[..self.size.get()]
    }

    /// Component `index`, broadcasting scalars.
    #[inline]
    pub fn get(&self, index: usize) -> T {
        match self.size {
            VectorSize::One => self.lanes[0],
            _ => self.lanes[index & 3],
        }
    }

    /// Apply `f` to each active component.
    pub fn map<U: Lane>(&self, f: impl Fn(T) -> U) -> Vector<U> {
        let mut lanes = [U::default(); 4];
        for (out, value) in lanes.iter_mut().zip(self.as_slice()) {
            *out = f(*value);
        }
        Vector {
            lanes,
            size: self.size,
        }
    }

    /// Combine two vectors component-wise.
    ///
    /// Sizes must match, or one side must be a scalar which is broadcast.
    /// Returns `None` otherwise.
    pub fn zip_with<U: Lane>(&self, other: &Self, f: impl Fn(T, T) -> U) -> Option<Vector<U>> {
        let size = broadcast_size(self.size, other.size)?;
        let mut lanes = [U::default(); 4];
        for (index, out) in lanes.iter_mut().enumerate().take(size.get()) {
            *out = f(self.get(index), other.get(index));
        }
        Some(Vector { lanes, size })
    }

    /// Fold the active components.
    pub fn fold<A>(&self, init: A, f: impl Fn(A, T) -> A) -> A {
        self.as_slice().iter().fold(init, |acc, value| f(acc, *value))
    }

    #[inline]
    pub fn negate_if(self, negate: bool) -> Self {
        self.map(|value| value.negate_if(negate))
    }

    /// True when every component is nonzero.
    pub fn all_nonzero(&self) -> bool {
        self.as_slice().iter().all(|value| value.is_nonzero())
    }

    /// Read `size` components from little-endian bytes.
    pub fn read(bytes: &[u8], size: VectorSize) -> Option<Self> {
        let width = T::ELEMENTS * ELEMENT_SIZE;
        let bytes = bytes.get(..width * size.get())?;
        let mut lanes = [T::default(); 4];
        for (lane, chunk) in lanes.iter_mut().zip(bytes.chunks_exact(width)) {
            *lane = T::read_le(chunk);
        }
        Some(Self { lanes, size })
    }

    /// Write the active components as little-endian bytes.
    ///
    /// Returns `false` (writing nothing) if `bytes` is too short.
    pub fn write(&self, bytes: &mut [u8]) -> bool {
        let width = T::ELEMENTS * ELEMENT_SIZE;
        let Some(bytes) = bytes.get_mut(..width * self.size.get()) else {
            return false;
        };
        for (chunk, lane) in bytes.chunks_exact_mut(width).zip(self.as_slice()) {
            lane.write_le(chunk);
        }
        true
    }
}

/// Result size of a component-wise operation, or `None` on mismatch.
#[inline]
pub fn broadcast_size(a: VectorSize, b: VectorSize) -> Option<VectorSize> {
    match (a, b) {
        (a, b) if a == b => Some(a),
        (VectorSize::One, b) => Some(b),
        (a, VectorSize::One) => Some(a),
        _ => None,
    }
}

/// A typed runtime value.
///
/// Handlers return a `Value` explicitly; nothing is accumulated in shared
/// interpreter state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Numeric(Vector<f32>),
    Id(Vector<i32>),
    /// 32-bit bitmask. Always one component.
    Bool32(u32),
    Numeric64(Vector<f64>),
    Id64(Vector<i64>),
}

impl Value {
    #[inline]
    pub fn numeric(value: f32) -> Self {
        Value::Numeric(Vector::scalar(value))
    }

    #[inline]
    pub fn id(value: i32) -> Self {
        Value::Id(Vector::scalar(value))
    }

    #[inline]
    pub fn bool32(value: u32) -> Self {
        Value::Bool32(value)
    }

    #[inline]
    pub fn numeric64(value: f64) -> Self {
        Value::Numeric64(Vector::scalar(value))
    }

    #[inline]
    pub fn id64(value: i64) -> Self {
        Value::Id64(Vector::scalar(value))
    }

    /// Numeric vector from 1 to 4 components.
    pub fn numeric_vec(components: &[f32]) -> Result<Self, FoundationError> {
        Vector::from_slice(components).map(Value::Numeric)
    }

    /// Id vector from 1 to 4 components.
    pub fn id_vec(components: &[i32]) -> Result<Self, FoundationError> {
        Vector::from_slice(components).map(Value::Id)
    }

    /// Unsupported-operation marker for a shape: NaN for floats, 0 for
    /// integers, `0xDEADBEEF` for bitmasks.
    pub fn sentinel(shape: Shape) -> Self {
        match shape.datatype {
            DataType::Numeric => Value::Numeric(Vector::splat(f32::SENTINEL, shape.size)),
            DataType::Id => Value::Id(Vector::splat(i32::SENTINEL, shape.size)),
            DataType::Bool32 => Value::Bool32(u32::SENTINEL),
            DataType::Numeric64 => Value::Numeric64(Vector::splat(f64::SENTINEL, shape.size)),
            DataType::Id64 => Value::Id64(Vector::splat(i64::SENTINEL, shape.size)),
        }
    }

    pub fn datatype(&self) -> DataType {
        match self {
            Value::Numeric(_) => DataType::Numeric,
            Value::Id(_) => DataType::Id,
            Value::Bool32(_) => DataType::Bool32,
            Value::Numeric64(_) => DataType::Numeric64,
            Value::Id64(_) => DataType::Id64,
        }
    }

    pub fn size(&self) -> VectorSize {
        match self {
            Value::Numeric(v) => v.size(),
            Value::Id(v) => v.size(),
            Value::Bool32(_) => VectorSize::One,
            Value::Numeric64(v) => v.size(),
            Value::Id64(v) => v.size(),
        }
    }

    #[inline]
    pub fn shape(&self) -> Shape {
        Shape::new(self.datatype(), self.size())
    }

    /// Dispatch key of this value with the given negation flag.
    #[inline]
    pub fn key(&self, negated: bool) -> DispatchKey {
        DispatchKey::of(self.shape(), negated)
    }

    /// Apply a pending negation.
    pub fn negate_if(self, negate: bool) -> Self {
        match self {
            Value::Numeric(v) => Value::Numeric(v.negate_if(negate)),
            Value::Id(v) => Value::Id(v.negate_if(negate)),
            Value::Bool32(b) => Value::Bool32(b.negate_if(negate)),
            Value::Numeric64(v) => Value::Numeric64(v.negate_if(negate)),
            Value::Id64(v) => Value::Id64(v.negate_if(negate)),
        }
    }

    /// Vector-wide truthiness: true when every component is nonzero.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Numeric(v) => v.all_nonzero(),
            Value::Id(v) => v.all_nonzero(),
            Value::Bool32(b) => *b != 0,
            Value::Numeric64(v) => v.all_nonzero(),
            Value::Id64(v) => v.all_nonzero(),
        }
    }

    /// Read a value of `shape` from little-endian element bytes.
    ///
    /// Returns `None` when the bytes are too short or the shape is not
    /// representable.
    pub fn read(bytes: &[u8], shape: Shape) -> Option<Self> {
        if !shape.is_representable() {
            return None;
        }
        Some(match shape.datatype {
            DataType::Numeric => Value::Numeric(Vector::read(bytes, shape.size)?),
            DataType::Id => Value::Id(Vector::read(bytes, shape.size)?),
            DataType::Bool32 => {
                Value::Bool32(*Vector::<u32>::read(bytes, shape.size)?.as_slice().first()?)
            }
            DataType::Numeric64 => Value::Numeric64(Vector::read(bytes, shape.size)?),
            DataType::Id64 => Value::Id64(Vector::read(bytes, shape.size)?),
        })
    }

    /// Write as little-endian element bytes. Returns `false` if `bytes` is
    /// too short.
    pub fn write(&self, bytes: &mut [u8]) -> bool {
        match self {
            Value::Numeric(v) => v.write(bytes),
            Value::Id(v) => v.write(bytes),
            Value::Bool32(b) => Vector::scalar(*b).write(bytes),
            Value::Numeric64(v) => v.write(bytes),
            Value::Id64(v) => v.write(bytes),
        }
    }

    /// Number of 4-byte elements the value occupies.
    #[inline]
    pub fn elements(&self) -> usize {
        self.shape().elements()
    }

    pub fn as_numeric(&self) -> Option<&Vector<f32>> {
        match self {
            Value::Numeric(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_id(&self) -> Option<&Vector<i32>> {
        match self {
            Value::Id(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool32(&self) -> Option<u32> {
        match self {
            Value::Bool32(b) => Some(*b),
            _ => None,
        }
    }

    /// First component as `f32`, if this is a Numeric value.
    pub fn as_f32(&self) -> Option<f32> {
        self.as_numeric().map(|v| v.get(0))
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::numeric(0.0)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn list<T: std::fmt::Display>(
            f: &mut std::fmt::Formatter<'_>,
            components: &[T],
        ) -> std::fmt::Result {
            if let [single] = components {
                return write!(f, "{single}");
            }
            f.write_str("(")?;
            for (index, value) in components.iter().enumerate() {
                if index > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{value}")?;
            }
            f.write_str(")")
        }
        match self {
            Value::Numeric(v) => list(f, v.as_slice()),
            Value::Id(v) => list(f, v.as_slice()),
            Value::Bool32(b) => write!(f, "{b:#010x}"),
            Value::Numeric64(v) => list(f, v.as_slice()),
            Value::Id64(v) => list(f, v.as_slice()),
        }
    }
}
