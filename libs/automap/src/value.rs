use std::any::Any;
use std::fmt;

use crate::shape::Kind;

/// Leaf value of one of the scalar kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Bool(bool),
    Str(String),
}

impl Scalar {
    pub fn kind(&self) -> Kind {
        match self {
            Scalar::I8(_) => Kind::I8,
            Scalar::I16(_) => Kind::I16,
            Scalar::I32(_) => Kind::I32,
            Scalar::I64(_) => Kind::I64,
            Scalar::F32(_) => Kind::F32,
            Scalar::F64(_) => Kind::F64,
            Scalar::Bool(_) => Kind::Bool,
            Scalar::Str(_) => Kind::Str,
        }
    }
}

/// Value read from (or written to) a field slot.
///
/// - `Value`: a scalar field, copied out.
/// - `Pointer`: an `Option<scalar>` field, read as a whole (`None` is nil).
/// - `Struct`: a reference to the struct (or pointer-to-struct) slot, not a copy.
pub enum FieldValue<'a> {
    Value(Scalar),
    Pointer(Option<Scalar>),
    Struct(&'a dyn Any),
}

impl FieldValue<'_> {
    /// Nil pointers are never written by the synthesizer.
    pub fn is_nil(&self) -> bool {
        matches!(self, FieldValue::Pointer(None))
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            FieldValue::Value(v) | FieldValue::Pointer(Some(v)) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Debug for FieldValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Value(v) => f.debug_tuple("Value").field(v).finish(),
            FieldValue::Pointer(v) => f.debug_tuple("Pointer").field(v).finish(),
            FieldValue::Struct(_) => f.write_str("Struct(..)"),
        }
    }
}

impl PartialEq for FieldValue<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldValue::Value(a), FieldValue::Value(b)) => a == b,
            (FieldValue::Pointer(a), FieldValue::Pointer(b)) => a == b,
            (FieldValue::Struct(a), FieldValue::Struct(b)) => std::ptr::addr_eq(*a, *b),
            _ => false,
        }
    }
}
