//! Field accessor: reads and writes field slots as [`FieldValue`]s.
//!
//! Dispatch is over the closed scalar set, their `Option` forms, and structs.
//! Anything else reaching this layer (opaque values without a route, a
//! value that disagrees with the slot's kind) is a broken shape table, so it
//! panics instead of returning an error.

use std::any::{Any, type_name};

use crate::fields::FieldDescriptor;
use crate::shape::{Kind, TypeDescriptor};
use crate::value::{FieldValue, Scalar};

/// Read the field described by `field` out of `root`.
pub fn get<'a>(field: &FieldDescriptor, root: &'a dyn Any) -> FieldValue<'a> {
    read(field.locate(root), field.ty())
}

/// Write `value` into the field described by `field` inside `root`.
pub fn set(field: &FieldDescriptor, root: &mut dyn Any, value: FieldValue<'_>) {
    write(field.locate_mut(root), field.ty(), value)
}

fn slot<'a, T: Any>(slot: &'a dyn Any, ty: TypeDescriptor) -> &'a T {
    match slot.downcast_ref::<T>() {
        Some(v) => v,
        None => panic!("field slot of `{ty}` is not `{}`", type_name::<T>()),
    }
}

fn slot_mut<'a, T: Any>(slot: &'a mut dyn Any, ty: TypeDescriptor) -> &'a mut T {
    match slot.downcast_mut::<T>() {
        Some(v) => v,
        None => panic!("field slot of `{ty}` is not `{}`", type_name::<T>()),
    }
}

fn unsupported(ty: TypeDescriptor) -> ! {
    panic!(
        "unsupported field kind {:?} (depth {}) for `{ty}`",
        ty.kind(),
        ty.depth()
    )
}

macro_rules! scalar_dispatch {
    ($($kind:ident => $ty:ty),* $(,)?) => {
        /// Read a field slot of shape `ty`.
        pub(crate) fn read(s: &dyn Any, ty: TypeDescriptor) -> FieldValue<'_> {
            match (ty.kind(), ty.depth()) {
                (Kind::Struct, _) => FieldValue::Struct(s),
                $(
                    (Kind::$kind, 0) => FieldValue::Value(Scalar::$kind(slot::<$ty>(s, ty).clone())),
                    (Kind::$kind, 1) => {
                        FieldValue::Pointer(slot::<Option<$ty>>(s, ty).clone().map(Scalar::$kind))
                    }
                )*
                _ => unsupported(ty),
            }
        }

        /// Write `value` into a field slot of shape `ty`.
        ///
        /// Pointer slots are replaced as a whole.
        pub(crate) fn write(s: &mut dyn Any, ty: TypeDescriptor, value: FieldValue<'_>) {
            match (ty.depth(), value) {
                $(
                    (0, FieldValue::Value(Scalar::$kind(v))) if ty.kind() == Kind::$kind => {
                        *slot_mut::<$ty>(s, ty) = v;
                    }
                    (1, FieldValue::Pointer(Some(Scalar::$kind(v))))
                        if ty.kind() == Kind::$kind =>
                    {
                        *slot_mut::<Option<$ty>>(s, ty) = Some(v);
                    }
                )*
                (1, FieldValue::Pointer(None)) if ty.kind() != Kind::Struct => {
                    clear(s, ty);
                }
                _ => unsupported(ty),
            }
        }

        fn clear(s: &mut dyn Any, ty: TypeDescriptor) {
            match ty.kind() {
                $(
                    Kind::$kind => *slot_mut::<Option<$ty>>(s, ty) = None,
                )*
                _ => unsupported(ty),
            }
        }
    };
}

scalar_dispatch! {
    I8 => i8,
    I16 => i16,
    I32 => i32,
    I64 => i64,
    F32 => f32,
    F64 => f64,
    Bool => bool,
    Str => String,
}
