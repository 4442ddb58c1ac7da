use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::fields::FieldDef;

/// Closed set of shape kinds the mapper understands.
///
/// - Scalars (`I8`..`Str`): copied by value through the field accessor.
/// - `Struct`: indexed and descended field by field.
/// - `Sequence`: never indexed; mapped only through sequence routes.
/// - `Opaque`: leaf values the accessor does not handle (timestamps, ids);
///   they must be covered by a registered route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Bool,
    Str,
    Struct,
    Sequence,
    Opaque,
}

impl Kind {
    /// Leaf kinds are copied as a whole; everything else is descended or routed.
    pub fn is_leaf(self) -> bool {
        !matches!(self, Kind::Struct | Kind::Sequence)
    }
}

/// Erased operations of a pointer shape (`Option<T>`).
#[derive(Clone, Copy)]
pub(crate) struct PointerOps {
    pub(crate) pointee: fn() -> TypeDescriptor,
    pub(crate) deref: fn(&dyn Any) -> Option<&dyn Any>,
    /// Dereference, allocating the zero value when absent.
    pub(crate) deref_mut: fn(&mut dyn Any) -> &mut dyn Any,
}

/// Runtime identity of a concrete shape.
///
/// Equality and hashing use the `TypeId` only: two structurally identical
/// types are still two different descriptors.
#[derive(Clone, Copy)]
pub struct TypeDescriptor {
    id: TypeId,
    name: &'static str,
    kind: Kind,
    depth: u8,
    pointer: Option<PointerOps>,
    fields: fn() -> Vec<FieldDef>,
}

fn no_fields() -> Vec<FieldDef> {
    Vec::new()
}

impl TypeDescriptor {
    /// Descriptor of a leaf or sequence type.
    pub fn leaf<T: Any>(kind: Kind) -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
            kind,
            depth: 0,
            pointer: None,
            fields: no_fields,
        }
    }

    /// Descriptor of a struct whose fields come from `T::fields()`.
    pub fn structure<T: Shape>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
            kind: Kind::Struct,
            depth: 0,
            pointer: None,
            fields: T::fields,
        }
    }

    /// Descriptor of `Option<T>`: same kind as `T`, one more level of indirection.
    pub fn pointer_to<T: Shape>() -> Self {
        let pointee = T::descriptor();
        Self {
            id: TypeId::of::<Option<T>>(),
            name: type_name::<Option<T>>(),
            kind: pointee.kind,
            depth: pointee.depth.saturating_add(1),
            pointer: Some(PointerOps {
                pointee: T::descriptor,
                deref: deref_option::<T>,
                deref_mut: deref_option_mut::<T>,
            }),
            fields: no_fields,
        }
    }

    pub fn of<T: Shape>() -> Self {
        T::descriptor()
    }

    pub fn type_id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Number of pointer levels (`Option` wrappers) around the base shape.
    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn is_pointer(&self) -> bool {
        self.depth > 0
    }

    /// Shape pointed to, for pointer descriptors.
    pub fn pointee(&self) -> Option<TypeDescriptor> {
        self.pointer.map(|ops| (ops.pointee)())
    }

    /// Base shape with every pointer level removed.
    pub fn base(&self) -> TypeDescriptor {
        let mut ty = *self;
        while let Some(inner) = ty.pointee() {
            ty = inner;
        }
        ty
    }

    /// Same kind and same indirection. Opaque shapes also need the same base type.
    pub fn same_kind(&self, other: &TypeDescriptor) -> bool {
        if self.kind != other.kind || self.depth != other.depth {
            return false;
        }
        self.kind != Kind::Opaque || self.base() == other.base()
    }

    pub(crate) fn field_defs(&self) -> Vec<FieldDef> {
        (self.fields)()
    }

    /// Follow every pointer level of `value`.
    ///
    /// Returns `None` when a level is absent.
    pub(crate) fn strip<'a>(&self, value: &'a dyn Any) -> Option<(&'a dyn Any, TypeDescriptor)> {
        let mut ty = *self;
        let mut value = value;
        while let Some(ops) = ty.pointer {
            value = (ops.deref)(value)?;
            ty = (ops.pointee)();
        }
        Some((value, ty))
    }

    /// Dereference one pointer level of `slot`, allocating its zero value if absent.
    pub(crate) fn deref_alloc<'a>(&self, slot: &'a mut dyn Any) -> &'a mut dyn Any {
        match self.pointer {
            Some(ops) => (ops.deref_mut)(slot),
            None => slot,
        }
    }

    /// Follow every pointer level of `slot`, allocating absent levels.
    pub(crate) fn alloc<'a>(&self, slot: &'a mut dyn Any) -> (&'a mut dyn Any, TypeDescriptor) {
        let mut ty = *self;
        let mut slot = slot;
        while let Some(ops) = ty.pointer {
            slot = (ops.deref_mut)(slot);
            ty = (ops.pointee)();
        }
        (slot, ty)
    }
}

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeDescriptor {}

impl Hash for TypeDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("depth", &self.depth)
            .finish()
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

fn deref_option<T: Shape>(value: &dyn Any) -> Option<&dyn Any> {
    match value.downcast_ref::<Option<T>>() {
        Some(slot) => slot.as_ref().map(|v| v as &dyn Any),
        None => panic!("pointer slot is not `{}`", type_name::<Option<T>>()),
    }
}

fn deref_option_mut<T: Shape>(value: &mut dyn Any) -> &mut dyn Any {
    match value.downcast_mut::<Option<T>>() {
        Some(slot) => slot.get_or_insert_with(T::default),
        None => panic!("pointer slot is not `{}`", type_name::<Option<T>>()),
    }
}

/// A type the mapper can introspect.
///
/// Structs get this from `#[derive(Shape)]`; scalars, `Option`, `Vec` and
/// the well-known opaque types are covered here. `Default` is the zero
/// value used when a destination has to be allocated.
pub trait Shape: Any + Default {
    fn descriptor() -> TypeDescriptor;

    /// Field table, in declaration order. Empty for non-struct shapes.
    fn fields() -> Vec<FieldDef> {
        Vec::new()
    }
}

macro_rules! leaf_shape {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl Shape for $ty {
                fn descriptor() -> TypeDescriptor {
                    TypeDescriptor::leaf::<$ty>(Kind::$kind)
                }
            }
        )*
    };
}

leaf_shape! {
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    f32 => F32,
    f64 => F64,
    bool => Bool,
    String => Str,
    DateTime<Utc> => Opaque,
    Uuid => Opaque,
}

impl<T: Shape> Shape for Option<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::pointer_to::<T>()
    }
}

impl<T: Any> Shape for Vec<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::leaf::<Vec<T>>(Kind::Sequence)
    }
}
