use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock, RwLock};

use crate::error::MapError;
use crate::shape::{Kind, Shape, TypeDescriptor};

/// Type-erased access to one field of one owner type.
trait Access: Send + Sync {
    fn get<'a>(&self, owner: &'a dyn Any) -> &'a dyn Any;
    fn get_mut<'a>(&self, owner: &'a mut dyn Any) -> &'a mut dyn Any;
}

struct Typed<O, F> {
    get: fn(&O) -> &F,
    get_mut: fn(&mut O) -> &mut F,
}

impl<O: Any, F: Any> Access for Typed<O, F> {
    fn get<'a>(&self, owner: &'a dyn Any) -> &'a dyn Any {
        match owner.downcast_ref::<O>() {
            Some(owner) => (self.get)(owner),
            None => panic!("field owner is not `{}`", type_name::<O>()),
        }
    }

    fn get_mut<'a>(&self, owner: &'a mut dyn Any) -> &'a mut dyn Any {
        match owner.downcast_mut::<O>() {
            Some(owner) => (self.get_mut)(owner),
            None => panic!("field owner is not `{}`", type_name::<O>()),
        }
    }
}

/// One declared field of a struct shape: name, type and accessor pair.
///
/// Produced by `#[derive(Shape)]`.
#[derive(Clone)]
pub struct FieldDef {
    name: &'static str,
    ty: TypeDescriptor,
    access: Arc<dyn Access>,
}

impl FieldDef {
    pub fn new<O: Shape, F: Shape>(
        name: &'static str,
        get: fn(&O) -> &F,
        get_mut: fn(&mut O) -> &mut F,
    ) -> Self {
        Self {
            name,
            ty: F::descriptor(),
            access: Arc::new(Typed { get, get_mut }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn ty(&self) -> TypeDescriptor {
        self.ty
    }
}

impl fmt::Debug for FieldDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDef")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .finish()
    }
}

/// An indexed field: dotted path from the indexed root plus the accessor
/// chain that reaches it.
#[derive(Clone)]
pub struct FieldDescriptor {
    path: String,
    ty: TypeDescriptor,
    chain: Vec<Arc<dyn Access>>,
}

impl FieldDescriptor {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn ty(&self) -> TypeDescriptor {
        self.ty
    }

    pub fn kind(&self) -> Kind {
        self.ty.kind()
    }

    pub fn is_pointer(&self) -> bool {
        self.ty.is_pointer()
    }

    /// Nested fields have a dotted path.
    pub fn is_nested(&self) -> bool {
        self.chain.len() > 1
    }

    /// Field slot inside `root`, which must be an instance of the indexed type.
    pub fn locate<'a>(&self, root: &'a dyn Any) -> &'a dyn Any {
        self.chain.iter().fold(root, |owner, hop| hop.get(owner))
    }

    pub fn locate_mut<'a>(&self, root: &'a mut dyn Any) -> &'a mut dyn Any {
        let mut slot = root;
        for hop in &self.chain {
            slot = hop.get_mut(slot);
        }
        slot
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("path", &self.path)
            .field("ty", &self.ty)
            .finish()
    }
}

/// Every mappable field of a struct shape, keyed by dotted path.
#[derive(Debug)]
pub struct FieldIndex {
    ty: TypeDescriptor,
    fields: Vec<FieldDescriptor>,
    by_path: HashMap<String, usize>,
}

impl FieldIndex {
    pub fn ty(&self) -> TypeDescriptor {
        self.ty
    }

    pub fn get(&self, path: &str) -> Option<&FieldDescriptor> {
        self.by_path.get(path).map(|&i| &self.fields[i])
    }

    pub fn contains(&self, path: &str) -> bool {
        self.by_path.contains_key(path)
    }

    /// Fields in declaration order, parents before their children.
    pub fn iter(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.path.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn build(ty: TypeDescriptor) -> Result<Self, MapError> {
        let mut index = FieldIndex {
            ty,
            fields: Vec::new(),
            by_path: HashMap::new(),
        };
        let mut visiting = vec![ty];
        index.walk(ty, "", &[], &mut visiting)?;
        Ok(index)
    }

    fn walk(
        &mut self,
        owner: TypeDescriptor,
        prefix: &str,
        chain: &[Arc<dyn Access>],
        visiting: &mut Vec<TypeDescriptor>,
    ) -> Result<(), MapError> {
        for def in owner.field_defs() {
            // Sequences are mapped through sequence routes only.
            if def.ty.kind() == Kind::Sequence {
                continue;
            }
            let path = format!("{prefix}{}", def.name);
            let mut field_chain = chain.to_vec();
            field_chain.push(def.access.clone());

            self.by_path.insert(path.clone(), self.fields.len());
            self.fields.push(FieldDescriptor {
                path: path.clone(),
                ty: def.ty,
                chain: field_chain.clone(),
            });

            if def.ty.kind() == Kind::Struct && !def.ty.is_pointer() {
                if visiting.contains(&def.ty) {
                    let cycle: Vec<&str> = visiting.iter().map(|t| t.name()).collect();
                    return Err(MapError::CyclicShape(format!(
                        "{} -> {}",
                        cycle.join(" -> "),
                        def.ty.name()
                    )));
                }
                visiting.push(def.ty);
                self.walk(def.ty, &format!("{path}."), &field_chain, visiting)?;
                visiting.pop();
            }
        }
        Ok(())
    }
}

static INDEXES: LazyLock<RwLock<HashMap<TypeId, Arc<FieldIndex>>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// Field index of a struct shape, built on first use and cached for the
/// lifetime of the process.
pub fn index_of(ty: TypeDescriptor) -> Result<Arc<FieldIndex>, MapError> {
    if ty.kind() != Kind::Struct || ty.is_pointer() {
        return Err(MapError::InvalidShape(format!(
            "{} is not a struct shape",
            ty.name()
        )));
    }

    {
        let guard = match INDEXES.read() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("field index read lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        if let Some(index) = guard.get(&ty.type_id()) {
            return Ok(index.clone());
        }
    }

    let index = Arc::new(FieldIndex::build(ty)?);
    tracing::debug!(shape = %ty, fields = index.len(), "indexed shape");

    let mut guard = match INDEXES.write() {
        Ok(g) => g,
        Err(poisoned) => {
            tracing::warn!("field index write lock was poisoned, recovering");
            poisoned.into_inner()
        }
    };
    // A concurrent builder may have won; keep the first entry.
    Ok(guard.entry(ty.type_id()).or_insert(index).clone())
}

pub fn index_for<T: Shape>() -> Result<Arc<FieldIndex>, MapError> {
    index_of(T::descriptor())
}
