//! Auto-route synthesis: field-by-field copies driven by the field indexes
//! of the source and destination shapes.
//!
//! Per source field, in declaration order:
//!
//! 1. resolve the destination path (override for the source type, else the same path);
//! 2. skip fields the destination lacks and fields excluded by the options;
//!    overridden fields are deferred until every other field is copied;
//! 3. different kind or pointer depth: general conversion ([`Mapper::convert`]);
//! 4. a route registered for the field's own type pair wins;
//! 5. leaves are copied unless the source pointer is absent;
//! 6. structs without a route are descended recursively.
//!
//! Hooks run last, in the order they were added.

use std::any::Any;

use crate::accessor;
use crate::error::MapError;
use crate::fields::{FieldDescriptor, FieldIndex, index_of};
use crate::mapper::Mapper;
use crate::options::AutoOptions;
use crate::shape::{Kind, Shape, TypeDescriptor};

/// State of one auto-route invocation.
struct Walk<'a> {
    /// Source type the auto route was registered for.
    root: TypeDescriptor,
    excluded: &'a [String],
    depth: usize,
}

impl Mapper {
    /// Synthesize and register a route from `S` to `D` by matching field paths.
    ///
    /// Destination fields with no matching source field keep their value;
    /// source fields with no matching destination field are dropped.
    pub fn auto_route<S: Shape, D: Shape>(&self, options: AutoOptions<S, D>) -> Result<(), MapError> {
        let from = S::descriptor();
        let to = D::descriptor();
        let src_index = index_of(from)?;
        let dst_index = index_of(to)?;

        let named = options
            .excluded
            .iter()
            .chain(options.field_paths.iter().map(|(source, _)| source));
        for path in named {
            if !src_index.contains(path) {
                return Err(MapError::UnknownField {
                    ty: from.name(),
                    path: path.clone(),
                });
            }
        }

        self.ensure_builtins();
        if !options.field_paths.is_empty() {
            self.add_overrides(from, &options.field_paths);
        }

        let AutoOptions { hooks, excluded, .. } = options;
        tracing::debug!(
            from = %from,
            to = %to,
            hooks = hooks.len(),
            excluded = excluded.len(),
            "synthesized auto route"
        );

        self.add_route::<S, D>(move |mapper, src, dst, depth| {
            let walk = Walk {
                root: from,
                excluded: &excluded,
                depth,
            };
            mapper.copy_struct(src, &src_index, dst, &dst_index, "", &walk)?;
            for hook in &hooks {
                hook(src, dst);
            }
            Ok(())
        })
    }

    fn copy_struct(
        &self,
        src: &dyn Any,
        src_index: &FieldIndex,
        dst: &mut dyn Any,
        dst_index: &FieldIndex,
        prefix: &str,
        walk: &Walk<'_>,
    ) -> Result<(), MapError> {
        let from = src_index.ty();
        let mut redirected = Vec::new();
        for field in src_index.iter() {
            let full_path = format!("{prefix}{}", field.path());
            if walk.excluded.contains(&full_path) {
                continue;
            }
            // Already redirected by an override on the root type.
            if !prefix.is_empty() && self.dest_path(walk.root, &full_path).is_some() {
                continue;
            }
            match self.dest_path(from, field.path()) {
                Some(dest_path) => redirected.push((field, dest_path, full_path)),
                // Nested paths are reached by descending their parent.
                None if field.is_nested() => {}
                None => {
                    if let Some(dest_field) = dst_index.get(field.path()) {
                        self.copy_field(field, src, dest_field, dst, &full_path, walk)
                            .map_err(|e| e.with_context(format!("field '{}'", field.path())))?;
                    }
                }
            }
        }

        // Overrides run last so they win over same-named copies and descents.
        for (field, dest_path, full_path) in redirected {
            let Some(dest_field) = dst_index.get(&dest_path) else {
                continue;
            };
            self.copy_field(field, src, dest_field, dst, &full_path, walk)
                .map_err(|e| e.with_context(format!("field '{}'", field.path())))?;
        }
        Ok(())
    }

    fn copy_field(
        &self,
        field: &FieldDescriptor,
        src: &dyn Any,
        dest_field: &FieldDescriptor,
        dst: &mut dyn Any,
        full_path: &str,
        walk: &Walk<'_>,
    ) -> Result<(), MapError> {
        let from = field.ty();
        let to = dest_field.ty();
        let src_slot = field.locate(src);
        let dst_slot = dest_field.locate_mut(dst);

        if !from.same_kind(&to) {
            return self.convert(src_slot, from, dst_slot, to, full_path, walk);
        }

        if let Some(route) = self.route(from.base(), to) {
            let Some((value, _)) = from.strip(src_slot) else {
                return Ok(());
            };
            let depth = walk.depth + 1;
            self.enter(depth)?;
            return route(self, value, dst_slot, depth);
        }

        if from.kind().is_leaf() {
            let value = accessor::read(src_slot, from);
            if !value.is_nil() {
                accessor::write(dst_slot, to, value);
            }
            return Ok(());
        }

        self.descend(src_slot, from, dst_slot, to, full_path, walk)
    }

    /// General conversion for a field pair whose shapes differ.
    ///
    /// An absent source pointer leaves the destination untouched.
    fn convert(
        &self,
        src: &dyn Any,
        from: TypeDescriptor,
        dst: &mut dyn Any,
        to: TypeDescriptor,
        full_path: &str,
        walk: &Walk<'_>,
    ) -> Result<(), MapError> {
        let Some((value, from)) = from.strip(src) else {
            return Ok(());
        };
        self.assign(value, from, dst, to, full_path, walk)
    }

    /// `from` is never a pointer here.
    fn assign(
        &self,
        src: &dyn Any,
        from: TypeDescriptor,
        dst: &mut dyn Any,
        to: TypeDescriptor,
        full_path: &str,
        walk: &Walk<'_>,
    ) -> Result<(), MapError> {
        if let Some(route) = self.route(from, to) {
            let depth = walk.depth + 1;
            self.enter(depth)?;
            return route(self, src, dst, depth);
        }

        match to.pointee() {
            Some(inner) if self.reachable(from, inner) => {
                let dst = to.deref_alloc(dst);
                return self.assign(src, from, dst, inner, full_path, walk);
            }
            Some(_) => {}
            None if from == to && from.kind().is_leaf() => {
                accessor::write(dst, to, accessor::read(src, from));
                return Ok(());
            }
            None if from.kind() == Kind::Struct && to.kind() == Kind::Struct => {
                return self.descend(src, from, dst, to, full_path, walk);
            }
            None => {}
        }

        Err(MapError::RouteNotFound {
            from: from.name(),
            to: to.name(),
        })
    }

    fn reachable(&self, from: TypeDescriptor, to: TypeDescriptor) -> bool {
        if self.route(from, to).is_some() {
            return true;
        }
        match to.pointee() {
            Some(inner) => self.reachable(from, inner),
            None => {
                (from == to && from.kind().is_leaf())
                    || (from.kind() == Kind::Struct && to.kind() == Kind::Struct)
            }
        }
    }

    /// Copy a struct field structurally, allocating absent destination pointers.
    ///
    /// A route registered for the dereferenced pair still takes precedence.
    fn descend(
        &self,
        src: &dyn Any,
        from: TypeDescriptor,
        dst: &mut dyn Any,
        to: TypeDescriptor,
        full_path: &str,
        walk: &Walk<'_>,
    ) -> Result<(), MapError> {
        let Some((value, from)) = from.strip(src) else {
            return Ok(());
        };
        let (slot, to) = to.alloc(dst);

        let depth = walk.depth + 1;
        self.enter(depth)?;
        if let Some(route) = self.route(from, to) {
            return route(self, value, slot, depth);
        }

        let src_index = index_of(from)?;
        let dst_index = index_of(to)?;
        let nested = Walk {
            root: walk.root,
            excluded: walk.excluded,
            depth,
        };
        self.copy_struct(
            value,
            &src_index,
            slot,
            &dst_index,
            &format!("{full_path}."),
            &nested,
        )
    }
}
