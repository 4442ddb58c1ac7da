use std::any::{Any, type_name};
use std::collections::HashMap;
use std::convert::identity;
use std::fmt;
use std::sync::{Arc, Once, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::MapperConfig;
use crate::error::MapError;
use crate::shape::{Shape, TypeDescriptor};

/// Registered conversion: `(mapper, source, destination, depth)`.
///
/// `source` is the route's source type (or an `Option` of it), `destination`
/// is the route's destination type; `depth` is the nesting level of this call.
pub(crate) type RouteFn =
    Arc<dyn Fn(&Mapper, &dyn Any, &mut dyn Any, usize) -> Result<(), MapError> + Send + Sync>;

type RouteTable = HashMap<TypeDescriptor, HashMap<TypeDescriptor, RouteFn>>;
type OverrideTable = HashMap<TypeDescriptor, HashMap<String, String>>;

/// Route registry and dispatcher.
///
/// Uses interior mutability so routes can be registered through a shared
/// reference (e.g. the process-wide [`global`](crate::global) mapper).
/// Routes are cloned out of the table before they run, so a route may call
/// back into the mapper.
pub struct Mapper {
    routes: RwLock<RouteTable>,
    overrides: RwLock<OverrideTable>,
    builtins: Once,
    config: MapperConfig,
}

impl Default for Mapper {
    fn default() -> Self {
        Self::with_config(MapperConfig::default())
    }
}

impl fmt::Debug for Mapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapper")
            .field("routes", &self.route_count())
            .field("config", &self.config)
            .finish()
    }
}

fn read_lock<'a, T>(lock: &'a RwLock<T>, what: &str) -> RwLockReadGuard<'a, T> {
    match lock.read() {
        Ok(g) => g,
        Err(poisoned) => {
            tracing::warn!("{what} read lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

fn write_lock<'a, T>(lock: &'a RwLock<T>, what: &str) -> RwLockWriteGuard<'a, T> {
    match lock.write() {
        Ok(g) => g,
        Err(poisoned) => {
            tracing::warn!("{what} write lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

/// Accept either `S` or `Option<S>`; `Ok(None)` for an absent pointer.
fn source_as<S: Shape>(value: &dyn Any) -> Result<Option<&S>, MapError> {
    if let Some(v) = value.downcast_ref::<S>() {
        return Ok(Some(v));
    }
    if let Some(v) = value.downcast_ref::<Option<S>>() {
        return Ok(v.as_ref());
    }
    Err(MapError::InvalidSource(format!(
        "route expects {}",
        type_name::<S>()
    )))
}

fn optional_slice<E>(seq: &Option<Vec<E>>) -> &[E] {
    seq.as_deref().unwrap_or(&[])
}

impl Mapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: MapperConfig) -> Self {
        Self {
            routes: RwLock::new(HashMap::new()),
            overrides: RwLock::new(HashMap::new()),
            builtins: Once::new(),
            config,
        }
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Register a hand-written conversion from `S` to `D`.
    ///
    /// `S` must not be a pointer (`Option`) and `D` must not be a pointer to
    /// a pointer. Also registers the eight `Vec` variants of the pair.
    /// Registering the same pair again replaces the previous route.
    pub fn register_route<S, D, F>(&self, route: F) -> Result<(), MapError>
    where
        S: Shape,
        D: Shape,
        F: Fn(&S, &mut D) -> Result<(), MapError> + Send + Sync + 'static,
    {
        self.ensure_builtins();
        self.add_route::<S, D>(move |_, src, dst, _| route(src, dst))
    }

    pub fn has_route<S: Shape, D: Shape>(&self) -> bool {
        self.route(S::descriptor(), D::descriptor()).is_some()
    }

    pub fn route_count(&self) -> usize {
        read_lock(&self.routes, "route table")
            .values()
            .map(HashMap::len)
            .sum()
    }

    /// Populate `dest` from `source` through the route registered for the pair.
    ///
    /// `source` may be a value or a pointer (`Option`, which must be present);
    /// `dest` must not itself be a pointer.
    pub fn map<S: Shape, D: Shape>(&self, source: &S, dest: &mut D) -> Result<(), MapError> {
        let (value, value_ty) = prepare_source(source)?;
        let dest_ty = D::descriptor();
        if dest_ty.is_pointer() {
            return Err(MapError::InvalidDestination(format!(
                "destination should be a single reference, not a reference to a pointer ({dest_ty})"
            )));
        }
        self.call(value, value_ty, dest, dest_ty, 1)
    }

    /// Map `source` into a freshly allocated `D`.
    pub fn map_to<D: Shape, S: Shape>(&self, source: &S) -> Result<D, MapError> {
        let (dest, result) = self.map_to_partial(source);
        result.map(|()| dest)
    }

    /// Like [`map_to`](Self::map_to), but always hands back the destination,
    /// partially populated when mapping failed.
    pub fn map_to_partial<D: Shape, S: Shape>(&self, source: &S) -> (D, Result<(), MapError>) {
        let mut dest = D::default();
        let result = self.map(source, &mut dest);
        (dest, result)
    }

    // -----------------------------------------------------------------------
    // Registry internals
    // -----------------------------------------------------------------------

    pub(crate) fn route(&self, from: TypeDescriptor, to: TypeDescriptor) -> Option<RouteFn> {
        read_lock(&self.routes, "route table")
            .get(&from)
            .and_then(|routes| routes.get(&to))
            .cloned()
    }

    /// Validate the pair, install the route and its sequence variants.
    pub(crate) fn add_route<S, D>(
        &self,
        route: impl Fn(&Mapper, &S, &mut D, usize) -> Result<(), MapError> + Send + Sync + 'static,
    ) -> Result<(), MapError>
    where
        S: Shape,
        D: Shape,
    {
        let from = S::descriptor();
        let to = D::descriptor();
        if from.is_pointer() {
            return Err(MapError::InvalidShape(format!(
                "source type can't be a pointer type, route: {from} -> {to}"
            )));
        }
        if to.depth() > 1 {
            return Err(MapError::InvalidShape(format!(
                "destination type can't be a pointer to pointer, route: {from} -> {to}"
            )));
        }
        self.install::<S, D>(route);
        self.add_sequence_routes::<S, D>();
        tracing::debug!(from = %from, to = %to, "registered route");
        Ok(())
    }

    fn install<S, D>(
        &self,
        route: impl Fn(&Mapper, &S, &mut D, usize) -> Result<(), MapError> + Send + Sync + 'static,
    ) where
        S: Shape,
        D: Shape,
    {
        let erased: RouteFn = Arc::new(
            move |mapper: &Mapper, src: &dyn Any, dst: &mut dyn Any, depth: usize| {
                let Some(src) = source_as::<S>(src)? else {
                    return Ok(());
                };
                let dst = dst.downcast_mut::<D>().ok_or_else(|| {
                    MapError::InvalidDestination(format!("route expects {}", type_name::<D>()))
                })?;
                route(mapper, src, dst, depth)
            },
        );

        let from = S::descriptor();
        let to = D::descriptor();
        let mut routes = write_lock(&self.routes, "route table");
        if routes.entry(from).or_default().insert(to, erased).is_some() {
            tracing::warn!(from = %from, to = %to, "replaced existing route");
        }
    }

    /// `Vec<S>`, `Vec<Option<S>>`, `Option<Vec<S>>`, `Option<Vec<Option<S>>>`
    /// into `Vec<D>` and `Vec<Option<D>>`.
    fn add_sequence_routes<S: Shape, D: Shape>(&self) {
        self.install_sequence::<Vec<S>, S, D, D>(Vec::as_slice, identity);
        self.install_sequence::<Vec<S>, S, D, Option<D>>(Vec::as_slice, Some);
        self.install_sequence::<Vec<Option<S>>, Option<S>, D, D>(Vec::as_slice, identity);
        self.install_sequence::<Vec<Option<S>>, Option<S>, D, Option<D>>(Vec::as_slice, Some);
        self.install_sequence::<Option<Vec<S>>, S, D, D>(optional_slice, identity);
        self.install_sequence::<Option<Vec<S>>, S, D, Option<D>>(optional_slice, Some);
        self.install_sequence::<Option<Vec<Option<S>>>, Option<S>, D, D>(optional_slice, identity);
        self.install_sequence::<Option<Vec<Option<S>>>, Option<S>, D, Option<D>>(
            optional_slice,
            Some,
        );
    }

    /// Each element goes through the `(S, D)` route with `map` source rules;
    /// the destination is always replaced by a fresh vector.
    fn install_sequence<C, E, D, T>(&self, view: fn(&C) -> &[E], wrap: fn(D) -> T)
    where
        C: Shape,
        E: Shape,
        D: Shape,
        T: Shape,
    {
        self.install::<C, Vec<T>>(move |mapper, seq, out, depth| {
            let items = view(seq);
            let mut mapped = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let mut dest = D::default();
                let (value, value_ty) = prepare_source(item)?;
                mapper
                    .call(value, value_ty, &mut dest, D::descriptor(), depth + 1)
                    .map_err(|e| e.with_context(format!("element {i}")))?;
                mapped.push(wrap(dest));
            }
            *out = mapped;
            Ok(())
        });
    }

    pub(crate) fn ensure_builtins(&self) {
        if !self.config.builtin_routes {
            return;
        }
        self.builtins.call_once(|| {
            self.add_identity_routes::<DateTime<Utc>>();
            self.add_identity_routes::<Uuid>();
            tracing::debug!("registered builtin routes");
        });
    }

    fn add_identity_routes<T: Shape + Clone>(&self) {
        let results = [
            self.add_route::<T, T>(|_, src, dst, _| {
                *dst = src.clone();
                Ok(())
            }),
            self.add_route::<T, Option<T>>(|_, src, dst, _| {
                *dst = Some(src.clone());
                Ok(())
            }),
        ];
        for result in results {
            if let Err(e) = result {
                tracing::warn!(shape = type_name::<T>(), error = %e, "builtin route rejected");
            }
        }
    }

    pub(crate) fn dest_path(&self, from: TypeDescriptor, path: &str) -> Option<String> {
        read_lock(&self.overrides, "field override table")
            .get(&from)
            .and_then(|paths| paths.get(path))
            .cloned()
    }

    pub(crate) fn add_overrides(&self, from: TypeDescriptor, paths: &[(String, String)]) {
        let mut overrides = write_lock(&self.overrides, "field override table");
        let entry = overrides.entry(from).or_default();
        for (source, dest) in paths {
            entry.insert(source.clone(), dest.clone());
        }
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    pub(crate) fn enter(&self, depth: usize) -> Result<(), MapError> {
        if depth > self.config.max_depth {
            return Err(MapError::DepthExceeded(self.config.max_depth));
        }
        Ok(())
    }

    /// Run the route registered for the exact `(from, to)` pair.
    pub(crate) fn call(
        &self,
        source: &dyn Any,
        from: TypeDescriptor,
        dest: &mut dyn Any,
        to: TypeDescriptor,
        depth: usize,
    ) -> Result<(), MapError> {
        let route = self.route(from, to).ok_or(MapError::RouteNotFound {
            from: from.name(),
            to: to.name(),
        })?;
        self.enter(depth)?;
        tracing::trace!(from = %from, to = %to, depth, "dispatching route");
        route(self, source, dest, depth)
    }
}

/// Reject nil and pointer-to-pointer sources; dereference a pointer source once.
fn prepare_source<S: Shape>(source: &S) -> Result<(&dyn Any, TypeDescriptor), MapError> {
    let ty = S::descriptor();
    if ty.depth() > 1 {
        return Err(MapError::InvalidSource(format!(
            "source can be a pointer, but not a pointer to pointer ({ty})"
        )));
    }
    ty.strip(source)
        .ok_or_else(|| MapError::InvalidSource(format!("source value can't be nil ({ty})")))
}
